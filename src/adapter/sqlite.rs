//! SQLite-backed Graph Adapter.
//!
//! Single database file with tables for vocabulary types, edges, and
//! configuration. Thread-safe via an internal mutex on the connection,
//! mirroring how a synchronous `rusqlite::Connection` is wrapped elsewhere
//! in this crate's storage layer.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::adapter::{GraphAdapter, StorageError, StorageResult};
use crate::vocab::{
    AttributePatch, Category, CategorySource, EpistemicStats, EpistemicStatus, GraphEdge, SqlValue,
    TypeName, VocabularyFilter, VocabularyType,
};

pub struct SqliteGraphAdapter {
    conn: Mutex<Connection>,
    epoch: AtomicU64,
}

impl SqliteGraphAdapter {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        let epoch = Self::read_epoch(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            epoch: AtomicU64::new(epoch),
        })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            epoch: AtomicU64::new(0),
        })
    }

    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS vocabulary_types (
                name TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                category_confidence REAL NOT NULL,
                category_source TEXT NOT NULL,
                is_builtin INTEGER NOT NULL,
                is_active INTEGER NOT NULL,
                usage_count INTEGER NOT NULL,
                embedding_json TEXT,
                embedding_model_id TEXT,
                epistemic_status TEXT,
                epistemic_stats_json TEXT,
                status_measured_at INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS vocab_edges (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                label TEXT NOT NULL,
                confidence REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_vocab_edges_label ON vocab_edges(label);
            CREATE INDEX IF NOT EXISTS idx_vocab_edges_source ON vocab_edges(source);
            CREATE INDEX IF NOT EXISTS idx_vocab_edges_target ON vocab_edges(target);

            CREATE TABLE IF NOT EXISTS vocab_meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );

            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn read_epoch(conn: &Connection) -> StorageResult<u64> {
        let v: Option<i64> = conn
            .query_row("SELECT value FROM vocab_meta WHERE key = 'measurement_epoch'", [], |r| r.get(0))
            .optional()?;
        Ok(v.unwrap_or(0) as u64)
    }

    fn row_to_type(
        name: String,
        category: String,
        category_confidence: f64,
        category_source: String,
        is_builtin: i64,
        is_active: i64,
        usage_count: i64,
        embedding_json: Option<String>,
        embedding_model_id: Option<String>,
        epistemic_status: Option<String>,
        epistemic_stats_json: Option<String>,
        status_measured_at: Option<i64>,
        created_at: String,
        updated_at: String,
    ) -> StorageResult<VocabularyType> {
        Ok(VocabularyType {
            name: TypeName::new(name),
            category: category.parse().map_err(StorageError::NotFound)?,
            category_confidence,
            category_source: match category_source.as_str() {
                "builtin" => CategorySource::Builtin,
                "manual" => CategorySource::Manual,
                _ => CategorySource::Computed,
            },
            is_builtin: is_builtin != 0,
            is_active: is_active != 0,
            usage_count: usage_count as u64,
            embedding: embedding_json.map(|j| serde_json::from_str(&j)).transpose()?,
            embedding_model_id,
            epistemic_status: epistemic_status.and_then(|s| match s.as_str() {
                "INSUFFICIENT_DATA" => Some(EpistemicStatus::InsufficientData),
                "CONTRADICTED" => Some(EpistemicStatus::Contradicted),
                "POORLY_GROUNDED" => Some(EpistemicStatus::PoorlyGrounded),
                "WEAK_GROUNDING" => Some(EpistemicStatus::WeakGrounding),
                "MIXED_GROUNDING" => Some(EpistemicStatus::MixedGrounding),
                "WELL_GROUNDED" => Some(EpistemicStatus::WellGrounded),
                "HISTORICAL" => Some(EpistemicStatus::Historical),
                _ => None,
            }),
            epistemic_stats: epistemic_stats_json
                .map(|j| serde_json::from_str::<EpistemicStats>(&j))
                .transpose()?,
            status_measured_at: status_measured_at.map(|v| v as u64),
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| StorageError::DateParse(e.to_string()))?
                .with_timezone(&chrono::Utc),
            updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                .map_err(|e| StorageError::DateParse(e.to_string()))?
                .with_timezone(&chrono::Utc),
        })
    }
}

/// Deterministic linear-congruential generator used to produce a
/// reproducible uniform sample without pulling the query into SQL.
fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *state
}

/// Flatten a structured patch value into the JSON text a column stores.
/// The patch itself travels through `update_type_attributes` as a typed
/// `SqlValue`, never pre-stringified by the caller; only this last step —
/// the actual write to a text column — turns it into JSON.
fn sql_value_to_json(v: &SqlValue) -> serde_json::Value {
    match v {
        SqlValue::Null => serde_json::Value::Null,
        SqlValue::Bool(b) => serde_json::Value::Bool(*b),
        SqlValue::Int(i) => serde_json::Value::from(*i),
        SqlValue::Float(f) => serde_json::Value::from(*f),
        SqlValue::Text(s) => serde_json::Value::String(s.clone()),
        SqlValue::Map(m) => {
            serde_json::Value::Object(m.iter().map(|(k, v)| (k.clone(), sql_value_to_json(v))).collect())
        }
        SqlValue::List(l) => serde_json::Value::Array(l.iter().map(sql_value_to_json).collect()),
    }
}

impl GraphAdapter for SqliteGraphAdapter {
    fn list_vocabulary(&self, filter: &VocabularyFilter) -> StorageResult<Vec<VocabularyType>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT name, category, category_confidence, category_source, is_builtin, is_active, \
             usage_count, embedding_json, embedding_model_id, epistemic_status, \
             epistemic_stats_json, status_measured_at, created_at, updated_at FROM vocabulary_types",
        );
        let mut clauses = Vec::new();
        if !filter.include_inactive {
            clauses.push("is_active = 1");
        }
        if !filter.include_builtin {
            clauses.push("is_builtin = 0");
        }
        if filter.only_with_embeddings {
            clauses.push("embedding_json IS NOT NULL");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY name ASC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, Option<String>>(9)?,
                row.get::<_, Option<String>>(10)?,
                row.get::<_, Option<i64>>(11)?,
                row.get::<_, String>(12)?,
                row.get::<_, String>(13)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (
                name, category, cc, cs, builtin, active, usage, emb, emb_model, status, stats, measured, created, updated,
            ) = row?;
            out.push(Self::row_to_type(
                name, category, cc, cs, builtin, active, usage, emb, emb_model, status, stats, measured, created, updated,
            )?);
        }
        Ok(out)
    }

    fn get_type(&self, name: &str) -> StorageResult<Option<VocabularyType>> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT name, category, category_confidence, category_source, is_builtin, is_active, \
                 usage_count, embedding_json, embedding_model_id, epistemic_status, \
                 epistemic_stats_json, status_measured_at, created_at, updated_at \
                 FROM vocabulary_types WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, Option<String>>(8)?,
                        row.get::<_, Option<String>>(9)?,
                        row.get::<_, Option<String>>(10)?,
                        row.get::<_, Option<i64>>(11)?,
                        row.get::<_, String>(12)?,
                        row.get::<_, String>(13)?,
                    ))
                },
            )
            .optional()?;
        match result {
            None => Ok(None),
            Some((name, category, cc, cs, builtin, active, usage, emb, emb_model, status, stats, measured, created, updated)) => {
                Ok(Some(Self::row_to_type(
                    name, category, cc, cs, builtin, active, usage, emb, emb_model, status, stats, measured, created, updated,
                )?))
            }
        }
    }

    fn count_edges_by_label(&self, name: &str) -> StorageResult<u64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vocab_edges WHERE label = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    fn sample_edges(&self, name: &str, n: usize, seed: u64) -> StorageResult<Vec<GraphEdge>> {
        let matching: Vec<GraphEdge> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, source, target, label, confidence FROM vocab_edges WHERE label = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![name], |row| {
                Ok(GraphEdge {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    target: row.get(2)?,
                    label: row.get(3)?,
                    confidence: row.get(4)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        if matching.len() <= n {
            return Ok(matching);
        }
        let mut state = seed.max(1);
        let mut indices: Vec<usize> = (0..matching.len()).collect();
        for i in (1..indices.len()).rev() {
            let j = (lcg_next(&mut state) as usize) % (i + 1);
            indices.swap(i, j);
        }
        indices.truncate(n);
        Ok(indices.into_iter().map(|i| matching[i].clone()).collect())
    }

    fn incident_edges(&self, concept_id: &str, limit: usize) -> StorageResult<Vec<GraphEdge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, source, target, label, confidence FROM vocab_edges \
             WHERE source = ?1 OR target = ?1 LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![concept_id, limit as i64], |row| {
            Ok(GraphEdge {
                id: row.get(0)?,
                source: row.get(1)?,
                target: row.get(2)?,
                label: row.get(3)?,
                confidence: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
    }

    fn rewrite_edge_labels(&self, deprecated: &str, target: &str) -> StorageResult<u64> {
        let mut conn = self.conn.lock().unwrap();
        let is_builtin: Option<i64> = conn
            .query_row("SELECT is_builtin FROM vocabulary_types WHERE name = ?1", params![deprecated], |r| r.get(0))
            .optional()?;
        if let Some(1) = is_builtin {
            return Err(StorageError::Conflict(format!("{deprecated} is builtin")));
        }
        let tx = conn.transaction()?;
        let n = tx.execute(
            "UPDATE vocab_edges SET label = ?1 WHERE label = ?2",
            params![target, deprecated],
        )?;
        tx.execute(
            "UPDATE vocabulary_types SET is_active = 0, updated_at = ?1 WHERE name = ?2",
            params![chrono::Utc::now().to_rfc3339(), deprecated],
        )?;
        tx.commit()?;
        Ok(n as u64)
    }

    fn deactivate_type(&self, name: &str) -> StorageResult<()> {
        let has_live_edges = self.count_edges_by_label(name)? > 0;
        let conn = self.conn.lock().unwrap();
        let is_builtin: i64 = conn
            .query_row("SELECT is_builtin FROM vocabulary_types WHERE name = ?1", params![name], |r| r.get(0))
            .optional()?
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        if is_builtin != 0 {
            return Err(StorageError::Conflict(format!("{name} is builtin")));
        }
        if has_live_edges {
            return Err(StorageError::Conflict(format!("{name} still has live edges")));
        }
        conn.execute(
            "UPDATE vocabulary_types SET is_active = 0, updated_at = ?1 WHERE name = ?2",
            params![chrono::Utc::now().to_rfc3339(), name],
        )?;
        Ok(())
    }

    fn prune_type(&self, name: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(i64, i64)> = conn
            .query_row(
                "SELECT is_builtin, usage_count FROM vocabulary_types WHERE name = ?1",
                params![name],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let (is_builtin, usage_count) = row.ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        if is_builtin != 0 {
            return Err(StorageError::Conflict(format!("{name} is builtin")));
        }
        if usage_count > 0 {
            return Err(StorageError::Conflict(format!("{name} still has usage_count > 0")));
        }
        conn.execute("DELETE FROM vocabulary_types WHERE name = ?1", params![name])?;
        Ok(())
    }

    fn update_type_attributes(&self, name: &str, patch: &AttributePatch) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn
            .query_row("SELECT 1 FROM vocabulary_types WHERE name = ?1", params![name], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let map = match patch.as_map() {
            SqlValue::Map(m) => m,
            _ => HashMap::new(),
        };

        let mut sets = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(v) = map.get("embedding") {
            sets.push("embedding_json = ?");
            values.push(Box::new(sql_value_to_json(v).to_string()));
        }
        if let Some(v) = map.get("embedding_model_id") {
            sets.push("embedding_model_id = ?");
            if let SqlValue::Text(s) = v {
                values.push(Box::new(s.clone()));
            }
        }
        if let Some(v) = map.get("epistemic_status") {
            sets.push("epistemic_status = ?");
            if let SqlValue::Text(s) = v {
                values.push(Box::new(s.clone()));
            }
        }
        if let Some(v) = map.get("epistemic_stats") {
            sets.push("epistemic_stats_json = ?");
            values.push(Box::new(sql_value_to_json(v).to_string()));
        }
        if let Some(v) = map.get("status_measured_at") {
            sets.push("status_measured_at = ?");
            if let SqlValue::Int(i) = v {
                values.push(Box::new(*i));
            }
        }
        if let Some(v) = map.get("category") {
            sets.push("category = ?");
            if let SqlValue::Text(s) = v {
                values.push(Box::new(s.clone()));
            }
        }
        if let Some(v) = map.get("category_confidence") {
            sets.push("category_confidence = ?");
            if let SqlValue::Float(f) = v {
                values.push(Box::new(*f));
            }
        }
        if let Some(v) = map.get("category_source") {
            sets.push("category_source = ?");
            if let SqlValue::Text(s) = v {
                values.push(Box::new(s.clone()));
            }
        }

        if sets.is_empty() {
            return Ok(());
        }

        sets.push("updated_at = ?");
        values.push(Box::new(chrono::Utc::now().to_rfc3339()));

        let sql = format!(
            "UPDATE vocabulary_types SET {} WHERE name = ?",
            sets.join(", ")
        );
        values.push(Box::new(name.to_string()));

        let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
        conn.execute(&sql, param_refs.as_slice())?;
        Ok(())
    }

    fn bump_measurement_epoch(&self) -> StorageResult<u64> {
        let next = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO vocab_meta (key, value) VALUES ('measurement_epoch', ?1) \
             ON CONFLICT(key) DO UPDATE SET value = ?1",
            params![next as i64],
        )?;
        Ok(next)
    }
}
