//! MCP server for the Vocabulary Lifecycle Engine — exposes `consolidate`,
//! `measure_epistemic`, `list_vocabulary`, and profile CRUD via the Model
//! Context Protocol.
//!
//! Tools: 6 total.

pub mod params;

use std::path::PathBuf;
use std::sync::Arc;

use params::*;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};

use crate::adapter::SqliteGraphAdapter;
use crate::config::{StaticConfigStore, VocabConfig};
use crate::controller::{CancellationToken, ConsolidateParams as ControllerConsolidateParams};
use crate::embedding::EmbeddingService;
use crate::profiles::InMemoryProfileStore;
use crate::reasoner::{MockReasoningProvider, SubprocessReasoningProvider};
use crate::vocab::{AggressivenessProfile, VocabularyFilter};
use crate::VocabLifecycleEngine;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ok_text(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn err_text(msg: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg)]))
}

// ---------------------------------------------------------------------------
// VocabLifecycleMcpServer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct VocabLifecycleMcpServer {
    engine: Arc<VocabLifecycleEngine>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl VocabLifecycleMcpServer {
    pub fn new(engine: Arc<VocabLifecycleEngine>) -> Self {
        Self { engine, tool_router: Self::tool_router() }
    }

    #[tool(description = "Drive the vocabulary toward target_size: prune zero-usage types, auto-merge near-duplicates, and dispatch ambiguous pairs to the reasoning provider")]
    async fn consolidate(&self, Parameters(p): Parameters<ConsolidateParams>) -> Result<CallToolResult, McpError> {
        let params = ControllerConsolidateParams {
            target_size: p.target_size,
            dry_run: p.dry_run.unwrap_or(false),
            prune_unused: p.prune_unused.unwrap_or(true),
            seed: p.seed.unwrap_or(0),
        };
        match self.engine.consolidate(params, &CancellationToken::new()).await {
            Ok(result) => ok_text(serde_json::to_string_pretty(&ConsolidationResultView::from(result)).unwrap()),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "Classify every active vocabulary type's epistemic grounding (standalone run, independent of consolidate)")]
    fn measure_epistemic(&self, Parameters(p): Parameters<MeasureEpistemicParams>) -> Result<CallToolResult, McpError> {
        let sample_size = p.sample_size.unwrap_or(50);
        let seed = p.seed.unwrap_or(0);
        let store = p.store.unwrap_or(true);
        match self.engine.measure_epistemic(sample_size, seed, store) {
            Ok(report) => ok_text(serde_json::to_string_pretty(&ClassificationReportView::from(report)).unwrap()),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "List vocabulary types, optionally including inactive or builtin types")]
    fn list_vocabulary(&self, Parameters(p): Parameters<ListVocabularyParams>) -> Result<CallToolResult, McpError> {
        let filter = VocabularyFilter {
            include_inactive: p.include_inactive.unwrap_or(false),
            include_builtin: p.include_builtin.unwrap_or(true),
            only_with_embeddings: p.only_with_embeddings.unwrap_or(false),
        };
        match self.engine.list_vocabulary(&filter) {
            Ok(types) => ok_text(serde_json::to_string_pretty(&types).unwrap()),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "List all aggressiveness profiles (builtin and custom)")]
    fn list_profiles(&self) -> Result<CallToolResult, McpError> {
        ok_text(serde_json::to_string_pretty(&self.engine.profiles().list()).unwrap())
    }

    #[tool(description = "Create a custom aggressiveness profile from four cubic-Bezier control points")]
    fn create_profile(&self, Parameters(p): Parameters<CreateProfileParams>) -> Result<CallToolResult, McpError> {
        let profile = AggressivenessProfile::new(p.name.clone(), p.x1, p.y1, p.x2, p.y2);
        match self.engine.create_profile(profile) {
            Ok(()) => ok_text(serde_json::to_string_pretty(&serde_json::json!({ "created": p.name })).unwrap()),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "Delete a custom aggressiveness profile (builtin profiles cannot be deleted)")]
    fn delete_profile(&self, Parameters(p): Parameters<ProfileNameParams>) -> Result<CallToolResult, McpError> {
        match self.engine.delete_profile(&p.name) {
            Ok(()) => ok_text(serde_json::to_string_pretty(&serde_json::json!({ "deleted": p.name })).unwrap()),
            Err(e) => err_text(e.to_string()),
        }
    }
}

#[tool_handler]
impl ServerHandler for VocabLifecycleMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Vocabulary Lifecycle Engine MCP server — consolidate, measure_epistemic, list_vocabulary, and aggressiveness profile CRUD".into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// JSON-friendly view of `ConsolidationResult`: the original carries
/// `DecisionOrigin` as a plain enum without a serde derive, matching the
/// rest of the engine's internal types, which aren't wire types.
#[derive(Debug, serde::Serialize)]
struct ConsolidationResultView {
    initial_size: u64,
    final_size: u64,
    size_reduction: i64,
    dry_run: bool,
    executed: Vec<serde_json::Value>,
    rejected: Vec<serde_json::Value>,
    pruned: Vec<serde_json::Value>,
}

impl From<crate::controller::ConsolidationResult> for ConsolidationResultView {
    fn from(r: crate::controller::ConsolidationResult) -> Self {
        use crate::executor::DecisionOrigin;
        let origin_str = |o: DecisionOrigin| match o {
            DecisionOrigin::Auto => "auto",
            DecisionOrigin::Ai => "ai",
            DecisionOrigin::Heuristic => "heuristic",
        };
        Self {
            initial_size: r.initial_size,
            final_size: r.final_size,
            size_reduction: r.size_reduction,
            dry_run: r.dry_run,
            executed: r
                .executed
                .into_iter()
                .map(|m| {
                    serde_json::json!({
                        "deprecated": m.deprecated,
                        "target": m.target,
                        "similarity": m.similarity,
                        "rationale": m.rationale,
                        "edges_rewritten": m.edges_rewritten,
                        "origin": origin_str(m.origin),
                    })
                })
                .collect(),
            rejected: r
                .rejected
                .into_iter()
                .map(|c| serde_json::json!({ "description": c.description, "rationale": c.rationale }))
                .collect(),
            pruned: r
                .pruned
                .into_iter()
                .map(|p| serde_json::json!({ "name": p.name, "origin": origin_str(p.origin) }))
                .collect(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct ClassificationReportView {
    epoch: u64,
    classifications: Vec<serde_json::Value>,
}

impl From<crate::classifier::ClassificationReport> for ClassificationReportView {
    fn from(r: crate::classifier::ClassificationReport) -> Self {
        Self {
            epoch: r.epoch,
            classifications: r
                .classifications
                .into_iter()
                .map(|c| {
                    serde_json::json!({
                        "name": c.name.as_str(),
                        "status": format!("{:?}", c.status),
                        "mean": c.stats.mean,
                        "std": c.stats.std,
                        "count": c.stats.count,
                    })
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn build_engine(db_path: Option<PathBuf>, llm_orc_command: Option<String>) -> Result<VocabLifecycleEngine, String> {
    let path = db_path.unwrap_or_else(|| {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(".vocab-lifecycle.db")
    });
    let adapter = SqliteGraphAdapter::open(&path).map_err(|e| format!("failed to open database at {}: {e}", path.display()))?;
    let embedder = EmbeddingService::new(Box::new(crate::embedding::MockEmbeddingProvider::new(384)));
    let config_store = StaticConfigStore(VocabConfig::default());
    let profiles = InMemoryProfileStore::new();

    let reasoner: Box<dyn crate::reasoner::ReasoningProvider> = match llm_orc_command {
        Some(cmd) => Box::new(SubprocessReasoningProvider::new().with_command(cmd)),
        None => Box::new(MockReasoningProvider::unavailable()),
    };

    Ok(VocabLifecycleEngine::new(Box::new(adapter), embedder, reasoner, Box::new(config_store), Box::new(profiles)))
}

pub fn run_mcp_server(db_path: Option<PathBuf>, reasoner_command: Option<String>) -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {e}");
            return 1;
        }
    };

    rt.block_on(async {
        let engine = match build_engine(db_path, reasoner_command) {
            Ok(engine) => engine,
            Err(e) => {
                eprintln!("{e}");
                return 1;
            }
        };

        let server = VocabLifecycleMcpServer::new(Arc::new(engine));

        eprintln!("vocab-lifecycle mcp server starting on stdio...");

        let service = match server.serve(rmcp::transport::stdio()).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to start MCP server: {e}");
                return 1;
            }
        };

        if let Err(e) = service.waiting().await {
            eprintln!("MCP server error: {e}");
            return 1;
        }

        0
    })
}
