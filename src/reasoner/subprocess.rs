//! Production `ReasoningProvider`: spawns a reasoning MCP server and
//! communicates via MCP JSON-RPC over stdin/stdout.
//!
//! The subprocess is spawned lazily on first use and kept alive for the
//! lifetime of the provider. The MCP connection is guarded by a mutex so
//! concurrent callers are serialized — the Lifecycle Controller only ever
//! has one candidate in flight at a time anyway (spec §5).

use std::borrow::Cow;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, Content};
use rmcp::service::Peer;
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use tokio::sync::Mutex;

use super::{ReasonRequest, ReasonResponse, ReasonerError, ReasoningProvider};

/// Spawns `<command> mcp serve --transport stdio` and calls its `reason`
/// tool, passing a `ReasonRequest` as JSON arguments and parsing a
/// `ReasonResponse` back out of the tool's text content.
pub struct SubprocessReasoningProvider {
    command: String,
    peer: Mutex<Option<Peer<RoleClient>>>,
}

impl SubprocessReasoningProvider {
    pub fn new() -> Self {
        Self { command: "vocab-lifecycle-reasoner".to_string(), peer: Mutex::new(None) }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    async fn connect(&self) -> Result<Peer<RoleClient>, ReasonerError> {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.arg("mcp").arg("serve").arg("--transport").arg("stdio");

        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| ReasonerError::Unavailable(format!("failed to spawn {}: {e}", self.command)))?;

        let service = ().serve(transport).await.map_err(|e| ReasonerError::Unavailable(format!("MCP handshake failed: {e}")))?;

        Ok(service.peer().clone())
    }

    async fn get_peer(&self) -> Result<Peer<RoleClient>, ReasonerError> {
        let mut guard = self.peer.lock().await;
        if let Some(ref peer) = *guard {
            return Ok(peer.clone());
        }
        let peer = self.connect().await?;
        *guard = Some(peer.clone());
        Ok(peer)
    }

    async fn call_tool(&self, tool_name: &str, arguments: serde_json::Map<String, serde_json::Value>) -> Result<String, ReasonerError> {
        let peer = self.get_peer().await?;

        let result = peer
            .call_tool(CallToolRequestParams { meta: None, name: Cow::Owned(tool_name.to_string()), arguments: Some(arguments), task: None })
            .await
            .map_err(|e| ReasonerError::InvocationFailed(format!("MCP call_tool failed: {e}")))?;

        if result.is_error == Some(true) {
            return Err(ReasonerError::InvocationFailed(extract_text_content(&result.content)));
        }
        Ok(extract_text_content(&result.content))
    }
}

impl Default for SubprocessReasoningProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_text_content(content: &[Content]) -> String {
    content.iter().filter_map(|c| c.as_text().map(|tc| tc.text.as_str())).collect::<Vec<_>>().join("\n")
}

#[async_trait]
impl ReasoningProvider for SubprocessReasoningProvider {
    async fn is_available(&self) -> bool {
        self.get_peer().await.is_ok()
    }

    async fn reason(&self, request: &ReasonRequest) -> Result<ReasonResponse, ReasonerError> {
        let value = serde_json::to_value(request).map_err(|e| ReasonerError::InvocationFailed(format!("request serialization failed: {e}")))?;
        let args = match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("ReasonRequest always serializes to an object"),
        };

        let response_text = self.call_tool("reason", args).await?;
        serde_json::from_str(&response_text).map_err(|e| ReasonerError::ParseError(format!("failed to parse reason response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> ReasonRequest {
        ReasonRequest {
            type_a: "A".to_string(),
            type_b: Some("B".to_string()),
            similarity: Some(0.85),
            usage_a: 1,
            usage_b: Some(0),
            bridge_count_a: 0,
            bridge_count_b: Some(0),
            same_category: Some(true),
            instruction: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn reports_unavailable_when_binary_missing() {
        let provider = SubprocessReasoningProvider::new().with_command("__nonexistent_vocab_reasoner__");
        assert!(!provider.is_available().await);
    }

    #[tokio::test]
    async fn reason_fails_gracefully_when_binary_missing() {
        let provider = SubprocessReasoningProvider::new().with_command("__nonexistent_vocab_reasoner__");
        let err = provider.reason(&sample_request()).await.unwrap_err();
        assert!(matches!(err, ReasonerError::Unavailable(_)));
    }
}
