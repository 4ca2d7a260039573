//! Mock reasoning provider for tests — returns preconfigured responses.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{ReasonRequest, ReasonResponse, ReasonerError, ReasoningProvider};

pub struct MockReasoningProvider {
    available: bool,
    responses: HashMap<String, Result<ReasonResponse, ReasonerError>>,
}

impl MockReasoningProvider {
    pub fn available() -> Self {
        Self { available: true, responses: HashMap::new() }
    }

    pub fn unavailable() -> Self {
        Self { available: false, responses: HashMap::new() }
    }

    /// Register a canned response, keyed by `request.type_a`.
    pub fn with_response(mut self, type_a: impl Into<String>, response: ReasonResponse) -> Self {
        self.responses.insert(type_a.into(), Ok(response));
        self
    }

    pub fn with_failure(mut self, type_a: impl Into<String>, error: ReasonerError) -> Self {
        self.responses.insert(type_a.into(), Err(error));
        self
    }
}

#[async_trait]
impl ReasoningProvider for MockReasoningProvider {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn reason(&self, request: &ReasonRequest) -> Result<ReasonResponse, ReasonerError> {
        if !self.available {
            return Err(ReasonerError::Unavailable("mock provider configured as unavailable".to_string()));
        }
        match self.responses.get(&request.type_a) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(_)) => Err(ReasonerError::InvocationFailed(format!(
                "mock failure for type '{}'",
                request.type_a
            ))),
            None => Err(ReasonerError::ParseError(format!("no mock response registered for '{}'", request.type_a))),
        }
    }
}
