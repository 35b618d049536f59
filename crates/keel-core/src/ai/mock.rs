//! Mock backend for testing
//!
//! Returns a canned completion so tests and development run without a
//! live LLM server.

use async_trait::async_trait;

use super::AiBackend;
use crate::error::Result;

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// Completion text to return
    pub response: String,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            response: "Mock analysis: no significant concerns identified.".to_string(),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            response: String::new(),
        }
    }

    /// Create a mock backend with a fixed response
    pub fn with_response(response: &str) -> Self {
        Self {
            healthy: true,
            response: response.to_string(),
        }
    }
}

#[async_trait]
impl AiBackend for MockBackend {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
        // Echo a prefix of the input so tests can assert plumbing
        let preview: String = user_prompt.chars().take(40).collect();
        Ok(format!("{} [input: {}]", self.response, preview))
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_complete_echoes_input() {
        let backend = MockBackend::new();
        let result = backend
            .complete("system", "summarize this audit")
            .await
            .unwrap();
        assert!(result.contains("Mock analysis"));
        assert!(result.contains("summarize this audit"));
    }

    #[tokio::test]
    async fn test_mock_health() {
        assert!(MockBackend::new().health_check().await);
        assert!(!MockBackend::unhealthy().health_check().await);
    }

    #[tokio::test]
    async fn test_mock_custom_response() {
        let backend = MockBackend::with_response("custom text");
        let result = backend.complete("s", "u").await.unwrap();
        assert!(result.starts_with("custom text"));
    }
}
