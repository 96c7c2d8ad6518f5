//! The `generate` capability every backend exposes.

use async_trait::async_trait;

use crate::router::GenerationOptions;

/// Classified reason a backend call failed.
///
/// Decided once, where the raw backend error is translated; nothing
/// downstream inspects message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The backend ran out of working memory or context capacity.
    ResourceExhausted,
    /// Anything else: connectivity, timeout, unknown model, malformed response.
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ResourceExhausted => "resource_exhausted",
            FailureKind::Other => "other",
        }
    }

    /// Whether switching to the other backend can help.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FailureKind::ResourceExhausted)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed `generate` call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct BackendFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl BackendFailure {
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ResourceExhausted,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Other,
            message: message.into(),
        }
    }
}

/// Text produced by a successful `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
}

/// Trait for inference backends.
///
/// Object-safe so the dispatcher can hold either backend as
/// `Arc<dyn Generate>`.
#[async_trait]
pub trait Generate: Send + Sync {
    /// Run one non-streaming completion.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generated, BackendFailure>;
}
