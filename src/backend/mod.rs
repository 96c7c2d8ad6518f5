//! Inference backends.
//!
//! Defines the `generate` contract, the Ollama-compatible HTTP client, and
//! the boundary classifier that turns raw backend errors into a
//! [`FailureKind`].

pub mod classify;
mod ollama;
mod traits;

pub use ollama::OllamaBackend;
pub use traits::{BackendFailure, FailureKind, Generate, Generated};
