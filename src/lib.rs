//! vramroute - cost-based dispatch between two LLM backends
//!
//! This library routes text-generation requests to either a
//! capacity-constrained or a high-capacity backend by estimated cost, and
//! falls back once to the constrained backend when the high-capacity one
//! runs out of resources.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod router;
pub mod storage;

pub use config::Config;
pub use dispatch::{Completion, DispatchError, Dispatcher, Outcome, Tier};
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, RunReport};
pub use router::{Registry, Request};
