//! Router module for backend selection.
//!
//! This module handles choosing a backend for a request based on:
//! - The request's estimated cost
//! - The constrained backend's admission threshold

pub mod estimator;
pub mod registry;
mod selector;

pub use estimator::{estimate_cost, Request};
pub use registry::{BackendDescriptor, BackendRole, GenerationOptions, Registry};
pub use selector::{select_route, Route};
