//! Translation of raw backend errors into [`FailureKind`].

use regex::Regex;
use std::sync::OnceLock;

use super::traits::{BackendFailure, FailureKind};

/// Error wording Ollama and llama.cpp use when VRAM or the context window
/// runs out.
///
/// The bare "OOM" shorthand only counts right after a device name or as an
/// OOM kill, so model names like `tinyllama-oom` stay `Other`.
const RESOURCE_EXHAUSTED_PATTERN: &str = concat!(
    r"(?i)out of memory",
    r"|\b(?:cuda|gpu|hip|rocm|metal)[ _]oom\b",
    r"|\boom[- ]kill",
    r"|context (?:length |window )?exceeded",
    r"|exceeds? (?:the )?(?:maximum )?context (?:length|window|size)",
    r"|failed to allocate",
    r"|insufficient (?:v?ram|memory)",
);

fn resource_exhausted_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(RESOURCE_EXHAUSTED_PATTERN).expect("resource-exhausted pattern is valid")
    })
}

/// Classify an error message reported by a backend.
pub fn classify_message(message: &str) -> FailureKind {
    if resource_exhausted_regex().is_match(message) {
        FailureKind::ResourceExhausted
    } else {
        FailureKind::Other
    }
}

/// Build a classified failure from an error the backend itself reported.
pub fn backend_reported(backend: &str, status: Option<u16>, message: &str) -> BackendFailure {
    let kind = classify_message(message);
    let message = match status {
        Some(code) => format!("Backend '{}' returned {}: {}", backend, code, message),
        None => format!("Backend '{}' reported: {}", backend, message),
    };
    BackendFailure { kind, message }
}

/// Build a failure for a request that never got a backend-reported answer.
///
/// Transport problems are never resource exhaustion, whatever the error text says.
pub fn transport(backend: &str, error: &reqwest::Error) -> BackendFailure {
    if error.is_timeout() {
        BackendFailure::other(format!("Backend '{}' timed out: {}", backend, error))
    } else if error.is_connect() {
        BackendFailure::other(format!("Failed to reach backend '{}': {}", backend, error))
    } else {
        BackendFailure::other(format!("Request to backend '{}' failed: {}", backend, error))
    }
}
