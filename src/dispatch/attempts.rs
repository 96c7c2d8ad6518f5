//! Per-request attempt tracking.

use crate::backend::FailureKind;
use crate::router::BackendRole;

/// How a single backend invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    Succeeded,
    Failed(FailureKind),
}

impl AttemptResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptResult::Succeeded => "ok",
            AttemptResult::Failed(kind) => kind.as_str(),
        }
    }
}

/// Record of one backend invocation made while dispatching a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub backend: String,
    pub role: BackendRole,
    pub result: AttemptResult,
}

/// Format attempt records as a trail, e.g. `"nvidia: resource_exhausted -> intel: ok"`.
///
/// Returns `None` if no backend was invoked.
pub fn format_attempt_trail(attempts: &[AttemptRecord]) -> Option<String> {
    if attempts.is_empty() {
        return None;
    }
    Some(
        attempts
            .iter()
            .map(|a| format!("{}: {}", a.backend, a.result.as_str()))
            .collect::<Vec<_>>()
            .join(" -> "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_attempt_trail_empty() {
        assert_eq!(format_attempt_trail(&[]), None);
    }

    #[test]
    fn test_format_attempt_trail_single() {
        let attempts = vec![AttemptRecord {
            backend: "nvidia".to_string(),
            role: BackendRole::HighCapacity,
            result: AttemptResult::Succeeded,
        }];
        assert_eq!(format_attempt_trail(&attempts), Some("nvidia: ok".to_string()));
    }

    #[test]
    fn test_format_attempt_trail_fallback() {
        let attempts = vec![
            AttemptRecord {
                backend: "nvidia".to_string(),
                role: BackendRole::HighCapacity,
                result: AttemptResult::Failed(FailureKind::ResourceExhausted),
            },
            AttemptRecord {
                backend: "intel".to_string(),
                role: BackendRole::Constrained,
                result: AttemptResult::Succeeded,
            },
        ];
        assert_eq!(
            format_attempt_trail(&attempts),
            Some("nvidia: resource_exhausted -> intel: ok".to_string())
        );
    }
}
