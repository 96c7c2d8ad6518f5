//! Per-request and per-run reports.

use std::fmt;

use crate::dispatch::{format_attempt_trail, Outcome, Tier};
use crate::router::Route;

/// Result of one request in a run.
#[derive(Debug, Clone)]
pub struct RequestReport {
    /// Zero-based position in the request sequence.
    pub index: u32,
    pub cost: u64,
    pub route: Route,
    pub outcome: Outcome,
    pub latency_ms: i64,
}

/// Counts over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub primary: usize,
    pub initial_fallback: usize,
    pub emergency_fallback: usize,
    pub failed: usize,
    /// Subset of `failed` that never reached a fallback.
    pub unrecovered: usize,
}

/// Everything a run produced, in request order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub requests: Vec<RequestReport>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.requests.len(),
            ..Default::default()
        };
        for report in &self.requests {
            match &report.outcome {
                Ok(completion) => match completion.tier {
                    Tier::Primary => summary.primary += 1,
                    Tier::InitialFallback => summary.initial_fallback += 1,
                    Tier::EmergencyFallback => summary.emergency_fallback += 1,
                },
                Err(err) => {
                    summary.failed += 1;
                    if err.is_unrecovered() {
                        summary.unrecovered += 1;
                    }
                }
            }
        }
        summary
    }
}

impl fmt::Display for RequestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "--- request {} (cost {}, route {}, {} ms) ---",
            self.index + 1,
            self.cost,
            self.route,
            self.latency_ms
        )?;
        match &self.outcome {
            Ok(completion) => {
                writeln!(f, "[{} via {}]", completion.tier, completion.backend)?;
                writeln!(f, "{}", completion.text.trim_end())
            }
            Err(err) => {
                writeln!(f, "[FAILED {} via {}]", err.stage, err.backend)?;
                if let Some(trail) = format_attempt_trail(&err.attempts) {
                    writeln!(f, "attempts: {}", trail)?;
                }
                writeln!(f, "{}", err.failure)
            }
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests: {} primary, {} initial fallback, {} emergency fallback, {} failed ({} unrecovered)",
            self.total,
            self.primary,
            self.initial_fallback,
            self.emergency_fallback,
            self.failed,
            self.unrecovered
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== run {} ===", self.run_id)?;
        for report in &self.requests {
            writeln!(f)?;
            write!(f, "{}", report)?;
        }
        writeln!(f)?;
        writeln!(f, "=== {} ===", self.summary())
    }
}
