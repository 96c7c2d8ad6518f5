//! The orchestration loop.

use sqlx::SqlitePool;
use std::time::Instant;

use super::report::{RequestReport, RunReport};
use crate::config::{Config, OnUnrecovered};
use crate::dispatch::{format_attempt_trail, DispatchError, Dispatcher};
use crate::error::Result;
use crate::router::{Registry, Request};
use crate::storage::{self, DispatchLog};

/// A run stopped by an unrecovered failure under [`OnUnrecovered::Abort`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("Run aborted at request {position}: {error}", position = .index + 1)]
pub struct RunAborted {
    /// Zero-based index of the request that aborted the run.
    pub index: u32,
    pub error: DispatchError,
    /// Reports for every request up to and including the failed one.
    pub partial: RunReport,
}

/// Feeds a request sequence through the dispatcher, one request at a time.
pub struct Orchestrator {
    dispatcher: Dispatcher,
    on_unrecovered: OnUnrecovered,
    db: Option<SqlitePool>,
}

impl Orchestrator {
    pub fn new(dispatcher: Dispatcher, on_unrecovered: OnUnrecovered) -> Self {
        Self {
            dispatcher,
            on_unrecovered,
            db: None,
        }
    }

    /// Build an orchestrator talking HTTP to the configured backends.
    ///
    /// Opens the dispatch log when a database is configured and
    /// `logging.log_dispatches` is set.
    pub async fn from_config(config: &Config, on_unrecovered: OnUnrecovered) -> Result<Self> {
        let registry = Registry::from_config(config)?;
        let dispatcher = Dispatcher::connect(registry)?;
        let mut orchestrator = Self::new(dispatcher, on_unrecovered);

        if config.logging.log_dispatches {
            if let Some(db) = &config.database {
                let pool = storage::init_pool(&db.path).await?;
                tracing::info!(path = %db.path, "Dispatch log enabled");
                orchestrator = orchestrator.with_dispatch_log(pool);
            }
        }

        Ok(orchestrator)
    }

    /// Record every dispatch in this database.
    pub fn with_dispatch_log(mut self, pool: SqlitePool) -> Self {
        self.db = Some(pool);
        self
    }

    /// Dispatch each request in order, each fully resolved before the next starts.
    pub async fn run<I, R>(&self, requests: I) -> std::result::Result<RunReport, RunAborted>
    where
        I: IntoIterator<Item = R>,
        R: Into<Request>,
    {
        self.run_with(requests, &mut Silent).await
    }

    /// Like [`Orchestrator::run`], handing every request report to `reporter`
    /// as soon as that request resolves.
    pub async fn run_with<I, R, P>(
        &self,
        requests: I,
        reporter: &mut P,
    ) -> std::result::Result<RunReport, RunAborted>
    where
        I: IntoIterator<Item = R>,
        R: Into<Request>,
        P: Reporter + ?Sized,
    {
        let mut report = RunReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            requests: Vec::new(),
        };

        tracing::info!(run_id = %report.run_id, policy = ?self.on_unrecovered, "Starting run");
        reporter.run_started(&report.run_id);

        for (index, request) in requests.into_iter().enumerate() {
            let index = index as u32;
            let request: Request = request.into();

            let start = Instant::now();
            let route = self.dispatcher.plan(&request);
            let outcome = self.dispatcher.dispatch(&request).await;
            let latency_ms = start.elapsed().as_millis() as i64;

            let request_report = RequestReport {
                index,
                cost: request.estimated_cost(),
                route,
                outcome,
                latency_ms,
            };

            if let Some(pool) = &self.db {
                dispatch_log(&report.run_id, &request_report)
                    .write_or_warn(pool)
                    .await;
            }

            reporter.request_finished(&request_report);

            let abort = match &request_report.outcome {
                Err(err) if err.is_unrecovered() => {
                    tracing::error!(request = index, error = %err, "Unrecovered failure");
                    self.on_unrecovered == OnUnrecovered::Abort
                }
                Err(err) => {
                    tracing::warn!(request = index, error = %err, "Request failed");
                    false
                }
                Ok(_) => false,
            };

            let error = match &request_report.outcome {
                Err(err) if abort => Some(err.clone()),
                _ => None,
            };

            report.requests.push(request_report);

            if let Some(error) = error {
                return Err(RunAborted {
                    index,
                    error,
                    partial: report,
                });
            }
        }

        tracing::info!(run_id = %report.run_id, summary = %report.summary(), "Run finished");
        Ok(report)
    }

    /// Whether dispatches are being recorded in a database.
    pub fn logs_dispatches(&self) -> bool {
        self.db.is_some()
    }
}

/// Receives results while a run is in progress.
pub trait Reporter {
    fn run_started(&mut self, _run_id: &str) {}

    /// Called once per request, after it resolved and before the next one starts.
    fn request_finished(&mut self, report: &RequestReport);
}

struct Silent;

impl Reporter for Silent {
    fn request_finished(&mut self, _report: &RequestReport) {}
}

/// Build the database row for one request report.
pub fn dispatch_log(run_id: &str, report: &RequestReport) -> DispatchLog {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match &report.outcome {
        Ok(completion) => DispatchLog {
            run_id: run_id.to_string(),
            timestamp,
            request_index: report.index,
            cost: report.cost,
            route: report.route.as_str().to_string(),
            tier: Some(completion.tier.as_str().to_string()),
            backend: Some(completion.backend.clone()),
            attempts: format_attempt_trail(&completion.attempts),
            success: true,
            failure_stage: None,
            failure_kind: None,
            error_message: None,
            latency_ms: report.latency_ms,
        },
        Err(err) => DispatchLog {
            run_id: run_id.to_string(),
            timestamp,
            request_index: report.index,
            cost: report.cost,
            route: report.route.as_str().to_string(),
            tier: None,
            backend: Some(err.backend.clone()),
            attempts: format_attempt_trail(&err.attempts),
            success: false,
            failure_stage: Some(err.stage.as_str().to_string()),
            failure_kind: Some(err.kind().as_str().to_string()),
            error_message: Some(err.failure.message.clone()),
            latency_ms: report.latency_ms,
        },
    }
}
