//! Dispatch log entries and their insertion.

use sqlx::SqlitePool;

/// A completed dispatch ready for database insertion.
#[derive(Debug, Clone)]
pub struct DispatchLog {
    pub run_id: String,
    pub timestamp: String,
    pub request_index: u32,
    pub cost: u64,
    pub route: String,
    pub tier: Option<String>,
    pub backend: Option<String>,
    pub attempts: Option<String>,
    pub success: bool,
    pub failure_stage: Option<String>,
    pub failure_kind: Option<String>,
    pub error_message: Option<String>,
    pub latency_ms: i64,
}

impl DispatchLog {
    /// Insert this log entry into the database.
    pub async fn insert(&self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO dispatches (
                run_id, timestamp, request_index, cost, route,
                tier, backend, attempts, success,
                failure_stage, failure_kind, error_message, latency_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.run_id)
        .bind(&self.timestamp)
        .bind(self.request_index as i64)
        .bind(self.cost as i64)
        .bind(&self.route)
        .bind(self.tier.as_deref())
        .bind(self.backend.as_deref())
        .bind(self.attempts.as_deref())
        .bind(self.success)
        .bind(self.failure_stage.as_deref())
        .bind(self.failure_kind.as_deref())
        .bind(self.error_message.as_deref())
        .bind(self.latency_ms)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Insert, logging instead of propagating a failure.
    ///
    /// A broken dispatch log never affects dispatch results.
    pub async fn write_or_warn(&self, pool: &SqlitePool) {
        if let Err(e) = self.insert(pool).await {
            tracing::warn!(
                run_id = %self.run_id,
                request_index = self.request_index,
                error = %e,
                "Failed to write dispatch log to database"
            );
        }
    }
}
