//! Queries over the dispatch log.

use sqlx::SqlitePool;

/// A single dispatch log row from the database.
#[derive(Debug, sqlx::FromRow)]
pub struct LogRow {
    pub id: i64,
    pub run_id: String,
    pub timestamp: String,
    pub request_index: i64,
    pub cost: i64,
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

/// Fetch the most recent dispatches, newest first.
pub async fn recent_dispatches(pool: &SqlitePool, limit: u32) -> Result<Vec<LogRow>, sqlx::Error> {
    sqlx::query_as::<_, LogRow>(
        "SELECT id, run_id, timestamp, request_index, cost, route, tier, backend,
                attempts, success, failure_stage, failure_kind, error_message, latency_ms
         FROM dispatches
         ORDER BY id DESC
         LIMIT ?",
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await
}
