//! Analytics over the session store
//!
//! Read-only. Rates, costs, token totals and processing times cover completed
//! sessions only; sessions still `running` are reported as in flight.

use crate::error::{NotetionError, Result};
use crate::storage::SqliteStorage;
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;

/// Summary statistics over all stored sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    /// Completed sessions (succeeded + failed)
    pub total_sessions: u64,
    /// Sessions that produced a note
    pub successful_sessions: u64,
    /// Sessions that ended with a failure reason
    pub failed_sessions: u64,
    /// Sessions still running
    pub in_flight_sessions: u64,
    /// Percentage of completed sessions that succeeded, 0 when there are none
    pub success_rate: f64,
    /// Sum of estimated cost
    pub total_cost: f64,
    /// Sum of input tokens
    pub total_input_tokens: u64,
    /// Sum of output tokens
    pub total_output_tokens: u64,
    /// Mean processing time in seconds
    pub avg_processing_time: f64,
    /// Completed sessions per model
    pub per_model_counts: BTreeMap<String, u64>,
}

/// Read-only aggregator over a [`SqliteStorage`]
pub struct AnalyticsAggregator {
    storage: SqliteStorage,
}

impl AnalyticsAggregator {
    /// Create an aggregator reading from `storage`
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    /// Computes the summary from one consistent snapshot of the store
    ///
    /// # Examples
    ///
    /// ```
    /// use notetion::analytics::AnalyticsAggregator;
    /// use notetion::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("history.db")).unwrap();
    /// let summary = AnalyticsAggregator::new(storage).summary().unwrap();
    /// assert_eq!(summary.total_sessions, 0);
    /// assert_eq!(summary.success_rate, 0.0);
    /// ```
    pub fn summary(&self) -> Result<AnalyticsSummary> {
        self.storage.read(|tx| {
            let (succeeded, failed, running, total_cost, input, output, avg_time) = tx
                .query_row(
                    "SELECT
                        COALESCE(SUM(CASE WHEN status = 'succeeded' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status = 'running' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status != 'running' THEN estimated_cost END), 0.0),
                        COALESCE(SUM(CASE WHEN status != 'running' THEN input_tokens END), 0),
                        COALESCE(SUM(CASE WHEN status != 'running' THEN output_tokens END), 0),
                        AVG(CASE WHEN status != 'running' THEN processing_time END)
                     FROM sessions",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, f64>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, i64>(5)?,
                            row.get::<_, Option<f64>>(6)?,
                        ))
                    },
                )
                .context("Failed to aggregate sessions")
                .map_err(|e| NotetionError::Storage(format!("{:#}", e)))?;

            let mut stmt = tx
                .prepare(
                    "SELECT model, COUNT(*) FROM sessions
                     WHERE status != 'running' GROUP BY model",
                )
                .context("Failed to prepare statement")
                .map_err(|e| NotetionError::Storage(format!("{:#}", e)))?;
            let per_model_counts = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })
                .context("Failed to count sessions per model")
                .map_err(|e| NotetionError::Storage(format!("{:#}", e)))?
                .collect::<rusqlite::Result<BTreeMap<_, _>>>()
                .context("Failed to read model count")
                .map_err(|e| NotetionError::Storage(format!("{:#}", e)))?;

            let successful_sessions = succeeded as u64;
            let failed_sessions = failed as u64;
            let total_sessions = successful_sessions + failed_sessions;
            let success_rate = if total_sessions == 0 {
                0.0
            } else {
                successful_sessions as f64 / total_sessions as f64 * 100.0
            };

            Ok(AnalyticsSummary {
                total_sessions,
                successful_sessions,
                failed_sessions,
                in_flight_sessions: running as u64,
                success_rate,
                total_cost,
                total_input_tokens: input as u64,
                total_output_tokens: output as u64,
                avg_processing_time: avg_time.unwrap_or_default(),
                per_model_counts,
            })
        })
    }
}
