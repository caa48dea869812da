//! Health checks over the raw tables.

use chrono::{Duration, NaiveDateTime};
use sqlx::SqlitePool;
use std::fmt;
use tracing::{debug, info};

use crate::db::{self, RawTable};

#[derive(Debug, Clone, PartialEq)]
pub enum HealthProblem {
    Empty {
        table: &'static str,
    },
    Stale {
        table: &'static str,
        newest: NaiveDateTime,
        age_minutes: i64,
    },
    QueryFailed {
        table: &'static str,
        error: String,
    },
}

impl fmt::Display for HealthProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthProblem::Empty { table } => write!(f, "table `{table}` is empty"),
            HealthProblem::Stale {
                table,
                newest,
                age_minutes,
            } => write!(
                f,
                "table `{table}` has no new data for {age_minutes} minutes (newest batch {newest})"
            ),
            HealthProblem::QueryFailed { table, error } => {
                write!(f, "could not check table `{table}`: {error}")
            }
        }
    }
}

/// Checks `positions` and `predictions` for emptiness and staleness. A failed
/// query is reported as a problem, never raised.
///
/// A table counts as stale when its newest `collected_at` is strictly older
/// than `stale_after` at `now`.
pub async fn check_health(
    pool: &SqlitePool,
    now: NaiveDateTime,
    stale_after: Duration,
) -> Vec<HealthProblem> {
    let mut problems = Vec::new();

    for table in RawTable::ALL {
        let name = table.as_str();
        match db::latest_batch(pool, table).await {
            Ok(None) => problems.push(HealthProblem::Empty { table: name }),
            Ok(Some((collected_at, rows))) => {
                debug!(table = name, %collected_at, rows, "Latest batch");
                let age = now - collected_at;
                if age > stale_after {
                    problems.push(HealthProblem::Stale {
                        table: name,
                        newest: collected_at,
                        age_minutes: age.num_minutes(),
                    });
                }
            }
            Err(e) => problems.push(HealthProblem::QueryFailed {
                table: name,
                error: format!("{e:#}"),
            }),
        }
    }

    info!(problems = problems.len(), "Health check finished");
    problems
}
