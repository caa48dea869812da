//! SQLite persistence for raw samples and merged analysis results.

use anyhow::Context;
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::info;

use crate::analyzers::types::{AnalysisResult, PositionSample, PredictionSample};

/// Tables fed by the collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTable {
    Positions,
    Predictions,
}

impl RawTable {
    pub const ALL: [RawTable; 2] = [RawTable::Positions, RawTable::Predictions];

    pub fn as_str(&self) -> &'static str {
        match self {
            RawTable::Positions => "positions",
            RawTable::Predictions => "predictions",
        }
    }
}

/// Opens (creating if needed) the database file at `path`.
pub async fn connect(path: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))?;

    info!(path = %path.display(), "Database opened");
    Ok(pool)
}

pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
    let migrator = sqlx::migrate!("./migrations");
    info!(migrations = migrator.migrations.len(), "Running migrations");
    migrator.run(pool).await?;
    Ok(())
}

/// Inserts a collection batch in one transaction.
pub async fn insert_positions(pool: &SqlitePool, samples: &[PositionSample]) -> anyhow::Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for sample in samples {
        let result = sqlx::query(
            r#"
            INSERT INTO positions
            (collected_at, vehicle_id, line_code, latitude, longitude, observed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sample.collected_at)
        .bind(sample.vehicle_id)
        .bind(&sample.line_code)
        .bind(sample.latitude)
        .bind(sample.longitude)
        .bind(sample.observed_at)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn insert_predictions(
    pool: &SqlitePool,
    samples: &[PredictionSample],
) -> anyhow::Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for sample in samples {
        let result = sqlx::query(
            r#"
            INSERT INTO predictions
            (collected_at, line_id, vehicle_id, stop_id, predicted_time)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(sample.collected_at)
        .bind(sample.line_id)
        .bind(sample.vehicle_id)
        .bind(sample.stop_id)
        .bind(&sample.predicted_time)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn fetch_positions(pool: &SqlitePool) -> anyhow::Result<Vec<PositionSample>> {
    let rows = sqlx::query(
        "SELECT collected_at, vehicle_id, line_code, latitude, longitude, observed_at \
         FROM positions ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut samples = Vec::with_capacity(rows.len());
    for row in rows {
        samples.push(PositionSample {
            vehicle_id: row.try_get("vehicle_id")?,
            line_code: row.try_get("line_code")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            observed_at: row.try_get("observed_at")?,
            collected_at: row.try_get("collected_at")?,
        });
    }

    Ok(samples)
}

pub async fn fetch_predictions(pool: &SqlitePool) -> anyhow::Result<Vec<PredictionSample>> {
    let rows = sqlx::query(
        "SELECT collected_at, line_id, vehicle_id, stop_id, predicted_time \
         FROM predictions ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut samples = Vec::with_capacity(rows.len());
    for row in rows {
        samples.push(PredictionSample {
            collected_at: row.try_get("collected_at")?,
            line_id: row.try_get("line_id")?,
            vehicle_id: row.try_get("vehicle_id")?,
            stop_id: row.try_get("stop_id")?,
            predicted_time: row.try_get("predicted_time")?,
        });
    }

    Ok(samples)
}

pub async fn fetch_analysis_results(pool: &SqlitePool) -> anyhow::Result<Vec<AnalysisResult>> {
    let rows = sqlx::query(
        "SELECT analysed_at, collected_at, vehicle_id, line_code, latitude, longitude, \
         observed_at, next_stop_id, predicted_time \
         FROM analysis_results ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        results.push(AnalysisResult {
            analysed_at: row.try_get("analysed_at")?,
            collected_at: row.try_get("collected_at")?,
            vehicle_id: row.try_get("vehicle_id")?,
            line_code: row.try_get("line_code")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            observed_at: row.try_get("observed_at")?,
            next_stop_id: row.try_get("next_stop_id")?,
            predicted_time: row.try_get("predicted_time")?,
        });
    }

    Ok(results)
}

/// Rebuilds `analysis_results` wholesale: the delete and the inserts commit together.
pub async fn replace_analysis_results(
    pool: &SqlitePool,
    results: &[AnalysisResult],
) -> anyhow::Result<u64> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM analysis_results")
        .execute(&mut *tx)
        .await?;

    let mut inserted = 0u64;
    for result in results {
        let done = sqlx::query(
            r#"
            INSERT INTO analysis_results
            (analysed_at, collected_at, vehicle_id, line_code, latitude, longitude,
             observed_at, next_stop_id, predicted_time)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.analysed_at)
        .bind(result.collected_at)
        .bind(result.vehicle_id)
        .bind(&result.line_code)
        .bind(result.latitude)
        .bind(result.longitude)
        .bind(result.observed_at)
        .bind(result.next_stop_id)
        .bind(&result.predicted_time)
        .execute(&mut *tx)
        .await?;

        inserted += done.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Newest `collected_at` of `table` and the number of rows in that batch.
pub async fn latest_batch(
    pool: &SqlitePool,
    table: RawTable,
) -> anyhow::Result<Option<(NaiveDateTime, i64)>> {
    // table names cannot be bound; `as_str` only yields fixed identifiers
    let query = format!(
        "SELECT collected_at, COUNT(*) AS batch_size FROM {0} \
         WHERE collected_at = (SELECT MAX(collected_at) FROM {0}) \
         GROUP BY collected_at",
        table.as_str()
    );

    let row = sqlx::query(&query).fetch_optional(pool).await?;
    match row {
        Some(row) => Ok(Some((row.try_get("collected_at")?, row.try_get("batch_size")?))),
        None => Ok(None),
    }
}
