use anyhow::Result;
use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};

use crate::analyzers::arrival::remaining_by_line;
use crate::analyzers::bunching::detect_bunching;
use crate::analyzers::merge::{line_centroids, merge_latest};
use crate::analyzers::report::{ReportInput, build_report};
use crate::analyzers::stuck::{StuckThresholds, detect_stuck};
use crate::analyzers::types::{
    AnalysisResult, BunchEvent, LineCentroid, LineRemaining, PositionSample, StuckVehicleEvent,
};
use crate::catalog::LineCatalog;
use crate::config::DetectorConfig;
use crate::db;
use crate::output::write_records;

/// Which table the detectors read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Source {
    /// `analysis_results`, as rebuilt by the last merge
    #[default]
    Merged,
    /// `positions`, everything collected so far
    Raw,
}

/// Everything derived from one snapshot of the store.
#[derive(Debug)]
pub struct Analysis {
    pub stuck: Vec<StuckVehicleEvent>,
    pub bunches: Vec<BunchEvent>,
    pub remaining: Vec<LineRemaining>,
    pub report: String,
}

/// Runs both detectors and the delay estimate over an in-memory snapshot.
///
/// `results` only feeds the remaining-time section; pass an empty slice when
/// the detectors read raw positions.
pub fn analyse(
    samples: &[PositionSample],
    results: &[AnalysisResult],
    detectors: &DetectorConfig,
    catalog: &LineCatalog,
) -> Analysis {
    let thresholds = StuckThresholds {
        min_elapsed_minutes: detectors.stuck_min_elapsed_minutes,
        max_displacement_km: detectors.stuck_max_displacement_km,
    };

    let stuck = detect_stuck(samples, thresholds);
    let bunches = detect_bunching(
        samples,
        detectors.bunching_threshold_meters,
        detectors.bunching_strategy,
    );
    let remaining = remaining_by_line(results);

    let report = build_report(
        &ReportInput {
            samples,
            stuck: &stuck,
            bunches: &bunches,
            remaining: &remaining,
            bunching_threshold_meters: detectors.bunching_threshold_meters,
        },
        catalog,
    );

    Analysis {
        stuck,
        bunches,
        remaining,
        report,
    }
}

/// Rebuilds `analysis_results` from the raw tables and writes the per-line
/// centroids to `out_dir/line_centroids.csv`.
#[tracing::instrument(skip(pool, out_dir))]
pub async fn run_merge(
    pool: &SqlitePool,
    out_dir: &Path,
    analysed_at: NaiveDateTime,
) -> Result<Vec<LineCentroid>> {
    let positions = db::fetch_positions(pool).await?;
    let predictions = db::fetch_predictions(pool).await?;

    if positions.is_empty() {
        warn!("No positions collected yet, analysis table will be empty");
    }

    let results = merge_latest(&positions, &predictions, analysed_at);
    let saved = db::replace_analysis_results(pool, &results).await?;

    let centroids = line_centroids(&results);
    write_records(&out_dir.join("line_centroids.csv"), &centroids)?;

    info!(
        positions = positions.len(),
        predictions = predictions.len(),
        saved,
        with_prediction = results.iter().filter(|r| r.has_prediction()).count(),
        lines = centroids.len(),
        "Analysis table rebuilt"
    );
    Ok(centroids)
}

/// Loads the chosen source, analyses it and writes the CSVs plus `report.md`
/// into `out_dir`.
#[tracing::instrument(skip(pool, detectors, catalog, out_dir))]
pub async fn run_report(
    pool: &SqlitePool,
    detectors: &DetectorConfig,
    catalog: &LineCatalog,
    source: Source,
    out_dir: &Path,
) -> Result<Analysis> {
    let (samples, results) = match source {
        Source::Merged => {
            let results = db::fetch_analysis_results(pool).await?;
            let samples: Vec<PositionSample> =
                results.iter().map(AnalysisResult::to_position).collect();
            (samples, results)
        }
        Source::Raw => (db::fetch_positions(pool).await?, Vec::new()),
    };

    if samples.is_empty() {
        info!(?source, "Nothing to analyse");
    }

    let analysis = analyse(&samples, &results, detectors, catalog);

    write_records(&out_dir.join("stuck_vehicles.csv"), &analysis.stuck)?;
    write_records(&out_dir.join("bunch_events.csv"), &analysis.bunches)?;
    write_records(&out_dir.join("remaining_by_line.csv"), &analysis.remaining)?;
    std::fs::write(out_dir.join("report.md"), &analysis.report)?;

    info!(
        records = samples.len(),
        stuck = analysis.stuck.len(),
        bunches = analysis.bunches.len(),
        lines_with_predictions = analysis.remaining.len(),
        "Report written"
    );
    Ok(analysis)
}
