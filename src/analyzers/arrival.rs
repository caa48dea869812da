//! Arrival-time normalization and remaining travel time per line.
//!
//! Predictions carry a bare time of day. It is anchored to the calendar date of
//! the position observation; when that lands earlier in the day than the
//! observation the prediction is taken to be for the next day. Only one
//! midnight crossing is corrected, so stale predictions can still yield
//! negative remaining times. Those are counted, not rejected.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

use crate::analyzers::types::{AnalysisResult, LineRemaining};
use crate::analyzers::utility::{mean, stddev};

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
}

/// Anchors `predicted` to the date of `observed_at`, rolling over to the next
/// day when the prediction is earlier in the day than the observation.
pub fn normalize_arrival(observed_at: NaiveDateTime, predicted: NaiveTime) -> NaiveDateTime {
    let candidate = observed_at.date().and_time(predicted);
    if predicted < observed_at.time() {
        candidate + Duration::days(1)
    } else {
        candidate
    }
}

pub fn minutes_remaining(observed_at: NaiveDateTime, predicted_at: NaiveDateTime) -> f64 {
    (predicted_at - observed_at).num_seconds() as f64 / 60.0
}

/// Minutes remaining for a merged row, if it has a parseable prediction.
pub fn remaining_for(result: &AnalysisResult) -> Option<f64> {
    let predicted = parse_time_of_day(result.predicted_time.as_deref()?)?;
    let arrival = normalize_arrival(result.observed_at, predicted);
    Some(minutes_remaining(result.observed_at, arrival))
}

/// Mean and spread of remaining travel time per line, ascending by mean.
pub fn remaining_by_line(results: &[AnalysisResult]) -> Vec<LineRemaining> {
    let mut per_line: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for result in results {
        if let Some(minutes) = remaining_for(result) {
            per_line
                .entry(result.line_code.as_str())
                .or_default()
                .push(minutes);
        }
    }

    let mut lines: Vec<LineRemaining> = per_line
        .into_iter()
        .map(|(line_code, series)| {
            let avg = mean(&series);
            LineRemaining {
                line_code: line_code.to_string(),
                avg_minutes: avg,
                stddev_minutes: stddev(&series, avg),
                samples: series.len(),
                negative: series.iter().filter(|m| **m < 0.0).count(),
            }
        })
        .collect();

    lines.sort_by(|a, b| a.avg_minutes.total_cmp(&b.avg_minutes));
    lines
}
