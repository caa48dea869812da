use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

use crate::analyzers::types::{AnalysisResult, LineCentroid, PositionSample, PredictionSample};
use crate::analyzers::utility::mean;

/// Joins every position row with one prediction for its vehicle.
///
/// Predictions are reduced to one per vehicle, keeping the earliest
/// `predicted_time` text; ties go to the row collected first. Rows without a
/// prediction keep null prediction columns. Output follows position order and
/// carries `analysed_at` unchanged, so identical inputs give identical output.
pub fn merge_latest(
    positions: &[PositionSample],
    predictions: &[PredictionSample],
    analysed_at: NaiveDateTime,
) -> Vec<AnalysisResult> {
    let mut best: HashMap<i64, &PredictionSample> = HashMap::new();
    for prediction in predictions {
        // a prediction with no time would sort first but carries nothing
        if prediction.predicted_time.is_none() {
            continue;
        }
        best.entry(prediction.vehicle_id)
            .and_modify(|current| {
                if prediction.predicted_time < current.predicted_time {
                    *current = prediction;
                }
            })
            .or_insert(prediction);
    }

    positions
        .iter()
        .map(|position| {
            let prediction = best.get(&position.vehicle_id);
            AnalysisResult {
                analysed_at,
                collected_at: position.collected_at,
                vehicle_id: position.vehicle_id,
                line_code: position.line_code.clone(),
                latitude: position.latitude,
                longitude: position.longitude,
                observed_at: position.observed_at,
                next_stop_id: prediction.and_then(|p| p.stop_id),
                predicted_time: prediction.and_then(|p| p.predicted_time.clone()),
            }
        })
        .collect()
}

/// Mean position per line over rows that have a prediction, by line code.
pub fn line_centroids(results: &[AnalysisResult]) -> Vec<LineCentroid> {
    let mut per_line: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();

    for result in results.iter().filter(|r| r.has_prediction()) {
        let (lats, lons) = per_line.entry(result.line_code.as_str()).or_default();
        lats.push(result.latitude);
        lons.push(result.longitude);
    }

    per_line
        .into_iter()
        .map(|(line_code, (lats, lons))| LineCentroid {
            line_code: line_code.to_string(),
            avg_latitude: mean(&lats),
            avg_longitude: mean(&lons),
            records: lats.len(),
        })
        .collect()
}
