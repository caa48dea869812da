//! Data types shared by the collectors, the store and the analyzers.

use chrono::NaiveDateTime;
use serde::Serialize;

/// One observed vehicle location at one moment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSample {
    pub vehicle_id: i64,
    pub line_code: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Source clock of the observation (`ta`).
    pub observed_at: NaiveDateTime,
    /// Local time of the collection cycle; shared by every row of a batch.
    pub collected_at: NaiveDateTime,
}

/// One predicted arrival of a vehicle at a stop, as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSample {
    pub collected_at: NaiveDateTime,
    pub line_id: i64,
    pub vehicle_id: i64,
    pub stop_id: Option<i64>,
    /// Time of day without a date, e.g. `"23:51"`.
    pub predicted_time: Option<String>,
}

/// A position row joined with the most relevant prediction for its vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub analysed_at: NaiveDateTime,
    pub collected_at: NaiveDateTime,
    pub vehicle_id: i64,
    pub line_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub observed_at: NaiveDateTime,
    pub next_stop_id: Option<i64>,
    pub predicted_time: Option<String>,
}

impl AnalysisResult {
    pub fn has_prediction(&self) -> bool {
        self.next_stop_id.is_some() && self.predicted_time.is_some()
    }

    pub fn to_position(&self) -> PositionSample {
        PositionSample {
            vehicle_id: self.vehicle_id,
            line_code: self.line_code.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            observed_at: self.observed_at,
            collected_at: self.collected_at,
        }
    }
}

/// A vehicle that barely moved over its observed window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StuckVehicleEvent {
    pub vehicle_id: i64,
    pub line_code: String,
    pub elapsed_minutes: f64,
    pub displacement_km: f64,
}

/// Two same-line vehicles seen too close together in one collection batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BunchEvent {
    pub line_code: String,
    pub timestamp: NaiveDateTime,
    pub vehicle_a: i64,
    pub vehicle_b: i64,
    pub distance_m: f64,
}

/// Event count for one line, labelled with its catalog description when known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineCount {
    pub line_code: String,
    pub line_name: String,
    pub count: usize,
}

/// Mean position of the predicted rows of one line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineCentroid {
    pub line_code: String,
    pub avg_latitude: f64,
    pub avg_longitude: f64,
    pub records: usize,
}

/// Remaining travel time statistics for one line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRemaining {
    pub line_code: String,
    pub avg_minutes: f64,
    pub stddev_minutes: f64,
    pub samples: usize,
    /// Rows whose normalized arrival still lands before the observation.
    pub negative: usize,
}
