//! Stuck-vehicle detection.
//!
//! Each vehicle's samples are ordered by observation time and only the first
//! and last are compared. A vehicle that drives off and returns to its starting
//! point inside the window is indistinguishable from one that never moved.

use std::collections::BTreeMap;

use crate::analyzers::types::{PositionSample, StuckVehicleEvent};
use crate::analyzers::utility::great_circle_km;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StuckThresholds {
    /// Flag only when strictly more minutes than this elapsed.
    pub min_elapsed_minutes: f64,
    /// Flag only when displacement is strictly below this.
    pub max_displacement_km: f64,
}

impl Default for StuckThresholds {
    fn default() -> Self {
        Self {
            min_elapsed_minutes: 10.0,
            max_displacement_km: 0.1,
        }
    }
}

/// Returns one event per flagged vehicle, longest elapsed time first.
///
/// Vehicles with a single sample are skipped.
pub fn detect_stuck(samples: &[PositionSample], thresholds: StuckThresholds) -> Vec<StuckVehicleEvent> {
    let mut by_vehicle: BTreeMap<i64, Vec<&PositionSample>> = BTreeMap::new();
    for sample in samples {
        by_vehicle.entry(sample.vehicle_id).or_default().push(sample);
    }

    let mut events: Vec<StuckVehicleEvent> = by_vehicle
        .into_iter()
        .filter_map(|(vehicle_id, mut group)| {
            if group.len() < 2 {
                return None;
            }
            // stable: equal timestamps keep insertion order
            group.sort_by_key(|s| s.observed_at);

            let first = group.first()?;
            let last = group.last()?;
            let elapsed_minutes = (last.observed_at - first.observed_at).num_seconds() as f64 / 60.0;
            let displacement_km =
                great_circle_km(first.latitude, first.longitude, last.latitude, last.longitude);

            (elapsed_minutes > thresholds.min_elapsed_minutes
                && displacement_km < thresholds.max_displacement_km)
                .then(|| StuckVehicleEvent {
                    vehicle_id,
                    line_code: first.line_code.clone(),
                    elapsed_minutes,
                    displacement_km,
                })
        })
        .collect();

    events.sort_by(|a, b| {
        b.elapsed_minutes
            .total_cmp(&a.elapsed_minutes)
            .then(a.vehicle_id.cmp(&b.vehicle_id))
    });
    events
}
