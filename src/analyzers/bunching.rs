//! Bus-bunching detection.
//!
//! Samples are partitioned by `(collected_at, line_code)` and every pair of
//! vehicles in a partition closer than the threshold produces one event.
//! Two rows of the same vehicle never form a pair.
//!
//! Two strategies are available:
//! - [`BunchingStrategy::Exhaustive`] compares all pairs (quadratic per partition).
//! - [`BunchingStrategy::AdjacentByLatitude`] sorts a partition by latitude and
//!   compares neighbours only. It is `O(n log n)` but misses close pairs that
//!   are not adjacent after sorting, and reports at most `n - 1` events per
//!   partition. Both agree on partitions of two vehicles.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::analyzers::types::{BunchEvent, PositionSample};
use crate::analyzers::utility::great_circle_m;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BunchingStrategy {
    #[default]
    Exhaustive,
    AdjacentByLatitude,
}

pub fn detect_bunching(
    samples: &[PositionSample],
    threshold_meters: f64,
    strategy: BunchingStrategy,
) -> Vec<BunchEvent> {
    let mut partitions: BTreeMap<(NaiveDateTime, &str), Vec<&PositionSample>> = BTreeMap::new();
    for sample in samples {
        partitions
            .entry((sample.collected_at, sample.line_code.as_str()))
            .or_default()
            .push(sample);
    }

    let mut events = Vec::new();

    for ((timestamp, line_code), mut group) in partitions {
        if group.len() < 2 {
            continue;
        }

        let mut emit = |a: &PositionSample, b: &PositionSample| {
            if a.vehicle_id == b.vehicle_id {
                return;
            }
            let distance_m = great_circle_m(a.latitude, a.longitude, b.latitude, b.longitude);
            if distance_m < threshold_meters {
                events.push(BunchEvent {
                    line_code: line_code.to_string(),
                    timestamp,
                    vehicle_a: a.vehicle_id,
                    vehicle_b: b.vehicle_id,
                    distance_m,
                });
            }
        };

        match strategy {
            BunchingStrategy::Exhaustive => {
                group.sort_by_key(|s| s.vehicle_id);
                for (i, a) in group.iter().enumerate() {
                    for b in &group[i + 1..] {
                        emit(*a, *b);
                    }
                }
            }
            BunchingStrategy::AdjacentByLatitude => {
                group.sort_by(|a, b| {
                    a.latitude
                        .total_cmp(&b.latitude)
                        .then(a.vehicle_id.cmp(&b.vehicle_id))
                });
                for pair in group.windows(2) {
                    let (a, b) = if pair[0].vehicle_id <= pair[1].vehicle_id {
                        (pair[0], pair[1])
                    } else {
                        (pair[1], pair[0])
                    };
                    emit(a, b);
                }
            }
        }
    }

    events
}
