use std::collections::{BTreeSet, HashMap};
use std::fmt::Write;

use crate::analyzers::types::{
    BunchEvent, LineCount, LineRemaining, PositionSample, StuckVehicleEvent,
};
use crate::catalog::LineCatalog;

/// Counts events per line code, most frequent first (ties by code).
pub fn count_by_line<'a>(
    line_codes: impl IntoIterator<Item = &'a str>,
    catalog: &LineCatalog,
) -> Vec<LineCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for code in line_codes {
        *counts.entry(code).or_insert(0) += 1;
    }

    let mut lines: Vec<LineCount> = counts
        .into_iter()
        .map(|(line_code, count)| LineCount {
            line_code: line_code.to_string(),
            line_name: catalog.describe(line_code),
            count,
        })
        .collect();

    lines.sort_by(|a, b| b.count.cmp(&a.count).then(a.line_code.cmp(&b.line_code)));
    lines
}

/// Everything the text report needs, computed once by the caller.
pub struct ReportInput<'a> {
    pub samples: &'a [PositionSample],
    pub stuck: &'a [StuckVehicleEvent],
    pub bunches: &'a [BunchEvent],
    pub remaining: &'a [LineRemaining],
    pub bunching_threshold_meters: f64,
}

pub fn build_report(input: &ReportInput<'_>, catalog: &LineCatalog) -> String {
    let mut output = String::new();

    let distinct_lines: BTreeSet<&str> =
        input.samples.iter().map(|s| s.line_code.as_str()).collect();

    let _ = writeln!(output, "# Bus Anomaly Report");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Records analysed: {}", input.samples.len());
    let _ = writeln!(output, "- Lines monitored: {}", distinct_lines.len());
    let _ = writeln!(output, "- Stuck vehicles: {}", input.stuck.len());
    let _ = writeln!(output, "- Bunching events: {}", input.bunches.len());

    let _ = writeln!(output);
    let _ = writeln!(output, "## Stuck Vehicles by Line");
    if input.stuck.is_empty() {
        let _ = writeln!(
            output,
            "No vehicle stayed put long enough to be flagged."
        );
    } else {
        let counts = count_by_line(input.stuck.iter().map(|e| e.line_code.as_str()), catalog);
        for line in &counts {
            let _ = writeln!(output, "- {}: {} vehicles", line.line_name, line.count);
        }
        let _ = writeln!(output);
        for event in input.stuck.iter().take(10) {
            let _ = writeln!(
                output,
                "- vehicle {} ({}) {:.1} min, {:.3} km",
                event.vehicle_id, event.line_code, event.elapsed_minutes, event.displacement_km
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Bunching by Line");
    if input.bunches.is_empty() {
        let _ = writeln!(
            output,
            "No vehicles of the same line were within {:.0} m of each other.",
            input.bunching_threshold_meters
        );
    } else {
        let counts = count_by_line(input.bunches.iter().map(|e| e.line_code.as_str()), catalog);
        for line in &counts {
            let _ = writeln!(output, "- {}: {} events", line.line_name, line.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Remaining Travel Time by Line");
    if input.remaining.is_empty() {
        let _ = writeln!(output, "No predictions available for this window.");
    } else {
        for line in input.remaining {
            let _ = write!(
                output,
                "- {}: {:.1} min (sd {:.1}) over {} predictions",
                catalog.describe(&line.line_code),
                line.avg_minutes,
                line.stddev_minutes,
                line.samples
            );
            if line.negative > 0 {
                let _ = write!(output, ", {} negative", line.negative);
            }
            let _ = writeln!(output);
        }
    }

    output
}
