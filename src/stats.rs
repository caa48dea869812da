use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which collector produced a [`CollectionStats`] row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collector {
    #[default]
    Positions,
    Predictions,
}

/// Summary of one collection cycle, appended to the stats CSV.
#[derive(Debug, Default, Serialize)]
pub struct CollectionStats {
    pub timestamp: DateTime<Utc>,
    pub collector: Collector,

    // payload
    pub lines_in_payload: usize,
    pub vehicles_in_payload: usize,

    // after filtering
    pub records_selected: usize,
    pub records_saved: u64,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl CollectionStats {
    pub fn new(collector: Collector) -> Self {
        CollectionStats {
            timestamp: Utc::now(),
            collector,
            ..Default::default()
        }
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(collector: Collector, error_type: &str, error_message: &str) -> Self {
        CollectionStats {
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Self::new(collector)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_type.is_some()
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of the payload's vehicles that belonged to target lines.
    pub fn selected_pct(&self) -> f64 {
        Self::pct(self.records_selected, self.vehicles_in_payload)
    }
}
