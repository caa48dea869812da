//! Analysis over the collected samples.
//!
//! The merge step joins positions with predictions into `analysis_results`;
//! the detectors and the delay estimate read either that table or the raw
//! positions and feed the text report.

pub mod analyzer;
pub mod arrival;
pub mod bunching;
pub mod merge;
pub mod report;
pub mod stuck;
pub mod types;
pub mod utility;
