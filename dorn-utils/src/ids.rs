//! Module producing filesystem-compatible identifiers for sweeps and samples.

use chrono::Local;

/// Produces a timestamp `String` of the current time in YYYY-MM-DD_HH-mm-SS format.
pub fn get_timestamp() -> String {
    Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Identifier for a single run's failure sample, unique within one sweep.
pub fn sample_id(region: &str, probability: f64, run: usize) -> String {
    format!("{}_{probability:.1}_run{run}", region.replace(' ', "_"))
}
