// DORN: Evaluation of Overlay Routing Resilience under Regional Disaster Scenarios
// Copyright (C) 2024-2025 Roland Schmid <roschmi@ethz.ch> and Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Module defining record data types to (de-)serialize per-trial telemetry.
use std::{fs, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{failures::FailureSample, sim::TrialReport};

/// One row of the sweep summary CSV.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrialRecord {
    /// Human-readable timestamp when the trial was started.
    pub execution_timestamp: String,
    pub region: String,
    pub probability: f64,
    pub run: usize,
    pub heuristic: String,
    pub failed_nodes: usize,
    pub failed_links: usize,
    pub server: u32,
    pub clients_total: u64,
    pub clients_served: u64,
    pub packets_sent: u64,
    pub packets_forwarded: u64,
    pub acks_received: u64,
    /// Wall-clock duration of the trial in seconds.
    pub t_trial: f64,
    pub trace_file: String,
}

/// A failure sample persisted next to the run's trace files.
#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct PersistedSample {
    /// The identifier of this sample within its sweep.
    pub sample_id: String,
    #[serde(flatten)]
    pub sample: FailureSample,
}

impl PersistedSample {
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let file = fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let file = fs::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Write a trial's report into its trace file.
pub fn write_trial_report(
    path: impl AsRef<Path>,
    report: &TrialReport,
) -> Result<(), std::io::Error> {
    let file = fs::File::create(path.as_ref())?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
