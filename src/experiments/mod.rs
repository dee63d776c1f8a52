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
//! Module facilitating to run failure sweeps over all configured scenarios.
use std::{fmt, path::PathBuf};

use itertools::{iproduct, Itertools};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{sim::SimTime, topology::TopologySettings};

pub mod heuristics;
pub mod runner;

pub use heuristics::*;
pub use runner::*;

/// The full configuration surface of one sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Names of the disaster regions to sweep over.
    pub regions: Vec<String>,
    /// Failure probabilities to sweep over.
    pub probabilities: Vec<f64>,
    pub heuristics: Vec<Heuristic>,
    pub runs_per_config: usize,
    /// Offset added to the run index in trace file names, so several sweeps
    /// can fill one results directory.
    pub start_run_offset: usize,
    /// Contacts each overlay client attempts per trial.
    pub contact_attempts: u32,
    pub timeout: SimTime,
    /// Device count a node must have to become a server candidate.
    pub server_degree: u32,
    /// Device count ceiling for overlay participation; `0` admits all nodes.
    pub overlay_degree_max: u32,
    pub client_start: SimTime,
    pub server_start: SimTime,
    pub app_stop: SimTime,
    pub sim_length: SimTime,
    pub output_root: PathBuf,
    /// Stem of the topology input file, first component of every trace path.
    pub topology_stem: String,
    /// Fixed seed for reproduction; seeded from the wall clock when absent.
    pub seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            probabilities: Vec::new(),
            heuristics: Vec::new(),
            runs_per_config: 1,
            start_run_offset: 0,
            contact_attempts: 10,
            timeout: SimTime::from_secs(5.0),
            server_degree: 2,
            overlay_degree_max: 0,
            client_start: SimTime::from_secs(2.0),
            server_start: SimTime::from_secs(1.0),
            app_stop: SimTime::from_secs(30.0),
            sim_length: SimTime::from_secs(10.0),
            output_root: PathBuf::from("dorn_output"),
            topology_stem: String::new(),
            seed: None,
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.regions.is_empty() {
            return Err(ExperimentError::InvalidConfig("no regions configured".into()));
        }
        if self.heuristics.is_empty() {
            return Err(ExperimentError::InvalidConfig(
                "no heuristics configured".into(),
            ));
        }
        if self.probabilities.is_empty() {
            return Err(ExperimentError::InvalidConfig(
                "no failure probabilities configured".into(),
            ));
        }
        if let Some(p) = self
            .probabilities
            .iter()
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            return Err(ExperimentError::InvalidConfig(format!(
                "failure probability {p} is outside [0, 1]"
            )));
        }
        if self.runs_per_config == 0 {
            return Err(ExperimentError::InvalidConfig(
                "runs_per_config must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The probability list sorted and deduplicated.
    pub fn normalized_probabilities(&self) -> Vec<f64> {
        self.probabilities
            .iter()
            .map(|p| OrderedFloat(*p))
            .sorted()
            .dedup()
            .map(|p| p.0)
            .collect()
    }

    pub fn topology_settings(&self) -> TopologySettings {
        TopologySettings {
            regions: self.regions.clone(),
            server_degree: self.server_degree,
            overlay_degree_max: self.overlay_degree_max,
        }
    }

    /// Enumerate all scenario keys of this sweep, outer to inner:
    /// region, probability, run, heuristic.
    pub fn scenarios(&self) -> Vec<ScenarioKey> {
        iproduct!(
            &self.regions,
            self.normalized_probabilities(),
            0..self.runs_per_config,
            &self.heuristics
        )
        .map(|(region, probability, run, heuristic)| ScenarioKey {
            region: region.clone(),
            probability,
            run: run + self.start_run_offset,
            heuristic: *heuristic,
        })
        .collect()
    }
}

/// Key uniquely determining one trial and one trace path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioKey {
    pub region: String,
    pub probability: f64,
    pub run: usize,
    pub heuristic: Heuristic,
}

impl fmt::Display for ScenarioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{:.1}/{}/run{}",
            self.region, self.probability, self.heuristic, self.run
        )
    }
}
