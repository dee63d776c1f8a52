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
//! Library for evaluating overlay routing heuristics under correlated regional failures.
use std::collections::HashMap;

/// Latency table handed back by the external topology parser. Keys have the
/// form `"LocationA -> LocationB"`, values are latencies in milliseconds.
pub type Latencies = HashMap<String, String>;

/// Location table handed back by the external parser: one 2-D position per
/// location label.
pub type Locations = HashMap<String, geoutils::Location>;

pub mod experiments;
pub mod failures;
pub mod header;
pub mod peers;
pub mod records;
pub mod sim;
pub mod topology;
pub mod util;

// pub use to keep dependencies working where stuff was originally defined in this file
pub use dorn_utils::ids::sample_id;

pub mod prelude {
    pub use super::{
        experiments::{ExperimentConfig, Heuristic, Scheduler},
        failures::{FailureInjector, FailureSample},
        header::PathHeader,
        peers::PeerRegistry,
        sim::{SimTime, Simulator, TrialReport, TrialSetup},
        topology::{InterfaceId, NodeId, RegionIndex, TopologyModel},
        util::RandomSource,
    };
}
