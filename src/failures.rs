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
//! Module sampling and applying regional failures.
use serde::{Deserialize, Serialize};

use crate::{
    sim::{SimTime, Simulator},
    topology::{InterfaceId, NodeId, RegionIndex},
    util::RandomSource,
};

#[derive(Debug, thiserror::Error)]
pub enum FailureError {
    #[error("region {0:?} is not part of the topology model")]
    UnknownRegion(String),
}

/// The concrete set of entities failed for one run.
///
/// A sample is created by [`FailureInjector::apply`] and consumed by the
/// paired [`FailureInjector::unapply`]; it never outlives that pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSample {
    pub region: String,
    pub probability: f64,
    pub nodes: Vec<NodeId>,
    pub ifaces: Vec<(InterfaceId, InterfaceId)>,
}

impl FailureSample {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.ifaces.is_empty()
    }
}

/// Draws and applies per-region failure samples against the simulator.
#[derive(Debug, Clone, Copy)]
pub struct FailureInjector<'a> {
    regions: &'a RegionIndex,
}

impl<'a> FailureInjector<'a> {
    pub fn new(regions: &'a RegionIndex) -> Self {
        Self { regions }
    }

    /// Draw one uniform value per member node and per eligible interface
    /// pair, fail those below `probability`, and take them offline. Draws are
    /// taken from `random` at its current position, in the (deterministic)
    /// iteration order of the region index.
    pub fn apply(
        &self,
        region: &str,
        probability: f64,
        random: &mut RandomSource,
        sim: &mut dyn Simulator,
    ) -> Result<FailureSample, FailureError> {
        let members = self
            .regions
            .members(region)
            .ok_or_else(|| FailureError::UnknownRegion(region.to_string()))?;
        let eligible = self
            .regions
            .fail_ifaces(region)
            .ok_or_else(|| FailureError::UnknownRegion(region.to_string()))?;

        let mut sample = FailureSample {
            region: region.to_string(),
            probability,
            nodes: Vec::new(),
            ifaces: Vec::new(),
        };
        for node in members {
            if random.next_f64() < probability {
                sample.nodes.push(*node);
            }
        }
        for pair in eligible {
            if random.next_f64() < probability {
                sample.ifaces.push(*pair);
            }
        }

        for node in &sample.nodes {
            sim.fail_node(*node);
        }
        for (a, b) in &sample.ifaces {
            sim.fail_interface(*a);
            sim.fail_interface(*b);
        }

        log::info!(
            "{region}: failed {} of {} nodes and {} of {} links (p = {probability})",
            sample.nodes.len(),
            members.len(),
            sample.ifaces.len(),
            eligible.len(),
        );
        Ok(sample)
    }

    /// Restore exactly the entities recorded in `sample`. Consumes the
    /// sample, so it cannot be unapplied twice. Restored nodes resume their
    /// applications at `resume_at`.
    pub fn unapply(&self, sample: FailureSample, sim: &mut dyn Simulator, resume_at: SimTime) {
        for (a, b) in &sample.ifaces {
            sim.restore_interface(*a);
            sim.restore_interface(*b);
        }
        for node in &sample.nodes {
            sim.restore_node(*node, resume_at);
        }
    }
}

#[cfg(test)]
mod test {
    use statrs::{distribution::Binomial, statistics::Distribution};

    use super::*;
    use crate::{
        sim::DrillSim,
        topology::{LinkRecord, TopologyGraph, TopologyModel, TopologySettings},
        Latencies, Locations,
    };

    fn link(from: u32, to: u32, from_location: &str, to_location: &str) -> LinkRecord {
        LinkRecord {
            from: NodeId(from),
            to: NodeId(to),
            from_location: from_location.to_string(),
            to_location: to_location.to_string(),
        }
    }

    /// Ring of eight Tokyo nodes, each also linked to one node outside.
    fn test_model() -> TopologyModel {
        let mut links = Vec::new();
        for i in 0..8 {
            links.push(link(i, (i + 1) % 8, "Tokyo", "Tokyo"));
            links.push(link(i, 8 + i, "Tokyo", "Berlin"));
        }
        let graph = TopologyGraph {
            nodes: vec![],
            links,
        };
        let settings = TopologySettings {
            regions: vec!["Tokyo".to_string()],
            ..Default::default()
        };
        TopologyModel::build(&graph, &Latencies::new(), &Locations::new(), &settings)
    }

    #[test]
    fn test_probability_zero_fails_nothing() {
        let model = test_model();
        let injector = FailureInjector::new(model.regions());
        let mut random = RandomSource::seeded(1);
        let mut sim = DrillSim::new();
        let sample = injector.apply("Tokyo", 0.0, &mut random, &mut sim).unwrap();
        assert!(sample.is_empty());
        assert!(sim.offline_nodes().is_empty());
        assert!(sim.offline_ifaces().is_empty());
    }

    #[test]
    fn test_probability_one_fails_everything() {
        let model = test_model();
        let injector = FailureInjector::new(model.regions());
        let mut random = RandomSource::seeded(1);
        let mut sim = DrillSim::new();
        let sample = injector.apply("Tokyo", 1.0, &mut random, &mut sim).unwrap();
        assert_eq!(sample.nodes.len(), 8);
        assert_eq!(sample.ifaces.len(), 16);
        assert_eq!(sim.offline_nodes().len(), 8);
        // both interfaces of every eligible link are down
        assert_eq!(sim.offline_ifaces().len(), 32);
    }

    #[test]
    fn test_unapply_is_exact_inverse() {
        let model = test_model();
        let injector = FailureInjector::new(model.regions());
        let mut random = RandomSource::seeded(3);
        let mut sim = DrillSim::new();

        // an unrelated offline node must survive the apply/unapply pair
        sim.fail_node(NodeId(100));

        let sample = injector.apply("Tokyo", 0.5, &mut random, &mut sim).unwrap();
        assert!(!sample.is_empty());
        let failed_nodes = sample.nodes.clone();

        injector.unapply(sample, &mut sim, SimTime::from_secs(30.0));
        assert_eq!(
            sim.offline_nodes().iter().copied().collect::<Vec<_>>(),
            vec![NodeId(100)]
        );
        assert!(sim.offline_ifaces().is_empty());
        for node in failed_nodes {
            assert_eq!(sim.resumed_at()[&node], SimTime::from_secs(30.0));
        }
    }

    #[test]
    fn test_unknown_region() {
        let model = test_model();
        let injector = FailureInjector::new(model.regions());
        let mut random = RandomSource::seeded(1);
        let mut sim = DrillSim::new();
        assert!(matches!(
            injector.apply("Atlantis", 0.5, &mut random, &mut sim),
            Err(FailureError::UnknownRegion(_))
        ));
    }

    #[test]
    fn test_failed_fraction_converges() {
        let model = test_model();
        let injector = FailureInjector::new(model.regions());
        let mut random = RandomSource::seeded(0xD0_11);
        let mut sim = DrillSim::new();

        let probability = 0.3;
        let trials = 2_000;
        let members = model.regions().members("Tokyo").unwrap().len();

        let mut failed = 0u64;
        for _ in 0..trials {
            let sample = injector
                .apply("Tokyo", probability, &mut random, &mut sim)
                .unwrap();
            failed += sample.nodes.len() as u64;
            injector.unapply(sample, &mut sim, SimTime::ZERO);
        }

        let total = (members * trials) as u64;
        let reference = Binomial::new(probability, total).unwrap();
        let tolerance = 4.0 * reference.std_dev().unwrap();
        assert!(
            (failed as f64 - reference.mean().unwrap()).abs() < tolerance,
            "{failed} failures out of {total} draws is outside the tolerance"
        );
    }
}
