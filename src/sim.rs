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
//! Module defining the contract of the external discrete-event simulator.
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    net::Ipv4Addr,
    ops::Add,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    experiments::PathSelection,
    header::{HeaderError, PathHeader},
    peers::PeerRegistry,
    topology::{InterfaceId, NodeId},
    util::RandomSource,
};

/// Simulated time in seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SimTime(f64);

impl SimTime {
    pub const ZERO: Self = Self(0.0);

    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> f64 {
        self.0
    }
}

impl Add for SimTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("trial schedule is inconsistent: {0}")]
    BadSchedule(String),
    #[error("wire format error: {0}")]
    Header(#[from] HeaderError),
}

/// Everything the simulator needs to run one trial. The failure sample has
/// already been applied when this is handed over.
#[derive(Debug)]
pub struct TrialSetup<'a> {
    pub region: &'a str,
    pub heuristic: &'a str,
    /// The node hosting the backup server for this run.
    pub server: NodeId,
    pub server_addr: Ipv4Addr,
    pub peers: &'a PeerRegistry,
    /// Contacts each client attempts before giving up.
    pub contact_attempts: u32,
    pub timeout: SimTime,
    pub client_start: SimTime,
    pub server_start: SimTime,
    /// Applications stop sending at this simulated time.
    pub app_stop: SimTime,
    /// The simulated world is destroyed at this time; trials always run to
    /// it, there is no early cancellation.
    pub sim_length: SimTime,
    pub trace_file: &'a Path,
}

/// Counters reported by the simulator after one trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrialReport {
    pub packets_sent: u64,
    pub packets_forwarded: u64,
    pub acks_received: u64,
    pub clients_served: u64,
    pub clients_total: u64,
    /// Acks seen per client node.
    #[serde(serialize_with = "dorn_utils::serde::ordered::serialize")]
    pub client_acks: HashMap<NodeId, u64>,
}

/// Contract offered by the external discrete-event simulator.
///
/// Failing and restoring are exact inverses: the scheduler restores exactly
/// the entities it failed, before the next apply. `run_trial` drains the
/// simulated world to `sim_length` and destroys it.
pub trait Simulator {
    fn fail_node(&mut self, node: NodeId);

    /// Bring a node back and re-schedule its applications to resume at
    /// `resume_at` (the next trial's start offset).
    fn restore_node(&mut self, node: NodeId, resume_at: SimTime);

    fn fail_interface(&mut self, iface: InterfaceId);

    fn restore_interface(&mut self, iface: InterfaceId);

    fn run_trial(
        &mut self,
        setup: &TrialSetup<'_>,
        selector: &mut dyn PathSelection,
        random: &mut RandomSource,
    ) -> Result<TrialReport, SimError>;
}

/// Bookkeeping-only simulator: tracks which entities are offline and accounts
/// packets without modelling delivery, queuing or routing. Offline clients
/// and broken relays contact nobody; everything else succeeds.
#[derive(Debug, Default)]
pub struct DrillSim {
    clock: Option<SimTime>,
    next_seq: u32,
    offline_nodes: BTreeSet<NodeId>,
    offline_ifaces: BTreeSet<InterfaceId>,
    resumed_at: BTreeMap<NodeId, SimTime>,
    trials_run: usize,
}

impl DrillSim {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offline_nodes(&self) -> &BTreeSet<NodeId> {
        &self.offline_nodes
    }

    pub fn offline_ifaces(&self) -> &BTreeSet<InterfaceId> {
        &self.offline_ifaces
    }

    /// Resume offsets recorded by [`Simulator::restore_node`].
    pub fn resumed_at(&self) -> &BTreeMap<NodeId, SimTime> {
        &self.resumed_at
    }

    pub fn trials_run(&self) -> usize {
        self.trials_run
    }

    /// Clock of the most recent trial's world, if any ran.
    pub fn clock(&self) -> Option<SimTime> {
        self.clock
    }

    fn relay_online(&self, peers: &PeerRegistry, addr: Ipv4Addr) -> bool {
        peers
            .iter()
            .find(|p| p.addr == addr)
            .map(|p| !self.offline_nodes.contains(&p.node))
            .unwrap_or(false)
    }
}

impl Simulator for DrillSim {
    fn fail_node(&mut self, node: NodeId) {
        log::debug!("node {node} goes offline");
        self.offline_nodes.insert(node);
    }

    fn restore_node(&mut self, node: NodeId, resume_at: SimTime) {
        log::debug!("node {node} comes back, apps resume at {resume_at}");
        self.offline_nodes.remove(&node);
        self.resumed_at.insert(node, resume_at);
    }

    fn fail_interface(&mut self, iface: InterfaceId) {
        log::debug!("interface {iface} goes down");
        self.offline_ifaces.insert(iface);
    }

    fn restore_interface(&mut self, iface: InterfaceId) {
        log::debug!("interface {iface} comes up");
        self.offline_ifaces.remove(&iface);
    }

    fn run_trial(
        &mut self,
        setup: &TrialSetup<'_>,
        selector: &mut dyn PathSelection,
        random: &mut RandomSource,
    ) -> Result<TrialReport, SimError> {
        if setup.client_start >= setup.app_stop || setup.server_start >= setup.app_stop {
            return Err(SimError::BadSchedule(format!(
                "applications start at {}/{} but stop at {}",
                setup.server_start, setup.client_start, setup.app_stop
            )));
        }

        let mut report = TrialReport::default();
        for client in setup.peers.iter() {
            report.clients_total += 1;
            if client.node == setup.server || self.offline_nodes.contains(&client.node) {
                continue;
            }

            let mut header = selector.select_path(setup.peers, client.addr, setup.server_addr, random);
            header.set_seq(self.next_seq);
            self.next_seq = self.next_seq.wrapping_add(1);

            // frame the header once the way the transport would
            let wire = header.encode()?;
            let mut delivered = PathHeader::decode(&wire)?;

            report.packets_sent += setup.contact_attempts as u64;

            // walk the relays; a broken relay swallows the packet
            let mut reached_server = true;
            for hop in header.path() {
                if !self.relay_online(setup.peers, *hop) {
                    reached_server = false;
                    break;
                }
                delivered.increment_hop();
                report.packets_forwarded += setup.contact_attempts as u64;
            }

            if reached_server {
                delivered.reverse();
                report.acks_received += setup.contact_attempts as u64;
                report.clients_served += 1;
                report
                    .client_acks
                    .insert(client.node, setup.contact_attempts as u64);
            }
        }

        // the world always runs to its configured stop time
        self.clock = Some(setup.sim_length);
        self.trials_run += 1;
        Ok(report)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fail_restore_bookkeeping() {
        let mut sim = DrillSim::new();
        sim.fail_node(NodeId(3));
        sim.fail_interface(InterfaceId {
            node: NodeId(3),
            device: 1,
        });
        assert!(sim.offline_nodes().contains(&NodeId(3)));
        assert_eq!(sim.offline_ifaces().len(), 1);

        sim.restore_node(NodeId(3), SimTime::from_secs(30.0));
        sim.restore_interface(InterfaceId {
            node: NodeId(3),
            device: 1,
        });
        assert!(sim.offline_nodes().is_empty());
        assert!(sim.offline_ifaces().is_empty());
        assert_eq!(sim.resumed_at()[&NodeId(3)], SimTime::from_secs(30.0));
    }

    #[test]
    fn test_sim_time_display() {
        assert_eq!(SimTime::from_secs(1.5).to_string(), "1.500s");
        assert_eq!(
            (SimTime::from_secs(1.0) + SimTime::from_secs(0.5)).as_secs(),
            1.5
        );
    }
}
