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
//! Module mapping overlay participants to their addresses and metadata.
use std::{collections::BTreeMap, net::Ipv4Addr};

use geoutils::Location;
use serde::{Deserialize, Serialize};

use crate::topology::NodeId;

/// A single overlay participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub node: NodeId,
    pub addr: Ipv4Addr,
    /// Device count of the node, including its loopback device.
    pub degree: u32,
    /// Geographic label of the node, if the parser provided one.
    pub location: Option<String>,
    /// Position from the location table, if the label was found there.
    pub position: Option<Location>,
}

/// Table of overlay participants, injected into heuristics and clients before
/// each trial. Iteration order is the node id order, so a fixed random seed
/// selects the same peers on every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerRegistry {
    peers: BTreeMap<NodeId, PeerEntry>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: PeerEntry) {
        self.peers.insert(entry.node, entry);
    }

    pub fn get(&self, node: NodeId) -> Option<&PeerEntry> {
        self.peers.get(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.peers.contains_key(&node)
    }

    pub fn remove(&mut self, node: NodeId) -> Option<PeerEntry> {
        self.peers.remove(&node)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerEntry> {
        self.peers.values()
    }

    /// All participant addresses, in node id order.
    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        self.peers.values().map(|p| p.addr).collect()
    }

    pub fn find_by_addr(&self, addr: Ipv4Addr) -> Option<&PeerEntry> {
        self.peers.values().find(|p| p.addr == addr)
    }
}
