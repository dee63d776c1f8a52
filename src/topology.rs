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
//! Module building the static region indices over a parsed topology.
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, fs,
    io::BufReader,
    net::Ipv4Addr,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    peers::{PeerEntry, PeerRegistry},
    Latencies, Locations,
};

/// Link delay assumed when the latency table has no entry for a link, in
/// milliseconds.
pub const DEFAULT_DELAY_MS: f64 = 2.0;

/// Opaque identifier of a node in the parsed topology.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One network device on a node. Device 0 is the loopback; every incident
/// link adds one device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct InterfaceId {
    pub node: NodeId,
    pub device: u32,
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.device)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("cannot read input file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode input file: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One link of the parsed topology, with the geographic attributes the
/// external reader attaches to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(rename = "From Location")]
    pub from_location: String,
    #[serde(rename = "To Location")]
    pub to_location: String,
}

/// The graph handed back by the external topology parser. `nodes` lists all
/// nodes including isolated ones; link endpoints not listed there are added
/// implicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyGraph {
    #[serde(default)]
    pub nodes: Vec<NodeId>,
    pub links: Vec<LinkRecord>,
}

impl TopologyGraph {
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let file = fs::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Load the latency table (`"A -> B"` -> milliseconds).
pub fn load_latencies(path: impl AsRef<Path>) -> Result<Latencies, TopologyError> {
    let file = fs::File::open(path.as_ref())?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Load the location table (label -> 2-D position).
pub fn load_locations(path: impl AsRef<Path>) -> Result<Locations, TopologyError> {
    let file = fs::File::open(path.as_ref())?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// An installed link with its assigned interfaces and delay.
#[derive(Debug, Clone)]
pub struct LinkInfo {
    pub from: NodeId,
    pub to: NodeId,
    pub from_iface: InterfaceId,
    pub to_iface: InterfaceId,
    pub delay_ms: f64,
}

/// Static settings consumed by [`TopologyModel::build`].
#[derive(Debug, Clone)]
pub struct TopologySettings {
    /// Names of the configured disaster regions.
    pub regions: Vec<String>,
    /// Device count a node must have to qualify as a server candidate.
    pub server_degree: u32,
    /// Device count ceiling for overlay participation; `0` admits all nodes.
    pub overlay_degree_max: u32,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            server_degree: 2,
            overlay_degree_max: 0,
        }
    }
}

/// Per-region indices, read-only after [`TopologyModel::build`].
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    members: BTreeMap<String, BTreeSet<NodeId>>,
    candidates: BTreeMap<String, BTreeSet<NodeId>>,
    fail_ifaces: BTreeMap<String, Vec<(InterfaceId, InterfaceId)>>,
}

impl RegionIndex {
    /// Member nodes of a region.
    pub fn members(&self, region: &str) -> Option<&BTreeSet<NodeId>> {
        self.members.get(region)
    }

    /// Server candidates for a region: nodes of exactly the configured degree
    /// that belong to no disaster region.
    pub fn candidates(&self, region: &str) -> Option<&BTreeSet<NodeId>> {
        self.candidates.get(region)
    }

    /// Interface pairs eligible for failure in a region.
    pub fn fail_ifaces(&self, region: &str) -> Option<&[(InterfaceId, InterfaceId)]> {
        self.fail_ifaces.get(region).map(Vec::as_slice)
    }

    pub fn is_member(&self, region: &str, node: NodeId) -> bool {
        self.members
            .get(region)
            .map(|m| m.contains(&node))
            .unwrap_or(false)
    }

    pub fn in_any_region(&self, node: NodeId) -> bool {
        self.members.values().any(|m| m.contains(&node))
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }
}

/// Static view of the network, built once per sweep.
#[derive(Debug, Clone)]
pub struct TopologyModel {
    links: Vec<LinkInfo>,
    degrees: BTreeMap<NodeId, u32>,
    addrs: BTreeMap<NodeId, Ipv4Addr>,
    regions: RegionIndex,
    peers: PeerRegistry,
}

impl TopologyModel {
    /// Single pass over the link list: assign interfaces and addresses,
    /// resolve link delays, and build the region indices. Nodes that end up
    /// with no links are dropped from every set.
    pub fn build(
        graph: &TopologyGraph,
        latencies: &Latencies,
        locations: &Locations,
        settings: &TopologySettings,
    ) -> Self {
        let mut degrees: BTreeMap<NodeId, u32> = BTreeMap::new();
        let mut addrs: BTreeMap<NodeId, Ipv4Addr> = BTreeMap::new();
        let mut node_locations: BTreeMap<NodeId, String> = BTreeMap::new();
        let mut links = Vec::with_capacity(graph.links.len());
        let mut regions = RegionIndex::default();
        for region in &settings.regions {
            regions.members.entry(region.clone()).or_default();
            regions.candidates.entry(region.clone()).or_default();
            regions.fail_ifaces.entry(region.clone()).or_default();
        }

        // every node starts with its loopback device
        for node in &graph.nodes {
            degrees.entry(*node).or_insert(1);
        }

        for (idx, link) in graph.links.iter().enumerate() {
            let from_iface = Self::install_device(&mut degrees, link.from);
            let to_iface = Self::install_device(&mut degrees, link.to);

            // one /30 network per link, in the 10.0.0.0/8 block
            let base = u32::from(Ipv4Addr::new(10, 1, 0, 0)).wrapping_add(4 * idx as u32);
            let from_addr = Ipv4Addr::from(base + 1);
            let to_addr = Ipv4Addr::from(base + 2);
            addrs.entry(link.from).or_insert(from_addr);
            addrs.entry(link.to).or_insert(to_addr);

            node_locations
                .entry(link.from)
                .or_insert_with(|| link.from_location.clone());
            node_locations
                .entry(link.to)
                .or_insert_with(|| link.to_location.clone());

            let delay_ms = link_delay(latencies, &link.from_location, &link.to_location);

            for region in &settings.regions {
                if &link.from_location == region {
                    regions
                        .members
                        .get_mut(region)
                        .unwrap()
                        .insert(link.from);
                }
                if &link.to_location == region {
                    regions.members.get_mut(region).unwrap().insert(link.to);
                }
                // if either endpoint sits in the region, both interfaces of
                // this link may fail
                if &link.from_location == region || &link.to_location == region {
                    regions
                        .fail_ifaces
                        .get_mut(region)
                        .unwrap()
                        .push((from_iface, to_iface));
                }
            }

            links.push(LinkInfo {
                from: link.from,
                to: link.to,
                from_iface,
                to_iface,
                delay_ms,
            });
        }

        // nodes with only a loopback are treated as disconnected
        let disconnected: BTreeSet<NodeId> = degrees
            .iter()
            .filter(|(_, d)| **d <= 1)
            .map(|(n, _)| *n)
            .collect();
        for node in &disconnected {
            log::info!("node {node} has no links, dropping it from the experiment");
            for members in regions.members.values_mut() {
                members.remove(node);
            }
        }

        // server eligibility is decided on the final degree, so the candidate
        // sets do not depend on the order in which links were parsed
        for (node, degree) in &degrees {
            if disconnected.contains(node) || *degree != settings.server_degree {
                continue;
            }
            if regions.in_any_region(*node) {
                continue;
            }
            for candidates in regions.candidates.values_mut() {
                candidates.insert(*node);
            }
        }

        let mut peers = PeerRegistry::new();
        for (node, degree) in &degrees {
            if disconnected.contains(node) {
                continue;
            }
            if settings.overlay_degree_max != 0 && *degree > settings.overlay_degree_max {
                continue;
            }
            let location = node_locations.get(node).cloned();
            let position = location.as_ref().and_then(|l| locations.get(l)).cloned();
            peers.register(PeerEntry {
                node: *node,
                addr: addrs[node],
                degree: *degree,
                location,
                position,
            });
        }

        Self {
            links,
            degrees,
            addrs,
            regions,
            peers,
        }
    }

    fn install_device(degrees: &mut BTreeMap<NodeId, u32>, node: NodeId) -> InterfaceId {
        let degree = degrees.entry(node).or_insert(1);
        let iface = InterfaceId {
            node,
            device: *degree,
        };
        *degree += 1;
        iface
    }

    pub fn links(&self) -> &[LinkInfo] {
        &self.links
    }

    /// Device count of a node, including its loopback.
    pub fn degree(&self, node: NodeId) -> Option<u32> {
        self.degrees.get(&node).copied()
    }

    /// Primary address of a node (the address of its first installed link).
    pub fn address(&self, node: NodeId) -> Option<Ipv4Addr> {
        self.addrs.get(&node).copied()
    }

    pub fn regions(&self) -> &RegionIndex {
        &self.regions
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }
}

/// Delay for a link, looked up as `"A -> B"`, then `"B -> A"`, then the
/// default.
fn link_delay(latencies: &Latencies, from: &str, to: &str) -> f64 {
    let value = latencies
        .get(&format!("{from} -> {to}"))
        .or_else(|| latencies.get(&format!("{to} -> {from}")));
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("unparsable latency {raw:?} for {from} -> {to}, using default");
            DEFAULT_DELAY_MS
        }),
        None => DEFAULT_DELAY_MS,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn link(from: u32, to: u32, from_location: &str, to_location: &str) -> LinkRecord {
        LinkRecord {
            from: NodeId(from),
            to: NodeId(to),
            from_location: from_location.to_string(),
            to_location: to_location.to_string(),
        }
    }

    /// Two-region test graph: nodes 0-1 in Tokyo, node 2 in NYC, nodes 3-5
    /// outside any region, node 6 isolated.
    fn test_graph() -> TopologyGraph {
        TopologyGraph {
            nodes: vec![NodeId(6)],
            links: vec![
                link(0, 1, "Tokyo", "Tokyo"),
                link(0, 2, "Tokyo", "NYC"),
                link(1, 3, "Tokyo", "Osaka"),
                link(2, 3, "NYC", "Osaka"),
                link(3, 4, "Osaka", "Berlin"),
                link(3, 5, "Osaka", "Berlin"),
            ],
        }
    }

    fn settings() -> TopologySettings {
        TopologySettings {
            regions: vec!["Tokyo".to_string(), "NYC".to_string()],
            server_degree: 2,
            overlay_degree_max: 0,
        }
    }

    fn build(graph: &TopologyGraph) -> TopologyModel {
        TopologyModel::build(graph, &Latencies::new(), &Locations::new(), &settings())
    }

    #[test]
    fn test_region_members() {
        let model = build(&test_graph());
        let regions = model.regions();
        assert_eq!(
            regions.members("Tokyo").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![NodeId(0), NodeId(1)]
        );
        assert_eq!(
            regions.members("NYC").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![NodeId(2)]
        );
        assert!(regions.is_member("Tokyo", NodeId(1)));
        assert!(!regions.is_member("Tokyo", NodeId(3)));
    }

    #[test]
    fn test_server_candidates_exclude_region_members() {
        let model = build(&test_graph());
        // nodes 4 and 5 have one link each (degree 2); every other connected
        // node is either of the wrong degree or sits in a region
        for region in ["Tokyo", "NYC"] {
            assert_eq!(
                model
                    .regions()
                    .candidates(region)
                    .unwrap()
                    .iter()
                    .copied()
                    .collect::<Vec<_>>(),
                vec![NodeId(4), NodeId(5)]
            );
        }
    }

    #[test]
    fn test_candidates_independent_of_link_order() {
        let mut graph = test_graph();
        let reference = build(&graph);
        graph.links.reverse();
        let permuted = build(&graph);
        for region in ["Tokyo", "NYC"] {
            assert_eq!(
                reference.regions().candidates(region),
                permuted.regions().candidates(region)
            );
        }
    }

    #[test]
    fn test_fail_ifaces_cover_cross_region_links() {
        let model = build(&test_graph());
        // Tokyo touches links 0, 1 and 2; both interfaces of each are eligible
        let ifaces = model.regions().fail_ifaces("Tokyo").unwrap();
        assert_eq!(ifaces.len(), 3);
        let link = &model.links()[1];
        assert!(ifaces.contains(&(link.from_iface, link.to_iface)));
        // NYC touches links 1 and 3
        assert_eq!(model.regions().fail_ifaces("NYC").unwrap().len(), 2);
    }

    #[test]
    fn test_disconnected_node_dropped_everywhere() {
        let model = build(&test_graph());
        assert!(!model.regions().in_any_region(NodeId(6)));
        assert!(!model.peers().contains(NodeId(6)));
        for region in ["Tokyo", "NYC"] {
            assert!(!model.regions().candidates(region).unwrap().contains(&NodeId(6)));
        }
    }

    #[test]
    fn test_overlay_degree_ceiling() {
        let graph = test_graph();
        let mut settings = settings();
        settings.overlay_degree_max = 2;
        let model = TopologyModel::build(&graph, &Latencies::new(), &Locations::new(), &settings);
        // only the stub nodes 4 and 5 stay at degree 2
        assert!(model.peers().contains(NodeId(4)));
        assert!(model.peers().contains(NodeId(5)));
        assert!(!model.peers().contains(NodeId(0)));
        assert!(!model.peers().contains(NodeId(3)));

        // a ceiling of zero admits every connected node
        let all = build(&graph);
        assert_eq!(all.peers().len(), 6);
    }

    #[test]
    fn test_link_delay_lookup() {
        let latencies = Latencies::from_iter([
            ("Tokyo -> NYC".to_string(), "12.5".to_string()),
            ("Osaka -> Tokyo".to_string(), "3".to_string()),
        ]);
        assert_eq!(link_delay(&latencies, "Tokyo", "NYC"), 12.5);
        // reverse direction is looked up as a fallback
        assert_eq!(link_delay(&latencies, "Tokyo", "Osaka"), 3.0);
        assert_eq!(link_delay(&latencies, "Berlin", "NYC"), DEFAULT_DELAY_MS);
    }

    #[test]
    fn test_interface_assignment() {
        let model = build(&test_graph());
        let first = &model.links()[0];
        // device 0 is the loopback, so the first link gets device 1
        assert_eq!(first.from_iface, InterfaceId { node: NodeId(0), device: 1 });
        let second = &model.links()[1];
        assert_eq!(second.from_iface, InterfaceId { node: NodeId(0), device: 2 });
        assert_eq!(model.degree(NodeId(3)), Some(5));
        assert_eq!(model.degree(NodeId(6)), Some(1));
    }
}
