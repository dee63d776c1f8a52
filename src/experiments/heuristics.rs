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
//! Module containing the overlay path selection heuristics.
use std::net::Ipv4Addr;

use geoutils::Location;
use serde::{Deserialize, Serialize};

use crate::{header::PathHeader, peers::PeerRegistry, util::RandomSource};

/// Capability contract a heuristic offers to the trial: choose an overlay
/// path from `origin` to `dest` over the given participants.
pub trait PathSelection {
    fn select_path(
        &mut self,
        peers: &PeerRegistry,
        origin: Ipv4Addr,
        dest: Ipv4Addr,
        random: &mut RandomSource,
    ) -> PathHeader;
}

/// Identifiers of the available heuristics.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// Contact the server without any intermediate.
    Direct,
    /// Relay over one uniformly chosen overlay peer.
    Random,
    /// Relay over the overlay peer geographically farthest from the
    /// destination, hoping to route around the disaster region.
    Farthest,
}

impl Heuristic {
    /// Instantiate the selection strategy behind this identifier.
    pub fn create(&self) -> Box<dyn PathSelection> {
        match self {
            Self::Direct => Box::new(DirectPath),
            Self::Random => Box::new(RandomRelay),
            Self::Farthest => Box::new(FarthestRelay),
        }
    }
}

struct DirectPath;

impl PathSelection for DirectPath {
    fn select_path(
        &mut self,
        _peers: &PeerRegistry,
        origin: Ipv4Addr,
        dest: Ipv4Addr,
        _random: &mut RandomSource,
    ) -> PathHeader {
        let mut header = PathHeader::new(dest);
        header.set_origin(origin);
        header
    }
}

struct RandomRelay;

impl PathSelection for RandomRelay {
    fn select_path(
        &mut self,
        peers: &PeerRegistry,
        origin: Ipv4Addr,
        dest: Ipv4Addr,
        random: &mut RandomSource,
    ) -> PathHeader {
        let candidates: Vec<Ipv4Addr> = peers
            .addresses()
            .into_iter()
            .filter(|a| *a != origin && *a != dest)
            .collect();
        let mut header = if candidates.is_empty() {
            PathHeader::new(dest)
        } else {
            let relay = candidates[random.pick_index(candidates.len())];
            PathHeader::with_intermediate(dest, relay)
        };
        header.set_origin(origin);
        header
    }
}

struct FarthestRelay;

impl PathSelection for FarthestRelay {
    fn select_path(
        &mut self,
        peers: &PeerRegistry,
        origin: Ipv4Addr,
        dest: Ipv4Addr,
        random: &mut RandomSource,
    ) -> PathHeader {
        let reference = peers.find_by_addr(dest).and_then(|p| p.position.clone());
        let Some(reference) = reference else {
            // without a position for the target we cannot do better than random
            return RandomRelay.select_path(peers, origin, dest, random);
        };

        let farthest = peers
            .iter()
            .filter(|p| p.addr != origin && p.addr != dest)
            .filter_map(|p| {
                let position = p.position.as_ref()?;
                Some((p.addr, distance_m(position, &reference)))
            })
            .max_by(|(_, a), (_, b)| a.total_cmp(b));

        let mut header = match farthest {
            Some((relay, _)) => PathHeader::with_intermediate(dest, relay),
            None => PathHeader::new(dest),
        };
        header.set_origin(origin);
        header
    }
}

fn distance_m(a: &Location, b: &Location) -> f64 {
    a.distance_to(b)
        .unwrap_or_else(|_| a.haversine_distance_to(b))
        .meters()
}
