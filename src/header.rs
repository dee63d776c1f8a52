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
//! Module defining the source-routed path header exchanged between overlay
//! clients and the backup server.
use std::{fmt, net::Ipv4Addr};

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the fixed header prefix: direction flag, hop counter, path length,
/// sequence number, destination and origin address.
pub const FIXED_PREFIX_LEN: usize = 15;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header buffer too short: got {got} bytes, need {need}")]
    Truncated { got: usize, need: usize },
    #[error("path of {0} hops exceeds the 8-bit length field")]
    PathTooLong(usize),
}

/// A source-routed path through the overlay.
///
/// The hop counter tracks how many relays the packet actually traversed and
/// is advanced with [`PathHeader::increment_hop`]; it is independent of the
/// intermediate-hop list, which only describes the intended route. Callers
/// must keep the two synchronized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHeader {
    forward: bool,
    hops: u8,
    seq: u32,
    dest: Ipv4Addr,
    origin: Ipv4Addr,
    path: Vec<Ipv4Addr>,
}

impl PathHeader {
    /// A fresh forward header with no intermediate hops.
    pub fn new(dest: Ipv4Addr) -> Self {
        Self {
            forward: true,
            hops: 0,
            seq: 0,
            dest,
            origin: Ipv4Addr::UNSPECIFIED,
            path: Vec::new(),
        }
    }

    /// A forward header routed over a single intermediate peer.
    pub fn with_intermediate(dest: Ipv4Addr, intermediate: Ipv4Addr) -> Self {
        let mut header = Self::new(dest);
        header.path.push(intermediate);
        header
    }

    pub fn final_dest(&self) -> Ipv4Addr {
        self.dest
    }

    pub fn origin(&self) -> Ipv4Addr {
        self.origin
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn hop_count(&self) -> u8 {
        self.hops
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn path(&self) -> &[Ipv4Addr] {
        &self.path
    }

    pub fn set_origin(&mut self, origin: Ipv4Addr) {
        self.origin = origin;
    }

    pub fn set_dest(&mut self, dest: Ipv4Addr) {
        self.dest = dest;
    }

    pub fn set_seq(&mut self, seq: u32) {
        self.seq = seq;
    }

    pub fn set_path(&mut self, path: Vec<Ipv4Addr>) {
        self.path = path;
    }

    /// Append an intermediate hop to the path. Leaves the hop counter alone.
    pub fn add_hop(&mut self, addr: Ipv4Addr) {
        self.path.push(addr);
    }

    /// Advance the hop counter by one relay traversal and return the new count.
    pub fn increment_hop(&mut self) -> u8 {
        self.hops += 1;
        self.hops
    }

    /// The address this packet should be forwarded to next: the hop at the
    /// current hop position, or the final target once the list is exhausted.
    /// On the reverse trip the final target is the origin.
    pub fn next_dest(&self) -> Ipv4Addr {
        let target = if self.forward { self.dest } else { self.origin };
        self.path.get(self.hops as usize).copied().unwrap_or(target)
    }

    /// Turn the header around for the return trip: flip the direction flag and
    /// reverse the intermediate-hop list. Origin and destination keep their
    /// stored roles; callers re-read them according to [`PathHeader::is_forward`].
    pub fn reverse(&mut self) {
        self.forward = !self.forward;
        self.path.reverse();
    }

    /// Exact wire size, required by the transport's buffer allocator.
    pub fn serialized_size(&self) -> usize {
        FIXED_PREFIX_LEN + 4 * self.path.len()
    }

    pub fn encode(&self) -> Result<Bytes, HeaderError> {
        if self.path.len() > u8::MAX as usize {
            return Err(HeaderError::PathTooLong(self.path.len()));
        }
        let mut buf = BytesMut::with_capacity(self.serialized_size());
        buf.put_u8(self.forward as u8);
        buf.put_u8(self.hops);
        buf.put_u8(self.path.len() as u8);
        buf.put_u32(self.seq);
        buf.put_u32(self.dest.into());
        buf.put_u32(self.origin.into());
        for hop in &self.path {
            buf.put_u32(u32::from(*hop));
        }
        Ok(buf.freeze())
    }

    /// Exact inverse of [`PathHeader::encode`]. Rejects buffers shorter than
    /// the fixed prefix or than the prefix plus the declared hop list.
    pub fn decode(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < FIXED_PREFIX_LEN {
            return Err(HeaderError::Truncated {
                got: buf.len(),
                need: FIXED_PREFIX_LEN,
            });
        }
        let path_len = buf[2] as usize;
        let need = FIXED_PREFIX_LEN + 4 * path_len;
        if buf.len() < need {
            return Err(HeaderError::Truncated {
                got: buf.len(),
                need,
            });
        }
        let path = (0..path_len)
            .map(|i| {
                let offset = FIXED_PREFIX_LEN + 4 * i;
                Ipv4Addr::from(BigEndian::read_u32(&buf[offset..offset + 4]))
            })
            .collect();
        Ok(Self {
            forward: buf[0] != 0,
            hops: buf[1],
            seq: BigEndian::read_u32(&buf[3..7]),
            dest: Ipv4Addr::from(BigEndian::read_u32(&buf[7..11])),
            origin: Ipv4Addr::from(BigEndian::read_u32(&buf[11..15])),
            path,
        })
    }
}

impl fmt::Display for PathHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seq {} {} {} -> {} via {:?} ({} hops)",
            self.seq,
            if self.forward { "fwd" } else { "rev" },
            self.origin,
            self.dest,
            self.path,
            self.hops,
        )
    }
}
