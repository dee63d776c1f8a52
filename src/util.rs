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
//! Utility module collection of functions
use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use itertools::Itertools;
use lazy_static::lazy_static;
use rand::{rngs::StdRng, Rng, SeedableRng};
use regex::Regex;

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// The random stream shared by the sweep.
///
/// One stream per sweep, seeded once; every trial advances the run counter,
/// which switches to a fresh stream derived from (seed, run). Counter values
/// are monotonically increasing and never reused, so two trials never share
/// draws while a fixed seed still reproduces the whole sweep.
#[derive(Debug, Clone)]
pub struct RandomSource {
    seed: u64,
    run: u64,
    rng: StdRng,
}

impl RandomSource {
    /// Seed from the wall clock. Sweeps seeded this way are not reproducible.
    pub fn from_wall_clock() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::seeded(nanos)
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            seed,
            run: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn run(&self) -> u64 {
        self.run
    }

    /// Switch to the stream of the next run and return its counter value.
    pub fn advance_run(&mut self) -> u64 {
        self.run += 1;
        self.rng = StdRng::seed_from_u64(self.seed ^ self.run.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        self.run
    }

    /// One uniform draw in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.rng.gen()
    }

    /// Uniformly pick an index below `len`. Panics if `len` is zero.
    pub fn pick_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

pub trait PathBufExt: Sized {
    fn then(self, p: impl AsRef<Path>) -> PathBuf;
}

impl PathBufExt for PathBuf {
    fn then(mut self, p: impl AsRef<Path>) -> PathBuf {
        self.push(p);
        self
    }
}

impl PathBufExt for &Path {
    fn then(self, p: impl AsRef<Path>) -> PathBuf {
        let mut path = self.to_path_buf();
        path.push(p);
        path
    }
}

/// Allows filtering trace data to be processed.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub topo: String,
    pub region: String,
    pub heuristic: String,
}

/// One trace file found below the output root, identified by its scenario key.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFile {
    pub topo: String,
    pub region: String,
    pub probability: f64,
    pub heuristic: String,
    pub run: usize,
    pub path: PathBuf,
}

lazy_static! {
    static ref RUN_FILE: Regex = Regex::new(r"^run(?P<run>\d+)(?:\(\d+\))?\.out$").unwrap();
}

/// Extract the run index from a trace file name, ignoring any collision
/// suffix (`run3(1).out` -> 3).
pub fn get_run_index(file_name: impl AsRef<str>) -> Option<usize> {
    RUN_FILE
        .captures(file_name.as_ref())?
        .name("run")?
        .as_str()
        .parse()
        .ok()
}

/// Walk the trace output tree
/// (`<root>/<topo>/<region>/<probability>/<heuristic>/run<N>.out`) and return
/// all trace files matching the filter, sorted by path.
pub fn filter_traces(root: impl AsRef<Path>, filter: &Filter) -> Vec<TraceFile> {
    let mut out = Vec::new();
    let Ok(topo_dirs) = fs::read_dir(root.as_ref()) else {
        return out;
    };
    for topo_dir in topo_dirs.flatten() {
        let topo = topo_dir.file_name().to_string_lossy().to_string();
        if !topo.contains(&filter.topo) {
            continue;
        }
        for region_dir in read_entries(&topo_dir.path()) {
            let region = region_dir.file_name().unwrap().to_string_lossy().to_string();
            if !region.contains(&filter.region) {
                continue;
            }
            for prob_dir in read_entries(&region_dir) {
                let Ok(probability) = prob_dir
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .parse::<f64>()
                else {
                    continue;
                };
                for heuristic_dir in read_entries(&prob_dir) {
                    let heuristic = heuristic_dir
                        .file_name()
                        .unwrap()
                        .to_string_lossy()
                        .to_string();
                    if !heuristic.contains(&filter.heuristic) {
                        continue;
                    }
                    for file in read_entries(&heuristic_dir) {
                        let name = file.file_name().unwrap().to_string_lossy().to_string();
                        if let Some(run) = get_run_index(&name) {
                            out.push(TraceFile {
                                topo: topo.clone(),
                                region: region.clone(),
                                probability,
                                heuristic: heuristic.clone(),
                                run,
                                path: file,
                            });
                        }
                    }
                }
            }
        }
    }
    out.into_iter().sorted_by(|a, b| a.path.cmp(&b.path)).collect()
}

fn read_entries(path: &Path) -> Vec<PathBuf> {
    fs::read_dir(path)
        .map(|entries| entries.flatten().map(|e| e.path()).collect())
        .unwrap_or_default()
}
