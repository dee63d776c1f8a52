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
use std::path::PathBuf;

use clap::Parser;
use strum::IntoEnumIterator;

use dorn::{
    experiments::{ExperimentConfig, Heuristic, Scheduler},
    sim::{DrillSim, SimTime},
    topology::{load_latencies, load_locations, TopologyGraph, TopologyModel},
    util,
};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Topology graph handed back by the external reader (JSON).
    #[arg(short, long)]
    topology: PathBuf,
    /// Optional latency table for link delays.
    #[arg(long)]
    latencies: Option<PathBuf>,
    /// Optional location table for geographic positions.
    #[arg(long)]
    locations: Option<PathBuf>,
    /// Disaster regions to sweep over.
    #[arg(short, long = "region", required = true)]
    regions: Vec<String>,
    /// Failure probabilities to sweep over.
    #[arg(short, long = "fail-prob", default_values_t = [0.0, 0.5, 1.0])]
    fail_probs: Vec<f64>,
    /// Heuristics to compare; all of them when omitted.
    #[arg(long = "heuristic")]
    heuristics: Vec<Heuristic>,
    /// Number of runs per configuration.
    #[arg(long, default_value_t = 1)]
    runs: usize,
    /// Starting run number, used to extend an existing results directory.
    #[arg(long, default_value_t = 0)]
    start_run: usize,
    /// Contacts each overlay client attempts per trial.
    #[arg(long, default_value_t = 10)]
    contact_attempts: u32,
    /// Client communication timeout in simulated seconds.
    #[arg(long, default_value_t = 5.0)]
    timeout: f64,
    /// Device count a node needs to qualify as a server candidate.
    #[arg(long, default_value_t = 2)]
    server_degree: u32,
    /// Device count ceiling for overlay participation; 0 admits all nodes.
    #[arg(long, default_value_t = 0)]
    overlay_degree_max: u32,
    /// Simulated length of one trial in seconds.
    #[arg(long, default_value_t = 10.0)]
    sim_length: f64,
    /// Root directory for trace output.
    #[arg(short, long, default_value = "dorn_output")]
    output: PathBuf,
    /// Fixed seed to reproduce a sweep.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();

    let args = Args::parse();

    let graph = TopologyGraph::from_json(&args.topology)?;
    let latencies = args
        .latencies
        .as_ref()
        .map(|p| load_latencies(p))
        .transpose()?
        .unwrap_or_default();
    let locations = args
        .locations
        .as_ref()
        .map(|p| load_locations(p))
        .transpose()?
        .unwrap_or_default();

    let heuristics = if args.heuristics.is_empty() {
        Heuristic::iter().collect()
    } else {
        args.heuristics
    };
    let topology_stem = args
        .topology
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let config = ExperimentConfig {
        regions: args.regions,
        probabilities: args.fail_probs,
        heuristics,
        runs_per_config: args.runs,
        start_run_offset: args.start_run,
        contact_attempts: args.contact_attempts,
        timeout: SimTime::from_secs(args.timeout),
        server_degree: args.server_degree,
        overlay_degree_max: args.overlay_degree_max,
        sim_length: SimTime::from_secs(args.sim_length),
        output_root: args.output,
        topology_stem,
        seed: args.seed,
        ..Default::default()
    };

    let model = TopologyModel::build(&graph, &latencies, &locations, &config.topology_settings());
    log::info!(
        "loaded {} links, {} overlay participants",
        model.links().len(),
        model.peers().len()
    );
    for region in &config.regions {
        log::info!(
            "{region}: {} member nodes, {} server candidates",
            model.regions().members(region).map_or(0, |m| m.len()),
            model.regions().candidates(region).map_or(0, |c| c.len()),
        );
    }

    let mut sim = DrillSim::new();
    let summary = Scheduler::new(&config, &model).run_all(&mut sim)?;

    println!(
        "{} trials executed, summary written to {}",
        summary.trials,
        summary.summary_csv.display()
    );

    Ok(())
}
