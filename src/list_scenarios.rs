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
//! Binary printing the scenario plan of a sweep without simulating anything.
use clap::Parser;
use strum::IntoEnumIterator;

use dorn::{
    experiments::{ExperimentConfig, Heuristic},
    util,
};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
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
    /// Starting run number.
    #[arg(long, default_value_t = 0)]
    start_run: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();

    let args = Args::parse();
    let heuristics = if args.heuristics.is_empty() {
        Heuristic::iter().collect()
    } else {
        args.heuristics
    };

    let config = ExperimentConfig {
        regions: args.regions,
        probabilities: args.fail_probs,
        heuristics,
        runs_per_config: args.runs,
        start_run_offset: args.start_run,
        ..Default::default()
    };
    config.validate()?;

    let scenarios = config.scenarios();
    for scenario in &scenarios {
        println!("{scenario}");
    }
    println!("total: {} trials", scenarios.len());

    Ok(())
}
