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
//! Module that executes all scenarios of a sweep and collects the telemetry.
use std::{fs, path::{Path, PathBuf}, time::Instant};

use indicatif::{ProgressBar, ProgressStyle};
use itertools::iproduct;

use super::{ExperimentConfig, Heuristic};
use crate::{
    failures::{FailureError, FailureInjector, FailureSample},
    records::{write_trial_report, PersistedSample, TrialRecord},
    sim::{SimError, Simulator, TrialSetup},
    topology::{NodeId, TopologyModel},
    util::{PathBufExt, RandomSource},
};

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("no server candidates available for region {0:?}")]
    NoServerCandidates(String),
    #[error(transparent)]
    Failure(#[from] FailureError),
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// What a finished sweep produced.
#[derive(Debug)]
pub struct SweepSummary {
    pub trials: usize,
    pub trace_files: Vec<PathBuf>,
    pub summary_csv: PathBuf,
    /// Final value of the random stream's run counter; one advance per trial.
    pub final_run_counter: u64,
}

/// Drives all (region, probability, run, heuristic) scenarios of one sweep.
///
/// Per run, the failure sample is drawn once and the server selected once;
/// all heuristics of that run execute under those shared conditions, then the
/// sample is reverted. The random stream is seeded once on entry and advances
/// its run counter once per trial.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler<'a> {
    config: &'a ExperimentConfig,
    model: &'a TopologyModel,
}

impl<'a> Scheduler<'a> {
    pub fn new(config: &'a ExperimentConfig, model: &'a TopologyModel) -> Self {
        Self { config, model }
    }

    pub fn run_all(&self, sim: &mut dyn Simulator) -> Result<SweepSummary, ExperimentError> {
        self.config.validate()?;
        // every configured region must offer a server before anything runs
        for region in &self.config.regions {
            if self
                .model
                .regions()
                .candidates(region)
                .map_or(true, |c| c.is_empty())
            {
                return Err(ExperimentError::NoServerCandidates(region.clone()));
            }
        }

        let mut random = match self.config.seed {
            Some(seed) => RandomSource::seeded(seed),
            None => RandomSource::from_wall_clock(),
        };
        log::info!("sweep seed: {}", random.seed());

        let injector = FailureInjector::new(self.model.regions());
        let probabilities = self.config.normalized_probabilities();

        fs::create_dir_all(&self.config.output_root)?;
        let summary_csv = self
            .config
            .output_root
            .join(format!("sweep_{}.csv", dorn_utils::ids::get_timestamp()));
        let mut csv_writer = csv::Writer::from_path(&summary_csv)?;

        let total = self.config.regions.len()
            * probabilities.len()
            * self.config.runs_per_config
            * self.config.heuristics.len();
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{wide_bar} {pos}/{len} time: {elapsed}").unwrap(),
        );
        bar.tick();

        let mut trace_files = Vec::with_capacity(total);
        for (region, probability) in iproduct!(&self.config.regions, &probabilities) {
            for run in 0..self.config.runs_per_config {
                let run_index = run + self.config.start_run_offset;

                // one sample and one server per run, shared by every
                // heuristic of that run
                let sample = injector.apply(region, *probability, &mut random, sim)?;
                let server = self.select_server(region, &mut random)?;
                let server_addr = self.model.address(server).ok_or_else(|| {
                    ExperimentError::InvalidConfig(format!("server node {server} has no address"))
                })?;

                self.persist_sample(&sample, region, *probability, run_index)?;

                for heuristic in &self.config.heuristics {
                    let counter = random.advance_run();
                    let heuristic_name = heuristic.to_string();
                    let trace_file =
                        self.auto_trace_file(region, *probability, *heuristic, run_index)?;
                    log::debug!(
                        "run counter {counter}: trace file {}",
                        trace_file.display()
                    );

                    let setup = TrialSetup {
                        region,
                        heuristic: &heuristic_name,
                        server,
                        server_addr,
                        peers: self.model.peers(),
                        contact_attempts: self.config.contact_attempts,
                        timeout: self.config.timeout,
                        client_start: self.config.client_start,
                        server_start: self.config.server_start,
                        app_stop: self.config.app_stop,
                        sim_length: self.config.sim_length,
                        trace_file: &trace_file,
                    };

                    let mut selector = heuristic.create();
                    let started = Instant::now();
                    let report = sim.run_trial(&setup, selector.as_mut(), &mut random)?;
                    write_trial_report(&trace_file, &report)?;

                    csv_writer.serialize(TrialRecord {
                        execution_timestamp: chrono::Local::now()
                            .format("%Y-%m-%d %H:%M:%S")
                            .to_string(),
                        region: region.clone(),
                        probability: *probability,
                        run: run_index,
                        heuristic: heuristic_name,
                        failed_nodes: sample.nodes.len(),
                        failed_links: sample.ifaces.len(),
                        server: server.0,
                        clients_total: report.clients_total,
                        clients_served: report.clients_served,
                        packets_sent: report.packets_sent,
                        packets_forwarded: report.packets_forwarded,
                        acks_received: report.acks_received,
                        t_trial: started.elapsed().as_secs_f64(),
                        trace_file: trace_file.display().to_string(),
                    })?;
                    csv_writer.flush()?;

                    trace_files.push(trace_file);
                    bar.inc(1);
                }

                injector.unapply(sample, sim, self.config.app_stop);
            }
        }
        bar.finish_and_clear();

        Ok(SweepSummary {
            trials: trace_files.len(),
            trace_files,
            summary_csv,
            final_run_counter: random.run(),
        })
    }

    /// Uniformly choose the node hosting this run's server from the region's
    /// candidate set.
    pub fn select_server(
        &self,
        region: &str,
        random: &mut RandomSource,
    ) -> Result<NodeId, ExperimentError> {
        let candidates = self
            .model
            .regions()
            .candidates(region)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ExperimentError::NoServerCandidates(region.to_string()))?;
        let index = random.pick_index(candidates.len());
        candidates
            .iter()
            .nth(index)
            .copied()
            .ok_or_else(|| ExperimentError::NoServerCandidates(region.to_string()))
    }

    /// Compose the trace path for one scenario, creating parent directories.
    /// An occupied path gets a `(0)`, `(1)`, ... suffix so prior results are
    /// never overwritten.
    fn auto_trace_file(
        &self,
        region: &str,
        probability: f64,
        heuristic: Heuristic,
        run_index: usize,
    ) -> Result<PathBuf, ExperimentError> {
        let dir = self.scenario_dir(region, probability).then(heuristic.to_string());
        fs::create_dir_all(&dir)?;
        Ok(unique_path(&dir, &format!("run{run_index}"), "out"))
    }

    fn persist_sample(
        &self,
        sample: &FailureSample,
        region: &str,
        probability: f64,
        run_index: usize,
    ) -> Result<(), ExperimentError> {
        let dir = self.scenario_dir(region, probability);
        fs::create_dir_all(&dir)?;
        let path = unique_path(&dir, &format!("sample_run{run_index}"), "json");
        PersistedSample {
            sample_id: dorn_utils::ids::sample_id(region, probability, run_index),
            sample: sample.clone(),
        }
        .write(path)?;
        Ok(())
    }

    fn scenario_dir(&self, region: &str, probability: f64) -> PathBuf {
        self.config
            .output_root
            .clone()
            .then(&self.config.topology_stem)
            .then(region.replace(' ', "_"))
            .then(format!("{probability:.1}"))
    }
}

/// First free path of the form `<stem>.<ext>`, `<stem>(0).<ext>`, ...
fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let mut candidate = dir.join(format!("{stem}.{ext}"));
    let mut suffix = 0;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}({suffix}).{ext}"));
        suffix += 1;
    }
    candidate
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        sim::DrillSim,
        topology::{LinkRecord, TopologyGraph},
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

    /// Tokyo holds nodes 0-1, NYC node 2; nodes 4 and 5 are stub nodes
    /// outside both regions and thus server candidates.
    fn test_graph() -> TopologyGraph {
        TopologyGraph {
            nodes: vec![],
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

    fn test_config(output_root: PathBuf) -> ExperimentConfig {
        ExperimentConfig {
            regions: vec!["Tokyo".to_string(), "NYC".to_string()],
            probabilities: vec![0.0, 0.5, 1.0],
            heuristics: vec![Heuristic::Direct, Heuristic::Random],
            runs_per_config: 3,
            topology_stem: "testnet".to_string(),
            seed: Some(42),
            output_root,
            ..Default::default()
        }
    }

    fn build_model(config: &ExperimentConfig) -> TopologyModel {
        TopologyModel::build(
            &test_graph(),
            &Latencies::new(),
            &Locations::new(),
            &config.topology_settings(),
        )
    }

    fn temp_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("dorn_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        root
    }

    #[test]
    fn test_end_to_end_sweep() {
        let root = temp_root("sweep");
        let config = test_config(root.clone());
        let model = build_model(&config);
        let mut sim = DrillSim::new();

        let summary = Scheduler::new(&config, &model).run_all(&mut sim).unwrap();

        // 2 regions x 3 probabilities x 3 runs x 2 heuristics
        assert_eq!(summary.trials, 36);
        assert_eq!(sim.trials_run(), 36);
        let distinct: HashSet<_> = summary.trace_files.iter().collect();
        assert_eq!(distinct.len(), 36);
        assert!(summary.trace_files.iter().all(|p| p.exists()));

        // every sample was reverted
        assert!(sim.offline_nodes().is_empty());
        assert!(sim.offline_ifaces().is_empty());

        // per-run sample files sit next to the trace directories
        assert!(root
            .join("testnet")
            .join("Tokyo")
            .join("0.5")
            .join("sample_run0.json")
            .exists());

        let mut reader = csv::Reader::from_path(&summary.summary_csv).unwrap();
        let records: Vec<TrialRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 36);
        for record in &records {
            if record.probability == 0.0 {
                assert_eq!((record.failed_nodes, record.failed_links), (0, 0));
            }
            if record.probability == 1.0 {
                match record.region.as_str() {
                    // Tokyo: 2 member nodes, 3 eligible links
                    "Tokyo" => assert_eq!((record.failed_nodes, record.failed_links), (2, 3)),
                    // NYC: 1 member node, 2 eligible links
                    "NYC" => assert_eq!((record.failed_nodes, record.failed_links), (1, 2)),
                    other => panic!("unexpected region {other}"),
                }
            }
        }

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_repeated_sweep_never_overwrites() {
        let root = temp_root("resweep");
        let config = test_config(root.clone());
        let model = build_model(&config);
        let mut sim = DrillSim::new();

        let scheduler = Scheduler::new(&config, &model);
        let first = scheduler.run_all(&mut sim).unwrap();
        let second = scheduler.run_all(&mut sim).unwrap();

        let first_files: HashSet<_> = first.trace_files.iter().collect();
        assert_eq!(second.trace_files.len(), 36);
        assert!(second.trace_files.iter().all(|p| !first_files.contains(p)));
        assert!(second.trace_files.iter().all(|p| p.exists()));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_trace_file_collision_suffix() {
        let root = temp_root("collision");
        let config = test_config(root.clone());
        let model = build_model(&config);
        let scheduler = Scheduler::new(&config, &model);

        let first = scheduler
            .auto_trace_file("New York", 0.5, Heuristic::Direct, 3)
            .unwrap();
        assert!(first.display().to_string().contains("New_York"));
        assert!(first.ends_with("run3.out"));
        fs::write(&first, b"").unwrap();

        let second = scheduler
            .auto_trace_file("New York", 0.5, Heuristic::Direct, 3)
            .unwrap();
        assert!(second.ends_with("run3(0).out"));
        fs::write(&second, b"").unwrap();

        let third = scheduler
            .auto_trace_file("New York", 0.5, Heuristic::Direct, 3)
            .unwrap();
        assert!(third.ends_with("run3(1).out"));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_empty_candidate_set_is_fatal() {
        let root = temp_root("nocand");
        // all nodes lie in the region, so nobody can host the server
        let graph = TopologyGraph {
            nodes: vec![],
            links: vec![link(0, 1, "Tokyo", "Tokyo"), link(1, 2, "Tokyo", "Tokyo")],
        };
        let config = ExperimentConfig {
            regions: vec!["Tokyo".to_string()],
            probabilities: vec![0.5],
            heuristics: vec![Heuristic::Direct],
            topology_stem: "testnet".to_string(),
            seed: Some(1),
            output_root: root.clone(),
            ..Default::default()
        };
        let model = TopologyModel::build(
            &graph,
            &Latencies::new(),
            &Locations::new(),
            &config.topology_settings(),
        );
        let mut sim = DrillSim::new();

        let result = Scheduler::new(&config, &model).run_all(&mut sim);
        assert!(matches!(
            result,
            Err(ExperimentError::NoServerCandidates(region)) if region == "Tokyo"
        ));
        // the sweep aborted before any simulated time advanced
        assert_eq!(sim.trials_run(), 0);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_run_counter_advances_once_per_trial() {
        let root = temp_root("counter");
        let config = test_config(root.clone());
        let model = build_model(&config);
        let mut sim = DrillSim::new();

        // one counter advance per trial, values never reused
        let summary = Scheduler::new(&config, &model).run_all(&mut sim).unwrap();
        assert_eq!(summary.trials, 36);
        assert_eq!(summary.final_run_counter, 36);

        fs::remove_dir_all(&root).unwrap();
    }
}
