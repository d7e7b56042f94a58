//! Benchmarking and experimentation module.
//!
//! Runs every planner several times on a set of instances under one time
//! budget, collects per-run rows, aggregates summary statistics, and
//! exports both as CSV. Every run owns its planner and random stream, so
//! runs parallelize freely.

use crate::error::PlannerError;
use crate::instance::Instance;
use crate::plan::Plan;
use crate::planner::{
    NaivePlanner, Planner, PopulationConfig, PopulationPlanner, SearchProfile, SlsPlanner,
};

use chrono::Local;
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Planners exercised by the benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerKind {
    Naive,
    SlsFast,
    SlsOptimal,
    Population,
}

impl PlannerKind {
    pub const ALL: [PlannerKind; 4] = [
        PlannerKind::Naive,
        PlannerKind::SlsFast,
        PlannerKind::SlsOptimal,
        PlannerKind::Population,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PlannerKind::Naive => "naive",
            PlannerKind::SlsFast => "sls-fast",
            PlannerKind::SlsOptimal => "sls-optimal",
            PlannerKind::Population => "population",
        }
    }

    /// Build a fresh planner and produce its final plan for the instance
    pub fn solve(
        &self,
        instance: &Instance,
        seed: u64,
        budget: Duration,
    ) -> Result<Plan, PlannerError> {
        let tasks = instance.tasks.clone();
        match self {
            PlannerKind::Naive => NaivePlanner::new(tasks).generate_plans(instance, budget),
            PlannerKind::SlsFast => {
                SlsPlanner::with_seed(tasks, seed).solve(instance, &SearchProfile::fast(), budget)
            }
            PlannerKind::SlsOptimal => SlsPlanner::with_seed(tasks, seed).solve(
                instance,
                &SearchProfile::optimal(),
                budget,
            ),
            PlannerKind::Population => {
                let config = PopulationConfig {
                    seed,
                    ..PopulationConfig::default()
                };
                PopulationPlanner::new(tasks, config).generate_final_plans(instance, budget)
            }
        }
    }
}

/// Result of one planner run on one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub planner: String,
    pub instance: String,
    pub num_tasks: usize,
    pub num_vehicles: usize,
    pub seed: u64,
    pub cost: f64,
    pub time: f64,
}

/// Aggregated statistics for one planner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerStatistics {
    pub planner: String,
    pub runs: usize,
    pub avg_cost: f64,
    pub best_cost: f64,
    pub worst_cost: f64,
    pub std_cost: f64,
    pub avg_time: f64,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of runs per planner (seeds 0..num_runs)
    pub num_runs: usize,
    /// Time limit per run in seconds
    pub time_limit: f64,
    /// Run in parallel
    pub parallel: bool,
    /// Output directory for CSV exports
    pub output_dir: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 5,
            time_limit: 10.0,
            parallel: true,
            output_dir: "results".to_string(),
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunResult>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
        }
    }

    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    /// Run every planner `num_runs` times on one instance
    pub fn run_on_instance(&mut self, instance: &Instance) {
        log::info!("Running benchmark on instance: {}", instance.name);

        let budget = Duration::from_secs_f64(self.config.time_limit);
        let jobs: Vec<(PlannerKind, u64)> = PlannerKind::ALL
            .iter()
            .flat_map(|&kind| (0..self.config.num_runs as u64).map(move |seed| (kind, seed)))
            .collect();

        let bar = ProgressBar::new(jobs.len() as u64);
        bar.set_message(instance.name.clone());

        let run_one = |&(kind, seed): &(PlannerKind, u64)| -> Option<RunResult> {
            let start = Instant::now();
            let plan = match kind.solve(instance, seed, budget) {
                Ok(plan) => plan,
                Err(error) => {
                    log::error!("{} failed on {}: {}", kind.name(), instance.name, error);
                    bar.inc(1);
                    return None;
                }
            };
            let result = RunResult {
                planner: kind.name().to_string(),
                instance: instance.name.clone(),
                num_tasks: instance.tasks.len(),
                num_vehicles: instance.vehicles.len(),
                seed,
                cost: plan.cost(instance),
                time: start.elapsed().as_secs_f64(),
            };
            bar.inc(1);
            Some(result)
        };

        let results: Vec<RunResult> = if self.config.parallel {
            jobs.par_iter().filter_map(run_one).collect()
        } else {
            jobs.iter().filter_map(run_one).collect()
        };
        bar.finish_and_clear();

        self.results.extend(results);
    }

    /// Run the full benchmark on multiple instances
    pub fn run_on_instances(&mut self, instances: &[Instance]) {
        for instance in instances {
            self.run_on_instance(instance);
        }
    }

    /// Aggregate per-planner statistics over all recorded runs
    pub fn compute_statistics(&self) -> Vec<PlannerStatistics> {
        let mut by_planner: HashMap<&str, Vec<&RunResult>> = HashMap::new();
        for result in &self.results {
            by_planner
                .entry(result.planner.as_str())
                .or_default()
                .push(result);
        }

        let mut statistics = Vec::new();
        for (planner, results) in by_planner {
            let costs: Vec<f64> = results.iter().map(|r| r.cost).collect();
            let times: Vec<f64> = results.iter().map(|r| r.time).collect();

            statistics.push(PlannerStatistics {
                planner: planner.to_string(),
                runs: results.len(),
                avg_cost: (&costs).mean(),
                best_cost: (&costs).min(),
                worst_cost: (&costs).max(),
                std_cost: if costs.len() > 1 { (&costs).std_dev() } else { 0.0 },
                avg_time: (&times).mean(),
            });
        }

        statistics.sort_by(|a, b| a.avg_cost.partial_cmp(&b.avg_cost).unwrap());
        statistics
    }

    /// Export per-run results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export aggregated statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Write both CSV files into the configured output directory, stamped
    /// with the current time. Returns the two paths.
    pub fn export_all(&self) -> std::io::Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let stamp = Local::now().format("%Y%m%d-%H%M%S");

        let runs_path = Path::new(&self.config.output_dir).join(format!("runs-{}.csv", stamp));
        let stats_path =
            Path::new(&self.config.output_dir).join(format!("summary-{}.csv", stamp));

        self.export_to_csv(&runs_path)?;
        self.export_statistics_csv(&stats_path)?;
        Ok((runs_path, stats_path))
    }

    /// Generate a human-readable summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       Planner Benchmark Report\n");
        report.push_str("========================================\n\n");

        report.push_str(&format!(
            "{:<15} {:>6} {:>12} {:>12} {:>12} {:>10}\n",
            "Planner", "Runs", "Avg Cost", "Best Cost", "Std Cost", "Avg Time"
        ));
        report.push_str("-".repeat(72).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            report.push_str(&format!(
                "{:<15} {:>6} {:>12.2} {:>12.2} {:>12.2} {:>10.4}\n",
                stat.planner, stat.runs, stat.avg_cost, stat.best_cost, stat.std_cost,
                stat.avg_time
            ));
        }

        report
    }
}

/// Load every `.txt` instance in a directory, sorted by name
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<Instance>, String> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| format!("Cannot read instance directory: {}", e))?;

    let mut instances = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| format!("Cannot read directory entry: {}", e))?;
        let path = entry.path();
        if path.extension().map(|ext| ext == "txt").unwrap_or(false) {
            instances.push(Instance::from_file(&path)?);
        }
    }

    instances.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(instances)
}
