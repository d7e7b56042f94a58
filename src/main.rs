//! Pickup-and-Delivery VRP Solver - Command Line Interface

use clap::{Parser, Subcommand, ValueEnum};
use pd_vrp_solver::benchmark::{load_instances_from_dir, Benchmark, BenchmarkConfig};
use pd_vrp_solver::instance::Instance;
use pd_vrp_solver::plan::Plan;
use pd_vrp_solver::planner::{
    NaivePlanner, Planner, PopulationConfig, PopulationPlanner, SlsPlanner,
};
use serde::Serialize;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "pd-vrp-solver")]
#[command(version = "1.0")]
#[command(about = "A multi-vehicle pickup-and-delivery routing solver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance and print the committed plan
    Solve {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Planner to use
        #[arg(short, long, value_enum, default_value = "sls")]
        planner: PlannerChoice,

        /// Stop at the fast profile instead of running the final search
        #[arg(long)]
        fast: bool,

        /// Time limit in seconds
        #[arg(short, long, default_value = "30")]
        time_limit: f64,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Write the solve report to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Feed tasks to the planner one at a time, printing the marginal cost
    /// of each extension, then commit to a final plan
    Incremental {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Time limit per marginal-cost estimate in seconds
        #[arg(long, default_value = "1")]
        estimate_time_limit: f64,

        /// Time limit for the final plan in seconds
        #[arg(long, default_value = "30")]
        final_time_limit: f64,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,
    },

    /// Compare all planners on one instance
    Compare {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Number of runs per planner
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Time limit per run in seconds
        #[arg(short, long, default_value = "10")]
        time_limit: f64,

        /// Output CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run benchmarks on a directory of instances
    Benchmark {
        /// Directory containing `.txt` instance files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Number of runs per planner
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Time limit per run in seconds
        #[arg(short, long, default_value = "10")]
        time_limit: f64,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum PlannerChoice {
    /// Sequential single-vehicle baseline
    Naive,
    /// Stochastic local search
    Sls,
    /// Stochastic local search with random restart seeds
    SlsRandom,
    /// Population of random plans mutated by local moves
    Population,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            instance,
            planner,
            fast,
            time_limit,
            seed,
            output,
            verbose,
        } => {
            solve_instance(&instance, planner, fast, time_limit, seed, output, verbose);
        }

        Commands::Incremental {
            instance,
            estimate_time_limit,
            final_time_limit,
            seed,
        } => {
            run_incremental(&instance, estimate_time_limit, final_time_limit, seed);
        }

        Commands::Analyze { instance } => {
            analyze_instance(&instance);
        }

        Commands::Compare {
            instance,
            runs,
            time_limit,
            output,
        } => {
            compare_planners(&instance, runs, time_limit, output);
        }

        Commands::Benchmark {
            dir,
            output,
            runs,
            time_limit,
        } => {
            run_benchmark(&dir, &output, runs, time_limit);
        }
    }
}

fn load_instance(path: &PathBuf) -> Instance {
    match Instance::from_file(path) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("Error loading instance: {}", e);
            std::process::exit(1);
        }
    }
}

fn build_planner(choice: PlannerChoice, instance: &Instance, seed: u64) -> Box<dyn Planner> {
    let tasks = instance.tasks.clone();
    match choice {
        PlannerChoice::Naive => Box::new(NaivePlanner::new(tasks)),
        PlannerChoice::Sls => Box::new(SlsPlanner::with_seed(tasks, seed)),
        PlannerChoice::SlsRandom => Box::new(SlsPlanner::random_initial(tasks, seed)),
        PlannerChoice::Population => Box::new(PopulationPlanner::new(
            tasks,
            PopulationConfig {
                seed,
                ..PopulationConfig::default()
            },
        )),
    }
}

/// Report written by the solve command
#[derive(Serialize)]
struct SolveReport {
    instance: String,
    planner: String,
    cost: f64,
    computation_time: f64,
    itineraries: Vec<pd_vrp_solver::plan::Itinerary>,
}

fn solve_instance(
    path: &PathBuf,
    choice: PlannerChoice,
    fast: bool,
    time_limit: f64,
    seed: u64,
    output: Option<PathBuf>,
    verbose: bool,
) {
    println!("Loading instance from {:?}...", path);
    let instance = load_instance(path);

    if verbose {
        println!("{}", instance.statistics());
    }

    let budget = Duration::from_secs_f64(time_limit);
    let mut planner = build_planner(choice, &instance, seed);

    println!("Solving with {:?} planner...", choice);
    let start = Instant::now();
    let result = if fast {
        planner.generate_plans(&instance, budget)
    } else {
        planner.generate_final_plans(&instance, budget)
    };
    let elapsed = start.elapsed().as_secs_f64();

    let plan = match result {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Planning failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("Plan found in {:.2}s", elapsed);
    println!("Overall cost of plans: {:.2}", plan.cost(&instance));
    print_plan(&instance, &plan);

    if let Some(output_path) = output {
        let lookup: HashMap<usize, _> =
            instance.tasks.iter().map(|task| (task.id, *task)).collect();
        let itineraries = match plan.itineraries(&instance, &lookup) {
            Ok(itineraries) => itineraries,
            Err(e) => {
                eprintln!("Cannot emit itineraries: {}", e);
                std::process::exit(1);
            }
        };

        let report = SolveReport {
            instance: instance.name.clone(),
            planner: format!("{:?}", choice),
            cost: plan.cost(&instance),
            computation_time: elapsed,
            itineraries,
        };

        match std::fs::File::create(&output_path)
            .map_err(|e| e.to_string())
            .and_then(|file| serde_json::to_writer_pretty(file, &report).map_err(|e| e.to_string()))
        {
            Ok(()) => println!("Report written to {:?}", output_path),
            Err(e) => eprintln!("Cannot write report: {}", e),
        }
    }
}

fn print_plan(instance: &Instance, plan: &Plan) {
    for (vehicle, route) in instance.vehicles.iter().zip(plan.routes()) {
        if route.is_empty() {
            println!("  vehicle {}: idle", vehicle.id);
            continue;
        }
        let actions: Vec<String> = route.iter().map(|action| action.to_string()).collect();
        println!("  vehicle {}: {}", vehicle.id, actions.join(", "));
    }
}

fn run_incremental(path: &PathBuf, estimate_time_limit: f64, final_time_limit: f64, seed: u64) {
    let instance = load_instance(path);
    let estimate_budget = Duration::from_secs_f64(estimate_time_limit);

    let mut planner: Box<dyn Planner> = Box::new(SlsPlanner::with_seed(Vec::new(), seed));
    let mut committed_cost = 0.0;

    for task in &instance.tasks {
        let mut extended = match planner.extend_plan(&instance, *task) {
            Ok(extended) => extended,
            Err(e) => {
                println!("task {}: rejected ({})", task.id, e);
                continue;
            }
        };

        let extended_cost = match extended.generate_plans(&instance, estimate_budget) {
            Ok(plan) => plan.cost(&instance),
            Err(e) => {
                eprintln!("Planning failed: {}", e);
                std::process::exit(1);
            }
        };

        let marginal = extended_cost - committed_cost;
        println!(
            "task {}: marginal cost {:.2} (reward {:.2}, plan cost {:.2})",
            task.id, marginal, task.reward, extended_cost
        );

        planner = extended;
        committed_cost = extended_cost;
    }

    println!("\nCommitting to a final plan for {} tasks...", planner.tasks().len());
    let final_budget = Duration::from_secs_f64(final_time_limit);
    match planner.generate_final_plans(&instance, final_budget) {
        Ok(plan) => {
            println!("Final cost: {:.2}", plan.cost(&instance));
            print_plan(&instance, &plan);
        }
        Err(e) => {
            eprintln!("Planning failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn analyze_instance(path: &PathBuf) {
    let instance = load_instance(path);
    println!("{}", instance.statistics());
}

fn compare_planners(path: &PathBuf, runs: usize, time_limit: f64, output: Option<PathBuf>) {
    let instance = load_instance(path);

    let config = BenchmarkConfig {
        num_runs: runs,
        time_limit,
        ..BenchmarkConfig::default()
    };
    let mut benchmark = Benchmark::new(config);
    benchmark.run_on_instance(&instance);

    println!("{}", benchmark.generate_report());

    if let Some(output_path) = output {
        match benchmark.export_to_csv(&output_path) {
            Ok(()) => println!("Results exported to {:?}", output_path),
            Err(e) => eprintln!("Cannot export results: {}", e),
        }
    }
}

fn run_benchmark(dir: &PathBuf, output: &PathBuf, runs: usize, time_limit: f64) {
    let instances = match load_instances_from_dir(dir) {
        Ok(instances) => instances,
        Err(e) => {
            eprintln!("Error loading instances: {}", e);
            std::process::exit(1);
        }
    };

    if instances.is_empty() {
        eprintln!("No .txt instances found in {:?}", dir);
        std::process::exit(1);
    }
    println!("Loaded {} instances", instances.len());

    let config = BenchmarkConfig {
        num_runs: runs,
        time_limit,
        parallel: true,
        output_dir: output.to_string_lossy().to_string(),
    };
    let mut benchmark = Benchmark::new(config);
    benchmark.run_on_instances(&instances);

    println!("{}", benchmark.generate_report());

    match benchmark.export_all() {
        Ok((runs_path, stats_path)) => {
            println!("Results exported to {:?}", runs_path);
            println!("Statistics exported to {:?}", stats_path);
        }
        Err(e) => eprintln!("Cannot export results: {}", e),
    }
}
