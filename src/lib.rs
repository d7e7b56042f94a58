//! Multi-Vehicle Pickup-and-Delivery Solver Library
//!
//! A solver for capacitated multi-vehicle pickup-and-delivery routing,
//! built around a stochastic local search over per-vehicle action routes.
//!
//! # Features
//!
//! - Plan representation with per-vehicle routes, capacity/precedence
//!   validation, and cached cost evaluation
//! - Stochastic local search with restart schedule, sideways moves, and
//!   wall-clock budgets (fast and optimal profiles)
//! - Incremental re-planning: extend a planner with one more task and
//!   warm-start the next search from the existing solution
//! - Naive sequential and population-based baseline planners
//! - Benchmarking and CSV reporting tools
//!
//! # Example
//!
//! ```no_run
//! use pd_vrp_solver::instance::Instance;
//! use pd_vrp_solver::planner::{Planner, SlsPlanner};
//! use std::time::Duration;
//!
//! let instance = Instance::from_file("instance.txt").unwrap();
//! let mut planner = SlsPlanner::new(instance.tasks.clone());
//!
//! let plan = planner
//!     .generate_final_plans(&instance, Duration::from_secs(30))
//!     .unwrap();
//! println!("Plan cost: {:.2}", plan.cost(&instance));
//! ```

pub mod benchmark;
pub mod error;
pub mod instance;
pub mod plan;
pub mod planner;
pub mod topology;

pub use error::PlannerError;
pub use instance::{Instance, Task, Vehicle};
pub use plan::{Action, Event, Itinerary, Plan, Step};
pub use planner::{Planner, SearchProfile, SlsPlanner};
pub use topology::{City, Topology};
