//! Plan representation: one ordered action route per vehicle.
//!
//! A plan is the unit the local search operates on. Plans are immutable
//! after construction; every local move builds a new plan from copies of the
//! affected routes. Total cost is computed on first use and cached, so
//! repeated comparisons against the same plan are free.

use crate::error::PlannerError;
use crate::instance::{Instance, Task};
use crate::topology::City;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

/// What a scheduled action does with its task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Pick,
    Deliver,
}

/// A single scheduled event: pick up or deliver one task
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub event: Event,
    pub task: Task,
}

impl Action {
    pub fn pick(task: Task) -> Self {
        Action { event: Event::Pick, task }
    }

    pub fn deliver(task: Task) -> Self {
        Action { event: Event::Deliver, task }
    }

    /// Signed load change this action applies to its vehicle
    #[inline]
    pub fn differential_weight(&self) -> i64 {
        match self.event {
            Event::Pick => self.task.weight as i64,
            Event::Deliver => -(self.task.weight as i64),
        }
    }

    /// City the vehicle must be in to execute this action
    #[inline]
    pub fn target(&self) -> City {
        match self.event {
            Event::Pick => self.task.pickup,
            Event::Deliver => self.task.delivery,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.event {
            Event::Pick => "pick",
            Event::Deliver => "deliver",
        };
        write!(f, "{} task {} ({})", verb, self.task.id, self.task.weight)
    }
}

/// One action route per vehicle, in the instance's vehicle order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    routes: Vec<Vec<Action>>,
    #[serde(skip)]
    cost: OnceCell<f64>,
}

impl Plan {
    pub fn new(routes: Vec<Vec<Action>>) -> Self {
        Plan {
            routes,
            cost: OnceCell::new(),
        }
    }

    /// A plan where every vehicle stays home
    pub fn empty(num_vehicles: usize) -> Self {
        Plan::new(vec![Vec::new(); num_vehicles])
    }

    pub fn routes(&self) -> &[Vec<Action>] {
        &self.routes
    }

    pub fn route(&self, vehicle: usize) -> &[Action] {
        &self.routes[vehicle]
    }

    /// Indices of vehicles with at least one action scheduled
    pub fn non_empty_vehicles(&self) -> Vec<usize> {
        (0..self.routes.len())
            .filter(|&vehicle| !self.routes[vehicle].is_empty())
            .collect()
    }

    /// Total number of scheduled actions across all vehicles
    pub fn num_actions(&self) -> usize {
        self.routes.iter().map(|route| route.len()).sum()
    }

    /// Total travel cost of the plan, cached after the first call.
    pub fn cost(&self, instance: &Instance) -> f64 {
        *self.cost.get_or_init(|| self.compute_cost(instance))
    }

    fn compute_cost(&self, instance: &Instance) -> f64 {
        let mut total = 0.0;
        for (vehicle, route) in instance.vehicles.iter().zip(&self.routes) {
            let mut current = vehicle.home;
            for action in route {
                let target = action.target();
                total += instance.topology.distance(current, target) * vehicle.cost_per_km;
                current = target;
            }
        }
        total
    }

    /// Vehicle load after each action of a route
    pub fn load_trace(&self, vehicle: usize) -> Vec<i64> {
        let mut load = 0;
        self.routes[vehicle]
            .iter()
            .map(|action| {
                load += action.differential_weight();
                load
            })
            .collect()
    }

    /// Check the plan invariants against a task set:
    /// every task picked up exactly once and delivered exactly once, both in
    /// the same route with pickup first, and no vehicle ever overloaded or
    /// carrying a negative load. Violations are programming errors in the
    /// move generation, so this runs as a debug assertion in the search.
    pub fn validate(&self, instance: &Instance, tasks: &[Task]) -> Result<(), String> {
        if self.routes.len() != instance.vehicles.len() {
            return Err(format!(
                "plan has {} routes for {} vehicles",
                self.routes.len(),
                instance.vehicles.len()
            ));
        }

        // (route, index) of each pick and each delivery, by task id
        let mut picks: HashMap<usize, (usize, usize)> = HashMap::new();
        let mut deliveries: HashMap<usize, (usize, usize)> = HashMap::new();

        for (vehicle, route) in self.routes.iter().enumerate() {
            let mut load: i64 = 0;
            let capacity = instance.vehicles[vehicle].capacity as i64;

            for (index, action) in route.iter().enumerate() {
                let seen = match action.event {
                    Event::Pick => picks.insert(action.task.id, (vehicle, index)),
                    Event::Deliver => deliveries.insert(action.task.id, (vehicle, index)),
                };
                if seen.is_some() {
                    return Err(format!("duplicate {}", action));
                }

                load += action.differential_weight();
                if load < 0 {
                    return Err(format!(
                        "vehicle {} load went negative at step {}",
                        vehicle, index
                    ));
                }
                if load > capacity {
                    return Err(format!(
                        "vehicle {} overloaded at step {}: {} > {}",
                        vehicle, index, load, capacity
                    ));
                }
            }
        }

        for task in tasks {
            let pick = picks
                .get(&task.id)
                .ok_or_else(|| format!("task {} is never picked up", task.id))?;
            let delivery = deliveries
                .get(&task.id)
                .ok_or_else(|| format!("task {} is never delivered", task.id))?;
            if pick.0 != delivery.0 {
                return Err(format!(
                    "task {} picked up by vehicle {} but delivered by vehicle {}",
                    task.id, pick.0, delivery.0
                ));
            }
            if pick.1 >= delivery.1 {
                return Err(format!("task {} delivered before pickup", task.id));
            }
        }

        if picks.len() != tasks.len() || deliveries.len() != tasks.len() {
            return Err("plan schedules tasks outside the working set".to_string());
        }

        Ok(())
    }

    /// Expand the plan into per-vehicle itineraries with explicit road
    /// waypoints. Task objects stored in actions may be stale copies from a
    /// previous planning round, so every task is re-resolved by id through
    /// the caller-supplied lookup before being emitted.
    pub fn itineraries(
        &self,
        instance: &Instance,
        lookup: &HashMap<usize, Task>,
    ) -> Result<Vec<Itinerary>, PlannerError> {
        let mut itineraries = Vec::with_capacity(self.routes.len());

        for (vehicle, route) in instance.vehicles.iter().zip(&self.routes) {
            let mut steps = Vec::new();
            let mut current = vehicle.home;

            for action in route {
                let task = *lookup
                    .get(&action.task.id)
                    .ok_or(PlannerError::UnknownTask(action.task.id))?;

                let target = match action.event {
                    Event::Pick => task.pickup,
                    Event::Deliver => task.delivery,
                };
                for city in instance.topology.path(current, target) {
                    steps.push(Step::Move(city));
                }
                steps.push(match action.event {
                    Event::Pick => Step::Pickup(task),
                    Event::Deliver => Step::Deliver(task),
                });
                current = target;
            }

            itineraries.push(Itinerary {
                vehicle: vehicle.id,
                steps,
            });
        }

        Ok(itineraries)
    }
}

/// One step of an executable itinerary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Drive to the next city on the shortest route
    Move(City),
    /// Pick the task up in its pickup city
    Pickup(Task),
    /// Deliver the task in its delivery city
    Deliver(Task),
}

/// Executable schedule for one vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Itinerary {
    pub vehicle: usize,
    pub steps: Vec<Step>,
}
