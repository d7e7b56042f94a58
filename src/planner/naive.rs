//! Sequential, naive baseline planner.
//!
//! Its plan *is* the sequential assignment: every task handled one after
//! the other by the biggest vehicle. No search ever runs, so fast and
//! final plans coincide. Useful as the centralized-mode baseline and as
//! the yardstick the search planners are measured against.

use crate::error::PlannerError;
use crate::instance::{self, Instance, Task};
use crate::plan::{Action, Plan};
use crate::planner::sls::sequential_assignment;
use crate::planner::Planner;
use std::time::Duration;

pub struct NaivePlanner {
    tasks: Vec<Task>,
    cached: Option<Plan>,
}

impl NaivePlanner {
    pub fn new(tasks: Vec<Task>) -> Self {
        NaivePlanner {
            tasks,
            cached: None,
        }
    }

    fn plan(&mut self, instance: &Instance) -> Result<Plan, PlannerError> {
        if let Some(plan) = &self.cached {
            return Ok(plan.clone());
        }
        let plan = sequential_assignment(instance, &self.tasks)?;
        self.cached = Some(plan.clone());
        Ok(plan)
    }

    /// Extend without rebuilding from scratch: the new pickup/delivery pair
    /// is appended to the biggest vehicle's existing route. `self` is
    /// unchanged.
    pub fn extend(&self, instance: &Instance, extra: Task) -> Result<NaivePlanner, PlannerError> {
        let biggest = instance::biggest_vehicle_index(&instance.vehicles)
            .ok_or_else(|| PlannerError::Infeasible("fleet is empty".to_string()))?;
        if instance.vehicles[biggest].capacity < extra.weight {
            return Err(PlannerError::Infeasible(
                "biggest vehicle is too small for new task".to_string(),
            ));
        }

        let base = match &self.cached {
            Some(plan) => plan.clone(),
            None => sequential_assignment(instance, &self.tasks)?,
        };
        let mut routes = base.routes().to_vec();
        routes[biggest].push(Action::pick(extra));
        routes[biggest].push(Action::deliver(extra));

        let mut tasks = self.tasks.clone();
        tasks.push(extra);

        Ok(NaivePlanner {
            tasks,
            cached: Some(Plan::new(routes)),
        })
    }
}

impl Planner for NaivePlanner {
    fn generate_plans(
        &mut self,
        instance: &Instance,
        _budget: Duration,
    ) -> Result<Plan, PlannerError> {
        self.plan(instance)
    }

    fn generate_final_plans(
        &mut self,
        instance: &Instance,
        _budget: Duration,
    ) -> Result<Plan, PlannerError> {
        self.plan(instance)
    }

    fn extend_plan(
        &self,
        instance: &Instance,
        extra: Task,
    ) -> Result<Box<dyn Planner>, PlannerError> {
        Ok(Box::new(self.extend(instance, extra)?))
    }

    fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}
