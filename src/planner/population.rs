//! Population-based variant of the stochastic search.
//!
//! Instead of one search trajectory with restarts, a whole population of
//! random assignments evolves: each round one uniformly-chosen individual
//! is replaced by a random neighbor of itself, and the best individual ever
//! seen is kept aside until the time budget runs out. Cruder than the
//! driver-based search per iteration, but it samples many basins at once.

use crate::error::PlannerError;
use crate::instance::{self, Instance, Task};
use crate::plan::Plan;
use crate::planner::sls::random_assignment;
use crate::planner::{budget_exhausted, neighborhood, Planner};
use log::info;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

/// Parameters of the population search
#[derive(Debug, Clone, Copy)]
pub struct PopulationConfig {
    /// Number of concurrently evolving plans
    pub size: usize,
    /// Seed of the planner's random stream
    pub seed: u64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        PopulationConfig { size: 10, seed: 42 }
    }
}

pub struct PopulationPlanner {
    tasks: Vec<Task>,
    config: PopulationConfig,
    cached_best: Option<Plan>,
}

impl PopulationPlanner {
    pub fn new(tasks: Vec<Task>, config: PopulationConfig) -> Self {
        PopulationPlanner {
            tasks,
            config,
            cached_best: None,
        }
    }

    fn evolve(&self, instance: &Instance, budget: Duration) -> Result<Plan, PlannerError> {
        let start = Instant::now();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        if self.tasks.is_empty() {
            return Ok(Plan::empty(instance.vehicles.len()));
        }

        let mut population = Vec::with_capacity(self.config.size);
        for _ in 0..self.config.size.max(1) {
            population.push(random_assignment(instance, &self.tasks, &mut rng)?);
        }

        let mut best = population[0].clone();
        for individual in &population {
            if individual.cost(instance) < best.cost(instance) {
                best = individual.clone();
            }
        }

        let mut rounds = 0usize;
        while !budget_exhausted(start, budget) {
            rounds += 1;

            let rank = rng.gen_range(0..population.len());
            let mut candidates = neighborhood::neighbors(&population[rank], instance, &mut rng);
            if candidates.is_empty() {
                continue;
            }
            let mutated = candidates.swap_remove(rng.gen_range(0..candidates.len()));
            debug_assert!(mutated.validate(instance, &self.tasks).is_ok());

            if mutated.cost(instance) < best.cost(instance) {
                best = mutated.clone();
            }
            population[rank] = mutated;
        }

        info!(
            "population search finished: cost {:.2} after {} rounds",
            best.cost(instance),
            rounds
        );
        Ok(best)
    }

    fn fold_into_cache(&mut self, instance: &Instance, plan: Plan) -> Plan {
        let best = match self.cached_best.take() {
            Some(cached) if cached.cost(instance) <= plan.cost(instance) => cached,
            _ => plan,
        };
        self.cached_best = Some(best.clone());
        best
    }
}

impl Planner for PopulationPlanner {
    fn generate_plans(
        &mut self,
        instance: &Instance,
        budget: Duration,
    ) -> Result<Plan, PlannerError> {
        if let Some(best) = &self.cached_best {
            return Ok(best.clone());
        }
        let plan = self.evolve(instance, budget)?;
        Ok(self.fold_into_cache(instance, plan))
    }

    fn generate_final_plans(
        &mut self,
        instance: &Instance,
        budget: Duration,
    ) -> Result<Plan, PlannerError> {
        let plan = self.evolve(instance, budget)?;
        Ok(self.fold_into_cache(instance, plan))
    }

    fn extend_plan(
        &self,
        instance: &Instance,
        extra: Task,
    ) -> Result<Box<dyn Planner>, PlannerError> {
        let biggest = instance::biggest_vehicle(&instance.vehicles)
            .ok_or_else(|| PlannerError::Infeasible("fleet is empty".to_string()))?;
        if biggest.capacity < extra.weight {
            return Err(PlannerError::Infeasible(
                "biggest vehicle is too small for new task".to_string(),
            ));
        }

        let mut tasks = self.tasks.clone();
        tasks.push(extra);
        Ok(Box::new(PopulationPlanner::new(
            tasks,
            PopulationConfig {
                seed: self.config.seed.wrapping_add(1),
                ..self.config
            },
        )))
    }

    fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}
