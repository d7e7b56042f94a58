//! Stochastic local-search planner.
//!
//! The driver walks the space of plans one local move at a time: each
//! iteration it generates the stochastic neighborhood of the current plan,
//! then steps either to the best neighbor or, with probability `p`, to a
//! uniformly random one. Runs of non-improving iterations trigger a restart
//! from a fresh initial assignment, keeping the best plan found so far; the
//! search ends when the restart budget or the wall-clock budget is spent,
//! whichever comes first.
//!
//! A planner can also be warm-started from a prior solution (see
//! [`SlsPlanner::extend`]): the session then treats that solution as its
//! initial state, and restarts reseed from it rather than from a naive
//! assignment.

use crate::error::PlannerError;
use crate::instance::{self, Instance, Task};
use crate::plan::{Action, Plan};
use crate::planner::{budget_exhausted, neighborhood, Planner, SearchProfile};
use log::{debug, info};
use ordered_float::OrderedFloat;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

/// Cost improvements smaller than this count as stagnation
const EPSILON: f64 = 1e-9;

/// Counters reported by one driver run
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    /// Outer iterations executed across all restarts
    pub iterations: usize,
    /// Restarts taken after stalling
    pub resets: usize,
}

/// Planner built around the stochastic local-search driver
pub struct SlsPlanner {
    tasks: Vec<Task>,
    seed: u64,
    random_initial: bool,
    /// Prior solution this session was warm-started from; restarts reseed
    /// from it as well
    seed_plan: Option<Plan>,
    /// Best plan produced by any run of this planner so far
    cached_best: Option<Plan>,
    last_stats: SearchStats,
}

impl SlsPlanner {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self::with_seed(tasks, 42)
    }

    pub fn with_seed(tasks: Vec<Task>, seed: u64) -> Self {
        SlsPlanner {
            tasks,
            seed,
            random_initial: false,
            seed_plan: None,
            cached_best: None,
            last_stats: SearchStats::default(),
        }
    }

    /// Restart seeds assign tasks to random fitting vehicles instead of
    /// stacking everything on the biggest one.
    pub fn random_initial(tasks: Vec<Task>, seed: u64) -> Self {
        SlsPlanner {
            random_initial: true,
            ..Self::with_seed(tasks, seed)
        }
    }

    /// Counters from the most recent search run
    pub fn last_stats(&self) -> SearchStats {
        self.last_stats
    }

    /// Run the driver under the given profile and fold the result into the
    /// cached best: a previously found plan is never discarded for a worse
    /// fresh one.
    pub fn solve(
        &mut self,
        instance: &Instance,
        profile: &SearchProfile,
        budget: Duration,
    ) -> Result<Plan, PlannerError> {
        let (plan, stats) = self.run_search(instance, profile, budget, |plan, rng| {
            neighborhood::neighbors(plan, instance, rng)
        })?;
        self.last_stats = stats;
        info!(
            "search finished: cost {:.2} after {} iterations, {} resets",
            plan.cost(instance),
            stats.iterations,
            stats.resets
        );

        let best = match self.cached_best.take() {
            Some(cached) if cached.cost(instance) <= plan.cost(instance) => cached,
            _ => plan,
        };
        self.cached_best = Some(best.clone());
        Ok(best)
    }

    /// A new planner responsible for `extra` on top of the current tasks,
    /// warm-started by appending the new pickup/delivery pair to the
    /// biggest vehicle's route in this planner's best plan so far. This
    /// planner is left untouched: the caller may still need it if the
    /// extra task never materializes.
    pub fn extend(&self, instance: &Instance, extra: Task) -> Result<SlsPlanner, PlannerError> {
        let biggest = instance::biggest_vehicle_index(&instance.vehicles)
            .ok_or_else(|| PlannerError::Infeasible("fleet is empty".to_string()))?;
        if instance.vehicles[biggest].capacity < extra.weight {
            return Err(PlannerError::Infeasible(
                "biggest vehicle is too small for new task".to_string(),
            ));
        }

        let base = match &self.cached_best {
            Some(plan) => plan.clone(),
            None => sequential_assignment(instance, &self.tasks)?,
        };
        let mut routes = base.routes().to_vec();
        routes[biggest].push(Action::pick(extra));
        routes[biggest].push(Action::deliver(extra));

        let mut tasks = self.tasks.clone();
        tasks.push(extra);

        Ok(SlsPlanner {
            tasks,
            seed: self.seed.wrapping_add(1),
            random_initial: self.random_initial,
            seed_plan: Some(Plan::new(routes)),
            cached_best: None,
            last_stats: SearchStats::default(),
        })
    }

    /// The plan a search session starts from, and reseeds from on restart
    fn initial_plan(
        &self,
        instance: &Instance,
        rng: &mut ChaCha8Rng,
    ) -> Result<Plan, PlannerError> {
        if let Some(seed_plan) = &self.seed_plan {
            return Ok(seed_plan.clone());
        }
        if self.random_initial {
            random_assignment(instance, &self.tasks, rng)
        } else {
            sequential_assignment(instance, &self.tasks)
        }
    }

    /// The driver loop. The neighbor source is injected so tests can pin
    /// the neighborhood down; production use passes the stochastic
    /// generator.
    fn run_search<F>(
        &self,
        instance: &Instance,
        profile: &SearchProfile,
        budget: Duration,
        mut neighbors_of: F,
    ) -> Result<(Plan, SearchStats), PlannerError>
    where
        F: FnMut(&Plan, &mut ChaCha8Rng) -> Vec<Plan>,
    {
        let start = Instant::now();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut stats = SearchStats::default();

        let mut current = self.initial_plan(instance, &mut rng)?;
        let mut local_best = current.clone();
        let mut global_best = current.clone();

        if self.tasks.is_empty() {
            return Ok((current, stats));
        }

        let mut stall_count = 0;
        let mut reset_count = 0;

        loop {
            if budget_exhausted(start, budget) {
                debug!(
                    "time budget spent after {} iterations, returning best so far",
                    stats.iterations
                );
                break;
            }
            if stats.iterations >= profile.iteration_bound {
                break;
            }
            stats.iterations += 1;

            let mut candidates = neighbors_of(&current, &mut rng);
            if candidates.is_empty() {
                // Nowhere to go from here; let the stall machinery reseed
                stall_count += 1;
            } else {
                current = if rng.gen::<f64>() < profile.p {
                    candidates.swap_remove(rng.gen_range(0..candidates.len()))
                } else {
                    select_best(instance, current, candidates, profile.allow_sideways)
                };
                debug_assert!(
                    current.validate(instance, &self.tasks).is_ok(),
                    "neighbor generation produced an invalid plan: {:?}",
                    current.validate(instance, &self.tasks)
                );

                if current.cost(instance) < local_best.cost(instance) - EPSILON {
                    local_best = current.clone();
                    stall_count = 0;
                } else {
                    stall_count += 1;
                }
            }

            if stall_count >= profile.stall_bound {
                if local_best.cost(instance) < global_best.cost(instance) {
                    global_best = local_best.clone();
                }
                reset_count += 1;
                stats.resets = reset_count;
                if reset_count >= profile.reset_bound {
                    break;
                }

                current = self.initial_plan(instance, &mut rng)?;
                local_best = current.clone();
                stall_count = 0;
                debug!("search reset {} of {}", reset_count, profile.reset_bound);
            }
        }

        if local_best.cost(instance) < global_best.cost(instance) {
            global_best = local_best;
        }
        Ok((global_best, stats))
    }
}

impl Planner for SlsPlanner {
    fn generate_plans(
        &mut self,
        instance: &Instance,
        budget: Duration,
    ) -> Result<Plan, PlannerError> {
        if let Some(best) = &self.cached_best {
            return Ok(best.clone());
        }
        self.solve(instance, &SearchProfile::fast(), budget)
    }

    fn generate_final_plans(
        &mut self,
        instance: &Instance,
        budget: Duration,
    ) -> Result<Plan, PlannerError> {
        self.solve(instance, &SearchProfile::optimal(), budget)
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

/// Pick the lowest-cost candidate, starting from the current plan. With
/// sideways enabled, an equal-cost candidate seen later wins, so the search
/// can drift across cost plateaus instead of pinning to one plan.
fn select_best(
    instance: &Instance,
    current: Plan,
    candidates: Vec<Plan>,
    allow_sideways: bool,
) -> Plan {
    let mut best = current;
    let mut best_cost = OrderedFloat(best.cost(instance));

    for candidate in candidates {
        let cost = OrderedFloat(candidate.cost(instance));
        let wins = if allow_sideways {
            cost <= best_cost
        } else {
            cost < best_cost
        };
        if wins {
            best_cost = cost;
            best = candidate;
        }
    }

    best
}

/// The first, naive plan: all tasks assigned to the biggest vehicle in
/// sequential pick-then-deliver order, every other vehicle idle. A feasible
/// but poor starting point, intentionally cheap since it reruns at every
/// restart.
pub fn sequential_assignment(instance: &Instance, tasks: &[Task]) -> Result<Plan, PlannerError> {
    let biggest = instance::biggest_vehicle_index(&instance.vehicles)
        .ok_or_else(|| PlannerError::Infeasible("fleet is empty".to_string()))?;
    let heaviest = instance::heaviest_weight(tasks);
    if instance.vehicles[biggest].capacity < heaviest {
        return Err(PlannerError::Infeasible(
            "vehicles are not big enough".to_string(),
        ));
    }

    let mut route = Vec::with_capacity(tasks.len() * 2);
    for &task in tasks {
        route.push(Action::pick(task));
        route.push(Action::deliver(task));
    }

    let mut routes = vec![Vec::new(); instance.vehicles.len()];
    routes[biggest] = route;
    Ok(Plan::new(routes))
}

/// Alternative restart seed: each task's pair lands on a uniformly random
/// vehicle big enough to carry it.
pub fn random_assignment<R: Rng>(
    instance: &Instance,
    tasks: &[Task],
    rng: &mut R,
) -> Result<Plan, PlannerError> {
    let biggest = instance::biggest_vehicle(&instance.vehicles)
        .ok_or_else(|| PlannerError::Infeasible("fleet is empty".to_string()))?;
    if biggest.capacity < instance::heaviest_weight(tasks) {
        return Err(PlannerError::Infeasible(
            "vehicles are not big enough".to_string(),
        ));
    }

    let mut routes = vec![Vec::new(); instance.vehicles.len()];
    for &task in tasks {
        // Terminates: the capacity check above guarantees a fitting vehicle
        let vehicle = loop {
            let index = rng.gen_range(0..instance.vehicles.len());
            if instance.vehicles[index].capacity >= task.weight {
                break index;
            }
        };
        routes[vehicle].push(Action::pick(task));
        routes[vehicle].push(Action::deliver(task));
    }
    Ok(Plan::new(routes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Vehicle;
    use crate::plan::Event;
    use crate::topology::{City, Topology};

    fn line_instance(vehicles: Vec<Vehicle>, tasks: Vec<Task>) -> Instance {
        let positions = vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)];
        let topology = Topology::new(positions, &[(0, 1), (1, 2), (2, 3)]).unwrap();
        Instance {
            name: "test".to_string(),
            topology,
            vehicles,
            tasks,
        }
    }

    fn task(id: usize, pickup: usize, delivery: usize, weight: u32) -> Task {
        Task {
            id,
            pickup: City(pickup),
            delivery: City(delivery),
            weight,
            reward: 100.0,
        }
    }

    fn vehicle(id: usize, capacity: u32) -> Vehicle {
        Vehicle {
            id,
            home: City(0),
            capacity,
            cost_per_km: 1.0,
        }
    }

    fn budget() -> Duration {
        Duration::from_secs(2)
    }

    #[test]
    fn test_sequential_assignment_orders_pairs() {
        let a = task(0, 1, 2, 40);
        let b = task(1, 2, 3, 30);
        let instance = line_instance(vec![vehicle(0, 100)], vec![a, b]);

        let plan = sequential_assignment(&instance, &instance.tasks).unwrap();
        let route = plan.route(0);

        assert_eq!(route.len(), 4);
        assert_eq!((route[0].event, route[0].task.id), (Event::Pick, 0));
        assert_eq!((route[1].event, route[1].task.id), (Event::Deliver, 0));
        assert_eq!((route[2].event, route[2].task.id), (Event::Pick, 1));
        assert_eq!((route[3].event, route[3].task.id), (Event::Deliver, 1));
        assert_eq!(plan.load_trace(0), vec![40, 0, 30, 0]);
    }

    #[test]
    fn test_sequential_assignment_uses_biggest_vehicle_only() {
        let a = task(0, 1, 2, 30);
        let instance = line_instance(vec![vehicle(0, 20), vehicle(1, 50)], vec![a]);

        let plan = sequential_assignment(&instance, &instance.tasks).unwrap();
        assert!(plan.route(0).is_empty());
        assert_eq!(plan.route(1).len(), 2);
    }

    #[test]
    fn test_infeasible_iff_heaviest_exceeds_every_capacity() {
        let a = task(0, 1, 2, 60);
        let undersized = line_instance(vec![vehicle(0, 20), vehicle(1, 50)], vec![a]);
        assert!(matches!(
            sequential_assignment(&undersized, &undersized.tasks),
            Err(PlannerError::Infeasible(_))
        ));

        let fitting = line_instance(vec![vehicle(0, 20), vehicle(1, 60)], vec![a]);
        assert!(sequential_assignment(&fitting, &fitting.tasks).is_ok());
    }

    #[test]
    fn test_random_assignment_only_uses_fitting_vehicles() {
        let a = task(0, 1, 2, 30);
        let b = task(1, 2, 3, 5);
        let instance = line_instance(vec![vehicle(0, 50), vehicle(1, 10)], vec![a, b]);

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..20 {
            let plan = random_assignment(&instance, &instance.tasks, &mut rng).unwrap();
            plan.validate(&instance, &instance.tasks).unwrap();
            assert!(
                !plan.route(1).iter().any(|action| action.task.id == 0),
                "task heavier than vehicle 1 must never land on it"
            );
        }
    }

    #[test]
    fn test_stall_bound_triggers_resets_until_budget_spent() {
        let a = task(0, 1, 2, 10);
        let instance = line_instance(vec![vehicle(0, 100)], vec![a]);
        let planner = SlsPlanner::new(instance.tasks.clone());

        let profile = SearchProfile {
            stall_bound: 5,
            reset_bound: 2,
            iteration_bound: 1_000,
            p: 0.0,
            allow_sideways: true,
        };

        // A neighborhood that never improves: every iteration stalls, so a
        // reset fires after exactly `stall_bound` iterations.
        let (plan, stats) = planner
            .run_search(&instance, &profile, budget(), |current, _| {
                vec![current.clone()]
            })
            .unwrap();

        assert_eq!(stats.resets, 2);
        assert_eq!(stats.iterations, 10);
        plan.validate(&instance, &instance.tasks).unwrap();
    }

    #[test]
    fn test_empty_neighborhood_counts_as_stall() {
        let a = task(0, 1, 2, 10);
        let instance = line_instance(vec![vehicle(0, 100)], vec![a]);
        let planner = SlsPlanner::new(instance.tasks.clone());

        let profile = SearchProfile {
            stall_bound: 3,
            reset_bound: 4,
            iteration_bound: 1_000,
            p: 0.5,
            allow_sideways: true,
        };

        // One task on one vehicle really does have an empty neighborhood
        let (_, stats) = planner
            .run_search(&instance, &profile, budget(), |current, rng| {
                neighborhood::neighbors(current, &instance, rng)
            })
            .unwrap();
        assert_eq!(stats.resets, 4);
        assert_eq!(stats.iterations, 12);
    }

    #[test]
    fn test_solve_improves_on_sequential_assignment() {
        let instance = Instance::random(21, 10, 3, 8);
        let initial = sequential_assignment(&instance, &instance.tasks).unwrap();

        let mut planner = SlsPlanner::with_seed(instance.tasks.clone(), 7);
        let plan = planner
            .solve(&instance, &SearchProfile::fast(), budget())
            .unwrap();

        plan.validate(&instance, &instance.tasks).unwrap();
        assert!(plan.cost(&instance) <= initial.cost(&instance));
    }

    #[test]
    fn test_final_plans_never_worse_than_cached_fast_result() {
        let instance = Instance::random(33, 8, 2, 6);
        let mut planner = SlsPlanner::with_seed(instance.tasks.clone(), 3);

        let fast = planner.generate_plans(&instance, budget()).unwrap();
        let final_plan = planner.generate_final_plans(&instance, budget()).unwrap();

        assert!(final_plan.cost(&instance) <= fast.cost(&instance));
        final_plan.validate(&instance, &instance.tasks).unwrap();
    }

    #[test]
    fn test_generate_plans_returns_cached_result() {
        let instance = Instance::random(5, 6, 2, 4);
        let mut planner = SlsPlanner::new(instance.tasks.clone());

        let first = planner.generate_plans(&instance, budget()).unwrap();
        let second = planner.generate_plans(&instance, budget()).unwrap();
        assert_eq!(first.cost(&instance), second.cost(&instance));
        assert_eq!(first.routes(), second.routes());
    }

    #[test]
    fn test_extend_appends_pair_to_biggest_vehicle() {
        let a = task(0, 1, 2, 20);
        let b = task(1, 2, 3, 10);
        let c = task(2, 1, 3, 15);
        let instance = line_instance(vec![vehicle(0, 30), vehicle(1, 50)], vec![a, b]);

        let mut planner = SlsPlanner::with_seed(vec![a, b], 1);
        let before = planner.generate_plans(&instance, budget()).unwrap();

        let extended = planner.extend(&instance, c).unwrap();
        let seeded = extended.seed_plan.as_ref().unwrap();

        // Untouched routes carried forward verbatim, the new pair appended
        // to the biggest vehicle's route.
        for (index, route) in before.routes().iter().enumerate() {
            if index == 1 {
                let appended = &seeded.route(1)[route.len()..];
                assert_eq!(appended, &[Action::pick(c), Action::deliver(c)]);
                assert_eq!(&seeded.route(1)[..route.len()], &route[..]);
            } else {
                assert_eq!(seeded.route(index), &route[..]);
            }
        }

        seeded.validate(&instance, &[a, b, c]).unwrap();
        assert_eq!(extended.tasks(), &[a, b, c]);
        // The planner that was extended is untouched
        assert_eq!(planner.tasks(), &[a, b]);
        assert_eq!(
            planner.generate_plans(&instance, budget()).unwrap().routes(),
            before.routes()
        );
    }

    #[test]
    fn test_extend_rejects_oversized_task() {
        let a = task(0, 1, 2, 20);
        let instance = line_instance(vec![vehicle(0, 30)], vec![a]);
        let planner = SlsPlanner::new(vec![a]);

        let oversized = task(9, 1, 3, 31);
        assert!(matches!(
            planner.extend(&instance, oversized),
            Err(PlannerError::Infeasible(_))
        ));
    }

    #[test]
    fn test_warm_started_planner_solves_full_task_set() {
        let instance = Instance::random(17, 8, 3, 5);
        let mut tasks = instance.tasks.clone();
        let extra = tasks.pop().unwrap();

        let mut planner = SlsPlanner::with_seed(tasks.clone(), 2);
        planner.generate_plans(&instance, budget()).unwrap();

        let mut extended = planner.extend(&instance, extra).unwrap();
        let plan = extended.generate_final_plans(&instance, budget()).unwrap();

        let mut all_tasks = tasks;
        all_tasks.push(extra);
        plan.validate(&instance, &all_tasks).unwrap();
    }

    #[test]
    fn test_independent_planners_do_not_contaminate_each_other() {
        let instance = Instance::random(13, 9, 3, 7);
        let initial_cost = sequential_assignment(&instance, &instance.tasks)
            .unwrap()
            .cost(&instance);

        let handles: Vec<_> = [1u64, 2u64]
            .into_iter()
            .map(|seed| {
                let instance = instance.clone();
                std::thread::spawn(move || {
                    let mut planner = SlsPlanner::with_seed(instance.tasks.clone(), seed);
                    let plan = planner
                        .solve(&instance, &SearchProfile::fast(), Duration::from_secs(2))
                        .unwrap();
                    plan.validate(&instance, &instance.tasks).unwrap();
                    plan.cost(&instance)
                })
            })
            .collect();

        for handle in handles {
            let cost = handle.join().unwrap();
            assert!(cost <= initial_cost);
        }
    }

    #[test]
    fn test_zero_tasks_yield_empty_plan() {
        let instance = line_instance(vec![vehicle(0, 30)], Vec::new());
        let mut planner = SlsPlanner::new(Vec::new());

        let plan = planner.generate_plans(&instance, budget()).unwrap();
        assert_eq!(plan.num_actions(), 0);
    }
}
