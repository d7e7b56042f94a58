//! Stochastic neighborhood of a plan.
//!
//! Neighbor plans are produced by five move families applied to a single
//! randomly chosen vehicle with a non-empty route:
//!
//! - the first task of that vehicle is transferred to every other vehicle
//!   with enough capacity;
//! - a pickup is advanced as long as the vehicle is never overloaded;
//! - a pickup is postponed as long as it stays before its delivery;
//! - a delivery is advanced as long as it stays after its pickup;
//! - a delivery is postponed as long as the vehicle is never overloaded.
//!
//! The full neighborhood of a plan is factorially large, so it is never
//! enumerated; the randomness in the model-vehicle draw means two calls on
//! the same plan may explore different slices of it. Infeasible candidates
//! are never generated in the first place: the capacity checks above are
//! the move preconditions.

use crate::instance::Instance;
use crate::plan::{Action, Event, Plan};
use rand::Rng;

/// Collect every neighbor the five move families can produce for one
/// randomly selected model vehicle. Empty when no vehicle has work
/// scheduled, or when the only scheduled task has nowhere to go.
pub fn neighbors<R: Rng>(plan: &Plan, instance: &Instance, rng: &mut R) -> Vec<Plan> {
    let eligible = plan.non_empty_vehicles();
    if eligible.is_empty() {
        return Vec::new();
    }
    let model = eligible[rng.gen_range(0..eligible.len())];

    let mut found = Vec::new();
    transfer_first_task(plan, instance, model, &mut found);

    for index in 0..plan.route(model).len() {
        match plan.route(model)[index].event {
            Event::Pick => {
                advance_pickup(plan, instance, model, index, &mut found);
                postpone_pickup(plan, model, index, &mut found);
            }
            Event::Deliver => {
                advance_delivery(plan, model, index, &mut found);
                postpone_delivery(plan, instance, model, index, &mut found);
            }
        }
    }

    found
}

/// Move the first task of `source` (its pickup and its delivery) to the
/// front of every other vehicle's route that can carry it.
fn transfer_first_task(plan: &Plan, instance: &Instance, source: usize, out: &mut Vec<Plan>) {
    let mut new_source = plan.route(source).to_vec();
    debug_assert!(!new_source.is_empty());

    let moved = new_source.remove(0).task;
    if let Some(position) = new_source.iter().position(|a| a.task.id == moved.id) {
        new_source.remove(position);
    }

    for (destination, vehicle) in instance.vehicles.iter().enumerate() {
        if destination == source {
            continue;
        }
        if vehicle.capacity < moved.weight {
            continue;
        }

        let old_destination = plan.route(destination);
        let mut new_destination = Vec::with_capacity(old_destination.len() + 2);
        new_destination.push(Action::pick(moved));
        new_destination.push(Action::deliver(moved));
        new_destination.extend_from_slice(old_destination);

        let mut routes = plan.routes().to_vec();
        routes[source] = new_source.clone();
        routes[destination] = new_destination;
        out.push(Plan::new(routes));
    }
}

/// Move the pickup at `index` to every earlier slot that keeps the vehicle
/// within capacity while the task is aboard longer.
fn advance_pickup(
    plan: &Plan,
    instance: &Instance,
    vehicle: usize,
    index: usize,
    out: &mut Vec<Plan>,
) {
    if index == 0 {
        return;
    }
    let route = plan.route(vehicle);
    debug_assert_eq!(route[index].event, Event::Pick);

    let capacity = instance.vehicles[vehicle].capacity as i64;

    // Load carried once the pickup at `index` is done
    let mut load = load_through(route, index);

    let mut t = index as i64 - 1;
    while t >= 0 && load - route[t as usize].differential_weight() <= capacity {
        out.push(plan_by_moving_action(plan, vehicle, index, t as usize));

        load -= route[t as usize].differential_weight();
        t -= 1;
    }
}

/// Move the pickup at `index` to every later slot before its delivery. No
/// capacity check needed: the task is simply aboard for a shorter while.
fn postpone_pickup(plan: &Plan, vehicle: usize, index: usize, out: &mut Vec<Plan>) {
    let route = plan.route(vehicle);
    debug_assert_eq!(route[index].event, Event::Pick);

    let moved = route[index].task;

    let mut t = index + 1;
    while t < route.len() && route[t].task.id != moved.id {
        out.push(plan_by_moving_action(plan, vehicle, index, t));
        t += 1;
    }
}

/// Move the delivery at `index` to every earlier slot after its pickup. No
/// capacity check needed: dropping the load earlier never raises any load.
fn advance_delivery(plan: &Plan, vehicle: usize, index: usize, out: &mut Vec<Plan>) {
    if index == 0 {
        return;
    }
    let route = plan.route(vehicle);
    debug_assert_eq!(route[index].event, Event::Deliver);

    let moved = route[index].task;

    let mut t = index as i64 - 1;
    while t >= 0 && route[t as usize].task.id != moved.id {
        out.push(plan_by_moving_action(plan, vehicle, index, t as usize));
        t -= 1;
    }
}

/// Move the delivery at `index` to every later slot that keeps the vehicle
/// within capacity while the task stays aboard.
fn postpone_delivery(
    plan: &Plan,
    instance: &Instance,
    vehicle: usize,
    index: usize,
    out: &mut Vec<Plan>,
) {
    let route = plan.route(vehicle);
    debug_assert_eq!(route[index].event, Event::Deliver);

    if index + 1 == route.len() {
        return;
    }
    let capacity = instance.vehicles[vehicle].capacity as i64;

    // Load right before the delivery, with the task still aboard
    let mut load = if index == 0 {
        0
    } else {
        load_through(route, index - 1)
    };

    let mut t = index + 1;
    while t < route.len() && load + route[t].differential_weight() <= capacity {
        out.push(plan_by_moving_action(plan, vehicle, index, t));

        load += route[t].differential_weight();
        t += 1;
    }
}

/// New plan with the action at `source` spliced out of the vehicle's route
/// and back in so it lands at `destination` of the original indexing.
fn plan_by_moving_action(plan: &Plan, vehicle: usize, source: usize, destination: usize) -> Plan {
    let mut routes = plan.routes().to_vec();
    let route = &mut routes[vehicle];

    let action = route.remove(source);
    if source >= destination {
        route.insert(destination, action);
    } else {
        route.insert(destination - 1, action);
    }

    Plan::new(routes)
}

/// Vehicle load once every action up to and including `index` has run
fn load_through(route: &[Action], index: usize) -> i64 {
    route[..=index]
        .iter()
        .map(Action::differential_weight)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Task, Vehicle};
    use crate::topology::{City, Topology};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

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

    fn pair_route(tasks: &[Task]) -> Vec<Action> {
        tasks
            .iter()
            .flat_map(|&t| [Action::pick(t), Action::deliver(t)])
            .collect()
    }

    #[test]
    fn test_no_transfer_to_undersized_vehicle() {
        let a = task(0, 1, 2, 30);
        let instance = line_instance(vec![vehicle(0, 50), vehicle(1, 10)], vec![a]);
        let plan = Plan::new(vec![pair_route(&[a]), Vec::new()]);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            assert!(neighbors(&plan, &instance, &mut rng).is_empty());
        }
    }

    #[test]
    fn test_transfer_prepends_pair_to_fitting_vehicle() {
        let a = task(0, 1, 2, 30);
        let b = task(1, 2, 3, 10);
        let instance = line_instance(vec![vehicle(0, 50), vehicle(1, 40)], vec![a, b]);
        let plan = Plan::new(vec![pair_route(&[a, b]), Vec::new()]);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let found = neighbors(&plan, &instance, &mut rng);

        let transferred: Vec<&Plan> = found
            .iter()
            .filter(|candidate| !candidate.route(1).is_empty())
            .collect();
        assert!(!transferred.is_empty());
        for candidate in transferred {
            assert_eq!(
                candidate.route(1),
                &[Action::pick(a), Action::deliver(a)],
                "first task's pair must be prepended to the destination"
            );
            assert_eq!(candidate.route(0), pair_route(&[b]));
            candidate.validate(&instance, &instance.tasks).unwrap();
        }
    }

    #[test]
    fn test_advance_pickup_respects_capacity() {
        let a = task(0, 1, 2, 40);
        let b = task(1, 2, 3, 30);
        let instance = line_instance(vec![vehicle(0, 50)], vec![a, b]);
        // [pick a, deliver a, pick b, deliver b]: advancing pick b before
        // deliver a would load 70 into a capacity-50 vehicle.
        let plan = Plan::new(vec![pair_route(&[a, b])]);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..20 {
            for candidate in neighbors(&plan, &instance, &mut rng) {
                candidate.validate(&instance, &instance.tasks).unwrap();
            }
        }
    }

    #[test]
    fn test_postpone_delivery_respects_capacity() {
        let a = task(0, 1, 2, 30);
        let b = task(1, 2, 3, 40);
        let instance = line_instance(vec![vehicle(0, 50)], vec![a, b]);
        let plan = Plan::new(vec![pair_route(&[a, b])]);

        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..20 {
            for candidate in neighbors(&plan, &instance, &mut rng) {
                candidate.validate(&instance, &instance.tasks).unwrap();
            }
        }
    }

    #[test]
    fn test_every_neighbor_is_valid_and_distinct_from_origin() {
        let instance = Instance::random(11, 8, 3, 6);
        let biggest = crate::instance::biggest_vehicle(&instance.vehicles)
            .unwrap()
            .id;
        let position = instance
            .vehicles
            .iter()
            .position(|v| v.id == biggest)
            .unwrap();

        let mut routes = vec![Vec::new(); instance.vehicles.len()];
        routes[position] = pair_route(&instance.tasks);
        let plan = Plan::new(routes);

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut total = 0;
        for _ in 0..10 {
            for candidate in neighbors(&plan, &instance, &mut rng) {
                candidate.validate(&instance, &instance.tasks).unwrap();
                assert_ne!(candidate.routes(), plan.routes());
                total += 1;
            }
        }
        assert!(total > 0, "a six-task route must have neighbors");
    }

    #[test]
    fn test_moving_action_keeps_relative_order_of_others() {
        let a = task(0, 1, 2, 10);
        let b = task(1, 2, 3, 10);
        let plan = Plan::new(vec![pair_route(&[a, b])]);

        let moved = plan_by_moving_action(&plan, 0, 0, 2);
        assert_eq!(
            moved.route(0),
            &[
                Action::deliver(a),
                Action::pick(a),
                Action::pick(b),
                Action::deliver(b),
            ]
        );
    }
}
