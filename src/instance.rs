//! Problem instances: tasks, vehicles, and the world they live in.
//!
//! An instance bundles a road topology with the vehicle fleet and the task
//! set to be served. Instances are parsed from a small sectioned text format
//! or generated randomly from a seed for experiments.

use crate::topology::{City, Topology};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A transport task: pick a load up in one city, deliver it in another.
/// Tasks are immutable values compared by id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier, stable across planning rounds
    pub id: usize,
    /// Pickup city
    pub pickup: City,
    /// Delivery city
    pub delivery: City,
    /// Load weight
    pub weight: u32,
    /// Reward paid on delivery
    pub reward: f64,
}

/// A vehicle of the fleet. Immutable for the duration of a planning session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Vehicle identifier
    pub id: usize,
    /// Current (home) city at planning time
    pub home: City,
    /// Maximum load the vehicle can carry at once
    pub capacity: u32,
    /// Cost per unit of distance traveled
    pub cost_per_km: f64,
}

/// A complete problem instance
#[derive(Debug, Clone)]
pub struct Instance {
    /// Name of the instance
    pub name: String,
    /// Road network
    pub topology: Topology,
    /// Vehicle fleet, in stable output order
    pub vehicles: Vec<Vehicle>,
    /// Task set for centralized planning
    pub tasks: Vec<Task>,
}

/// Find the vehicle with the biggest capacity (first wins on ties)
pub fn biggest_vehicle(vehicles: &[Vehicle]) -> Option<&Vehicle> {
    biggest_vehicle_index(vehicles).map(|index| &vehicles[index])
}

/// Index of the vehicle with the biggest capacity (first wins on ties)
pub fn biggest_vehicle_index(vehicles: &[Vehicle]) -> Option<usize> {
    if vehicles.is_empty() {
        return None;
    }
    let mut best = 0;
    for (index, vehicle) in vehicles.iter().enumerate() {
        if vehicle.capacity > vehicles[best].capacity {
            best = index;
        }
    }
    Some(best)
}

/// Weight of the heaviest task, or 0 for an empty set
pub fn heaviest_weight(tasks: &[Task]) -> u32 {
    tasks.iter().map(|task| task.weight).max().unwrap_or(0)
}

impl Instance {
    /// Parse an instance from a sectioned text file.
    ///
    /// ```text
    /// NAME: demo
    /// CITIES
    /// 0 0.0 0.0
    /// 1 5.0 0.0
    /// ROADS
    /// 0 1
    /// VEHICLES
    /// 0 0 30 5.0
    /// TASKS
    /// 0 0 1 10 155.0
    /// END
    /// ```
    ///
    /// CITIES rows are `id x y`, ROADS rows are `a b`, VEHICLES rows are
    /// `id home capacity cost_per_km`, TASKS rows are
    /// `id pickup delivery weight reward`. Lines starting with `#` are
    /// comments.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let file = File::open(&path).map_err(|e| format!("Cannot open file: {}", e))?;
        let reader = BufReader::new(file);

        let mut name = String::new();
        let mut positions: Vec<(f64, f64)> = Vec::new();
        let mut roads: Vec<(usize, usize)> = Vec::new();
        let mut vehicles: Vec<Vehicle> = Vec::new();
        let mut tasks: Vec<Task> = Vec::new();

        let mut section = String::new();

        for line in reader.lines() {
            let line = line.map_err(|e| format!("Read error: {}", e))?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line == "END" {
                continue;
            }

            if line.starts_with("NAME:") {
                name = line.replace("NAME:", "").trim().to_string();
                continue;
            }

            match line {
                "CITIES" | "ROADS" | "VEHICLES" | "TASKS" => {
                    section = line.to_string();
                    continue;
                }
                _ => {}
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            match section.as_str() {
                "CITIES" => {
                    if parts.len() < 3 {
                        return Err(format!("malformed city row: {}", line));
                    }
                    let id: usize = parts[0].parse().map_err(|_| "Invalid city id")?;
                    let x: f64 = parts[1].parse().map_err(|_| "Invalid x coordinate")?;
                    let y: f64 = parts[2].parse().map_err(|_| "Invalid y coordinate")?;
                    if id != positions.len() {
                        return Err(format!("city ids must be dense and in order, got {}", id));
                    }
                    positions.push((x, y));
                }
                "ROADS" => {
                    if parts.len() < 2 {
                        return Err(format!("malformed road row: {}", line));
                    }
                    let a: usize = parts[0].parse().map_err(|_| "Invalid road endpoint")?;
                    let b: usize = parts[1].parse().map_err(|_| "Invalid road endpoint")?;
                    roads.push((a, b));
                }
                "VEHICLES" => {
                    if parts.len() < 4 {
                        return Err(format!("malformed vehicle row: {}", line));
                    }
                    vehicles.push(Vehicle {
                        id: parts[0].parse().map_err(|_| "Invalid vehicle id")?,
                        home: City(parts[1].parse().map_err(|_| "Invalid home city")?),
                        capacity: parts[2].parse().map_err(|_| "Invalid capacity")?,
                        cost_per_km: parts[3].parse().map_err(|_| "Invalid cost per km")?,
                    });
                }
                "TASKS" => {
                    if parts.len() < 5 {
                        return Err(format!("malformed task row: {}", line));
                    }
                    tasks.push(Task {
                        id: parts[0].parse().map_err(|_| "Invalid task id")?,
                        pickup: City(parts[1].parse().map_err(|_| "Invalid pickup city")?),
                        delivery: City(parts[2].parse().map_err(|_| "Invalid delivery city")?),
                        weight: parts[3].parse().map_err(|_| "Invalid weight")?,
                        reward: parts[4].parse().map_err(|_| "Invalid reward")?,
                    });
                }
                _ => return Err(format!("row outside of any section: {}", line)),
            }
        }

        if vehicles.is_empty() {
            return Err("instance has no vehicles".to_string());
        }

        let num_cities = positions.len();
        let check_city = |city: City, what: &str| -> Result<(), String> {
            if city.0 >= num_cities {
                Err(format!("{} references unknown {}", what, city))
            } else {
                Ok(())
            }
        };
        for vehicle in &vehicles {
            check_city(vehicle.home, "vehicle")?;
        }
        for task in &tasks {
            check_city(task.pickup, "task")?;
            check_city(task.delivery, "task")?;
        }

        let topology = Topology::new(positions, &roads)?;

        Ok(Instance {
            name,
            topology,
            vehicles,
            tasks,
        })
    }

    /// Generate a random, always-feasible instance. The road network is a
    /// random spanning tree plus extra shortcut roads; task weights never
    /// exceed the biggest vehicle's capacity. Deterministic via seed.
    pub fn random(seed: u64, num_cities: usize, num_vehicles: usize, num_tasks: usize) -> Self {
        assert!(num_cities >= 2, "need at least two cities");
        assert!(num_vehicles >= 1, "need at least one vehicle");

        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let positions: Vec<(f64, f64)> = (0..num_cities)
            .map(|_| (rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)))
            .collect();

        // Random spanning tree keeps the network connected, the extra
        // roads create shortcuts so paths are not all tree-shaped.
        let mut roads: Vec<(usize, usize)> = Vec::new();
        for city in 1..num_cities {
            roads.push((city, rng.gen_range(0..city)));
        }
        for _ in 0..num_cities {
            let a = rng.gen_range(0..num_cities);
            let b = rng.gen_range(0..num_cities);
            if a != b {
                roads.push((a, b));
            }
        }

        let vehicles: Vec<Vehicle> = (0..num_vehicles)
            .map(|id| Vehicle {
                id,
                home: City(rng.gen_range(0..num_cities)),
                capacity: rng.gen_range(30..=100),
                cost_per_km: rng.gen_range(1..=5) as f64,
            })
            .collect();

        let max_weight = vehicles.iter().map(|v| v.capacity).max().unwrap();
        let tasks: Vec<Task> = (0..num_tasks)
            .map(|id| {
                let pickup = rng.gen_range(0..num_cities);
                let delivery = loop {
                    let city = rng.gen_range(0..num_cities);
                    if city != pickup {
                        break city;
                    }
                };
                let weight = rng.gen_range(1..=max_weight);
                Task {
                    id,
                    pickup: City(pickup),
                    delivery: City(delivery),
                    weight,
                    reward: weight as f64 * rng.gen_range(5.0..20.0),
                }
            })
            .collect();

        let topology =
            Topology::new(positions, &roads).expect("random spanning tree is always connected");

        Instance {
            name: format!("random-{}", seed),
            topology,
            vehicles,
            tasks,
        }
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let num_cities = self.topology.num_cities();

        let mut distances: Vec<f64> = Vec::new();
        for i in 0..num_cities {
            for j in i + 1..num_cities {
                distances.push(self.topology.distance(City(i), City(j)));
            }
        }
        let avg_distance = if distances.is_empty() {
            0.0
        } else {
            distances.iter().sum::<f64>() / distances.len() as f64
        };
        let max_distance = distances.iter().cloned().fold(0.0, f64::max);

        InstanceStatistics {
            name: self.name.clone(),
            num_cities,
            num_vehicles: self.vehicles.len(),
            num_tasks: self.tasks.len(),
            total_capacity: self.vehicles.iter().map(|v| v.capacity).sum(),
            max_capacity: self.vehicles.iter().map(|v| v.capacity).max().unwrap_or(0),
            heaviest_task: heaviest_weight(&self.tasks),
            total_weight: self.tasks.iter().map(|t| t.weight).sum(),
            total_reward: self.tasks.iter().map(|t| t.reward).sum(),
            avg_distance,
            max_distance,
        }
    }
}

/// Statistics about an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_cities: usize,
    pub num_vehicles: usize,
    pub num_tasks: usize,
    pub total_capacity: u32,
    pub max_capacity: u32,
    pub heaviest_task: u32,
    pub total_weight: u32,
    pub total_reward: f64,
    pub avg_distance: f64,
    pub max_distance: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Cities: {}", self.num_cities)?;
        writeln!(
            f,
            "  Vehicles: {} (total capacity {}, max {})",
            self.num_vehicles, self.total_capacity, self.max_capacity
        )?;
        writeln!(
            f,
            "  Tasks: {} (total weight {}, heaviest {})",
            self.num_tasks, self.total_weight, self.heaviest_task
        )?;
        writeln!(f, "  Total reward: {:.2}", self.total_reward)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_biggest_vehicle_first_wins_ties() {
        let vehicles = vec![
            Vehicle { id: 0, home: City(0), capacity: 50, cost_per_km: 1.0 },
            Vehicle { id: 1, home: City(0), capacity: 50, cost_per_km: 2.0 },
            Vehicle { id: 2, home: City(0), capacity: 20, cost_per_km: 1.0 },
        ];
        assert_eq!(biggest_vehicle(&vehicles).unwrap().id, 0);
        assert!(biggest_vehicle(&[]).is_none());
    }

    #[test]
    fn test_heaviest_weight() {
        let instance = Instance::random(7, 5, 2, 4);
        let expected = instance.tasks.iter().map(|t| t.weight).max().unwrap();
        assert_eq!(heaviest_weight(&instance.tasks), expected);
        assert_eq!(heaviest_weight(&[]), 0);
    }

    #[test]
    fn test_random_instance_is_feasible_by_construction() {
        for seed in 0..5 {
            let instance = Instance::random(seed, 8, 3, 10);
            let max_capacity = instance.vehicles.iter().map(|v| v.capacity).max().unwrap();
            assert!(heaviest_weight(&instance.tasks) <= max_capacity);
            for task in &instance.tasks {
                assert_ne!(task.pickup, task.delivery);
            }
        }
    }

    #[test]
    fn test_random_instance_deterministic_per_seed() {
        let a = Instance::random(42, 6, 2, 5);
        let b = Instance::random(42, 6, 2, 5);
        assert_eq!(a.tasks, b.tasks);
        assert_eq!(a.vehicles, b.vehicles);
    }
}
