//! Road network topology with shortest-path queries.
//!
//! Cities are connected by undirected roads; all planning code only ever
//! asks for the shortest distance between two cities or for the sequence of
//! intermediate cities along that shortest route. Both queries are answered
//! from matrices precomputed at construction time (Floyd-Warshall), so they
//! are cheap enough to sit inside the inner search loop.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a city in the topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct City(pub usize);

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "city {}", self.0)
    }
}

/// Road network over a set of cities
#[derive(Debug, Clone)]
pub struct Topology {
    /// City coordinates, indexed by city id
    positions: Vec<(f64, f64)>,
    /// Shortest distance between every pair of cities
    distance_matrix: Vec<Vec<f64>>,
    /// First hop on the shortest route from i to j
    next_hop: Vec<Vec<usize>>,
}

impl Topology {
    /// Build a topology from city coordinates and undirected roads.
    /// Road length is the Euclidean distance between its endpoints.
    /// Fails if a road references an unknown city or if the resulting
    /// network is not connected.
    pub fn new(positions: Vec<(f64, f64)>, roads: &[(usize, usize)]) -> Result<Self, String> {
        let n = positions.len();
        if n == 0 {
            return Err("topology needs at least one city".to_string());
        }

        let mut distance_matrix = vec![vec![f64::INFINITY; n]; n];
        let mut next_hop = vec![vec![usize::MAX; n]; n];

        for i in 0..n {
            distance_matrix[i][i] = 0.0;
            next_hop[i][i] = i;
        }

        for &(a, b) in roads {
            if a >= n || b >= n {
                return Err(format!("road ({}, {}) references an unknown city", a, b));
            }
            let dx = positions[a].0 - positions[b].0;
            let dy = positions[a].1 - positions[b].1;
            let length = (dx * dx + dy * dy).sqrt();

            // Parallel roads: keep the shorter one
            if length < distance_matrix[a][b] {
                distance_matrix[a][b] = length;
                distance_matrix[b][a] = length;
                next_hop[a][b] = b;
                next_hop[b][a] = a;
            }
        }

        for k in 0..n {
            for i in 0..n {
                for j in 0..n {
                    let through = distance_matrix[i][k] + distance_matrix[k][j];
                    if through < distance_matrix[i][j] {
                        distance_matrix[i][j] = through;
                        next_hop[i][j] = next_hop[i][k];
                    }
                }
            }
        }

        for i in 0..n {
            for j in 0..n {
                if distance_matrix[i][j].is_infinite() {
                    return Err(format!("no route between city {} and city {}", i, j));
                }
            }
        }

        Ok(Topology {
            positions,
            distance_matrix,
            next_hop,
        })
    }

    /// Number of cities in the network
    pub fn num_cities(&self) -> usize {
        self.positions.len()
    }

    /// Coordinates of a city
    pub fn position(&self, city: City) -> (f64, f64) {
        self.positions[city.0]
    }

    /// Shortest travel distance between two cities
    #[inline]
    pub fn distance(&self, from: City, to: City) -> f64 {
        self.distance_matrix[from.0][to.0]
    }

    /// Cities along the shortest route from `from` to `to`, excluding the
    /// starting city and including the destination.
    pub fn path(&self, from: City, to: City) -> Vec<City> {
        let mut route = Vec::new();
        let mut current = from.0;
        while current != to.0 {
            current = self.next_hop[current][to.0];
            route.push(City(current));
        }
        route
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_topology() -> Topology {
        // Three cities on a line: 0 -- 1 -- 2
        let positions = vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)];
        Topology::new(positions, &[(0, 1), (1, 2)]).unwrap()
    }

    #[test]
    fn test_distances_follow_roads() {
        let topology = line_topology();
        assert!((topology.distance(City(0), City(2)) - 2.0).abs() < 1e-10);
        assert!((topology.distance(City(2), City(0)) - 2.0).abs() < 1e-10);
        assert_eq!(topology.distance(City(1), City(1)), 0.0);
    }

    #[test]
    fn test_path_excludes_source_includes_destination() {
        let topology = line_topology();
        assert_eq!(topology.path(City(0), City(2)), vec![City(1), City(2)]);
        assert_eq!(topology.path(City(2), City(0)), vec![City(1), City(0)]);
        assert!(topology.path(City(1), City(1)).is_empty());
    }

    #[test]
    fn test_shortcut_beats_detour() {
        // Square with a diagonal: 0-1-2 detour vs direct 0-2 road
        let positions = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)];
        let topology = Topology::new(positions, &[(0, 1), (1, 2), (0, 2)]).unwrap();
        let direct = (2.0f64).sqrt();
        assert!((topology.distance(City(0), City(2)) - direct).abs() < 1e-10);
        assert_eq!(topology.path(City(0), City(2)), vec![City(2)]);
    }

    #[test]
    fn test_disconnected_network_rejected() {
        let positions = vec![(0.0, 0.0), (1.0, 0.0), (5.0, 5.0)];
        assert!(Topology::new(positions, &[(0, 1)]).is_err());
    }

    #[test]
    fn test_unknown_city_rejected() {
        let positions = vec![(0.0, 0.0), (1.0, 0.0)];
        assert!(Topology::new(positions, &[(0, 7)]).is_err());
    }
}
