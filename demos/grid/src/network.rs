//! Synthetic Manhattan grid.
//!
//! `GRID_SIZE × GRID_SIZE` intersections joined by two-way single-lane
//! streets.  Node `(row, col)` has id `row * GRID_SIZE + col`.

use std::collections::HashMap;

use qs_core::{Coord, LinkId, NodeId};
use qs_network::{LinkSpec, NetworkBuilder, NetworkGraph, NetworkResult};

pub const GRID_SIZE: usize = 6;

const BLOCK_M:       f64 = 200.0;
const SPEED_MPS:     f64 = 13.9;  // ~50 km/h
const CAPACITY_VPH:  f64 = 900.0;

/// The grid plus a lookup from (from, to) intersection to the street between them.
pub struct Grid {
    pub graph: NetworkGraph,
    streets:   HashMap<(NodeId, NodeId), LinkId>,
}

impl Grid {
    pub fn node(row: usize, col: usize) -> NodeId {
        NodeId((row * GRID_SIZE + col) as u32)
    }

    pub fn street(&self, from: NodeId, to: NodeId) -> Option<LinkId> {
        self.streets.get(&(from, to)).copied()
    }

    /// Links along a driving path through consecutive intersections.
    pub fn route(&self, nodes: &[NodeId]) -> Option<Vec<LinkId>> {
        nodes.windows(2).map(|w| self.street(w[0], w[1])).collect()
    }
}

pub fn build_grid() -> NetworkResult<Grid> {
    let n = GRID_SIZE;
    let mut b = NetworkBuilder::with_capacity(n * n, 4 * n * (n - 1));
    for row in 0..n {
        for col in 0..n {
            b.add_node(Coord::new(col as f64 * BLOCK_M, row as f64 * BLOCK_M));
        }
    }

    let mut streets = HashMap::new();
    let mut street = |b: &mut NetworkBuilder, a: NodeId, z: NodeId| {
        let (ab, ba) = b.add_two_way(LinkSpec::new(a, z, BLOCK_M, SPEED_MPS, CAPACITY_VPH));
        streets.insert((a, z), ab);
        streets.insert((z, a), ba);
    };
    for row in 0..n {
        for col in 0..n {
            if col + 1 < n {
                street(&mut b, Grid::node(row, col), Grid::node(row, col + 1));
            }
            if row + 1 < n {
                street(&mut b, Grid::node(row, col), Grid::node(row + 1, col));
            }
        }
    }

    Ok(Grid { graph: b.build()?, streets })
}
