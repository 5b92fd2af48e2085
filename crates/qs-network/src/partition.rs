//! Deterministic graph partitioning for parallel execution.
//!
//! # Algorithm
//!
//! 1. **Region growing.**  Partition `p` is filled breadth-first, starting at
//!    the lowest unassigned node id, until it reaches its target size
//!    (`n / k`, the first `n % k` partitions taking one extra node).  Neighbours
//!    are visited in ascending id order.  If a region runs out of frontier
//!    before reaching its target, growth restarts from the next lowest
//!    unassigned node.
//! 2. **Boundary refinement.**  A fixed number of passes over all nodes in id
//!    order; a node moves to the neighbouring partition it shares the most
//!    links with when that strictly reduces the cut and both partitions stay
//!    within the balance tolerance.
//!
//! Every choice is made in id order, so the result depends only on the graph
//! and `k`, never on hashing or thread scheduling.
//!
//! # Link ownership
//!
//! A link belongs to the partition of its downstream node: the node whose
//! intersection releases entities from it.  Links whose end nodes lie in
//! different partitions are *boundary links*.

use std::collections::VecDeque;

use qs_core::{LinkId, NodeId, PartitionId};

use crate::{NetworkError, NetworkGraph, NetworkResult};

// ── Partitioning ──────────────────────────────────────────────────────────────

/// Result of partitioning: an owner for every node and link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partitioning {
    count:      usize,
    node_owner: Vec<PartitionId>,
    link_owner: Vec<PartitionId>,
    boundary:   Vec<bool>,
}

impl Partitioning {
    /// Everything in partition 0.
    pub fn single(graph: &NetworkGraph) -> Self {
        Self::from_node_owners(graph, 1, vec![PartitionId(0); graph.node_count()])
    }

    fn from_node_owners(graph: &NetworkGraph, count: usize, node_owner: Vec<PartitionId>) -> Self {
        let link_owner: Vec<PartitionId> =
            graph.links().iter().map(|l| node_owner[l.to.index()]).collect();
        let boundary = graph
            .links()
            .iter()
            .map(|l| node_owner[l.from.index()] != node_owner[l.to.index()])
            .collect();
        Self { count, node_owner, link_owner, boundary }
    }

    /// Number of partitions (some may be empty on tiny networks).
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn node_owner(&self, node: NodeId) -> PartitionId {
        self.node_owner[node.index()]
    }

    /// Owner of `link`.  Unknown links map to partition 0.
    pub fn link_owner(&self, link: LinkId) -> PartitionId {
        self.link_owner.get(link.index()).copied().unwrap_or(PartitionId(0))
    }

    /// `true` if `link` connects two different partitions.
    pub fn is_boundary(&self, link: LinkId) -> bool {
        self.boundary.get(link.index()).copied().unwrap_or(false)
    }

    /// Number of boundary links (the cut).
    pub fn cut_size(&self) -> usize {
        self.boundary.iter().filter(|&&b| b).count()
    }

    /// Links owned by `partition`, ascending by id.
    pub fn links_of(&self, partition: PartitionId) -> Vec<LinkId> {
        self.link_owner
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p == partition)
            .map(|(i, _)| LinkId(i as u32))
            .collect()
    }

    /// Node count per partition.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.count];
        for p in &self.node_owner {
            sizes[p.index()] += 1;
        }
        sizes
    }
}

// ── NetworkPartitioner ────────────────────────────────────────────────────────

/// Splits a [`NetworkGraph`] into `count` partitions, minimizing the number of
/// boundary links.
#[derive(Debug, Clone)]
pub struct NetworkPartitioner {
    pub count: usize,
    /// Refinement passes after region growing.
    pub refine_passes: usize,
    /// Allowed deviation from the ideal partition size, as a fraction.
    pub imbalance: f64,
}

impl NetworkPartitioner {
    pub fn new(count: usize) -> Self {
        Self { count, refine_passes: 4, imbalance: 0.05 }
    }

    pub fn partition(&self, graph: &NetworkGraph) -> NetworkResult<Partitioning> {
        if self.count == 0 {
            return Err(NetworkError::Partition("partition count must be >= 1".into()));
        }
        if self.count > u16::MAX as usize {
            return Err(NetworkError::Partition(format!(
                "partition count {} exceeds {}",
                self.count,
                u16::MAX
            )));
        }
        if self.count == 1 {
            return Ok(Partitioning::single(graph));
        }

        let n = graph.node_count();
        let adjacency = undirected_adjacency(graph);
        let mut owner = grow_regions(&adjacency, n, self.count);

        let ideal = n as f64 / self.count as f64;
        let max_size = ((ideal * (1.0 + self.imbalance)).ceil() as usize).max(1);
        let min_size = (ideal * (1.0 - self.imbalance)).floor() as usize;
        for pass in 0..self.refine_passes {
            let moved = refine_pass(&adjacency, &mut owner, self.count, min_size, max_size);
            tracing::trace!(pass, moved, "partition refinement pass");
            if moved == 0 {
                break;
            }
        }

        let partitioning = Partitioning::from_node_owners(graph, self.count, owner);
        tracing::info!(
            partitions = self.count,
            nodes = n,
            boundary_links = partitioning.cut_size(),
            "network partitioned"
        );
        Ok(partitioning)
    }
}

// ── Internals ─────────────────────────────────────────────────────────────────

/// Sorted neighbour lists with one entry per connecting link (either
/// direction), so duplicates encode link multiplicity.  Self-loops are skipped.
fn undirected_adjacency(graph: &NetworkGraph) -> Vec<Vec<u32>> {
    let mut adj = vec![Vec::new(); graph.node_count()];
    for link in graph.links() {
        if link.from != link.to {
            adj[link.from.index()].push(link.to.0);
            adj[link.to.index()].push(link.from.0);
        }
    }
    for list in &mut adj {
        list.sort_unstable();
    }
    adj
}

fn grow_regions(adjacency: &[Vec<u32>], n: usize, k: usize) -> Vec<PartitionId> {
    let mut owner = vec![PartitionId::INVALID; n];
    let base = n / k;
    let extra = n % k;
    let mut cursor = 0usize;

    for p in 0..k {
        let pid = PartitionId(p as u16);
        let target = base + usize::from(p < extra);
        let mut size = 0usize;
        let mut frontier: VecDeque<usize> = VecDeque::new();

        while size < target {
            let Some(v) = frontier.pop_front() else {
                // Frontier exhausted: restart from the lowest unassigned node.
                while cursor < n && owner[cursor].is_valid() {
                    cursor += 1;
                }
                if cursor == n {
                    break;
                }
                owner[cursor] = pid;
                size += 1;
                frontier.push_back(cursor);
                continue;
            };
            for &w in &adjacency[v] {
                if size == target {
                    break;
                }
                let w = w as usize;
                if !owner[w].is_valid() {
                    owner[w] = pid;
                    size += 1;
                    frontier.push_back(w);
                }
            }
        }
    }

    debug_assert!(owner.iter().all(|p| p.is_valid()));
    owner
}

/// One greedy refinement sweep.  Returns the number of nodes moved.
fn refine_pass(
    adjacency: &[Vec<u32>],
    owner: &mut [PartitionId],
    k: usize,
    min_size: usize,
    max_size: usize,
) -> usize {
    let mut sizes = vec![0usize; k];
    for p in owner.iter() {
        sizes[p.index()] += 1;
    }

    let mut links_to = vec![0usize; k];
    let mut moved = 0;

    for v in 0..owner.len() {
        let current = owner[v];
        if sizes[current.index()] <= min_size.max(1) {
            continue;
        }

        links_to.iter_mut().for_each(|c| *c = 0);
        for &w in &adjacency[v] {
            links_to[owner[w as usize].index()] += 1;
        }

        let internal = links_to[current.index()];
        let mut best: Option<(usize, usize)> = None; // (partition, links)
        for (q, &count) in links_to.iter().enumerate() {
            if q == current.index() || count <= internal || sizes[q] + 1 > max_size {
                continue;
            }
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((q, count));
            }
        }

        if let Some((q, _)) = best {
            sizes[current.index()] -= 1;
            sizes[q] += 1;
            owner[v] = PartitionId(q as u16);
            moved += 1;
        }
    }
    moved
}
