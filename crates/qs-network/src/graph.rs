//! Network graph representation and builder.
//!
//! # Data layout
//!
//! Links keep the ids the builder handed out (insertion order), so external
//! plans built against a `NetworkBuilder` stay valid.  Adjacency is stored in
//! **Compressed Sparse Row (CSR)** form in both directions: given a
//! `NodeId n`, its outgoing links occupy
//!
//! ```text
//! out_links[ out_start[n] .. out_start[n+1] ]
//! ```
//!
//! and likewise for `in_links` / `in_start`.  Each slice is sorted by
//! `LinkId`, which the simulation relies on for deterministic iteration.
//!
//! The graph is read-only after [`NetworkBuilder::build`]; all runtime state
//! (queues, flow credits) lives in `qs-mobility`.

use qs_core::{Coord, LinkId, NodeId};

use crate::{NetworkError, NetworkResult};

/// Default period in which link flow capacities are expressed (vehicles per hour).
pub const DEFAULT_CAPACITY_PERIOD_SECS: f64 = 3_600.0;

/// Space one vehicle occupies in a jam, in metres.  Used to derive storage
/// capacity from geometry when none is given explicitly.
pub const EFFECTIVE_CELL_SIZE_M: f64 = 7.5;

// ── Node / Link ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id:    NodeId,
    pub coord: Coord,
}

/// A directed link with its static capacity and geometry attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub id:   LinkId,
    pub from: NodeId,
    pub to:   NodeId,

    /// Length in metres.
    pub length_m: f64,

    /// Free-flow speed in metres per second.
    pub freespeed_mps: f64,

    /// Flow capacity in entities per capacity period (see
    /// [`NetworkGraph::capacity_period_secs`]).
    pub capacity: f64,

    pub lanes: f64,

    /// Maximum number of entities on the link at once, before the run's
    /// storage-capacity factor is applied.
    pub storage_capacity: f64,
}

impl Link {
    /// Minimum traversal time in whole seconds (rounded up, so an entity is
    /// never faster than free flow).
    #[inline]
    pub fn free_flow_secs(&self) -> u64 {
        (self.length_m / self.freespeed_mps).ceil() as u64
    }
}

// ── LinkSpec ──────────────────────────────────────────────────────────────────

/// Builder input for one directed link.
#[derive(Clone, Debug)]
pub struct LinkSpec {
    pub from:          NodeId,
    pub to:            NodeId,
    pub length_m:      f64,
    pub freespeed_mps: f64,
    pub capacity:      f64,
    pub lanes:         f64,
    /// Explicit storage capacity.  `None` derives it from
    /// `length * lanes / EFFECTIVE_CELL_SIZE_M` (at least 1).
    pub storage:       Option<f64>,
}

impl LinkSpec {
    /// A single-lane link with geometry-derived storage.
    pub fn new(from: NodeId, to: NodeId, length_m: f64, freespeed_mps: f64, capacity: f64) -> Self {
        Self {
            from,
            to,
            length_m,
            freespeed_mps,
            capacity,
            lanes: 1.0,
            storage: None,
        }
    }

    pub fn with_lanes(mut self, lanes: f64) -> Self {
        self.lanes = lanes;
        self
    }

    pub fn with_storage(mut self, storage: f64) -> Self {
        self.storage = Some(storage);
        self
    }
}

// ── NetworkGraph ──────────────────────────────────────────────────────────────

/// Immutable directed network with CSR adjacency in both directions.
///
/// Do not construct directly; use [`NetworkBuilder`].
#[derive(Debug)]
pub struct NetworkGraph {
    nodes: Vec<Node>,
    links: Vec<Link>,

    out_start: Vec<u32>,
    out_links: Vec<LinkId>,
    in_start:  Vec<u32>,
    in_links:  Vec<LinkId>,

    capacity_period_secs: f64,
}

impl NetworkGraph {
    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Period in seconds that link `capacity` values refer to.
    pub fn capacity_period_secs(&self) -> f64 {
        self.capacity_period_secs
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    /// Fails with [`NetworkError::LinkNotFound`] on an unknown id.
    pub fn link(&self, id: LinkId) -> NetworkResult<&Link> {
        self.links.get(id.index()).ok_or(NetworkError::LinkNotFound(id))
    }

    /// Fails with [`NetworkError::NodeNotFound`] on an unknown id.
    pub fn node(&self, id: NodeId) -> NetworkResult<&Node> {
        self.nodes.get(id.index()).ok_or(NetworkError::NodeNotFound(id))
    }

    #[inline]
    pub fn contains_link(&self, id: LinkId) -> bool {
        id.index() < self.links.len()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Outgoing links of `node`, sorted by id.  Contiguous slice, no
    /// allocation.
    pub fn outgoing_links(&self, node: NodeId) -> NetworkResult<&[LinkId]> {
        if node.index() >= self.nodes.len() {
            return Err(NetworkError::NodeNotFound(node));
        }
        let start = self.out_start[node.index()] as usize;
        let end   = self.out_start[node.index() + 1] as usize;
        Ok(&self.out_links[start..end])
    }

    /// Incoming links of `node`, sorted by id.
    pub fn incoming_links(&self, node: NodeId) -> NetworkResult<&[LinkId]> {
        if node.index() >= self.nodes.len() {
            return Err(NetworkError::NodeNotFound(node));
        }
        let start = self.in_start[node.index()] as usize;
        let end   = self.in_start[node.index() + 1] as usize;
        Ok(&self.in_links[start..end])
    }

    /// `true` if an entity leaving `from` can enter `to` directly, i.e. the
    /// downstream node of `from` is the upstream node of `to`.  Unknown ids
    /// are never adjacent.
    pub fn is_adjacent(&self, from: LinkId, to: LinkId) -> bool {
        match (self.links.get(from.index()), self.links.get(to.index())) {
            (Some(a), Some(b)) => a.to == b.from,
            _ => false,
        }
    }

    /// Entities per second a link can release at flow-capacity factor 1.
    pub fn flow_per_sec(&self, link: LinkId) -> NetworkResult<f64> {
        Ok(self.link(link)?.capacity / self.capacity_period_secs)
    }
}

// ── NetworkBuilder ────────────────────────────────────────────────────────────

/// Construct a [`NetworkGraph`] incrementally, then call [`build`](Self::build).
///
/// Nodes and links may be added in any order; validation happens in `build`.
///
/// # Example
///
/// ```
/// use qs_core::Coord;
/// use qs_network::{LinkSpec, NetworkBuilder};
///
/// let mut b = NetworkBuilder::new();
/// let a = b.add_node(Coord::new(0.0, 0.0));
/// let c = b.add_node(Coord::new(1_000.0, 0.0));
/// b.add_link(LinkSpec::new(a, c, 1_000.0, 13.9, 1_800.0));
/// let net = b.build().unwrap();
/// assert_eq!(net.link_count(), 1);
/// ```
pub struct NetworkBuilder {
    nodes:                Vec<Coord>,
    links:                Vec<LinkSpec>,
    capacity_period_secs: f64,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self {
            nodes:                Vec::new(),
            links:                Vec::new(),
            capacity_period_secs: DEFAULT_CAPACITY_PERIOD_SECS,
        }
    }

    /// Pre-allocate for the expected number of nodes and links.
    pub fn with_capacity(nodes: usize, links: usize) -> Self {
        Self {
            nodes:                Vec::with_capacity(nodes),
            links:                Vec::with_capacity(links),
            capacity_period_secs: DEFAULT_CAPACITY_PERIOD_SECS,
        }
    }

    /// Change the period link capacities are expressed in (default 3600 s).
    pub fn capacity_period_secs(mut self, secs: f64) -> Self {
        self.capacity_period_secs = secs;
        self
    }

    /// Add a node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, coord: Coord) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(coord);
        id
    }

    /// Add a directed link and return its `LinkId` (sequential from 0).
    pub fn add_link(&mut self, spec: LinkSpec) -> LinkId {
        let id = LinkId(self.links.len() as u32);
        self.links.push(spec);
        id
    }

    /// Convenience: add a link in each direction with identical attributes.
    /// Returns `(a→b, b→a)`.
    pub fn add_two_way(&mut self, spec: LinkSpec) -> (LinkId, LinkId) {
        let reverse = LinkSpec { from: spec.to, to: spec.from, ..spec.clone() };
        (self.add_link(spec), self.add_link(reverse))
    }

    pub fn node_coord(&self, id: NodeId) -> Option<Coord> {
        self.nodes.get(id.index()).copied()
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn link_count(&self) -> usize { self.links.len() }

    /// Validate and freeze the network.
    ///
    /// Fails with [`NetworkError::InvalidTopology`] if a link references a
    /// missing node or has a non-positive speed, flow or storage capacity.
    pub fn build(self) -> NetworkResult<NetworkGraph> {
        if !(self.capacity_period_secs > 0.0 && self.capacity_period_secs.is_finite()) {
            return Err(NetworkError::InvalidTopology(format!(
                "capacity period must be positive, got {}",
                self.capacity_period_secs
            )));
        }

        let node_count = self.nodes.len();
        let mut links = Vec::with_capacity(self.links.len());

        for (i, spec) in self.links.into_iter().enumerate() {
            let id = LinkId(i as u32);
            validate_spec(id, &spec, node_count)?;
            let storage_capacity = spec
                .storage
                .unwrap_or_else(|| (spec.length_m * spec.lanes / EFFECTIVE_CELL_SIZE_M).max(1.0));
            links.push(Link {
                id,
                from:             spec.from,
                to:               spec.to,
                length_m:         spec.length_m,
                freespeed_mps:    spec.freespeed_mps,
                capacity:         spec.capacity,
                lanes:            spec.lanes,
                storage_capacity,
            });
        }

        let (out_start, out_links) = build_csr(node_count, &links, |l| l.from);
        let (in_start, in_links)   = build_csr(node_count, &links, |l| l.to);

        tracing::debug!(nodes = node_count, links = links.len(), "network built");

        Ok(NetworkGraph {
            nodes: self
                .nodes
                .into_iter()
                .enumerate()
                .map(|(i, coord)| Node { id: NodeId(i as u32), coord })
                .collect(),
            links,
            out_start,
            out_links,
            in_start,
            in_links,
            capacity_period_secs: self.capacity_period_secs,
        })
    }
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_spec(id: LinkId, spec: &LinkSpec, node_count: usize) -> NetworkResult<()> {
    let invalid = |what: String| Err(NetworkError::InvalidTopology(format!("{id}: {what}")));

    if spec.from.index() >= node_count {
        return invalid(format!("upstream node {} does not exist", spec.from));
    }
    if spec.to.index() >= node_count {
        return invalid(format!("downstream node {} does not exist", spec.to));
    }
    if !(spec.length_m >= 0.0 && spec.length_m.is_finite()) {
        return invalid(format!("length must be >= 0, got {}", spec.length_m));
    }
    if !(spec.freespeed_mps > 0.0 && spec.freespeed_mps.is_finite()) {
        return invalid(format!("free speed must be > 0, got {}", spec.freespeed_mps));
    }
    if !(spec.capacity > 0.0 && spec.capacity.is_finite()) {
        return invalid(format!("flow capacity must be > 0, got {}", spec.capacity));
    }
    if !(spec.lanes > 0.0 && spec.lanes.is_finite()) {
        return invalid(format!("lane count must be > 0, got {}", spec.lanes));
    }
    if let Some(s) = spec.storage {
        if !(s > 0.0 && s.is_finite()) {
            return invalid(format!("storage capacity must be > 0, got {s}"));
        }
    }
    Ok(())
}

/// Build a CSR row pointer and link list grouped by `key(link)`, with each
/// group sorted by `LinkId`.
fn build_csr(
    node_count: usize,
    links: &[Link],
    key: impl Fn(&Link) -> NodeId,
) -> (Vec<u32>, Vec<LinkId>) {
    let mut sorted: Vec<&Link> = links.iter().collect();
    sorted.sort_by_key(|l| (key(l), l.id));

    let mut start = vec![0u32; node_count + 1];
    for l in &sorted {
        start[key(l).index() + 1] += 1;
    }
    for i in 1..=node_count {
        start[i] += start[i - 1];
    }
    debug_assert_eq!(start[node_count] as usize, links.len());

    (start, sorted.into_iter().map(|l| l.id).collect())
}
