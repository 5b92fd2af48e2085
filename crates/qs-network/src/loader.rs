//! CSV network loader.
//!
//! # CSV format
//!
//! Two files.  `nodes.csv`:
//!
//! ```csv
//! id,x,y
//! a,0,0
//! b,1000,0
//! ```
//!
//! `links.csv` (`length`, `lanes` and `storage` may be left empty):
//!
//! ```csv
//! id,from,to,length,freespeed,capacity,lanes,storage
//! ab,a,b,1000,13.9,1800,1,
//! ba,b,a,,13.9,1800,,
//! ```
//!
//! External ids are arbitrary strings; they are mapped to dense internal ids
//! in file order and the mapping is returned as a [`NetworkIndex`] so plans
//! and output can translate between the two.  A missing `length` defaults to
//! the Euclidean distance between the end nodes.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use qs_core::{Coord, LinkId, NodeId};

use crate::graph::{LinkSpec, NetworkBuilder, NetworkGraph};
use crate::{NetworkError, NetworkResult};

// ── CSV records ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NodeRecord {
    id: String,
    x:  f64,
    y:  f64,
}

#[derive(Deserialize)]
struct LinkRecord {
    id:        String,
    from:      String,
    to:        String,
    #[serde(default)]
    length:    Option<f64>,
    freespeed: f64,
    capacity:  f64,
    #[serde(default)]
    lanes:     Option<f64>,
    #[serde(default)]
    storage:   Option<f64>,
}

// ── NetworkIndex ──────────────────────────────────────────────────────────────

/// Two-way mapping between external (file) ids and internal dense ids.
#[derive(Debug, Default, Clone)]
pub struct NetworkIndex {
    node_ids:   HashMap<String, NodeId>,
    link_ids:   HashMap<String, LinkId>,
    node_names: Vec<String>,
    link_names: Vec<String>,
}

impl NetworkIndex {
    pub fn node_id(&self, external: &str) -> Option<NodeId> {
        self.node_ids.get(external).copied()
    }

    pub fn link_id(&self, external: &str) -> Option<LinkId> {
        self.link_ids.get(external).copied()
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.node_names.get(id.index()).map(String::as_str)
    }

    pub fn link_name(&self, id: LinkId) -> Option<&str> {
        self.link_names.get(id.index()).map(String::as_str)
    }

    pub fn link_count(&self) -> usize {
        self.link_names.len()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load a network from `nodes.csv` and `links.csv` files.
pub fn load_network_csv(
    nodes_path: &Path,
    links_path: &Path,
) -> NetworkResult<(NetworkGraph, NetworkIndex)> {
    let nodes = std::fs::File::open(nodes_path)?;
    let links = std::fs::File::open(links_path)?;
    load_network_readers(nodes, links)
}

/// Like [`load_network_csv`] but accepts any `Read` sources (useful for tests
/// with `std::io::Cursor`).
pub fn load_network_readers<N: Read, L: Read>(
    nodes: N,
    links: L,
) -> NetworkResult<(NetworkGraph, NetworkIndex)> {
    let mut builder = NetworkBuilder::new();
    let mut index = NetworkIndex::default();

    // ── Nodes ─────────────────────────────────────────────────────────────
    let mut node_reader = csv::Reader::from_reader(nodes);
    for result in node_reader.deserialize::<NodeRecord>() {
        let row = result?;
        if index.node_ids.contains_key(&row.id) {
            return Err(NetworkError::InvalidTopology(format!("duplicate node id {:?}", row.id)));
        }
        let id = builder.add_node(Coord::new(row.x, row.y));
        index.node_ids.insert(row.id.clone(), id);
        index.node_names.push(row.id);
    }

    // ── Links ─────────────────────────────────────────────────────────────
    let mut link_reader = csv::Reader::from_reader(links);
    for result in link_reader.deserialize::<LinkRecord>() {
        let row = result?;
        if index.link_ids.contains_key(&row.id) {
            return Err(NetworkError::InvalidTopology(format!("duplicate link id {:?}", row.id)));
        }
        let from = resolve_node(&index, &row.id, &row.from)?;
        let to   = resolve_node(&index, &row.id, &row.to)?;

        let length_m = match row.length {
            Some(l) => l,
            None => {
                // Both nodes were resolved above, so the coordinates exist.
                let a = builder.node_coord(from).unwrap_or_default();
                let b = builder.node_coord(to).unwrap_or_default();
                let derived = a.distance(b);
                tracing::warn!(link = %row.id, length_m = derived, "link length missing, using node distance");
                derived
            }
        };

        let mut spec = LinkSpec::new(from, to, length_m, row.freespeed, row.capacity)
            .with_lanes(row.lanes.unwrap_or(1.0));
        if let Some(s) = row.storage {
            spec = spec.with_storage(s);
        }

        let id = builder.add_link(spec);
        index.link_ids.insert(row.id.clone(), id);
        index.link_names.push(row.id);
    }

    let graph = builder.build()?;
    tracing::info!(
        nodes = graph.node_count(),
        links = graph.link_count(),
        "loaded network"
    );
    Ok((graph, index))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn resolve_node(index: &NetworkIndex, link: &str, node: &str) -> NetworkResult<NodeId> {
    index.node_id(node).ok_or_else(|| {
        NetworkError::InvalidTopology(format!("link {link:?} references unknown node {node:?}"))
    })
}
