//! Fluent builder for constructing a [`Sim`].

use std::collections::BTreeSet;

use qs_agent::{Agent, AgentState};
use qs_core::{PartitionId, SimConfig};
use qs_mobility::LinkQueue;
use qs_network::{NetworkGraph, NetworkPartitioner, Partitioning};

use crate::partition::PartitionState;
use crate::workers::Workers;
use crate::{CancelToken, Sim, SimError, SimResult};

/// Fluent builder for [`Sim`].
///
/// # Required inputs
///
/// - [`SimConfig`]: step size, partition count, capacity factors, ...
/// - [`NetworkGraph`]: the validated road network
///
/// # Optional inputs (have defaults)
///
/// | Method                | Default                                          |
/// |-----------------------|--------------------------------------------------|
/// | `.agents(v)`          | No agents                                        |
/// | `.partitioning(p)`    | `NetworkPartitioner::new(config.partition_count)`|
/// | `.cancel_token(t)`    | A fresh token nobody else holds                  |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, graph)
///     .agents(population.agents)
///     .build()?;
/// let mut bus = EventBus::new(vec![&mut writer]);
/// let report = sim.run(&mut bus, &mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    config:       SimConfig,
    graph:        NetworkGraph,
    agents:       Vec<Agent>,
    partitioning: Option<Partitioning>,
    cancel:       Option<CancelToken>,
}

impl SimBuilder {
    pub fn new(config: SimConfig, graph: NetworkGraph) -> Self {
        Self {
            config,
            graph,
            agents:       Vec::new(),
            partitioning: None,
            cancel:       None,
        }
    }

    /// Agents to simulate.  Each must be fresh: at its first activity with no
    /// transition taken yet.  Ids must be unique.
    pub fn agents(mut self, agents: Vec<Agent>) -> Self {
        self.agents = agents;
        self
    }

    /// Use a precomputed partitioning instead of running the partitioner.
    /// Its partition count must equal `config.partition_count`.
    pub fn partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = Some(partitioning);
        self
    }

    /// Token the caller can use to stop the run between steps.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validate inputs, partition the network, distribute links and agents to
    /// their owners and return a ready-to-run [`Sim`].
    pub fn build(self) -> SimResult<Sim> {
        let config = self.config;
        config.validate()?;

        // ── Validate agents ───────────────────────────────────────────────
        let mut seen = BTreeSet::new();
        for agent in &self.agents {
            if !seen.insert(agent.id) {
                return Err(SimError::Config(format!("duplicate agent id {}", agent.id)));
            }
            if agent.state() != AgentState::AtActivity || agent.segment_index() != 0 {
                return Err(SimError::Config(format!(
                    "{} is not at its first activity ({})",
                    agent.id,
                    agent.state().as_str()
                )));
            }
        }

        // ── Partition ─────────────────────────────────────────────────────
        let partitioning = match self.partitioning {
            Some(p) if p.count() != config.partition_count => {
                return Err(SimError::Config(format!(
                    "partitioning has {} partitions, config asks for {}",
                    p.count(),
                    config.partition_count
                )));
            }
            Some(p) => p,
            None => NetworkPartitioner::new(config.partition_count).partition(&self.graph)?,
        };

        // ── Distribute links and agents ───────────────────────────────────
        let mut parts: Vec<PartitionState> = (0..partitioning.count())
            .map(|i| PartitionState::new(PartitionId(i as u16)))
            .collect();
        let capacity_period = self.graph.capacity_period_secs();
        for link in self.graph.links() {
            let owner = partitioning.link_owner(link.id);
            let part = parts.get_mut(owner.index()).ok_or_else(|| {
                SimError::Config(format!("{} assigned to missing {owner}", link.id))
            })?;
            part.add_link(LinkQueue::new(link, capacity_period, &config));
        }

        let clock = config.make_clock();
        let agent_count = self.agents.len();
        for agent in self.agents {
            let owner = agent
                .itinerary()
                .first_activity()
                .map_or(PartitionId(0), |a| partitioning.link_owner(a.link));
            let part = parts.get_mut(owner.index()).ok_or_else(|| {
                SimError::Config(format!("{} assigned to missing {owner}", agent.id))
            })?;
            part.add_agent(agent, &clock);
        }

        tracing::info!(
            partitions = parts.len(),
            links = self.graph.link_count(),
            agents = agent_count,
            boundary_links = partitioning.cut_size(),
            "simulation built"
        );

        Ok(Sim {
            workers: Workers::new(config.num_threads)?,
            cancel: self.cancel.unwrap_or_default(),
            clock,
            config,
            graph: self.graph,
            partitioning,
            parts,
            steps: 0,
            last_step_time: None,
            events_emitted: 0,
            boundary_transfers: 0,
            capacity_warnings: Vec::new(),
        })
    }
}
