//! CSV population loader.
//!
//! # CSV format
//!
//! One row per itinerary segment, ordered within an agent by `seq`:
//!
//! ```csv
//! agent_id,seq,kind,activity_type,link,end_time,duration,route
//! p1,0,act,home,l1,07:30:00,,
//! p1,1,leg,,,,,l1 l2 l3
//! p1,2,act,work,l3,,8:00:00,
//! p1,3,leg,,,,,l3 l4 l1
//! p1,4,act,home,l1,,,
//! ```
//!
//! `kind` is `act`/`activity` or `leg`.  Times are either plain seconds or
//! `H:MM:SS`.  `route` is a space-separated list of link ids.  Link ids are
//! the external ids of the network's `links.csv`.
//!
//! Agents receive dense ids in order of first appearance.  A link id not in
//! the network is kept as `LinkId::INVALID` (with a warning) so the agent is
//! reported as unable to reach its destination during the run rather than
//! failing the load.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use qs_core::{AgentId, LinkId};
use qs_network::NetworkIndex;

use crate::itinerary::{Activity, Itinerary, Leg, Segment};
use crate::{Agent, AgentError, AgentResult};

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PlanRecord {
    agent_id:      String,
    seq:           u32,
    kind:          String,
    #[serde(default)]
    activity_type: Option<String>,
    #[serde(default)]
    link:          Option<String>,
    #[serde(default)]
    end_time:      Option<String>,
    #[serde(default)]
    duration:      Option<String>,
    #[serde(default)]
    route:         Option<String>,
}

// ── Population ────────────────────────────────────────────────────────────────

/// Loaded agents plus the external id of each.
#[derive(Debug, Default)]
pub struct Population {
    pub agents: Vec<Agent>,
    names:      Vec<String>,
}

impl Population {
    pub fn name(&self, id: AgentId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load a population from a `plans.csv` file.
pub fn load_plans_csv(path: &Path, index: &NetworkIndex, start_secs: u64) -> AgentResult<Population> {
    let file = std::fs::File::open(path)?;
    load_plans_reader(file, index, start_secs)
}

/// Like [`load_plans_csv`] but accepts any `Read` source.
pub fn load_plans_reader<R: Read>(
    reader: R,
    index: &NetworkIndex,
    start_secs: u64,
) -> AgentResult<Population> {
    // ── Group rows by agent, keeping first-appearance order ───────────────
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut order: Vec<String> = Vec::new();
    let mut by_agent: HashMap<String, Vec<PlanRecord>> = HashMap::new();

    for result in csv_reader.deserialize::<PlanRecord>() {
        let row = result?;
        if !by_agent.contains_key(&row.agent_id) {
            order.push(row.agent_id.clone());
        }
        by_agent.entry(row.agent_id.clone()).or_default().push(row);
    }

    // ── Build one Agent per external id ───────────────────────────────────
    let mut population = Population::default();
    let mut unknown_links = 0usize;

    for (i, name) in order.into_iter().enumerate() {
        let mut rows = by_agent.remove(&name).unwrap_or_default();
        rows.sort_by_key(|r| r.seq);

        let segments = rows
            .into_iter()
            .map(|r| to_segment(&name, r, index, &mut unknown_links))
            .collect::<AgentResult<Vec<_>>>()?;
        let itinerary = Itinerary::new(segments)
            .map_err(|e| AgentError::Parse(format!("agent {name:?}: {e}")))?;

        let id = AgentId::try_from(i)
            .map_err(|_| AgentError::Parse("too many agents".into()))?;
        population.agents.push(Agent::new(id, itinerary, start_secs));
        population.names.push(name);
    }

    if unknown_links > 0 {
        tracing::warn!(
            unknown_links,
            "plans reference links missing from the network; affected agents will not travel"
        );
    }
    tracing::info!(agents = population.len(), "loaded plans");
    Ok(population)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn to_segment(
    agent: &str,
    row: PlanRecord,
    index: &NetworkIndex,
    unknown_links: &mut usize,
) -> AgentResult<Segment> {
    let mut resolve = |external: &str| {
        index.link_id(external).unwrap_or_else(|| {
            tracing::debug!(agent, link = external, "unknown link id");
            *unknown_links += 1;
            LinkId::INVALID
        })
    };

    match row.kind.trim() {
        "act" | "activity" => {
            let link = row
                .link
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AgentError::Parse(format!("agent {agent:?}: activity without link")))?;
            Ok(Segment::Activity(Activity {
                activity_type: row.activity_type.unwrap_or_default(),
                link:          resolve(link),
                end_time:      parse_time_field(row.end_time.as_deref())?,
                duration:      parse_time_field(row.duration.as_deref())?,
            }))
        }
        "leg" => {
            let route = row
                .route
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .map(&mut resolve)
                .collect();
            Ok(Segment::Leg(Leg::car(route)))
        }
        other => Err(AgentError::Parse(format!(
            "agent {agent:?}: unknown segment kind {other:?}, expected \"act\" or \"leg\""
        ))),
    }
}

fn parse_time_field(field: Option<&str>) -> AgentResult<Option<u64>> {
    match field.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_time(s)
            .map(Some)
            .ok_or_else(|| AgentError::Parse(format!("invalid time {s:?}"))),
    }
}

/// Parse `"27000"`, `"7:30"` or `"07:30:00"` into seconds.
pub fn parse_time(s: &str) -> Option<u64> {
    let parts: Vec<&str> = s.split(':').collect();
    let nums = parts
        .iter()
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;
    match nums.as_slice() {
        [secs] => Some(*secs),
        [h, m] if *m < 60 => h.checked_mul(3_600)?.checked_add(m * 60),
        [h, m, sec] if *m < 60 && *sec < 60 => {
            h.checked_mul(3_600)?.checked_add(m * 60)?.checked_add(*sec)
        }
        _ => None,
    }
}
