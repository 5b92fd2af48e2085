//! Itineraries: the ordered activity/leg chain an agent executes.
//!
//! A valid itinerary alternates `Activity, Leg, Activity, …, Activity`.  It
//! starts and ends with an activity, and every activity except the last must
//! say when it ends (absolute `end_time` or a `duration`).
//!
//! Routes are not checked against the network here; an unknown or
//! disconnected link is discovered when the agent tries to depart and ends
//! that agent's day early instead of failing the run.

use qs_core::LinkId;
use qs_network::NetworkGraph;

use crate::{AgentError, AgentResult};

// ── Activity / Leg ────────────────────────────────────────────────────────────

/// A stay at a link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Activity {
    /// Free-form label (`home`, `work`, …).  Carried through to output only.
    pub activity_type: String,
    pub link:          LinkId,
    /// Absolute simulated second at which the activity ends.
    pub end_time:      Option<u64>,
    /// Length of the activity, used when `end_time` is absent.
    pub duration:      Option<u64>,
}

impl Activity {
    pub fn new(activity_type: impl Into<String>, link: LinkId) -> Self {
        Self { activity_type: activity_type.into(), link, end_time: None, duration: None }
    }

    pub fn ending_at(mut self, secs: u64) -> Self {
        self.end_time = Some(secs);
        self
    }

    pub fn lasting(mut self, secs: u64) -> Self {
        self.duration = Some(secs);
        self
    }

    /// When the activity ends if it started at `started_at`.  An explicit
    /// end time takes precedence over the duration.
    pub fn end_after(&self, started_at: u64) -> Option<u64> {
        self.end_time.or_else(|| self.duration.map(|d| started_at.saturating_add(d)))
    }

    pub fn has_end(&self) -> bool {
        self.end_time.is_some() || self.duration.is_some()
    }
}

/// A network trip between two activities.
///
/// `route` lists every link travelled, including the origin activity's link
/// (where the agent enters traffic) and the destination activity's link
/// (where it leaves).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leg {
    pub mode:  String,
    pub route: Vec<LinkId>,
}

impl Leg {
    pub fn car(route: Vec<LinkId>) -> Self {
        Self { mode: "car".into(), route }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Activity(Activity),
    Leg(Leg),
}

// ── Itinerary ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Itinerary {
    segments: Vec<Segment>,
}

impl Itinerary {
    /// Validate the activity/leg structure.
    pub fn new(segments: Vec<Segment>) -> AgentResult<Self> {
        let invalid = |msg: String| Err(AgentError::InvalidItinerary(msg));

        if segments.is_empty() {
            return invalid("itinerary is empty".into());
        }
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            match (i % 2, segment) {
                (0, Segment::Activity(act)) => {
                    if i != last && !act.has_end() {
                        return invalid(format!(
                            "activity {i} ({}) has neither end time nor duration",
                            act.activity_type
                        ));
                    }
                }
                (1, Segment::Leg(_)) => {}
                (0, Segment::Leg(_)) => return invalid(format!("segment {i} must be an activity")),
                _ => return invalid(format!("segment {i} must be a leg")),
            }
        }
        if last % 2 != 0 {
            return invalid("itinerary must end with an activity".into());
        }
        Ok(Self { segments })
    }

    /// A single open-ended activity.
    pub fn stay(activity: Activity) -> Self {
        Self { segments: vec![Segment::Activity(activity)] }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn activity(&self, index: usize) -> Option<&Activity> {
        match self.segments.get(index)? {
            Segment::Activity(a) => Some(a),
            Segment::Leg(_) => None,
        }
    }

    pub fn leg(&self, index: usize) -> Option<&Leg> {
        match self.segments.get(index)? {
            Segment::Leg(l) => Some(l),
            Segment::Activity(_) => None,
        }
    }

    pub fn first_activity(&self) -> Option<&Activity> {
        self.activity(0)
    }

    pub fn legs(&self) -> impl Iterator<Item = &Leg> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Leg(l) => Some(l),
            Segment::Activity(_) => None,
        })
    }
}

// ── Route checking ────────────────────────────────────────────────────────────

/// Check that `route` can be driven from `origin` to `destination` on
/// `graph`: non-empty, starts at the origin link, ends at the destination
/// link, every link exists and each link's downstream node is the next
/// link's upstream node.
///
/// Returns the first offending link on failure (the destination for an
/// empty route).
pub fn check_route(
    graph: &NetworkGraph,
    origin: LinkId,
    destination: LinkId,
    route: &[LinkId],
) -> Result<(), LinkId> {
    let (Some(&first), Some(&last)) = (route.first(), route.last()) else {
        return Err(destination);
    };
    if let Some(&missing) = route.iter().find(|&&l| !graph.contains_link(l)) {
        return Err(missing);
    }
    if first != origin {
        return Err(origin);
    }
    if last != destination {
        return Err(destination);
    }
    match route.windows(2).find(|w| !graph.is_adjacent(w[0], w[1])) {
        Some(w) => Err(w[1]),
        None => Ok(()),
    }
}
