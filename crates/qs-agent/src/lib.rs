//! `qs-agent`: agents, itineraries, and the travel state machine.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                 |
//! |----------------|----------------------------------------------------------|
//! | [`itinerary`]  | `Activity`, `Leg`, `Segment`, `Itinerary`, `check_route` |
//! | [`state`]      | `AgentState`                                             |
//! | [`agent`]      | `Agent` and its checked transitions                      |
//! | [`wake_queue`] | `WakeQueue` (`BTreeMap<Tick, Vec<AgentId>>`)             |
//! | [`loader`]     | `load_plans_csv`, `load_plans_reader`, `Population`      |
//! | [`error`]      | `AgentError`, `AgentResult<T>`                           |
//!
//! # Lifecycle (summary)
//!
//! ```text
//! AtActivity → Departing → EnRoute (→ EnRoute)* → Arriving → AtActivity … → Finished
//! ```
//!
//! Every arrow is one method on [`Agent`] and one emitted event.  The
//! segment index moves forward at `end_activity` and `start_activity` only.

pub mod agent;
pub mod error;
pub mod itinerary;
pub mod loader;
pub mod state;
pub mod wake_queue;


pub use agent::Agent;
pub use error::{AgentError, AgentResult};
pub use itinerary::{Activity, Itinerary, Leg, Segment, check_route};
pub use loader::{Population, load_plans_csv, load_plans_reader, parse_time};
pub use state::AgentState;
pub use wake_queue::WakeQueue;
