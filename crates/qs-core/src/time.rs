//! Simulation time model.
//!
//! # Design
//!
//! The scheduler advances in fixed steps.  A `Tick` counts steps; the mapping
//! to simulated seconds is held in `SimClock`:
//!
//!   secs = start_secs + tick * step_secs
//!
//! Simulated time is integral seconds everywhere (activity end times, event
//! timestamps, earliest link exit times), so comparisons are exact and runs
//! are bit-reproducible.  Only the flow-capacity credit accounting uses
//! floating point.

use std::fmt;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute step counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Steps elapsed from `earlier` to `self`.
    ///
    /// # Panics
    /// Panics in debug mode if `earlier > self`.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0 - earlier.0
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Converts between step counts and simulated seconds.
#[derive(Clone, Debug)]
pub struct SimClock {
    /// Simulated second of tick 0 (e.g. 0 = midnight of the simulated day).
    pub start_secs: u64,
    /// Seconds per step (Δt).
    pub step_secs: u32,
    /// The current tick, advanced by `SimClock::advance()` each step.
    pub current_tick: Tick,
}

impl SimClock {
    pub fn new(start_secs: u64, step_secs: u32) -> Self {
        Self {
            start_secs,
            step_secs,
            current_tick: Tick::ZERO,
        }
    }

    #[inline]
    pub fn advance(&mut self) {
        self.current_tick = Tick(self.current_tick.0 + 1);
    }

    /// Jump forward to `tick`.  Never moves backwards.
    #[inline]
    pub fn advance_to(&mut self, tick: Tick) {
        self.current_tick = self.current_tick.max(tick);
    }

    /// Simulated second at the current tick.
    #[inline]
    pub fn now_secs(&self) -> u64 {
        self.secs_at(self.current_tick)
    }

    /// Simulated second at `tick`.
    #[inline]
    pub fn secs_at(&self, tick: Tick) -> u64 {
        self.start_secs + tick.0 * self.step_secs as u64
    }

    /// The first tick whose time is `>= secs`.  Times before the clock start
    /// map to tick 0.
    pub fn tick_at_or_after(&self, secs: u64) -> Tick {
        let rel = secs.saturating_sub(self.start_secs);
        Tick(rel.div_ceil(self.step_secs as u64))
    }

    /// Break the current time into (hour, minute, second) of the simulated
    /// day, for log lines.  Hours are not wrapped at 24.
    pub fn hms(&self) -> (u64, u32, u32) {
        let secs = self.now_secs();
        let hours = secs / 3_600;
        let minutes = ((secs % 3_600) / 60) as u32;
        let seconds = (secs % 60) as u32;
        (hours, minutes, seconds)
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m, s) = self.hms();
        write!(f, "{} ({:02}:{:02}:{:02})", self.current_tick, h, m, s)
    }
}
