//! Leaky-bucket flow-capacity accounting.
//!
//! A link may release `capacity / period * flow_capacity_factor` entities per
//! second.  With fractional rates (a 900 veh/h link releases 0.25 per second)
//! the fractional part is banked as credit and carried to later steps:
//!
//! ```text
//! step start:  credits = min(credits + per_step, max(ceil(per_step), 1))
//! release:     at most floor(credits) entities, each costs 1 credit
//! ```
//!
//! The ceiling caps the bank right after accrual, so no step ever releases
//! more than one step's worth of flow rounded up to a whole entity.  For a
//! whole-number rate that is exactly `per_step`; an idle or blocked link
//! never saves up a burst, and a remainder below one entity is never lost.

/// Per-link flow credit bank.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowBucket {
    per_step: f64,
    credits:  f64,
}

impl FlowBucket {
    /// Bucket that accrues `per_step` credits each step, starting empty.
    pub fn new(per_step: f64) -> Self {
        Self { per_step, credits: 0.0 }
    }

    pub fn per_step(&self) -> f64 {
        self.per_step
    }

    pub fn credits(&self) -> f64 {
        self.credits
    }

    /// Most whole entities one step can release.
    pub fn max_per_step(&self) -> usize {
        self.cap() as usize
    }

    fn cap(&self) -> f64 {
        self.per_step.ceil().max(1.0)
    }

    #[inline]
    pub fn accrue(&mut self) {
        self.credits = (self.credits + self.per_step).min(self.cap());
    }

    /// Whole entities that may leave now.
    #[inline]
    pub fn budget(&self) -> usize {
        self.credits.floor() as usize
    }

    /// Spend one credit per released entity.
    pub fn consume(&mut self, released: usize) {
        debug_assert!(released <= self.budget());
        self.credits -= released as f64;
    }

    /// Equivalent of `steps` full steps with nothing released.
    pub fn idle_accrue(&mut self, steps: u64) {
        self.credits = (self.credits + self.per_step * steps as f64).min(self.cap());
    }
}
