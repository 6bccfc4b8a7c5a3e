//! Pure tally state. Every transition that resets the tally returns the
//! signal describing it, so the reset and the signal are one step.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FireReason {
    Threshold,
    Manual,
}

/// Signal emitted by the counter whenever the tally is reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CounterSignal {
    /// Threshold crossed (or manual trigger): a pick should follow.
    Fire {
        count: u32,
        reason: FireReason,
        at: DateTime<Utc>,
    },
    /// Window elapsed with a non-zero tally; nothing else happens.
    SilentReset { count: u32, at: DateTime<Utc> },
}

impl CounterSignal {
    /// Tally value captured right before the reset.
    pub fn count(&self) -> u32 {
        match self {
            CounterSignal::Fire { count, .. } | CounterSignal::SilentReset { count, .. } => *count,
        }
    }

    pub fn is_fire(&self) -> bool {
        matches!(self, CounterSignal::Fire { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TallyState {
    tally: u32,
    threshold: u32,
    window_started_at: DateTime<Utc>,
}

impl TallyState {
    /// A threshold of 0 is treated as 1.
    pub fn new(threshold: u32, now: DateTime<Utc>) -> Self {
        Self {
            tally: 0,
            threshold: threshold.max(1),
            window_started_at: now,
        }
    }

    pub fn tally(&self) -> u32 {
        self.tally
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn window_started_at(&self) -> DateTime<Utc> {
        self.window_started_at
    }

    /// Count one event. Returns a fire signal (and zeroes the tally) when
    /// the threshold is reached.
    pub fn record_event(&mut self, now: DateTime<Utc>) -> Option<CounterSignal> {
        self.tally = self.tally.saturating_add(1);
        if self.tally < self.threshold {
            return None;
        }
        let count = std::mem::take(&mut self.tally);
        Some(CounterSignal::Fire {
            count,
            reason: FireReason::Threshold,
            at: now,
        })
    }

    /// Window tick. Starts a new window; a non-zero tally is reset and
    /// reported, a zero tally is not.
    pub fn expire_window(&mut self, now: DateTime<Utc>) -> Option<CounterSignal> {
        self.window_started_at = now;
        if self.tally == 0 {
            return None;
        }
        let count = std::mem::take(&mut self.tally);
        Some(CounterSignal::SilentReset { count, at: now })
    }

    /// Fire regardless of the current tally.
    pub fn force_fire(&mut self, now: DateTime<Utc>) -> CounterSignal {
        let count = std::mem::take(&mut self.tally);
        CounterSignal::Fire {
            count,
            reason: FireReason::Manual,
            at: now,
        }
    }
}
