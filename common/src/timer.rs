//! Cooperative timers polled from the control loop.
//!
//! The registry never sleeps. The loop calls [`TimerRegistry::advance`] once per
//! iteration and each use-site asks [`TimerRegistry::elapsed`] whether its
//! deadline has passed. A timer reports `true` once per arming; it stays quiet
//! until [`TimerRegistry::reset`] re-arms it.

use crate::error::ConfigError;

/// Fixed number of timer slots. Registering more is a startup error.
pub const TIMER_BUDGET: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(usize);

#[derive(Debug, Clone, Copy, Default)]
struct Timer {
    interval_ms: u64,
    deadline_ms: u64,
    fired: bool,
}

#[derive(Debug, Clone)]
pub struct TimerRegistry {
    timers: [Timer; TIMER_BUDGET],
    registered: usize,
    now_ms: u64,
}

impl TimerRegistry {
    pub fn new(now_ms: u64) -> Self {
        Self {
            timers: [Timer::default(); TIMER_BUDGET],
            registered: 0,
            now_ms,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Moves the registry clock forward. Earlier timestamps are ignored.
    pub fn advance(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Registers a timer armed to fire `interval_ms` from now.
    pub fn register(&mut self, interval_ms: u64) -> Result<TimerId, ConfigError> {
        if self.registered == TIMER_BUDGET {
            return Err(ConfigError::TimerBudgetExhausted(TIMER_BUDGET));
        }

        let id = TimerId(self.registered);
        self.timers[id.0] = Timer {
            interval_ms,
            deadline_ms: self.now_ms.saturating_add(interval_ms),
            fired: false,
        };
        self.registered += 1;
        Ok(id)
    }

    pub fn elapsed(&mut self, id: TimerId) -> bool {
        let now_ms = self.now_ms;
        let timer = &mut self.timers[id.0];
        if timer.fired || now_ms < timer.deadline_ms {
            return false;
        }
        timer.fired = true;
        true
    }

    pub fn reset(&mut self, id: TimerId) {
        let now_ms = self.now_ms;
        let timer = &mut self.timers[id.0];
        timer.deadline_ms = now_ms.saturating_add(timer.interval_ms);
        timer.fired = false;
    }

    pub fn deadline_ms(&self, id: TimerId) -> u64 {
        self.timers[id.0].deadline_ms
    }

    pub fn interval_ms(&self, id: TimerId) -> u64 {
        self.timers[id.0].interval_ms
    }
}
