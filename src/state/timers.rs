//! Cancellable repeating timers driving the match clock, voting clock and kill cooldowns.

use std::{future::Future, ops::ControlFlow, time::Duration};

use dashmap::DashMap;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::debug;

/// Identifies one scheduled timer run.
///
/// The coordinator hands a fresh token out every time it (re)starts a timer and only honours
/// ticks carrying the token it currently expects, so a tick racing a cancellation is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// Monotonic source of [`TimerToken`]s.
#[derive(Debug, Default)]
pub struct TokenIssuer {
    next: u64,
}

impl TokenIssuer {
    /// Hand out a token never issued before.
    pub fn issue(&mut self) -> TimerToken {
        self.next += 1;
        TimerToken(self.next)
    }
}

/// Timer kinds; at most one task runs per slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    /// One-second match countdown.
    MatchClock,
    /// One-second voting countdown.
    VotingClock,
    /// Elimination cooldown of a single saboteur.
    Cooldown(String),
}

/// Registry of running timer tasks.
pub struct TimerService {
    period: Duration,
    handles: DashMap<TimerSlot, JoinHandle<()>>,
}

impl TimerService {
    /// Create a service whose repeating timers fire every `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handles: DashMap::new(),
        }
    }

    /// Run `tick` every period until it breaks, replacing whatever ran in `slot` before.
    pub fn schedule_repeating<F, Fut>(&self, slot: TimerSlot, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let period = self.period;
        let label = slot.clone();
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tick().await.is_break() {
                    debug!(slot = ?label, "timer finished");
                    break;
                }
            }
        });

        if let Some(previous) = self.handles.insert(slot, handle) {
            previous.abort();
        }
    }

    /// Abort the timer running in `slot`, if any.
    pub fn cancel(&self, slot: &TimerSlot) {
        if let Some((_, handle)) = self.handles.remove(slot) {
            handle.abort();
        }
    }

    /// Abort every running timer.
    pub fn cancel_all(&self) {
        self.handles.retain(|_, handle| {
            handle.abort();
            false
        });
    }
}
