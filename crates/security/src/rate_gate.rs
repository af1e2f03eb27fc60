//! Per-actor rate gate — cooldown with escalating lockout.
//!
//! Every inbound event passes through [`RateGate::check`] before the
//! conversation engine sees it. The gate knows nothing about sessions, so it
//! is safe to call for actors that have never started a workflow.
//!
//! Rules, for an actor whose last admitted event was `elapsed` ago:
//! - `elapsed < cooldown` → denied, `warning_count += 1`; soft wait until the
//!   count reaches `lockout_threshold`, hard lockout from then on. A denial
//!   never advances `last_action_at`.
//! - `elapsed >= cooldown` → admitted, `last_action_at = now`; if the actor
//!   was idle for more than `2 * cooldown` the warning count resets to 0.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use intake_config::GateConfig;
use intake_core::actor::ActorId;
use tracing::{debug, warn};

/// Gate bookkeeping for one actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateState {
    /// `None` means the actor has never been admitted
    pub last_action_at: Option<Instant>,
    pub warning_count: u32,
}

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    /// Denied; the actor may retry after `remaining`
    SoftWait { remaining: Duration },
    /// Denied; the actor has ignored too many soft waits
    Lockout,
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Shared, per-actor cooldown filter.
///
/// State lives in a `DashMap`, so a check only locks the shard holding that
/// actor and concurrent actors do not serialize on one mutex.
#[derive(Debug)]
pub struct RateGate {
    cooldown: Duration,
    lockout_threshold: u32,
    states: DashMap<ActorId, RateState>,
}

impl RateGate {
    pub fn new(cooldown: Duration, lockout_threshold: u32) -> Self {
        Self {
            cooldown,
            lockout_threshold,
            states: DashMap::new(),
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.cooldown(), config.lockout_threshold)
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Decide whether an event from `actor_id` arriving at `now` may proceed.
    pub fn check(&self, actor_id: ActorId, now: Instant) -> GateDecision {
        let mut state = self.states.entry(actor_id).or_default();

        let elapsed = state
            .last_action_at
            .map(|last| now.saturating_duration_since(last));

        match elapsed {
            Some(elapsed) if elapsed < self.cooldown => {
                state.warning_count = state.warning_count.saturating_add(1);
                if state.warning_count >= self.lockout_threshold {
                    warn!(actor_id, warnings = state.warning_count, "Actor locked out by rate gate");
                    GateDecision::Lockout
                } else {
                    let remaining = self.cooldown - elapsed;
                    debug!(actor_id, warnings = state.warning_count, ?remaining, "Rate gate soft wait");
                    GateDecision::SoftWait { remaining }
                }
            }
            _ => {
                // `None` counts as infinitely idle
                if elapsed.is_none_or(|e| e > self.cooldown * 2) {
                    state.warning_count = 0;
                }
                state.last_action_at = Some(now);
                GateDecision::Allowed
            }
        }
    }

    /// Snapshot of an actor's gate state.
    pub fn state(&self, actor_id: ActorId) -> Option<RateState> {
        self.states.get(&actor_id).map(|s| *s)
    }

    /// Drop state for actors idle longer than `idle`. Returns how many.
    pub fn sweep(&self, now: Instant, idle: Duration) -> usize {
        let before = self.states.len();
        self.states.retain(|_, state| {
            state
                .last_action_at
                .is_some_and(|last| now.saturating_duration_since(last) <= idle)
        });
        before - self.states.len()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}
