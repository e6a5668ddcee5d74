//! Kill validation and per-saboteur cooldown bookkeeping.

use std::collections::HashMap;

use crate::{
    error::GameError,
    state::{
        game::{GameSession, PlayerStatus},
        timers::TimerToken,
    },
};

#[derive(Debug, Clone, Copy)]
struct Cooldown {
    remaining: u32,
    token: TimerToken,
}

/// Outcome of a cooldown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownTick {
    /// The tick does not belong to the running cooldown.
    Stale,
    /// Seconds still to wait.
    Running(u32),
    /// The cooldown elapsed and was removed.
    Cleared,
}

/// Remaining elimination cooldown per saboteur.
#[derive(Debug, Default)]
pub struct KillCooldowns {
    entries: HashMap<String, Cooldown>,
}

impl KillCooldowns {
    /// Seconds `player_id` still has to wait, zero when free.
    pub fn remaining(&self, player_id: &str) -> u32 {
        self.entries
            .get(player_id)
            .map_or(0, |cooldown| cooldown.remaining)
    }

    /// Start (or restart) a cooldown driven by the timer identified by `token`.
    pub fn start(&mut self, player_id: &str, seconds: u32, token: TimerToken) {
        if seconds == 0 {
            self.entries.remove(player_id);
            return;
        }
        self.entries.insert(
            player_id.to_string(),
            Cooldown {
                remaining: seconds,
                token,
            },
        );
    }

    /// Count one second down.
    pub fn tick(&mut self, player_id: &str, token: TimerToken) -> CooldownTick {
        let Some(cooldown) = self.entries.get_mut(player_id) else {
            return CooldownTick::Stale;
        };
        if cooldown.token != token {
            return CooldownTick::Stale;
        }

        cooldown.remaining = cooldown.remaining.saturating_sub(1);
        if cooldown.remaining == 0 {
            self.entries.remove(player_id);
            CooldownTick::Cleared
        } else {
            CooldownTick::Running(cooldown.remaining)
        }
    }

    /// Drop every cooldown.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Successful elimination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elimination {
    /// Saboteur who performed the kill.
    pub killer_id: String,
    /// Player who died.
    pub victim_id: String,
    /// Killer's kills this round, this one included.
    pub kill_count: u32,
}

/// Validate and perform a kill.
///
/// Checks run in a fixed order and nothing is mutated unless all of them pass: both players
/// registered, killer is a living saboteur, victim is not a saboteur, victim is alive, killer is
/// off cooldown.
pub fn attempt_kill(
    session: &mut GameSession,
    killer_id: &str,
    victim_id: &str,
    cooldown_secs: u32,
    token: TimerToken,
) -> Result<Elimination, GameError> {
    let killer = session.player(killer_id)?;
    let victim = session.player(victim_id)?;

    if !killer.is_saboteur() {
        return Err(GameError::InvalidCommand(
            "only saboteurs can eliminate".into(),
        ));
    }
    if !killer.is_alive() {
        return Err(GameError::KillerNotAlive);
    }
    if victim.is_saboteur() {
        return Err(GameError::FriendlyFire);
    }
    if !victim.is_alive() {
        return Err(GameError::VictimNotAlive(victim_id.to_string()));
    }
    let remaining = session.cooldowns.remaining(killer_id);
    if remaining > 0 {
        return Err(GameError::OnCooldown { remaining });
    }

    session.player_mut(victim_id)?.status = PlayerStatus::Dead;
    let killer = session.player_mut(killer_id)?;
    killer.kill_count += 1;
    let kill_count = killer.kill_count;
    session.cooldowns.start(killer_id, cooldown_secs, token);

    Ok(Elimination {
        killer_id: killer_id.to_string(),
        victim_id: victim_id.to_string(),
        kill_count,
    })
}
