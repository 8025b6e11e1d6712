//! Shared scheduler state: the roster and per-persona cooldowns
//!
//! Only the cycle runner writes cooldowns and only the admin commands write the
//! roster. The mutexes exist because those writers live on different tasks;
//! neither lock is ever held across an await point.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::persona::Persona;
use crate::roster::Roster;

/// Last successful send per persona
#[derive(Debug, Clone, Default)]
pub struct CooldownMap {
    last_sent: HashMap<String, Instant>,
}

impl CooldownMap {
    /// Whether `name` may speak at `now` given the minimum spacing
    pub fn is_ready(&self, name: &str, cooldown: Duration, now: Instant) -> bool {
        match self.last_sent.get(name) {
            Some(last) => now.saturating_duration_since(*last) >= cooldown,
            None => true,
        }
    }

    pub fn record(&mut self, name: &str, at: Instant) {
        self.last_sent.insert(name.to_string(), at);
    }

    pub fn last_sent(&self, name: &str) -> Option<Instant> {
        self.last_sent.get(name).copied()
    }

    pub fn forget(&mut self, name: &str) {
        self.last_sent.remove(name);
    }
}

#[derive(Debug, Default)]
pub struct SchedulerState {
    roster: Mutex<Roster>,
    cooldowns: Mutex<CooldownMap>,
}

impl SchedulerState {
    pub fn new(roster: Roster) -> Self {
        Self {
            roster: Mutex::new(roster),
            cooldowns: Mutex::new(CooldownMap::default()),
        }
    }

    /// Copy of the active personas, taken once per cycle
    pub fn snapshot(&self) -> Vec<Persona> {
        self.roster.lock().personas().to_vec()
    }

    pub fn roster_names(&self) -> Vec<String> {
        self.roster.lock().names()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.roster.lock().contains(name)
    }

    /// Add a persona to the roster; returns the new name list on success
    pub fn activate(&self, persona: Persona) -> Option<Vec<String>> {
        let mut roster = self.roster.lock();
        roster.add(persona).then(|| roster.names())
    }

    /// Remove a persona from the roster; returns the new name list on success
    pub fn deactivate(&self, name: &str) -> Option<Vec<String>> {
        let mut roster = self.roster.lock();
        if !roster.remove(name) {
            return None;
        }
        self.cooldowns.lock().forget(name);
        Some(roster.names())
    }

    pub fn is_ready(&self, name: &str, cooldown: Duration, now: Instant) -> bool {
        self.cooldowns.lock().is_ready(name, cooldown, now)
    }

    pub fn record_send(&self, name: &str, at: Instant) {
        self.cooldowns.lock().record(name, at);
    }

    pub fn last_sent(&self, name: &str) -> Option<Instant> {
        self.cooldowns.lock().last_sent(name)
    }
}
