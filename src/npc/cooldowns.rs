//! Per-attack cooldowns. Each kind decays independently every tick.

use super::{ATTACK_KINDS, AttackKind};
use crate::config::AttackCooldowns;

impl AttackCooldowns {
    /// Cooldown (seconds) applied after firing `kind`.
    pub fn duration(&self, kind: AttackKind) -> f64 {
        match kind {
            AttackKind::Light => self.light,
            AttackKind::Heavy => self.heavy,
            AttackKind::Grab => self.grab,
            AttackKind::Dash => self.dash,
            AttackKind::Dance => self.dance,
            AttackKind::Ultimate => self.ultimate,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cooldowns {
    remaining: [f64; ATTACK_KINDS], // seconds
}

impl Cooldowns {
    pub fn tick(&mut self, dt: f64) {
        for r in self.remaining.iter_mut() {
            *r = (*r - dt).max(0.0);
        }
    }

    pub fn ready(&self, kind: AttackKind) -> bool {
        self.remaining[kind.index()] <= 0.0
    }

    pub fn remaining(&self, kind: AttackKind) -> f64 {
        self.remaining[kind.index()]
    }

    pub fn fire(&mut self, kind: AttackKind, table: &AttackCooldowns) {
        self.remaining[kind.index()] = table.duration(kind).max(0.0);
    }
}
