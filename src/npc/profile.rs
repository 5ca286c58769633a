//! Lightweight model of the human opponent, rebuilt every match.

use super::{ATTACK_KINDS, AttackKind, FighterView};
use crate::config::NpcTuning;

// Counts are halved past this total so the profile tracks recent habits.
const DECAY_TOTAL: u32 = 32;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OpponentProfile {
    attacks: [u32; ATTACK_KINDS],
    dodges: u32,
    last_attack_start: Option<f64>,
    was_dodging: bool,
}

impl OpponentProfile {
    /// Record attack starts and dodge starts seen this frame.
    pub fn observe(&mut self, opponent: &FighterView) {
        if let Some(attack) = opponent.attack {
            if self.last_attack_start != Some(attack.started_ms) {
                self.last_attack_start = Some(attack.started_ms);
                self.attacks[attack.kind.index()] += 1;
                self.decay();
            }
        }
        if opponent.dodging && !self.was_dodging {
            self.dodges += 1;
        }
        self.was_dodging = opponent.dodging;
    }

    fn decay(&mut self) {
        if self.total_attacks() > DECAY_TOTAL {
            for c in self.attacks.iter_mut() {
                *c /= 2;
            }
            self.dodges /= 2;
        }
    }

    pub fn attack_count(&self, kind: AttackKind) -> u32 {
        self.attacks[kind.index()]
    }

    pub fn total_attacks(&self) -> u32 {
        self.attacks.iter().sum()
    }

    pub fn dodges(&self) -> u32 {
        self.dodges
    }

    pub fn heavy_ratio(&self) -> f64 {
        match self.total_attacks() {
            0 => 0.0,
            n => self.attack_count(AttackKind::Heavy) as f64 / n as f64,
        }
    }

    /// Range to hold in defence. Heavy-leaning opponents push it out past
    /// their heavy reach.
    pub fn preferred_hold_range(&self, tuning: &NpcTuning) -> f64 {
        let widest = tuning.heavy_range_px + tuning.arrive_px;
        let extra = (widest - tuning.hold_range_px).max(0.0);
        tuning.hold_range_px + extra * self.heavy_ratio()
    }
}
