//! Strategy selector: the single authoritative transition function for the
//! opponent's mode. Re-evaluated from scratch every frame, no hysteresis.

use super::CombatSnapshot;
use crate::config::NpcTuning;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StrategyMode {
    UltimateSeek,
    BeatSteal,
    CombatDefense,
    TacticalDanceCombat,
    DanceFocus,
    ZoneSeeker,
}

/// Classify the frame. First matching rule wins:
///
/// 1. ultimate meter full → `UltimateSeek`
/// 2. opponent hoards beat charges → `BeatSteal`
/// 3. threatening attack nearby, or opponent inside threat distance → `CombatDefense`
/// 4. both fighters in the active dance zone → `TacticalDanceCombat`
/// 5. NPC in zone → `DanceFocus`, otherwise `ZoneSeeker`
pub fn select_mode(snap: &CombatSnapshot<'_>, tuning: &NpcTuning) -> StrategyMode {
    if snap.npc.ultimate_meter >= 1.0 {
        return StrategyMode::UltimateSeek;
    }
    if snap.opponent.beat_charges > tuning.beat_steal_threshold {
        return StrategyMode::BeatSteal;
    }
    let distance = snap.distance();
    let threat = snap
        .opponent
        .attack
        .is_some_and(|a| a.phase.is_threatening() && distance <= tuning.dodge_trigger_px);
    if threat || distance < tuning.proximity_threat_px {
        return StrategyMode::CombatDefense;
    }
    let npc_in = snap.npc_in_zone();
    if npc_in && snap.opponent_in_zone() {
        return StrategyMode::TacticalDanceCombat;
    }
    if npc_in {
        StrategyMode::DanceFocus
    } else {
        StrategyMode::ZoneSeeker
    }
}
