//! Action planner.
//!
//! Hard interrupt order per frame:
//!
//! 1. dodge an attack whose hitbox is out nearby
//! 2. ultimate: close in and fire when safe (`UltimateSeek` only)
//! 3. finish a queued double-tap dash
//! 4. dance on the beat when the zone reward beats the attack on offer
//! 5. mode policy (attack choice + movement)
//!
//! Every horizontal move goes through [`safety::check_move`] first.

use rand::Rng;
use tracing::{debug, info};

use super::safety::{self, MoveCheck};
use super::{AttackKind, AttackPhase, CombatSnapshot, NpcActivity, NpcState, PendingDash, StrategyMode};
use crate::config::NpcTuning;
use crate::input::Button;

// Value of the attack on offer, weighed against the dance preference.
const ATTACK_VALUE_LIGHT: f64 = 0.7;
const ATTACK_VALUE_HEAVY: f64 = 0.6;
const ATTACK_VALUE_NONE: f64 = 0.2;

// Chance per eligible frame to poke with a heavy while holding range.
const HEAVY_POKE_CHANCE: f64 = 0.35;

/// Output of one planning step, before button edges are derived.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub axis_x: f64,
    pub jump: bool,
    pub buttons: Vec<Button>,
    pub activity: NpcActivity,
}

impl Plan {
    fn idle() -> Self {
        Self {
            axis_x: 0.0,
            jump: false,
            buttons: Vec::new(),
            activity: NpcActivity::Idle,
        }
    }

    fn moving((axis_x, jump): (f64, bool), activity: NpcActivity) -> Self {
        Self {
            axis_x,
            jump,
            buttons: Vec::new(),
            activity,
        }
    }

    fn press(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }
}

pub fn plan<R: Rng + ?Sized>(
    state: &mut NpcState,
    snap: &CombatSnapshot<'_>,
    tuning: &NpcTuning,
    rng: &mut R,
) -> Plan {
    if let Some(p) = dodge_interrupt(state, snap, tuning) {
        state.pending_dash = None;
        return p;
    }
    if state.mode == StrategyMode::UltimateSeek {
        state.pending_dash = None;
        return ultimate_seek(state, snap, tuning);
    }
    if let Some(p) = continue_dash(state, snap, tuning) {
        return p;
    }
    if let Some(p) = dance_interrupt(state, snap, tuning) {
        return p;
    }
    match state.mode {
        StrategyMode::BeatSteal => beat_steal(state, snap, tuning, rng),
        StrategyMode::CombatDefense => defend(state, snap, tuning, rng),
        StrategyMode::TacticalDanceCombat => tactical(state, snap, tuning, rng),
        StrategyMode::DanceFocus => dance_focus(state, snap, tuning),
        StrategyMode::ZoneSeeker | StrategyMode::UltimateSeek => seek_zone(state, snap, tuning, rng),
    }
}

// --- Interrupts -------------------------------------------------------------

fn dodge_interrupt(state: &mut NpcState, snap: &CombatSnapshot<'_>, tuning: &NpcTuning) -> Option<Plan> {
    let attack = snap.opponent.attack?;
    if !attack.phase.is_dangerous() || snap.distance() > tuning.dodge_trigger_px {
        return None;
    }
    if snap.npc.dodging || state.dodge_cooldown > 0.0 {
        return None;
    }
    state.dodge_cooldown = tuning.dodge_cooldown_secs;
    let away = if snap.npc.x >= snap.opponent.x { 1.0 } else { -1.0 };
    // Dodge in place rather than into a pit.
    let axis_x = match safety::check_move(snap.stage, &snap.npc, away, tuning, state.crossing_dir) {
        MoveCheck::Clear => away,
        MoveCheck::JumpGap | MoveCheck::Halt => 0.0,
    };
    debug!(kind = ?attack.kind, phase = ?attack.phase, axis_x, "dodge");
    Some(Plan::moving((axis_x, false), NpcActivity::Dodging).press(Button::Dodge))
}

fn ultimate_seek(state: &mut NpcState, snap: &CombatSnapshot<'_>, tuning: &NpcTuning) -> Plan {
    if snap.distance() > tuning.ultimate_range_px {
        let step = steer(state, snap, tuning, snap.opponent.x);
        return Plan::moving(step, activity_for(step, NpcActivity::Chasing));
    }
    let npc = &snap.npc;
    let safe = npc.on_ground
        && npc.attack.is_none()
        && safety::ground_under(snap.stage, npc.x, npc.y);
    if safe && state.cooldowns.ready(AttackKind::Ultimate) {
        state.cooldowns.fire(AttackKind::Ultimate, &tuning.cooldowns);
        info!(distance = snap.distance(), "ultimate fired");
        return Plan::moving((0.0, false), NpcActivity::HoldingRange).press(Button::Ultimate);
    }
    Plan::moving((0.0, false), NpcActivity::HoldingRange)
}

/// Second half of a double-tap dash: release for a frame, then press again
/// once our own attack state machine is back at its start phase.
fn continue_dash(state: &mut NpcState, snap: &CombatSnapshot<'_>, tuning: &NpcTuning) -> Option<Plan> {
    let pending = state.pending_dash?;
    if snap.now_ms - pending.queued_ms > tuning.dash_tap_window_ms {
        debug!("dash double-tap window expired");
        state.pending_dash = None;
        return None;
    }
    let axis_x = match safety::check_move(snap.stage, &snap.npc, pending.dir, tuning, state.crossing_dir) {
        MoveCheck::Clear => pending.dir,
        MoveCheck::JumpGap | MoveCheck::Halt => 0.0,
    };
    if !pending.released {
        state.pending_dash = Some(PendingDash {
            released: true,
            ..pending
        });
        return Some(Plan::moving((axis_x, false), NpcActivity::Chasing));
    }
    let at_start = snap
        .npc
        .attack
        .is_none_or(|a| a.phase == AttackPhase::Startup);
    if !at_start {
        return Some(Plan::moving((axis_x, false), NpcActivity::Chasing));
    }
    state.pending_dash = None;
    if !safety::dash_is_safe(snap.stage, &snap.npc, pending.dir, tuning) {
        debug!("dash abandoned: edge ahead");
        return None;
    }
    state.cooldowns.fire(AttackKind::Dash, &tuning.cooldowns);
    Some(Plan::moving((axis_x, false), NpcActivity::Chasing).press(Button::Dash))
}

fn dance_interrupt(state: &mut NpcState, snap: &CombatSnapshot<'_>, tuning: &NpcTuning) -> Option<Plan> {
    let spot = snap.active_spot()?;
    if !spot.contains(snap.npc.x, snap.npc.y)
        || !snap.in_beat_window
        || !state.cooldowns.ready(AttackKind::Dance)
    {
        return None;
    }
    // Farther from the centre the zone bonus is worth more than a risky hit.
    let edge = (spot.distance(snap.npc.x, snap.npc.y) / spot.radius.max(1.0)).clamp(0.0, 1.0);
    let preference = tuning.dance_base_preference + tuning.dance_edge_bonus * edge;
    if preference < attack_value(state, snap, tuning) {
        return None;
    }
    state.cooldowns.fire(AttackKind::Dance, &tuning.cooldowns);
    Some(Plan::moving((0.0, false), NpcActivity::Dancing).press(Button::Dance))
}

fn attack_value(state: &NpcState, snap: &CombatSnapshot<'_>, tuning: &NpcTuning) -> f64 {
    let d = snap.distance();
    if d <= tuning.light_range_px && state.cooldowns.ready(AttackKind::Light) {
        ATTACK_VALUE_LIGHT
    } else if d <= tuning.heavy_range_px && state.cooldowns.ready(AttackKind::Heavy) {
        ATTACK_VALUE_HEAVY
    } else {
        ATTACK_VALUE_NONE
    }
}

// --- Mode policies ----------------------------------------------------------

fn beat_steal<R: Rng + ?Sized>(
    state: &mut NpcState,
    snap: &CombatSnapshot<'_>,
    tuning: &NpcTuning,
    rng: &mut R,
) -> Plan {
    if snap.distance() <= tuning.grab_range_px && can_fire(state, snap, AttackKind::Grab) {
        state.cooldowns.fire(AttackKind::Grab, &tuning.cooldowns);
        debug!(charges = snap.opponent.beat_charges, "grab for beat charges");
        return Plan::moving((0.0, false), NpcActivity::Chasing).press(Button::Grab);
    }
    if let Some(p) = try_start_dash(state, snap, tuning, rng) {
        return p;
    }
    let step = steer(state, snap, tuning, snap.opponent.x);
    Plan::moving(step, activity_for(step, NpcActivity::Chasing))
}

fn defend<R: Rng + ?Sized>(
    state: &mut NpcState,
    snap: &CombatSnapshot<'_>,
    tuning: &NpcTuning,
    rng: &mut R,
) -> Plan {
    let dist = snap.distance();
    let hold = state.profile.preferred_hold_range(tuning);
    let toward = dir_to(snap.npc.x, snap.opponent.x);

    let mut plan = if dist < hold - tuning.arrive_px {
        let step = move_along(state, snap, tuning, -toward);
        Plan::moving(step, activity_for(step, NpcActivity::Retreating))
    } else if dist > hold + tuning.arrive_px {
        let step = move_along(state, snap, tuning, toward);
        Plan::moving(step, activity_for(step, NpcActivity::Chasing))
    } else {
        Plan::moving((0.0, false), NpcActivity::HoldingRange)
    };

    if dist <= tuning.light_range_px && can_fire(state, snap, AttackKind::Light) {
        state.cooldowns.fire(AttackKind::Light, &tuning.cooldowns);
        plan = plan.press(Button::Light);
    } else if dist <= tuning.heavy_range_px
        && can_fire(state, snap, AttackKind::Heavy)
        && rng.gen_bool(HEAVY_POKE_CHANCE)
    {
        state.cooldowns.fire(AttackKind::Heavy, &tuning.cooldowns);
        plan = plan.press(Button::Heavy);
    }
    plan
}

fn tactical<R: Rng + ?Sized>(
    state: &mut NpcState,
    snap: &CombatSnapshot<'_>,
    tuning: &NpcTuning,
    rng: &mut R,
) -> Plan {
    let dist = snap.distance();
    let choice = weighted_pick(&tuning.tactical_weights, rng);
    let kind = match choice {
        Some(0) => Some(AttackKind::Light),
        Some(1) => Some(AttackKind::Heavy),
        Some(_) => Some(AttackKind::Dance),
        None => None,
    };
    if let Some(kind) = kind {
        let in_range = match kind {
            AttackKind::Light => dist <= tuning.light_range_px,
            AttackKind::Heavy => dist <= tuning.heavy_range_px,
            _ => true,
        };
        if in_range && can_fire(state, snap, kind) {
            state.cooldowns.fire(kind, &tuning.cooldowns);
            let activity = if kind == AttackKind::Dance {
                NpcActivity::Dancing
            } else {
                NpcActivity::HoldingRange
            };
            return Plan::moving((0.0, false), activity).press(kind.button());
        }
    }
    if dist > tuning.light_range_px {
        // Close in, but never past the zone edge.
        let target = match snap.active_spot() {
            Some(spot) => snap.opponent.x.clamp(spot.x - spot.radius, spot.x + spot.radius),
            None => snap.opponent.x,
        };
        let step = steer(state, snap, tuning, target);
        return Plan::moving(step, activity_for(step, NpcActivity::Chasing));
    }
    Plan::moving((0.0, false), NpcActivity::HoldingRange)
}

fn dance_focus(state: &mut NpcState, snap: &CombatSnapshot<'_>, tuning: &NpcTuning) -> Plan {
    if snap.in_beat_window && can_fire(state, snap, AttackKind::Dance) {
        state.cooldowns.fire(AttackKind::Dance, &tuning.cooldowns);
        return Plan::moving((0.0, false), NpcActivity::Dancing).press(Button::Dance);
    }
    match snap.active_spot() {
        Some(spot) => {
            let step = steer(state, snap, tuning, spot.x);
            Plan::moving(step, NpcActivity::Dancing)
        }
        None => Plan::idle(),
    }
}

fn seek_zone<R: Rng + ?Sized>(
    state: &mut NpcState,
    snap: &CombatSnapshot<'_>,
    tuning: &NpcTuning,
    rng: &mut R,
) -> Plan {
    if let Some(spot) = snap.active_spot() {
        let step = steer(state, snap, tuning, spot.x);
        return Plan::moving(step, activity_for(step, NpcActivity::Chasing));
    }
    // No zone up: go after the opponent.
    if let Some(p) = try_start_dash(state, snap, tuning, rng) {
        return p;
    }
    if snap.distance() <= tuning.light_range_px && can_fire(state, snap, AttackKind::Light) {
        state.cooldowns.fire(AttackKind::Light, &tuning.cooldowns);
        return Plan::moving((0.0, false), NpcActivity::Chasing).press(Button::Light);
    }
    let step = steer(state, snap, tuning, snap.opponent.x);
    Plan::moving(step, activity_for(step, NpcActivity::Chasing))
}

// --- Helpers ----------------------------------------------------------------

fn can_fire(state: &NpcState, snap: &CombatSnapshot<'_>, kind: AttackKind) -> bool {
    state.cooldowns.ready(kind) && snap.npc.attack.is_none()
}

/// First tap of a dash, if the opponent is at dash range and the whole dash
/// stays over ground.
fn try_start_dash<R: Rng + ?Sized>(
    state: &mut NpcState,
    snap: &CombatSnapshot<'_>,
    tuning: &NpcTuning,
    rng: &mut R,
) -> Option<Plan> {
    if state.pending_dash.is_some() || !can_fire(state, snap, AttackKind::Dash) {
        return None;
    }
    let dx = (snap.opponent.x - snap.npc.x).abs();
    if dx < tuning.dash_distance_px * 0.5 || dx > tuning.dash_distance_px * 1.5 {
        return None;
    }
    let dir = dir_to(snap.npc.x, snap.opponent.x);
    if !safety::dash_is_safe(snap.stage, &snap.npc, dir, tuning) {
        return None;
    }
    if !rng.gen_bool(tuning.dash_chance.clamp(0.0, 1.0)) {
        return None;
    }
    state.pending_dash = Some(PendingDash {
        queued_ms: snap.now_ms,
        dir,
        released: false,
    });
    Some(Plan::moving((dir, false), NpcActivity::Chasing).press(Button::Dash))
}

fn steer(state: &mut NpcState, snap: &CombatSnapshot<'_>, tuning: &NpcTuning, target_x: f64) -> (f64, bool) {
    if (target_x - snap.npc.x).abs() <= tuning.arrive_px {
        return (0.0, false);
    }
    move_along(state, snap, tuning, dir_to(snap.npc.x, target_x))
}

fn move_along(state: &mut NpcState, snap: &CombatSnapshot<'_>, tuning: &NpcTuning, dir: f64) -> (f64, bool) {
    match safety::check_move(snap.stage, &snap.npc, dir, tuning, state.crossing_dir) {
        MoveCheck::Clear => (dir, false),
        MoveCheck::JumpGap => {
            state.crossing_dir = Some(dir);
            (dir, true)
        }
        MoveCheck::Halt => (0.0, false),
    }
}

fn activity_for(step: (f64, bool), moving: NpcActivity) -> NpcActivity {
    if step.0 != 0.0 { moving } else { NpcActivity::Idle }
}

fn dir_to(from: f64, to: f64) -> f64 {
    if to > from {
        1.0
    } else if to < from {
        -1.0
    } else {
        0.0
    }
}

/// Index drawn in proportion to `weights`; `None` if they sum to zero.
fn weighted_pick<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let mut roll = rng.gen_range(0.0..total);
    for (i, w) in weights.iter().enumerate() {
        let w = w.max(0.0);
        if roll < w {
            return Some(i);
        }
        roll -= w;
    }
    Some(weights.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npc::{AttackState, DanceSpot, FighterView, NpcController};
    use crate::stage::{Cell, Heatmap};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn flat() -> Heatmap {
        Heatmap::new(60, 34, 16.0).with_rect(0, 28, 60, 34, Cell::Ground)
    }

    fn snap(stage: &Heatmap, now_ms: f64, npc_x: f64, opp_x: f64) -> CombatSnapshot<'_> {
        CombatSnapshot {
            now_ms,
            dt: 1.0 / 60.0,
            npc: FighterView::grounded(npc_x, 448.0),
            opponent: FighterView::grounded(opp_x, 448.0),
            dance_spot: None,
            in_beat_window: false,
            stage,
        }
    }

    #[test]
    fn weighted_pick_respects_zero_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert_eq!(weighted_pick(&[0.0, 1.0, 0.0], &mut rng), Some(1));
        }
        assert_eq!(weighted_pick(&[0.0, 0.0], &mut rng), None);
    }

    #[test]
    fn dash_is_a_double_tap() {
        let stage = flat();
        let tuning = NpcTuning {
            dash_chance: 1.0,
            ..NpcTuning::default()
        };
        let mut npc = NpcController::with_seed(tuning, 3);
        let first = npc.update(&snap(&stage, 0.0, 200.0, 400.0));
        assert!(first.pressed(Button::Dash));
        assert!(npc.state().dash_pending());
        let gap = npc.update(&snap(&stage, 16.0, 200.0, 400.0));
        assert!(gap.released(Button::Dash));
        let second = npc.update(&snap(&stage, 33.0, 204.0, 400.0));
        assert!(second.pressed(Button::Dash));
        assert!(!npc.state().dash_pending());
        assert!(!npc.state().cooldowns().ready(AttackKind::Dash));
    }

    #[test]
    fn dash_window_expires_while_mid_attack() {
        let stage = flat();
        let tuning = NpcTuning {
            dash_chance: 1.0,
            ..NpcTuning::default()
        };
        let mut npc = NpcController::with_seed(tuning, 3);
        npc.update(&snap(&stage, 0.0, 200.0, 400.0));
        npc.update(&snap(&stage, 16.0, 200.0, 400.0));
        let mut busy = snap(&stage, 33.0, 200.0, 400.0);
        busy.npc.attack = Some(AttackState {
            kind: AttackKind::Light,
            phase: AttackPhase::Active,
            started_ms: 20.0,
        });
        assert!(!npc.update(&busy).pressed(Button::Dash));
        busy.now_ms = 250.0;
        busy.npc.attack = None;
        busy.opponent.x = 700.0; // out of dash range, so no fresh dash is queued
        npc.update(&busy);
        assert!(!npc.state().dash_pending());
    }

    #[test]
    fn dance_preference_grows_toward_zone_edge() {
        let stage = flat();
        let spot = DanceSpot {
            x: 480.0,
            y: 448.0,
            radius: 80.0,
            active: true,
        };
        let mut centre = snap(&stage, 0.0, 480.0, 540.0);
        centre.dance_spot = Some(spot);
        centre.in_beat_window = true;
        let mut npc = NpcController::with_seed(NpcTuning::default(), 11);
        let out = npc.update(&centre);
        assert!(!out.pressed(Button::Dance), "a free light hit beats dancing at the centre");
        assert!(out.pressed(Button::Light));

        let mut edge = snap(&stage, 0.0, 410.0, 470.0);
        edge.dance_spot = Some(spot);
        edge.in_beat_window = true;
        let mut npc = NpcController::with_seed(NpcTuning::default(), 11);
        assert!(npc.update(&edge).pressed(Button::Dance));
        assert_eq!(npc.activity(), NpcActivity::Dancing);
    }

    #[test]
    fn defence_retreats_to_hold_range() {
        let stage = flat();
        let mut npc = NpcController::with_seed(NpcTuning::default(), 5);
        let mut s = snap(&stage, 0.0, 400.0, 460.0);
        // Mid-recovery: no attack can be started this frame.
        s.npc.attack = Some(AttackState {
            kind: AttackKind::Light,
            phase: AttackPhase::Recovery,
            started_ms: 0.0,
        });
        let out = npc.update(&s);
        assert_eq!(npc.mode(), StrategyMode::CombatDefense);
        assert_eq!(out.axis_x, -1.0);
        assert_eq!(npc.activity(), NpcActivity::Retreating);
    }
}
