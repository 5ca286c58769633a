//! Edge and gap probes.
//!
//! Horizontal movement is never committed without sampling the ground ahead.
//! Falling off-stage is worse than standing still, so every probe that cannot
//! prove safety answers "no".

use super::FighterView;
use crate::config::NpcTuning;
use crate::stage::StageGeometry;

/// How far below the feet a ground sample is taken.
pub const FOOT_PROBE_PX: f64 = 8.0;

/// Verdict for a one-frame horizontal move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveCheck {
    Clear,
    /// Gap ahead with a landing in reach: move and jump.
    JumpGap,
    /// Gap ahead without a safe landing (or no jump left): stay put.
    Halt,
}

pub fn ground_under(stage: &dyn StageGeometry, x: f64, y: f64) -> bool {
    x >= 0.0 && x < stage.width() && stage.has_ground(x, y + FOOT_PROBE_PX)
}

/// Offset (px, positive) of the first missing ground sample within
/// `probe_distance_px` ahead, or `None` if every probe hits ground.
pub fn probe_ahead(stage: &dyn StageGeometry, x: f64, y: f64, dir: f64, tuning: &NpcTuning) -> Option<f64> {
    let step = tuning.probe_step_px.max(1.0);
    let mut off = step;
    while off <= tuning.probe_distance_px + f64::EPSILON {
        if !ground_under(stage, x + dir * off, y) {
            return Some(off);
        }
        off += step;
    }
    None
}

/// Nearest ground past a gap starting at `gap_offset`, searched out to
/// `safe_landing_px` from `x`. Returns the landing offset.
pub fn find_landing(
    stage: &dyn StageGeometry,
    x: f64,
    y: f64,
    dir: f64,
    gap_offset: f64,
    tuning: &NpcTuning,
) -> Option<f64> {
    let step = tuning.probe_step_px.max(1.0);
    let mut off = gap_offset;
    while off <= tuning.safe_landing_px + f64::EPSILON {
        let lx = x + dir * off;
        // A landing needs room for both feet: two consecutive samples.
        if ground_under(stage, lx, y) && ground_under(stage, lx + dir * step, y) {
            return Some(off);
        }
        off += step;
    }
    None
}

/// Farthest distance (px) along `dir` that stays over continuous ground,
/// capped at `limit`.
pub fn max_safe_dash_distance(
    stage: &dyn StageGeometry,
    x: f64,
    y: f64,
    dir: f64,
    limit: f64,
    tuning: &NpcTuning,
) -> f64 {
    if !ground_under(stage, x, y) {
        return 0.0;
    }
    let step = tuning.probe_step_px.max(1.0);
    let mut safe = 0.0;
    let mut off = step;
    while off <= limit + f64::EPSILON {
        if !ground_under(stage, x + dir * off, y) {
            break;
        }
        safe = off;
        off += step;
    }
    safe
}

/// A dash is safe only from the ground and only if the full dash distance
/// stays over ground.
pub fn dash_is_safe(stage: &dyn StageGeometry, npc: &FighterView, dir: f64, tuning: &NpcTuning) -> bool {
    npc.on_ground
        && dir != 0.0
        && max_safe_dash_distance(stage, npc.x, npc.y, dir, tuning.dash_distance_px, tuning)
            >= tuning.dash_distance_px
}

/// Validate one frame of horizontal movement along `dir` (-1 or 1).
///
/// `crossing` is the direction of a gap jump already in flight; an airborne
/// fighter keeps committing to it instead of stalling over the pit.
pub fn check_move(
    stage: &dyn StageGeometry,
    npc: &FighterView,
    dir: f64,
    tuning: &NpcTuning,
    crossing: Option<f64>,
) -> MoveCheck {
    if dir == 0.0 {
        return MoveCheck::Clear;
    }
    if !npc.on_ground {
        if crossing == Some(dir) {
            return MoveCheck::Clear;
        }
        // Drifting in the air is fine only above ground we can land on.
        let ahead = npc.x + dir * tuning.probe_step_px.max(1.0);
        return if (0.0..stage.width()).contains(&ahead) && column_has_ground(stage, ahead, npc.y) {
            MoveCheck::Clear
        } else {
            MoveCheck::Halt
        };
    }
    let Some(gap) = probe_ahead(stage, npc.x, npc.y, dir, tuning) else {
        return MoveCheck::Clear;
    };
    if npc.jumps_left == 0 {
        return MoveCheck::Halt;
    }
    match find_landing(stage, npc.x, npc.y, dir, gap, tuning) {
        Some(_) => MoveCheck::JumpGap,
        None => MoveCheck::Halt,
    }
}

fn column_has_ground(stage: &dyn StageGeometry, x: f64, y: f64) -> bool {
    let step = 8.0;
    let mut probe = y.max(0.0);
    while probe < stage.height() {
        if stage.has_ground(x, probe) {
            return true;
        }
        probe += step;
    }
    false
}
