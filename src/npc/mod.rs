//! Opponent AI.
//!
//! One [`NpcController`] per match. Every simulated frame the combat
//! collaborator hands it a [`CombatSnapshot`]; the strategy selector classifies
//! the situation into a [`StrategyMode`], the planner turns mode + snapshot into
//! movement and button intent, and the controller returns an [`InputIntent`]
//! shaped exactly like human-controller polling.
//!
//! ```text
//! snapshot → select_mode() → plan() → ButtonTracker → InputIntent
//! ```
//!
//! All randomness comes from the injected `R: Rng`, so seeded controllers
//! replay identically.

pub mod cooldowns;
pub mod planner;
pub mod profile;
pub mod safety;
pub mod strategy;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

pub use cooldowns::Cooldowns;
pub use profile::OpponentProfile;
pub use strategy::{StrategyMode, select_mode};

use crate::config::NpcTuning;
use crate::input::{Button, ButtonTracker, InputIntent};
use crate::stage::StageGeometry;

// --- Combat snapshot (consumed) ---------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttackKind {
    Light,
    Heavy,
    Grab,
    Dash,
    Dance,
    Ultimate,
}

pub const ATTACK_KINDS: usize = 6;

impl AttackKind {
    pub const ALL: [AttackKind; ATTACK_KINDS] = [
        AttackKind::Light,
        AttackKind::Heavy,
        AttackKind::Grab,
        AttackKind::Dash,
        AttackKind::Dance,
        AttackKind::Ultimate,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn button(self) -> Button {
        match self {
            AttackKind::Light => Button::Light,
            AttackKind::Heavy => Button::Heavy,
            AttackKind::Grab => Button::Grab,
            AttackKind::Dash => Button::Dash,
            AttackKind::Dance => Button::Dance,
            AttackKind::Ultimate => Button::Ultimate,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttackPhase {
    Startup,
    Active,
    Release,
    Recovery,
}

impl AttackPhase {
    /// Hitbox is out (or about to be): worth dodging.
    pub fn is_dangerous(self) -> bool {
        matches!(self, AttackPhase::Active | AttackPhase::Release)
    }

    /// Anything before recovery counts as an incoming threat.
    pub fn is_threatening(self) -> bool {
        !matches!(self, AttackPhase::Recovery)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttackState {
    pub kind: AttackKind,
    pub phase: AttackPhase,
    pub started_ms: f64,
}

/// Pose and resources of one fighter. `(x, y)` is the feet position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FighterView {
    pub x: f64,
    pub y: f64,
    pub on_ground: bool,
    pub jumps_left: u8,
    pub attack: Option<AttackState>,
    pub dodging: bool,
    pub beat_charges: u32,
    /// Ultimate resource, 0..=1.
    pub ultimate_meter: f64,
}

impl FighterView {
    pub fn grounded(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            on_ground: true,
            jumps_left: 2,
            attack: None,
            dodging: false,
            beat_charges: 0,
            ultimate_meter: 0.0,
        }
    }

    pub fn distance_to(&self, other: &FighterView) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DanceSpot {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub active: bool,
}

impl DanceSpot {
    pub fn distance(&self, x: f64, y: f64) -> f64 {
        (x - self.x).hypot(y - self.y)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.active && self.distance(x, y) <= self.radius
    }
}

/// Everything the AI reads for one frame.
#[derive(Clone, Copy)]
pub struct CombatSnapshot<'a> {
    pub now_ms: f64,
    /// Frame delta in seconds.
    pub dt: f64,
    pub npc: FighterView,
    pub opponent: FighterView,
    pub dance_spot: Option<DanceSpot>,
    /// Music time currently sits inside a judged beat window.
    pub in_beat_window: bool,
    pub stage: &'a dyn StageGeometry,
}

impl CombatSnapshot<'_> {
    pub fn distance(&self) -> f64 {
        self.npc.distance_to(&self.opponent)
    }

    pub fn active_spot(&self) -> Option<DanceSpot> {
        self.dance_spot.filter(|s| s.active)
    }

    pub fn npc_in_zone(&self) -> bool {
        self.active_spot().is_some_and(|s| s.contains(self.npc.x, self.npc.y))
    }

    pub fn opponent_in_zone(&self) -> bool {
        self.active_spot()
            .is_some_and(|s| s.contains(self.opponent.x, self.opponent.y))
    }
}

// --- Controller -------------------------------------------------------------

/// High-level behaviour, for debug overlays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NpcActivity {
    #[default]
    Idle,
    Dodging,
    Chasing,
    HoldingRange,
    Dancing,
    Retreating,
    /// Match over; the controller only emits neutral input.
    Disabled,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PendingDash {
    pub queued_ms: f64,
    pub dir: f64,
    pub released: bool,
}

/// Per-match mutable AI state.
#[derive(Clone, Debug)]
pub struct NpcState {
    pub(crate) mode: StrategyMode,
    pub(crate) activity: NpcActivity,
    pub(crate) cooldowns: Cooldowns,
    pub(crate) dodge_cooldown: f64,
    pub(crate) last_action_ms: Option<f64>,
    pub(crate) pending_dash: Option<PendingDash>,
    pub(crate) crossing_dir: Option<f64>,
    pub(crate) profile: OpponentProfile,
}

impl Default for NpcState {
    fn default() -> Self {
        Self {
            mode: StrategyMode::ZoneSeeker,
            activity: NpcActivity::Idle,
            cooldowns: Cooldowns::default(),
            dodge_cooldown: 0.0,
            last_action_ms: None,
            pending_dash: None,
            crossing_dir: None,
            profile: OpponentProfile::default(),
        }
    }
}

impl NpcState {
    pub fn mode(&self) -> StrategyMode {
        self.mode
    }

    pub fn activity(&self) -> NpcActivity {
        self.activity
    }

    pub fn cooldowns(&self) -> &Cooldowns {
        &self.cooldowns
    }

    pub fn profile(&self) -> &OpponentProfile {
        &self.profile
    }

    pub fn last_action_ms(&self) -> Option<f64> {
        self.last_action_ms
    }

    pub fn dash_pending(&self) -> bool {
        self.pending_dash.is_some()
    }
}

pub struct NpcController<R: Rng = StdRng> {
    tuning: NpcTuning,
    state: NpcState,
    buttons: ButtonTracker,
    rng: R,
    disabled: bool,
}

impl NpcController<StdRng> {
    /// Deterministic controller.
    pub fn with_seed(tuning: NpcTuning, seed: u64) -> Self {
        Self::with_rng(tuning, StdRng::seed_from_u64(seed))
    }

    /// Controller seeded from platform entropy (browser crypto on wasm).
    #[cfg(feature = "rng")]
    pub fn from_entropy(tuning: NpcTuning) -> Self {
        Self::with_rng(tuning, StdRng::from_entropy())
    }
}

impl<R: Rng> NpcController<R> {
    pub fn with_rng(tuning: NpcTuning, rng: R) -> Self {
        Self {
            tuning,
            state: NpcState::default(),
            buttons: ButtonTracker::default(),
            rng,
            disabled: false,
        }
    }

    pub fn tuning(&self) -> &NpcTuning {
        &self.tuning
    }

    pub fn state(&self) -> &NpcState {
        &self.state
    }

    pub fn mode(&self) -> StrategyMode {
        self.state.mode
    }

    pub fn activity(&self) -> NpcActivity {
        if self.disabled {
            NpcActivity::Disabled
        } else {
            self.state.activity
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Match over. Further updates emit neutral input.
    pub fn disable(&mut self) {
        if !self.disabled {
            info!(mode = ?self.state.mode, "opponent AI disabled");
        }
        self.disabled = true;
        self.state.pending_dash = None;
        self.state.activity = NpcActivity::Disabled;
    }

    /// Decide this frame's input.
    pub fn update(&mut self, snap: &CombatSnapshot<'_>) -> InputIntent {
        if self.disabled {
            return self.buttons.frame(0.0, false, &[]);
        }
        let dt = if snap.dt.is_finite() { snap.dt.max(0.0) } else { 0.0 };
        self.state.cooldowns.tick(dt);
        self.state.dodge_cooldown = (self.state.dodge_cooldown - dt).max(0.0);
        if snap.npc.on_ground {
            self.state.crossing_dir = None;
        }
        self.state.profile.observe(&snap.opponent);

        let mode = select_mode(snap, &self.tuning);
        if mode != self.state.mode {
            debug!(from = ?self.state.mode, to = ?mode, "strategy mode change");
            self.state.mode = mode;
        }

        let plan = planner::plan(&mut self.state, snap, &self.tuning, &mut self.rng);
        self.state.activity = plan.activity;
        if !plan.buttons.is_empty() {
            self.state.last_action_ms = Some(snap.now_ms);
        }
        self.buttons.frame(plan.axis_x, plan.jump, &plan.buttons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{Cell, Heatmap};

    #[test]
    fn disabled_controller_emits_neutral_input_and_releases_buttons() {
        let stage = Heatmap::new(60, 34, 16.0).with_rect(0, 28, 60, 34, Cell::Ground);
        let mut npc = NpcController::with_seed(NpcTuning::default(), 1);
        let mut me = FighterView::grounded(400.0, 448.0);
        me.ultimate_meter = 1.0;
        let snap = CombatSnapshot {
            now_ms: 0.0,
            dt: 1.0 / 60.0,
            npc: me,
            opponent: FighterView::grounded(480.0, 448.0),
            dance_spot: None,
            in_beat_window: false,
            stage: &stage,
        };
        let first = npc.update(&snap);
        assert!(first.pressed(Button::Ultimate));
        npc.disable();
        let after = npc.update(&snap);
        assert_eq!(after.axis_x, 0.0);
        assert!(!after.any_pressed());
        assert!(after.released(Button::Ultimate));
        assert_eq!(npc.activity(), NpcActivity::Disabled);
    }

    #[test]
    fn dance_spot_containment_requires_active() {
        let mut spot = DanceSpot {
            x: 100.0,
            y: 100.0,
            radius: 50.0,
            active: true,
        };
        assert!(spot.contains(130.0, 100.0));
        assert!(!spot.contains(160.0, 100.0));
        spot.active = false;
        assert!(!spot.contains(100.0, 100.0));
    }
}
