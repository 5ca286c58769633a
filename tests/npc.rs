// Integration tests for the opponent AI.
// Each test drives a seeded controller frame by frame, moving the NPC by the
// emitted axis the way the combat system would.

use beat_brawl::config::NpcTuning;
use beat_brawl::input::{Button, InputIntent};
use beat_brawl::npc::safety::ground_under;
use beat_brawl::npc::{
    AttackKind, AttackPhase, AttackState, CombatSnapshot, DanceSpot, FighterView, NpcController,
    StrategyMode,
};
use beat_brawl::stage::{Cell, Heatmap, StageGeometry, stage_by_name, stages};

const FRAME_MS: f64 = 1000.0 / 60.0;
const WALK_PX: f64 = 4.0;

fn flat() -> Heatmap {
    Heatmap::new(60, 34, 16.0).with_rect(0, 28, 60, 34, Cell::Ground)
}

// Ground x 0..320, then a pit `gap_px` wide, then ground to the right edge.
fn ledge(gap_px: usize) -> Heatmap {
    let gap_cells = gap_px / 16;
    Heatmap::new(60, 34, 16.0)
        .with_rect(0, 28, 20, 34, Cell::Ground)
        .with_rect((20 + gap_cells).min(60), 28, 60, 34, Cell::Ground)
}

fn snapshot<'a>(
    stage: &'a dyn StageGeometry,
    frame: u32,
    npc: FighterView,
    opponent: FighterView,
    dance_spot: Option<DanceSpot>,
) -> CombatSnapshot<'a> {
    CombatSnapshot {
        now_ms: frame as f64 * FRAME_MS,
        dt: FRAME_MS / 1000.0,
        npc,
        opponent,
        dance_spot,
        in_beat_window: frame % 30 < 6,
        stage,
    }
}

fn swinging(x: f64, phase: AttackPhase) -> FighterView {
    let mut f = FighterView::grounded(x, 448.0);
    f.attack = Some(AttackState {
        kind: AttackKind::Heavy,
        phase,
        started_ms: 0.0,
    });
    f
}

fn only_dodge(intent: &InputIntent) -> bool {
    Button::ALL
        .iter()
        .all(|b| intent.pressed(*b) == (*b == Button::Dodge))
}

#[test]
fn dodge_beats_every_other_decision() {
    let stage = flat();
    let spot = DanceSpot {
        x: 440.0,
        y: 448.0,
        radius: 80.0,
        active: true,
    };
    for seed in 0..16 {
        // Meter full, opponent hoarding charges, both in zone on the beat.
        let mut variants = Vec::new();
        let mut ult = FighterView::grounded(400.0, 448.0);
        ult.ultimate_meter = 1.0;
        variants.push((ult, swinging(500.0, AttackPhase::Active)));
        let mut greedy = swinging(480.0, AttackPhase::Release);
        greedy.beat_charges = 7;
        variants.push((FighterView::grounded(400.0, 448.0), greedy));
        variants.push((FighterView::grounded(420.0, 448.0), swinging(470.0, AttackPhase::Active)));

        for (npc, opponent) in variants {
            let mut ai = NpcController::with_seed(NpcTuning::default(), seed);
            let intent = ai.update(&snapshot(&stage, 0, npc, opponent, Some(spot)));
            assert!(only_dodge(&intent), "seed {seed}, mode {:?}: {intent:?}", ai.mode());
            assert_eq!(intent.axis_x, -1.0, "dodges away from the attacker");
        }
    }
}

#[test]
fn dodge_is_a_fresh_press_after_its_cooldown() {
    let stage = flat();
    let mut ai = NpcController::with_seed(NpcTuning::default(), 3);
    let npc = FighterView::grounded(400.0, 448.0);
    let opponent = swinging(520.0, AttackPhase::Active);
    let mut presses = Vec::new();
    for frame in 0..130 {
        let intent = ai.update(&snapshot(&stage, frame, npc, opponent, None));
        if intent.pressed(Button::Dodge) {
            presses.push(frame);
        }
    }
    // One dodge per second of sustained threat.
    assert_eq!(presses.len(), 3, "dodge frames {presses:?}");
    assert_eq!(presses[0], 0);
    assert!(presses[1] >= 60);
}

#[test]
fn startup_frames_are_not_dodged() {
    let stage = flat();
    let mut ai = NpcController::with_seed(NpcTuning::default(), 9);
    let intent = ai.update(&snapshot(
        &stage,
        0,
        FighterView::grounded(400.0, 448.0),
        swinging(500.0, AttackPhase::Startup),
        None,
    ));
    assert!(!intent.pressed(Button::Dodge));
    assert_eq!(ai.mode(), StrategyMode::CombatDefense);
}

#[test]
fn never_walks_or_dashes_into_a_wide_gap() {
    let stage = ledge(640);
    let spot_past_gap = DanceSpot {
        x: 640.0,
        y: 448.0,
        radius: 80.0,
        active: true,
    };
    let mut greedy = FighterView::grounded(480.0, 448.0);
    greedy.beat_charges = 6;

    // (opponent, npc meter, zone)
    let scenarios = [
        (FighterView::grounded(700.0, 448.0), 0.0, None),
        (FighterView::grounded(480.0, 448.0), 0.0, None),
        (FighterView::grounded(700.0, 448.0), 0.0, Some(spot_past_gap)),
        (greedy, 0.0, None),
        (FighterView::grounded(700.0, 448.0), 1.0, None),
    ];
    for start_x in [160.0, 240.0, 300.0, 316.0] {
        for (opponent, meter, zone) in scenarios {
            for seed in 0..8 {
                let mut ai = NpcController::with_seed(NpcTuning::default(), seed);
                let mut npc = FighterView::grounded(start_x, 448.0);
                npc.ultimate_meter = meter;
                for frame in 0..240 {
                    let intent = ai.update(&snapshot(&stage, frame, npc, opponent, zone));
                    assert!(!intent.jump, "no landing in reach, nothing to jump to");
                    assert!(!intent.pressed(Button::Dash), "dash toward the pit at x={}", npc.x);
                    npc.x += intent.axis_x * WALK_PX;
                    assert!(
                        ground_under(&stage, npc.x, npc.y),
                        "walked off the ledge: x={} start={start_x} seed={seed} mode={:?}",
                        npc.x,
                        ai.mode()
                    );
                }
            }
        }
    }
}

#[test]
fn retreat_stops_at_the_ledge() {
    let stage = ledge(640);
    let mut ai = NpcController::with_seed(NpcTuning::default(), 5);
    let mut npc = FighterView::grounded(280.0, 448.0);
    for frame in 0..120 {
        // Opponent keeps pressing in from the left.
        let opponent = FighterView::grounded(npc.x - 60.0, 448.0);
        let intent = ai.update(&snapshot(&stage, frame, npc, opponent, None));
        npc.x += intent.axis_x * WALK_PX;
        assert!(ground_under(&stage, npc.x, npc.y), "retreated off at x={}", npc.x);
    }
    assert_eq!(ai.mode(), StrategyMode::CombatDefense);
}

#[test]
fn narrow_gap_is_jumped_before_the_edge() {
    let stage = ledge(96);
    let spot = DanceSpot {
        x: 600.0,
        y: 448.0,
        radius: 60.0,
        active: true,
    };
    let mut ai = NpcController::with_seed(NpcTuning::default(), 11);
    let mut npc = FighterView::grounded(160.0, 448.0);
    let opponent = FighterView::grounded(900.0, 448.0);
    let mut jumped_at = None;
    for frame in 0..120 {
        let intent = ai.update(&snapshot(&stage, frame, npc, opponent, Some(spot)));
        if intent.jump {
            assert_eq!(intent.axis_x, 1.0, "jumps toward the landing");
            jumped_at = Some(npc.x);
            break;
        }
        npc.x += intent.axis_x * WALK_PX;
    }
    let x = jumped_at.expect("gap jump emitted");
    assert!(x < 320.0, "jumped from solid ground, x={x}");
}

#[test]
fn ultimate_seek_closes_in_then_fires_once() {
    let stage = flat();
    let tuning = NpcTuning::default();
    let mut ai = NpcController::with_seed(tuning.clone(), 21);
    let mut npc = FighterView::grounded(200.0, 448.0);
    npc.ultimate_meter = 1.0;
    let opponent = FighterView::grounded(500.0, 448.0);

    let mut fired = Vec::new();
    for frame in 0..150 {
        let snap = snapshot(&stage, frame, npc, opponent, None);
        let distance = snap.distance();
        let intent = ai.update(&snap);
        assert_eq!(ai.mode(), StrategyMode::UltimateSeek);
        if distance > tuning.ultimate_range_px {
            assert_eq!(intent.axis_x, 1.0, "closing in at distance {distance}");
            assert!(!intent.pressed(Button::Ultimate), "fired out of range");
        }
        if intent.pressed(Button::Ultimate) {
            fired.push((frame, distance));
        }
        npc.x += intent.axis_x * 6.0;
    }
    assert_eq!(fired.len(), 1, "ultimate fired {fired:?}");
    assert!(fired[0].1 <= tuning.ultimate_range_px);
}

#[test]
fn ultimate_waits_for_a_safe_moment() {
    let stage = flat();
    let mut ai = NpcController::with_seed(NpcTuning::default(), 2);
    let mut npc = FighterView::grounded(400.0, 448.0);
    npc.ultimate_meter = 1.0;
    npc.attack = Some(AttackState {
        kind: AttackKind::Light,
        phase: AttackPhase::Recovery,
        started_ms: 0.0,
    });
    let opponent = FighterView::grounded(520.0, 448.0);

    let busy = ai.update(&snapshot(&stage, 0, npc, opponent, None));
    assert!(!busy.pressed(Button::Ultimate));

    npc.attack = None;
    npc.on_ground = false;
    let airborne = ai.update(&snapshot(&stage, 1, npc, opponent, None));
    assert!(!airborne.pressed(Button::Ultimate));

    npc.on_ground = true;
    let ready = ai.update(&snapshot(&stage, 2, npc, opponent, None));
    assert!(ready.pressed(Button::Ultimate));
}

#[test]
fn bundled_stages_spawn_on_ground() {
    assert_eq!(stages().len(), 3);
    for stage in stages() {
        for &(x, y) in stage.spawn_points {
            assert!(ground_under(*stage, x, y), "{}: spawn ({x}, {y}) floats", stage.name);
        }
    }
    assert!(stage_by_name("Broken Bridge").is_some());
    assert!(stage_by_name("Nowhere").is_none());
}

#[test]
fn bridge_chase_halts_at_the_broken_deck() {
    let bridge = stage_by_name("Broken Bridge").expect("bundled stage");
    let [(sx, sy), (ox, oy)] = [bridge.spawn_points[0], bridge.spawn_points[1]];
    let mut ai = NpcController::with_seed(NpcTuning::default(), 8);
    let mut npc = FighterView::grounded(sx, sy);
    let opponent = FighterView::grounded(ox, oy);
    for frame in 0..240 {
        let intent = ai.update(&snapshot(bridge, frame, npc, opponent, None));
        npc.x += intent.axis_x * WALK_PX;
        assert!(ground_under(bridge, npc.x, npc.y), "fell into the gap at x={}", npc.x);
    }
    assert!(npc.x > 300.0 && npc.x < 384.0, "stopped at x={}", npc.x);
}
