// Integration tests for beat-offset drift correction.
// Corrections must only happen for drift that is both large and consistent.

use approx::assert_abs_diff_eq;
use beat_brawl::DriftCorrector;
use beat_brawl::audio::{AudioEngine, AudioHost, HeadlessHost, PlayOptions};
use beat_brawl::drift::BeatSync;

#[test]
fn large_stable_drift_is_corrected_exactly_once() {
    let mut dc = DriftCorrector::default();
    let mut offset = 0.0;
    let samples = [295.0, 305.0, 298.0, 302.0, 300.0, 297.0, 303.0, 300.0, 299.0, 301.0];
    let mut corrections = Vec::new();
    for (i, s) in samples.iter().enumerate() {
        let report = dc.record_sample(*s, &mut offset);
        if let Some(c) = report.correction_ms {
            corrections.push((i, c));
        }
    }
    assert_eq!(corrections.len(), 1, "one correction per skew window");
    let (at, amount) = corrections[0];
    assert_eq!(at, 9, "only once the window is full");
    assert_abs_diff_eq!(amount, -15.0, epsilon = 1e-9);
    assert_abs_diff_eq!(offset, -15.0, epsilon = 1e-9);
    assert_eq!(dc.history().count(), 0, "history is cleared after correcting");
    assert_eq!(dc.corrections(), 1);
}

#[test]
fn noisy_drift_is_never_corrected() {
    let mut dc = DriftCorrector::default();
    let mut offset = 0.0;
    for i in 0..40 {
        // Mean 300ms, standard deviation 250ms.
        let s = if i % 2 == 0 { 50.0 } else { 550.0 };
        let report = dc.record_sample(s, &mut offset);
        assert!(report.correction_ms.is_none(), "sample {i} corrected noisy drift");
    }
    assert_eq!(offset, 0.0);
    assert_eq!(dc.history().count(), 10, "history stays bounded");
}

#[test]
fn small_drift_is_tolerated() {
    let mut dc = DriftCorrector::default();
    let mut offset = 12.0;
    for _ in 0..30 {
        assert!(dc.record_sample(-150.0, &mut offset).correction_ms.is_none());
    }
    assert_eq!(offset, 12.0);
}

#[test]
fn cadence_gated_updates_correct_a_lagging_track() {
    let mut dc = DriftCorrector::default();
    let mut offset = 0.0;
    let mut reports = 0;
    // One frame every 16ms for 25 seconds; the track lags wall time by 400ms.
    let mut now = 0.0;
    while now <= 25_000.0 {
        let music = (now - 400.0_f64).max(0.0);
        if dc.update(now, 0.0, music, &mut offset).is_some() {
            reports += 1;
        }
        now += 16.0;
    }
    assert_eq!(reports, 13, "one check per 2s of wall time");
    // The t=0 sample (drift 0) keeps the first full window too noisy; once it
    // slides out, ten consistent -400ms samples trigger a single correction.
    assert_eq!(dc.corrections(), 1);
    assert_abs_diff_eq!(offset, 20.0, epsilon = 1e-9);
    assert_eq!(dc.history().count(), 2);
}

#[test]
fn engine_driven_updates_only_run_while_playing() {
    let mut e = AudioEngine::new(HeadlessHost::new());
    let mut dc = DriftCorrector::default();
    let mut offset = 0.0;
    assert!(dc.update_from(&e, 0.0, &mut offset).is_none());

    e.play_track("PVP_STAGE", PlayOptions::default());
    for _ in 0..30 {
        e.host_mut().advance(2000.0);
        let report = dc.update_from(&e, 0.0, &mut offset).expect("interval elapsed");
        assert_abs_diff_eq!(report.drift_ms, 0.0, epsilon = 1e-6);
    }
    assert_eq!(dc.corrections(), 0);
}

#[test]
fn steady_latency_converges_instead_of_running_away() {
    let mut dc = DriftCorrector::default();
    let mut offset = 0.0;
    // Ten minutes at the 2s cadence, the element running 250ms ahead.
    for _ in 0..300 {
        dc.record_sample(250.0, &mut offset);
    }
    // 250 -> 237.5 -> 225.6 -> 214.4 -> 203.6: five corrections, then the
    // residual sits inside the tolerance.
    assert_eq!(dc.corrections(), 5);
    assert!(offset < 0.0 && offset > -250.0, "offset {offset}");
    assert!(250.0 + offset <= 200.0, "residual {}", 250.0 + offset);

    let settled = offset;
    for _ in 0..300 {
        dc.record_sample(250.0, &mut offset);
    }
    assert_eq!(offset, settled);
}

#[test]
fn looping_track_wrap_is_not_drift() {
    let mut e = AudioEngine::new(HeadlessHost::new());
    e.play_track("PVP_STAGE", PlayOptions::default());
    assert_eq!(e.loop_length_ms(), Some(180_000.0));
    let mut dc = DriftCorrector::default();
    let mut offset = 0.0;
    // 260s of play covers one full loop of the 180s track.
    for _ in 0..130 {
        e.host_mut().advance(2000.0);
        e.tick();
        let report = dc.update_from(&e, 0.0, &mut offset).expect("interval elapsed");
        assert_abs_diff_eq!(report.drift_ms, 0.0, epsilon = 1e-6);
    }
    assert!(e.music_time_ms() < 90_000.0, "track wrapped");
    assert_eq!(dc.corrections(), 0);
    assert_eq!(offset, 0.0);
    // History restarted at the wrap (t=180s) and refilled since.
    assert_eq!(dc.history().count(), 10);
}

#[test]
fn one_shot_tracks_report_no_loop_length() {
    let mut e = AudioEngine::new(HeadlessHost::new());
    assert_eq!(e.loop_length_ms(), None);
    e.play_track("VICTORY", PlayOptions::default());
    assert_eq!(e.loop_length_ms(), None);
}

#[test]
fn beat_sync_waits_for_an_anchor() {
    let mut e = AudioEngine::new(HeadlessHost::new());
    let mut sync = BeatSync::default();
    e.play_track("MENU_LOOP", PlayOptions::default());
    for _ in 0..15 {
        e.host_mut().advance(2000.0);
        assert!(sync.update(&e).is_none(), "no stage clock yet");
    }

    // Stage music starts 30s after the page did.
    e.play_track("PVP_STAGE", PlayOptions::fade_in(1.0));
    sync.anchor(e.host().now_ms());
    for _ in 0..150 {
        e.host_mut().advance(2000.0);
        e.tick();
        let report = sync.update(&e).expect("anchored and playing");
        assert_abs_diff_eq!(report.drift_ms, 0.0, epsilon = 1e-6);
    }
    assert_eq!(sync.corrector().corrections(), 0);
    assert_eq!(sync.beat_offset_ms(), 0.0);

    sync.clear();
    e.host_mut().advance(2000.0);
    assert!(sync.update(&e).is_none());
}

#[test]
fn anchoring_zeroes_the_offset() {
    let mut e = AudioEngine::new(HeadlessHost::new());
    e.play_track("PVP_STAGE", PlayOptions::default());
    let mut sync = BeatSync::default();
    // Anchored 400ms late: the music reads 400ms ahead of the stage clock.
    sync.anchor(400.0);
    for _ in 0..12 {
        e.host_mut().advance(2000.0);
        sync.update(&e);
    }
    assert_eq!(sync.corrector().corrections(), 1);
    assert_abs_diff_eq!(sync.beat_offset_ms(), -20.0, epsilon = 1e-9);

    sync.anchor(e.host().now_ms());
    assert_eq!(sync.beat_offset_ms(), 0.0);
    assert_eq!(sync.corrector().history().count(), 0);
}
