//! Music time and beat timing.
//!
//! The audio element's reported playback position is the canonical timeline:
//! every beat judgement reads it (through [`crate::audio::AudioEngine::music_time_ms`])
//! rather than polling wall-clock time, which drifts with JS-thread scheduling.

// --- Clock Source -----------------------------------------------------------

/// Convert an element's reported position into music time (ms).
///
/// Returns 0 while the duration is unknown (`NaN` before metadata loads,
/// `Infinity` for live streams) or when the position itself is not finite.
pub fn music_time_from_element(current_time_secs: f64, duration_secs: f64) -> f64 {
    if !duration_secs.is_finite() || !current_time_secs.is_finite() || current_time_secs < 0.0 {
        return 0.0;
    }
    current_time_secs * 1000.0
}

// --- Beat Model -------------------------------------------------------------

/// BeatClock maps music time onto beats for a fixed BPM.
#[derive(Clone, Debug, PartialEq)]
pub struct BeatClock {
    bpm: f64,      // beats per minute
    start_ms: f64, // music time of beat 0
}

impl BeatClock {
    pub fn new(bpm: f64, start_ms: f64) -> Self {
        Self {
            bpm: if bpm > 0.0 { bpm } else { 120.0 },
            start_ms,
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn beat_duration_ms(&self) -> f64 {
        60_000.0 / self.bpm
    }

    pub fn current_beat(&self, music_ms: f64) -> f64 {
        (music_ms - self.start_ms) / self.beat_duration_ms()
    }

    /// Signed distance (ms) from `music_ms` to the nearest whole beat.
    pub fn offset_to_nearest_beat(&self, music_ms: f64) -> f64 {
        let beat = self.current_beat(music_ms);
        (beat - beat.round()) * self.beat_duration_ms()
    }
}

/// How an action landed relative to the beat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeatJudgement {
    Perfect,
    Good,
    Miss,
}

/// Beat windows judged against music time plus the shared beat offset.
///
/// The offset is owned by the combat/dance state; the drift corrector is its
/// only writer.
#[derive(Clone, Debug, PartialEq)]
pub struct RhythmClock {
    pub beat: BeatClock,
    pub perfect_window_ms: f64,
    pub good_window_ms: f64,
}

impl RhythmClock {
    pub fn new(bpm: f64) -> Self {
        Self {
            beat: BeatClock::new(bpm, 0.0),
            perfect_window_ms: 50.0,
            good_window_ms: 120.0,
        }
    }

    pub fn judge(&self, music_ms: f64, beat_offset_ms: f64) -> BeatJudgement {
        let off = self
            .beat
            .offset_to_nearest_beat(music_ms + beat_offset_ms)
            .abs();
        if off <= self.perfect_window_ms {
            BeatJudgement::Perfect
        } else if off <= self.good_window_ms {
            BeatJudgement::Good
        } else {
            BeatJudgement::Miss
        }
    }

    /// True while an action would score at least `Good`.
    pub fn in_beat_window(&self, music_ms: f64, beat_offset_ms: f64) -> bool {
        self.judge(music_ms, beat_offset_ms) != BeatJudgement::Miss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beatclock() {
        let start = 1_000.0;
        let clock = BeatClock::new(120.0, start);
        assert!((clock.beat_duration_ms() - 500.0).abs() < 1e-6);
        assert!((clock.current_beat(start) - 0.0).abs() < 1e-9);
        assert!((clock.current_beat(start + 500.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn music_time_guards_unknown_duration() {
        assert_eq!(music_time_from_element(3.0, f64::NAN), 0.0);
        assert_eq!(music_time_from_element(3.0, f64::INFINITY), 0.0);
        assert_eq!(music_time_from_element(f64::NAN, 10.0), 0.0);
        assert!((music_time_from_element(1.25, 90.0) - 1250.0).abs() < 1e-9);
    }

    #[test]
    fn rhythm_windows_follow_offset() {
        let rc = RhythmClock::new(120.0);
        assert_eq!(rc.judge(1000.0, 0.0), BeatJudgement::Perfect);
        assert_eq!(rc.judge(1100.0, 0.0), BeatJudgement::Good);
        assert_eq!(rc.judge(1250.0, 0.0), BeatJudgement::Miss);
        // shifting by the offset moves the window
        assert_eq!(rc.judge(1250.0, 250.0), BeatJudgement::Perfect);
        assert!(!rc.in_beat_window(1250.0, 0.0));
    }
}
