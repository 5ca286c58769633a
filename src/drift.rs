//! Drift correction between audio-reported and wall-clock-predicted music time.
//!
//! Every `check_interval_ms` of wall time (self-paced off a monotonic
//! last-check timestamp, not a timer) the corrector samples how far the
//! offset-corrected music position (`actual + beat_offset`) sits from the
//! wall-clock prediction, keeps a bounded history and, once the window is full,
//! nudges the shared beat offset by a fraction of the mean drift. Correction
//! requires the drift to be both large and consistent; noisy readings are left
//! alone. The history is cleared after each correction so one skew event is
//! never corrected twice, and since later samples already include the applied
//! offset, a steady latency converges instead of being chased forever.
//!
//! Looping tracks wrap their element position at the track duration; samples
//! are unwrapped onto the nearest loop and the history restarts at each wrap.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::audio::{AudioEngine, AudioHost};
use crate::config::DriftConfig;

/// Outcome of one drift sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriftReport {
    pub drift_ms: f64,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    /// Amount added to the beat offset, if a correction was applied.
    pub correction_ms: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct DriftCorrector {
    config: DriftConfig,
    history: VecDeque<f64>,
    last_check_ms: Option<f64>,
    last_music_ms: Option<f64>,
    corrections: u32,
}

impl DriftCorrector {
    pub fn new(config: DriftConfig) -> Self {
        let cap = config.history_len.max(1);
        Self {
            config,
            history: VecDeque::with_capacity(cap),
            last_check_ms: None,
            last_music_ms: None,
            corrections: 0,
        }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    pub fn corrections(&self) -> u32 {
        self.corrections
    }

    /// Forget history and cadence (new stage / new track).
    pub fn reset(&mut self) {
        self.history.clear();
        self.last_check_ms = None;
        self.last_music_ms = None;
    }

    /// Cadence-gated check. Returns `None` when the interval has not elapsed.
    pub fn update(
        &mut self,
        now_ms: f64,
        stage_start_ms: f64,
        music_time_ms: f64,
        beat_offset_ms: &mut f64,
    ) -> Option<DriftReport> {
        self.update_looping(now_ms, stage_start_ms, music_time_ms, None, beat_offset_ms)
    }

    /// [`update`](Self::update) for a track that wraps every `loop_ms`.
    pub fn update_looping(
        &mut self,
        now_ms: f64,
        stage_start_ms: f64,
        music_time_ms: f64,
        loop_ms: Option<f64>,
        beat_offset_ms: &mut f64,
    ) -> Option<DriftReport> {
        if let Some(last) = self.last_check_ms {
            if now_ms - last < self.config.check_interval_ms {
                return None;
            }
        }
        self.last_check_ms = Some(now_ms);
        let loop_ms = loop_ms.filter(|l| l.is_finite() && *l > 0.0);
        if loop_ms.is_some() && self.last_music_ms.is_some_and(|last| music_time_ms < last) {
            debug!(music_time_ms, "track looped, drift history restarted");
            self.history.clear();
        }
        self.last_music_ms = Some(music_time_ms);

        let expected = now_ms - stage_start_ms;
        let mut drift = music_time_ms - expected;
        if let Some(len) = loop_ms {
            drift -= len * (drift / len).round();
        }
        Some(self.record_sample(drift, beat_offset_ms))
    }

    /// Check against the engine's clock; only runs while a track is playing.
    pub fn update_from<H: AudioHost>(
        &mut self,
        engine: &AudioEngine<H>,
        stage_start_ms: f64,
        beat_offset_ms: &mut f64,
    ) -> Option<DriftReport> {
        if !engine.is_playing() {
            return None;
        }
        let now = engine.host().now_ms();
        self.update_looping(
            now,
            stage_start_ms,
            engine.music_time_ms(),
            engine.loop_length_ms(),
            beat_offset_ms,
        )
    }

    /// Push one raw drift sample (`actual - expected`) and apply a correction
    /// if the gate opens. The sample is judged with the current beat offset
    /// already applied.
    pub fn record_sample(&mut self, raw_drift_ms: f64, beat_offset_ms: &mut f64) -> DriftReport {
        let drift_ms = raw_drift_ms + *beat_offset_ms;
        let cap = self.config.history_len.max(1);
        if self.history.len() == cap {
            self.history.pop_front();
        }
        self.history.push_back(drift_ms);
        let (mean, std_dev) = mean_and_std_dev(self.history.iter().copied());

        let window_full = self.history.len() >= cap;
        let large = mean.abs() > self.config.correction_threshold_ms;
        let stable = std_dev < self.config.stability_threshold_ms;
        let mut correction_ms = None;
        if window_full && large && stable {
            let correction = -mean * self.config.correction_strength;
            *beat_offset_ms += correction;
            self.history.clear();
            self.corrections += 1;
            correction_ms = Some(correction);
            info!(mean, std_dev, correction, offset = *beat_offset_ms, "beat offset corrected");
        } else if large {
            debug!(mean, std_dev, samples = self.history.len(), "drift observed, not correcting");
        }
        DriftReport {
            drift_ms,
            mean_ms: mean,
            std_dev_ms: std_dev,
            correction_ms,
        }
    }
}

impl Default for DriftCorrector {
    fn default() -> Self {
        Self::new(DriftConfig::default())
    }
}

/// Drift corrector bound to the stage clock of the track it watches.
///
/// Unanchored until a track starts (or [`anchor`](Self::anchor) is called), so
/// time spent before the music never reads as drift.
#[derive(Clone, Debug, Default)]
pub struct BeatSync {
    drift: DriftCorrector,
    stage_start_ms: Option<f64>,
    beat_offset_ms: f64,
}

impl BeatSync {
    pub fn new(config: DriftConfig) -> Self {
        Self {
            drift: DriftCorrector::new(config),
            stage_start_ms: None,
            beat_offset_ms: 0.0,
        }
    }

    /// Music time 0 corresponds to wall time `start_ms`. Zeroes the offset.
    pub fn anchor(&mut self, start_ms: f64) {
        self.stage_start_ms = Some(start_ms);
        self.beat_offset_ms = 0.0;
        self.drift.reset();
    }

    pub fn clear(&mut self) {
        self.stage_start_ms = None;
        self.drift.reset();
    }

    pub fn stage_start_ms(&self) -> Option<f64> {
        self.stage_start_ms
    }

    pub fn beat_offset_ms(&self) -> f64 {
        self.beat_offset_ms
    }

    pub fn corrector(&self) -> &DriftCorrector {
        &self.drift
    }

    pub fn update<H: AudioHost>(&mut self, engine: &AudioEngine<H>) -> Option<DriftReport> {
        let start = self.stage_start_ms?;
        self.drift.update_from(engine, start, &mut self.beat_offset_ms)
    }
}

/// Mean and population standard deviation.
pub fn mean_and_std_dev(samples: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (n, sum) = samples.clone().fold((0usize, 0.0), |(n, s), x| (n + 1, s + x));
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let var = samples.map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
    (mean, var.sqrt())
}
