//! Modelled node chain for one playback session.
//!
//! ```text
//! source → waveshaper → delay(+feedback) → effect gain → highpass
//!        → lofi filter/gain → main lowpass → gater(LFO × depth) → master → out
//! ```
//!
//! The chain owns the authoritative automation timelines. Every change is also
//! queued as `(ChainParam, Automation)` so the host can mirror it onto real nodes.

use super::param::{AudioParam, Automation, Curve};
use crate::config::MixerConfig;

/// Addressable parameters of the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainParam {
    Distortion, // waveshaper curve amount
    DelayTime,
    Feedback, // delay feedback gain (reverb tail)
    EffectGain,
    Highpass,
    LofiCutoff,
    LofiMix,
    MainLowpass,
    LfoRate,
    GaterDepth,
    Master,
}

pub const PARAM_COUNT: usize = 11;

impl ChainParam {
    pub const ALL: [ChainParam; PARAM_COUNT] = [
        ChainParam::Distortion,
        ChainParam::DelayTime,
        ChainParam::Feedback,
        ChainParam::EffectGain,
        ChainParam::Highpass,
        ChainParam::LofiCutoff,
        ChainParam::LofiMix,
        ChainParam::MainLowpass,
        ChainParam::LfoRate,
        ChainParam::GaterDepth,
        ChainParam::Master,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Value a freshly built chain starts with. `Master` is owned by the
    /// session (fades and volume) and is not covered by filter resets.
    pub fn default_value(self, cfg: &MixerConfig) -> f64 {
        match self {
            ChainParam::Distortion => 0.0,
            ChainParam::DelayTime => 0.12,
            ChainParam::Feedback => 0.0,
            ChainParam::EffectGain => 0.0,
            ChainParam::Highpass => cfg.highpass_off_hz,
            ChainParam::LofiCutoff => cfg.lofi_cutoff_hz,
            ChainParam::LofiMix => 0.0,
            ChainParam::MainLowpass => cfg.battle_lowpass_hz,
            ChainParam::LfoRate => cfg.tremolo_rate_hz,
            ChainParam::GaterDepth => 0.0,
            ChainParam::Master => 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EffectChain {
    params: [AudioParam; PARAM_COUNT],
    pending: Vec<(ChainParam, Automation)>,
}

impl EffectChain {
    pub fn new(cfg: &MixerConfig, master: f64) -> Self {
        let params = ChainParam::ALL.map(|p| match p {
            ChainParam::Master => AudioParam::new(master),
            other => AudioParam::new(other.default_value(cfg)),
        });
        Self {
            params,
            pending: Vec::new(),
        }
    }

    pub fn param(&self, p: ChainParam) -> &AudioParam {
        &self.params[p.index()]
    }

    pub fn value(&self, p: ChainParam, t: f64) -> f64 {
        self.params[p.index()].value_at(t)
    }

    pub fn glide(&mut self, p: ChainParam, now: f64, target: f64, duration: f64, curve: Curve) {
        let events = self.params[p.index()].glide(now, target, duration, curve);
        self.pending.extend(events.into_iter().map(|e| (p, e)));
    }

    pub fn set(&mut self, p: ChainParam, now: f64, value: f64) {
        self.glide(p, now, value, 0.0, Curve::Linear);
    }

    /// Restore every effect parameter to its fresh-construction value.
    pub fn reset_effects(&mut self, cfg: &MixerConfig, now: f64) {
        for p in ChainParam::ALL {
            if p == ChainParam::Master {
                continue;
            }
            let value = p.default_value(cfg);
            self.params[p.index()].reset(value);
            self.pending.push((p, Automation::Cancel { time: now }));
            self.pending
                .push((p, Automation::SetValue { time: now, value }));
        }
    }

    /// Drain automation not yet mirrored to the host.
    pub fn take_pending(&mut self) -> Vec<(ChainParam, Automation)> {
        std::mem::take(&mut self.pending)
    }

    /// Current value of every effect parameter (excludes `Master`).
    pub fn effect_values(&self, t: f64) -> Vec<(ChainParam, f64)> {
        ChainParam::ALL
            .iter()
            .filter(|p| **p != ChainParam::Master)
            .map(|&p| (p, self.value(p, t)))
            .collect()
    }
}

/// Waveshaper transfer curve for a distortion `amount` (0 = clean).
pub fn distortion_curve(amount: f64, samples: usize) -> Vec<f32> {
    let n = samples.max(2);
    let deg = std::f64::consts::PI / 180.0;
    (0..n)
        .map(|i| {
            let x = i as f64 * 2.0 / (n - 1) as f64 - 1.0;
            if amount <= 0.0 {
                x as f32
            } else {
                (((3.0 + amount) * x * 20.0 * deg) / (std::f64::consts::PI + amount * x.abs()))
                    as f32
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_chain_starts_at_battle_baseline() {
        let cfg = MixerConfig::default();
        let chain = EffectChain::new(&cfg, 0.3);
        assert_eq!(chain.value(ChainParam::MainLowpass, 0.0), cfg.battle_lowpass_hz);
        assert_eq!(chain.value(ChainParam::Master, 0.0), 0.3);
        assert_eq!(chain.value(ChainParam::GaterDepth, 0.0), 0.0);
    }

    #[test]
    fn reset_effects_keeps_master_and_queues_mirror_events() {
        let cfg = MixerConfig::default();
        let mut chain = EffectChain::new(&cfg, 0.5);
        chain.set(ChainParam::Distortion, 1.0, 300.0);
        chain.glide(ChainParam::Master, 1.0, 0.1, 0.5, Curve::Linear);
        chain.take_pending();
        chain.reset_effects(&cfg, 2.0);
        assert_eq!(chain.value(ChainParam::Distortion, 2.0), 0.0);
        assert!((chain.value(ChainParam::Master, 2.0) - 0.1).abs() < 1e-9);
        let pending = chain.take_pending();
        assert_eq!(pending.len(), (PARAM_COUNT - 1) * 2);
        assert!(chain.take_pending().is_empty());
    }

    #[test]
    fn distortion_curve_is_identity_when_clean_and_odd_when_driven() {
        let clean = distortion_curve(0.0, 5);
        assert_eq!(clean, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        let driven = distortion_curve(400.0, 5);
        assert!((driven[0] + driven[4]).abs() < 1e-6);
        assert!(driven[4] > 0.0);
    }
}
