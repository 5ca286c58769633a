//! Per-session output backend.
//!
//! Either the full node chain was built, or the platform could not decode
//! through Web Audio and the session drives the element's own volume.

use super::chain::{ChainParam, EffectChain};
use super::param::{AudioParam, Curve};

pub enum AudioBackend<N> {
    Graph { chain: EffectChain, nodes: N },
    ElementOnly { volume: AudioParam },
}

impl<N> AudioBackend<N> {
    pub fn is_graph(&self) -> bool {
        matches!(self, AudioBackend::Graph { .. })
    }

    pub fn chain(&self) -> Option<&EffectChain> {
        match self {
            AudioBackend::Graph { chain, .. } => Some(chain),
            AudioBackend::ElementOnly { .. } => None,
        }
    }

    pub fn chain_mut(&mut self) -> Option<&mut EffectChain> {
        match self {
            AudioBackend::Graph { chain, .. } => Some(chain),
            AudioBackend::ElementOnly { .. } => None,
        }
    }

    /// Session gain (master gain or element volume) at context time `t`.
    pub fn gain_at(&self, t: f64) -> f64 {
        match self {
            AudioBackend::Graph { chain, .. } => chain.value(ChainParam::Master, t),
            AudioBackend::ElementOnly { volume } => volume.value_at(t),
        }
    }

    /// Linear gain ramp; a zero duration applies immediately.
    pub fn glide_gain(&mut self, now: f64, target: f64, duration: f64) {
        let target = target.clamp(0.0, 1.0);
        match self {
            AudioBackend::Graph { chain, .. } => {
                chain.glide(ChainParam::Master, now, target, duration, Curve::Linear)
            }
            AudioBackend::ElementOnly { volume } => {
                volume.glide(now, target, duration, Curve::Linear);
            }
        }
    }
}
