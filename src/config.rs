//! Static tables and tuned constants.
//!
//! Every magic number the mixer, drift corrector and opponent AI depend on lives
//! here with its default. The values were tuned by ear / by playtesting and are
//! kept configurable rather than derived.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "serde_json")]
use crate::error::{AudioError, Result};

// --- Tracks -----------------------------------------------------------------

/// Immutable description of one music track.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackDescriptor {
    pub id: String,
    pub source: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub looping: bool,
    pub volume: f64, // base (target) gain, 0..=1
}

impl TrackDescriptor {
    pub fn new(id: &str, source: &str, looping: bool, volume: f64) -> Self {
        Self {
            id: id.to_string(),
            source: source.to_string(),
            looping,
            volume: volume.clamp(0.0, 1.0),
        }
    }
}

/// Per-track lookup table, defined once at startup.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TrackTable {
    tracks: Vec<TrackDescriptor>,
}

impl TrackTable {
    pub fn new(tracks: Vec<TrackDescriptor>) -> Self {
        Self { tracks }
    }

    pub fn get(&self, id: &str) -> Option<&TrackDescriptor> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.tracks.iter()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Parse a JSON array of track descriptors. Volumes are clamped to 0..=1.
    #[cfg(feature = "serde_json")]
    pub fn from_json(text: &str) -> Result<Self> {
        let mut table: TrackTable =
            serde_json::from_str(text).map_err(|e| AudioError::Config(e.to_string()))?;
        for t in table.tracks.iter_mut() {
            if t.id.is_empty() {
                return Err(AudioError::Config("track with empty id".into()));
            }
            t.volume = t.volume.clamp(0.0, 1.0);
        }
        Ok(table)
    }
}

impl Default for TrackTable {
    fn default() -> Self {
        Self::new(
            crate::TRACKS
                .iter()
                .map(|&(id, src, looping, vol)| TrackDescriptor::new(id, src, looping, vol))
                .collect(),
        )
    }
}

// --- Mixer ------------------------------------------------------------------

/// Filter priority tiers. Equal tiers overwrite each other (last writer wins).
pub mod priority {
    pub const BATTLE: u8 = 0;
    pub const HIT: u8 = 1;
    pub const DANCE_PHASE: u8 = 2;
    pub const DEATH: u8 = 3;
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MixerConfig {
    pub volume_ramp_secs: f64,
    pub resume_debounce_ms: f64,
    pub max_resume_attempts: u32,
    pub self_pause_guard_ms: f64,
    /// Main lowpass cutoff while fighting (muffled). Fresh chains start here.
    pub battle_lowpass_hz: f64,
    /// Main lowpass cutoff during the dance phase (full spectrum).
    pub open_lowpass_hz: f64,
    pub dance_filter_secs: f64,
    pub lofi_cutoff_hz: f64,
    pub lofi_mix: f64,
    pub highpass_off_hz: f64,
    pub perfect_highpass_hz: [f64; 3],
    pub tremolo_rate_hz: f64,
    pub death_lowpass_hz: f64,
    pub death_distortion: f64,
    pub death_reverb_feedback: f64,
    pub death_reverb_mix: f64,
    pub death_hit_secs: f64,
    pub death_recover_secs: f64,
    pub death_total_secs: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            volume_ramp_secs: 0.05,
            resume_debounce_ms: 1000.0,
            max_resume_attempts: 3,
            self_pause_guard_ms: 250.0,
            battle_lowpass_hz: 4_000.0,
            open_lowpass_hz: 20_000.0,
            dance_filter_secs: 0.6,
            lofi_cutoff_hz: 2_400.0,
            lofi_mix: 0.55,
            highpass_off_hz: 20.0,
            perfect_highpass_hz: [180.0, 450.0, 1_100.0],
            tremolo_rate_hz: 8.0,
            death_lowpass_hz: 320.0,
            death_distortion: 400.0,
            death_reverb_feedback: 0.6,
            death_reverb_mix: 0.7,
            death_hit_secs: 0.3,
            death_recover_secs: 0.8,
            death_total_secs: 1.5,
        }
    }
}

// --- Drift ------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriftConfig {
    pub check_interval_ms: f64,
    pub history_len: usize,
    pub correction_threshold_ms: f64,
    pub stability_threshold_ms: f64,
    pub correction_strength: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 2000.0,
            history_len: 10,
            correction_threshold_ms: 200.0,
            stability_threshold_ms: 100.0,
            correction_strength: 0.05,
        }
    }
}

// --- Opponent AI ------------------------------------------------------------

/// Cooldown in seconds applied after firing each attack kind.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AttackCooldowns {
    pub light: f64,
    pub heavy: f64,
    pub grab: f64,
    pub dash: f64,
    pub dance: f64,
    pub ultimate: f64,
}

impl Default for AttackCooldowns {
    fn default() -> Self {
        Self {
            light: 0.35,
            heavy: 0.9,
            grab: 1.2,
            dash: 1.5,
            dance: 0.25,
            ultimate: 5.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NpcTuning {
    pub proximity_threat_px: f64,
    pub dodge_trigger_px: f64,
    pub dodge_cooldown_secs: f64,
    pub beat_steal_threshold: u32,
    pub safe_landing_px: f64,
    pub probe_step_px: f64,
    pub probe_distance_px: f64,
    pub light_range_px: f64,
    pub heavy_range_px: f64,
    pub grab_range_px: f64,
    pub ultimate_range_px: f64,
    pub hold_range_px: f64,
    pub dash_distance_px: f64,
    pub dash_tap_window_ms: f64,
    pub arrive_px: f64,
    /// Weighted mix used in `TacticalDanceCombat`: light / heavy / dance.
    pub tactical_weights: [f64; 3],
    /// Chance per eligible frame to open with a dash attack when chasing.
    pub dash_chance: f64,
    /// Dance preference at the zone center and added at the zone edge.
    pub dance_base_preference: f64,
    pub dance_edge_bonus: f64,
    pub cooldowns: AttackCooldowns,
}

impl Default for NpcTuning {
    fn default() -> Self {
        Self {
            proximity_threat_px: 140.0,
            dodge_trigger_px: 180.0,
            dodge_cooldown_secs: 1.0,
            beat_steal_threshold: 4,
            safe_landing_px: 200.0,
            probe_step_px: 16.0,
            probe_distance_px: 64.0,
            light_range_px: 90.0,
            heavy_range_px: 120.0,
            grab_range_px: 70.0,
            ultimate_range_px: 160.0,
            hold_range_px: 110.0,
            dash_distance_px: 180.0,
            dash_tap_window_ms: 200.0,
            arrive_px: 24.0,
            tactical_weights: [0.45, 0.25, 0.30],
            dash_chance: 0.15,
            dance_base_preference: 0.45,
            dance_edge_bonus: 0.5,
            cooldowns: AttackCooldowns::default(),
        }
    }
}

impl NpcTuning {
    #[cfg(feature = "serde_json")]
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| AudioError::Config(e.to_string()))
    }
}
