//! Beat Brawl core crate.
//!
//! Runtime pieces of a 2D rhythm-fighting game that carry real timing logic:
//! the adaptive music mixer (`audio`), the music clock and beat windows
//! (`clock`), drift correction between audio time and wall time (`drift`), and
//! the opponent AI (`npc`) that reads stage geometry (`stage`) and emits the
//! same per-frame input intent as a human controller (`input`).
//!
//! Everything runs on the host's frame callback. Native builds use the
//! headless audio host; wasm32 builds add the browser host and a JS facade.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod audio;
pub mod clock;
pub mod config;
pub mod drift;
pub mod error;
pub mod input;
pub mod npc;
pub mod stage;

pub use audio::{AudioEngine, PlayOptions};
pub use drift::{BeatSync, DriftCorrector};
pub use error::{AudioError, Result};
pub use npc::{CombatSnapshot, NpcController, StrategyMode};

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

// -----------------------------------------------------------------------------
// Default track table: (id, source, loop, base volume)
// -----------------------------------------------------------------------------

pub const TRACKS: &[(&str, &str, bool, f64)] = &[
    ("MENU_LOOP", "assets/music/menu_loop.ogg", true, 0.4),
    ("PVP_STAGE", "assets/music/pvp_stage.ogg", true, 0.3),
    ("TUTORIAL", "assets/music/tutorial.ogg", true, 0.35),
    ("DANCE_BREAK", "assets/music/dance_break.ogg", true, 0.4),
    ("VICTORY", "assets/music/victory.ogg", false, 0.5),
];
