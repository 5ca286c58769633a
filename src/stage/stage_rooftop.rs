// Stage: Neon Rooftop
// One flat roof with open drops on both sides.
use super::{Cell, Heatmap, StageDesc};
use std::sync::OnceLock;

fn build_rooftop_heatmap() -> Heatmap {
    // 60x34 cells of 16px; roof surface at y = 448 spanning x 96..864
    Heatmap::new(60, 34, 16.0).with_rect(6, 28, 54, 34, Cell::Ground)
}

pub fn rooftop() -> &'static StageDesc {
    static SD: OnceLock<StageDesc> = OnceLock::new();
    SD.get_or_init(|| StageDesc {
        name: "Neon Rooftop",
        bpm: 120.0,
        track: "PVP_STAGE",
        heatmap: build_rooftop_heatmap(),
        spawn_points: &[(256.0, 448.0), (704.0, 448.0)],
        dance_spot: (480.0, 448.0, 80.0),
    })
}
