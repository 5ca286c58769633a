// Stage: Broken Bridge
// Two decks split by a 192px gap, with a floating platform over the gap.
use super::{Cell, Heatmap, StageDesc};
use std::sync::OnceLock;

fn build_bridge_heatmap() -> Heatmap {
    let mut map = Heatmap::new(60, 34, 16.0);
    map.fill_rect(0, 28, 24, 34, Cell::Ground); // x 0..384
    map.fill_rect(36, 28, 60, 34, Cell::Ground); // x 576..960
    // dance platform above the gap, surface at y = 320
    map.fill_rect(26, 20, 34, 21, Cell::Platform);
    map
}

pub fn bridge() -> &'static StageDesc {
    static SD: OnceLock<StageDesc> = OnceLock::new();
    SD.get_or_init(|| StageDesc {
        name: "Broken Bridge",
        bpm: 128.0,
        track: "PVP_STAGE",
        heatmap: build_bridge_heatmap(),
        spawn_points: &[(192.0, 448.0), (768.0, 448.0)],
        dance_spot: (480.0, 320.0, 64.0),
    })
}
