// Stage: Basement Club
// Wide dance floor with two raised side platforms.
use super::{Cell, Heatmap, StageDesc};
use std::sync::OnceLock;

fn build_club_heatmap() -> Heatmap {
    Heatmap::new(60, 34, 16.0)
        .with_rect(2, 28, 58, 34, Cell::Ground)
        .with_rect(10, 20, 20, 21, Cell::Platform)
        .with_rect(40, 20, 50, 21, Cell::Platform)
}

pub fn club() -> &'static StageDesc {
    static SD: OnceLock<StageDesc> = OnceLock::new();
    SD.get_or_init(|| StageDesc {
        name: "Basement Club",
        bpm: 132.0,
        track: "DANCE_BREAK",
        heatmap: build_club_heatmap(),
        spawn_points: &[(160.0, 448.0), (800.0, 448.0)],
        dance_spot: (480.0, 448.0, 96.0),
    })
}
