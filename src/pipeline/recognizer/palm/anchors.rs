use std::sync::LazyLock;

use super::super::common::PALM_INPUT_SIZE;

/// Feature map strides of the palm detector's four SSD layers. Consecutive
/// layers with the same stride share one grid.
const STRIDES: [u32; 4] = [8, 16, 16, 16];
const ANCHORS_PER_LAYER: usize = 2;
const ANCHOR_OFFSET: f32 = 0.5;

pub const NUM_ANCHORS: usize = 2016;

/// Anchor centers `[x, y]` in normalized input coordinates. Anchor sizes are
/// fixed at 1.0 for this model, so only the centers are kept.
pub static ANCHORS: LazyLock<Vec<[f32; 2]>> =
    LazyLock::new(|| generate_anchors(PALM_INPUT_SIZE));

pub fn generate_anchors(input_size: u32) -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    let mut layer = 0;
    while layer < STRIDES.len() {
        let stride = STRIDES[layer];
        let mut repeats = 0;
        while layer < STRIDES.len() && STRIDES[layer] == stride {
            repeats += 1;
            layer += 1;
        }

        let grid = input_size.div_ceil(stride);
        let per_cell = repeats * ANCHORS_PER_LAYER;
        for y in 0..grid {
            let cy = (y as f32 + ANCHOR_OFFSET) / grid as f32;
            for x in 0..grid {
                let cx = (x as f32 + ANCHOR_OFFSET) / grid as f32;
                for _ in 0..per_cell {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}
