//! Sprite vertex extraction from the current buffer

use bytemuck::{Pod, Zeroable};
use plume_core::data::{DataSet, DataSetIterator, Variable};
use plume_core::math::{LinearColor, Vec3};
use rayon::prelude::*;

/// Instances per rayon task.
const MIN_BATCH: usize = 256;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 4],
}

/// One vertex per live particle. A data set without `Position` has nothing
/// to draw; `Color` is optional and defaults to white.
pub fn extract_sprites(data_set: &DataSet, size: f32) -> Vec<SpriteVertex> {
    let positions = DataSetIterator::<Vec3>::named(data_set, "Position");
    if !positions.is_valid() {
        return Vec::new();
    }
    let colors = data_set
        .has_variable(&Variable::color("Color"))
        .then(|| DataSetIterator::<LinearColor>::named(data_set, "Color"));

    (0..positions.num_instances())
        .into_par_iter()
        .with_min_len(MIN_BATCH)
        .map(|i| SpriteVertex {
            position: positions.get_at(i).to_array(),
            size,
            color: colors
                .as_ref()
                .map_or(LinearColor::WHITE, |c| c.get_at(i))
                .to_array(),
        })
        .collect()
}
