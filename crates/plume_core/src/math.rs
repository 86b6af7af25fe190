//! Math types stored in particle data sets
//!
//! Re-exports the glam vectors used for attributes and adds a linear color.

use bytemuck::{Pod, Zeroable};

pub use glam::{Vec2, Vec3, Vec4};

/// Linear-space RGBA color, four packed `f32` channels.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LinearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl LinearColor {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<Vec4> for LinearColor {
    fn from(v: Vec4) -> Self {
        Self::new(v.x, v.y, v.z, v.w)
    }
}

impl From<LinearColor> for Vec4 {
    fn from(c: LinearColor) -> Self {
        Vec4::new(c.r, c.g, c.b, c.a)
    }
}
