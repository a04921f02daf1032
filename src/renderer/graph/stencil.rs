//! Stencil budget of the deferred path.
//!
//! One 8-bit stencil value per pixel is split in two:
//! - bit `0x80` marks pixels covered by scene geometry
//! - bits `0x7F` hold the effect ID of the light volume being accumulated
//!
//! Masks keep the halves independent so stamping a light volume never
//! clears the geometry bit and vice versa.

use wgpu::{CompareFunction, StencilFaceState, StencilOperation};

use crate::renderer::core::StencilSetup;

pub const GEOMETRY_BIT: u32 = 0x80;
pub const EFFECT_MASK: u32 = 0x7F;

fn setup(compare: CompareFunction, pass_op: StencilOperation, read: u32, write: u32, reference: u32) -> StencilSetup {
    StencilSetup {
        face: StencilFaceState {
            compare,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op,
        },
        read_mask: read,
        write_mask: write,
        reference,
    }
}

/// Marks every rasterized pixel as geometry.
#[must_use]
pub fn geometry_write() -> StencilSetup {
    setup(CompareFunction::Always, StencilOperation::Replace, 0xFF, GEOMETRY_BIT, GEOMETRY_BIT)
}

/// Passes only where geometry was drawn.
#[must_use]
pub fn geometry_test() -> StencilSetup {
    setup(CompareFunction::Equal, StencilOperation::Keep, GEOMETRY_BIT, 0x00, GEOMETRY_BIT)
}

/// Stamps `effect` into the effect bits.
#[must_use]
pub fn effect_write(effect: u32) -> StencilSetup {
    setup(CompareFunction::Always, StencilOperation::Replace, 0xFF, EFFECT_MASK, effect & EFFECT_MASK)
}

/// Stamps `effect`, but only over geometry.
#[must_use]
pub fn effect_write_on_geometry(effect: u32) -> StencilSetup {
    setup(
        CompareFunction::Equal,
        StencilOperation::Replace,
        GEOMETRY_BIT,
        EFFECT_MASK,
        GEOMETRY_BIT | (effect & EFFECT_MASK),
    )
}

/// Passes where the effect bits equal `effect`.
#[must_use]
pub fn effect_test(effect: u32) -> StencilSetup {
    setup(CompareFunction::Equal, StencilOperation::Keep, EFFECT_MASK, 0x00, effect & EFFECT_MASK)
}
