//! Per-frame light batch and the bounded forward light list.

use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use log::trace;
use smallvec::SmallVec;

use crate::resources::BoundingBox;
use crate::scene::{Frustum, Light, LightHandle, LightKind, LightRegistry};

/// Number of distinct stencil effect IDs (`1..=126`, never `0`).
pub const EFFECT_ID_COUNT: usize = 127;

/// Maximum lights shading one forward draw call.
pub const FORWARD_LIGHT_CAPACITY: usize = 8;

/// Stencil effect ID of the light at `index` in the frame batch.
///
/// IDs repeat after 126 lights; `0` is skipped because it is the cleared value.
#[inline]
#[must_use]
pub fn effect_id(index: usize) -> u32 {
    match (index + 1) % EFFECT_ID_COUNT {
        0 => 1,
        id => id as u32,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchedLight {
    pub handle: LightHandle,
    pub aabb: BoundingBox,
}

/// Lights that contribute to the current frame, in registry order.
#[derive(Debug, Default)]
pub struct FrameLightBatch {
    lights: Vec<BatchedLight>,
}

impl FrameLightBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the batch from the enabled lights of `registry`.
    ///
    /// Shadowed lights evaluate their update policy with the frame `delta`.
    /// Directional lights are always kept; the others must touch `frustum`.
    pub fn build(&mut self, registry: &mut LightRegistry, frustum: &Frustum, delta: Duration) {
        self.lights.clear();

        for (handle, light) in registry.iter_mut() {
            if !light.enabled {
                continue;
            }
            if let Some(shadow) = light.shadow_mut() {
                shadow.process_update(delta);
            }

            let aabb = light.bounding_box();
            if light.kind != LightKind::Directional && !frustum.intersects_aabb(&aabb) {
                trace!("light {handle:?} outside the view frustum");
                continue;
            }
            self.lights.push(BatchedLight { handle, aabb });
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[BatchedLight] {
        &self.lights
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchedLight> {
        self.lights.iter()
    }

    /// Batched lights paired with their live registry entry.
    pub fn resolve<'a>(&'a self, registry: &'a LightRegistry) -> impl Iterator<Item = (usize, &'a BatchedLight, &'a Light)> {
        self.lights
            .iter()
            .enumerate()
            .filter_map(|(i, b)| registry.get(b.handle).map(|light| (i, b, light)))
    }
}

// ============================================================================
// Forward light list
// ============================================================================

/// GPU layout of one forward light slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuForwardLight {
    pub view_projection: [[f32; 4]; 4],
    pub color: [f32; 3],
    pub energy: f32,
    pub position: [f32; 3],
    pub specular: f32,
    pub direction: [f32; 3],
    pub range: f32,
    pub attenuation: f32,
    pub inner_cutoff: f32,
    pub outer_cutoff: f32,
    pub kind: i32,
    pub shadow: i32,
    pub shadow_softness: f32,
    pub shadow_bias: f32,
    pub shadow_texel_size: f32,
    pub near: f32,
    pub far: f32,
    pub _pad: [f32; 2],
}

impl GpuForwardLight {
    #[must_use]
    pub fn from_light(light: &Light) -> Self {
        let mut gpu = Self {
            color: light.color.to_array(),
            energy: light.energy,
            specular: light.specular,
            kind: light.kind.shader_index(),
            ..Zeroable::zeroed()
        };

        match light.kind {
            LightKind::Directional => {
                gpu.direction = light.direction.to_array();
                gpu.position = light.position.to_array();
            }
            LightKind::Spot => {
                gpu.position = light.position.to_array();
                gpu.direction = light.direction.to_array();
                gpu.range = light.range;
                gpu.attenuation = light.attenuation;
                gpu.inner_cutoff = light.inner_cutoff;
                gpu.outer_cutoff = light.outer_cutoff;
            }
            LightKind::Omni => {
                gpu.position = light.position.to_array();
                gpu.range = light.range;
                gpu.attenuation = light.attenuation;
            }
        }

        if let Some(shadow) = light.shadow() {
            gpu.shadow = 1;
            gpu.view_projection = shadow.view_projection().to_cols_array_2d();
            gpu.shadow_texel_size = shadow.map.texel_size();
            gpu.shadow_softness = shadow.softness;
            gpu.shadow_bias = shadow.bias;
            gpu.near = light.near;
            gpu.far = light.far;
        }

        gpu
    }
}

/// Lights selected for one forward draw call, never more than the capacity.
#[derive(Debug, Default)]
pub struct ForwardLightList<'a> {
    lights: SmallVec<[&'a Light; FORWARD_LIGHT_CAPACITY]>,
}

impl<'a> ForwardLightList<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lights: SmallVec::new(),
        }
    }

    /// Adds `light` if there is room. Returns `false` once full.
    pub fn push(&mut self, light: &'a Light) -> bool {
        if self.lights.len() >= FORWARD_LIGHT_CAPACITY {
            return false;
        }
        self.lights.push(light);
        true
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.lights.len() >= FORWARD_LIGHT_CAPACITY
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Light> + '_ {
        self.lights.iter().copied()
    }

    /// Packed slots for the active lights only.
    #[must_use]
    pub fn to_gpu(&self) -> SmallVec<[GpuForwardLight; FORWARD_LIGHT_CAPACITY]> {
        self.lights.iter().map(|l| GpuForwardLight::from_light(l)).collect()
    }
}

/// Whether a sprite quad is lit by a light with bounds `light_aabb`.
#[must_use]
pub fn quad_touches_light(quad: &[Vec3; 4], light_aabb: &BoundingBox) -> bool {
    quad.iter().any(|corner| light_aabb.contains_point(*corner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_ids_skip_zero() {
        assert_eq!(effect_id(0), 1);
        assert_eq!(effect_id(125), 126);
        assert_eq!(effect_id(126), 1);
        assert_eq!(effect_id(127), 1);
        assert_eq!(effect_id(128), 2);
    }

    #[test]
    fn gpu_light_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<GpuForwardLight>(), 160);
    }

    #[test]
    fn forward_list_stops_at_capacity() {
        let light = Light::new(LightKind::Omni);
        let mut list = ForwardLightList::new();
        for _ in 0..FORWARD_LIGHT_CAPACITY {
            assert!(list.push(&light));
        }
        assert!(!list.push(&light));
        assert_eq!(list.to_gpu().len(), FORWARD_LIGHT_CAPACITY);
    }
}
