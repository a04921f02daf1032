//! Scene lights and the generation-tagged registry that owns them.
//!
//! Lights persist across frames and are addressed by [`LightHandle`]. A handle
//! whose light was destroyed is stale: setters log a warning and do nothing,
//! getters return `None`.

use std::time::Duration;

use glam::{Mat4, Vec3};
use log::warn;
use slotmap::{SlotMap, new_key_type};

use crate::errors::{RenderError, Result};
use crate::renderer::core::{FramebufferId, TextureId};
use crate::resources::BoundingBox;

new_key_type! {
    /// Generation-tagged handle to a registered light.
    pub struct LightHandle;
}

/// Near plane used for spot and omni shadow projections.
pub const SHADOW_NEAR: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Spot,
    Omni,
}

impl LightKind {
    /// Integer tag uploaded with the light uniforms.
    #[must_use]
    pub fn shader_index(self) -> i32 {
        self as i32
    }
}

// ============================================================================
// Shadows
// ============================================================================

/// When a shadow map is re-rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowUpdate {
    /// Every frame.
    #[default]
    Continuous,
    /// At most once per period of frame time.
    Interval(Duration),
    /// Only after [`Shadow::request_update`].
    Manual,
}

/// Depth target a light renders its shadow into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMap {
    pub resolution: u32,
    /// 2D depth texture, or a depth cube map for omni lights.
    pub texture: TextureId,
    pub framebuffer: FramebufferId,
}

impl ShadowMap {
    #[inline]
    #[must_use]
    pub fn texel_size(&self) -> f32 {
        1.0 / self.resolution.max(1) as f32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shadow {
    pub map: ShadowMap,
    pub update: ShadowUpdate,
    /// Filter radius in shadow-map texels.
    pub softness: f32,
    pub bias: f32,
    /// Light view-projection of the last rendered map (directional / spot).
    pub(crate) view_projection: Mat4,
    pub(crate) timer: Duration,
    pub(crate) should_update: bool,
}

impl Shadow {
    pub(crate) fn new(kind: LightKind, map: ShadowMap) -> Self {
        let bias = match kind {
            LightKind::Directional => 0.0002,
            LightKind::Spot => 0.00002,
            LightKind::Omni => 0.05,
        };
        Self {
            map,
            update: ShadowUpdate::Continuous,
            softness: 1.0,
            bias,
            view_projection: Mat4::IDENTITY,
            timer: Duration::ZERO,
            should_update: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    /// Whether the map is rendered this frame.
    #[inline]
    #[must_use]
    pub fn should_update(&self) -> bool {
        self.should_update
    }

    /// Arms a re-render on the next frame (any update policy).
    pub fn request_update(&mut self) {
        self.should_update = true;
    }

    pub fn set_update(&mut self, update: ShadowUpdate) {
        self.update = update;
        self.timer = Duration::ZERO;
        self.should_update = true;
    }

    /// Evaluates the update policy for a frame that took `delta`.
    pub(crate) fn process_update(&mut self, delta: Duration) {
        match self.update {
            ShadowUpdate::Continuous => self.should_update = true,
            ShadowUpdate::Interval(period) => {
                self.timer += delta;
                if self.timer >= period {
                    self.timer = self.timer.checked_sub(period).unwrap_or_default();
                    self.should_update = true;
                }
            }
            ShadowUpdate::Manual => {}
        }
    }

    /// Consumes the pending update once the map has been rendered.
    pub(crate) fn mark_rendered(&mut self) {
        if self.update != ShadowUpdate::Continuous {
            self.should_update = false;
        }
    }
}

// ============================================================================
// Light
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub enabled: bool,
    pub position: Vec3,
    /// Normalized direction the light shines along (directional / spot).
    pub direction: Vec3,
    pub color: Vec3,
    pub energy: f32,
    pub specular: f32,
    pub range: f32,
    pub attenuation: f32,
    /// Cosine of the inner cone angle.
    pub inner_cutoff: f32,
    /// Cosine of the outer cone angle.
    pub outer_cutoff: f32,
    /// Depth range used when sampling the shadow map.
    pub near: f32,
    pub far: f32,
    pub(crate) shadow: Option<Shadow>,
}

impl Light {
    #[must_use]
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            enabled: false,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            color: Vec3::ONE,
            energy: 1.0,
            specular: 0.5,
            range: 100.0,
            attenuation: 1.0,
            inner_cutoff: 22.5_f32.to_radians().cos(),
            outer_cutoff: 45.0_f32.to_radians().cos(),
            near: SHADOW_NEAR,
            far: 100.0,
            shadow: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn shadow(&self) -> Option<&Shadow> {
        self.shadow.as_ref()
    }

    #[inline]
    pub fn shadow_mut(&mut self) -> Option<&mut Shadow> {
        self.shadow.as_mut()
    }

    #[inline]
    #[must_use]
    pub fn casts_shadows(&self) -> bool {
        self.shadow.is_some()
    }

    pub fn set_range(&mut self, range: f32) {
        self.range = range.max(0.0);
        if self.kind != LightKind::Directional {
            self.far = self.range.max(self.near + 1e-3);
        }
    }

    /// Sets the spot cone from angles in degrees; stored as cosines.
    pub fn set_cutoffs(&mut self, inner_degrees: f32, outer_degrees: f32) {
        let outer = outer_degrees.clamp(0.0, 89.9);
        let inner = inner_degrees.clamp(0.0, outer);
        self.inner_cutoff = inner.to_radians().cos();
        self.outer_cutoff = outer.to_radians().cos();
    }

    /// Outer cone half-angle in radians.
    #[must_use]
    pub fn outer_angle(&self) -> f32 {
        self.outer_cutoff.clamp(-1.0, 1.0).acos()
    }

    /// Places the light at `position` and aims it at `target`.
    pub fn look_at(&mut self, position: Vec3, target: Vec3) {
        self.position = position;
        let dir = target - position;
        if dir.length_squared() > 1e-12 {
            self.direction = dir.normalize();
        }
    }

    /// World-space volume the light can affect.
    ///
    /// Directional lights are unbounded.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        match self.kind {
            LightKind::Directional => BoundingBox::INFINITE,
            LightKind::Omni => {
                BoundingBox::from_center_half_extents(self.position, Vec3::splat(self.range))
            }
            LightKind::Spot => {
                let dir = self.direction.normalize_or(Vec3::NEG_Z);
                let base = self.position + dir * self.range;
                let radius = self.range * self.outer_angle().tan();
                // Extent of the base disc along each world axis.
                let disc = (Vec3::ONE - dir * dir).max(Vec3::ZERO);
                let half = Vec3::new(disc.x.sqrt(), disc.y.sqrt(), disc.z.sqrt()) * radius;
                BoundingBox::from_center_half_extents(base, half)
                    .union(&BoundingBox::new(self.position, self.position))
            }
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Owns every light; iteration order is stable while no light is added or removed.
#[derive(Debug, Default)]
pub struct LightRegistry {
    lights: SlotMap<LightHandle, Light>,
}

impl LightRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a disabled light without shadows.
    pub fn create(&mut self, kind: LightKind) -> LightHandle {
        self.lights.insert(Light::new(kind))
    }

    /// Removes a light, returning it so the caller can release its shadow map.
    pub fn remove(&mut self, handle: LightHandle) -> Option<Light> {
        let light = self.lights.remove(handle);
        if light.is_none() {
            warn!("remove: light {handle:?} is not alive");
        }
        light
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: LightHandle) -> bool {
        self.lights.contains_key(handle)
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
    pub fn get(&self, handle: LightHandle) -> Option<&Light> {
        self.lights.get(handle)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: LightHandle) -> Option<&mut Light> {
        self.lights.get_mut(handle)
    }

    pub fn try_get_mut(&mut self, handle: LightHandle) -> Result<&mut Light> {
        self.lights
            .get_mut(handle)
            .ok_or_else(|| RenderError::StaleLight(format!("{handle:?}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (LightHandle, &Light)> {
        self.lights.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (LightHandle, &mut Light)> {
        self.lights.iter_mut()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (LightHandle, Light)> + '_ {
        self.lights.drain()
    }

    fn modify(&mut self, handle: LightHandle, op: &str, f: impl FnOnce(&mut Light)) {
        match self.try_get_mut(handle) {
            Ok(light) => f(light),
            Err(err) => warn!("{op}: {err}"),
        }
    }

    // --- Setters ---

    pub fn set_enabled(&mut self, handle: LightHandle, enabled: bool) {
        self.modify(handle, "set_enabled", |l| l.enabled = enabled);
    }

    pub fn set_position(&mut self, handle: LightHandle, position: Vec3) {
        self.modify(handle, "set_position", |l| l.position = position);
    }

    pub fn set_direction(&mut self, handle: LightHandle, direction: Vec3) {
        self.modify(handle, "set_direction", |l| {
            l.direction = direction.normalize_or(l.direction);
        });
    }

    pub fn set_color(&mut self, handle: LightHandle, color: Vec3) {
        self.modify(handle, "set_color", |l| l.color = color);
    }

    pub fn set_energy(&mut self, handle: LightHandle, energy: f32) {
        self.modify(handle, "set_energy", |l| l.energy = energy);
    }

    pub fn set_specular(&mut self, handle: LightHandle, specular: f32) {
        self.modify(handle, "set_specular", |l| l.specular = specular);
    }

    pub fn set_range(&mut self, handle: LightHandle, range: f32) {
        self.modify(handle, "set_range", |l| l.set_range(range));
    }

    pub fn set_attenuation(&mut self, handle: LightHandle, attenuation: f32) {
        self.modify(handle, "set_attenuation", |l| l.attenuation = attenuation);
    }

    pub fn set_cutoffs(&mut self, handle: LightHandle, inner_degrees: f32, outer_degrees: f32) {
        self.modify(handle, "set_cutoffs", |l| {
            l.set_cutoffs(inner_degrees, outer_degrees);
        });
    }

    pub fn look_at(&mut self, handle: LightHandle, position: Vec3, target: Vec3) {
        self.modify(handle, "look_at", |l| l.look_at(position, target));
    }

    pub fn set_shadow_update(&mut self, handle: LightHandle, update: ShadowUpdate) {
        self.modify(handle, "set_shadow_update", |l| match l.shadow_mut() {
            Some(shadow) => shadow.set_update(update),
            None => warn!("set_shadow_update: light {handle:?} has no shadow map"),
        });
    }

    pub fn set_shadow_bias(&mut self, handle: LightHandle, bias: f32) {
        self.modify(handle, "set_shadow_bias", |l| {
            if let Some(shadow) = l.shadow_mut() {
                shadow.bias = bias;
            }
        });
    }

    pub fn set_shadow_softness(&mut self, handle: LightHandle, softness: f32) {
        self.modify(handle, "set_shadow_softness", |l| {
            if let Some(shadow) = l.shadow_mut() {
                shadow.softness = softness.max(0.0);
            }
        });
    }

    /// Arms a re-render of the light's shadow map on the next frame.
    pub fn update_shadow_map(&mut self, handle: LightHandle) {
        self.modify(handle, "update_shadow_map", |l| {
            if let Some(shadow) = l.shadow_mut() {
                shadow.request_update();
            }
        });
    }

    // --- Getters ---

    #[must_use]
    pub fn position(&self, handle: LightHandle) -> Option<Vec3> {
        self.get(handle).map(|l| l.position)
    }

    #[must_use]
    pub fn direction(&self, handle: LightHandle) -> Option<Vec3> {
        self.get(handle).map(|l| l.direction)
    }

    #[must_use]
    pub fn color(&self, handle: LightHandle) -> Option<Vec3> {
        self.get(handle).map(|l| l.color)
    }

    #[must_use]
    pub fn energy(&self, handle: LightHandle) -> Option<f32> {
        self.get(handle).map(|l| l.energy)
    }

    #[must_use]
    pub fn range(&self, handle: LightHandle) -> Option<f32> {
        self.get(handle).map(|l| l.range)
    }

    #[must_use]
    pub fn is_enabled(&self, handle: LightHandle) -> Option<bool> {
        self.get(handle).map(|l| l.enabled)
    }

    #[must_use]
    pub fn kind(&self, handle: LightHandle) -> Option<LightKind> {
        self.get(handle).map(|l| l.kind)
    }
}
