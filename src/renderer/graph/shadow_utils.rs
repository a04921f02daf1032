//! Shadow Utilities
//!
//! Pure math for shadow map rendering, kept out of the pass so it can be
//! tested on its own.
//!
//! - Directional lights: orthographic projection fitted to the scene bounds
//! - Spot lights: perspective projection covering the outer cone
//! - Omni lights: six 90° cube-face views

use glam::{Mat4, Vec3};

use crate::renderer::core::CubeFace;
use crate::resources::BoundingBox;
use crate::scene::light::{Light, SHADOW_NEAR};

/// A light-space view/projection pair plus its depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightProjection {
    pub view: Mat4,
    pub projection: Mat4,
    pub near: f32,
    pub far: f32,
}

impl LightProjection {
    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

fn safe_up(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.99 { Vec3::X } else { Vec3::Y }
}

// ============================================================================
// Directional
// ============================================================================

/// Orthographic light projection enclosing `scene_bounds`.
///
/// The light is placed on the bounding sphere of the scene, looking along
/// `direction`, so every caster inside the bounds lands in the map.
#[must_use]
pub fn directional_projection(direction: Vec3, scene_bounds: &BoundingBox) -> LightProjection {
    let dir = direction.normalize_or(Vec3::NEG_Y);
    let center = scene_bounds.center();
    let radius = (scene_bounds.size().length() * 0.5).max(1e-3);

    let eye = center - dir * radius;
    let view = Mat4::look_at_rh(eye, center, safe_up(dir));
    let far = radius * 2.0;
    let projection = Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.0, far);

    LightProjection {
        view,
        projection,
        near: 0.0,
        far,
    }
}

// ============================================================================
// Spot
// ============================================================================

/// Perspective light projection whose field of view is twice the outer cone angle.
#[must_use]
pub fn spot_projection(light: &Light) -> LightProjection {
    let dir = light.direction.normalize_or(Vec3::NEG_Z);
    let view = Mat4::look_at_rh(light.position, light.position + dir, safe_up(dir));
    let fov = (light.outer_angle() * 2.0).clamp(0.1, std::f32::consts::PI - 0.01);
    let near = SHADOW_NEAR;
    let far = light.range.max(near + 1e-3);

    LightProjection {
        view,
        projection: Mat4::perspective_rh(fov, 1.0, near, far),
        near,
        far,
    }
}

// ============================================================================
// Omni
// ============================================================================

/// Look direction and up vector of a cube face.
#[must_use]
pub fn cube_face_basis(face: CubeFace) -> (Vec3, Vec3) {
    match face {
        CubeFace::PositiveX => (Vec3::X, Vec3::NEG_Y),
        CubeFace::NegativeX => (Vec3::NEG_X, Vec3::NEG_Y),
        CubeFace::PositiveY => (Vec3::Y, Vec3::Z),
        CubeFace::NegativeY => (Vec3::NEG_Y, Vec3::NEG_Z),
        CubeFace::PositiveZ => (Vec3::Z, Vec3::NEG_Y),
        CubeFace::NegativeZ => (Vec3::NEG_Z, Vec3::NEG_Y),
    }
}

/// 90° square projection shared by the six faces of an omni shadow map.
#[must_use]
pub fn omni_projection(light: &Light) -> LightProjection {
    let near = SHADOW_NEAR;
    let far = light.range.max(near + 1e-3);
    LightProjection {
        view: Mat4::IDENTITY,
        projection: Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, near, far),
        near,
        far,
    }
}

/// View matrix of one cube face centred on `position`.
#[must_use]
pub fn omni_face_view(position: Vec3, face: CubeFace) -> Mat4 {
    let (forward, up) = cube_face_basis(face);
    Mat4::look_at_rh(position, position + forward, up)
}
