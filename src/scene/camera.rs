//! Camera value type and the per-frame camera state derived from it.

use glam::{Mat4, Vec3, Vec4};

use crate::resources::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionType {
    #[default]
    Perspective,
    /// `fovy` is the full height of the view volume in world units.
    Orthographic,
}

/// Camera description supplied to `begin`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees, or view height for orthographic.
    pub fovy: f32,
    pub projection: ProjectionType,
}

impl Camera {
    #[must_use]
    pub fn perspective(position: Vec3, target: Vec3, fovy_degrees: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fovy: fovy_degrees,
            projection: ProjectionType::Perspective,
        }
    }

    #[must_use]
    pub fn orthographic(position: Vec3, target: Vec3, height: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fovy: height,
            projection: ProjectionType::Orthographic,
        }
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Projection for the given aspect ratio and clip planes (depth in `[0, 1]`).
    #[must_use]
    pub fn projection_matrix(&self, aspect: f32, near: f32, far: f32) -> Mat4 {
        match self.projection {
            ProjectionType::Perspective => {
                let top = near * (self.fovy.to_radians() * 0.5).tan();
                let right = top * aspect;
                frustum_rh(-right, right, -top, top, near, far)
            }
            ProjectionType::Orthographic => {
                let top = self.fovy * 0.5;
                let right = top * aspect;
                Mat4::orthographic_rh(-right, right, -top, top, near, far)
            }
        }
    }
}

/// Off-centre perspective frustum, right-handed, depth mapped to `[0, 1]`.
#[must_use]
pub fn frustum_rh(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let rl = right - left;
    let tb = top - bottom;
    let fn_ = far - near;
    Mat4::from_cols(
        Vec4::new(2.0 * near / rl, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / tb, 0.0, 0.0),
        Vec4::new((right + left) / rl, (top + bottom) / tb, -far / fn_, -1.0),
        Vec4::new(0.0, 0.0, -far * near / fn_, 0.0),
    )
}

// ============================================================================
// Frame camera
// ============================================================================

/// Camera matrices and culling volumes for the frame being built.
///
/// Computed once in `begin` and read-only afterwards.
#[derive(Debug, Clone, Copy)]
pub struct FrameCamera {
    pub view: Mat4,
    pub inv_view: Mat4,
    pub projection: Mat4,
    pub inv_projection: Mat4,
    pub view_projection: Mat4,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
    pub frustum: Frustum,
    /// Conservative world-space bounds of the view volume.
    pub aabb: BoundingBox,
}

impl FrameCamera {
    #[must_use]
    pub fn new(camera: &Camera, aspect: f32, near: f32, far: f32) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix(aspect, near, far);
        let view_projection = projection * view;
        let inv_view_projection = view_projection.inverse();

        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let ndc = Vec3::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { 0.0 } else { 1.0 },
            );
            *corner = inv_view_projection.project_point3(ndc);
        }

        Self {
            view,
            inv_view: view.inverse(),
            projection,
            inv_projection: projection.inverse(),
            view_projection,
            position: camera.position,
            near,
            far,
            frustum: Frustum::from_matrix(view_projection),
            aabb: BoundingBox::from_points(&corners),
        }
    }
}

impl Default for FrameCamera {
    fn default() -> Self {
        Self::new(
            &Camera::perspective(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 60.0),
            1.0,
            0.05,
            4000.0,
        )
    }
}

// ============================================================================
// Frustum
// ============================================================================

/// Six inward-facing planes `(n, d)` with `n·p + d >= 0` inside.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6], // Left, Right, Bottom, Top, Near, Far
}

impl Frustum {
    /// Gribb-Hartmann extraction for a `[0, 1]` depth range.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0],
            rows[3] - rows[0],
            rows[3] + rows[1],
            rows[3] - rows[1],
            rows[2],
            rows[3] - rows[2],
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > 0.0 {
                *plane /= length;
            }
        }

        Self { planes }
    }

    /// Conservative box test: rejects only boxes fully behind one plane.
    #[must_use]
    pub fn intersects_aabb(&self, aabb: &BoundingBox) -> bool {
        if !aabb.is_finite() {
            return true;
        }
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            let positive = Vec3::select(normal.cmpge(Vec3::ZERO), aabb.max, aabb.min);
            normal.dot(positive) + plane.w >= 0.0
        })
    }
}
