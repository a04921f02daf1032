//! Screen-space projection of points and light volumes.
//!
//! The lighting pass scissors each light to the rectangle spanned by the
//! projected corners of its bounding box. That box is the proxy stamped into
//! the stencil, so the rectangle always contains the stamp. A corner behind
//! the camera widens the rectangle to the full screen.

use glam::{Mat4, Vec2, Vec3};

use crate::renderer::core::Rect;
use crate::resources::BoundingBox;

/// A world point mapped to pixel coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub position: Vec2,
    pub in_viewport: bool,
    /// Behind the camera (`w <= 0`); `position` is meaningless.
    pub out_near: bool,
    /// Beyond the far plane.
    pub out_far: bool,
}

#[must_use]
pub fn project_point(point: Vec3, view_projection: &Mat4, width: u32, height: u32) -> ProjectedPoint {
    let clip = *view_projection * point.extend(1.0);
    let out_near = clip.w <= 0.0;
    let out_far = clip.z > clip.w;

    let inv_w = 1.0 / clip.w;
    let ndc = Vec2::new(clip.x * inv_w, clip.y * inv_w);
    let in_viewport = (-1.0..=1.0).contains(&ndc.x) && (-1.0..=1.0).contains(&ndc.y);

    ProjectedPoint {
        position: Vec2::new(
            (ndc.x + 1.0) * 0.5 * width as f32,
            (1.0 - (ndc.y + 1.0) * 0.5) * height as f32,
        ),
        in_viewport,
        out_near,
        out_far,
    }
}

/// Screen footprint of a light volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightFootprint {
    pub rect: Rect,
    pub visible: bool,
    pub covers_screen: bool,
}

impl LightFootprint {
    #[must_use]
    pub fn full_screen(width: u32, height: u32) -> Self {
        Self {
            rect: Rect::from_size(width, height),
            visible: true,
            covers_screen: true,
        }
    }
}

/// Accumulates projected samples into a clamped pixel rectangle.
struct RectBuilder {
    min: Vec2,
    max: Vec2,
    width: u32,
    height: u32,
}

impl RectBuilder {
    fn new(width: u32, height: u32) -> Self {
        Self {
            min: Vec2::splat(f32::MAX),
            max: Vec2::splat(-f32::MAX),
            width,
            height,
        }
    }

    fn screen(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    fn expand_to_screen(&mut self) {
        self.min = self.min.min(Vec2::ZERO);
        self.max = self.max.max(self.screen());
    }

    fn add(&mut self, point: Vec3, view_projection: &Mat4) {
        let p = project_point(point, view_projection, self.width, self.height);
        if p.out_near {
            self.expand_to_screen();
        } else {
            self.min = self.min.min(p.position);
            self.max = self.max.max(p.position);
        }
    }

    fn finish(self) -> LightFootprint {
        let screen = self.screen();
        let min = self.min.max(Vec2::ZERO);
        let max = self.max.min(screen);
        let visible = max.x > min.x && max.y > min.y;
        if !visible {
            return LightFootprint {
                rect: Rect::default(),
                visible: false,
                covers_screen: false,
            };
        }
        let x0 = min.x.floor();
        let y0 = min.y.floor();
        LightFootprint {
            rect: Rect {
                x: x0 as i32,
                y: y0 as i32,
                width: (max.x.ceil() - x0) as u32,
                height: (max.y.ceil() - y0) as u32,
            },
            visible: true,
            covers_screen: min.cmple(Vec2::ZERO).all() && max.cmpge(screen).all(),
        }
    }
}

/// Pixel rectangle covered by the eight corners of `aabb`.
#[must_use]
pub fn project_aabb_rect(aabb: &BoundingBox, view_projection: &Mat4, width: u32, height: u32) -> LightFootprint {
    if !aabb.is_finite() {
        return LightFootprint::full_screen(width, height);
    }
    let mut builder = RectBuilder::new(width, height);
    for i in 0..8 {
        let corner = Vec3::new(
            if i & 1 == 0 { aabb.min.x } else { aabb.max.x },
            if i & 2 == 0 { aabb.min.y } else { aabb.max.y },
            if i & 4 == 0 { aabb.min.z } else { aabb.max.z },
        );
        builder.add(corner, view_projection);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_vp() -> Mat4 {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        proj * view
    }

    #[test]
    fn origin_projects_to_screen_center() {
        let p = project_point(Vec3::ZERO, &camera_vp(), 200, 100);
        assert!(p.in_viewport && !p.out_near && !p.out_far);
        assert!((p.position - Vec2::new(100.0, 50.0)).length() < 1e-3);
    }

    #[test]
    fn point_behind_camera_is_out_near() {
        let p = project_point(Vec3::new(0.0, 0.0, 20.0), &camera_vp(), 100, 100);
        assert!(p.out_near);
    }

    /// Camera at the origin looking down -Z with a 90 degree square frustum.
    fn origin_vp() -> Mat4 {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(90f32.to_radians(), 1.0, 0.1, 100.0);
        proj * view
    }

    fn rect_contains(rect: Rect, p: Vec2) -> bool {
        p.x >= rect.x as f32
            && p.y >= rect.y as f32
            && p.x <= (rect.x + rect.width as i32) as f32
            && p.y <= (rect.y + rect.height as i32) as f32
    }

    #[test]
    fn small_box_has_partial_footprint() {
        let aabb = BoundingBox::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5));
        let fp = project_aabb_rect(&aabb, &camera_vp(), 100, 100);
        assert!(fp.visible);
        assert!(!fp.covers_screen);
        assert!(fp.rect.width < 100 && fp.rect.height < 100);
    }

    #[test]
    fn sphere_silhouette_stays_inside_box_rect() {
        let vp = origin_vp();
        let (w, h) = (1000, 1000);
        let center = Vec3::new(4.0, 0.0, -5.0);
        let radius = 3.0;
        let aabb = BoundingBox::from_center_half_extents(center, Vec3::splat(radius));
        let fp = project_aabb_rect(&aabb, &vp, w, h);
        assert!(fp.visible && !fp.covers_screen);

        let screen = Vec2::new(w as f32, h as f32);
        for i in 0..=64 {
            let theta = i as f32 / 64.0 * std::f32::consts::PI;
            for j in 0..256 {
                let phi = j as f32 / 256.0 * std::f32::consts::TAU;
                let normal = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
                let p = project_point(center + normal * radius, &vp, w, h);
                assert!(!p.out_near);
                let clamped = p.position.clamp(Vec2::ZERO, screen);
                assert!(
                    rect_contains(fp.rect, clamped),
                    "sample {clamped:?} escapes {:?}",
                    fp.rect
                );
            }
        }
    }

    #[test]
    fn box_around_camera_covers_screen() {
        let aabb = BoundingBox::from_center_half_extents(Vec3::new(0.0, 0.0, 1.0), Vec3::splat(3.0));
        let fp = project_aabb_rect(&aabb, &origin_vp(), 64, 64);
        assert!(fp.visible && fp.covers_screen);
    }

    #[test]
    fn box_beside_the_view_is_invisible() {
        let aabb = BoundingBox::from_center_half_extents(Vec3::new(50.0, 0.0, -5.0), Vec3::ONE);
        let fp = project_aabb_rect(&aabb, &origin_vp(), 64, 64);
        assert!(!fp.visible);
    }

    #[test]
    fn unbounded_box_covers_screen() {
        let fp = project_aabb_rect(&BoundingBox::INFINITE, &origin_vp(), 64, 64);
        assert_eq!(fp, LightFootprint::full_screen(64, 64));
    }
}
