//! Draw Call Store
//!
//! Every `draw_*` submission becomes a [`DrawCall`] holding a copy of its
//! material and a snapshot of its transform. Calls are routed into one of
//! four buckets:
//!
//! | Bucket | Content |
//! |--------|---------|
//! | deferred | opaque single draws |
//! | deferred instanced | opaque instanced draws |
//! | forward | blended single draws (or everything with `FORCE_FORWARD`) |
//! | forward instanced | blended instanced draws |
//!
//! The store lives on the renderer and is cleared, not freed, at every
//! `begin`, so steady-state frames do not allocate.

use glam::{Mat3, Mat4, Quat, Vec2, Vec3};

use crate::renderer::core::{InstanceStreams, RenderDevice, UniformValue};
use crate::resources::{BillboardMode, BoundingBox, Material, Mesh};
use crate::scene::Frustum;

/// What a draw call rasterizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawGeometry {
    Mesh(Mesh),
    /// The unit sprite quad with the current sheet frame.
    Sprite {
        /// World-space corners, used for light filtering.
        quad: [Vec3; 4],
        uv_scale: Vec2,
        uv_offset: Vec2,
    },
}

/// Per-instance data of an instanced call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instancing {
    pub streams: InstanceStreams,
    /// Bounds of all instances before the call transform is applied.
    pub aabb: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub transform: Mat4,
    pub material: Material,
    pub geometry: DrawGeometry,
    pub instancing: Option<Instancing>,
}

impl DrawCall {
    #[must_use]
    pub fn mesh(mesh: Mesh, material: Material, transform: Mat4) -> Self {
        Self {
            transform,
            material,
            geometry: DrawGeometry::Mesh(mesh),
            instancing: None,
        }
    }

    #[must_use]
    pub fn with_instancing(mut self, instancing: Instancing) -> Self {
        self.instancing = Some(instancing);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_instanced(&self) -> bool {
        self.instancing.is_some()
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }

    /// World-space bounds used for frustum culling.
    #[must_use]
    pub fn world_aabb(&self) -> BoundingBox {
        if let Some(instancing) = &self.instancing {
            return instancing.aabb.transform(&self.transform);
        }
        match &self.geometry {
            DrawGeometry::Mesh(mesh) => mesh.aabb.transform(&self.transform),
            DrawGeometry::Sprite { quad, .. } => BoundingBox::from_points(quad),
        }
    }

    /// Uploads the material and transform uniforms of this call.
    pub fn bind_material(&self, device: &mut dyn RenderDevice) {
        let m = &self.material;
        device.set_uniform("uMatModel", self.transform.into());
        device.set_uniform("uAlbedoColor", m.albedo.color.into());
        device.set_uniform("uEmissionColor", m.emission.color.into());
        device.set_uniform("uEmissionEnergy", m.emission.energy.into());
        device.set_uniform("uNormalScale", m.normal.scale.into());
        device.set_uniform("uValueOcclusion", m.orm.occlusion.into());
        device.set_uniform("uValueRoughness", m.orm.roughness.into());
        device.set_uniform("uValueMetalness", m.orm.metalness.into());
        device.set_uniform("uAlphaCutoff", m.alpha_cutoff.into());

        let (uv_scale, uv_offset) = match self.geometry {
            DrawGeometry::Sprite {
                uv_scale, uv_offset, ..
            } => (uv_scale, uv_offset),
            DrawGeometry::Mesh(_) => (Vec2::ONE, Vec2::ZERO),
        };
        device.set_uniform("uTexCoordScale", uv_scale.into());
        device.set_uniform("uTexCoordOffset", uv_offset.into());
        if self.is_instanced() {
            device.set_uniform(
                "uBillboardMode",
                UniformValue::Int(m.billboard_mode as i32),
            );
        }

        device.bind_texture("uTexAlbedo", m.albedo.texture);
        device.bind_texture("uTexNormal", m.normal.texture);
        device.bind_texture("uTexEmission", m.emission.texture);
        device.bind_texture("uTexOrm", m.orm.texture);
    }

    /// Uniforms needed by depth-only programs: transform and alpha cut-out.
    pub fn bind_depth_material(&self, device: &mut dyn RenderDevice) {
        let m = &self.material;
        device.set_uniform("uMatModel", self.transform.into());
        device.set_uniform("uAlpha", m.albedo.color.w.into());
        device.set_uniform("uAlphaCutoff", m.alpha_cutoff.into());
        if let DrawGeometry::Sprite {
            uv_scale, uv_offset, ..
        } = self.geometry
        {
            device.set_uniform("uTexCoordScale", uv_scale.into());
            device.set_uniform("uTexCoordOffset", uv_offset.into());
        }
        if self.is_instanced() {
            device.set_uniform(
                "uBillboardMode",
                UniformValue::Int(m.billboard_mode as i32),
            );
        }
        device.bind_texture("uTexAlbedo", m.albedo.texture);
    }

    /// Issues the draw command for this call's geometry.
    pub fn submit(&self, device: &mut dyn RenderDevice) {
        let streams = self.instancing.map(|i| i.streams);
        match (&self.geometry, streams) {
            (DrawGeometry::Mesh(mesh), None) => device.draw_mesh(mesh.buffers()),
            (DrawGeometry::Mesh(mesh), Some(streams)) => {
                device.draw_mesh_instanced(mesh.buffers(), streams);
            }
            (DrawGeometry::Sprite { .. }, streams) => device.draw_quad(streams),
        }
    }
}

// ============================================================================
// Sprites & billboards
// ============================================================================

/// Transform of a sprite quad: `translation · rotation · scale(|w|/2, -|h|/2, 1)`.
#[must_use]
pub fn sprite_transform(position: Vec3, size: Vec2, rotation: Quat) -> Mat4 {
    let scale = Vec3::new(size.x.abs() * 0.5, -size.y.abs() * 0.5, 1.0);
    Mat4::from_scale_rotation_translation(scale, rotation, position)
}

/// World corners of the quad spanned by `transform` (unit quad in `[-1, 1]`).
#[must_use]
pub fn sprite_quad(transform: &Mat4) -> [Vec3; 4] {
    let center = transform.w_axis.truncate();
    let x = transform.x_axis.truncate();
    let y = transform.y_axis.truncate();
    [center - x - y, center + x - y, center + x + y, center - x + y]
}

/// Rewrites `transform` so the object faces the camera described by `inv_view`.
///
/// Translation and per-axis scale are kept; a mirrored transform keeps its
/// mirror on the Y axis, which is how sprite quads are built.
#[must_use]
pub fn apply_billboard(transform: &Mat4, mode: BillboardMode, inv_view: &Mat4) -> Mat4 {
    let translation = transform.w_axis.truncate();
    let mut scale = Vec3::new(
        transform.x_axis.truncate().length(),
        transform.y_axis.truncate().length(),
        transform.z_axis.truncate().length(),
    );
    if transform.determinant() < 0.0 {
        scale.y = -scale.y;
    }

    let rotation = match mode {
        BillboardMode::Disabled => return *transform,
        BillboardMode::Front => {
            let basis = Mat3::from_cols(
                inv_view.x_axis.truncate().normalize_or(Vec3::X),
                inv_view.y_axis.truncate().normalize_or(Vec3::Y),
                inv_view.z_axis.truncate().normalize_or(Vec3::Z),
            );
            Quat::from_mat3(&basis)
        }
        BillboardMode::YAxis => {
            let to_camera = inv_view.w_axis.truncate() - translation;
            let angle = to_camera.x.atan2(to_camera.z);
            Quat::from_rotation_y(angle)
        }
    };

    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

// ============================================================================
// Store
// ============================================================================

/// Destination bucket of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Deferred,
    DeferredInstanced,
    Forward,
    ForwardInstanced,
}

#[derive(Debug, Default)]
pub struct DrawCallStore {
    deferred: Vec<DrawCall>,
    deferred_instanced: Vec<DrawCall>,
    forward: Vec<DrawCall>,
    forward_instanced: Vec<DrawCall>,
}

impl DrawCallStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties every bucket, keeping capacity.
    pub fn clear(&mut self) {
        self.deferred.clear();
        self.deferred_instanced.clear();
        self.forward.clear();
        self.forward_instanced.clear();
    }

    /// Routes `call` by blend mode; `force_forward` sends everything forward.
    pub fn push(&mut self, call: DrawCall, force_forward: bool) -> Bucket {
        let forward = force_forward || !call.material.is_opaque();
        let bucket = match (forward, call.is_instanced()) {
            (false, false) => Bucket::Deferred,
            (false, true) => Bucket::DeferredInstanced,
            (true, false) => Bucket::Forward,
            (true, true) => Bucket::ForwardInstanced,
        };
        self.bucket_mut(bucket).push(call);
        bucket
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<DrawCall> {
        match bucket {
            Bucket::Deferred => &mut self.deferred,
            Bucket::DeferredInstanced => &mut self.deferred_instanced,
            Bucket::Forward => &mut self.forward,
            Bucket::ForwardInstanced => &mut self.forward_instanced,
        }
    }

    #[must_use]
    pub fn bucket(&self, bucket: Bucket) -> &[DrawCall] {
        match bucket {
            Bucket::Deferred => &self.deferred,
            Bucket::DeferredInstanced => &self.deferred_instanced,
            Bucket::Forward => &self.forward,
            Bucket::ForwardInstanced => &self.forward_instanced,
        }
    }

    #[inline]
    #[must_use]
    pub fn deferred(&self) -> &[DrawCall] {
        &self.deferred
    }

    #[inline]
    #[must_use]
    pub fn deferred_instanced(&self) -> &[DrawCall] {
        &self.deferred_instanced
    }

    #[inline]
    #[must_use]
    pub fn forward(&self) -> &[DrawCall] {
        &self.forward
    }

    #[inline]
    #[must_use]
    pub fn forward_instanced(&self) -> &[DrawCall] {
        &self.forward_instanced
    }

    #[must_use]
    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty() || !self.deferred_instanced.is_empty()
    }

    #[must_use]
    pub fn has_forward(&self) -> bool {
        !self.forward.is_empty() || !self.forward_instanced.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deferred.len() + self.deferred_instanced.len() + self.forward.len() + self.forward_instanced.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shadow casters in draw order: instanced buckets first, then singles.
    pub fn shadow_casters(&self) -> impl Iterator<Item = &DrawCall> {
        self.deferred_instanced
            .iter()
            .chain(&self.forward_instanced)
            .chain(&self.deferred)
            .chain(&self.forward)
            .filter(|call| call.material.shadow_cast_mode.casts())
    }

    /// Drops calls whose world bounds miss `frustum`. Returns how many were removed.
    pub fn cull(&mut self, frustum: &Frustum) -> usize {
        let mut removed = 0;
        for bucket in [
            &mut self.deferred,
            &mut self.deferred_instanced,
            &mut self.forward,
            &mut self.forward_instanced,
        ] {
            for i in (0..bucket.len()).rev() {
                if !frustum.intersects_aabb(&bucket[i].world_aabb()) {
                    bucket.swap_remove(i);
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Sorts single-call buckets by squared distance to `camera`:
    /// deferred front to back, forward back to front.
    pub fn sort(&mut self, camera: Vec3, opaque: bool, transparent: bool) {
        let distance = |call: &DrawCall| call.position().distance_squared(camera);
        if opaque {
            self.deferred
                .sort_by(|a, b| distance(a).total_cmp(&distance(b)));
        }
        if transparent {
            self.forward
                .sort_by(|a, b| distance(b).total_cmp(&distance(a)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::BlendMode;

    #[test]
    fn sprite_quad_matches_size() {
        let t = sprite_transform(Vec3::new(1.0, 2.0, 3.0), Vec2::new(2.0, 4.0), Quat::IDENTITY);
        let quad = sprite_quad(&t);
        let aabb = BoundingBox::from_points(&quad);
        assert!((aabb.size() - Vec3::new(2.0, 4.0, 0.0)).length() < 1e-5);
        assert!((aabb.center() - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn billboard_keeps_translation_and_mirror() {
        let t = sprite_transform(Vec3::new(0.0, 1.0, 0.0), Vec2::new(2.0, 2.0), Quat::IDENTITY);
        let inv_view = Mat4::look_at_rh(Vec3::new(5.0, 1.0, 0.0), Vec3::ZERO, Vec3::Y).inverse();
        let b = apply_billboard(&t, BillboardMode::YAxis, &inv_view);
        assert!((b.w_axis.truncate() - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);
        assert!(b.determinant() < 0.0);
        // The quad normal now points at the camera on the XZ plane.
        let normal = b.z_axis.truncate().normalize();
        assert!((normal - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn blended_material_routes_forward() {
        let mesh = Mesh::new(Default::default(), 3, BoundingBox::default());
        let mut store = DrawCallStore::new();
        let opaque = DrawCall::mesh(mesh, Material::default(), Mat4::IDENTITY);
        let blended = DrawCall::mesh(
            mesh,
            Material::default().with_blend_mode(BlendMode::Alpha),
            Mat4::IDENTITY,
        );
        assert_eq!(store.push(opaque, false), Bucket::Deferred);
        assert_eq!(store.push(blended, false), Bucket::Forward);
        assert_eq!(store.push(opaque, true), Bucket::Forward);
        store.clear();
        assert!(store.is_empty());
    }
}
