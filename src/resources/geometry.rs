//! Geometry value types: axis-aligned bounds and mesh references.

use glam::{Mat4, Vec3};

use crate::renderer::core::{BufferId, MeshBuffers};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// Box covering all of space, used when a caller gives no bounds.
    pub const INFINITE: Self = Self {
        min: Vec3::splat(-f32::MAX),
        max: Vec3::splat(f32::MAX),
    };

    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box of half-extent `half` centred on `center`.
    #[must_use]
    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.min.cmpgt(Vec3::splat(-f32::MAX)).all() && self.max.cmplt(Vec3::splat(f32::MAX)).all()
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Smallest box containing every point.
    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Self { min, max }
    }

    /// World-space box enclosing this box under `matrix`.
    ///
    /// Unbounded boxes are returned unchanged.
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> Self {
        if !self.is_finite() {
            return *self;
        }

        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut new_min = Vec3::splat(f32::INFINITY);
        let mut new_max = Vec3::splat(f32::NEG_INFINITY);

        for point in corners {
            let transformed = matrix.transform_point3(point);
            new_min = new_min.min(transformed);
            new_max = new_max.max(transformed);
        }

        Self {
            min: new_min,
            max: new_max,
        }
    }

    /// Overlap test, touching boxes count as overlapping.
    #[must_use]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }
}

/// A GPU mesh: uploaded buffers plus object-space bounds.
///
/// The pipeline only borrows the buffers for the duration of a frame; the
/// caller keeps them alive until `end()` returns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mesh {
    pub vertices: BufferId,
    pub vertex_count: u32,
    pub indices: Option<(BufferId, u32)>,
    pub aabb: BoundingBox,
}

impl Mesh {
    #[must_use]
    pub fn new(vertices: BufferId, vertex_count: u32, aabb: BoundingBox) -> Self {
        Self {
            vertices,
            vertex_count,
            indices: None,
            aabb,
        }
    }

    #[must_use]
    pub fn with_indices(mut self, indices: BufferId, index_count: u32) -> Self {
        self.indices = Some((indices, index_count));
        self
    }

    #[must_use]
    pub fn buffers(&self) -> MeshBuffers {
        MeshBuffers {
            vertices: self.vertices,
            vertex_count: self.vertex_count,
            indices: self.indices,
        }
    }
}
