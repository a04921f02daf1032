//! Sprite sheets and particle systems.

use glam::Vec2;

use super::geometry::BoundingBox;
use super::material::Material;
use crate::renderer::core::{BufferId, InstanceStreams};

/// A material whose albedo is a grid of animation frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub material: Material,
    /// Current frame, wrapped over the grid at submission.
    pub current_frame: f32,
    pub x_frame_count: u32,
    pub y_frame_count: u32,
}

impl Sprite {
    #[must_use]
    pub fn new(material: Material, x_frame_count: u32, y_frame_count: u32) -> Self {
        Self {
            material,
            current_frame: 0.0,
            x_frame_count: x_frame_count.max(1),
            y_frame_count: y_frame_count.max(1),
        }
    }

    /// Advances the animation by `speed` frames.
    pub fn update(&mut self, speed: f32) {
        let total = (self.x_frame_count * self.y_frame_count) as f32;
        self.current_frame = (self.current_frame + speed).rem_euclid(total);
    }

    /// Texture-coordinate scale and offset selecting the current frame.
    ///
    /// `sign` mirrors the frame horizontally / vertically (negative sizes).
    #[must_use]
    pub fn uv_scale_offset(&self, sign: Vec2) -> (Vec2, Vec2) {
        let x_count = self.x_frame_count.max(1);
        let y_count = self.y_frame_count.max(1);

        let scale = Vec2::new(sign.x / x_count as f32, sign.y / y_count as f32);

        let frame = (self.current_frame.max(0.0) as u32) % (x_count * y_count);
        let frame_x = frame % x_count;
        let frame_y = frame / x_count;

        let offset = Vec2::new(frame_x as f32 * scale.x, frame_y as f32 * scale.y);
        (scale, offset)
    }
}

/// Per-instance data for instanced submissions.
///
/// `transforms` is optional so a caller can hand over a batch whose buffer
/// failed to upload; such batches are ignored at submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceBatch {
    pub transforms: Option<BufferId>,
    pub colors: Option<BufferId>,
    pub count: u32,
    /// Conservative bounds of every instance, in global-transform space.
    pub bounds: Option<BoundingBox>,
    pub transform: glam::Mat4,
}

impl InstanceBatch {
    #[must_use]
    pub fn new(transforms: BufferId, count: u32) -> Self {
        Self {
            transforms: Some(transforms),
            colors: None,
            count,
            bounds: None,
            transform: glam::Mat4::IDENTITY,
        }
    }

    #[must_use]
    pub fn with_colors(mut self, colors: BufferId) -> Self {
        self.colors = Some(colors);
        self
    }

    #[must_use]
    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: glam::Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Streams to draw with, or `None` if the batch must be skipped.
    #[must_use]
    pub fn streams(&self) -> Option<InstanceStreams> {
        match self.transforms {
            Some(transforms) if self.count > 0 => Some(InstanceStreams {
                transforms,
                colors: self.colors,
                count: self.count,
            }),
            _ => None,
        }
    }
}

/// GPU-side particle storage: instance streams, live count and bounds.
///
/// Simulation is owned by the caller; the pipeline only renders the
/// current state as an instanced mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSystem {
    pub transforms: Option<BufferId>,
    pub colors: Option<BufferId>,
    pub alive_count: u32,
    pub aabb: BoundingBox,
}

impl ParticleSystem {
    #[must_use]
    pub fn new(transforms: BufferId, colors: Option<BufferId>, alive_count: u32, aabb: BoundingBox) -> Self {
        Self {
            transforms: Some(transforms),
            colors,
            alive_count,
            aabb,
        }
    }

    /// The instance batch this system submits.
    #[must_use]
    pub fn instance_batch(&self, transform: glam::Mat4) -> InstanceBatch {
        InstanceBatch {
            transforms: self.transforms,
            colors: self.colors,
            count: self.alive_count,
            bounds: Some(self.aabb),
            transform,
        }
    }
}
