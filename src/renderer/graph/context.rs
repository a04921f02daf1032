//! Frame Context
//!
//! [`FrameContext`] is the read-only view of one frame handed to every node:
//! camera, draw-call buckets, light batch, environment and render targets.
//!
//! All mutation (culling, sorting, shadow projections, lazy target
//! allocation) happens in `Renderer::end` before the context is built, so
//! nodes only record device commands. The one exception is the post-process
//! ping-pong index, kept in a [`Cell`] so each post node can flip it.

use std::cell::Cell;

use super::draw_call::DrawCallStore;
use super::light_batch::FrameLightBatch;
use super::passes::shadow::ShadowView;
use super::targets::{ColorTarget, RenderTargets};
use crate::renderer::core::{FramebufferId, Rect, RenderDevice};
use crate::renderer::settings::RenderFlags;
use crate::resources::Environment;
use crate::scene::{FrameCamera, LightRegistry};

/// Where the final image goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputTarget {
    /// `None` is the screen.
    pub framebuffer: Option<FramebufferId>,
    pub width: u32,
    pub height: u32,
}

impl OutputTarget {
    #[must_use]
    pub fn screen(width: u32, height: u32) -> Self {
        Self {
            framebuffer: None,
            width,
            height,
        }
    }
}

pub struct FrameContext<'a> {
    pub camera: &'a FrameCamera,
    pub draw_calls: &'a DrawCallStore,
    pub lights: &'a LightRegistry,
    pub light_batch: &'a FrameLightBatch,
    /// Shadow maps re-rendered this frame.
    pub shadow_views: &'a [ShadowView],
    pub environment: &'a Environment,
    pub targets: &'a RenderTargets,
    pub flags: RenderFlags,
    pub output: OutputTarget,
    post_flip: Cell<usize>,
}

impl<'a> FrameContext<'a> {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        camera: &'a FrameCamera,
        draw_calls: &'a DrawCallStore,
        lights: &'a LightRegistry,
        light_batch: &'a FrameLightBatch,
        shadow_views: &'a [ShadowView],
        environment: &'a Environment,
        targets: &'a RenderTargets,
        flags: RenderFlags,
        output: OutputTarget,
    ) -> Self {
        Self {
            camera,
            draw_calls,
            lights,
            light_batch,
            shadow_views,
            environment,
            targets,
            flags,
            output,
            post_flip: Cell::new(0),
        }
    }

    /// Internal resolution.
    #[inline]
    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        (self.targets.width, self.targets.height)
    }

    /// Viewport covering the internal resolution.
    #[inline]
    #[must_use]
    pub fn full_viewport(&self) -> Rect {
        Rect::from_size(self.targets.width, self.targets.height)
    }

    /// Post target holding the latest image.
    #[inline]
    #[must_use]
    pub fn post_source(&self) -> &'a ColorTarget {
        &self.targets.post[self.post_flip.get()]
    }

    /// Post target the next effect writes into.
    #[inline]
    #[must_use]
    pub fn post_target(&self) -> &'a ColorTarget {
        &self.targets.post[1 - self.post_flip.get()]
    }

    /// Makes the last written target the new source.
    #[inline]
    pub fn flip_post(&self) {
        self.post_flip.set(1 - self.post_flip.get());
    }

    /// Uploads the camera matrices to the bound program.
    pub fn bind_camera(&self, device: &mut dyn RenderDevice) {
        let cam = self.camera;
        device.set_uniform("uMatView", cam.view.into());
        device.set_uniform("uMatProj", cam.projection.into());
        device.set_uniform("uMatInvView", cam.inv_view.into());
        device.set_uniform("uMatInvProj", cam.inv_projection.into());
        device.set_uniform("uMatViewProj", cam.view_projection.into());
        device.set_uniform("uViewPosition", cam.position.into());
    }
}
