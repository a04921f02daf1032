//! Renderer Settings & Pipeline Flags
//!
//! [`RendererSettings`] is handed to [`Renderer::new`](super::Renderer::new)
//! and fixes the internal resolution and the initial [`RenderFlags`].
//!
//! ```rust,ignore
//! use myth_pipeline::renderer::{RenderFlags, RendererSettings};
//!
//! let settings = RendererSettings {
//!     width: 1920,
//!     height: 1080,
//!     flags: RenderFlags::FXAA | RenderFlags::ASPECT_KEEP,
//!     ..Default::default()
//! };
//! ```

use bitflags::bitflags;

bitflags! {
    /// Toggles for optional pipeline behaviour.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderFlags: u32 {
        /// Run FXAA as the last post stage.
        const FXAA = 1 << 0;
        /// Keep every submitted draw call, skipping the frustum test.
        const NO_FRUSTUM_CULLING = 1 << 1;
        /// Sort deferred calls front to back.
        const OPAQUE_SORTING = 1 << 2;
        /// Sort forward calls back to front.
        const TRANSPARENT_SORTING = 1 << 3;
        /// Route every draw call through the forward path.
        const FORCE_FORWARD = 1 << 4;
        /// Lay down forward depth before shading forward calls.
        const DEPTH_PREPASS = 1 << 5;
        /// Letterbox / pillarbox the final blit to keep the internal aspect.
        const ASPECT_KEEP = 1 << 6;
        /// Bilinear filtering for the final colour blit.
        const BLIT_LINEAR = 1 << 7;
        /// Smaller HDR formats for G-buffer emission. Init only.
        const LOW_PRECISION_BUFFERS = 1 << 8;
        /// 8-bit G-buffer normals. Init only.
        const EIGHT_BIT_NORMALS = 1 << 9;
        /// Restrict ambient and light volumes to pixels carrying geometry.
        const STENCIL_TEST = 1 << 10;
    }
}

impl RenderFlags {
    /// Flags that shape render-target formats and so cannot change after init.
    pub const INIT_ONLY: Self = Self::LOW_PRECISION_BUFFERS.union(Self::EIGHT_BIT_NORMALS);
}

/// Startup configuration of a [`Renderer`](super::Renderer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererSettings {
    /// Internal render width in pixels.
    pub width: u32,
    /// Internal render height in pixels.
    pub height: u32,
    pub flags: RenderFlags,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            flags: RenderFlags::empty(),
        }
    }
}

impl RendererSettings {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: RenderFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}
