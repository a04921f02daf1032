//! Blits in and out of the post chain, plus the end-of-frame state reset.

use log::trace;

use crate::renderer::core::{BlitMask, BlitRequest, DepthState, Rect, RenderDevice};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::FrameContext;
use crate::renderer::settings::RenderFlags;

/// Largest rectangle of `source`'s aspect ratio centred in `destination`.
#[must_use]
pub fn letterbox(source: (u32, u32), destination: (u32, u32)) -> Rect {
    let (sw, sh) = (source.0.max(1) as f32, source.1.max(1) as f32);
    let (dw, dh) = destination;
    let src_ratio = sw / sh;
    let dst_ratio = dw as f32 / dh.max(1) as f32;

    if src_ratio > dst_ratio {
        let height = (dw as f32 / src_ratio).round() as u32;
        Rect {
            x: 0,
            y: (dh as i32 - height as i32) / 2,
            width: dw,
            height,
        }
    } else {
        let width = (dh as f32 * src_ratio).round() as u32;
        Rect {
            x: (dw as i32 - width as i32) / 2,
            y: 0,
            width,
            height: dh,
        }
    }
}

/// Restores the fixed-function state callers expect outside a frame:
/// screen bound, no stencil, back-face culling, alpha blending, depth test
/// off with writes on and `LessEqual`.
pub fn reset_device_state(device: &mut dyn RenderDevice) {
    let (width, height) = device.screen_size();
    device.bind_framebuffer(None);
    device.set_viewport(Rect::from_size(width, height));
    device.set_scissor(None);
    device.set_stencil(None);
    device.set_cull_mode(Some(wgpu::Face::Back));
    device.set_blend(Some(wgpu::BlendState::ALPHA_BLENDING));
    device.set_color_writes(wgpu::ColorWrites::ALL);
    device.set_depth_state(DepthState {
        test: false,
        write: true,
        compare: wgpu::CompareFunction::LessEqual,
    });
}

/// Copies the scene colour into the first post target.
#[derive(Debug, Default)]
pub struct PostInputPass;

impl PostInputPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for PostInputPass {
    fn name(&self) -> &str {
        "Post Input"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        device.set_stencil(None);
        let full = ctx.full_viewport();
        device.blit(BlitRequest {
            source: ctx.targets.scene.framebuffer,
            destination: Some(ctx.post_source().framebuffer),
            source_rect: full,
            destination_rect: full,
            mask: BlitMask::Color,
            filter: wgpu::FilterMode::Nearest,
        });
    }
}

/// Presents the post result and the scene depth to the output target.
#[derive(Debug, Default)]
pub struct OutputPass;

impl OutputPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for OutputPass {
    fn name(&self) -> &str {
        "Output"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let output = ctx.output;
        let source_rect = ctx.full_viewport();
        let destination_rect = if ctx.flags.contains(RenderFlags::ASPECT_KEEP) {
            letterbox(ctx.resolution(), (output.width, output.height))
        } else {
            Rect::from_size(output.width, output.height)
        };
        let filter = if ctx.flags.contains(RenderFlags::BLIT_LINEAR) {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        trace!("final blit into {destination_rect:?}");

        device.blit(BlitRequest {
            source: ctx.post_source().framebuffer,
            destination: output.framebuffer,
            source_rect,
            destination_rect,
            mask: BlitMask::Color,
            filter,
        });
        device.blit(BlitRequest {
            source: ctx.targets.gbuffer.framebuffer,
            destination: output.framebuffer,
            source_rect,
            destination_rect,
            mask: BlitMask::Depth,
            filter: wgpu::FilterMode::Nearest,
        });

        reset_device_state(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_pillarboxes_narrow_source() {
        let rect = letterbox((800, 600), (1920, 1080));
        assert_eq!(rect, Rect { x: 240, y: 0, width: 1440, height: 1080 });
    }

    #[test]
    fn letterbox_bars_wide_source() {
        let rect = letterbox((1920, 1080), (800, 600));
        assert_eq!(rect.width, 800);
        assert_eq!(rect.height, 450);
        assert_eq!(rect.y, 75);
    }

    #[test]
    fn letterbox_matching_aspect_fills() {
        assert_eq!(letterbox((640, 360), (1280, 720)), Rect::from_size(1280, 720));
    }
}
