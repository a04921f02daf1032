//! Render Pass Implementations
//!
//! One node per pass of the frame. Post-process nodes share
//! [`post_effect`], which reads the current post source and writes the
//! other post target before flipping them.

pub mod blit;
pub mod bloom;
pub mod fog;
pub mod forward;
pub mod fxaa;
pub mod gbuffer;
pub mod lighting;
pub mod scene;
pub mod shadow;
pub mod ssao;
pub mod tone_mapping;

pub use blit::{OutputPass, PostInputPass, letterbox, reset_device_state};
pub use bloom::BloomPass;
pub use fog::FogPass;
pub use forward::{DepthPrepass, ForwardPass};
pub use fxaa::FxaaPass;
pub use gbuffer::GBufferPass;
pub use lighting::{AmbientPass, LightVolumePass};
pub use scene::{BackgroundPass, DeferredCompositePass};
pub use shadow::{ShadowPass, ShadowView};
pub use ssao::SsaoPass;
pub use tone_mapping::{AdjustmentPass, ToneMapPass};

use crate::renderer::core::{DepthState, RenderDevice, ShaderProgram};
use crate::renderer::graph::context::FrameContext;

/// `One` + `One` accumulation.
pub const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Runs one full-screen post effect from the post source into the post
/// target, then flips them. `bind` uploads the effect's own parameters.
pub(crate) fn post_effect(
    ctx: &FrameContext<'_>,
    device: &mut dyn RenderDevice,
    program: ShaderProgram,
    bind: impl FnOnce(&mut dyn RenderDevice),
) {
    let source = ctx.post_source();
    let target = ctx.post_target();

    device.bind_framebuffer(Some(target.framebuffer));
    device.set_viewport(ctx.full_viewport());
    device.set_scissor(None);
    device.set_blend(None);
    device.set_depth_state(DepthState::DISABLED);
    device.set_stencil(None);

    device.use_program(program);
    device.bind_texture("uTexColor", Some(source.texture));
    bind(&mut *device);
    device.draw_screen();

    ctx.flip_post();
}
