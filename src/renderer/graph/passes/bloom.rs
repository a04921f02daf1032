//! Bloom Post-Processing Pass
//!
//! Progressive downsample / upsample bloom over a half-resolution mip chain.
//!
//! # Algorithm
//!
//! 1. **Downsample**: each mip reads the previous level (the post source
//!    for mip 0). The first level applies the soft-knee threshold
//!    (`uPrefilter`) and Karis averaging (`uMipLevel == 0`).
//! 2. **Upsample**: from the coarsest mip back to mip 0 with a tent filter,
//!    additively blended (`One`/`One`) into the finer level.
//! 3. **Composite**: mip 0 is mixed with the post source according to the
//!    bloom mode and intensity, into the other post target.

use glam::Vec2;

use super::{ADDITIVE_BLEND, post_effect};
use crate::renderer::core::{DepthState, Rect, RenderDevice, ShaderProgram};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::FrameContext;

#[derive(Debug, Default)]
pub struct BloomPass;

impl BloomPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for BloomPass {
    fn name(&self) -> &str {
        "Bloom Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let Some(chain) = &ctx.targets.bloom else {
            return;
        };
        let Some(first_mip) = chain.mips.first() else {
            return;
        };
        let settings = &ctx.environment.bloom;
        let (width, height) = ctx.resolution();

        device.set_depth_state(DepthState::DISABLED);
        device.set_stencil(None);
        device.set_scissor(None);
        device.set_blend(None);

        // --- Downsample ---
        device.use_program(ShaderProgram::BloomDownsample);
        device.set_uniform("uResolution", Vec2::new(width as f32, height as f32).into());
        device.set_uniform("uMipLevel", 0_i32.into());
        device.set_uniform("uPrefilter", settings.prefilter().into());
        device.bind_texture("uTexture", Some(ctx.post_source().texture));

        for mip in &chain.mips {
            device.bind_framebuffer(Some(mip.framebuffer));
            device.set_viewport(Rect::from_size(mip.width, mip.height));
            device.draw_screen();

            device.set_uniform("uResolution", Vec2::new(mip.width as f32, mip.height as f32).into());
            device.bind_texture("uTexture", Some(mip.texture));
            device.set_uniform("uMipLevel", 1_i32.into());
        }

        // --- Upsample ---
        device.use_program(ShaderProgram::BloomUpsample);
        device.set_blend(Some(ADDITIVE_BLEND));
        let radius = settings.filter_radius() as f32;
        device.set_uniform(
            "uFilterRadius",
            Vec2::new(radius / width as f32, radius / height as f32).into(),
        );

        for pair in chain.mips.windows(2).rev() {
            let (finer, coarser) = (&pair[0], &pair[1]);
            device.bind_texture("uTexture", Some(coarser.texture));
            device.bind_framebuffer(Some(finer.framebuffer));
            device.set_viewport(Rect::from_size(finer.width, finer.height));
            device.draw_screen();
        }
        device.set_blend(None);

        // --- Composite ---
        post_effect(ctx, device, ShaderProgram::Bloom, |device| {
            device.bind_texture("uTexBloomBlur", Some(first_mip.texture));
            device.set_uniform("uBloomMode", settings.mode().shader_index().into());
            device.set_uniform("uBloomIntensity", settings.intensity().into());
        });
    }
}
