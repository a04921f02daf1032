//! FXAA over the adjusted (LDR) image. Runs last in the post chain.

use glam::Vec2;

use super::post_effect;
use crate::renderer::core::{RenderDevice, ShaderProgram};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::FrameContext;

#[derive(Debug, Default)]
pub struct FxaaPass;

impl FxaaPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for FxaaPass {
    fn name(&self) -> &str {
        "FXAA Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let (width, height) = ctx.resolution();
        post_effect(ctx, device, ShaderProgram::Fxaa, |device| {
            device.set_uniform(
                "uTexelSize",
                Vec2::new(1.0 / width as f32, 1.0 / height as f32).into(),
            );
        });
    }
}
