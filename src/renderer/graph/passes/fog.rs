//! Depth fog over the post source, reconstructed from the G-buffer depth.

use super::post_effect;
use crate::renderer::core::{RenderDevice, ShaderProgram};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::FrameContext;

#[derive(Debug, Default)]
pub struct FogPass;

impl FogPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for FogPass {
    fn name(&self) -> &str {
        "Fog Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let fog = &ctx.environment.fog;
        post_effect(ctx, device, ShaderProgram::Fog, |device| {
            device.bind_texture("uTexDepth", Some(ctx.targets.gbuffer.depth_stencil));
            device.set_uniform("uNear", ctx.camera.near.into());
            device.set_uniform("uFar", ctx.camera.far.into());
            device.set_uniform("uFogMode", fog.mode.shader_index().into());
            device.set_uniform("uFogColor", fog.color.into());
            device.set_uniform("uFogStart", fog.start.into());
            device.set_uniform("uFogEnd", fog.end.into());
            device.set_uniform("uFogDensity", fog.density.into());
        });
    }
}
