//! Scene Target Passes
//!
//! The scene target shares the G-buffer depth-stencil, so its stencil still
//! carries the geometry bit when these passes run.

use super::lighting::quat_uniform;
use crate::renderer::core::{ClearOps, DepthState, RenderDevice, ShaderProgram};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::FrameContext;
use crate::renderer::graph::stencil;

/// Draws the skybox, or clears to the background colour.
#[derive(Debug, Default)]
pub struct BackgroundPass;

impl BackgroundPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for BackgroundPass {
    fn name(&self) -> &str {
        "Background Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let env = ctx.environment;
        device.bind_framebuffer(Some(ctx.targets.scene.framebuffer));
        device.set_viewport(ctx.full_viewport());
        device.set_scissor(None);
        device.set_stencil(None);
        device.set_color_writes(wgpu::ColorWrites::ALL);

        let Some(sky) = &env.sky else {
            let c = env.background_color;
            device.clear(ClearOps::color([c.x, c.y, c.z, 1.0]));
            return;
        };

        device.set_cull_mode(None);
        device.set_blend(None);
        device.set_depth_state(DepthState::DISABLED);

        device.use_program(ShaderProgram::Skybox);
        ctx.bind_camera(device);
        device.bind_texture("uCubeSky", Some(sky.cubemap));
        device.set_uniform("uRotation", quat_uniform(env.sky_rotation).into());
        device.draw_cube();
        device.bind_texture("uCubeSky", None);

        device.set_cull_mode(Some(wgpu::Face::Back));
    }
}

/// Combines albedo, emission and accumulated light over geometry pixels.
#[derive(Debug, Default)]
pub struct DeferredCompositePass;

impl DeferredCompositePass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for DeferredCompositePass {
    fn name(&self) -> &str {
        "Deferred Composite Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let targets = ctx.targets;
        device.bind_framebuffer(Some(targets.scene.framebuffer));
        device.set_viewport(ctx.full_viewport());
        device.set_blend(None);
        device.set_depth_state(DepthState::DISABLED);
        device.set_stencil(Some(stencil::geometry_test()));

        device.use_program(ShaderProgram::Scene);
        device.bind_texture("uTexAlbedo", Some(targets.gbuffer.albedo));
        device.bind_texture("uTexEmission", Some(targets.gbuffer.emission));
        device.bind_texture("uTexDiffuse", Some(targets.lighting.diffuse));
        device.bind_texture("uTexSpecular", Some(targets.lighting.specular));
        device.draw_screen();

        device.set_stencil(None);
    }
}
