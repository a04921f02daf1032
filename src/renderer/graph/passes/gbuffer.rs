//! G-Buffer Pass
//!
//! Fills albedo, emission, normal and ORM for the deferred buckets and marks
//! covered pixels with the stencil geometry bit. Frames without deferred
//! draws only reset depth and stencil, which the forward path still uses.

use crate::renderer::core::{ClearOps, DepthState, RenderDevice, ShaderProgram};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::FrameContext;
use crate::renderer::graph::stencil;

#[derive(Debug, Default)]
pub struct GBufferPass;

impl GBufferPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for GBufferPass {
    fn name(&self) -> &str {
        "G-Buffer Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let gbuffer = &ctx.targets.gbuffer;
        device.bind_framebuffer(Some(gbuffer.framebuffer));
        device.set_viewport(ctx.full_viewport());
        device.set_scissor(None);

        if !ctx.draw_calls.has_deferred() {
            device.clear(ClearOps::depth(1.0).with_stencil(0));
            return;
        }

        device.set_color_writes(wgpu::ColorWrites::ALL);
        device.set_depth_state(DepthState::OPAQUE);
        device.set_blend(None);
        device.set_stencil(Some(stencil::geometry_write()));
        device.clear(ClearOps::color([0.0; 4]).with_depth(1.0).with_stencil(0));

        let buckets = [
            (ShaderProgram::GeometryInstanced, ctx.draw_calls.deferred_instanced()),
            (ShaderProgram::Geometry, ctx.draw_calls.deferred()),
        ];
        for (program, calls) in buckets {
            if calls.is_empty() {
                continue;
            }
            device.use_program(program);
            ctx.bind_camera(device);
            for call in calls {
                device.set_cull_mode(call.material.cull_mode.face());
                call.bind_material(device);
                call.submit(device);
            }
        }

        device.set_stencil(None);
    }
}
