//! SSAO Pass
//!
//! Computes hemisphere occlusion at half resolution from the G-buffer depth
//! and normals, then blurs it with alternating horizontal and vertical
//! Gaussian passes between the two SSAO targets.

use glam::Vec2;

use crate::renderer::core::{DepthState, Rect, RenderDevice, ShaderProgram};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::FrameContext;
use crate::resources::ssao::SSAO_KERNEL_SIZE;

#[derive(Debug, Default)]
pub struct SsaoPass;

impl SsaoPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for SsaoPass {
    fn name(&self) -> &str {
        "SSAO Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let Some(ssao) = &ctx.targets.ssao else {
            return;
        };
        let settings = &ctx.environment.ssao;
        let [first, _] = &ssao.ping_pong;
        let viewport = Rect::from_size(first.width, first.height);

        device.set_depth_state(DepthState::DISABLED);
        device.set_stencil(None);
        device.set_blend(None);
        device.set_scissor(None);
        device.set_cull_mode(None);
        device.set_color_writes(wgpu::ColorWrites::ALL);

        device.bind_framebuffer(Some(first.framebuffer));
        device.set_viewport(viewport);
        device.use_program(ShaderProgram::Ssao);
        ctx.bind_camera(device);
        device.set_uniform("uRadius", settings.radius().into());
        device.set_uniform("uBias", settings.bias().into());
        device.set_uniform("uKernelSize", (SSAO_KERNEL_SIZE as i32).into());
        device.bind_texture("uTexDepth", Some(ctx.targets.gbuffer.depth_stencil));
        device.bind_texture("uTexNormal", Some(ctx.targets.gbuffer.normal));
        device.bind_texture("uTexKernel", Some(ssao.kernel));
        device.bind_texture("uTexNoise", Some(ssao.noise));
        device.draw_screen();

        device.use_program(ShaderProgram::GaussianBlur);
        let texel = Vec2::new(1.0 / first.width as f32, 1.0 / first.height as f32);
        for i in 0..settings.iterations() as usize {
            let source = &ssao.ping_pong[i % 2];
            let target = &ssao.ping_pong[(i + 1) % 2];
            let direction = if i % 2 == 0 {
                Vec2::new(texel.x, 0.0)
            } else {
                Vec2::new(0.0, texel.y)
            };
            device.bind_framebuffer(Some(target.framebuffer));
            device.set_viewport(viewport);
            device.set_uniform("uDirection", direction.into());
            device.bind_texture("uTexture", Some(source.texture));
            device.draw_screen();
        }
    }
}
