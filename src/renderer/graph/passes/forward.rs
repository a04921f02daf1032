//! Forward Passes
//!
//! Blended draws (and every draw under `FORCE_FORWARD`) are shaded in one
//! pass into the scene target, each with its own bounded light list.
//!
//! With `DEPTH_PREPASS` a depth-only pass runs first, single draws in
//! reverse order, and the shading pass then tests depth with `Equal`
//! without writing it.

use crate::renderer::core::{DepthState, RenderDevice, ShaderProgram};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::FrameContext;
use crate::renderer::graph::draw_call::{DrawCall, DrawGeometry};
use crate::renderer::graph::light_batch::{FORWARD_LIGHT_CAPACITY, ForwardLightList, quad_touches_light};
use crate::renderer::graph::stencil;
use crate::renderer::settings::RenderFlags;
use crate::scene::LightKind;

const SHADOW_MAP_SLOTS: [&str; FORWARD_LIGHT_CAPACITY] = [
    "uShadowMap0",
    "uShadowMap1",
    "uShadowMap2",
    "uShadowMap3",
    "uShadowMap4",
    "uShadowMap5",
    "uShadowMap6",
    "uShadowMap7",
];

const SHADOW_CUBE_SLOTS: [&str; FORWARD_LIGHT_CAPACITY] = [
    "uShadowCubemap0",
    "uShadowCubemap1",
    "uShadowCubemap2",
    "uShadowCubemap3",
    "uShadowCubemap4",
    "uShadowCubemap5",
    "uShadowCubemap6",
    "uShadowCubemap7",
];

/// Picks the batched lights that reach `call`, in batch order, up to the
/// list capacity. Directional lights always qualify.
#[must_use]
pub fn select_lights<'a>(ctx: &FrameContext<'a>, call: &DrawCall) -> ForwardLightList<'a> {
    let mut list = ForwardLightList::new();
    let call_aabb = call.world_aabb();

    for (_, batched, light) in ctx.light_batch.resolve(ctx.lights) {
        if list.is_full() {
            break;
        }
        let touches = match (&call.geometry, light.kind) {
            (_, LightKind::Directional) => true,
            (DrawGeometry::Sprite { quad, .. }, _) if !call.is_instanced() => {
                quad_touches_light(quad, &batched.aabb)
            }
            _ => batched.aabb.intersects(&call_aabb),
        };
        if touches {
            list.push(light);
        }
    }
    list
}

fn send_lights(device: &mut dyn RenderDevice, lights: &ForwardLightList<'_>) {
    let gpu = lights.to_gpu();
    device.set_uniform_block("uLights", bytemuck::cast_slice(&gpu));
    device.set_uniform("uLightCount", (lights.len() as i32).into());

    let mut active = lights.iter();
    for slot in 0..FORWARD_LIGHT_CAPACITY {
        let shadow = active.next().and_then(|l| l.shadow().map(|s| (l.kind, s.map.texture)));
        let (map, cube) = match shadow {
            Some((LightKind::Omni, texture)) => (None, Some(texture)),
            Some((_, texture)) => (Some(texture), None),
            None => (None, None),
        };
        device.bind_texture(SHADOW_MAP_SLOTS[slot], map);
        device.bind_texture(SHADOW_CUBE_SLOTS[slot], cube);
    }
}

fn bind_environment(ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
    let env = ctx.environment;
    ctx.bind_camera(device);
    match &env.sky {
        Some(sky) => {
            device.bind_texture("uCubeIrradiance", Some(sky.irradiance));
            device.bind_texture("uCubePrefilter", Some(sky.prefilter));
            device.bind_texture("uTexBrdfLut", Some(ctx.targets.brdf_lut));
            device.set_uniform("uQuatSkybox", super::lighting::quat_uniform(env.sky_rotation).into());
            device.set_uniform("uHasSkybox", true.into());
        }
        None => {
            device.set_uniform("uAmbientColor", env.ambient_color.into());
            device.set_uniform("uHasSkybox", false.into());
        }
    }
}

// ============================================================================
// Depth prepass
// ============================================================================

#[derive(Debug, Default)]
pub struct DepthPrepass;

impl DepthPrepass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for DepthPrepass {
    fn name(&self) -> &str {
        "Depth Prepass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        device.bind_framebuffer(Some(ctx.targets.scene.framebuffer));
        device.set_viewport(ctx.full_viewport());
        device.set_scissor(None);
        device.set_blend(None);
        device.set_color_writes(wgpu::ColorWrites::empty());
        device.set_depth_state(DepthState::OPAQUE);
        device.set_stencil(Some(stencil::geometry_write()));

        let instanced = ctx.draw_calls.forward_instanced();
        if !instanced.is_empty() {
            device.use_program(ShaderProgram::DepthInstanced);
            ctx.bind_camera(device);
            for call in instanced {
                device.set_cull_mode(call.material.cull_mode.face());
                call.bind_depth_material(device);
                call.submit(device);
            }
        }

        let singles = ctx.draw_calls.forward();
        if !singles.is_empty() {
            device.use_program(ShaderProgram::Depth);
            ctx.bind_camera(device);
            // Nearest last in the sorted bucket, so reverse for early-z.
            for call in singles.iter().rev() {
                device.set_cull_mode(call.material.cull_mode.face());
                call.bind_depth_material(device);
                call.submit(device);
            }
        }

        device.set_color_writes(wgpu::ColorWrites::ALL);
    }
}

// ============================================================================
// Forward shading
// ============================================================================

#[derive(Debug, Default)]
pub struct ForwardPass;

impl ForwardPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for ForwardPass {
    fn name(&self) -> &str {
        "Forward Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        device.bind_framebuffer(Some(ctx.targets.scene.framebuffer));
        device.set_viewport(ctx.full_viewport());
        device.set_scissor(None);
        device.set_color_writes(wgpu::ColorWrites::ALL);

        if ctx.flags.contains(RenderFlags::DEPTH_PREPASS) {
            device.set_depth_state(DepthState {
                test: true,
                write: false,
                compare: wgpu::CompareFunction::Equal,
            });
            device.set_stencil(None);
        } else {
            device.set_depth_state(DepthState::OPAQUE);
            device.set_stencil(Some(stencil::geometry_write()));
        }

        let buckets = [
            (ShaderProgram::ForwardInstanced, ctx.draw_calls.forward_instanced()),
            (ShaderProgram::Forward, ctx.draw_calls.forward()),
        ];
        for (program, calls) in buckets {
            if calls.is_empty() {
                continue;
            }
            device.use_program(program);
            bind_environment(ctx, device);
            for call in calls {
                device.set_cull_mode(call.material.cull_mode.face());
                device.set_blend(call.material.blend_mode.blend_state());
                send_lights(device, &select_lights(ctx, call));
                call.bind_material(device);
                call.submit(device);
            }
        }

        device.set_stencil(None);
    }
}
