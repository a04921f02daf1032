//! Deferred Lighting
//!
//! Two nodes write the light accumulation targets:
//!
//! - [`AmbientPass`] seeds diffuse (and specular with a sky) from IBL or the
//!   flat ambient colour, modulated by SSAO when available.
//! - [`LightVolumePass`] adds each batched light. Spot and omni lights first
//!   stamp their bounding volume into the stencil effect bits, then shade
//!   only where the stamp matches. Directional lights cover the screen.
//!
//! The projected rectangle of each stamped box is also used as a scissor,
//! and lights whose box misses the screen are skipped entirely.

use glam::{Mat4, Quat, Vec4};

use super::ADDITIVE_BLEND;
use crate::renderer::core::{ClearOps, DepthState, RenderDevice, ShaderProgram};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::FrameContext;
use crate::renderer::graph::light_batch::{BatchedLight, effect_id};
use crate::renderer::graph::projection::{LightFootprint, project_aabb_rect};
use crate::renderer::graph::stencil;
use crate::renderer::settings::RenderFlags;
use crate::scene::{Light, LightKind};

pub(crate) fn quat_uniform(q: Quat) -> Vec4 {
    Vec4::new(q.x, q.y, q.z, q.w)
}

// ============================================================================
// Ambient
// ============================================================================

#[derive(Debug, Default)]
pub struct AmbientPass;

impl AmbientPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for AmbientPass {
    fn name(&self) -> &str {
        "Ambient Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let targets = ctx.targets;
        let env = ctx.environment;

        device.bind_framebuffer(Some(targets.lighting.framebuffer));
        device.set_viewport(ctx.full_viewport());
        device.set_scissor(None);
        device.set_color_writes(wgpu::ColorWrites::ALL);
        device.clear(ClearOps::color([0.0; 4]));

        device.set_depth_state(DepthState::DISABLED);
        device.set_blend(None);
        device.set_cull_mode(None);
        device.set_stencil(
            ctx.flags
                .contains(RenderFlags::STENCIL_TEST)
                .then(stencil::geometry_test),
        );

        match &env.sky {
            Some(sky) => {
                device.use_program(ShaderProgram::AmbientIbl);
                device.bind_texture("uCubeIrradiance", Some(sky.irradiance));
                device.bind_texture("uCubePrefilter", Some(sky.prefilter));
                device.bind_texture("uTexBrdfLut", Some(targets.brdf_lut));
                device.set_uniform("uQuatSkybox", quat_uniform(env.sky_rotation).into());
                device.set_uniform("uIblDiffuse", env.ibl_diffuse.into());
                device.set_uniform("uIblSpecular", env.ibl_specular.into());
            }
            None => {
                // Flat ambient has no specular term.
                device.set_draw_buffers(1);
                device.use_program(ShaderProgram::Ambient);
                device.set_uniform("uAmbientColor", env.ambient_color.into());
            }
        }

        ctx.bind_camera(device);
        device.bind_texture("uTexAlbedo", Some(targets.gbuffer.albedo));
        device.bind_texture("uTexNormal", Some(targets.gbuffer.normal));
        device.bind_texture("uTexDepth", Some(targets.gbuffer.depth_stencil));
        device.bind_texture("uTexOrm", Some(targets.gbuffer.orm));

        let ssao = targets
            .ssao
            .as_ref()
            .filter(|_| env.ssao.enabled)
            .map(|s| s.result(env.ssao.iterations()).texture);
        device.set_uniform("uSsaoEnabled", ssao.is_some().into());
        device.bind_texture("uTexSsao", ssao);

        device.draw_screen();
        device.set_draw_buffers(2);
    }
}

// ============================================================================
// Light volumes
// ============================================================================

#[derive(Debug, Default)]
pub struct LightVolumePass;

impl LightVolumePass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Scissor rectangle of the stamped volume.
    fn footprint(ctx: &FrameContext<'_>, light: &Light, batched: &BatchedLight) -> LightFootprint {
        let (w, h) = ctx.resolution();
        match light.kind {
            LightKind::Directional => LightFootprint::full_screen(w, h),
            LightKind::Omni | LightKind::Spot => {
                project_aabb_rect(&batched.aabb, &ctx.camera.view_projection, w, h)
            }
        }
    }

    /// Stamps the light's bounding box into the effect bits.
    fn stamp_volume(ctx: &FrameContext<'_>, device: &mut dyn RenderDevice, batched: &BatchedLight, effect: u32) {
        let aabb = &batched.aabb;
        let model = Mat4::from_scale_rotation_translation(aabb.size() * 0.5, Quat::IDENTITY, aabb.center());

        device.use_program(ShaderProgram::DepthVolume);
        device.set_uniform("uMatMVP", (ctx.camera.view_projection * model).into());
        let setup = if ctx.flags.contains(RenderFlags::STENCIL_TEST) {
            stencil::effect_write_on_geometry(effect)
        } else {
            stencil::effect_write(effect)
        };
        device.set_stencil(Some(setup));
        device.set_color_writes(wgpu::ColorWrites::empty());
        device.draw_cube();
    }
}

/// Uploads the `uLight` struct of the lighting program.
fn send_light(device: &mut dyn RenderDevice, light: &Light) {
    device.set_uniform("uLight.color", light.color.into());
    device.set_uniform("uLight.specular", light.specular.into());
    device.set_uniform("uLight.energy", light.energy.into());
    device.set_uniform("uLight.type", light.kind.shader_index().into());

    match light.kind {
        LightKind::Directional => {
            device.set_uniform("uLight.direction", light.direction.into());
        }
        LightKind::Spot => {
            device.set_uniform("uLight.position", light.position.into());
            device.set_uniform("uLight.direction", light.direction.into());
            device.set_uniform("uLight.range", light.range.into());
            device.set_uniform("uLight.attenuation", light.attenuation.into());
            device.set_uniform("uLight.innerCutOff", light.inner_cutoff.into());
            device.set_uniform("uLight.outerCutOff", light.outer_cutoff.into());
        }
        LightKind::Omni => {
            device.set_uniform("uLight.position", light.position.into());
            device.set_uniform("uLight.range", light.range.into());
            device.set_uniform("uLight.attenuation", light.attenuation.into());
        }
    }

    let Some(shadow) = light.shadow() else {
        device.set_uniform("uLight.shadow", false.into());
        return;
    };
    if light.kind == LightKind::Omni {
        device.bind_texture("uLight.shadowCubemap", Some(shadow.map.texture));
    } else {
        device.set_uniform("uLight.shadowMapTxlSz", shadow.map.texel_size().into());
        device.bind_texture("uLight.shadowMap", Some(shadow.map.texture));
        device.set_uniform("uLight.matVP", shadow.view_projection().into());
        if light.kind == LightKind::Directional {
            device.set_uniform("uLight.position", light.position.into());
        }
    }
    device.set_uniform("uLight.shadowSoftness", shadow.softness.into());
    device.set_uniform("uLight.shadowBias", shadow.bias.into());
    device.set_uniform("uLight.near", light.near.into());
    device.set_uniform("uLight.far", light.far.into());
    device.set_uniform("uLight.shadow", true.into());
}

impl RenderNode for LightVolumePass {
    fn name(&self) -> &str {
        "Light Volume Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        let targets = ctx.targets;

        device.bind_framebuffer(Some(targets.lighting.framebuffer));
        device.set_viewport(ctx.full_viewport());
        device.set_draw_buffers(2);
        device.set_cull_mode(None);
        device.set_depth_state(DepthState::DISABLED);
        device.set_blend(Some(ADDITIVE_BLEND));

        for (index, batched, light) in ctx.light_batch.resolve(ctx.lights) {
            let footprint = Self::footprint(ctx, light, batched);
            if !footprint.visible {
                continue;
            }
            device.set_scissor((!footprint.covers_screen).then_some(footprint.rect));

            let effect = effect_id(index);
            if light.kind != LightKind::Directional {
                Self::stamp_volume(ctx, device, batched, effect);
            }

            device.use_program(ShaderProgram::Lighting);
            ctx.bind_camera(device);
            device.bind_texture("uTexAlbedo", Some(targets.gbuffer.albedo));
            device.bind_texture("uTexNormal", Some(targets.gbuffer.normal));
            device.bind_texture("uTexDepth", Some(targets.gbuffer.depth_stencil));
            device.bind_texture("uTexOrm", Some(targets.gbuffer.orm));

            if light.kind == LightKind::Directional {
                device.set_stencil(None);
            } else {
                device.set_stencil(Some(stencil::effect_test(effect)));
            }
            send_light(device, light);

            device.set_color_writes(wgpu::ColorWrites::ALL);
            device.draw_screen();
        }

        device.set_scissor(None);
        device.set_stencil(None);
        device.set_blend(None);
        device.bind_texture("uLight.shadowMap", None);
        device.bind_texture("uLight.shadowCubemap", None);
    }
}
