//! Shadow Map Pass
//!
//! Renders depth for every batched light whose shadow is due this frame.
//! Directional and spot lights fill a single 2D map. Omni lights render six
//! cube faces, attaching each face in turn to the light's framebuffer.
//!
//! Projections are computed by [`prepare_shadow_views`] before the frame
//! context is built, since they are written back onto the lights for the
//! lighting and forward passes to sample with.

use glam::{Mat4, Vec3};
use log::trace;

use crate::renderer::core::{
    Attachment, ClearOps, CubeFace, DepthState, Rect, RenderDevice, ShaderProgram,
};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::FrameContext;
use crate::renderer::graph::light_batch::FrameLightBatch;
use crate::renderer::graph::shadow_utils::{
    LightProjection, directional_projection, omni_face_view, omni_projection, spot_projection,
};
use crate::resources::BoundingBox;
use crate::scene::{LightHandle, LightKind, LightRegistry, ShadowMap};

/// A shadow map to render this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowView {
    pub light: LightHandle,
    pub kind: LightKind,
    pub map: ShadowMap,
    pub projection: LightProjection,
    pub position: Vec3,
}

/// Collects the due shadows of the batch and stores their light-space
/// matrices and depth ranges on the lights.
pub fn prepare_shadow_views(
    registry: &mut LightRegistry,
    batch: &FrameLightBatch,
    scene_bounds: &BoundingBox,
) -> Vec<ShadowView> {
    let mut views = Vec::new();

    for batched in batch.iter() {
        let Some(light) = registry.get_mut(batched.handle) else {
            continue;
        };
        let Some(map) = light.shadow().filter(|s| s.should_update()).map(|s| s.map) else {
            continue;
        };

        let projection = match light.kind {
            LightKind::Directional => directional_projection(light.direction, scene_bounds),
            LightKind::Spot => spot_projection(light),
            LightKind::Omni => omni_projection(light),
        };
        light.near = projection.near;
        light.far = projection.far;
        if let Some(shadow) = light.shadow_mut() {
            shadow.view_projection = projection.view_projection();
        }

        trace!("shadow due for {:?} light {:?}", light.kind, batched.handle);
        views.push(ShadowView {
            light: batched.handle,
            kind: light.kind,
            map,
            projection,
            position: light.position,
        });
    }

    views
}

/// Consumes the pending updates of the rendered views.
pub fn finish_shadow_views(registry: &mut LightRegistry, views: &[ShadowView]) {
    for view in views {
        if let Some(shadow) = registry.get_mut(view.light).and_then(|l| l.shadow_mut()) {
            shadow.mark_rendered();
        }
    }
}

#[derive(Debug, Default)]
pub struct ShadowPass;

impl ShadowPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Draws every caster with `view_projection`. `cube` carries the light
    /// position and far plane for linear cube depth.
    fn draw_casters(
        ctx: &FrameContext<'_>,
        device: &mut dyn RenderDevice,
        view_projection: Mat4,
        cube: Option<(Vec3, f32)>,
    ) {
        let (single, instanced) = if cube.is_some() {
            (ShaderProgram::DepthCube, ShaderProgram::DepthCubeInstanced)
        } else {
            (ShaderProgram::Depth, ShaderProgram::DepthInstanced)
        };

        let mut bound = None;
        for call in ctx.draw_calls.shadow_casters() {
            let program = if call.is_instanced() { instanced } else { single };
            if bound != Some(program) {
                device.use_program(program);
                device.set_uniform("uMatViewProj", view_projection.into());
                device.set_uniform("uMatInvView", ctx.camera.inv_view.into());
                if let Some((position, far)) = cube {
                    device.set_uniform("uViewPosition", position.into());
                    device.set_uniform("uFar", far.into());
                }
                bound = Some(program);
            }
            device.set_cull_mode(call.material.shadow_cast_mode.cull_face());
            call.bind_depth_material(device);
            call.submit(device);
        }
    }
}

impl RenderNode for ShadowPass {
    fn name(&self) -> &str {
        "Shadow Pass"
    }

    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        device.set_depth_state(DepthState::OPAQUE);
        device.set_stencil(None);
        device.set_blend(None);
        device.set_scissor(None);
        device.set_color_writes(wgpu::ColorWrites::empty());

        for view in ctx.shadow_views {
            let res = view.map.resolution;
            device.bind_framebuffer(Some(view.map.framebuffer));
            device.set_viewport(Rect::from_size(res, res));

            match view.kind {
                LightKind::Omni => {
                    for face in CubeFace::ALL {
                        device.attach_depth(
                            view.map.framebuffer,
                            Attachment {
                                texture: view.map.texture,
                                face: Some(face),
                            },
                        );
                        device.clear(ClearOps::depth(1.0));
                        let vp = view.projection.projection * omni_face_view(view.position, face);
                        Self::draw_casters(ctx, device, vp, Some((view.position, view.projection.far)));
                    }
                }
                LightKind::Directional | LightKind::Spot => {
                    device.clear(ClearOps::depth(1.0));
                    Self::draw_casters(ctx, device, view.projection.view_projection(), None);
                }
            }
        }

        device.set_color_writes(wgpu::ColorWrites::ALL);
    }
}
