//! Frame Pipeline
//!
//! [`Renderer`] owns every per-frame store, the light registry, the render
//! targets and one instance of each pass node. A frame is driven by:
//!
//! ```rust,ignore
//! renderer.begin(&camera);
//! renderer.draw_mesh(&mesh, &material, transform);
//! renderer.end();
//! ```
//!
//! `end()` runs, in order:
//! 1. light batching (visibility, shadow update policies, effect IDs)
//! 2. shadow maps, against the unculled draw calls
//! 3. frustum culling and distance sorting
//! 4. G-buffer, SSAO, ambient and stencil light volumes
//! 5. background, deferred composite, forward calls
//! 6. the post chain and the final blit to the output target

pub mod core;
pub mod graph;
pub mod settings;

use glam::{Mat4, Quat, Vec2, Vec3};
use log::{debug, error, info, trace, warn};

use self::core::RenderDevice;
use self::graph::draw_call::{apply_billboard, sprite_quad, sprite_transform};
use self::graph::passes::shadow::{finish_shadow_views, prepare_shadow_views};
use self::graph::passes::{
    AdjustmentPass, AmbientPass, BackgroundPass, BloomPass, DeferredCompositePass, DepthPrepass,
    FogPass, ForwardPass, FxaaPass, GBufferPass, LightVolumePass, OutputPass, PostInputPass,
    ShadowPass, SsaoPass, ToneMapPass,
};
use self::graph::targets::create_shadow_map;
use self::graph::{
    DrawCall, DrawCallStore, DrawGeometry, FrameBuilder, FrameContext, FrameLightBatch,
    Instancing, OutputTarget, RenderStage, RenderTargets,
};
use crate::errors::{RenderError, Result};
use crate::resources::{BoundingBox, Environment, InstanceBatch, Material, Mesh, ParticleSystem, Sprite};
use crate::scene::{Camera, FrameCamera, LightHandle, LightKind, LightRegistry, Shadow, ShadowMap};
use crate::utils::Timer;

pub use settings::{RenderFlags, RendererSettings};

const DEFAULT_NEAR: f32 = 0.05;
const DEFAULT_FAR: f32 = 4000.0;

/// One instance of every pass node; nodes are stateless and reused each frame.
#[derive(Debug, Default)]
struct FramePasses {
    shadow: ShadowPass,
    gbuffer: GBufferPass,
    ssao: SsaoPass,
    ambient: AmbientPass,
    light_volumes: LightVolumePass,
    background: BackgroundPass,
    deferred_composite: DeferredCompositePass,
    depth_prepass: DepthPrepass,
    forward: ForwardPass,
    post_input: PostInputPass,
    bloom: BloomPass,
    fog: FogPass,
    tone_map: ToneMapPass,
    adjustment: AdjustmentPass,
    fxaa: FxaaPass,
    output: OutputPass,
}

pub struct Renderer<D: RenderDevice> {
    device: D,
    settings: RendererSettings,
    flags: RenderFlags,
    /// `None` once allocation failed; `end()` is then a no-op.
    targets: Option<RenderTargets>,

    draw_calls: DrawCallStore,
    lights: LightRegistry,
    light_batch: FrameLightBatch,
    environment: Environment,

    camera: FrameCamera,
    near: f32,
    far: f32,
    scene_bounds: BoundingBox,
    timer: Timer,

    /// Custom destination of the final blit, `None` for the screen.
    output: Option<OutputTarget>,
    frame_open: bool,

    passes: FramePasses,
}

impl<D: RenderDevice> Renderer<D> {
    /// Allocates the render targets for `settings` on `device`.
    pub fn new(mut device: D, settings: RendererSettings) -> Result<Self> {
        if settings.width == 0 || settings.height == 0 {
            let err = RenderError::InvalidResolution {
                width: settings.width as i32,
                height: settings.height as i32,
            };
            error!("Renderer init failed: {err}");
            return Err(err);
        }

        let targets = RenderTargets::new(&mut device, settings.width, settings.height, settings.flags)
            .inspect_err(|e| error!("Renderer init failed: {e}"))?;

        info!(
            "Renderer initialized on '{}' at {}x{} (flags: {:?})",
            device.name(),
            settings.width,
            settings.height,
            settings.flags
        );

        Ok(Self {
            device,
            flags: settings.flags,
            settings,
            targets: Some(targets),
            draw_calls: DrawCallStore::new(),
            lights: LightRegistry::new(),
            light_batch: FrameLightBatch::new(),
            environment: Environment::default(),
            camera: FrameCamera::default(),
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            scene_bounds: BoundingBox::new(Vec3::splat(-100.0), Vec3::splat(100.0)),
            timer: Timer::new(),
            output: None,
            frame_open: false,
            passes: FramePasses::default(),
        })
    }

    /// Releases every target and shadow map, handing the device back.
    pub fn close(mut self) -> D {
        if let Some(targets) = self.targets.take() {
            targets.destroy(&mut self.device);
        }
        for (_, light) in self.lights.drain() {
            if let Some(shadow) = light.shadow {
                destroy_shadow_map(&mut self.device, shadow.map);
            }
        }
        info!("Renderer closed");
        self.device
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Starts a frame seen from `camera`, dropping the previous submissions.
    pub fn begin(&mut self, camera: &Camera) {
        if self.frame_open {
            debug!("begin() without end(), previous submissions discarded");
        }
        self.timer.tick();
        self.draw_calls.clear();

        let (width, height) = if self.flags.contains(RenderFlags::ASPECT_KEEP) {
            (self.settings.width, self.settings.height)
        } else {
            let output = self.output_target();
            (output.width, output.height)
        };
        let aspect = width as f32 / height.max(1) as f32;
        self.camera = FrameCamera::new(camera, aspect, self.near, self.far);
        self.frame_open = true;
    }

    /// Renders every submission of the frame to the output target.
    pub fn end(&mut self) {
        if !self.frame_open {
            warn!("end() called without a matching begin(), ignored");
            return;
        }
        self.frame_open = false;

        let output = self.output_target();
        let Some(targets) = self.targets.as_mut() else {
            debug!("end(): render targets unavailable, frame skipped");
            return;
        };

        self.light_batch
            .build(&mut self.lights, &self.camera.frustum, self.timer.delta);
        let shadow_views = prepare_shadow_views(&mut self.lights, &self.light_batch, &self.scene_bounds);

        sync_effect_targets(&mut self.device, targets, &self.environment);
        let targets = &*targets;

        // Casters outside the view still cast, so shadows render before culling.
        if !shadow_views.is_empty() {
            let ctx = FrameContext::new(
                &self.camera,
                &self.draw_calls,
                &self.lights,
                &self.light_batch,
                &shadow_views,
                &self.environment,
                targets,
                self.flags,
                output,
            );
            let mut builder = FrameBuilder::new();
            builder.add_node(RenderStage::ShadowMap, &self.passes.shadow);
            builder.execute(&ctx, &mut self.device);
        }

        if !self.flags.contains(RenderFlags::NO_FRUSTUM_CULLING) {
            let removed = self.draw_calls.cull(&self.camera.frustum);
            trace!("culled {removed} draw calls");
        }
        self.draw_calls.sort(
            self.camera.position,
            self.flags.contains(RenderFlags::OPAQUE_SORTING),
            self.flags.contains(RenderFlags::TRANSPARENT_SORTING),
        );

        let ctx = FrameContext::new(
            &self.camera,
            &self.draw_calls,
            &self.lights,
            &self.light_batch,
            &shadow_views,
            &self.environment,
            targets,
            self.flags,
            output,
        );
        let builder = build_frame(&self.passes, &ctx);
        debug!(
            "frame: {} draw calls, {} lights, {} shadow maps, {} nodes",
            self.draw_calls.len(),
            self.light_batch.len(),
            shadow_views.len(),
            builder.node_count()
        );
        builder.execute(&ctx, &mut self.device);

        finish_shadow_views(&mut self.lights, &shadow_views);
        self.draw_calls.clear();
    }

    // ========================================================================
    // Draw submission
    // ========================================================================

    fn submit(&mut self, call: DrawCall) {
        let bucket = self
            .draw_calls
            .push(call, self.flags.contains(RenderFlags::FORCE_FORWARD));
        trace!("draw call -> {bucket:?}");
    }

    pub fn draw_mesh(&mut self, mesh: &Mesh, material: &Material, transform: Mat4) {
        let transform = apply_billboard(&transform, material.billboard_mode, &self.camera.inv_view);
        self.submit(DrawCall::mesh(*mesh, *material, transform));
    }

    /// Draws `mesh` once per instance of `batch`.
    ///
    /// Batches without instances or without a transform buffer are ignored.
    pub fn draw_mesh_instanced(&mut self, mesh: &Mesh, material: &Material, batch: &InstanceBatch) {
        let Some(streams) = batch.streams() else {
            trace!("draw_mesh_instanced: empty batch ignored");
            return;
        };
        let instancing = Instancing {
            streams,
            aabb: batch.bounds.unwrap_or(BoundingBox::INFINITE),
        };
        self.submit(DrawCall::mesh(*mesh, *material, batch.transform).with_instancing(instancing));
    }

    /// Unit-sized sprite at `position`.
    pub fn draw_sprite(&mut self, sprite: &Sprite, position: Vec3) {
        self.draw_sprite_pro(sprite, position, Vec2::ONE, Vec3::Y, 0.0);
    }

    /// Sprite of `size`, rotated by `rotation` degrees around the Y axis.
    pub fn draw_sprite_ex(&mut self, sprite: &Sprite, position: Vec3, size: Vec2, rotation: f32) {
        self.draw_sprite_pro(sprite, position, size, Vec3::Y, rotation);
    }

    /// Sprite of `size`, rotated by `angle` degrees around `axis`.
    ///
    /// A negative size component mirrors the frame on that axis.
    pub fn draw_sprite_pro(&mut self, sprite: &Sprite, position: Vec3, size: Vec2, axis: Vec3, angle: f32) {
        let rotation = Quat::from_axis_angle(axis.normalize_or(Vec3::Y), angle.to_radians());
        let transform = sprite_transform(position, size, rotation);
        let transform = apply_billboard(&transform, sprite.material.billboard_mode, &self.camera.inv_view);

        let sign = Vec2::new(
            if size.x > 0.0 { 1.0 } else { -1.0 },
            if size.y > 0.0 { 1.0 } else { -1.0 },
        );
        let (uv_scale, uv_offset) = sprite.uv_scale_offset(sign);

        self.submit(DrawCall {
            transform,
            material: sprite.material,
            geometry: DrawGeometry::Sprite {
                quad: sprite_quad(&transform),
                uv_scale,
                uv_offset,
            },
            instancing: None,
        });
    }

    /// Sprite quads placed by the instance transforms of `batch`.
    ///
    /// Billboarding of instanced sprites happens in the vertex program.
    pub fn draw_sprite_instanced(&mut self, sprite: &Sprite, batch: &InstanceBatch) {
        let Some(streams) = batch.streams() else {
            trace!("draw_sprite_instanced: empty batch ignored");
            return;
        };
        let (uv_scale, uv_offset) = sprite.uv_scale_offset(Vec2::new(1.0, -1.0));
        self.submit(DrawCall {
            transform: batch.transform,
            material: sprite.material,
            geometry: DrawGeometry::Sprite {
                quad: sprite_quad(&batch.transform),
                uv_scale,
                uv_offset,
            },
            instancing: Some(Instancing {
                streams,
                aabb: batch.bounds.unwrap_or(BoundingBox::INFINITE),
            }),
        });
    }

    /// Draws the live particles of `system` as instances of `mesh`.
    pub fn draw_particle_system(
        &mut self,
        system: &ParticleSystem,
        mesh: &Mesh,
        material: &Material,
        transform: Mat4,
    ) {
        self.draw_mesh_instanced(mesh, material, &system.instance_batch(transform));
    }

    // ========================================================================
    // Lights
    // ========================================================================

    /// Creates a disabled light without shadows.
    pub fn create_light(&mut self, kind: LightKind) -> LightHandle {
        let handle = self.lights.create(kind);
        debug!("created {kind:?} light {handle:?}");
        handle
    }

    /// Destroys a light and its shadow map. Stale handles are ignored.
    pub fn destroy_light(&mut self, handle: LightHandle) {
        if let Some(light) = self.lights.remove(handle)
            && let Some(shadow) = light.shadow
        {
            destroy_shadow_map(&mut self.device, shadow.map);
        }
    }

    #[inline]
    #[must_use]
    pub fn lights(&self) -> &LightRegistry {
        &self.lights
    }

    /// Light mutators; stale handles log a warning and do nothing.
    #[inline]
    pub fn lights_mut(&mut self) -> &mut LightRegistry {
        &mut self.lights
    }

    /// Gives `handle` a shadow map of `resolution`² texels (a cube map for
    /// omni lights). Re-enabling with another resolution replaces the map.
    pub fn enable_shadow(&mut self, handle: LightHandle, resolution: u32) -> Result<()> {
        let light = self.lights.try_get_mut(handle)?;
        let resolution = resolution.max(1);

        if let Some(shadow) = light.shadow() {
            if shadow.map.resolution == resolution {
                return Ok(());
            }
            let map = shadow.map;
            light.shadow = None;
            destroy_shadow_map(&mut self.device, map);
        }

        let (texture, framebuffer) =
            create_shadow_map(&mut self.device, resolution, light.kind == LightKind::Omni)?;
        let map = ShadowMap {
            resolution,
            texture,
            framebuffer,
        };
        light.shadow = Some(Shadow::new(light.kind, map));
        debug!("shadow enabled on {handle:?} at {resolution}px");
        Ok(())
    }

    /// Removes the shadow map of `handle`, if any.
    pub fn disable_shadow(&mut self, handle: LightHandle) {
        let Some(light) = self.lights.get_mut(handle) else {
            warn!("disable_shadow: light {handle:?} is not alive");
            return;
        };
        if let Some(shadow) = light.shadow.take() {
            destroy_shadow_map(&mut self.device, shadow.map);
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Bounds the directional shadow projections are fitted to.
    pub fn set_scene_bounds(&mut self, bounds: BoundingBox) {
        self.scene_bounds = bounds;
    }

    #[inline]
    #[must_use]
    pub fn scene_bounds(&self) -> BoundingBox {
        self.scene_bounds
    }

    /// Camera clip planes, applied from the next `begin`.
    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        if near <= 0.0 || far <= near {
            warn!("set_clip_planes: invalid range {near}..{far} ignored");
            return;
        }
        self.near = near;
        self.far = far;
    }

    #[inline]
    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Effect targets follow the settings at the next `end`.
    #[inline]
    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: RenderFlags) {
        self.flags |= strip_init_only(flags);
    }

    pub fn clear_flags(&mut self, flags: RenderFlags) {
        self.flags &= !strip_init_only(flags);
    }

    /// Redirects the final blit; `None` goes back to the screen.
    pub fn set_render_target(&mut self, target: Option<OutputTarget>) {
        self.output = target;
    }

    /// Changes the internal resolution, reallocating every target.
    ///
    /// Zero or negative sizes are rejected; the current size is a no-op.
    pub fn update_resolution(&mut self, width: i32, height: i32) {
        if width <= 0 || height <= 0 {
            error!("update_resolution: {}", RenderError::InvalidResolution { width, height });
            return;
        }
        let (width, height) = (width as u32, height as u32);
        if self.targets.is_some() && (width, height) == (self.settings.width, self.settings.height) {
            return;
        }

        if let Some(targets) = self.targets.take() {
            targets.destroy(&mut self.device);
        }
        self.settings.width = width;
        self.settings.height = height;

        match RenderTargets::new(&mut self.device, width, height, self.settings.flags) {
            Ok(targets) => self.targets = Some(targets),
            Err(e) => error!("update_resolution: target allocation failed, rendering disabled: {e}"),
        }
    }

    /// Internal resolution.
    #[inline]
    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        (self.settings.width, self.settings.height)
    }

    /// Whether render targets are allocated and frames can be drawn.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.targets.is_some()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[inline]
    #[must_use]
    pub fn targets(&self) -> Option<&RenderTargets> {
        self.targets.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn draw_calls(&self) -> &DrawCallStore {
        &self.draw_calls
    }

    #[inline]
    #[must_use]
    pub fn light_batch(&self) -> &FrameLightBatch {
        &self.light_batch
    }

    #[inline]
    #[must_use]
    pub fn camera(&self) -> &FrameCamera {
        &self.camera
    }

    #[inline]
    #[must_use]
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Frame timer ticked by `begin`; set a fixed step for deterministic frames.
    #[inline]
    pub fn timer_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }

    fn output_target(&self) -> OutputTarget {
        self.output.unwrap_or_else(|| {
            let (width, height) = self.device.screen_size();
            OutputTarget::screen(width, height)
        })
    }
}

/// Registers the nodes taking part in this frame.
fn build_frame<'a>(passes: &'a FramePasses, ctx: &FrameContext<'_>) -> FrameBuilder<'a> {
    let env = ctx.environment;
    let has_deferred = ctx.draw_calls.has_deferred();
    let has_forward = ctx.draw_calls.has_forward();
    let mut builder = FrameBuilder::new();

    builder.add_node(RenderStage::Geometry, &passes.gbuffer);
    if has_deferred {
        if env.ssao.enabled && ctx.targets.ssao.is_some() {
            builder.add_node(RenderStage::Geometry, &passes.ssao);
        }
        builder
            .add_node(RenderStage::Lighting, &passes.ambient)
            .add_node(RenderStage::Lighting, &passes.light_volumes);
    }

    builder.add_node(RenderStage::Background, &passes.background);
    if has_deferred {
        builder.add_node(RenderStage::Background, &passes.deferred_composite);
    }

    if has_forward {
        if ctx.flags.contains(RenderFlags::DEPTH_PREPASS) {
            builder.add_node(RenderStage::Forward, &passes.depth_prepass);
        }
        builder.add_node(RenderStage::Forward, &passes.forward);
    }

    builder.add_node(RenderStage::PostProcess, &passes.post_input);
    if env.bloom.enabled() && ctx.targets.bloom.is_some() {
        builder.add_node(RenderStage::PostProcess, &passes.bloom);
    }
    if env.fog.enabled() {
        builder.add_node(RenderStage::PostProcess, &passes.fog);
    }
    if env.tone_mapping.is_active() {
        builder.add_node(RenderStage::PostProcess, &passes.tone_map);
    }
    builder.add_node(RenderStage::PostProcess, &passes.adjustment);
    if ctx.flags.contains(RenderFlags::FXAA) {
        builder.add_node(RenderStage::PostProcess, &passes.fxaa);
    }

    builder.add_node(RenderStage::Output, &passes.output);
    builder
}

/// Allocates or releases the SSAO and bloom targets to match `env`.
fn sync_effect_targets(device: &mut dyn RenderDevice, targets: &mut RenderTargets, env: &Environment) {
    if env.ssao.enabled {
        if let Err(e) = targets.ensure_ssao(device) {
            error!("SSAO targets unavailable, effect skipped: {e}");
        }
    } else {
        targets.release_ssao(device);
    }

    if env.bloom.enabled() {
        if let Err(e) = targets.ensure_bloom(device) {
            error!("Bloom targets unavailable, effect skipped: {e}");
        }
    } else {
        targets.release_bloom(device);
    }
}

fn destroy_shadow_map(device: &mut dyn RenderDevice, map: ShadowMap) {
    device.destroy_framebuffer(map.framebuffer);
    device.destroy_texture(map.texture);
}

fn strip_init_only(flags: RenderFlags) -> RenderFlags {
    let init_only = flags & RenderFlags::INIT_ONLY;
    if !init_only.is_empty() {
        warn!("{init_only:?} can only be chosen at init, ignored");
    }
    flags - RenderFlags::INIT_ONLY
}
