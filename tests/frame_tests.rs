//! Frame Execution Tests
//!
//! Tests for:
//! - End-to-end scenarios (directional light, bloom, letterbox, empty shadow map)
//! - Stage order and the post-processing chain
//! - Stencil geometry bit, depth pre-pass and forward light bound
//! - Final blit destination and the end-of-frame state reset

use glam::{Mat4, Vec2, Vec3, Vec4};

use myth_pipeline::renderer::core::{
    BlitMask, BlitRequest, BufferKind, DepthState, FramebufferDesc, FramebufferId, GpuCommand, Rect,
    RenderDevice, ShaderProgram, TextureDesc, UniformValue,
};
use myth_pipeline::renderer::graph::projection::project_point;
use myth_pipeline::renderer::graph::stencil::{self, GEOMETRY_BIT};
use myth_pipeline::renderer::graph::{FORWARD_LIGHT_CAPACITY, GpuForwardLight};
use myth_pipeline::resources::bloom::{apply_prefilter, mip_chain_extents};
use myth_pipeline::resources::{BloomMode, BlendMode, BoundingBox, FogMode, Material, Mesh, ToneMappingMode};
use myth_pipeline::scene::{Camera, LightHandle, LightKind};
use myth_pipeline::{HeadlessDevice, OutputTarget, RenderFlags, Renderer, RendererSettings};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn renderer_sized(
    internal: (u32, u32),
    screen: (u32, u32),
    flags: RenderFlags,
) -> Renderer<HeadlessDevice> {
    init_logger();
    Renderer::new(
        HeadlessDevice::new(screen.0, screen.1),
        RendererSettings::new(internal.0, internal.1).with_flags(flags),
    )
    .expect("headless renderer")
}

fn renderer(flags: RenderFlags) -> Renderer<HeadlessDevice> {
    renderer_sized((640, 480), (640, 480), flags)
}

fn unit_cube(renderer: &mut Renderer<HeadlessDevice>) -> Mesh {
    let vertices = renderer
        .device_mut()
        .create_buffer(BufferKind::Vertex, &[0u8; 36 * 32])
        .expect("vertex buffer");
    Mesh::new(vertices, 36, BoundingBox::default())
}

fn camera() -> Camera {
    Camera::perspective(Vec3::new(0.0, 2.0, 2.0), Vec3::ZERO, 60.0)
}

fn sun(r: &mut Renderer<HeadlessDevice>) -> LightHandle {
    let handle = r.create_light(LightKind::Directional);
    r.lights_mut().set_direction(handle, Vec3::new(-1.0, -1.0, -1.0));
    r.lights_mut().set_enabled(handle, true);
    handle
}

/// Blits whose destination is `destination` (`None` is the screen).
fn output_blits(device: &HeadlessDevice, destination: Option<FramebufferId>) -> Vec<BlitRequest> {
    device
        .commands()
        .iter()
        .filter_map(|c| match c {
            GpuCommand::Blit(b) if b.destination == destination => Some(*b),
            _ => None,
        })
        .collect()
}

const POST_PROGRAMS: [ShaderProgram; 7] = [
    ShaderProgram::BloomDownsample,
    ShaderProgram::BloomUpsample,
    ShaderProgram::Bloom,
    ShaderProgram::Fog,
    ShaderProgram::Tonemap,
    ShaderProgram::Adjustment,
    ShaderProgram::Fxaa,
];

fn post_sequence(device: &HeadlessDevice) -> Vec<ShaderProgram> {
    device
        .program_sequence()
        .into_iter()
        .filter(|p| POST_PROGRAMS.contains(p))
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn scenario_directional_light_and_cube() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);
    sun(&mut r);

    r.begin(&camera());
    r.draw_mesh(&cube, &Material::new(), Mat4::IDENTITY);
    r.end();

    let device = r.device();
    assert_eq!(device.draws_with(ShaderProgram::Geometry).count(), 1);
    assert_eq!(device.draws_with(ShaderProgram::Ambient).count(), 1);
    assert_eq!(device.draws_with(ShaderProgram::Lighting).count(), 1);
    assert_eq!(device.draws_with(ShaderProgram::Scene).count(), 1);
    assert_eq!(device.draws_with(ShaderProgram::Forward).count(), 0);

    let sequence = device.program_sequence();
    let position = |p| sequence.iter().position(|s| *s == p).unwrap();
    assert!(position(ShaderProgram::Geometry) < position(ShaderProgram::Ambient));
    assert!(position(ShaderProgram::Ambient) < position(ShaderProgram::Lighting));
    assert!(position(ShaderProgram::Lighting) < position(ShaderProgram::Scene));
    assert!(position(ShaderProgram::Scene) < position(ShaderProgram::Adjustment));

    let blits = output_blits(device, None);
    assert_eq!(blits.len(), 2);
    assert_eq!(blits[0].mask, BlitMask::Color);
    assert_eq!(blits[1].mask, BlitMask::Depth);

    assert!(r.draw_calls().deferred().is_empty());
    assert!(r.draw_calls().is_empty());
}

#[test]
fn scenario_bloom_over_emissive_cube() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);
    sun(&mut r);
    {
        let bloom = &mut r.environment_mut().bloom;
        bloom.set_mode(BloomMode::Mix);
        bloom.set_threshold(0.6);
        bloom.set_soft_threshold(0.5);
    }
    let material = Material::new().with_emission(Vec3::ONE, 5.0);

    r.begin(&camera());
    r.draw_mesh(&cube, &material, Mat4::IDENTITY);
    r.end();

    let mips = mip_chain_extents(640, 480);
    let chain = r.targets().unwrap().bloom.as_ref().expect("bloom chain allocated");
    assert_eq!(chain.mips.len(), mips.len());
    assert_eq!((chain.mips[0].width, chain.mips[0].height), (320, 240));

    let device = r.device();
    assert_eq!(device.draws_with(ShaderProgram::BloomDownsample).count(), mips.len());
    assert_eq!(device.draws_with(ShaderProgram::BloomUpsample).count(), mips.len() - 1);
    assert_eq!(device.draws_with(ShaderProgram::Bloom).count(), 1);

    let expected = r.environment().bloom.prefilter();
    assert_eq!(device.uniform("uPrefilter"), Some(UniformValue::Vec4(expected)));
    assert!(approx(expected.x, 0.6));
    assert_eq!(device.uniform("uEmissionEnergy"), Some(UniformValue::Float(5.0)));

    // First level only keeps brightness above threshold minus the knee (0.3).
    let Some(UniformValue::Vec4(prefilter)) = device.uniform("uPrefilter") else {
        panic!("prefilter not uploaded");
    };
    for step in 0..=200 {
        let brightness = step as f32 * 0.01;
        let out = apply_prefilter(Vec3::new(brightness, brightness * 0.5, 0.0), prefilter);
        if brightness <= 0.3 {
            assert!(out.max_element() < 1e-6, "{brightness} leaked {out:?}");
        } else {
            assert!(out.max_element() > 0.0, "{brightness} was cut");
        }
        if brightness >= 0.9 {
            assert!((out.x - (brightness - 0.6)).abs() < 1e-4, "{brightness} -> {out:?}");
        }
    }
}

#[test]
fn scenario_letterbox_keeps_internal_aspect() {
    let mut r = renderer_sized((800, 600), (1920, 1080), RenderFlags::ASPECT_KEEP);

    r.begin(&camera());
    r.end();

    let blits = output_blits(r.device(), None);
    let color = blits.iter().find(|b| b.mask == BlitMask::Color).unwrap();
    let rect = color.destination_rect;
    assert!(rect.x > 0);
    assert_eq!(rect.y, 0);
    assert_eq!(rect, Rect { x: 240, y: 0, width: 1440, height: 1080 });
    assert_eq!(color.source_rect, Rect::from_size(800, 600));
}

#[test]
fn scenario_spot_shadow_without_casters_is_cleared() {
    let mut r = renderer(RenderFlags::empty());
    let spot = r.create_light(LightKind::Spot);
    r.lights_mut().look_at(spot, Vec3::new(0.0, 5.0, 0.0), Vec3::ZERO);
    r.lights_mut().set_range(spot, 20.0);
    r.lights_mut().set_enabled(spot, true);
    r.enable_shadow(spot, 512).unwrap();

    r.begin(&camera());
    r.end();

    let map = r.lights().get(spot).unwrap().shadow().unwrap().map;
    let contents = r.device().contents(map.texture);
    assert_eq!(contents.depth, Some(1.0));
    assert_eq!(contents.draws_since_clear, 0);
}

#[test]
fn stretch_without_aspect_keep() {
    let mut r = renderer_sized((800, 600), (1920, 1080), RenderFlags::BLIT_LINEAR);

    r.begin(&camera());
    r.end();

    let blits = output_blits(r.device(), None);
    let color = blits.iter().find(|b| b.mask == BlitMask::Color).unwrap();
    assert_eq!(color.destination_rect, Rect::from_size(1920, 1080));
    assert_eq!(color.filter, wgpu::FilterMode::Linear);
    let depth = blits.iter().find(|b| b.mask == BlitMask::Depth).unwrap();
    assert_eq!(depth.filter, wgpu::FilterMode::Nearest);
}

#[test]
fn custom_render_target_receives_the_frame() {
    let mut r = renderer(RenderFlags::empty());
    let device = r.device_mut();
    let texture = device
        .create_texture(&TextureDesc::target_2d(
            "capture",
            320,
            240,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::FilterMode::Linear,
        ))
        .unwrap();
    let framebuffer = device
        .create_framebuffer(&FramebufferDesc {
            label: "capture",
            color: vec![texture.into()],
            depth_stencil: None,
        })
        .unwrap();
    r.set_render_target(Some(OutputTarget {
        framebuffer: Some(framebuffer),
        width: 320,
        height: 240,
    }));

    r.begin(&camera());
    r.end();

    let blits = output_blits(r.device(), Some(framebuffer));
    assert_eq!(blits.len(), 2);
    assert_eq!(blits[0].destination_rect, Rect::from_size(320, 240));
    assert!(output_blits(r.device(), None).is_empty());
}

// ============================================================================
// Deferred & Forward
// ============================================================================

#[test]
fn gbuffer_writes_geometry_bit() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);

    r.begin(&camera());
    r.draw_mesh(&cube, &Material::new(), Mat4::IDENTITY);
    r.end();

    let draw = r.device().draws_with(ShaderProgram::Geometry).next().unwrap();
    let setup = draw.stencil.expect("geometry stencil");
    assert_eq!(setup, stencil::geometry_write());
    assert_eq!(setup.apply_pass(0), GEOMETRY_BIT);
    assert_eq!(setup.apply_pass(0x05), GEOMETRY_BIT | 0x05);
    assert_eq!(draw.depth, DepthState::OPAQUE);

    let gbuffer = &r.targets().unwrap().gbuffer;
    assert_eq!(r.device().contents(gbuffer.depth_stencil).stencil, Some(0));
}

#[test]
fn omni_light_scissor_contains_its_sphere() {
    let mut r = renderer_sized((1000, 1000), (1000, 1000), RenderFlags::empty());
    let cube = unit_cube(&mut r);
    let center = Vec3::new(4.0, 0.0, -5.0);
    let radius = 3.0;
    let omni = r.create_light(LightKind::Omni);
    r.lights_mut().set_position(omni, center);
    r.lights_mut().set_range(omni, radius);
    r.lights_mut().set_enabled(omni, true);

    r.begin(&Camera::perspective(Vec3::ZERO, Vec3::NEG_Z, 90.0));
    r.draw_mesh(&cube, &Material::new(), Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)));
    r.end();

    let draw = r.device().draws_with(ShaderProgram::Lighting).next().expect("omni light drawn");
    let scissor = draw.scissor.expect("light scissored to its footprint");
    let vp = r.camera().view_projection;

    let inside = |p: Vec2| {
        p.x >= scissor.x as f32
            && p.y >= scissor.y as f32
            && p.x <= (scissor.x + scissor.width as i32) as f32
            && p.y <= (scissor.y + scissor.height as i32) as f32
    };
    for i in 0..=48 {
        let theta = i as f32 / 48.0 * std::f32::consts::PI;
        for j in 0..192 {
            let phi = j as f32 / 192.0 * std::f32::consts::TAU;
            let normal = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
            let p = project_point(center + normal * radius, &vp, 1000, 1000);
            let clamped = p.position.clamp(Vec2::ZERO, Vec2::splat(1000.0));
            assert!(inside(clamped), "{clamped:?} outside {scissor:?}");
        }
    }
}

#[test]
fn empty_frame_clears_background() {
    let mut r = renderer(RenderFlags::empty());
    r.environment_mut().background_color = Vec3::new(0.1, 0.2, 0.3);

    r.begin(&camera());
    r.end();

    let device = r.device();
    assert_eq!(device.draws_with(ShaderProgram::Geometry).count(), 0);
    assert_eq!(device.draws_with(ShaderProgram::Lighting).count(), 0);

    let targets = r.targets().unwrap();
    assert_eq!(device.contents(targets.gbuffer.depth_stencil).depth, Some(1.0));
    assert_eq!(device.contents(targets.scene.texture).color, Some([0.1, 0.2, 0.3, 1.0]));
}

#[test]
fn depth_prepass_runs_before_forward() {
    let mut r = renderer(RenderFlags::DEPTH_PREPASS);
    let cube = unit_cube(&mut r);
    let material = Material::new().with_blend_mode(BlendMode::Alpha);

    r.begin(&camera());
    r.draw_mesh(&cube, &material, Mat4::IDENTITY);
    r.end();

    let device = r.device();
    let sequence = device.program_sequence();
    let depth = sequence.iter().position(|p| *p == ShaderProgram::Depth).unwrap();
    let forward = sequence.iter().position(|p| *p == ShaderProgram::Forward).unwrap();
    assert!(depth < forward);

    let prepass = device.draws_with(ShaderProgram::Depth).next().unwrap();
    assert!(prepass.color_writes.is_empty());
    assert!(prepass.depth.write);

    let draw = device.draws_with(ShaderProgram::Forward).next().unwrap();
    assert!(!draw.depth.write);
    assert_eq!(draw.depth.compare, wgpu::CompareFunction::Equal);
    assert_eq!(draw.blend, BlendMode::Alpha.blend_state());
}

#[test]
fn forward_without_prepass_writes_depth() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);
    let material = Material::new().with_blend_mode(BlendMode::Additive);

    r.begin(&camera());
    r.draw_mesh(&cube, &material, Mat4::IDENTITY);
    r.end();

    let device = r.device();
    assert_eq!(device.draws_with(ShaderProgram::Depth).count(), 0);
    let draw = device.draws_with(ShaderProgram::Forward).next().unwrap();
    assert_eq!(draw.depth, DepthState::OPAQUE);
    assert_eq!(draw.stencil, Some(stencil::geometry_write()));
}

#[test]
fn forward_light_list_is_bounded() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);
    for _ in 0..10 {
        let light = r.create_light(LightKind::Omni);
        r.lights_mut().set_range(light, 5.0);
        r.lights_mut().set_enabled(light, true);
    }
    let material = Material::new().with_blend_mode(BlendMode::Alpha);

    r.begin(&camera());
    r.draw_mesh(&cube, &material, Mat4::IDENTITY);
    r.end();

    let device = r.device();
    assert_eq!(device.uniform("uLightCount"), Some(UniformValue::Int(FORWARD_LIGHT_CAPACITY as i32)));
    let block = device.commands().iter().rev().find_map(|c| match c {
        GpuCommand::UniformBlock("uLights", size) => Some(*size),
        _ => None,
    });
    assert_eq!(block, Some(FORWARD_LIGHT_CAPACITY * std::mem::size_of::<GpuForwardLight>()));
}

#[test]
fn forward_skips_lights_not_touching_the_mesh() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);
    let light = r.create_light(LightKind::Omni);
    r.lights_mut().set_position(light, Vec3::new(4.0, 0.0, 0.0));
    r.lights_mut().set_range(light, 1.0);
    r.lights_mut().set_enabled(light, true);
    let material = Material::new().with_blend_mode(BlendMode::Alpha);

    r.begin(&Camera::perspective(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 60.0));
    r.draw_mesh(&cube, &material, Mat4::IDENTITY);
    r.end();

    assert_eq!(r.light_batch().len(), 1);
    assert_eq!(r.device().uniform("uLightCount"), Some(UniformValue::Int(0)));
}

// ============================================================================
// Post Chain
// ============================================================================

#[test]
fn default_post_chain_is_adjustment_only() {
    let mut r = renderer(RenderFlags::empty());

    r.begin(&camera());
    r.end();

    assert_eq!(post_sequence(r.device()), vec![ShaderProgram::Adjustment]);
}

#[test]
fn post_chain_runs_in_fixed_order() {
    let mut r = renderer(RenderFlags::FXAA);
    {
        let env = r.environment_mut();
        env.bloom.set_mode(BloomMode::Additive);
        env.fog.mode = FogMode::ExpSquared;
        env.tone_mapping.set_mode(ToneMappingMode::Aces);
    }

    r.begin(&camera());
    r.end();

    assert_eq!(post_sequence(r.device()), POST_PROGRAMS.to_vec());
}

#[test]
fn linear_tonemap_with_exposure_runs() {
    let mut r = renderer(RenderFlags::empty());
    r.environment_mut().tone_mapping.set_exposure(2.0);

    r.begin(&camera());
    r.end();

    assert_eq!(
        post_sequence(r.device()),
        vec![ShaderProgram::Tonemap, ShaderProgram::Adjustment]
    );
}

#[test]
fn post_effects_ping_pong_between_targets() {
    let mut r = renderer(RenderFlags::FXAA);
    r.environment_mut().fog.mode = FogMode::Linear;

    r.begin(&camera());
    r.end();

    let targets = r.targets().unwrap();
    let post = [targets.post[0].framebuffer, targets.post[1].framebuffer];
    let device = r.device();
    let fog = device.draws_with(ShaderProgram::Fog).next().unwrap();
    let adjustment = device.draws_with(ShaderProgram::Adjustment).next().unwrap();
    let fxaa = device.draws_with(ShaderProgram::Fxaa).next().unwrap();

    // Scene copy lands in post[0]; each effect writes the other target.
    assert_eq!(fog.framebuffer, Some(post[1]));
    assert_eq!(adjustment.framebuffer, Some(post[0]));
    assert_eq!(fxaa.framebuffer, Some(post[1]));

    let color = output_blits(device, None)
        .into_iter()
        .find(|b| b.mask == BlitMask::Color)
        .unwrap();
    assert_eq!(color.source, post[1]);
}

// ============================================================================
// Frame Contract
// ============================================================================

#[test]
fn state_is_reset_after_end() {
    let mut r = renderer(RenderFlags::STENCIL_TEST | RenderFlags::DEPTH_PREPASS);
    let cube = unit_cube(&mut r);
    sun(&mut r);

    r.begin(&camera());
    r.draw_mesh(&cube, &Material::new(), Mat4::IDENTITY);
    r.draw_mesh(&cube, &Material::new().with_blend_mode(BlendMode::Alpha), Mat4::IDENTITY);
    r.end();

    let device = r.device();
    assert_eq!(device.current_stencil(), None);
    assert_eq!(device.current_cull(), Some(wgpu::Face::Back));
    assert_eq!(device.current_blend(), Some(wgpu::BlendState::ALPHA_BLENDING));
    assert_eq!(
        device.current_depth_state(),
        DepthState {
            test: false,
            write: true,
            compare: wgpu::CompareFunction::LessEqual,
        }
    );
    assert_eq!(
        device.commands().iter().rev().find_map(|c| match c {
            GpuCommand::BindFramebuffer(fb) => Some(*fb),
            _ => None,
        }),
        Some(None)
    );
}

#[test]
fn end_without_begin_does_nothing() {
    let mut r = renderer(RenderFlags::empty());
    r.begin(&camera());
    r.end();
    r.device_mut().take_commands();

    r.end();
    assert!(r.device().commands().is_empty());
}

#[test]
fn effect_targets_follow_environment() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);

    r.environment_mut().ssao.set_enabled(true);
    r.begin(&camera());
    r.draw_mesh(&cube, &Material::new(), Mat4::IDENTITY);
    r.end();
    assert!(r.targets().unwrap().ssao.is_some());
    assert_eq!(r.device().draws_with(ShaderProgram::Ssao).count(), 1);
    let iterations = r.environment().ssao.iterations() as usize;
    assert_eq!(r.device().draws_with(ShaderProgram::GaussianBlur).count(), iterations);

    r.environment_mut().ssao.set_enabled(false);
    r.begin(&camera());
    r.end();
    assert!(r.targets().unwrap().ssao.is_none());
}

#[test]
fn camera_uniforms_follow_clip_planes() {
    let mut r = renderer(RenderFlags::empty());
    r.set_clip_planes(0.5, 250.0);
    r.set_clip_planes(10.0, 1.0);

    r.begin(&camera());
    assert!(approx(r.camera().near, 0.5));
    assert!(approx(r.camera().far, 250.0));

    let near_point = r.camera().projection * Vec4::new(0.0, 0.0, -0.5, 1.0);
    assert!(approx(near_point.z / near_point.w, 0.0));
}
