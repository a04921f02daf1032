//! Render Target Tests
//!
//! Tests for:
//! - Target allocation at init and format fallbacks
//! - Resolution changes (idempotence, invalid sizes, reallocation)
//! - Lazy SSAO and bloom targets
//! - Init-only flags and teardown
//! - Allocation failures releasing partial resources

use glam::Vec3;
use wgpu::TextureFormat;

use myth_pipeline::renderer::core::{BlitMask, GpuCommand, Rect, TextureId};
use myth_pipeline::renderer::graph::RenderTargets;
use myth_pipeline::resources::bloom::mip_chain_extents;
use myth_pipeline::{
    BloomMode, Camera, HeadlessDevice, LightKind, RenderError, RenderFlags, Renderer,
    RendererSettings,
};

/// G-buffer (5), light accumulation (2), scene, two post targets, BRDF LUT.
const BASE_TEXTURES: usize = 11;
/// G-buffer, light accumulation, scene, two post targets.
const BASE_FRAMEBUFFERS: usize = 5;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn renderer_on(device: HeadlessDevice, flags: RenderFlags) -> Renderer<HeadlessDevice> {
    init_logger();
    Renderer::new(device, RendererSettings::new(640, 480).with_flags(flags)).expect("headless renderer")
}

fn renderer() -> Renderer<HeadlessDevice> {
    renderer_on(HeadlessDevice::new(640, 480), RenderFlags::empty())
}

fn frame(r: &mut Renderer<HeadlessDevice>) {
    r.begin(&Camera::perspective(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 60.0));
    r.end();
}

// ============================================================================
// Initialization
// ============================================================================

#[test]
fn new_allocates_base_targets() {
    let r = renderer();
    assert!(r.is_ready());
    assert_eq!(r.resolution(), (640, 480));
    assert_eq!(r.device().texture_count(), BASE_TEXTURES);
    assert_eq!(r.device().framebuffer_count(), BASE_FRAMEBUFFERS);

    let targets = r.targets().unwrap();
    assert!(targets.ssao.is_none());
    assert!(targets.bloom.is_none());
    assert_eq!(targets.formats.hdr, TextureFormat::Rgba16Float);
    assert_eq!(targets.formats.post_hdr, TextureFormat::Rgba16Float);
    assert_eq!(targets.formats.depth_stencil, TextureFormat::Depth24PlusStencil8);
}

#[test]
fn new_rejects_zero_resolution() {
    init_logger();
    let result = Renderer::new(HeadlessDevice::new(640, 480), RendererSettings::new(0, 480));
    assert!(matches!(
        result,
        Err(RenderError::InvalidResolution { width: 0, height: 480 })
    ));
}

#[test]
fn hdr_format_falls_back() {
    let device = HeadlessDevice::new(640, 480).with_unsupported_formats(&[TextureFormat::Rgba16Float]);
    let r = renderer_on(device, RenderFlags::empty());

    let targets = r.targets().unwrap();
    assert_eq!(targets.formats.hdr, TextureFormat::Rgba32Float);
    let scene = r.device().texture(targets.scene.texture).unwrap();
    assert_eq!(scene.format, TextureFormat::Rgba32Float);
}

#[test]
fn depth_stencil_falls_back() {
    let device =
        HeadlessDevice::new(640, 480).with_unsupported_formats(&[TextureFormat::Depth24PlusStencil8]);
    let r = renderer_on(device, RenderFlags::empty());
    assert_eq!(
        r.targets().unwrap().formats.depth_stencil,
        TextureFormat::Depth32FloatStencil8
    );
}

#[test]
fn exhausted_fallbacks_fail_init() {
    init_logger();
    let device = HeadlessDevice::new(640, 480).with_unsupported_formats(&[
        TextureFormat::Depth24PlusStencil8,
        TextureFormat::Depth32FloatStencil8,
    ]);
    let result = Renderer::new(device, RendererSettings::new(640, 480));
    assert!(matches!(
        result,
        Err(RenderError::UnsupportedFormat {
            requested: TextureFormat::Depth24PlusStencil8
        })
    ));
}

#[test]
fn precision_flags_pick_smaller_formats() {
    let mut r = renderer_on(
        HeadlessDevice::new(640, 480),
        RenderFlags::LOW_PRECISION_BUFFERS | RenderFlags::EIGHT_BIT_NORMALS,
    );
    let formats = r.targets().unwrap().formats;
    assert_eq!(formats.emission, TextureFormat::Rg11b10Ufloat);
    assert_eq!(formats.post_hdr, TextureFormat::Rg11b10Ufloat);
    assert_eq!(formats.normal, TextureFormat::Rg8Unorm);
    assert_eq!(formats.hdr, TextureFormat::Rgba16Float);

    r.environment_mut().bloom.set_mode(BloomMode::Mix);
    frame(&mut r);

    let targets = r.targets().unwrap();
    let format_of = |id: TextureId| r.device().texture(id).unwrap().format;
    assert_eq!(format_of(targets.scene.texture), TextureFormat::Rgba16Float);
    assert_eq!(format_of(targets.lighting.diffuse), TextureFormat::Rgba16Float);
    for post in &targets.post {
        assert_eq!(format_of(post.texture), TextureFormat::Rg11b10Ufloat);
    }
    let mips = &targets.bloom.as_ref().expect("bloom chain").mips;
    assert!(!mips.is_empty());
    for mip in mips {
        assert_eq!(format_of(mip.texture), TextureFormat::Rg11b10Ufloat);
    }
}

#[test]
fn packed_post_format_falls_back() {
    let device = HeadlessDevice::new(640, 480).with_unsupported_formats(&[TextureFormat::Rg11b10Ufloat]);
    let r = renderer_on(device, RenderFlags::LOW_PRECISION_BUFFERS);
    let formats = r.targets().unwrap().formats;
    assert_eq!(formats.post_hdr, TextureFormat::Rgb9e5Ufloat);
    assert_eq!(formats.emission, formats.post_hdr);
}

#[test]
fn init_only_flags_cannot_change_later() {
    let mut r = renderer();
    r.set_flags(RenderFlags::LOW_PRECISION_BUFFERS | RenderFlags::FXAA);
    assert!(r.flags().contains(RenderFlags::FXAA));
    assert!(!r.flags().contains(RenderFlags::LOW_PRECISION_BUFFERS));

    let mut r = renderer_on(HeadlessDevice::new(640, 480), RenderFlags::EIGHT_BIT_NORMALS);
    r.clear_flags(RenderFlags::EIGHT_BIT_NORMALS);
    assert!(r.flags().contains(RenderFlags::EIGHT_BIT_NORMALS));
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn update_resolution_same_size_is_noop() {
    let mut r = renderer();
    let gbuffer = r.targets().unwrap().gbuffer;
    let scene = r.targets().unwrap().scene;
    let commands = r.device().commands().len();

    r.update_resolution(640, 480);

    assert_eq!(r.targets().unwrap().gbuffer, gbuffer);
    assert_eq!(r.targets().unwrap().scene, scene);
    assert_eq!(r.device().commands().len(), commands);
}

#[test]
fn update_resolution_ignores_invalid_sizes() {
    let mut r = renderer();
    r.update_resolution(0, 480);
    r.update_resolution(800, -1);

    assert!(r.is_ready());
    assert_eq!(r.resolution(), (640, 480));
    assert_eq!(r.device().texture_count(), BASE_TEXTURES);
}

#[test]
fn update_resolution_reallocates_targets() {
    let mut r = renderer();
    let old_scene = r.targets().unwrap().scene;

    r.update_resolution(1024, 768);

    assert_eq!(r.resolution(), (1024, 768));
    let targets = r.targets().unwrap();
    assert_eq!((targets.width, targets.height), (1024, 768));
    assert_ne!(targets.scene.framebuffer, old_scene.framebuffer);
    assert!(r.device().texture(old_scene.texture).is_none());

    let scene = r.device().texture(targets.scene.texture).unwrap();
    assert_eq!((scene.width, scene.height), (1024, 768));
    assert_eq!(r.device().texture_count(), BASE_TEXTURES);
    assert_eq!(r.device().framebuffer_count(), BASE_FRAMEBUFFERS);
}

#[test]
fn frames_render_at_new_resolution() {
    let mut r = renderer();
    r.update_resolution(320, 200);
    frame(&mut r);

    let color = r
        .device()
        .commands()
        .iter()
        .find_map(|c| match c {
            GpuCommand::Blit(b) if b.destination.is_none() && b.mask == BlitMask::Color => Some(*b),
            _ => None,
        })
        .unwrap();
    assert_eq!(color.source_rect, Rect::from_size(320, 200));
    assert_eq!(color.destination_rect, Rect::from_size(640, 480));
}

// ============================================================================
// Effect Targets
// ============================================================================

#[test]
fn ssao_targets_follow_setting() {
    let mut r = renderer();

    r.environment_mut().ssao.set_enabled(true);
    frame(&mut r);
    let ssao = r.targets().unwrap().ssao.as_ref().expect("ssao targets");
    assert_eq!((ssao.ping_pong[0].width, ssao.ping_pong[0].height), (320, 240));
    // Two blur targets plus the kernel and noise textures.
    assert_eq!(r.device().texture_count(), BASE_TEXTURES + 4);

    r.environment_mut().ssao.set_enabled(false);
    frame(&mut r);
    assert!(r.targets().unwrap().ssao.is_none());
    assert_eq!(r.device().texture_count(), BASE_TEXTURES);
}

#[test]
fn bloom_chain_follows_mode() {
    let mut r = renderer();
    let mips = mip_chain_extents(640, 480);

    r.environment_mut().bloom.set_mode(BloomMode::Screen);
    frame(&mut r);
    assert_eq!(r.targets().unwrap().bloom.as_ref().unwrap().mips.len(), mips.len());
    assert_eq!(r.device().texture_count(), BASE_TEXTURES + mips.len());

    r.environment_mut().bloom.set_mode(BloomMode::Disabled);
    frame(&mut r);
    assert!(r.targets().unwrap().bloom.is_none());
    assert_eq!(r.device().texture_count(), BASE_TEXTURES);
}

#[test]
fn effect_targets_survive_resize_lazily() {
    let mut r = renderer();
    r.environment_mut().bloom.set_mode(BloomMode::Additive);
    frame(&mut r);

    r.update_resolution(1280, 720);
    assert!(r.targets().unwrap().bloom.is_none());

    frame(&mut r);
    let chain = r.targets().unwrap().bloom.as_ref().unwrap();
    assert_eq!((chain.mips[0].width, chain.mips[0].height), (640, 360));
}

// ============================================================================
// Allocation Failures
// ============================================================================

#[test]
fn failed_target_allocation_releases_partial_targets() {
    init_logger();
    for limit in 0..BASE_TEXTURES {
        let mut device = HeadlessDevice::new(640, 480).with_texture_limit(limit);
        let result = RenderTargets::new(&mut device, 640, 480, RenderFlags::empty());
        assert!(matches!(result, Err(RenderError::Device(_))), "limit {limit}");
        assert_eq!(device.texture_count(), 0, "limit {limit}");
        assert_eq!(device.framebuffer_count(), 0, "limit {limit}");
    }

    let result = Renderer::new(
        HeadlessDevice::new(640, 480).with_texture_limit(BASE_TEXTURES - 1),
        RendererSettings::new(640, 480),
    );
    assert!(matches!(result, Err(RenderError::Device(_))));
}

#[test]
fn failed_ssao_allocation_does_not_leak() {
    let mut r = renderer();
    r.environment_mut().ssao.set_enabled(true);
    // Room for both blur targets and the kernel, not the noise texture.
    r.device_mut().set_texture_limit(Some(BASE_TEXTURES + 3));

    for _ in 0..3 {
        frame(&mut r);
        assert!(r.targets().unwrap().ssao.is_none());
        assert_eq!(r.device().texture_count(), BASE_TEXTURES);
        assert_eq!(r.device().framebuffer_count(), BASE_FRAMEBUFFERS);
    }

    r.device_mut().set_texture_limit(None);
    frame(&mut r);
    assert!(r.targets().unwrap().ssao.is_some());
    assert_eq!(r.device().texture_count(), BASE_TEXTURES + 4);
}

#[test]
fn failed_bloom_allocation_does_not_leak() {
    let mut r = renderer();
    r.environment_mut().bloom.set_mode(BloomMode::Additive);
    r.device_mut().set_texture_limit(Some(BASE_TEXTURES + 2));

    frame(&mut r);
    frame(&mut r);
    assert!(r.targets().unwrap().bloom.is_none());
    assert_eq!(r.device().texture_count(), BASE_TEXTURES);
    assert_eq!(r.device().framebuffer_count(), BASE_FRAMEBUFFERS);
}

#[test]
fn failed_shadow_map_keeps_light_unshadowed() {
    let mut r = renderer();
    let spot = r.create_light(LightKind::Spot);
    r.device_mut().set_texture_limit(Some(BASE_TEXTURES));

    assert!(matches!(r.enable_shadow(spot, 512), Err(RenderError::Device(_))));
    assert!(r.lights().get(spot).unwrap().shadow().is_none());
    assert_eq!(r.device().texture_count(), BASE_TEXTURES);
    assert_eq!(r.device().framebuffer_count(), BASE_FRAMEBUFFERS);
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn close_releases_every_texture() -> anyhow::Result<()> {
    init_logger();
    let mut r = Renderer::new(HeadlessDevice::new(640, 480), RendererSettings::new(640, 480))?;
    r.environment_mut().ssao.set_enabled(true);
    r.environment_mut().bloom.set_mode(BloomMode::Mix);
    let spot = r.create_light(LightKind::Spot);
    let omni = r.create_light(LightKind::Omni);
    r.enable_shadow(spot, 256)?;
    r.enable_shadow(omni, 128)?;
    frame(&mut r);

    let device = r.close();
    assert_eq!(device.texture_count(), 0);
    assert_eq!(device.framebuffer_count(), 0);
    Ok(())
}
