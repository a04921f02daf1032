//! Draw Call Store Tests
//!
//! Tests for:
//! - Bucket routing (blend mode, FORCE_FORWARD, instancing)
//! - Ignored instanced submissions
//! - Frustum culling and NO_FRUSTUM_CULLING
//! - Distance sorting of single-call buckets
//! - Billboard rewrite at submission
//! - Sprite sheet UVs and particle systems

use glam::{Mat4, Vec2, Vec3};

use myth_pipeline::renderer::core::{BufferKind, GpuCommand, RenderDevice, ShaderProgram, UniformValue};
use myth_pipeline::renderer::graph::{Bucket, DrawGeometry};
use myth_pipeline::resources::{BillboardMode, BlendMode, BoundingBox, InstanceBatch, Material, Mesh, ParticleSystem, Sprite};
use myth_pipeline::scene::Camera;
use myth_pipeline::{HeadlessDevice, RenderFlags, Renderer, RendererSettings};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn approx_vec3(a: Vec3, b: Vec3) -> bool {
    approx(a.x, b.x) && approx(a.y, b.y) && approx(a.z, b.z)
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn renderer(flags: RenderFlags) -> Renderer<HeadlessDevice> {
    init_logger();
    Renderer::new(
        HeadlessDevice::new(640, 480),
        RendererSettings::new(640, 480).with_flags(flags),
    )
    .expect("headless renderer")
}

fn unit_cube(renderer: &mut Renderer<HeadlessDevice>) -> Mesh {
    let vertices = renderer
        .device_mut()
        .create_buffer(BufferKind::Vertex, &[0u8; 36 * 32])
        .expect("vertex buffer");
    Mesh::new(vertices, 36, BoundingBox::default())
}

fn front_camera() -> Camera {
    Camera::perspective(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 60.0)
}

fn blended() -> Material {
    Material::new().with_blend_mode(BlendMode::Alpha)
}

/// Translation of every draw issued with `program`, in submission order.
fn drawn_positions(r: &Renderer<HeadlessDevice>, program: ShaderProgram) -> Vec<Vec3> {
    let mut model = None;
    let mut positions = Vec::new();
    for command in r.device().commands() {
        match command {
            GpuCommand::Uniform(name, UniformValue::Mat4(m)) if *name == "uMatModel" => model = Some(*m),
            GpuCommand::Draw(draw) if draw.program == Some(program) => {
                positions.extend(model.map(|m| m.w_axis.truncate()));
            }
            _ => {}
        }
    }
    positions
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn opaque_material_goes_deferred_only() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);

    r.begin(&front_camera());
    r.draw_mesh(&cube, &Material::new(), Mat4::IDENTITY);

    let store = r.draw_calls();
    assert_eq!(store.bucket(Bucket::Deferred).len(), 1);
    assert!(store.forward().is_empty());
    assert!(store.deferred_instanced().is_empty());
    assert!(store.forward_instanced().is_empty());
}

#[test]
fn blended_material_goes_forward() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);

    r.begin(&front_camera());
    r.draw_mesh(&cube, &blended(), Mat4::IDENTITY);

    assert_eq!(r.draw_calls().forward().len(), 1);
    assert!(!r.draw_calls().has_deferred());
}

#[test]
fn force_forward_routes_opaque_forward() {
    let mut r = renderer(RenderFlags::FORCE_FORWARD);
    let cube = unit_cube(&mut r);

    r.begin(&front_camera());
    r.draw_mesh(&cube, &Material::new(), Mat4::IDENTITY);

    assert_eq!(r.draw_calls().forward().len(), 1);
    assert!(r.draw_calls().deferred().is_empty());
}

#[test]
fn instanced_calls_use_instanced_buckets() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);
    let transforms = r.device_mut().create_buffer(BufferKind::Instance, &[0u8; 64 * 4]).unwrap();
    let batch = InstanceBatch::new(transforms, 4);

    r.begin(&front_camera());
    r.draw_mesh_instanced(&cube, &Material::new(), &batch);
    r.draw_mesh_instanced(&cube, &blended(), &batch);

    assert_eq!(r.draw_calls().deferred_instanced().len(), 1);
    assert_eq!(r.draw_calls().forward_instanced().len(), 1);
    assert_eq!(r.draw_calls().len(), 2);
}

#[test]
fn empty_instanced_submissions_are_ignored() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);
    let transforms = r.device_mut().create_buffer(BufferKind::Instance, &[0u8; 64]).unwrap();

    let no_instances = InstanceBatch::new(transforms, 0);
    let no_buffer = InstanceBatch {
        transforms: None,
        ..InstanceBatch::new(transforms, 3)
    };

    r.begin(&front_camera());
    r.draw_mesh_instanced(&cube, &Material::new(), &no_instances);
    r.draw_mesh_instanced(&cube, &Material::new(), &no_buffer);

    assert!(r.draw_calls().is_empty());
}

#[test]
fn begin_clears_previous_submissions() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);

    r.begin(&front_camera());
    r.draw_mesh(&cube, &Material::new(), Mat4::IDENTITY);
    r.draw_mesh(&cube, &blended(), Mat4::IDENTITY);
    r.end();

    assert!(r.draw_calls().is_empty());

    r.begin(&front_camera());
    assert!(r.draw_calls().is_empty());
}

// ============================================================================
// Culling
// ============================================================================

#[test]
fn off_frustum_calls_are_culled() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);

    r.begin(&front_camera());
    r.draw_mesh(&cube, &Material::new(), Mat4::IDENTITY);
    // Behind the camera.
    r.draw_mesh(&cube, &Material::new(), Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0)));
    r.end();

    let drawn = drawn_positions(&r, ShaderProgram::Geometry);
    assert_eq!(drawn.len(), 1);
    assert!(approx_vec3(drawn[0], Vec3::ZERO));
}

#[test]
fn no_frustum_culling_keeps_everything() {
    let mut r = renderer(RenderFlags::NO_FRUSTUM_CULLING);
    let cube = unit_cube(&mut r);

    r.begin(&front_camera());
    r.draw_mesh(&cube, &Material::new(), Mat4::IDENTITY);
    r.draw_mesh(&cube, &Material::new(), Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0)));
    r.end();

    assert_eq!(drawn_positions(&r, ShaderProgram::Geometry).len(), 2);
}

#[test]
fn instanced_call_without_bounds_is_never_culled() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);
    let transforms = r.device_mut().create_buffer(BufferKind::Instance, &[0u8; 64]).unwrap();
    let batch = InstanceBatch::new(transforms, 1).with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0)));

    r.begin(&front_camera());
    r.draw_mesh_instanced(&cube, &Material::new(), &batch);
    r.end();

    assert_eq!(r.device().draws_with(ShaderProgram::GeometryInstanced).count(), 1);
}

#[test]
fn instanced_bounds_are_transformed_before_culling() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);
    let transforms = r.device_mut().create_buffer(BufferKind::Instance, &[0u8; 64]).unwrap();
    let batch = InstanceBatch::new(transforms, 1)
        .with_bounds(BoundingBox::default())
        .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0)));

    r.begin(&front_camera());
    r.draw_mesh_instanced(&cube, &Material::new(), &batch);
    r.end();

    assert_eq!(r.device().draws_with(ShaderProgram::GeometryInstanced).count(), 0);
}

// ============================================================================
// Sorting
// ============================================================================

fn depths(r: &Renderer<HeadlessDevice>, program: ShaderProgram) -> Vec<f32> {
    drawn_positions(r, program).iter().map(|p| p.z).collect()
}

#[test]
fn opaque_sorting_is_front_to_back() {
    let mut r = renderer(RenderFlags::OPAQUE_SORTING);
    let cube = unit_cube(&mut r);

    r.begin(&front_camera());
    for z in [-10.0, 0.0, -5.0] {
        r.draw_mesh(&cube, &Material::new(), Mat4::from_translation(Vec3::new(0.0, 0.0, z)));
    }
    r.end();

    assert_eq!(depths(&r, ShaderProgram::Geometry), vec![0.0, -5.0, -10.0]);
}

#[test]
fn transparent_sorting_is_back_to_front() {
    let mut r = renderer(RenderFlags::TRANSPARENT_SORTING);
    let cube = unit_cube(&mut r);

    r.begin(&front_camera());
    for z in [-5.0, 0.0, -10.0] {
        r.draw_mesh(&cube, &blended(), Mat4::from_translation(Vec3::new(0.0, 0.0, z)));
    }
    r.end();

    assert_eq!(depths(&r, ShaderProgram::Forward), vec![-10.0, -5.0, 0.0]);
}

// ============================================================================
// Billboards & Sprites
// ============================================================================

#[test]
fn front_billboard_faces_camera() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);
    let material = Material::new().with_billboard_mode(BillboardMode::Front);

    let camera = Camera::perspective(Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO, 60.0);
    r.begin(&camera);
    r.draw_mesh(&cube, &material, Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)));

    let call = r.draw_calls().deferred()[0];
    let inv_view = r.camera().inv_view;
    assert!(approx_vec3(call.position(), Vec3::new(0.0, 1.0, 0.0)));
    // Local +Z now points at the camera (+X in world).
    assert!(approx_vec3(call.transform.z_axis.truncate(), inv_view.z_axis.truncate()));
    assert!(approx_vec3(call.transform.z_axis.truncate(), Vec3::X));
}

#[test]
fn sprite_uses_current_frame_uvs() {
    let mut r = renderer(RenderFlags::empty());
    let mut sprite = Sprite::new(Material::new(), 4, 2);
    sprite.current_frame = 5.0;

    r.begin(&front_camera());
    r.draw_sprite_ex(&sprite, Vec3::ZERO, Vec2::new(2.0, 1.0), 0.0);

    let call = r.draw_calls().deferred()[0];
    let DrawGeometry::Sprite { uv_scale, uv_offset, quad } = call.geometry else {
        panic!("expected sprite geometry");
    };
    assert!(approx(uv_scale.x, 0.25) && approx(uv_scale.y, 0.5));
    assert!(approx(uv_offset.x, 0.25) && approx(uv_offset.y, 0.5));

    let bounds = BoundingBox::from_points(&quad);
    assert!(approx(bounds.size().x, 2.0));
    assert!(approx(bounds.size().y, 1.0));
}

#[test]
fn negative_sprite_size_mirrors_uvs() {
    let mut r = renderer(RenderFlags::empty());
    let sprite = Sprite::new(Material::new(), 2, 2);

    r.begin(&front_camera());
    r.draw_sprite_ex(&sprite, Vec3::ZERO, Vec2::new(-1.0, 1.0), 0.0);

    let DrawGeometry::Sprite { uv_scale, .. } = r.draw_calls().deferred()[0].geometry else {
        panic!("expected sprite geometry");
    };
    assert!(uv_scale.x < 0.0);
    assert!(uv_scale.y > 0.0);
}

#[test]
fn blended_sprite_goes_forward() {
    let mut r = renderer(RenderFlags::empty());
    let sprite = Sprite::new(blended(), 1, 1);

    r.begin(&front_camera());
    r.draw_sprite(&sprite, Vec3::ZERO);

    assert_eq!(r.draw_calls().forward().len(), 1);
}

#[test]
fn instanced_sprite_flips_v() {
    let mut r = renderer(RenderFlags::empty());
    let sprite = Sprite::new(Material::new(), 1, 1);
    let transforms = r.device_mut().create_buffer(BufferKind::Instance, &[0u8; 64 * 2]).unwrap();

    r.begin(&front_camera());
    r.draw_sprite_instanced(&sprite, &InstanceBatch::new(transforms, 2));

    let call = r.draw_calls().deferred_instanced()[0];
    let DrawGeometry::Sprite { uv_scale, .. } = call.geometry else {
        panic!("expected sprite geometry");
    };
    assert!(approx(uv_scale.y, -1.0));
    assert_eq!(call.instancing.map(|i| i.streams.count), Some(2));
}

#[test]
fn particle_system_submits_alive_instances() {
    let mut r = renderer(RenderFlags::empty());
    let cube = unit_cube(&mut r);
    let transforms = r.device_mut().create_buffer(BufferKind::Instance, &[0u8; 64 * 16]).unwrap();
    let system = ParticleSystem::new(transforms, None, 12, BoundingBox::new(Vec3::splat(-2.0), Vec3::splat(2.0)));

    r.begin(&front_camera());
    r.draw_particle_system(&system, &cube, &Material::new(), Mat4::IDENTITY);

    let call = r.draw_calls().deferred_instanced()[0];
    let instancing = call.instancing.expect("instanced call");
    assert_eq!(instancing.streams.count, 12);
    assert!(approx_vec3(instancing.aabb.max, Vec3::splat(2.0)));
}
