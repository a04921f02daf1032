//! GPU Device Abstraction
//!
//! The pipeline never talks to a graphics API directly. Every stage issues
//! commands through [`RenderDevice`], a command-level interface covering the
//! services the frame orchestration needs: texture and framebuffer lifetime,
//! fixed-function state, program binding, uniforms, draws and blits.
//!
//! Fixed-function state is expressed with `wgpu` vocabulary
//! ([`wgpu::CompareFunction`], [`wgpu::StencilState`], [`wgpu::BlendState`],
//! [`wgpu::Face`], [`wgpu::ColorWrites`]) so a backend can map it onto
//! pipeline descriptors without translation tables.
//!
//! Shader programs are identified by [`ShaderProgram`]; their source text and
//! compilation live in the backend.

use glam::{Mat4, Vec2, Vec3, Vec4};
use slotmap::new_key_type;

use crate::errors::Result;

new_key_type! {
    /// Handle to a device texture (2D, cube or 1D).
    pub struct TextureId;
    /// Handle to a device framebuffer object.
    pub struct FramebufferId;
    /// Handle to a device vertex, index or instance buffer.
    pub struct BufferId;
}

// ============================================================================
// Resource Descriptors
// ============================================================================

/// Describes a texture allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub dimension: wgpu::TextureViewDimension,
    pub mip_levels: u32,
    pub filter: wgpu::FilterMode,
    pub address_mode: wgpu::AddressMode,
    /// Initial texel data, tightly packed.
    pub data: Option<Vec<u8>>,
}

impl TextureDesc {
    /// A single-level, clamped 2D render target.
    #[must_use]
    pub fn target_2d(
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        filter: wgpu::FilterMode,
    ) -> Self {
        Self {
            label,
            width,
            height,
            format,
            dimension: wgpu::TextureViewDimension::D2,
            mip_levels: 1,
            filter,
            address_mode: wgpu::AddressMode::ClampToEdge,
            data: None,
        }
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: wgpu::TextureViewDimension) -> Self {
        self.dimension = dimension;
        self
    }

    #[must_use]
    pub fn with_address_mode(mut self, mode: wgpu::AddressMode) -> Self {
        self.address_mode = mode;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }
}

/// A texture bound to a framebuffer slot, optionally selecting a cube face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub texture: TextureId,
    pub face: Option<CubeFace>,
}

impl From<TextureId> for Attachment {
    fn from(texture: TextureId) -> Self {
        Self {
            texture,
            face: None,
        }
    }
}

/// Describes a framebuffer: colour attachments plus an optional depth(-stencil).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FramebufferDesc {
    pub label: &'static str,
    pub color: Vec<Attachment>,
    pub depth_stencil: Option<Attachment>,
}

/// Cube map faces in the conventional +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Buffer usage for [`RenderDevice::create_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
    Instance,
}

// ============================================================================
// Fixed-Function State
// ============================================================================

/// Depth test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    pub test: bool,
    pub write: bool,
    pub compare: wgpu::CompareFunction,
}

impl DepthState {
    pub const DISABLED: Self = Self {
        test: false,
        write: false,
        compare: wgpu::CompareFunction::Always,
    };

    /// Standard opaque depth: test `LessEqual`, write on.
    pub const OPAQUE: Self = Self {
        test: true,
        write: true,
        compare: wgpu::CompareFunction::LessEqual,
    };
}

/// Stencil configuration applied to both faces, plus the dynamic reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilSetup {
    pub face: wgpu::StencilFaceState,
    pub read_mask: u32,
    pub write_mask: u32,
    pub reference: u32,
}

impl StencilSetup {
    /// Expands into the pipeline-descriptor form.
    #[must_use]
    pub fn to_wgpu(&self) -> wgpu::StencilState {
        wgpu::StencilState {
            front: self.face,
            back: self.face,
            read_mask: self.read_mask,
            write_mask: self.write_mask,
        }
    }

    /// Whether a fragment with `stored` stencil value passes the test.
    #[must_use]
    pub fn passes(&self, stored: u32) -> bool {
        let lhs = self.reference & self.read_mask;
        let rhs = stored & self.read_mask;
        match self.face.compare {
            wgpu::CompareFunction::Never => false,
            wgpu::CompareFunction::Less => lhs < rhs,
            wgpu::CompareFunction::Equal => lhs == rhs,
            wgpu::CompareFunction::LessEqual => lhs <= rhs,
            wgpu::CompareFunction::Greater => lhs > rhs,
            wgpu::CompareFunction::NotEqual => lhs != rhs,
            wgpu::CompareFunction::GreaterEqual => lhs >= rhs,
            wgpu::CompareFunction::Always => true,
        }
    }

    /// Stencil value after a passing fragment with `stored` value is written.
    #[must_use]
    pub fn apply_pass(&self, stored: u32) -> u32 {
        let written = match self.face.pass_op {
            wgpu::StencilOperation::Keep => stored,
            wgpu::StencilOperation::Zero => 0,
            wgpu::StencilOperation::Replace => self.reference,
            wgpu::StencilOperation::Invert => !stored,
            wgpu::StencilOperation::IncrementClamp => (stored + 1).min(0xFF),
            wgpu::StencilOperation::DecrementClamp => stored.saturating_sub(1),
            wgpu::StencilOperation::IncrementWrap => (stored + 1) & 0xFF,
            wgpu::StencilOperation::DecrementWrap => stored.wrapping_sub(1) & 0xFF,
        };
        ((stored & !self.write_mask) | (written & self.write_mask)) & 0xFF
    }
}

/// A viewport or scissor rectangle in pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Which planes of the bound framebuffer to clear.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearOps {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
    pub stencil: Option<u32>,
}

impl ClearOps {
    #[must_use]
    pub fn color(rgba: [f32; 4]) -> Self {
        Self {
            color: Some(rgba),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn depth(value: f32) -> Self {
        Self {
            depth: Some(value),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_stencil(mut self, value: u32) -> Self {
        self.stencil = Some(value);
        self
    }

    #[must_use]
    pub fn with_depth(mut self, value: f32) -> Self {
        self.depth = Some(value);
        self
    }
}

// ============================================================================
// Programs, Uniforms and Draws
// ============================================================================

/// Internal shader programs the pipeline binds. Source and compilation are
/// owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderProgram {
    Geometry,
    GeometryInstanced,
    Forward,
    ForwardInstanced,
    Skybox,
    DepthVolume,
    Depth,
    DepthInstanced,
    DepthCube,
    DepthCubeInstanced,
    Ssao,
    GaussianBlur,
    AmbientIbl,
    Ambient,
    Lighting,
    Scene,
    BloomDownsample,
    BloomUpsample,
    Bloom,
    Fog,
    Tonemap,
    Adjustment,
    Fxaa,
}

/// A uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}
impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}
impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}
impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}
impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}
impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}
impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        Self::Mat4(v)
    }
}

/// Vertex input of a mesh draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffers {
    pub vertices: BufferId,
    pub vertex_count: u32,
    pub indices: Option<(BufferId, u32)>,
}

/// Per-instance streams of an instanced draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceStreams {
    pub transforms: BufferId,
    pub colors: Option<BufferId>,
    pub count: u32,
}

/// Framebuffer planes copied by a blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlitMask {
    Color,
    Depth,
}

/// A framebuffer-to-framebuffer copy. `None` destination means the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlitRequest {
    pub source: FramebufferId,
    pub destination: Option<FramebufferId>,
    pub source_rect: Rect,
    pub destination_rect: Rect,
    pub mask: BlitMask,
    pub filter: wgpu::FilterMode,
}

// ============================================================================
// RenderDevice Trait
// ============================================================================

/// Command-level GPU interface consumed by the frame pipeline.
///
/// Commands execute in call order. Implementations must be usable through a
/// `&mut dyn RenderDevice`, so the trait stays object safe.
pub trait RenderDevice {
    /// Short backend name for diagnostics.
    fn name(&self) -> &str;

    /// Size of the default (window) framebuffer.
    fn screen_size(&self) -> (u32, u32);

    /// Whether `format` can be used as a render attachment.
    fn supports_format(&self, format: wgpu::TextureFormat) -> bool;

    // --- Resources ---

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId>;
    fn destroy_texture(&mut self, texture: TextureId);
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferId>;
    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Replaces the depth attachment of `framebuffer` (cube face selection for
    /// omni shadow maps).
    fn attach_depth(&mut self, framebuffer: FramebufferId, attachment: Attachment);

    // --- Targets ---

    /// Binds a framebuffer; `None` binds the screen.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);
    /// Restricts fragment output to the first `count` colour attachments.
    fn set_draw_buffers(&mut self, count: u32);
    fn set_viewport(&mut self, rect: Rect);
    fn set_scissor(&mut self, rect: Option<Rect>);
    fn clear(&mut self, ops: ClearOps);

    // --- Fixed-function state ---

    fn set_depth_state(&mut self, state: DepthState);
    /// `None` disables the stencil test.
    fn set_stencil(&mut self, setup: Option<StencilSetup>);
    /// `None` disables face culling.
    fn set_cull_mode(&mut self, face: Option<wgpu::Face>);
    /// `None` disables blending.
    fn set_blend(&mut self, blend: Option<wgpu::BlendState>);
    fn set_color_writes(&mut self, writes: wgpu::ColorWrites);

    // --- Programs ---

    fn use_program(&mut self, program: ShaderProgram);
    fn set_uniform(&mut self, name: &'static str, value: UniformValue);
    /// Uploads a raw uniform block (e.g. the forward light array).
    fn set_uniform_block(&mut self, name: &'static str, bytes: &[u8]);
    /// Binds `texture` to the sampler named `slot`; `None` unbinds.
    fn bind_texture(&mut self, slot: &'static str, texture: Option<TextureId>);

    // --- Draws ---

    fn draw_mesh(&mut self, mesh: MeshBuffers);
    fn draw_mesh_instanced(&mut self, mesh: MeshBuffers, instances: InstanceStreams);
    /// Draws the unit quad used by sprites (positions in [-1, 1]).
    fn draw_quad(&mut self, instances: Option<InstanceStreams>);
    /// Draws a full-screen triangle/quad.
    fn draw_screen(&mut self);
    /// Draws the unit cube in [-1, 1]^3.
    fn draw_cube(&mut self);

    fn blit(&mut self, request: BlitRequest);
}
