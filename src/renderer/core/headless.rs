//! Headless recording device.
//!
//! [`HeadlessDevice`] implements [`RenderDevice`] without a GPU. Every call is
//! appended to a command log, resources live in slot maps, and a small amount
//! of per-texture bookkeeping (last clear values, draws since the clear) is
//! maintained so the effect of a frame can be inspected afterwards.
//!
//! It backs the integration tests and can drive the pipeline in tools that
//! only need the command stream (capture, validation, statistics).

use glam::Mat4;
use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;

use super::device::{
    Attachment, BlitMask, BlitRequest, BufferId, BufferKind, ClearOps, DepthState, FramebufferDesc,
    FramebufferId, InstanceStreams, MeshBuffers, Rect, RenderDevice, ShaderProgram, StencilSetup,
    TextureDesc, TextureId, UniformValue,
};
use crate::errors::{RenderError, Result};

/// Geometry issued by a draw command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawKind {
    Mesh(MeshBuffers),
    MeshInstanced(MeshBuffers, InstanceStreams),
    Quad(Option<InstanceStreams>),
    Screen,
    Cube,
}

/// Snapshot of the bound target and fixed-function state at a draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    pub kind: DrawKind,
    pub program: Option<ShaderProgram>,
    pub framebuffer: Option<FramebufferId>,
    pub viewport: Rect,
    pub scissor: Option<Rect>,
    pub draw_buffers: u32,
    pub depth: DepthState,
    pub stencil: Option<StencilSetup>,
    pub cull: Option<wgpu::Face>,
    pub blend: Option<wgpu::BlendState>,
    pub color_writes: wgpu::ColorWrites,
}

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    CreateTexture(TextureId, &'static str),
    DestroyTexture(TextureId),
    CreateFramebuffer(FramebufferId, &'static str),
    DestroyFramebuffer(FramebufferId),
    AttachDepth(FramebufferId, Attachment),
    BindFramebuffer(Option<FramebufferId>),
    DrawBuffers(u32),
    Viewport(Rect),
    Scissor(Option<Rect>),
    Clear(Option<FramebufferId>, ClearOps),
    Depth(DepthState),
    Stencil(Option<StencilSetup>),
    Cull(Option<wgpu::Face>),
    Blend(Option<wgpu::BlendState>),
    ColorWrites(wgpu::ColorWrites),
    UseProgram(ShaderProgram),
    Uniform(&'static str, UniformValue),
    UniformBlock(&'static str, usize),
    BindTexture(&'static str, Option<TextureId>),
    Draw(DrawRecord),
    Blit(BlitRequest),
}

/// Last clear values and draw count of a texture since that clear.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextureContents {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
    pub stencil: Option<u32>,
    pub draws_since_clear: u32,
}

/// Current fixed-function state.
#[derive(Debug, Clone, Copy)]
struct BoundState {
    framebuffer: Option<FramebufferId>,
    viewport: Rect,
    scissor: Option<Rect>,
    draw_buffers: u32,
    depth: DepthState,
    stencil: Option<StencilSetup>,
    cull: Option<wgpu::Face>,
    blend: Option<wgpu::BlendState>,
    color_writes: wgpu::ColorWrites,
    program: Option<ShaderProgram>,
}

/// A [`RenderDevice`] that records instead of rendering.
pub struct HeadlessDevice {
    screen: (u32, u32),
    unsupported: FxHashSet<wgpu::TextureFormat>,
    /// Live texture count past which creation fails.
    texture_limit: Option<usize>,
    textures: SlotMap<TextureId, TextureDesc>,
    framebuffers: SlotMap<FramebufferId, FramebufferDesc>,
    buffers: SlotMap<BufferId, (BufferKind, usize)>,
    contents: FxHashMap<TextureId, TextureContents>,
    uniforms: FxHashMap<&'static str, UniformValue>,
    state: BoundState,
    commands: Vec<GpuCommand>,
}

impl HeadlessDevice {
    /// Creates a device whose screen is `width` × `height`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: (width, height),
            unsupported: FxHashSet::default(),
            texture_limit: None,
            textures: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            contents: FxHashMap::default(),
            uniforms: FxHashMap::default(),
            state: BoundState {
                framebuffer: None,
                viewport: Rect::from_size(width, height),
                scissor: None,
                draw_buffers: 1,
                depth: DepthState::DISABLED,
                stencil: None,
                cull: Some(wgpu::Face::Back),
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                color_writes: wgpu::ColorWrites::ALL,
                program: None,
            },
            commands: Vec::new(),
        }
    }

    /// Marks formats as unsupported to exercise format fallback.
    #[must_use]
    pub fn with_unsupported_formats(mut self, formats: &[wgpu::TextureFormat]) -> Self {
        self.unsupported.extend(formats.iter().copied());
        self
    }

    /// Fails texture creation once `limit` textures are alive.
    #[must_use]
    pub fn with_texture_limit(mut self, limit: usize) -> Self {
        self.texture_limit = Some(limit);
        self
    }

    pub fn set_texture_limit(&mut self, limit: Option<usize>) {
        self.texture_limit = limit;
    }

    /// Changes the size of the default framebuffer (window resize).
    pub fn resize_screen(&mut self, width: u32, height: u32) {
        self.screen = (width, height);
    }

    // --- Inspection ---

    #[must_use]
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Drains the command log.
    pub fn take_commands(&mut self) -> Vec<GpuCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.commands.iter().filter_map(|cmd| match cmd {
            GpuCommand::Draw(record) => Some(record),
            _ => None,
        })
    }

    /// Draws issued while `program` was bound.
    pub fn draws_with(&self, program: ShaderProgram) -> impl Iterator<Item = &DrawRecord> {
        self.draws().filter(move |d| d.program == Some(program))
    }

    /// Programs in the order they were bound, consecutive duplicates removed.
    #[must_use]
    pub fn program_sequence(&self) -> Vec<ShaderProgram> {
        let mut sequence: Vec<ShaderProgram> = Vec::new();
        for cmd in &self.commands {
            if let GpuCommand::UseProgram(p) = cmd
                && sequence.last() != Some(p)
            {
                sequence.push(*p);
            }
        }
        sequence
    }

    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&TextureDesc> {
        self.textures.get(id)
    }

    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn framebuffer(&self, id: FramebufferId) -> Option<&FramebufferDesc> {
        self.framebuffers.get(id)
    }

    #[must_use]
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    #[must_use]
    pub fn contents(&self, texture: TextureId) -> TextureContents {
        self.contents.get(&texture).copied().unwrap_or_default()
    }

    /// Last value written to uniform `name`.
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }

    #[must_use]
    pub fn uniform_mat4(&self, name: &str) -> Option<Mat4> {
        match self.uniform(name) {
            Some(UniformValue::Mat4(m)) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn current_depth_state(&self) -> DepthState {
        self.state.depth
    }

    #[must_use]
    pub fn current_stencil(&self) -> Option<StencilSetup> {
        self.state.stencil
    }

    #[must_use]
    pub fn current_cull(&self) -> Option<wgpu::Face> {
        self.state.cull
    }

    #[must_use]
    pub fn current_blend(&self) -> Option<wgpu::BlendState> {
        self.state.blend
    }

    // --- Internals ---

    fn record(&mut self, cmd: GpuCommand) {
        trace!("headless: {cmd:?}");
        self.commands.push(cmd);
    }

    /// Textures the bound framebuffer writes to, honouring draw buffers.
    fn bound_targets(&self, include_color: bool, include_depth: bool) -> Vec<TextureId> {
        let Some(fb) = self.state.framebuffer.and_then(|id| self.framebuffers.get(id)) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        if include_color {
            out.extend(
                fb.color
                    .iter()
                    .take(self.state.draw_buffers as usize)
                    .map(|a| a.texture),
            );
        }
        if include_depth && let Some(ds) = fb.depth_stencil {
            out.push(ds.texture);
        }
        out
    }

    fn push_draw(&mut self, kind: DrawKind) {
        let s = self.state;
        let color = !s.color_writes.is_empty();
        let depth = (s.depth.test && s.depth.write) || s.stencil.is_some_and(|st| st.write_mask != 0);
        for texture in self.bound_targets(color, depth) {
            self.contents.entry(texture).or_default().draws_since_clear += 1;
        }
        self.record(GpuCommand::Draw(DrawRecord {
            kind,
            program: s.program,
            framebuffer: s.framebuffer,
            viewport: s.viewport,
            scissor: s.scissor,
            draw_buffers: s.draw_buffers,
            depth: s.depth,
            stencil: s.stencil,
            cull: s.cull,
            blend: s.blend,
            color_writes: s.color_writes,
        }));
    }
}

impl RenderDevice for HeadlessDevice {
    fn name(&self) -> &str {
        "headless"
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen
    }

    fn supports_format(&self, format: wgpu::TextureFormat) -> bool {
        !self.unsupported.contains(&format)
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::Device(format!(
                "texture '{}' has zero extent",
                desc.label
            )));
        }
        if !self.supports_format(desc.format) {
            return Err(RenderError::UnsupportedFormat {
                requested: desc.format,
            });
        }
        if self.texture_limit.is_some_and(|limit| self.textures.len() >= limit) {
            return Err(RenderError::Device(format!(
                "out of texture memory creating '{}'",
                desc.label
            )));
        }
        let id = self.textures.insert(desc.clone());
        self.record(GpuCommand::CreateTexture(id, desc.label));
        Ok(id)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(texture).is_some() {
            self.contents.remove(&texture);
            self.record(GpuCommand::DestroyTexture(texture));
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId> {
        let attachments = desc.color.iter().chain(desc.depth_stencil.iter());
        for attachment in attachments {
            if !self.textures.contains_key(attachment.texture) {
                return Err(RenderError::Device(format!(
                    "framebuffer '{}' references a destroyed texture",
                    desc.label
                )));
            }
        }
        let id = self.framebuffers.insert(desc.clone());
        self.record(GpuCommand::CreateFramebuffer(id, desc.label));
        Ok(id)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.remove(framebuffer).is_some() {
            if self.state.framebuffer == Some(framebuffer) {
                self.state.framebuffer = None;
            }
            self.record(GpuCommand::DestroyFramebuffer(framebuffer));
        }
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferId> {
        Ok(self.buffers.insert((kind, data.len())))
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(buffer);
    }

    fn attach_depth(&mut self, framebuffer: FramebufferId, attachment: Attachment) {
        if let Some(fb) = self.framebuffers.get_mut(framebuffer) {
            fb.depth_stencil = Some(attachment);
            self.record(GpuCommand::AttachDepth(framebuffer, attachment));
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.state.framebuffer = framebuffer;
        self.state.draw_buffers = framebuffer
            .and_then(|id| self.framebuffers.get(id))
            .map_or(1, |fb| fb.color.len() as u32);
        self.record(GpuCommand::BindFramebuffer(framebuffer));
    }

    fn set_draw_buffers(&mut self, count: u32) {
        self.state.draw_buffers = count;
        self.record(GpuCommand::DrawBuffers(count));
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.state.viewport = rect;
        self.record(GpuCommand::Viewport(rect));
    }

    fn set_scissor(&mut self, rect: Option<Rect>) {
        self.state.scissor = rect;
        self.record(GpuCommand::Scissor(rect));
    }

    fn clear(&mut self, ops: ClearOps) {
        let color = ops.color.is_some();
        let depth = ops.depth.is_some() || ops.stencil.is_some();
        for texture in self.bound_targets(color, depth) {
            let is_depth = self
                .textures
                .get(texture)
                .is_some_and(|t| t.format.is_depth_stencil_format());
            let entry = self.contents.entry(texture).or_default();
            if is_depth {
                if let Some(d) = ops.depth {
                    entry.depth = Some(d);
                }
                if let Some(s) = ops.stencil {
                    entry.stencil = Some(s);
                }
            } else if let Some(c) = ops.color {
                entry.color = Some(c);
            }
            entry.draws_since_clear = 0;
        }
        self.record(GpuCommand::Clear(self.state.framebuffer, ops));
    }

    fn set_depth_state(&mut self, state: DepthState) {
        self.state.depth = state;
        self.record(GpuCommand::Depth(state));
    }

    fn set_stencil(&mut self, setup: Option<StencilSetup>) {
        self.state.stencil = setup;
        self.record(GpuCommand::Stencil(setup));
    }

    fn set_cull_mode(&mut self, face: Option<wgpu::Face>) {
        self.state.cull = face;
        self.record(GpuCommand::Cull(face));
    }

    fn set_blend(&mut self, blend: Option<wgpu::BlendState>) {
        self.state.blend = blend;
        self.record(GpuCommand::Blend(blend));
    }

    fn set_color_writes(&mut self, writes: wgpu::ColorWrites) {
        self.state.color_writes = writes;
        self.record(GpuCommand::ColorWrites(writes));
    }

    fn use_program(&mut self, program: ShaderProgram) {
        self.state.program = Some(program);
        self.record(GpuCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, name: &'static str, value: UniformValue) {
        self.uniforms.insert(name, value);
        self.record(GpuCommand::Uniform(name, value));
    }

    fn set_uniform_block(&mut self, name: &'static str, bytes: &[u8]) {
        self.record(GpuCommand::UniformBlock(name, bytes.len()));
    }

    fn bind_texture(&mut self, slot: &'static str, texture: Option<TextureId>) {
        self.record(GpuCommand::BindTexture(slot, texture));
    }

    fn draw_mesh(&mut self, mesh: MeshBuffers) {
        self.push_draw(DrawKind::Mesh(mesh));
    }

    fn draw_mesh_instanced(&mut self, mesh: MeshBuffers, instances: InstanceStreams) {
        self.push_draw(DrawKind::MeshInstanced(mesh, instances));
    }

    fn draw_quad(&mut self, instances: Option<InstanceStreams>) {
        self.push_draw(DrawKind::Quad(instances));
    }

    fn draw_screen(&mut self) {
        self.push_draw(DrawKind::Screen);
    }

    fn draw_cube(&mut self) {
        self.push_draw(DrawKind::Cube);
    }

    fn blit(&mut self, request: BlitRequest) {
        let targets: Vec<TextureId> = request
            .destination
            .and_then(|id| self.framebuffers.get(id))
            .map(|fb| match request.mask {
                BlitMask::Color => fb.color.iter().map(|a| a.texture).collect(),
                BlitMask::Depth => fb.depth_stencil.iter().map(|a| a.texture).collect(),
            })
            .unwrap_or_default();
        for texture in targets {
            self.contents.entry(texture).or_default().draws_since_clear += 1;
        }
        self.record(GpuCommand::Blit(request));
    }
}
