//! GPU core layer
//!
//! Provides:
//! - [`RenderDevice`]: command-level device interface the pipeline drives
//! - [`HeadlessDevice`]: recording implementation (tests, capture tools)
//! - [`format`]: render-target format selection with ordered fallbacks

pub mod device;
pub mod format;
pub mod headless;

pub use device::{
    Attachment, BlitMask, BlitRequest, BufferId, BufferKind, ClearOps, CubeFace, DepthState,
    FramebufferDesc, FramebufferId, InstanceStreams, MeshBuffers, Rect, RenderDevice,
    ShaderProgram, StencilSetup, TextureDesc, TextureId, UniformValue,
};
pub use format::select_format;
pub use headless::{DrawKind, DrawRecord, GpuCommand, HeadlessDevice, TextureContents};
