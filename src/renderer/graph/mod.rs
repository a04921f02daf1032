//! Frame orchestration
//!
//! Provides:
//! - [`DrawCallStore`]: per-frame draw calls routed into four buckets
//! - [`FrameLightBatch`]: visible lights with stencil effect IDs
//! - [`RenderTargets`]: G-buffer, accumulation, scene and post targets
//! - [`FrameBuilder`] / [`RenderNode`] / [`RenderStage`]: ordered pass execution
//! - [`FrameContext`]: read-only frame data shared by the passes
//! - [`passes`]: the pass implementations

pub mod builder;
pub mod context;
pub mod draw_call;
pub mod light_batch;
pub mod node;
pub mod passes;
pub mod projection;
pub mod shadow_utils;
pub mod stage;
pub mod stencil;
pub mod targets;

pub use builder::FrameBuilder;
pub use context::{FrameContext, OutputTarget};
pub use draw_call::{Bucket, DrawCall, DrawCallStore, DrawGeometry, Instancing};
pub use light_batch::{
    BatchedLight, EFFECT_ID_COUNT, FORWARD_LIGHT_CAPACITY, ForwardLightList, FrameLightBatch,
    GpuForwardLight, effect_id,
};
pub use node::RenderNode;
pub use stage::RenderStage;
pub use targets::{ColorTarget, RenderTargets, TargetFormats};
