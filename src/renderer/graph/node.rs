//! Render Node Trait
//!
//! Each node is one pass of the frame. Nodes are stateless between frames:
//! everything they read comes from the [`FrameContext`], everything they
//! write goes through the device.

use super::context::FrameContext;
use crate::renderer::core::RenderDevice;

/// A pass of the frame pipeline.
///
/// `run` must leave no state that a later pass relies on implicitly; every
/// pass sets the fixed-function state it needs before drawing.
pub trait RenderNode {
    /// Node name, used in debug logs.
    fn name(&self) -> &str;

    /// Records the pass's device commands.
    fn run(&self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice);
}
