//! Frame Builder
//!
//! `FrameBuilder` collects the nodes taking part in one frame. Nodes are
//! registered conditionally (a frame without deferred draws has no lighting
//! node) and then executed in stage order.

use log::debug;
use smallvec::SmallVec;

use super::context::FrameContext;
use super::node::RenderNode;
use super::stage::RenderStage;
use crate::renderer::core::RenderDevice;

struct NodeEntry<'a> {
    stage: RenderStage,
    /// Insertion order within the stage (stable sort key).
    order: u16,
    node: &'a dyn RenderNode,
}

/// Per-frame node list.
///
/// ```ignore
/// let mut builder = FrameBuilder::new();
/// builder.add_node(RenderStage::Geometry, &gbuffer_pass);
/// builder.add_node(RenderStage::Output, &output_pass);
/// builder.execute(&ctx, device);
/// ```
///
/// Holds references only; nodes are owned by the caller.
pub struct FrameBuilder<'a> {
    nodes: SmallVec<[NodeEntry<'a>; 16]>,
    next_order: u16,
}

impl Default for FrameBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> FrameBuilder<'a> {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: SmallVec::new(),
            next_order: 0,
        }
    }

    /// Adds `node` to `stage`. Nodes of a stage run in the order they were added.
    #[inline]
    pub fn add_node(&mut self, stage: RenderStage, node: &'a dyn RenderNode) -> &mut Self {
        self.nodes.push(NodeEntry {
            stage,
            order: self.next_order,
            node,
        });
        self.next_order = self.next_order.wrapping_add(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Runs every node in stage order.
    pub fn execute(mut self, ctx: &FrameContext<'_>, device: &mut dyn RenderDevice) {
        self.nodes.sort_unstable_by_key(|e| (e.stage.order(), e.order));

        for entry in &self.nodes {
            debug!("[{}] {}", entry.stage.name(), entry.node.name());
            entry.node.run(ctx, device);
        }
    }
}
