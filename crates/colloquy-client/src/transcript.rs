//! Pure projection from display items to renderable nodes.
//!
//! The projection never feeds back into session state; a presentation
//! layer consumes the nodes through `RenderSink` and can be swapped out
//! without touching the core.

use serde::{Deserialize, Serialize};

use colloquy_protocol::{DisplayItem, DisplayRole};

/// A renderable node descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum RenderNode {
    /// One conversational leaf
    Text { role: DisplayRole, content: String },
    /// A disclosure element: collapsed summary, steps revealed on demand
    Disclosure {
        summary: String,
        steps: Vec<String>,
    },
    /// Inline failure marker for a run that died mid-stream
    Error { message: String },
}

/// Something that can present a rendered transcript.
///
/// Called with the full node list after every transcript change; the sink
/// decides how to make that incremental. `clear` is invoked on
/// conversation switch before the new transcript is projected.
pub trait RenderSink {
    fn clear(&mut self);
    fn render(&mut self, nodes: &[RenderNode]);
}

/// A sink that drops everything, for headless callers.
pub struct NullSink;

impl RenderSink for NullSink {
    fn clear(&mut self) {}
    fn render(&mut self, _nodes: &[RenderNode]) {}
}

/// Project display items into renderable nodes, in display order.
pub fn project(items: &[DisplayItem]) -> Vec<RenderNode> {
    items.iter().map(project_item).collect()
}

fn project_item(item: &DisplayItem) -> RenderNode {
    match item {
        DisplayItem::Text { role, content } => RenderNode::Text {
            role: *role,
            content: content.clone(),
        },
        DisplayItem::Plan { steps } => RenderNode::Disclosure {
            summary: format!("Plan ({} steps)", steps.len()),
            steps: steps.clone(),
        },
        DisplayItem::Error { message } => RenderNode::Error {
            message: message.clone(),
        },
    }
}
