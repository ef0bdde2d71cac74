//! Plain-terminal presentation of rendered transcript nodes.

use std::collections::BTreeSet;
use std::io::Write;

use colloquy_client::{RenderNode, RenderSink};
use colloquy_protocol::DisplayRole;

/// A line-oriented sink over stdout.
///
/// Render hands us the full node list after every change; we keep a
/// snapshot of what is on screen and print only the difference. The
/// streaming assistant turn keeps its line open while it is the tail
/// node; once something lands after it, later growth is deferred and the
/// final text is printed when the run resolves.
#[derive(Default)]
pub struct TerminalSink {
    /// Node-level snapshot of what has been printed
    shown: Vec<RenderNode>,
    /// Printed prefix of the open tail line, if one is open
    open: Option<String>,
    /// Indexes of shown nodes that changed after their line was closed
    dirty: BTreeSet<usize>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settle the screen once a run resolves: close the open line and
    /// print the final text of any node that changed after its line was
    /// already closed.
    pub fn finish_run(&mut self) {
        if self.open.take().is_some() {
            println!();
        }
        for index in std::mem::take(&mut self.dirty) {
            if let Some(node) = self.shown.get(index) {
                Self::print_node(node);
            }
        }
    }

    fn print_node(node: &RenderNode) {
        match node {
            RenderNode::Text { role, content } => {
                println!("{} {}", role_prefix(*role), content);
            }
            RenderNode::Disclosure { summary, steps } => {
                println!("agent> [{}]", summary);
                for (i, step) in steps.iter().enumerate() {
                    println!("         {}. {}", i + 1, step);
                }
            }
            RenderNode::Error { message } => {
                println!("error> {}", message);
            }
        }
    }
}

fn role_prefix(role: DisplayRole) -> &'static str {
    match role {
        DisplayRole::User => "you>  ",
        DisplayRole::Assistant => "agent>",
    }
}

impl RenderSink for TerminalSink {
    fn clear(&mut self) {
        self.shown.clear();
        self.open = None;
        self.dirty.clear();
        println!();
    }

    fn render(&mut self, nodes: &[RenderNode]) {
        // Grow the open tail line in place while it is still the tail.
        if let Some(printed) = self.open.clone() {
            let index = self.shown.len() - 1;
            let still_tail = index + 1 == nodes.len();
            match nodes.get(index) {
                Some(RenderNode::Text {
                    role: DisplayRole::Assistant,
                    content,
                }) if still_tail && content.starts_with(printed.as_str()) => {
                    print!("{}", &content[printed.len()..]);
                    let _ = std::io::stdout().flush();
                    self.open = Some(content.clone());
                    self.shown[index] = nodes[index].clone();
                    return;
                }
                _ => {
                    // Superseded or replaced in place: close the line.
                    println!();
                    self.open = None;
                }
            }
        }

        // Nodes already printed that changed in place (e.g. the streaming
        // turn updated behind an appended plan, or an error marker
        // replacing it). Defer text growth to finish_run; print
        // replacements of a different shape immediately.
        for index in 0..self.shown.len().min(nodes.len()) {
            if self.shown[index] == nodes[index] {
                self.dirty.remove(&index);
                continue;
            }
            self.shown[index] = nodes[index].clone();
            match &nodes[index] {
                RenderNode::Text { .. } => {
                    self.dirty.insert(index);
                }
                node => {
                    Self::print_node(node);
                    self.dirty.remove(&index);
                }
            }
        }

        // Newly appended nodes. The tail stays open when it is the
        // streaming assistant turn.
        for index in self.shown.len()..nodes.len() {
            let node = &nodes[index];
            let is_tail = index + 1 == nodes.len();
            if is_tail {
                if let RenderNode::Text {
                    role: DisplayRole::Assistant,
                    content,
                } = node
                {
                    print!("{} {}", role_prefix(DisplayRole::Assistant), content);
                    let _ = std::io::stdout().flush();
                    self.open = Some(content.clone());
                    self.shown.push(node.clone());
                    continue;
                }
            }
            Self::print_node(node);
            self.shown.push(node.clone());
        }
    }
}
