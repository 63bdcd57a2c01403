// stepscope - interactive step debugger
// Copyright (C) 2024 The stepscope contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The mirror tree
//!
//! An arena of nodes by stable [`NodeId`] with an explicit child-index
//! map: frames hold variables, variables hold lazily expanded
//! attributes, attributes hold deeper attributes. No back references;
//! deletion is a worklist/fix-point over the parent links rather than
//! pointer-graph surgery, because children can be discovered after
//! their parent was queued.
//!
//! Removal is two-phase. A removed node is first *marked* (the
//! transient "pending delete" state a UI can highlight) and queued; the
//! next maintenance pass purges everything queued plus, transitively,
//! every node whose parent went away. Added/Modified marks settle back
//! to quiet in the same pass.

use std::collections::HashMap;
use std::fmt;

use stepscope_common::{FrameLine, SourceSpan};
use tracing::trace;

/// Stable handle of a mirror node. Never reused within one mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Transient highlight state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mark {
    /// Nothing recent.
    #[default]
    Quiet,
    /// Appeared since the previous maintenance pass.
    Added,
    /// Rebound since the previous maintenance pass.
    Modified,
    /// Flagged for removal; purged at the next maintenance pass and
    /// excluded from locator lookups meanwhile.
    PendingRemoval,
}

/// A mirrored call frame.
#[derive(Debug, Clone)]
pub struct FrameNode {
    /// Stable handle.
    pub id: NodeId,
    /// Depth at creation; 0 = oldest.
    pub depth: usize,
    /// Position, `line` updated in place on line-only changes.
    pub frame: FrameLine,
    /// Source range from the latest `seek`.
    pub span: Option<SourceSpan>,
    /// Highlight state.
    pub mark: Mark,
}

/// A mirrored variable binding.
#[derive(Debug, Clone)]
pub struct VariableNode {
    /// Stable handle.
    pub id: NodeId,
    /// Owning frame.
    pub parent: NodeId,
    /// Frame depth of the owning frame.
    pub depth: usize,
    /// Binding name.
    pub name: String,
    /// Last reported type name.
    pub type_name: String,
    /// Last reported rendering.
    pub rendered: String,
    /// Highlight state.
    pub mark: Mark,
}

/// A mirrored, lazily expanded attribute.
#[derive(Debug, Clone)]
pub struct AttributeNode {
    /// Stable handle.
    pub id: NodeId,
    /// Owning variable or attribute.
    pub parent: NodeId,
    /// Frame depth of the owning variable.
    pub depth: usize,
    /// Dotted path from the owning variable's name.
    pub path: String,
    /// Attribute name (last path segment).
    pub name: String,
    /// Last reported type name.
    pub type_name: String,
    /// Last reported rendering.
    pub rendered: String,
    /// Language-default marker (displayed dimmed).
    pub default: bool,
}

/// Any mirror node.
#[derive(Debug, Clone)]
pub enum Node {
    /// A call frame.
    Frame(FrameNode),
    /// A variable binding.
    Variable(VariableNode),
    /// An expanded attribute.
    Attribute(AttributeNode),
}

impl Node {
    fn parent(&self) -> Option<NodeId> {
        match self {
            Self::Frame(_) => None,
            Self::Variable(v) => Some(v.parent),
            Self::Attribute(a) => Some(a.parent),
        }
    }
}

/// The frontend's reconstructed copy of backend state, built only from
/// deltas.
#[derive(Debug, Default)]
pub struct Mirror {
    next_id: u64,
    nodes: HashMap<NodeId, Node>,
    /// Live frames in depth order (contiguous stack).
    frames: Vec<NodeId>,
    /// Variable registry, insertion order.
    variables: Vec<NodeId>,
    /// Attribute registry, insertion order; doubles as the record of
    /// which paths are expanded.
    attributes: Vec<NodeId>,
    /// Child index: parent -> direct children.
    children: HashMap<NodeId, Vec<NodeId>>,
    removal_queue: Vec<NodeId>,
    settle_queue: Vec<NodeId>,
}

impl Mirror {
    /// An empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Number of live frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Live frame at a depth.
    pub fn frame_at(&self, depth: usize) -> Option<&FrameNode> {
        match self.nodes.get(self.frames.get(depth)?) {
            Some(Node::Frame(frame)) => Some(frame),
            _ => None,
        }
    }

    /// Mutable live frame at a depth.
    pub fn frame_at_mut(&mut self, depth: usize) -> Option<&mut FrameNode> {
        let id = *self.frames.get(depth)?;
        match self.nodes.get_mut(&id) {
            Some(Node::Frame(frame)) => Some(frame),
            _ => None,
        }
    }

    /// Append a frame at the innermost end.
    pub fn push_frame(&mut self, frame: FrameLine) -> NodeId {
        let id = self.allocate();
        let depth = self.frames.len();
        self.nodes.insert(id, Node::Frame(FrameNode { id, depth, frame, span: None, mark: Mark::Quiet }));
        self.frames.push(id);
        id
    }

    /// Drop frames at depth >= `from`: mark them pending-removal, queue
    /// them, and truncate the live list. Their variables and attributes
    /// follow at the purge, via the parent links.
    pub fn truncate_frames(&mut self, from: usize) {
        for id in self.frames.split_off(from.min(self.frames.len())) {
            if let Some(Node::Frame(frame)) = self.nodes.get_mut(&id) {
                frame.mark = Mark::PendingRemoval;
            }
            self.removal_queue.push(id);
        }
    }

    /// Live (not pending-removal) variable by frame depth and name.
    pub fn variable(&self, depth: usize, name: &str) -> Option<&VariableNode> {
        self.variables.iter().find_map(|id| match self.nodes.get(id) {
            Some(Node::Variable(v))
                if v.depth == depth && v.name == name && v.mark != Mark::PendingRemoval =>
            {
                Some(v)
            }
            _ => None,
        })
    }

    /// Live variables of a frame depth, insertion order.
    pub fn variables_at(&self, depth: usize) -> Vec<&VariableNode> {
        self.variables
            .iter()
            .filter_map(|id| match self.nodes.get(id) {
                Some(Node::Variable(v)) if v.depth == depth && v.mark != Mark::PendingRemoval => {
                    Some(v)
                }
                _ => None,
            })
            .collect()
    }

    /// Insert a variable under the frame at `depth`, marked Added until
    /// the next maintenance pass.
    pub fn add_variable(&mut self, depth: usize, name: &str, type_name: &str, rendered: &str) -> Option<NodeId> {
        let parent = *self.frames.get(depth)?;
        let id = self.allocate();
        self.nodes.insert(
            id,
            Node::Variable(VariableNode {
                id,
                parent,
                depth,
                name: name.to_string(),
                type_name: type_name.to_string(),
                rendered: rendered.to_string(),
                mark: Mark::Added,
            }),
        );
        self.variables.push(id);
        self.children.entry(parent).or_default().push(id);
        self.settle_queue.push(id);
        Some(id)
    }

    /// Update a variable in place, marked Modified until the next
    /// maintenance pass.
    pub fn modify_variable(&mut self, id: NodeId, type_name: &str, rendered: &str) {
        if let Some(Node::Variable(v)) = self.nodes.get_mut(&id) {
            v.type_name = type_name.to_string();
            v.rendered = rendered.to_string();
            v.mark = Mark::Modified;
            self.settle_queue.push(id);
        }
    }

    /// Phase one of removal: mark and queue. The node stays visible (as
    /// pending) until the next maintenance pass.
    pub fn remove_variable(&mut self, id: NodeId) {
        if let Some(Node::Variable(v)) = self.nodes.get_mut(&id) {
            v.mark = Mark::PendingRemoval;
            self.removal_queue.push(id);
        }
    }

    /// Whether a node already has attribute children (i.e. its path is
    /// expanded). Used to de-duplicate expansion requests.
    pub fn has_attribute_children(&self, parent: NodeId) -> bool {
        self.children
            .get(&parent)
            .is_some_and(|kids| kids.iter().any(|id| matches!(self.nodes.get(id), Some(Node::Attribute(_)))))
    }

    /// Register one expanded attribute under `parent`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_attribute(
        &mut self,
        parent: NodeId,
        depth: usize,
        path: &str,
        name: &str,
        type_name: &str,
        rendered: &str,
        default: bool,
    ) -> NodeId {
        let id = self.allocate();
        self.nodes.insert(
            id,
            Node::Attribute(AttributeNode {
                id,
                parent,
                depth,
                path: path.to_string(),
                name: name.to_string(),
                type_name: type_name.to_string(),
                rendered: rendered.to_string(),
                default,
            }),
        );
        self.attributes.push(id);
        self.children.entry(parent).or_default().push(id);
        id
    }

    /// Attribute node by id.
    pub fn attribute(&self, id: NodeId) -> Option<&AttributeNode> {
        match self.nodes.get(&id) {
            Some(Node::Attribute(a)) => Some(a),
            _ => None,
        }
    }

    /// Update an attribute's rendering in place (the per-step `detail`
    /// re-query path).
    pub fn refresh_attribute(&mut self, id: NodeId, name: &str, type_name: &str, rendered: &str, default: bool) {
        if let Some(Node::Attribute(a)) = self.nodes.get_mut(&id) {
            a.name = name.to_string();
            a.type_name = type_name.to_string();
            a.rendered = rendered.to_string();
            a.default = default;
        }
    }

    /// Every currently expanded attribute, registry order:
    /// `(id, depth, path)`. These are re-queried on each step.
    pub fn expanded_attributes(&self) -> Vec<(NodeId, usize, String)> {
        self.attributes
            .iter()
            .filter_map(|id| {
                self.attribute(*id).map(|a| (a.id, a.depth, a.path.clone()))
            })
            .collect()
    }

    /// Variable node by id, live or pending.
    pub fn variable_node(&self, id: NodeId) -> Option<&VariableNode> {
        match self.nodes.get(&id) {
            Some(Node::Variable(v)) => Some(v),
            _ => None,
        }
    }

    /// Immediate collapse: purge the transitive attribute descendants
    /// of `parent` (fix-point, not two-phase), keeping `parent` itself.
    pub fn collapse_attributes(&mut self, parent: NodeId) {
        let mut doomed: Vec<NodeId> = Vec::new();
        loop {
            let mut changed = false;
            for id in &self.attributes {
                if doomed.contains(id) {
                    continue;
                }
                if let Some(Node::Attribute(a)) = self.nodes.get(id) {
                    if a.parent == parent || doomed.contains(&a.parent) {
                        doomed.push(*id);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        self.purge(doomed);
    }

    /// Maintenance pass: settle Added/Modified marks, then purge the
    /// removal queue plus the transitive closure of orphaned children.
    pub fn maintain(&mut self) {
        for id in std::mem::take(&mut self.settle_queue) {
            match self.nodes.get_mut(&id) {
                Some(Node::Variable(v)) if matches!(v.mark, Mark::Added | Mark::Modified) => {
                    v.mark = Mark::Quiet;
                }
                _ => {}
            }
        }

        let queued = std::mem::take(&mut self.removal_queue);
        if queued.is_empty() {
            return;
        }

        // Fix-point over the parent links: children may be discovered
        // after their parent was queued, so one pass is not enough.
        let mut doomed = queued;
        loop {
            let mut discovered = Vec::new();
            for (id, node) in &self.nodes {
                if doomed.contains(id) {
                    continue;
                }
                if node.parent().is_some_and(|p| doomed.contains(&p)) {
                    discovered.push(*id);
                }
            }
            if discovered.is_empty() {
                break;
            }
            doomed.extend(discovered);
        }
        self.purge(doomed);
    }

    fn purge(&mut self, doomed: Vec<NodeId>) {
        if doomed.is_empty() {
            return;
        }
        trace!(count = doomed.len(), "purging mirror nodes");
        for id in &doomed {
            if let Some(node) = self.nodes.remove(id) {
                if let Some(parent) = node.parent() {
                    if let Some(kids) = self.children.get_mut(&parent) {
                        kids.retain(|k| k != id);
                    }
                }
            }
            self.children.remove(id);
        }
        self.frames.retain(|id| !doomed.contains(id));
        self.variables.retain(|id| !doomed.contains(id));
        self.attributes.retain(|id| !doomed.contains(id));
    }
}
