// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An in-memory host tree that records every mutation.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use stratum_core::element::Props;
use stratum_core::error::HostError;
use stratum_core::host::HostConfig;
use stratum_core::scheduler::Microtask;

/// A node in a [`NoopHost`] tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One host call, as recorded by [`NoopHost`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostOp {
    /// `create_node`.
    Create {
        /// The new node.
        node: NodeId,
        /// Its tag.
        tag: String,
    },
    /// `create_text_node`.
    CreateText {
        /// The new node.
        node: NodeId,
        /// Its content.
        text: String,
    },
    /// `append_child`.
    Append {
        /// The parent.
        parent: NodeId,
        /// The appended node.
        child: NodeId,
    },
    /// `insert_before`.
    Insert {
        /// The parent.
        parent: NodeId,
        /// The inserted node.
        child: NodeId,
        /// The node it was inserted before.
        before: NodeId,
    },
    /// `remove_child`.
    Remove {
        /// The parent.
        parent: NodeId,
        /// The removed node.
        child: NodeId,
    },
    /// `set_text_content`.
    SetText {
        /// The text node.
        node: NodeId,
        /// The new content.
        text: String,
    },
    /// `set_visibility`.
    SetVisibility {
        /// The toggled node.
        node: NodeId,
        /// Whether it is now hidden.
        hidden: bool,
    },
    /// `apply_props`.
    ApplyProps {
        /// The updated node.
        node: NodeId,
    },
}

impl HostOp {
    /// Returns `true` for calls that create or attach nodes.
    #[must_use]
    pub fn is_creation(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::CreateText { .. })
    }
}

#[derive(Debug)]
struct NodeData {
    /// `None` for text nodes.
    tag: Option<String>,
    text: String,
    attrs: BTreeMap<String, String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    hidden: bool,
}

/// An in-memory [`HostConfig`].
///
/// Node [`NoopHost::CONTAINER`] exists from the start and serves as a root
/// container. Structural misuse (attaching a node that already has another
/// parent, removing a non-child, inserting before a missing reference) is
/// reported as a [`HostError`], leaving the tree untouched.
#[derive(Debug)]
pub struct NoopHost {
    nodes: Vec<NodeData>,
    ops: Vec<HostOp>,
    microtasks: VecDeque<Microtask>,
}

impl Default for NoopHost {
    fn default() -> Self {
        Self::new()
    }
}

impl NoopHost {
    /// The container created with the host.
    pub const CONTAINER: NodeId = NodeId(0);

    /// Creates a host holding only the container.
    #[must_use]
    pub fn new() -> Self {
        let mut host = Self {
            nodes: Vec::new(),
            ops: Vec::new(),
            microtasks: VecDeque::new(),
        };
        host.alloc(Some("root".into()), String::new());
        host
    }

    /// Creates an extra detached element to use as another root container.
    pub fn create_container(&mut self) -> NodeId {
        self.alloc(Some("root".into()), String::new())
    }

    fn alloc(&mut self, tag: Option<String>, text: String) -> NodeId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "test trees stay far below u32::MAX nodes"
        )]
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            tag,
            text,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            parent: None,
            hidden: false,
        });
        id
    }

    fn node(&self, id: NodeId) -> Result<&NodeData, HostError> {
        self.nodes
            .get(id.0 as usize)
            .ok_or_else(|| HostError::UnknownNode {
                node: format!("{id:?}"),
            })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, HostError> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or_else(|| HostError::UnknownNode {
                node: format!("{id:?}"),
            })
    }

    /// Fails if `child` is attached somewhere other than `parent`.
    fn check_attachable(&self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.node(parent)?;
        match self.node(child)?.parent {
            Some(p) if p != parent => Err(HostError::AlreadyMounted {
                child: format!("{child:?}"),
            }),
            _ => Ok(()),
        }
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        let node = &mut self.nodes[parent.0 as usize];
        node.children.retain(|c| *c != child);
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Every host call so far, in order.
    #[must_use]
    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    /// Returns and clears the call log.
    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Takes the oldest microtask requested through
    /// [`HostConfig::schedule_microtask`].
    pub fn take_microtask(&mut self) -> Option<Microtask> {
        self.microtasks.pop_front()
    }

    /// Number of queued microtasks.
    #[must_use]
    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.len()
    }

    /// The children of `node`, in order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0 as usize)
            .map_or(&[], |n| n.children.as_slice())
    }

    /// The parent of `node`, if attached.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0 as usize)?.parent
    }

    /// The tag of an element node; `None` for text nodes.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0 as usize)?.tag.as_deref()
    }

    /// The content of a text node.
    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<&str> {
        let data = self.nodes.get(node.0 as usize)?;
        data.tag.is_none().then_some(data.text.as_str())
    }

    /// An attribute of an element node.
    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(node.0 as usize)?.attrs.get(name).map(String::as_str)
    }

    /// Returns `true` if the node was hidden with `set_visibility`.
    #[must_use]
    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.nodes.get(node.0 as usize).is_some_and(|n| n.hidden)
    }

    /// Renders the children of `node` as markup, skipping hidden nodes.
    ///
    /// Elements print as `<tag a="1">…</tag>` with attributes in name order;
    /// text prints as is.
    #[must_use]
    pub fn render(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(node) {
            self.render_into(child, &mut out);
        }
        out
    }

    fn render_into(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.nodes.get(node.0 as usize) else {
            return;
        };
        if data.hidden {
            return;
        }
        let Some(tag) = &data.tag else {
            out.push_str(&data.text);
            return;
        };
        out.push('<');
        out.push_str(tag);
        for (name, value) in &data.attrs {
            out.push_str(&format!(" {name}=\"{value}\""));
        }
        out.push('>');
        for &child in &data.children {
            self.render_into(child, out);
        }
        out.push_str(&format!("</{tag}>"));
    }

    /// The concatenated text of the visible subtree below `node`.
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(node) {
            self.text_into(child, &mut out);
        }
        out
    }

    fn text_into(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.nodes.get(node.0 as usize) else {
            return;
        };
        if data.hidden {
            return;
        }
        if data.tag.is_none() {
            out.push_str(&data.text);
        }
        for &child in &data.children {
            self.text_into(child, out);
        }
    }
}

impl HostConfig for NoopHost {
    type Instance = NodeId;

    fn create_node(&mut self, tag: &str, props: &Props) -> NodeId {
        let node = self.alloc(Some(tag.into()), String::new());
        self.nodes[node.0 as usize].attrs = props.attrs.clone();
        self.ops.push(HostOp::Create {
            node,
            tag: tag.into(),
        });
        node
    }

    fn create_text_node(&mut self, content: &str) -> NodeId {
        let node = self.alloc(None, content.into());
        self.ops.push(HostOp::CreateText {
            node,
            text: content.into(),
        });
        node
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), HostError> {
        let (parent, child) = (*parent, *child);
        self.check_attachable(parent, child)?;
        self.detach(parent, child);
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        self.ops.push(HostOp::Append { parent, child });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        reference: &NodeId,
    ) -> Result<(), HostError> {
        let (parent, child, reference) = (*parent, *child, *reference);
        self.check_attachable(parent, child)?;
        if !self.node(parent)?.children.contains(&reference) {
            return Err(HostError::ReferenceNotFound {
                parent: format!("{parent:?}"),
                reference: format!("{reference:?}"),
            });
        }
        self.detach(parent, child);
        let node = self.node_mut(parent)?;
        let at = node
            .children
            .iter()
            .position(|c| *c == reference)
            .unwrap_or(node.children.len());
        node.children.insert(at, child);
        self.node_mut(child)?.parent = Some(parent);
        self.ops.push(HostOp::Insert {
            parent,
            child,
            before: reference,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), HostError> {
        let (parent, child) = (*parent, *child);
        if self.node(child)?.parent != Some(parent) {
            return Err(HostError::NotAChild {
                parent: format!("{parent:?}"),
                child: format!("{child:?}"),
            });
        }
        self.detach(parent, child);
        self.node_mut(child)?.parent = None;
        self.ops.push(HostOp::Remove { parent, child });
        Ok(())
    }

    fn set_text_content(&mut self, node: &NodeId, content: &str) {
        if let Some(data) = self.nodes.get_mut(node.0 as usize) {
            data.text = content.into();
        }
        self.ops.push(HostOp::SetText {
            node: *node,
            text: content.into(),
        });
    }

    fn set_visibility(&mut self, node: &NodeId, hidden: bool) {
        if let Some(data) = self.nodes.get_mut(node.0 as usize) {
            data.hidden = hidden;
        }
        self.ops.push(HostOp::SetVisibility {
            node: *node,
            hidden,
        });
    }

    fn apply_props(&mut self, node: &NodeId, props: &Props) {
        if let Some(data) = self.nodes.get_mut(node.0 as usize) {
            data.attrs.clone_from(&props.attrs);
        }
        self.ops.push(HostOp::ApplyProps { node: *node });
    }

    fn schedule_microtask(&mut self, task: Microtask) {
        self.microtasks.push_back(task);
    }
}
