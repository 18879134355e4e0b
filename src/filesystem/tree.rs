//! Arena-backed directory tree.
//!
//! Nodes live in a single vector and refer to each other by [`NodeId`]. A node is always
//! appended after its parent, so every child id is greater than the id of its parent and a
//! parent link can never close a cycle.

use getset::Getters;
use std::fmt::Write;

use super::dir_entry::{ATTR_DIRECTORY, ATTR_HIDDEN, ATTR_VOLUME_ID, DirEntry, FatTimestamp};
use crate::traits::TreeDisplay;

/// Index of a node inside a [`DirTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One file, directory or volume label found while walking the volume.
#[derive(Debug, Clone, Getters)]
pub struct DirNode {
    /// Short name in `NAME.EXT` form, empty for the root.
    #[get = "pub"]
    name: String,
    #[get = "pub"]
    attr: u8,
    #[get = "pub"]
    first_cluster: u32,
    #[get = "pub"]
    file_size: u32,
    /// Last cluster of the chain, set once the chain of the entry resolves.
    #[get = "pub"]
    last_cluster: Option<u32>,
    #[get = "pub"]
    created: FatTimestamp,
    #[get = "pub"]
    modified: FatTimestamp,
    #[get = "pub"]
    accessed: FatTimestamp,

    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl DirNode {
    fn root(first_cluster: u32) -> Self {
        Self {
            name: String::new(),
            attr: ATTR_DIRECTORY,
            first_cluster,
            file_size: 0,
            last_cluster: None,
            created: FatTimestamp::default(),
            modified: FatTimestamp::default(),
            accessed: FatTimestamp::default(),
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }

    /// Builds a detached node from a short name directory entry.
    pub fn from_entry(entry: &DirEntry) -> Self {
        Self {
            name: entry.short_name(),
            attr: *entry.attr(),
            first_cluster: entry.cluster_number(),
            file_size: *entry.file_size(),
            created: entry.created(),
            modified: entry.modified(),
            accessed: entry.accessed(),
            ..Self::root(0)
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attr & ATTR_DIRECTORY != 0
    }

    pub fn is_volume_label(&self) -> bool {
        self.attr & ATTR_VOLUME_ID != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.attr & ATTR_HIDDEN != 0
    }

    /// A regular file: neither a directory nor a volume label.
    pub fn is_file(&self) -> bool {
        !self.is_dir() && !self.is_volume_label()
    }
}

/// Directory hierarchy of one volume.
#[derive(Debug, Clone)]
pub struct DirTree {
    nodes: Vec<DirNode>,
}

impl DirTree {
    /// Creates a tree holding only the root directory.
    pub fn new(root_cluster: u32) -> Self {
        Self {
            nodes: vec![DirNode::root(root_cluster)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&DirNode> {
        self.nodes.get(id.0)
    }

    /// Records the last cluster of the chain of `id`.
    pub fn set_last_cluster(&mut self, id: NodeId, cluster: u32) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.last_cluster = Some(cluster);
        }
    }

    /// Appends `node` as the last child of `parent`.
    ///
    /// # Panics
    /// Panics if `parent` does not belong to this tree.
    pub fn append(&mut self, parent: NodeId, mut node: DirNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        let prev = self.nodes[parent.0].last_child;

        node.parent = Some(parent);
        node.prev_sibling = prev;
        node.first_child = None;
        node.last_child = None;
        node.next_sibling = None;
        self.nodes.push(node);

        match prev {
            Some(prev) => self.nodes[prev.0].next_sibling = Some(id),
            None => self.nodes[parent.0].first_child = Some(id),
        }
        self.nodes[parent.0].last_child = Some(id);

        id
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Iterates over the direct children of `id` in directory order.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.node(id).and_then(|n| n.first_child),
        }
    }

    /// Number of ancestors of `id`; the root has depth 0.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Absolute path of `id`, e.g. `/DIR/FILE.TXT`. The root is `/`.
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = vec![];
        let mut current = Some(id);

        while let Some(node_id) = current {
            if node_id == self.root() {
                break;
            }
            match self.node(node_id) {
                Some(node) => parts.push(node.name.as_str()),
                None => break,
            }
            current = self.parent(node_id);
        }

        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    /// Looks a node up by absolute path, matching every component case-insensitively.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root();

        for component in path.split('/').filter(|c| !c.is_empty()) {
            current = self
                .children(current)
                .find(|child| self.nodes[child.0].name.eq_ignore_ascii_case(component))?;
        }

        Some(current)
    }

    /// Pre-order traversal starting at the root.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![self.root()],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when only the root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Every regular file of the tree, in pre-order.
    pub fn files(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.iter().filter(|id| self.nodes[id.0].is_file())
    }

    /// Every directory of the tree except the root, in pre-order.
    pub fn directories(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.iter()
            .filter(|id| *id != self.root() && self.nodes[id.0].is_dir())
    }
}

pub struct Children<'a> {
    tree: &'a DirTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.nodes[current.0].next_sibling;
        Some(current)
    }
}

pub struct PreOrder<'a> {
    tree: &'a DirTree,
    stack: Vec<NodeId>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;

        let children: Vec<NodeId> = self.tree.children(current).collect();
        self.stack.extend(children.into_iter().rev());

        Some(current)
    }
}

impl TreeDisplay for DirTree {
    fn display_tree(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();

        for id in self.iter() {
            let Some(node) = self.node(id) else {
                continue;
            };

            if id == self.root() {
                writeln!(out, "/")?;
                continue;
            }

            let indent = " ".repeat(3 * self.depth(id));
            let hidden = if node.is_hidden() { " (hidden)" } else { "" };
            if node.is_dir() {
                writeln!(out, "{indent}{}/{hidden}", node.name)?;
            } else if node.is_volume_label() {
                writeln!(out, "{indent}[{}] (volume label)", node.name)?;
            } else {
                writeln!(
                    out,
                    "{indent}{} {}B cluster {} modified {}{hidden}",
                    node.name, node.file_size, node.first_cluster, node.modified
                )?;
            }
        }

        Ok(out)
    }
}
