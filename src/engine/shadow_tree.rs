//! Shadow Tree - Owns every ShadowNode and the root set.
//!
//! Nodes live in one tag-keyed map. Parent and child links are tags, so the
//! tree can be mutated freely without reference cycles. Roots are kept in a
//! separate ordered set.

use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use crate::error::{Result, UiError};
use crate::types::Tag;

use super::shadow_node::{NodeFlags, ShadowNode};

#[derive(Debug, Default)]
pub struct ShadowTree {
    nodes: HashMap<Tag, ShadowNode>,
    roots: BTreeSet<Tag>,
}

impl ShadowTree {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a root node.
    pub fn add_root_node(&mut self, node: ShadowNode) -> Result<()> {
        let tag = node.tag;
        self.add_node(node)?;
        self.roots.insert(tag);
        Ok(())
    }

    /// Register an unattached node.
    pub fn add_node(&mut self, node: ShadowNode) -> Result<()> {
        if self.nodes.contains_key(&node.tag) {
            return Err(UiError::DuplicateTag(node.tag));
        }
        self.nodes.insert(node.tag, node);
        Ok(())
    }

    /// Dispose a root and everything below it.
    ///
    /// # Returns
    /// Every disposed tag, root first.
    pub fn remove_root_node(&mut self, tag: Tag) -> Result<Vec<Tag>> {
        if !self.roots.remove(&tag) {
            return Err(UiError::NotARoot(tag));
        }
        self.remove_subtree(tag)
    }

    /// Dispose a node and all its descendants, detaching it from its parent
    /// first if it is still attached.
    ///
    /// # Returns
    /// Every disposed tag in pre-order.
    pub fn remove_subtree(&mut self, tag: Tag) -> Result<Vec<Tag>> {
        let parent = self.node(tag, "remove_node")?.parent;
        if let Some(parent) = parent {
            if let Some(index) = self.index_of(parent, tag) {
                self.remove_child_at(parent, index)?;
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![tag];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                removed.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        self.roots.remove(&tag);
        trace!(tag, count = removed.len(), "shadow subtree removed");
        Ok(removed)
    }

    /// Tags of a node and all its descendants in pre-order.
    pub fn subtree_tags(&self, tag: Tag) -> Vec<Tag> {
        let mut tags = Vec::new();
        let mut stack = vec![tag];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                tags.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        tags
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get(&self, tag: Tag) -> Option<&ShadowNode> {
        self.nodes.get(&tag)
    }

    pub fn get_mut(&mut self, tag: Tag) -> Option<&mut ShadowNode> {
        self.nodes.get_mut(&tag)
    }

    /// Look up a node, failing with the name of the operation that needed it.
    pub fn node(&self, tag: Tag, operation: &'static str) -> Result<&ShadowNode> {
        self.nodes.get(&tag).ok_or(UiError::TagNotFound { tag, operation })
    }

    pub fn node_mut(&mut self, tag: Tag, operation: &'static str) -> Result<&mut ShadowNode> {
        self.nodes.get_mut(&tag).ok_or(UiError::TagNotFound { tag, operation })
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.nodes.contains_key(&tag)
    }

    pub fn is_root(&self, tag: Tag) -> bool {
        self.roots.contains(&tag)
    }

    pub fn root_tags(&self) -> Vec<Tag> {
        self.roots.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.nodes.keys().copied()
    }

    pub fn children(&self, tag: Tag) -> &[Tag] {
        self.nodes.get(&tag).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn index_of(&self, parent: Tag, child: Tag) -> Option<usize> {
        self.nodes.get(&parent)?.children.iter().position(|&c| c == child)
    }

    pub fn child_at(&self, parent: Tag, index: usize) -> Result<Tag> {
        let node = self.node(parent, "child_at")?;
        node.children.get(index).copied().ok_or(UiError::ChildIndexOutOfBounds {
            tag: parent,
            index,
            count: node.children.len(),
            operation: "child_at",
        })
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Insert `child` into `parent`'s children at `index`, shifting later
    /// children right.
    pub fn add_child_at(&mut self, parent: Tag, child: Tag, index: usize) -> Result<()> {
        if self.is_root(child) {
            return Err(UiError::RootAsChild(child));
        }
        let child_node = self.node(child, "add_child_at")?;
        if let Some(existing) = child_node.parent {
            return Err(UiError::AlreadyParented { child, parent: existing });
        }
        let child_root = child_node.root_tag;

        let parent_node = self.node(parent, "add_child_at")?;
        if parent_node.root_tag != child_root {
            return Err(UiError::CrossRoot {
                child,
                child_root,
                parent_root: parent_node.root_tag,
            });
        }
        let count = parent_node.children.len();
        if index > count {
            return Err(UiError::ChildIndexOutOfBounds {
                tag: parent,
                index,
                count,
                operation: "add_child_at",
            });
        }

        self.node_mut(parent, "add_child_at")?.children.insert(index, child);
        self.node_mut(child, "add_child_at")?.parent = Some(parent);
        self.mark_updated(parent);
        Ok(())
    }

    /// Remove and return the child at `index`.
    pub fn remove_child_at(&mut self, parent: Tag, index: usize) -> Result<Tag> {
        let parent_node = self.node_mut(parent, "remove_child_at")?;
        let count = parent_node.children.len();
        if index >= count {
            return Err(UiError::ChildIndexOutOfBounds {
                tag: parent,
                index,
                count,
                operation: "remove_child_at",
            });
        }
        let child = parent_node.children.remove(index);
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = None;
        }
        self.mark_updated(parent);
        Ok(child)
    }

    // =========================================================================
    // Dirty tracking
    // =========================================================================

    /// Mark a node updated and propagate to its ancestors. Stops at the first
    /// ancestor that is already marked.
    pub fn mark_updated(&mut self, tag: Tag) {
        let mut current = Some(tag);
        while let Some(t) = current {
            let Some(node) = self.nodes.get_mut(&t) else {
                break;
            };
            if node.flags.contains(NodeFlags::UPDATED) {
                break;
            }
            node.flags.insert(NodeFlags::UPDATED);
            current = node.parent;
        }
    }

    /// Force the next layout pass to visit this root.
    pub fn force_layout(&mut self, root_tag: Tag) {
        if let Some(node) = self.nodes.get_mut(&root_tag) {
            node.flags.insert(NodeFlags::FORCE_LAYOUT);
        }
        self.mark_updated(root_tag);
    }

    /// Roots with pending updates, in tag order.
    pub fn dirty_roots(&self) -> Vec<Tag> {
        self.roots
            .iter()
            .copied()
            .filter(|tag| self.nodes.get(tag).is_some_and(|n| n.has_updates()))
            .collect()
    }

    /// Check the structural invariants: parent links agree with child lists,
    /// no node has two parents, roots are unparented.
    pub fn check_consistency(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        for (&tag, node) in &self.nodes {
            for &child in &node.children {
                if !seen.insert(child) {
                    return false;
                }
                match self.nodes.get(&child) {
                    Some(c) if c.parent == Some(tag) && c.root_tag == node.root_tag => {}
                    _ => return false,
                }
            }
            if let Some(parent) = node.parent {
                if self.index_of(parent, tag).is_none() {
                    return false;
                }
            }
        }
        self.roots
            .iter()
            .all(|r| self.nodes.get(r).is_some_and(|n| n.parent.is_none()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShadowNodeKind;

    fn setup() -> ShadowTree {
        let mut tree = ShadowTree::new();
        tree.add_root_node(ShadowNode::new(1, "Root", 1, ShadowNodeKind::Layout))
            .unwrap();
        for tag in [2, 3, 4, 5] {
            tree.add_node(ShadowNode::new(tag, "View", 1, ShadowNodeKind::Layout))
                .unwrap();
        }
        tree
    }

    fn clean(tree: &mut ShadowTree) {
        let tags: Vec<Tag> = tree.tags().collect();
        for tag in tags {
            tree.get_mut(tag).unwrap().mark_update_seen();
        }
    }

    #[test]
    fn test_add_child_at_shifts() {
        let mut tree = setup();
        tree.add_child_at(1, 2, 0).unwrap();
        tree.add_child_at(1, 3, 1).unwrap();
        tree.add_child_at(1, 4, 1).unwrap();
        assert_eq!(tree.children(1), &[2, 4, 3]);
        assert_eq!(tree.get(4).unwrap().parent(), Some(1));
        assert!(tree.check_consistency());
    }

    #[test]
    fn test_add_child_errors() {
        let mut tree = setup();
        assert!(matches!(
            tree.add_child_at(1, 2, 1),
            Err(UiError::ChildIndexOutOfBounds { index: 1, count: 0, .. })
        ));
        tree.add_child_at(1, 2, 0).unwrap();
        assert!(matches!(tree.add_child_at(3, 2, 0), Err(UiError::AlreadyParented { .. })));
        assert!(matches!(tree.add_child_at(2, 1, 0), Err(UiError::RootAsChild(1))));
        assert!(matches!(tree.add_child_at(1, 77, 0), Err(UiError::TagNotFound { tag: 77, .. })));

        tree.add_node(ShadowNode::new(20, "View", 10, ShadowNodeKind::Layout)).unwrap();
        assert!(matches!(tree.add_child_at(1, 20, 1), Err(UiError::CrossRoot { .. })));
    }

    #[test]
    fn test_remove_child_at() {
        let mut tree = setup();
        tree.add_child_at(1, 2, 0).unwrap();
        tree.add_child_at(1, 3, 1).unwrap();
        assert_eq!(tree.remove_child_at(1, 0).unwrap(), 2);
        assert_eq!(tree.children(1), &[3]);
        assert!(tree.get(2).unwrap().parent().is_none());
        assert!(matches!(tree.remove_child_at(1, 1), Err(UiError::ChildIndexOutOfBounds { .. })));
    }

    #[test]
    fn test_mark_updated_propagates() {
        let mut tree = setup();
        tree.add_child_at(1, 2, 0).unwrap();
        tree.add_child_at(2, 3, 0).unwrap();
        clean(&mut tree);
        assert!(tree.dirty_roots().is_empty());

        tree.mark_updated(3);
        assert!(tree.get(2).unwrap().has_updates());
        assert!(tree.get(1).unwrap().has_updates());
        assert_eq!(tree.dirty_roots(), vec![1]);
        assert!(!tree.get(4).unwrap().has_updates());
    }

    #[test]
    fn test_remove_subtree() {
        let mut tree = setup();
        tree.add_child_at(1, 2, 0).unwrap();
        tree.add_child_at(2, 3, 0).unwrap();
        tree.add_child_at(2, 4, 1).unwrap();
        let removed = tree.remove_subtree(2).unwrap();
        assert_eq!(removed, vec![2, 3, 4]);
        assert!(tree.children(1).is_empty());
        assert!(!tree.contains(3));
        assert!(tree.check_consistency());
    }

    #[test]
    fn test_remove_root_node() {
        let mut tree = setup();
        tree.add_child_at(1, 2, 0).unwrap();
        assert!(matches!(tree.remove_root_node(99), Err(UiError::NotARoot(99))));
        let removed = tree.remove_root_node(1).unwrap();
        assert_eq!(removed, vec![1, 2]);
        assert!(tree.root_tags().is_empty());
    }

    #[test]
    fn test_duplicate_tag() {
        let mut tree = setup();
        assert!(matches!(
            tree.add_node(ShadowNode::new(2, "View", 1, ShadowNodeKind::Layout)),
            Err(UiError::DuplicateTag(2))
        ));
    }
}
