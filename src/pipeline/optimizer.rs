//! Native Tree Optimizer - Translates shadow mutations into native operations.
//!
//! Virtual nodes never reach the native side, so a parent's native child list
//! is its shadow child list with the virtual entries filtered out. The
//! optimizer keeps that filtered list per native parent and rewrites shadow
//! indices into native ones before queueing.
//!
//! Children of virtual nodes and virtual anchors are never attached natively.
//! When such a child is deleted there is no `manage_children` call to carry
//! the deletion, so it is sent through `delete_views` instead.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::trace;

use crate::engine::{ShadowNode, ShadowTree};
use crate::types::{Dimensions, Props, Tag, ViewAtIndex};

use super::operation_queue::OperationQueue;

pub struct NativeViewHierarchyOptimizer {
    queue: Arc<OperationQueue>,
    /// Native children per native parent, in native order.
    native_children: HashMap<Tag, Vec<Tag>>,
    /// Native parent per attached view.
    attached: HashMap<Tag, Tag>,
    /// Deletions already carried by a queued `manage_children`.
    forwarded_deletes: HashSet<Tag>,
}

impl NativeViewHierarchyOptimizer {
    pub fn new(queue: Arc<OperationQueue>) -> Self {
        Self {
            queue,
            native_children: HashMap::new(),
            attached: HashMap::new(),
            forwarded_deletes: HashSet::new(),
        }
    }

    pub fn native_children(&self, tag: Tag) -> &[Tag] {
        self.native_children.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn native_parent(&self, tag: Tag) -> Option<Tag> {
        self.attached.get(&tag).copied()
    }

    pub fn handle_create_view(&mut self, node: &ShadowNode, initial_props: Option<&Props>) {
        if node.is_virtual() {
            return;
        }
        self.queue
            .enqueue_create_view(node.context, node.tag, node.view_class.clone(), initial_props.cloned());
    }

    pub fn handle_update_view(&mut self, node: &ShadowNode, props: &Props) {
        if node.is_virtual() {
            return;
        }
        self.queue.enqueue_update_props(node.tag, props.clone());
    }

    /// Forward a child-list change of a native parent.
    ///
    /// Must be called after the shadow tree was mutated. `removed` holds every
    /// tag taken out of the parent (moves included), `added` every tag put in,
    /// `deleted` the removed tags that are going away for good.
    pub fn handle_manage_children(
        &mut self,
        shadow: &ShadowTree,
        parent: Tag,
        removed: &[Tag],
        added: &[Tag],
        deleted: &[Tag],
    ) {
        let current = self.native_children.remove(&parent).unwrap_or_default();

        let mut indices_to_remove: Vec<usize> = removed
            .iter()
            .filter_map(|tag| current.iter().position(|c| c == tag))
            .collect();
        indices_to_remove.sort_unstable();
        indices_to_remove.dedup();

        let next: Vec<Tag> = shadow
            .children(parent)
            .iter()
            .copied()
            .filter(|&child| is_native(shadow, child))
            .collect();

        let mut views_to_add: Vec<ViewAtIndex> = added
            .iter()
            .filter_map(|&tag| {
                next.iter()
                    .position(|&c| c == tag)
                    .map(|index| ViewAtIndex::new(tag, index))
            })
            .collect();
        views_to_add.sort();

        let mut tags_to_delete = Vec::new();
        for &index in &indices_to_remove {
            let tag = current[index];
            self.attached.remove(&tag);
            if deleted.contains(&tag) {
                tags_to_delete.push(tag);
                self.forwarded_deletes.insert(tag);
            }
        }
        for view in &views_to_add {
            self.attached.insert(view.tag, parent);
        }
        self.native_children.insert(parent, next);

        if indices_to_remove.is_empty() && views_to_add.is_empty() {
            return;
        }
        trace!(
            parent,
            removed = indices_to_remove.len(),
            added = views_to_add.len(),
            "native children changed"
        );
        self.queue
            .enqueue_manage_children(parent, indices_to_remove, views_to_add, tags_to_delete);
    }

    /// Forward the initial child list of a native parent.
    pub fn handle_set_children(&mut self, shadow: &ShadowTree, parent: Tag, child_tags: &[Tag]) {
        let natives: Vec<Tag> = child_tags
            .iter()
            .copied()
            .filter(|&child| is_native(shadow, child))
            .collect();
        if natives.is_empty() {
            return;
        }
        for &child in &natives {
            self.attached.insert(child, parent);
        }
        self.native_children
            .entry(parent)
            .or_default()
            .extend(natives.iter().copied());
        self.queue.enqueue_set_children(parent, natives);
    }

    /// Push a changed screen rect to the native view, if it is attached.
    pub fn handle_update_layout(&mut self, node: &ShadowNode) {
        let Some(&parent) = self.attached.get(&node.tag) else {
            return;
        };
        let screen = node.screen();
        let dimensions = Dimensions::new(
            f64::from(screen.x),
            f64::from(screen.y),
            f64::from(screen.width),
            f64::from(screen.height),
        );
        self.queue.enqueue_update_layout(parent, node.tag, dimensions);
    }

    /// Forget a set of shadow nodes that are about to be disposed.
    ///
    /// `tags` is a whole subtree. Native views that no queued operation will
    /// drop are collected and sent through `delete_views`.
    pub fn handle_remove_nodes(&mut self, shadow: &ShadowTree, tags: &[Tag]) {
        let removing: HashSet<Tag> = tags.iter().copied().collect();
        let mut orphans = Vec::new();

        for &tag in tags {
            if !is_native(shadow, tag) {
                continue;
            }
            let forwarded = self.forwarded_deletes.remove(&tag);
            let dropped_with_parent = self
                .attached
                .get(&tag)
                .is_some_and(|parent| removing.contains(parent));
            if !forwarded && !dropped_with_parent {
                orphans.push(tag);
            }
        }

        for &tag in tags {
            self.attached.remove(&tag);
            self.native_children.remove(&tag);
        }

        if !orphans.is_empty() {
            trace!(count = orphans.len(), "deleting unattached native views");
            self.queue.enqueue_delete_views(orphans);
        }
    }

    /// Tear down a root: the native side drops everything attached under it,
    /// the rest goes through `delete_views`.
    pub fn handle_remove_root(&mut self, shadow: &ShadowTree, root_tag: Tag) {
        self.queue.enqueue_remove_root_view(root_tag);
        self.forwarded_deletes.insert(root_tag);
        self.handle_remove_nodes(shadow, &shadow.subtree_tags(root_tag));
    }
}

fn is_native(shadow: &ShadowTree, tag: Tag) -> bool {
    shadow.get(tag).is_some_and(|node| !node.is_virtual())
}
