//! Tree Orchestrator - Applies producer commands to the shadow tree.
//!
//! Commands arrive in order on one thread. Structural and property changes
//! mutate the shadow tree immediately and are forwarded to the optimizer,
//! which queues the matching native operations. When the producer closes a
//! batch, [`UiImplementation::dispatch_view_updates`] lays out every dirty
//! root, converts the new frames into native layout operations and commits
//! the queue.
//!
//! # Batch lifecycle
//!
//! ```text
//! Idle ─► commands (create / update / manage / replace / remove)
//!      ─► dispatch_view_updates(batch_id)
//!            for each dirty root:
//!              before-layout hooks (dirty subtrees, children first)
//!              calculate_layout
//!              apply updates (frames → update_layout, onLayout events)
//!            commit queued operations as one batch
//!      ─► Idle
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::engine::{ShadowNode, ShadowTree, is_layout_prop};
use crate::error::{Result, UiError};
use crate::layout::calculate_layout;
use crate::native::{ROOT_VIEW_CLASS, ViewManagerRegistry};
use crate::types::{Dimension, Dimensions, Props, ShadowNodeKind, Tag, ThemedContext, ViewAtIndex};

use super::operation_queue::{MeasureCallback, OperationQueue, TouchTargetCallback, UiOperation};
use super::optimizer::NativeViewHierarchyOptimizer;

/// Frame change of a node that asked for `onLayout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEvent {
    pub tag: Tag,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

pub type LayoutEventListener = Box<dyn FnMut(LayoutEvent) + Send>;

pub struct UiImplementation {
    shadow: ShadowTree,
    view_managers: ViewManagerRegistry,
    optimizer: NativeViewHierarchyOptimizer,
    queue: Arc<OperationQueue>,
    layout_listener: Option<LayoutEventListener>,
}

impl UiImplementation {
    pub fn new(view_managers: ViewManagerRegistry, queue: Arc<OperationQueue>) -> Self {
        Self {
            shadow: ShadowTree::new(),
            view_managers,
            optimizer: NativeViewHierarchyOptimizer::new(queue.clone()),
            queue,
            layout_listener: None,
        }
    }

    pub fn set_layout_event_listener(&mut self, listener: impl FnMut(LayoutEvent) + Send + 'static) {
        self.layout_listener = Some(Box::new(listener));
    }

    pub fn shadow_tree(&self) -> &ShadowTree {
        &self.shadow
    }

    pub fn queue(&self) -> &Arc<OperationQueue> {
        &self.queue
    }

    // =========================================================================
    // Roots
    // =========================================================================

    /// Create the shadow root of a surface and queue its native root view.
    pub fn register_root_view(&mut self, tag: Tag, width: f64, height: f64, context: ThemedContext) -> Result<()> {
        let mut root = ShadowNode::new(tag, ROOT_VIEW_CLASS, tag, ShadowNodeKind::Layout);
        root.context = context;
        root.style.width = Dimension::Points(width as f32);
        root.style.height = Dimension::Points(height as f32);
        self.shadow.add_root_node(root)?;
        self.queue
            .enqueue_add_root_view(tag, context, Dimensions::new(0.0, 0.0, width, height));
        debug!(tag, width, height, "root registered");
        Ok(())
    }

    pub fn remove_root_view(&mut self, tag: Tag) -> Result<()> {
        if !self.shadow.is_root(tag) {
            return Err(UiError::NotARoot(tag));
        }
        self.optimizer.handle_remove_root(&self.shadow, tag);
        self.shadow.remove_root_node(tag)?;
        debug!(tag, "root unregistered");
        Ok(())
    }

    /// Resize a root. Outside a batch the new layout is committed at once.
    pub fn update_root_node_size(&mut self, tag: Tag, width: f64, height: f64) -> Result<()> {
        if !self.shadow.is_root(tag) {
            return Err(UiError::NotARoot(tag));
        }
        let root = self.shadow.node_mut(tag, "update_root_node_size")?;
        let before = root.style.clone();
        root.style.width = Dimension::Points(width as f32);
        root.style.height = Dimension::Points(height as f32);
        if root.style != before {
            self.shadow.force_layout(tag);
        }

        if self.queue.is_empty() {
            self.dispatch_view_updates(-1)?;
        }
        Ok(())
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    pub fn create_view(&mut self, tag: Tag, class_name: &str, root_tag: Tag, props: Option<&Props>) -> Result<()> {
        let manager = self.view_managers.get(class_name)?;
        let context = self.shadow.node(root_tag, "create_view")?.context;

        let mut node = ShadowNode::new(tag, class_name, root_tag, manager.shadow_node_kind())
            .with_measure(manager.measure_function());
        node.context = context;
        if let Some(props) = props {
            node.update_props(props);
        }

        self.shadow.add_node(node)?;
        if let Some(node) = self.shadow.get(tag) {
            self.optimizer.handle_create_view(node, props);
        }
        trace!(tag, class_name, root_tag, "shadow node created");
        Ok(())
    }

    pub fn update_view(&mut self, tag: Tag, class_name: &str, props: &Props) -> Result<()> {
        self.view_managers.get(class_name)?;
        let node = self.shadow.node_mut(tag, "update_view")?;

        let layout_changed = node.update_props(props);
        // Content of a virtual node is laid out by its anchor.
        let content_changed = node.is_virtual() && props.keys().any(|name| !is_layout_prop(name));
        if layout_changed || content_changed {
            self.shadow.mark_updated(tag);
        }

        if let Some(node) = self.shadow.get(tag) {
            self.optimizer.handle_update_view(node, props);
        }
        Ok(())
    }

    /// Reorder, insert and delete children of `tag`.
    ///
    /// `move_from` and `remove_from` index the child list as it was before
    /// the call. A move is a removal plus an insertion of the same child.
    pub fn manage_children(
        &mut self,
        tag: Tag,
        move_from: &[usize],
        move_to: &[usize],
        add_tags: &[Tag],
        add_indices: &[usize],
        remove_from: &[usize],
    ) -> Result<()> {
        const OP: &str = "manage_children";

        if move_from.len() != move_to.len() {
            return Err(UiError::SizeMismatch {
                tag,
                operation: OP,
                left: move_from.len(),
                right: move_to.len(),
            });
        }
        if add_tags.len() != add_indices.len() {
            return Err(UiError::SizeMismatch {
                tag,
                operation: OP,
                left: add_tags.len(),
                right: add_indices.len(),
            });
        }

        let parent = self.shadow.node(tag, OP)?;
        let forward = !parent.is_virtual() && !parent.is_virtual_anchor();

        let mut views_to_add = Vec::with_capacity(move_from.len() + add_tags.len());
        let mut indices_to_remove = Vec::with_capacity(move_from.len() + remove_from.len());
        let mut tags_to_remove = Vec::with_capacity(indices_to_remove.capacity());
        let mut tags_to_delete = Vec::with_capacity(remove_from.len());

        for (&from, &to) in move_from.iter().zip(move_to) {
            let moved = self.shadow.child_at(tag, from)?;
            views_to_add.push(ViewAtIndex::new(moved, to));
            indices_to_remove.push(from);
            tags_to_remove.push(moved);
        }
        for (&added, &index) in add_tags.iter().zip(add_indices) {
            self.shadow.node(added, OP)?;
            views_to_add.push(ViewAtIndex::new(added, index));
        }
        for &index in remove_from {
            let removed = self.shadow.child_at(tag, index)?;
            indices_to_remove.push(index);
            tags_to_remove.push(removed);
            tags_to_delete.push(removed);
        }

        views_to_add.sort();
        indices_to_remove.sort_unstable();
        for pair in indices_to_remove.windows(2) {
            if pair[0] == pair[1] {
                return Err(UiError::RemoveIndexOrder { tag, index: pair[0], previous: pair[1] });
            }
        }

        // Check the additions against the post-removal list before mutating.
        let mut running = parent.child_count() - indices_to_remove.len();
        let mut seen = HashSet::with_capacity(views_to_add.len());
        for view in &views_to_add {
            if !seen.insert(view.tag) {
                return Err(UiError::DuplicateChild { tag, child: view.tag, operation: OP });
            }
            if self.shadow.is_root(view.tag) {
                return Err(UiError::RootAsChild(view.tag));
            }
            if let Some(existing) = self.shadow.node(view.tag, OP)?.parent() {
                if existing != tag || !tags_to_remove.contains(&view.tag) {
                    return Err(UiError::AlreadyParented { child: view.tag, parent: existing });
                }
            }
            if view.index > running {
                return Err(UiError::ChildIndexOutOfBounds {
                    tag,
                    index: view.index,
                    count: running,
                    operation: OP,
                });
            }
            running += 1;
        }

        for &index in indices_to_remove.iter().rev() {
            self.shadow.remove_child_at(tag, index)?;
        }
        for view in &views_to_add {
            self.shadow.add_child_at(tag, view.tag, view.index)?;
        }

        if forward {
            let added: Vec<Tag> = views_to_add.iter().map(|v| v.tag).collect();
            self.optimizer
                .handle_manage_children(&self.shadow, tag, &tags_to_remove, &added, &tags_to_delete);
        }

        for &deleted in &tags_to_delete {
            self.remove_shadow_node(deleted)?;
        }
        Ok(())
    }

    /// Populate a fresh node with children, in order.
    pub fn set_children(&mut self, tag: Tag, child_tags: &[Tag]) -> Result<()> {
        let parent = self.shadow.node(tag, "set_children")?;
        let forward = !parent.is_virtual() && !parent.is_virtual_anchor();
        let base = parent.child_count();

        for (offset, &child) in child_tags.iter().enumerate() {
            self.shadow.add_child_at(tag, child, base + offset)?;
        }
        if forward {
            self.optimizer.handle_set_children(&self.shadow, tag, child_tags);
        }
        Ok(())
    }

    /// Swap `old_tag` for `new_tag` at the same position under the same
    /// parent. `old_tag` is deleted.
    pub fn replace_existing_non_root_view(&mut self, old_tag: Tag, new_tag: Tag) -> Result<()> {
        for tag in [old_tag, new_tag] {
            if self.shadow.is_root(tag) {
                return Err(UiError::ReplaceRoot(tag));
            }
        }
        let old = self.shadow.node(old_tag, "replace_existing_non_root_view")?;
        let parent = old.parent().ok_or(UiError::Detached(old_tag))?;
        let index = self
            .shadow
            .index_of(parent, old_tag)
            .ok_or(UiError::Detached(old_tag))?;

        self.manage_children(parent, &[], &[], &[new_tag], &[index], &[index])
    }

    /// Delete every child of a container.
    pub fn remove_subviews_from_container_with_id(&mut self, tag: Tag) -> Result<()> {
        let count = self
            .shadow
            .node(tag, "remove_subviews_from_container_with_id")?
            .child_count();
        let indices: Vec<usize> = (0..count).collect();
        self.manage_children(tag, &[], &[], &[], &[], &indices)
    }

    fn remove_shadow_node(&mut self, tag: Tag) -> Result<()> {
        let subtree = self.shadow.subtree_tags(tag);
        self.optimizer.handle_remove_nodes(&self.shadow, &subtree);
        self.shadow.remove_subtree(tag)?;
        Ok(())
    }

    // =========================================================================
    // Measurement
    // =========================================================================

    /// Frame of `tag` relative to `ancestor_tag`, from the last computed layout.
    pub fn measure_layout(&self, tag: Tag, ancestor_tag: Tag) -> Result<Dimensions> {
        let node = self.shadow.node(tag, "measure_layout")?;
        self.shadow.node(ancestor_tag, "measure_layout")?;

        if tag != ancestor_tag {
            let mut current = node.parent();
            loop {
                match current {
                    Some(parent) if parent == ancestor_tag => break,
                    Some(parent) => current = self.shadow.get(parent).and_then(ShadowNode::parent),
                    None => return Err(UiError::NotAnAncestor { tag, ancestor: ancestor_tag }),
                }
            }
        }
        self.measure_relative_to_verified_ancestor(tag, ancestor_tag)
    }

    /// Frame of `tag` relative to its shadow parent.
    pub fn measure_layout_relative_to_parent(&self, tag: Tag) -> Result<Dimensions> {
        let node = self.shadow.node(tag, "measure_layout_relative_to_parent")?;
        let parent = node.parent().ok_or(UiError::Detached(tag))?;
        self.measure_relative_to_verified_ancestor(tag, parent)
    }

    fn measure_relative_to_verified_ancestor(&self, tag: Tag, ancestor_tag: Tag) -> Result<Dimensions> {
        let node = self.shadow.node(tag, "measure_layout")?;
        let frame = node.layout();
        let (mut x, mut y) = (0.0f64, 0.0f64);

        if tag != ancestor_tag {
            x = f64::from(frame.x);
            y = f64::from(frame.y);
            let mut current = node.parent();
            while let Some(parent) = current {
                if parent == ancestor_tag {
                    break;
                }
                let parent_node = self.shadow.node(parent, "measure_layout")?;
                self.assert_no_custom_child_layout(parent_node)?;
                let offset = parent_node.layout();
                x += f64::from(offset.x);
                y += f64::from(offset.y);
                current = parent_node.parent();
            }
            self.assert_no_custom_child_layout(self.shadow.node(ancestor_tag, "measure_layout")?)?;
        }

        Ok(Dimensions::new(x, y, f64::from(frame.width), f64::from(frame.height)))
    }

    fn assert_no_custom_child_layout(&self, node: &ShadowNode) -> Result<()> {
        if self.shadow.is_root(node.tag) {
            return Ok(());
        }
        let manager = self.view_managers.get(&node.view_class)?;
        let parent = manager.as_parent().ok_or(UiError::NotAParent {
            tag: node.tag,
            operation: "measure_layout",
        })?;
        if parent.needs_custom_layout_for_children() {
            return Err(UiError::CustomLayoutAncestor(node.tag));
        }
        Ok(())
    }

    pub fn find_sub_view_in(&self, tag: Tag, x: f64, y: f64, callback: TouchTargetCallback) {
        self.queue.enqueue_find_target_for_touch(tag, x, y, callback);
    }

    pub fn measure(&self, tag: Tag, callback: MeasureCallback) {
        self.queue.enqueue_measure(tag, callback);
    }

    pub fn measure_in_window(&self, tag: Tag, callback: MeasureCallback) {
        self.queue.enqueue_measure_in_window(tag, callback);
    }

    // =========================================================================
    // Pass-through commands
    // =========================================================================

    pub fn dispatch_view_manager_command(&self, tag: Tag, command_id: &str, args: Value) -> Result<()> {
        self.shadow.node(tag, "dispatch_view_manager_command")?;
        self.queue.enqueue_dispatch_command(tag, command_id, args);
        Ok(())
    }

    pub fn update_view_extra_data(&self, tag: Tag, data: Value) -> Result<()> {
        let node = self.shadow.node(tag, "update_view_extra_data")?;
        if !node.is_virtual() {
            self.queue.enqueue_update_extra_data(tag, data);
        }
        Ok(())
    }

    pub fn configure_next_layout_animation(&self, config: Value) {
        self.queue.enqueue_configure_layout_animation(config);
    }

    pub fn add_ui_block(&self, block: UiOperation) {
        self.queue.enqueue(block);
    }

    pub fn prepend_ui_block(&self, block: UiOperation) {
        self.queue.prepend(block);
    }

    pub fn on_suspend(&self) {
        self.queue.on_suspend();
    }

    pub fn on_resume(&self) {
        self.queue.on_resume();
    }

    // =========================================================================
    // Batch completion
    // =========================================================================

    /// Close the current batch: lay out, dispatch frames, commit the queue.
    pub fn dispatch_view_updates(&mut self, batch_id: i64) -> Result<()> {
        self.update_view_hierarchy()?;
        self.queue.dispatch_view_updates(batch_id);
        Ok(())
    }

    fn update_view_hierarchy(&mut self) -> Result<()> {
        for root in self.shadow.dirty_roots() {
            self.notify_before_layout(root);
            calculate_layout(&mut self.shadow, root)?;
            self.apply_updates(root, 0.0, 0.0);
        }
        Ok(())
    }

    fn notify_before_layout(&mut self, tag: Tag) {
        let Some(node) = self.shadow.get(tag) else {
            return;
        };
        if !node.has_updates() {
            return;
        }
        let children = node.children().to_vec();
        let manager = self.view_managers.get(&node.view_class).ok();

        for child in children {
            self.notify_before_layout(child);
        }
        if let (Some(manager), Some(node)) = (manager, self.shadow.get_mut(tag)) {
            manager.on_before_layout(node);
        }
    }

    fn apply_updates(&mut self, tag: Tag, absolute_x: f32, absolute_y: f32) {
        let Some(node) = self.shadow.get(tag) else {
            return;
        };
        if !node.has_updates() {
            return;
        }

        let layout = node.layout();
        let children = node.children().to_vec();
        if node.is_virtual_anchor() {
            for child in children {
                self.mark_subtree_seen(child);
            }
        } else {
            for child in children {
                self.apply_updates(child, absolute_x + layout.x, absolute_y + layout.y);
            }
        }

        let is_root = self.shadow.is_root(tag);
        let Some(node) = self.shadow.get_mut(tag) else {
            return;
        };
        if !is_root && node.dispatch_updates(absolute_x, absolute_y) {
            self.optimizer.handle_update_layout(node);
            if node.should_notify_on_layout() {
                let screen = node.screen();
                if let Some(listener) = self.layout_listener.as_mut() {
                    listener(LayoutEvent {
                        tag,
                        x: screen.x,
                        y: screen.y,
                        width: screen.width,
                        height: screen.height,
                    });
                }
            }
        }
        node.mark_update_seen();
    }

    /// Descendants of a virtual anchor are laid out by the anchor's widget.
    fn mark_subtree_seen(&mut self, tag: Tag) {
        for tag in self.shadow.subtree_tags(tag) {
            if let Some(node) = self.shadow.get_mut(tag) {
                node.mark_update_seen();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    use parking_lot::Mutex;
    use serde_json::json;
    use taffy::Size;

    use crate::config::UiManagerConfig;
    use crate::native::{AnyThread, NativeViewHierarchyManager, PanelViewManager, as_panel};
    use crate::pipeline::frame::Choreographer;

    struct Harness {
        ui: UiImplementation,
        native: NativeViewHierarchyManager,
        batch: i64,
    }

    fn props(value: Value) -> Props {
        match value {
            Value::Object(map) => map,
            _ => Props::new(),
        }
    }

    fn setup() -> Harness {
        let text_measure: crate::engine::MeasureFunc = Arc::new(|_: &ShadowNode, _, _| Size { width: 30.0, height: 12.0 });
        let managers = ViewManagerRegistry::new()
            .with(Arc::new(PanelViewManager::new("Box")))
            .with(Arc::new(PanelViewManager::new("Scroll").custom_layout()))
            .with(Arc::new(PanelViewManager::new("Image").leaf()))
            .with(Arc::new(PanelViewManager::new("Text").virtual_anchor().with_measure(text_measure)))
            .with(Arc::new(PanelViewManager::new("RawText").virtual_node()));
        let config = UiManagerConfig::default();
        let queue = Arc::new(OperationQueue::new(Arc::new(Choreographer::new()), config.clone()));
        let mut ui = UiImplementation::new(managers.clone(), queue);
        let native = NativeViewHierarchyManager::new(managers, AnyThread, &config);
        ui.register_root_view(1, 100.0, 100.0, ThemedContext::new(1)).unwrap();
        Harness { ui, native, batch: 0 }
    }

    impl Harness {
        fn flush(&mut self) {
            self.batch += 1;
            self.ui.dispatch_view_updates(self.batch).unwrap();
            self.ui
                .queue()
                .dispatch_frame(&mut self.native, Instant::now())
                .unwrap();
        }

        fn create(&mut self, tag: Tag, class: &str, value: Value) {
            self.ui.create_view(tag, class, 1, Some(&props(value))).unwrap();
        }

        fn add(&mut self, parent: Tag, tags: &[Tag], indices: &[usize]) {
            self.ui.manage_children(parent, &[], &[], tags, indices, &[]).unwrap();
        }

        fn frame(&self, tag: Tag) -> Dimensions {
            let view = self.native.resolve_view(tag).unwrap();
            as_panel(&view).unwrap().frame()
        }

        fn native_subset_of_shadow(&self) -> bool {
            self.native
                .registered_tags()
                .into_iter()
                .all(|tag| self.ui.shadow_tree().contains(tag))
        }
    }

    #[test]
    fn test_update_wins_over_create_props() {
        let mut h = setup();
        h.create(5, "Box", json!({ "width": 10, "height": 10 }));
        h.add(1, &[5], &[0]);
        h.ui.update_view(5, "Box", &props(json!({ "width": 20 }))).unwrap();
        h.flush();

        assert_eq!(h.frame(5).width, 20.0);
        assert_eq!(h.frame(5).height, 10.0);
    }

    #[test]
    fn test_virtual_node_never_created_natively() {
        let mut h = setup();
        h.create(2, "Text", json!({}));
        h.create(3, "RawText", json!({ "text": "hi", "width": 50 }));
        h.add(1, &[2], &[0]);
        h.add(2, &[3], &[0]);
        h.ui.update_view(3, "RawText", &props(json!({ "text": "bye" }))).unwrap();
        h.flush();

        assert!(h.native.view_exists(2));
        assert!(!h.native.view_exists(3));
        assert!(h.native.child_tags(2).unwrap().is_empty());
        assert_eq!(h.frame(2).width, 100.0);
        assert_eq!(h.frame(2).height, 12.0);
        assert!(h.native_subset_of_shadow());
    }

    #[test]
    fn test_move_and_remove_reorder_children() {
        let mut h = setup();
        for tag in [2, 3, 4, 5] {
            h.create(tag, "Box", json!({ "height": 10 }));
        }
        h.ui.set_children(1, &[2, 3, 4, 5]).unwrap();
        h.flush();
        assert_eq!(h.native.child_tags(1).unwrap(), vec![2, 3, 4, 5]);

        // Move 5 to the front, delete 3.
        h.ui.manage_children(1, &[3], &[0], &[], &[], &[1]).unwrap();
        h.flush();

        assert_eq!(h.ui.shadow_tree().children(1), &[5, 2, 4]);
        assert_eq!(h.native.child_tags(1).unwrap(), vec![5, 2, 4]);
        assert!(!h.native.view_exists(3));
        assert!(!h.ui.shadow_tree().contains(3));
        assert_eq!(h.frame(5).y, 0.0);
        assert_eq!(h.frame(4).y, 20.0);
        assert!(h.ui.shadow_tree().check_consistency());
    }

    #[test]
    fn test_manage_children_errors() {
        let mut h = setup();
        h.create(2, "Box", json!({}));
        h.add(1, &[2], &[0]);

        assert!(matches!(
            h.ui.manage_children(1, &[0], &[], &[], &[], &[]),
            Err(UiError::SizeMismatch { .. })
        ));
        assert!(matches!(
            h.ui.manage_children(1, &[], &[], &[9], &[], &[]),
            Err(UiError::SizeMismatch { .. })
        ));
        assert!(matches!(
            h.ui.manage_children(1, &[0], &[0], &[], &[], &[0]),
            Err(UiError::RemoveIndexOrder { .. })
        ));
        assert!(matches!(
            h.ui.manage_children(1, &[], &[], &[], &[], &[4]),
            Err(UiError::ChildIndexOutOfBounds { .. })
        ));
        assert_eq!(h.ui.shadow_tree().children(1), &[2]);
    }

    #[test]
    fn test_bad_add_leaves_tree_untouched() {
        let mut h = setup();
        for tag in [2, 3, 4] {
            h.create(tag, "Box", json!({}));
        }
        h.ui.set_children(1, &[2, 3]).unwrap();
        h.flush();

        // Removing one child leaves room for index 1 at most.
        assert!(matches!(
            h.ui.manage_children(1, &[], &[], &[4], &[2], &[0]),
            Err(UiError::ChildIndexOutOfBounds { index: 2, count: 1, .. })
        ));
        assert!(matches!(
            h.ui.manage_children(1, &[], &[], &[4, 4], &[0, 1], &[]),
            Err(UiError::DuplicateChild { child: 4, .. })
        ));
        assert!(matches!(
            h.ui.manage_children(1, &[], &[], &[3], &[0], &[0]),
            Err(UiError::AlreadyParented { child: 3, parent: 1 })
        ));

        assert_eq!(h.ui.shadow_tree().children(1), &[2, 3]);
        assert!(h.ui.shadow_tree().contains(2));
        assert_eq!(h.ui.shadow_tree().node(4, "test").unwrap().parent(), None);
        h.flush();
        assert_eq!(h.native.child_tags(1).unwrap(), vec![2, 3]);
        assert!(h.native.view_exists(2));
    }

    #[test]
    fn test_replace_existing_non_root_view() {
        let mut h = setup();
        for tag in [2, 3, 4] {
            h.create(tag, "Box", json!({}));
        }
        h.ui.set_children(1, &[2, 3]).unwrap();
        h.flush();

        h.ui.replace_existing_non_root_view(3, 4).unwrap();
        h.flush();
        assert_eq!(h.native.child_tags(1).unwrap(), vec![2, 4]);
        assert!(!h.native.view_exists(3));

        assert!(matches!(h.ui.replace_existing_non_root_view(1, 2), Err(UiError::ReplaceRoot(1))));
    }

    #[test]
    fn test_remove_subviews_from_container() {
        let mut h = setup();
        for tag in [2, 3, 4] {
            h.create(tag, "Box", json!({}));
        }
        h.ui.set_children(1, &[2]).unwrap();
        h.ui.set_children(2, &[3, 4]).unwrap();
        h.flush();

        h.ui.remove_subviews_from_container_with_id(2).unwrap();
        h.flush();
        assert!(h.native.child_tags(2).unwrap().is_empty());
        assert!(!h.native.view_exists(3));
        assert!(!h.native.view_exists(4));
        assert!(h.native_subset_of_shadow());
    }

    #[test]
    fn test_remove_unknown_root_leaves_others() {
        let mut h = setup();
        h.create(2, "Box", json!({}));
        h.add(1, &[2], &[0]);
        h.flush();

        assert!(matches!(h.ui.remove_root_view(99), Err(UiError::NotARoot(99))));
        assert!(h.ui.shadow_tree().contains(2));
        assert_eq!(h.native.root_tags(), vec![1]);
    }

    #[test]
    fn test_remove_root_view() {
        let mut h = setup();
        h.create(2, "Box", json!({}));
        h.add(1, &[2], &[0]);
        h.flush();

        h.ui.remove_root_view(1).unwrap();
        h.flush();
        assert!(h.ui.shadow_tree().is_empty());
        assert_eq!(h.native.view_count(), 0);
    }

    #[test]
    fn test_overlapping_batches() {
        let mut h = setup();
        h.create(2, "Box", json!({ "height": 10 }));
        h.add(1, &[2], &[0]);
        h.ui.dispatch_view_updates(1).unwrap();

        h.create(3, "Box", json!({ "height": 10 }));
        h.add(2, &[3], &[0]);
        h.ui.dispatch_view_updates(2).unwrap();
        assert_eq!(h.ui.queue().committed_batches(), 2);

        h.ui.queue().dispatch_frame(&mut h.native, Instant::now()).unwrap();
        assert_eq!(h.native.child_tags(2).unwrap(), vec![3]);
    }

    #[test]
    fn test_layout_events() {
        let mut h = setup();
        let (tx, rx) = mpsc::channel();
        h.ui.set_layout_event_listener(move |event| {
            let _ = tx.send(event);
        });
        h.create(2, "Box", json!({ "height": 25, "onLayout": true }));
        h.create(3, "Box", json!({ "height": 25 }));
        h.add(1, &[2, 3], &[0, 1]);
        h.flush();

        let events: Vec<LayoutEvent> = rx.try_iter().collect();
        assert_eq!(events, vec![LayoutEvent { tag: 2, x: 0, y: 0, width: 100, height: 25 }]);

        // Unchanged frame, no event.
        h.ui.update_view(2, "Box", &props(json!({ "testID": "a" }))).unwrap();
        h.flush();
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_update_root_node_size_commits_outside_batch() {
        let mut h = setup();
        h.create(2, "Box", json!({ "flexGrow": 1 }));
        h.add(1, &[2], &[0]);
        h.flush();
        assert_eq!(h.frame(2).height, 100.0);

        h.ui.update_root_node_size(1, 100.0, 40.0).unwrap();
        assert_eq!(h.ui.queue().committed_batches(), 1);
        h.ui.queue().dispatch_frame(&mut h.native, Instant::now()).unwrap();
        assert_eq!(h.frame(2).height, 40.0);
    }

    #[test]
    fn test_measure_layout() {
        let mut h = setup();
        h.create(2, "Box", json!({ "padding": 5 }));
        h.create(3, "Box", json!({ "marginTop": 7, "height": 10 }));
        h.create(4, "Scroll", json!({}));
        h.create(5, "Box", json!({ "height": 10 }));
        h.ui.set_children(1, &[2, 4]).unwrap();
        h.ui.set_children(2, &[3]).unwrap();
        h.ui.set_children(4, &[5]).unwrap();
        h.flush();

        let frame = h.ui.measure_layout(3, 1).unwrap();
        assert_eq!((frame.x, frame.y, frame.width, frame.height), (5.0, 12.0, 90.0, 10.0));
        assert_eq!(h.ui.measure_layout(3, 3).unwrap().x, 0.0);
        assert_eq!(h.ui.measure_layout_relative_to_parent(3).unwrap().y, 12.0);

        assert!(matches!(h.ui.measure_layout(3, 4), Err(UiError::NotAnAncestor { .. })));
        assert!(matches!(h.ui.measure_layout(5, 1), Err(UiError::CustomLayoutAncestor(4))));
        assert!(matches!(h.ui.measure_layout_relative_to_parent(1), Err(UiError::Detached(1))));
    }

    #[test]
    fn test_native_measure_through_queue() {
        let mut h = setup();
        h.create(2, "Box", json!({ "height": 30, "marginTop": 10 }));
        h.add(1, &[2], &[0]);
        h.flush();

        let (tx, rx) = mpsc::channel();
        let first = tx.clone();
        h.ui.measure(2, Box::new(move |frame| {
            let _ = first.send(frame);
        }));
        h.ui.measure(2, Box::new(move |frame| {
            let _ = tx.send(frame);
        }));
        h.flush();

        let results: Vec<Option<Dimensions>> = rx.try_iter().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Some(Dimensions::new(0.0, 10.0, 100.0, 30.0)));
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn test_before_layout_skips_clean_subtrees() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook: crate::native::BeforeLayoutFn = Arc::new(move |node: &mut ShadowNode| sink.lock().push(node.tag));
        let managers = ViewManagerRegistry::new().with(Arc::new(PanelViewManager::new("Box").with_before_layout(hook)));
        let config = UiManagerConfig::default();
        let queue = Arc::new(OperationQueue::new(Arc::new(Choreographer::new()), config));
        let mut ui = UiImplementation::new(managers, queue);
        ui.register_root_view(1, 100.0, 100.0, ThemedContext::new(1)).unwrap();
        for tag in [2, 3, 4] {
            ui.create_view(tag, "Box", 1, None).unwrap();
        }
        ui.set_children(1, &[2, 3]).unwrap();
        ui.set_children(2, &[4]).unwrap();
        ui.dispatch_view_updates(1).unwrap();
        assert_eq!(*seen.lock(), vec![4, 2, 3]);

        seen.lock().clear();
        ui.update_view(3, "Box", &props(json!({ "height": 5 }))).unwrap();
        ui.dispatch_view_updates(2).unwrap();
        assert_eq!(*seen.lock(), vec![3]);
    }

    #[test]
    fn test_commands_and_extra_data() {
        let mut h = setup();
        h.create(2, "Box", json!({}));
        h.add(1, &[2], &[0]);
        h.ui.dispatch_view_manager_command(2, "focus", json!([1])).unwrap();
        h.ui.update_view_extra_data(2, json!({ "k": "v" })).unwrap();
        assert!(h.ui.dispatch_view_manager_command(42, "focus", Value::Null).is_err());
        h.flush();

        let view = h.native.resolve_view(2).unwrap();
        let panel = as_panel(&view).unwrap();
        assert_eq!(panel.commands(), vec![("focus".to_string(), json!([1]))]);
        assert_eq!(panel.extra_data(), Some(json!({ "k": "v" })));
    }
}
