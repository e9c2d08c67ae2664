//! Native View Hierarchy Manager - Owns and mutates the native widget tree.
//!
//! Every operation here runs on the UI thread and is checked against the
//! injected [`ThreadAffinity`]. Commands that reference unknown tags or break
//! the child-ordering rules fail with a [`UiError`] before touching any widget.
//!
//! Children of a parent are addressed by *logical* index: views that are still
//! attached only to play an exit animation are invisible to index math.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, debug_span, trace};

use crate::config::UiManagerConfig;
use crate::error::{Result, UiError};
use crate::types::{Dimensions, Props, Tag, ThemedContext, ViewAtIndex};

use super::affinity::ThreadAffinity;
use super::animation::{AnimationToken, LayoutAnimationController, PendingExit};
use super::panel::{PanelViewManager, ROOT_VIEW_CLASS};
use super::tag_registry::TagRegistry;
use super::view_manager::{NativeView, ViewManager, ViewManagerRegistry, ViewParentManager};

/// Receives the tags dropped by one structural call.
pub type DroppedViewsListener = Box<dyn FnMut(&[Tag])>;

pub struct NativeViewHierarchyManager {
    registry: TagRegistry,
    view_managers: ViewManagerRegistry,
    root_manager: Arc<dyn ViewManager>,
    affinity: Box<dyn ThreadAffinity>,
    animation: LayoutAnimationController,
    dropped_listener: Option<DroppedViewsListener>,
}

impl NativeViewHierarchyManager {
    /// Create a manager bound to a UI thread.
    ///
    /// Root views use the manager registered as `"Root"`, or an in-memory
    /// panel manager when none is registered.
    pub fn new(
        view_managers: ViewManagerRegistry,
        affinity: impl ThreadAffinity + 'static,
        config: &UiManagerConfig,
    ) -> Self {
        let root_manager = view_managers
            .get(ROOT_VIEW_CLASS)
            .unwrap_or_else(|_| Arc::new(PanelViewManager::root()));
        Self {
            registry: TagRegistry::new(),
            view_managers,
            root_manager,
            affinity: Box::new(affinity),
            animation: LayoutAnimationController::new(config.layout_animation_enabled),
            dropped_listener: None,
        }
    }

    pub fn set_dropped_views_listener(&mut self, listener: impl FnMut(&[Tag]) + 'static) {
        self.dropped_listener = Some(Box::new(listener));
    }

    fn assert_on_thread(&self) {
        debug_assert!(
            self.affinity.is_current(),
            "native view hierarchy accessed off its UI thread"
        );
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn view_exists(&self, tag: Tag) -> bool {
        self.registry.contains(tag)
    }

    pub fn resolve_view(&self, tag: Tag) -> Result<NativeView> {
        self.registry.view(tag, "resolve_view")
    }

    pub fn resolve_view_manager(&self, tag: Tag) -> Result<Arc<dyn ViewManager>> {
        self.registry.manager(tag, "resolve_view_manager")
    }

    pub fn root_tags(&self) -> Vec<Tag> {
        self.registry.root_tags()
    }

    pub fn view_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registered_tags(&self) -> Vec<Tag> {
        self.registry.tags().collect()
    }

    /// Tag of the native parent a view is attached to.
    pub fn parent_of(&self, tag: Tag) -> Option<Tag> {
        self.registry.parent_of(tag)
    }

    /// Children of a view by logical index (exiting views excluded).
    pub fn child_tags(&self, tag: Tag) -> Result<Vec<Tag>> {
        let (view, manager) = self.parent_view(tag, "child_tags")?;
        let Some(parent) = manager.as_parent() else {
            return Ok(Vec::new());
        };
        Ok(self.logical_children(parent, &view))
    }

    fn parent_view(&self, tag: Tag, operation: &'static str) -> Result<(NativeView, Arc<dyn ViewManager>)> {
        let entry = self.registry.entry(tag, operation)?;
        Ok((entry.view.clone(), entry.manager.clone()))
    }

    fn logical_children(&self, parent: &dyn ViewParentManager, view: &NativeView) -> Vec<Tag> {
        (0..parent.child_count(view))
            .filter_map(|i| parent.child_at(view, i))
            .map(|c| c.tag)
            .filter(|&t| !self.animation.is_exiting(t))
            .collect()
    }

    /// Physical position to insert at so the child lands at `logical` among
    /// the non-exiting children.
    fn physical_insert_index(&self, parent: &dyn ViewParentManager, view: &NativeView, logical: usize) -> usize {
        let count = parent.child_count(view);
        let mut seen = 0;
        for i in 0..count {
            let Some(child) = parent.child_at(view, i) else {
                continue;
            };
            if self.animation.is_exiting(child.tag) {
                continue;
            }
            if seen == logical {
                return i;
            }
            seen += 1;
        }
        count
    }

    fn physical_index_of(parent: &dyn ViewParentManager, view: &NativeView, tag: Tag) -> Option<usize> {
        (0..parent.child_count(view)).find(|&i| parent.child_at(view, i).is_some_and(|c| c.tag == tag))
    }

    // =========================================================================
    // Creation and updates
    // =========================================================================

    /// Create and register the root view of a surface.
    pub fn add_root_view(&mut self, tag: Tag, context: ThemedContext, dimensions: Dimensions) -> Result<()> {
        self.assert_on_thread();
        let widget = self.root_manager.create_view(&context);
        let view = NativeView::new(tag, widget);
        self.root_manager.set_dimensions(&view, dimensions);
        self.registry.insert_root(view, self.root_manager.clone(), context)?;
        debug!(tag, "root view added");
        Ok(())
    }

    pub fn create_view(
        &mut self,
        context: ThemedContext,
        tag: Tag,
        class_name: &str,
        initial_props: Option<&Props>,
    ) -> Result<()> {
        self.assert_on_thread();
        let manager = self.view_managers.get(class_name)?;
        let view = NativeView::new(tag, manager.create_view(&context));
        self.registry.insert(view.clone(), manager.clone(), context)?;
        if let Some(props) = initial_props {
            manager.update_props(&view, props);
        }
        debug!(tag, class_name, "view created");
        Ok(())
    }

    pub fn update_props(&mut self, tag: Tag, props: &Props) -> Result<()> {
        self.assert_on_thread();
        let entry = self.registry.entry(tag, "update_props")?;
        entry.manager.update_props(&entry.view, props);
        Ok(())
    }

    pub fn update_view_extra_data(&mut self, tag: Tag, data: &Value) -> Result<()> {
        self.assert_on_thread();
        let entry = self.registry.entry(tag, "update_view_extra_data")?;
        entry.manager.update_extra_data(&entry.view, data);
        Ok(())
    }

    /// Apply a frame computed by the shadow tree.
    ///
    /// A no-op when the parent positions its children itself.
    pub fn update_layout(&mut self, parent_tag: Tag, tag: Tag, dimensions: Dimensions) -> Result<()> {
        self.assert_on_thread();
        let entry = self.registry.entry(tag, "update_layout")?;
        let parent_manager = self.registry.manager(parent_tag, "update_layout")?;
        let Some(parent) = parent_manager.as_parent() else {
            return Err(UiError::NotAParent { tag: parent_tag, operation: "update_layout" });
        };
        if parent.needs_custom_layout_for_children() {
            trace!(parent_tag, tag, "custom child layout, frame skipped");
            return Ok(());
        }
        entry.manager.set_dimensions(&entry.view, dimensions);
        trace!(tag, ?dimensions, "layout updated");
        Ok(())
    }

    pub fn dispatch_command(&mut self, tag: Tag, command_id: &str, args: &Value) -> Result<()> {
        self.assert_on_thread();
        let entry = self.registry.entry(tag, "dispatch_command")?;
        entry.manager.receive_command(&entry.view, command_id, args);
        Ok(())
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Remove, insert and delete children of `tag` in one step.
    ///
    /// `indices_to_remove` must be ascending; it is applied from the last
    /// entry to the first so every index stays valid against the shrinking
    /// child list. `views_to_add` is applied lowest index first. Everything is
    /// validated before the first widget is touched.
    pub fn manage_children(
        &mut self,
        tag: Tag,
        indices_to_remove: &[usize],
        views_to_add: &[ViewAtIndex],
        tags_to_delete: &[Tag],
    ) -> Result<()> {
        const OP: &str = "manage_children";
        let _span = debug_span!("manage_children", tag).entered();
        self.assert_on_thread();

        let (view, manager) = self.parent_view(tag, OP)?;
        let parent = manager
            .as_parent()
            .ok_or(UiError::NotAParent { tag, operation: OP })?;

        // ===== Validation =====

        let mut children = self.logical_children(parent, &view);
        let count = children.len();

        let mut previous: Option<usize> = None;
        for &index in indices_to_remove.iter().rev() {
            if index >= count {
                return Err(UiError::RemoveIndexOutOfRange { tag, index, count });
            }
            if let Some(previous) = previous {
                if index >= previous {
                    return Err(UiError::RemoveIndexOrder { tag, index, previous });
                }
            }
            previous = Some(index);
        }
        let removed: Vec<Tag> = indices_to_remove.iter().map(|&i| children[i]).collect();

        let mut adds = views_to_add.to_vec();
        adds.sort();
        let mut running = count - indices_to_remove.len();
        let mut seen = HashSet::with_capacity(adds.len());
        for add in &adds {
            self.registry.entry(add.tag, OP)?;
            if !seen.insert(add.tag) {
                return Err(UiError::DuplicateChild { tag, child: add.tag, operation: OP });
            }
            if add.index > running {
                return Err(UiError::ChildIndexOutOfBounds {
                    tag,
                    index: add.index,
                    count: running,
                    operation: OP,
                });
            }
            if let Some(existing) = self.registry.parent_of(add.tag) {
                if existing != tag || !removed.contains(&add.tag) {
                    return Err(UiError::AlreadyParented { child: add.tag, parent: existing });
                }
            }
            running += 1;
        }

        for &delete in tags_to_delete {
            self.registry.entry(delete, OP)?;
        }

        // ===== Removals, high to low =====

        let animate_exit = self.animation.should_animate_exit();
        for &index in indices_to_remove.iter().rev() {
            let child = children.remove(index);
            if animate_exit && tags_to_delete.contains(&child) {
                // Stays attached until its exit animation completes.
                let exit = self.animation.schedule_exit(tag, child);
                trace!(tag, child, token = ?exit.token, "exit animation scheduled");
                continue;
            }
            if let Some(physical) = Self::physical_index_of(parent, &view, child) {
                parent.remove_child_at(&view, physical);
            }
            self.registry.set_parent(child, None);
        }

        // ===== Insertions, low to high =====

        for add in &adds {
            let child = self.registry.view(add.tag, OP)?;
            let physical = self.physical_insert_index(parent, &view, add.index);
            parent.add_view(&view, child, physical);
            self.registry.set_parent(add.tag, Some(tag));
        }

        // ===== Deletions =====

        let mut dropped = Vec::new();
        for &delete in tags_to_delete {
            // Gone already when listed after one of its ancestors.
            if self.animation.is_exiting(delete) || !self.registry.contains(delete) {
                continue;
            }
            self.detach(delete)?;
            self.drop_view(delete, &mut dropped)?;
        }
        self.report_dropped(dropped);
        Ok(())
    }

    /// Attach an ordered list of detached children to an empty parent.
    pub fn set_children(&mut self, tag: Tag, child_tags: &[Tag]) -> Result<()> {
        const OP: &str = "set_children";
        self.assert_on_thread();
        let (view, manager) = self.parent_view(tag, OP)?;
        let parent = manager
            .as_parent()
            .ok_or(UiError::NotAParent { tag, operation: OP })?;

        let mut seen = HashSet::with_capacity(child_tags.len());
        for &child in child_tags {
            self.registry.entry(child, OP)?;
            if !seen.insert(child) {
                return Err(UiError::DuplicateChild { tag, child, operation: OP });
            }
            if let Some(existing) = self.registry.parent_of(child) {
                return Err(UiError::AlreadyParented { child, parent: existing });
            }
        }

        let base = self.logical_children(parent, &view).len();
        for (offset, &child) in child_tags.iter().enumerate() {
            let child_view = self.registry.view(child, OP)?;
            let physical = self.physical_insert_index(parent, &view, base + offset);
            parent.add_view(&view, child_view, physical);
            self.registry.set_parent(child, Some(tag));
        }
        Ok(())
    }

    /// Drop views whose shadow parents have no native counterpart.
    pub fn delete_views(&mut self, tags: &[Tag]) -> Result<()> {
        self.assert_on_thread();
        for &tag in tags {
            self.registry.entry(tag, "delete_views")?;
        }
        let mut dropped = Vec::new();
        for &tag in tags {
            if !self.registry.contains(tag) {
                // Already dropped as a descendant of an earlier entry.
                continue;
            }
            self.detach(tag)?;
            self.drop_view(tag, &mut dropped)?;
        }
        self.report_dropped(dropped);
        Ok(())
    }

    /// Remove a view from its native parent, if attached.
    fn detach(&mut self, tag: Tag) -> Result<()> {
        let Some(parent_tag) = self.registry.parent_of(tag) else {
            return Ok(());
        };
        let (view, manager) = self.parent_view(parent_tag, "detach")?;
        if let Some(parent) = manager.as_parent() {
            if let Some(physical) = Self::physical_index_of(parent, &view, tag) {
                parent.remove_child_at(&view, physical);
            }
        }
        self.registry.set_parent(tag, None);
        Ok(())
    }

    /// Recursively unregister a view and its registered descendants.
    fn drop_view(&mut self, tag: Tag, dropped: &mut Vec<Tag>) -> Result<()> {
        self.assert_on_thread();
        let entry = self.registry.entry(tag, "drop_view")?;
        let view = entry.view.clone();
        let manager = entry.manager.clone();
        let context = entry.context;

        if !self.registry.is_root(tag) {
            manager.on_drop_view_instance(&context, &view);
        }

        if let Some(parent) = manager.as_parent() {
            for i in (0..parent.child_count(&view)).rev() {
                if let Some(child) = parent.child_at(&view, i) {
                    if self.registry.contains(child.tag) {
                        self.drop_view(child.tag, dropped)?;
                    }
                }
            }
            parent.remove_all_children(&view);
        }

        self.animation.forget(tag);
        self.registry.remove(tag);
        dropped.push(tag);
        Ok(())
    }

    fn report_dropped(&mut self, dropped: Vec<Tag>) {
        if dropped.is_empty() {
            return;
        }
        debug!(count = dropped.len(), "views dropped");
        if let Some(listener) = self.dropped_listener.as_mut() {
            listener(&dropped);
        }
    }

    /// Tear down a root and its native subtree.
    pub fn remove_root_view(&mut self, tag: Tag) -> Result<()> {
        self.assert_on_thread();
        if !self.registry.is_root(tag) {
            return Err(UiError::NotARoot(tag));
        }
        let mut dropped = Vec::new();
        self.drop_view(tag, &mut dropped)?;
        debug!(tag, "root view removed");
        self.report_dropped(dropped);
        Ok(())
    }

    /// Tear down every root. Used at shutdown.
    pub fn drop_all_views(&mut self) -> Result<()> {
        for tag in self.registry.root_tags() {
            self.remove_root_view(tag)?;
        }
        Ok(())
    }

    // =========================================================================
    // Layout animation
    // =========================================================================

    pub fn configure_layout_animation(&mut self, config: &Value) -> Result<()> {
        self.assert_on_thread();
        self.animation.initialize_from_config(config)
    }

    /// End of a committed batch: the animation configuration only covers the
    /// batch it was sent with.
    pub fn on_batch_complete(&mut self) {
        self.animation.reset();
    }

    pub fn pending_exit_animations(&self) -> Vec<PendingExit> {
        self.animation.pending()
    }

    /// Finish a deferred deletion: detach and drop the exiting view.
    pub fn complete_exit_animation(&mut self, token: AnimationToken) -> Result<()> {
        self.assert_on_thread();
        let Some(exit) = self.animation.complete(token) else {
            return Ok(());
        };
        if !self.registry.contains(exit.tag) {
            return Ok(());
        }
        self.detach(exit.tag)?;
        let mut dropped = Vec::new();
        self.drop_view(exit.tag, &mut dropped)?;
        self.report_dropped(dropped);
        Ok(())
    }

    // =========================================================================
    // Measurement
    // =========================================================================

    /// Frame of a view relative to its root view.
    pub fn measure(&self, tag: Tag) -> Result<Dimensions> {
        self.assert_on_thread();
        let (frame, _) = self.measure_to_root(tag, "measure")?;
        Ok(frame)
    }

    /// Frame of a view relative to the window hosting its root.
    pub fn measure_in_window(&self, tag: Tag) -> Result<Dimensions> {
        self.assert_on_thread();
        let (frame, root) = self.measure_to_root(tag, "measure_in_window")?;
        let entry = self.registry.entry(root, "measure_in_window")?;
        let origin = entry.manager.get_dimensions(&entry.view);
        Ok(frame.offset(origin.x, origin.y))
    }

    fn measure_to_root(&self, tag: Tag, operation: &'static str) -> Result<(Dimensions, Tag)> {
        let entry = self.registry.entry(tag, operation)?;
        if self.registry.is_root(tag) {
            let size = entry.manager.get_dimensions(&entry.view);
            return Ok((Dimensions::new(0.0, 0.0, size.width, size.height), tag));
        }

        let mut frame = entry.manager.get_dimensions(&entry.view);
        let mut current = tag;
        loop {
            let parent = self
                .registry
                .parent_of(current)
                .ok_or(UiError::NotOnScreen { tag, operation })?;
            if self.registry.is_root(parent) {
                return Ok((frame, parent));
            }
            let parent_entry = self
                .registry
                .get(parent)
                .ok_or(UiError::NotOnScreen { tag, operation })?;
            let offset = parent_entry.manager.get_dimensions(&parent_entry.view);
            frame = frame.offset(offset.x, offset.y);
            current = parent;
        }
    }

    /// Innermost view under a point given in `tag`'s own coordinates.
    pub fn find_target_for_touch(&self, tag: Tag, x: f64, y: f64) -> Result<Tag> {
        self.assert_on_thread();
        let entry = self.registry.entry(tag, "find_target_for_touch")?;
        let size = entry.manager.get_dimensions(&entry.view);
        if !Dimensions::new(0.0, 0.0, size.width, size.height).contains(x, y) {
            return Err(UiError::NoTouchTarget { tag, x, y });
        }
        Ok(self.hit_test(tag, x, y))
    }

    fn hit_test(&self, tag: Tag, x: f64, y: f64) -> Tag {
        let Some(entry) = self.registry.get(tag) else {
            return tag;
        };
        let Some(parent) = entry.manager.as_parent() else {
            return tag;
        };
        // Topmost child first.
        for i in (0..parent.child_count(&entry.view)).rev() {
            let Some(child) = parent.child_at(&entry.view, i) else {
                continue;
            };
            if self.animation.is_exiting(child.tag) {
                continue;
            }
            let Some(child_entry) = self.registry.get(child.tag) else {
                continue;
            };
            let frame = child_entry.manager.get_dimensions(&child_entry.view);
            if frame.contains(x, y) {
                return self.hit_test(child.tag, x - frame.x, y - frame.y);
            }
        }
        tag
    }
}
