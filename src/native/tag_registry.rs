//! Tag Registry - Side table from tags to native views.
//!
//! One row per materialised tag: the widget, its manager, the context it was
//! created with and the tag of its current native parent. Roots are tracked in
//! a separate set; a tag is never both a regular view and a root.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{Result, UiError};
use crate::types::{Tag, ThemedContext};

use super::view_manager::{NativeView, ViewManager};

pub struct ViewEntry {
    pub view: NativeView,
    pub manager: Arc<dyn ViewManager>,
    pub context: ThemedContext,
    pub parent: Option<Tag>,
}

#[derive(Default)]
pub struct TagRegistry {
    entries: HashMap<Tag, ViewEntry>,
    roots: BTreeSet<Tag>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly created view.
    pub fn insert(
        &mut self,
        view: NativeView,
        manager: Arc<dyn ViewManager>,
        context: ThemedContext,
    ) -> Result<()> {
        if self.entries.contains_key(&view.tag) {
            return Err(UiError::DuplicateTag(view.tag));
        }
        self.entries.insert(view.tag, ViewEntry { view, manager, context, parent: None });
        Ok(())
    }

    /// Record a root view.
    pub fn insert_root(
        &mut self,
        view: NativeView,
        manager: Arc<dyn ViewManager>,
        context: ThemedContext,
    ) -> Result<()> {
        let tag = view.tag;
        self.insert(view, manager, context)?;
        self.roots.insert(tag);
        Ok(())
    }

    pub fn remove(&mut self, tag: Tag) -> Option<ViewEntry> {
        self.roots.remove(&tag);
        self.entries.remove(&tag)
    }

    pub fn get(&self, tag: Tag) -> Option<&ViewEntry> {
        self.entries.get(&tag)
    }

    /// Look up a row, failing with the name of the operation that needed it.
    pub fn entry(&self, tag: Tag, operation: &'static str) -> Result<&ViewEntry> {
        self.entries.get(&tag).ok_or(UiError::TagNotFound { tag, operation })
    }

    pub fn view(&self, tag: Tag, operation: &'static str) -> Result<NativeView> {
        self.entry(tag, operation).map(|e| e.view.clone())
    }

    pub fn manager(&self, tag: Tag, operation: &'static str) -> Result<Arc<dyn ViewManager>> {
        self.entry(tag, operation).map(|e| e.manager.clone())
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag)
    }

    pub fn is_root(&self, tag: Tag) -> bool {
        self.roots.contains(&tag)
    }

    pub fn root_tags(&self) -> Vec<Tag> {
        self.roots.iter().copied().collect()
    }

    pub fn parent_of(&self, tag: Tag) -> Option<Tag> {
        self.entries.get(&tag).and_then(|e| e.parent)
    }

    pub fn set_parent(&mut self, tag: Tag, parent: Option<Tag>) {
        if let Some(entry) = self.entries.get_mut(&tag) {
            entry.parent = parent;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.entries.keys().copied()
    }
}
