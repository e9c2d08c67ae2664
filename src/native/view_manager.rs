//! View managers - Per view-class strategies that own native widgets.
//!
//! A view manager knows how to create one kind of native widget and how to
//! push props, frames and commands into it. Managers whose widgets can hold
//! children also expose the [`ViewParentManager`] capability.
//!
//! Widgets are opaque `Rc<dyn Any>` handles. They never leave the UI thread;
//! managers themselves are shared across threads because the orchestrator
//! asks them about shadow node kinds and measure functions.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::{MeasureFunc, ShadowNode};
use crate::error::{Result, UiError};
use crate::types::{Dimensions, Props, ShadowNodeKind, Tag, ThemedContext};

/// A native widget together with the tag it was created for.
#[derive(Clone)]
pub struct NativeView {
    pub tag: Tag,
    pub widget: Rc<dyn Any>,
}

impl NativeView {
    pub fn new(tag: Tag, widget: Rc<dyn Any>) -> Self {
        Self { tag, widget }
    }

    /// Borrow the widget as a concrete type.
    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        self.widget.downcast_ref::<T>()
    }

    /// Check whether two handles point at the same widget.
    pub fn same_widget(&self, other: &NativeView) -> bool {
        Rc::ptr_eq(&self.widget, &other.widget)
    }
}

impl fmt::Debug for NativeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeView").field("tag", &self.tag).finish_non_exhaustive()
    }
}

// =============================================================================
// Traits
// =============================================================================

pub trait ViewManager: Send + Sync {
    /// View class name used by `createView` commands.
    fn name(&self) -> &str;

    fn create_view(&self, context: &ThemedContext) -> Rc<dyn Any>;

    fn update_props(&self, view: &NativeView, props: &Props);

    fn update_extra_data(&self, _view: &NativeView, _data: &Value) {}

    fn set_dimensions(&self, view: &NativeView, dimensions: Dimensions);

    fn get_dimensions(&self, view: &NativeView) -> Dimensions;

    fn receive_command(&self, _view: &NativeView, _command_id: &str, _args: &Value) {}

    /// Teardown hook, called once for every non-root view that is dropped.
    fn on_drop_view_instance(&self, _context: &ThemedContext, _view: &NativeView) {}

    /// Parent capability, if this manager's widgets hold children.
    fn as_parent(&self) -> Option<&dyn ViewParentManager> {
        None
    }

    /// How shadow nodes of this class relate to the native tree.
    fn shadow_node_kind(&self) -> ShadowNodeKind {
        ShadowNodeKind::Layout
    }

    /// Intrinsic size callback for shadow nodes of this class.
    fn measure_function(&self) -> Option<MeasureFunc> {
        None
    }

    /// Called on dirty shadow nodes of this class before their root is laid
    /// out, children before parents.
    fn on_before_layout(&self, _node: &mut ShadowNode) {}
}

pub trait ViewParentManager {
    fn add_view(&self, parent: &NativeView, child: NativeView, index: usize);

    fn child_count(&self, parent: &NativeView) -> usize;

    fn child_at(&self, parent: &NativeView, index: usize) -> Option<NativeView>;

    fn remove_child_at(&self, parent: &NativeView, index: usize);

    fn remove_all_children(&self, parent: &NativeView);

    /// `true` if the widget positions its children itself and frames from the
    /// shadow tree must not be applied to them.
    fn needs_custom_layout_for_children(&self) -> bool {
        false
    }
}

// =============================================================================
// Registry
// =============================================================================

/// View managers by class name.
#[derive(Clone, Default)]
pub struct ViewManagerRegistry {
    managers: HashMap<String, Arc<dyn ViewManager>>,
}

impl ViewManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manager under its own name, replacing any previous one.
    pub fn register(&mut self, manager: Arc<dyn ViewManager>) {
        self.managers.insert(manager.name().to_string(), manager);
    }

    pub fn with(mut self, manager: Arc<dyn ViewManager>) -> Self {
        self.register(manager);
        self
    }

    pub fn get(&self, class_name: &str) -> Result<Arc<dyn ViewManager>> {
        self.managers
            .get(class_name)
            .cloned()
            .ok_or_else(|| UiError::UnknownViewManager(class_name.to_string()))
    }
}

impl fmt::Debug for ViewManagerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.managers.keys()).finish()
    }
}
