//! Panel - In-memory widget and its view manager.
//!
//! The panel keeps everything a native toolkit would show: its frame, the
//! props it received, its ordered children, commands and extra data. It backs
//! the root view manager and serves as the toolkit stand-in for tests and
//! headless hosts.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::{MeasureFunc, ShadowNode};
use crate::types::{Dimensions, Props, ShadowNodeKind, Tag, ThemedContext};

use super::view_manager::{NativeView, ViewManager, ViewParentManager};

/// Class name of root views.
pub const ROOT_VIEW_CLASS: &str = "Root";

#[derive(Default)]
pub struct Panel {
    frame: Cell<Dimensions>,
    props: RefCell<Props>,
    children: RefCell<Vec<NativeView>>,
    commands: RefCell<Vec<(String, Value)>>,
    extra_data: RefCell<Option<Value>>,
    dropped: Cell<bool>,
}

impl Panel {
    pub fn frame(&self) -> Dimensions {
        self.frame.get()
    }

    pub fn set_frame(&self, frame: Dimensions) {
        self.frame.set(frame);
    }

    pub fn prop(&self, name: &str) -> Option<Value> {
        self.props.borrow().get(name).cloned()
    }

    pub fn child_tags(&self) -> Vec<Tag> {
        self.children.borrow().iter().map(|c| c.tag).collect()
    }

    pub fn commands(&self) -> Vec<(String, Value)> {
        self.commands.borrow().clone()
    }

    pub fn extra_data(&self) -> Option<Value> {
        self.extra_data.borrow().clone()
    }

    /// Whether the drop hook ran for this widget.
    pub fn is_dropped(&self) -> bool {
        self.dropped.get()
    }
}

/// Borrow a native view as a panel.
pub fn as_panel(view: &NativeView) -> Option<&Panel> {
    view.downcast::<Panel>()
}

// =============================================================================
// Manager
// =============================================================================

/// Hook run on dirty shadow nodes before layout.
pub type BeforeLayoutFn = Arc<dyn Fn(&mut ShadowNode) + Send + Sync>;

pub struct PanelViewManager {
    name: String,
    kind: ShadowNodeKind,
    is_parent: bool,
    custom_layout: bool,
    measure: Option<MeasureFunc>,
    before_layout: Option<BeforeLayoutFn>,
}

impl PanelViewManager {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ShadowNodeKind::Layout,
            is_parent: true,
            custom_layout: false,
            measure: None,
            before_layout: None,
        }
    }

    /// Manager for the root views of every surface.
    pub fn root() -> Self {
        Self::new(ROOT_VIEW_CLASS)
    }

    /// Shadow nodes of this class have no widget.
    pub fn virtual_node(mut self) -> Self {
        self.kind = ShadowNodeKind::Virtual;
        self.is_parent = false;
        self
    }

    /// Widgets of this class render their own children.
    pub fn virtual_anchor(mut self) -> Self {
        self.kind = ShadowNodeKind::VirtualAnchor;
        self
    }

    /// Widgets of this class cannot hold children.
    pub fn leaf(mut self) -> Self {
        self.is_parent = false;
        self
    }

    /// Widgets of this class position their children themselves.
    pub fn custom_layout(mut self) -> Self {
        self.custom_layout = true;
        self
    }

    pub fn with_measure(mut self, measure: MeasureFunc) -> Self {
        self.measure = Some(measure);
        self
    }

    pub fn with_before_layout(mut self, hook: BeforeLayoutFn) -> Self {
        self.before_layout = Some(hook);
        self
    }
}

impl ViewManager for PanelViewManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_view(&self, _context: &ThemedContext) -> Rc<dyn Any> {
        Rc::new(Panel::default())
    }

    fn update_props(&self, view: &NativeView, props: &Props) {
        if let Some(panel) = as_panel(view) {
            let mut current = panel.props.borrow_mut();
            for (name, value) in props {
                if value.is_null() {
                    current.remove(name);
                } else {
                    current.insert(name.clone(), value.clone());
                }
            }
        }
    }

    fn update_extra_data(&self, view: &NativeView, data: &Value) {
        if let Some(panel) = as_panel(view) {
            *panel.extra_data.borrow_mut() = Some(data.clone());
        }
    }

    fn set_dimensions(&self, view: &NativeView, dimensions: Dimensions) {
        if let Some(panel) = as_panel(view) {
            panel.set_frame(dimensions);
        }
    }

    fn get_dimensions(&self, view: &NativeView) -> Dimensions {
        as_panel(view).map(Panel::frame).unwrap_or_default()
    }

    fn receive_command(&self, view: &NativeView, command_id: &str, args: &Value) {
        if let Some(panel) = as_panel(view) {
            panel.commands.borrow_mut().push((command_id.to_string(), args.clone()));
        }
    }

    fn on_drop_view_instance(&self, _context: &ThemedContext, view: &NativeView) {
        if let Some(panel) = as_panel(view) {
            panel.dropped.set(true);
        }
    }

    fn as_parent(&self) -> Option<&dyn ViewParentManager> {
        if self.is_parent { Some(self as &dyn ViewParentManager) } else { None }
    }

    fn shadow_node_kind(&self) -> ShadowNodeKind {
        self.kind
    }

    fn measure_function(&self) -> Option<MeasureFunc> {
        self.measure.clone()
    }

    fn on_before_layout(&self, node: &mut ShadowNode) {
        if let Some(hook) = &self.before_layout {
            hook(node);
        }
    }
}

impl ViewParentManager for PanelViewManager {
    fn add_view(&self, parent: &NativeView, child: NativeView, index: usize) {
        if let Some(panel) = as_panel(parent) {
            let mut children = panel.children.borrow_mut();
            let index = index.min(children.len());
            children.insert(index, child);
        }
    }

    fn child_count(&self, parent: &NativeView) -> usize {
        as_panel(parent).map(|p| p.children.borrow().len()).unwrap_or(0)
    }

    fn child_at(&self, parent: &NativeView, index: usize) -> Option<NativeView> {
        as_panel(parent).and_then(|p| p.children.borrow().get(index).cloned())
    }

    fn remove_child_at(&self, parent: &NativeView, index: usize) {
        if let Some(panel) = as_panel(parent) {
            let mut children = panel.children.borrow_mut();
            if index < children.len() {
                children.remove(index);
            }
        }
    }

    fn remove_all_children(&self, parent: &NativeView) {
        if let Some(panel) = as_panel(parent) {
            panel.children.borrow_mut().clear();
        }
    }

    fn needs_custom_layout_for_children(&self) -> bool {
        self.custom_layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> (PanelViewManager, NativeView) {
        let manager = PanelViewManager::new("View");
        let view = NativeView::new(1, manager.create_view(&ThemedContext::new(1)));
        (manager, view)
    }

    #[test]
    fn test_children() {
        let (manager, parent) = setup();
        let context = ThemedContext::new(1);
        for tag in [2, 3] {
            let child = NativeView::new(tag, manager.create_view(&context));
            manager.add_view(&parent, child, manager.child_count(&parent));
        }
        let first = NativeView::new(4, manager.create_view(&context));
        manager.add_view(&parent, first, 0);

        let panel = as_panel(&parent).unwrap();
        assert_eq!(panel.child_tags(), vec![4, 2, 3]);
        assert_eq!(manager.child_at(&parent, 1).map(|c| c.tag), Some(2));

        manager.remove_child_at(&parent, 0);
        assert_eq!(panel.child_tags(), vec![2, 3]);
        manager.remove_all_children(&parent);
        assert_eq!(manager.child_count(&parent), 0);
    }

    #[test]
    fn test_props_and_frame() {
        let (manager, view) = setup();
        let props = json!({ "opacity": 0.5, "testID": "a" });
        manager.update_props(&view, props.as_object().unwrap());
        manager.update_props(&view, json!({ "testID": null }).as_object().unwrap());

        let panel = as_panel(&view).unwrap();
        assert_eq!(panel.prop("opacity"), Some(json!(0.5)));
        assert_eq!(panel.prop("testID"), None);

        manager.set_dimensions(&view, Dimensions::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(manager.get_dimensions(&view), Dimensions::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn test_capabilities() {
        assert!(PanelViewManager::new("View").as_parent().is_some());
        assert!(PanelViewManager::new("Image").leaf().as_parent().is_none());
        assert!(PanelViewManager::new("RawText").virtual_node().as_parent().is_none());
        let custom = PanelViewManager::new("Scroll").custom_layout();
        assert!(custom.as_parent().is_some_and(|p| p.needs_custom_layout_for_children()));
    }
}
