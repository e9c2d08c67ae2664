//! ShadowNode - Retained layout node mirroring one UI element.
//!
//! Each tag created by the scripting bridge gets one ShadowNode that lives
//! until the element is deleted. The node holds the layout style the layout
//! engine reads, the structural links of the shadow tree, and the frame that
//! was last computed and dispatched to the native side.
//!
//! Nodes are owned by [`ShadowTree`](super::ShadowTree); links between nodes
//! are tags, never references.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use taffy::{AvailableSpace, Size};

use crate::types::{
    AlignContent, AlignItems, AlignSelf, Dimension, Display, FlexDirection, FlexWrap,
    JustifyContent, Overflow, PositionType, Props, ShadowNodeKind, Tag, ThemedContext,
};

use super::props::setter_for;

// =============================================================================
// Flags
// =============================================================================

bitflags::bitflags! {
    /// Per-node state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// No native counterpart.
        const VIRTUAL = 1 << 0;
        /// Native counterpart renders its own children.
        const VIRTUAL_ANCHOR = 1 << 1;
        /// Style or children changed since the last dispatch.
        const UPDATED = 1 << 2;
        /// Layout engine produced a frame that has not been dispatched yet.
        const NEW_LAYOUT = 1 << 3;
        /// `onLayout` listener present.
        const NOTIFY_ON_LAYOUT = 1 << 4;
        /// Root size changed; relayout even if nothing below is dirty.
        const FORCE_LAYOUT = 1 << 5;
    }
}

impl From<ShadowNodeKind> for NodeFlags {
    fn from(kind: ShadowNodeKind) -> Self {
        match kind {
            ShadowNodeKind::Layout => NodeFlags::empty(),
            ShadowNodeKind::Virtual => NodeFlags::VIRTUAL,
            ShadowNodeKind::VirtualAnchor => NodeFlags::VIRTUAL_ANCHOR,
        }
    }
}

// =============================================================================
// Layout style
// =============================================================================

/// Four-sided value (margin, padding, border, position offsets).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges<T> {
    pub top: T,
    pub right: T,
    pub bottom: T,
    pub left: T,
}

impl<T: Copy> Edges<T> {
    pub fn all(value: T) -> Self {
        Self { top: value, right: value, bottom: value, left: value }
    }
}

/// Layout-affecting style of one node.
///
/// Defaults follow the layout conventions of the scripting framework:
/// column direction, stretch alignment, no shrinking.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutStyle {
    // Container
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_wrap: FlexWrap,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub align_content: AlignContent,
    pub overflow: Overflow,

    // Item
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub flex_basis: Dimension,
    pub align_self: AlignSelf,
    pub position_type: PositionType,
    pub aspect_ratio: Option<f32>,

    // Dimensions
    pub width: Dimension,
    pub height: Dimension,
    pub min_width: Dimension,
    pub min_height: Dimension,
    pub max_width: Dimension,
    pub max_height: Dimension,

    // Spacing
    pub margin: Edges<Dimension>,
    pub padding: Edges<Dimension>,
    pub border: Edges<f32>,
    pub position: Edges<Dimension>,
}

impl Default for LayoutStyle {
    fn default() -> Self {
        Self {
            display: Display::Flex,
            flex_direction: FlexDirection::Column,
            flex_wrap: FlexWrap::NoWrap,
            justify_content: JustifyContent::FlexStart,
            align_items: AlignItems::Stretch,
            align_content: AlignContent::FlexStart,
            overflow: Overflow::Visible,
            flex_grow: 0.0,
            flex_shrink: 0.0,
            flex_basis: Dimension::Auto,
            align_self: AlignSelf::Auto,
            position_type: PositionType::Relative,
            aspect_ratio: None,
            width: Dimension::Auto,
            height: Dimension::Auto,
            min_width: Dimension::Auto,
            min_height: Dimension::Auto,
            max_width: Dimension::Auto,
            max_height: Dimension::Auto,
            margin: Edges::all(Dimension::Points(0.0)),
            padding: Edges::all(Dimension::Points(0.0)),
            border: Edges::all(0.0),
            position: Edges::all(Dimension::Auto),
        }
    }
}

// =============================================================================
// Frames
// =============================================================================

/// Frame produced by the layout engine, relative to the parent's border box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutFrame {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Pixel-snapped frame last dispatched to the native side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Intrinsic size callback for leaf nodes (text and other content-sized views).
pub type MeasureFunc =
    Arc<dyn Fn(&ShadowNode, Size<Option<f32>>, Size<AvailableSpace>) -> Size<f32> + Send + Sync>;

// =============================================================================
// ShadowNode
// =============================================================================

pub struct ShadowNode {
    /// Element identity shared with the native view.
    pub tag: Tag,
    /// View class the node was created with.
    pub view_class: String,
    /// Tag of the root this node was created under.
    pub root_tag: Tag,
    pub context: ThemedContext,
    pub style: LayoutStyle,
    /// Last value of every non-layout property.
    pub props: Props,

    pub(crate) flags: NodeFlags,
    pub(crate) parent: Option<Tag>,
    pub(crate) children: Vec<Tag>,
    pub(crate) layout: LayoutFrame,
    pub(crate) screen: ScreenRect,
    pub(crate) measure: Option<MeasureFunc>,
}

impl fmt::Debug for ShadowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowNode")
            .field("tag", &self.tag)
            .field("view_class", &self.view_class)
            .field("root_tag", &self.root_tag)
            .field("flags", &self.flags)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl ShadowNode {
    /// Create an unattached node. New nodes start dirty so their first layout
    /// is always dispatched.
    pub fn new(tag: Tag, view_class: impl Into<String>, root_tag: Tag, kind: ShadowNodeKind) -> Self {
        Self {
            tag,
            view_class: view_class.into(),
            root_tag,
            context: ThemedContext::new(root_tag),
            style: LayoutStyle::default(),
            props: Props::new(),
            flags: NodeFlags::from(kind) | NodeFlags::UPDATED,
            parent: None,
            children: Vec::new(),
            layout: LayoutFrame::default(),
            screen: ScreenRect::default(),
            measure: None,
        }
    }

    /// Attach an intrinsic size callback.
    pub fn with_measure(mut self, measure: Option<MeasureFunc>) -> Self {
        self.measure = measure;
        self
    }

    // ===== Flags =====

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn is_virtual(&self) -> bool {
        self.flags.contains(NodeFlags::VIRTUAL)
    }

    pub fn is_virtual_anchor(&self) -> bool {
        self.flags.contains(NodeFlags::VIRTUAL_ANCHOR)
    }

    pub fn kind(&self) -> ShadowNodeKind {
        if self.is_virtual() {
            ShadowNodeKind::Virtual
        } else if self.is_virtual_anchor() {
            ShadowNodeKind::VirtualAnchor
        } else {
            ShadowNodeKind::Layout
        }
    }

    pub fn has_updates(&self) -> bool {
        self.flags.intersects(NodeFlags::UPDATED | NodeFlags::NEW_LAYOUT)
    }

    pub fn is_updated(&self) -> bool {
        self.flags.contains(NodeFlags::UPDATED)
    }

    pub fn has_new_layout(&self) -> bool {
        self.flags.contains(NodeFlags::NEW_LAYOUT)
    }

    pub fn should_notify_on_layout(&self) -> bool {
        self.flags.contains(NodeFlags::NOTIFY_ON_LAYOUT)
    }

    /// Clear the dirty state once the node's update has been dispatched.
    pub fn mark_update_seen(&mut self) {
        self.flags.remove(NodeFlags::UPDATED | NodeFlags::NEW_LAYOUT | NodeFlags::FORCE_LAYOUT);
    }

    // ===== Structure =====

    pub fn parent(&self) -> Option<Tag> {
        self.parent
    }

    pub fn children(&self) -> &[Tag] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn has_measure_function(&self) -> bool {
        self.measure.is_some()
    }

    pub fn measure_function(&self) -> Option<&MeasureFunc> {
        self.measure.as_ref()
    }

    // ===== Properties =====

    /// Apply a property bag.
    ///
    /// Layout properties go through the setter table; on virtual nodes they are
    /// dropped. Everything else is remembered in [`ShadowNode::props`].
    ///
    /// # Returns
    /// `true` if any layout-affecting value was applied.
    pub fn update_props(&mut self, props: &Props) -> bool {
        let mut layout_changed = false;

        for (name, value) in props {
            if name == "onLayout" {
                self.flags.set(NodeFlags::NOTIFY_ON_LAYOUT, is_truthy(value));
                continue;
            }

            match setter_for(name) {
                Some(setter) => {
                    if self.is_virtual() {
                        continue;
                    }
                    let before = self.style.clone();
                    setter(&mut self.style, value);
                    layout_changed |= before != self.style;
                }
                None => {
                    if value.is_null() {
                        self.props.remove(name);
                    } else {
                        self.props.insert(name.clone(), value.clone());
                    }
                }
            }
        }

        layout_changed
    }

    // ===== Layout =====

    pub fn layout(&self) -> LayoutFrame {
        self.layout
    }

    pub fn screen(&self) -> ScreenRect {
        self.screen
    }

    /// Store the frame the layout engine computed.
    pub fn set_computed_layout(&mut self, frame: LayoutFrame) {
        if frame != self.layout || self.is_updated() {
            self.flags.insert(NodeFlags::NEW_LAYOUT);
        }
        self.layout = frame;
    }

    /// Convert the computed frame to a pixel-snapped screen rect.
    ///
    /// Edges are rounded in absolute space so adjacent siblings never leave
    /// gaps; the width is derived from the rounded edges.
    ///
    /// # Arguments
    /// * `absolute_x`, `absolute_y` - Absolute origin of the parent
    ///
    /// # Returns
    /// `true` if the screen rect changed and a native layout update is due.
    pub fn dispatch_updates(&mut self, absolute_x: f32, absolute_y: f32) -> bool {
        if !self.has_new_layout() {
            return false;
        }

        let layout = self.layout;
        let left = (absolute_x + layout.x).round() as i32;
        let top = (absolute_y + layout.y).round() as i32;
        let right = (absolute_x + layout.x + layout.width).round() as i32;
        let bottom = (absolute_y + layout.y + layout.height).round() as i32;

        let next = ScreenRect {
            x: layout.x.round() as i32,
            y: layout.y.round() as i32,
            width: right - left,
            height: bottom - top,
        };

        let changed = next != self.screen;
        self.screen = next;
        changed
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Props {
        match value {
            Value::Object(map) => map,
            _ => Props::new(),
        }
    }

    #[test]
    fn test_new_node_is_dirty() {
        let node = ShadowNode::new(1, "View", 1, ShadowNodeKind::Layout);
        assert!(node.has_updates());
        assert!(node.parent().is_none());
        assert_eq!(node.child_count(), 0);
    }

    #[test]
    fn test_update_props_layout_and_passthrough() {
        let mut node = ShadowNode::new(5, "Box", 1, ShadowNodeKind::Layout);
        let changed = node.update_props(&props(json!({ "width": 10, "backgroundColor": "red" })));
        assert!(changed);
        assert_eq!(node.style.width, Dimension::Points(10.0));
        assert_eq!(node.props.get("backgroundColor"), Some(&json!("red")));
        assert!(!node.props.contains_key("width"));

        // Same value again is not a change
        assert!(!node.update_props(&props(json!({ "width": 10 }))));
    }

    #[test]
    fn test_layout_props_ignored_on_virtual() {
        let mut node = ShadowNode::new(6, "RawText", 1, ShadowNodeKind::Virtual);
        let changed = node.update_props(&props(json!({ "width": 99, "text": "hi" })));
        assert!(!changed);
        assert_eq!(node.style.width, Dimension::Auto);
        assert_eq!(node.props.get("text"), Some(&json!("hi")));
    }

    #[test]
    fn test_on_layout_flag() {
        let mut node = ShadowNode::new(7, "View", 1, ShadowNodeKind::Layout);
        node.update_props(&props(json!({ "onLayout": true })));
        assert!(node.should_notify_on_layout());
        node.update_props(&props(json!({ "onLayout": null })));
        assert!(!node.should_notify_on_layout());
    }

    #[test]
    fn test_dispatch_updates_rounds_edges() {
        let mut node = ShadowNode::new(8, "View", 1, ShadowNodeKind::Layout);
        node.set_computed_layout(LayoutFrame { x: 0.4, y: 0.6, width: 10.2, height: 4.4 });
        assert!(node.dispatch_updates(0.3, 0.0));
        let screen = node.screen();
        assert_eq!(screen.x, 0);
        assert_eq!(screen.y, 1);
        // left = round(0.7) = 1, right = round(10.9) = 11
        assert_eq!(screen.width, 10);
        // top = round(0.6) = 1, bottom = round(5.0) = 5
        assert_eq!(screen.height, 4);

        // Same frame again: nothing to dispatch
        node.mark_update_seen();
        node.set_computed_layout(LayoutFrame { x: 0.4, y: 0.6, width: 10.2, height: 4.4 });
        assert!(!node.dispatch_updates(0.3, 0.0));
    }
}
