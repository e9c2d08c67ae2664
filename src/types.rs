//! Core types for the UI manager.
//!
//! These types are shared by the shadow tree, the native hierarchy and the
//! operation queue. Tags are the only identifier that crosses between them.

use serde_json::Value;

// =============================================================================
// Identity
// =============================================================================

/// Caller-assigned identifier of one logical UI element.
///
/// The same tag names a shadow node and (when materialised) its native view.
pub type Tag = i32;

/// Named property bag delivered by the scripting bridge.
pub type Props = serde_json::Map<String, Value>;

/// Per-root context handed to view managers when they create views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThemedContext {
    pub root_tag: Tag,
}

impl ThemedContext {
    pub const fn new(root_tag: Tag) -> Self {
        Self { root_tag }
    }
}

// =============================================================================
// Frames
// =============================================================================

/// A rectangle in native coordinates (position relative to the parent view).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dimensions {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Check whether a point (in the same coordinate space) lies inside.
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    /// Translate by an offset.
    #[inline]
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// A pending insertion: put `tag` at `index` of some parent.
///
/// Ordered by index so insertion batches can be sorted low-to-high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewAtIndex {
    pub tag: Tag,
    pub index: usize,
}

impl ViewAtIndex {
    pub const fn new(tag: Tag, index: usize) -> Self {
        Self { tag, index }
    }
}

impl PartialOrd for ViewAtIndex {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ViewAtIndex {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index).then(self.tag.cmp(&other.tag))
    }
}

// =============================================================================
// Node kind
// =============================================================================

/// How a shadow node relates to the native tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowNodeKind {
    /// Regular node: one native view, children laid out by the shadow tree.
    #[default]
    Layout,
    /// No native counterpart at all.
    Virtual,
    /// Native counterpart renders its own children (e.g. text).
    VirtualAnchor,
}

// =============================================================================
// Dimension - Supports absolute and percentage values
// =============================================================================

/// A style length: points, percentage of the parent, or auto.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Dimension {
    /// Content-determined.
    #[default]
    Auto,
    /// Absolute size in device-independent points.
    Points(f32),
    /// Percentage of parent size (0-100).
    Percent(f32),
}

impl Dimension {
    /// Parse a JSON style value: numbers are points, `"50%"` is a percentage,
    /// `"auto"` and `null` are auto.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Auto),
            Value::Number(n) => n.as_f64().map(|v| Self::Points(v as f32)),
            Value::String(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("auto") {
                    Some(Self::Auto)
                } else if let Some(pct) = s.strip_suffix('%') {
                    pct.trim().parse::<f32>().ok().map(Self::Percent)
                } else {
                    s.parse::<f32>().ok().map(Self::Points)
                }
            }
            _ => None,
        }
    }
}

// =============================================================================
// Flex Enums - For layout
// =============================================================================

/// Flex direction for container layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlexDirection {
    #[default]
    Column,
    Row,
    ColumnReverse,
    RowReverse,
}

impl FlexDirection {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "column" => Self::Column,
            "row" => Self::Row,
            "column-reverse" => Self::ColumnReverse,
            "row-reverse" => Self::RowReverse,
            _ => return None,
        })
    }
}

/// Flex wrap behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlexWrap {
    #[default]
    NoWrap,
    Wrap,
    WrapReverse,
}

impl FlexWrap {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "nowrap" => Self::NoWrap,
            "wrap" => Self::Wrap,
            "wrap-reverse" => Self::WrapReverse,
            _ => return None,
        })
    }
}

/// Justify content (main axis alignment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JustifyContent {
    #[default]
    FlexStart,
    Center,
    FlexEnd,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

impl JustifyContent {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "flex-start" => Self::FlexStart,
            "center" => Self::Center,
            "flex-end" => Self::FlexEnd,
            "space-between" => Self::SpaceBetween,
            "space-around" => Self::SpaceAround,
            "space-evenly" => Self::SpaceEvenly,
            _ => return None,
        })
    }
}

/// Align items (cross axis alignment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlignItems {
    #[default]
    Stretch,
    FlexStart,
    Center,
    FlexEnd,
    Baseline,
}

impl AlignItems {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "stretch" => Self::Stretch,
            "flex-start" => Self::FlexStart,
            "center" => Self::Center,
            "flex-end" => Self::FlexEnd,
            "baseline" => Self::Baseline,
            _ => return None,
        })
    }
}

/// Align self (item override for align items).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlignSelf {
    #[default]
    Auto,
    Stretch,
    FlexStart,
    Center,
    FlexEnd,
    Baseline,
}

impl AlignSelf {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "auto" => Self::Auto,
            "stretch" => Self::Stretch,
            "flex-start" => Self::FlexStart,
            "center" => Self::Center,
            "flex-end" => Self::FlexEnd,
            "baseline" => Self::Baseline,
            _ => return None,
        })
    }
}

/// Align content (multi-line cross axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlignContent {
    Stretch,
    #[default]
    FlexStart,
    Center,
    FlexEnd,
    SpaceBetween,
    SpaceAround,
}

impl AlignContent {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "stretch" => Self::Stretch,
            "flex-start" => Self::FlexStart,
            "center" => Self::Center,
            "flex-end" => Self::FlexEnd,
            "space-between" => Self::SpaceBetween,
            "space-around" => Self::SpaceAround,
            _ => return None,
        })
    }
}

/// Overflow behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Scroll,
}

impl Overflow {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "visible" => Self::Visible,
            "hidden" => Self::Hidden,
            "scroll" => Self::Scroll,
            _ => return None,
        })
    }
}

/// Position type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionType {
    #[default]
    Relative,
    Absolute,
}

impl PositionType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "relative" => Self::Relative,
            "absolute" => Self::Absolute,
            _ => return None,
        })
    }
}

/// Display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Flex,
    None,
}

impl Display {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "flex" => Self::Flex,
            "none" => Self::None,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dimension_from_value() {
        assert_eq!(Dimension::from_value(&json!(10)), Some(Dimension::Points(10.0)));
        assert_eq!(Dimension::from_value(&json!("50%")), Some(Dimension::Percent(50.0)));
        assert_eq!(Dimension::from_value(&json!("auto")), Some(Dimension::Auto));
        assert_eq!(Dimension::from_value(&Value::Null), Some(Dimension::Auto));
        assert_eq!(Dimension::from_value(&json!(true)), None);
        assert_eq!(Dimension::from_value(&json!("wide")), None);
    }

    #[test]
    fn test_view_at_index_sorts_by_index() {
        let mut adds = vec![ViewAtIndex::new(7, 3), ViewAtIndex::new(5, 0), ViewAtIndex::new(6, 1)];
        adds.sort();
        let indices: Vec<usize> = adds.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![0, 1, 3]);
    }

    #[test]
    fn test_dimensions_contains() {
        let d = Dimensions::new(10.0, 10.0, 20.0, 5.0);
        assert!(d.contains(10.0, 10.0));
        assert!(d.contains(29.9, 14.9));
        assert!(!d.contains(30.0, 12.0));
        assert!(!d.contains(9.0, 12.0));
    }

    #[test]
    fn test_enum_names() {
        assert_eq!(FlexDirection::from_name("row"), Some(FlexDirection::Row));
        assert_eq!(JustifyContent::from_name("space-evenly"), Some(JustifyContent::SpaceEvenly));
        assert_eq!(AlignSelf::from_name("auto"), Some(AlignSelf::Auto));
        assert_eq!(PositionType::from_name("absolute"), Some(PositionType::Absolute));
        assert_eq!(Overflow::from_name("sideways"), None);
    }
}
