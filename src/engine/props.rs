//! Layout property setter table.
//!
//! Maps every layout-affecting property name to a typed setter. The table is
//! built once on first use. Names missing from it are not layout properties.
//! Values that fail to parse reset the property to its default, the same as
//! sending `null`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::types::{
    AlignContent, AlignItems, AlignSelf, Dimension, Display, FlexDirection, FlexWrap,
    JustifyContent, Overflow, PositionType,
};

use super::shadow_node::{Edges, LayoutStyle};

/// Applies one property value to a layout style.
pub type PropSetter = fn(&mut LayoutStyle, &Value);

static SETTERS: Lazy<HashMap<&'static str, PropSetter>> = Lazy::new(build_setters);

/// Look up the setter for a property name.
pub fn setter_for(name: &str) -> Option<PropSetter> {
    SETTERS.get(name).copied()
}

/// Check whether a property affects layout.
pub fn is_layout_prop(name: &str) -> bool {
    SETTERS.contains_key(name)
}

// =============================================================================
// Value parsing
// =============================================================================

fn dimension(value: &Value) -> Dimension {
    Dimension::from_value(value).unwrap_or_default()
}

fn spacing(value: &Value) -> Dimension {
    match Dimension::from_value(value) {
        Some(Dimension::Auto) | None => Dimension::Points(0.0),
        Some(d) => d,
    }
}

fn number(value: &Value, default: f32) -> f32 {
    value.as_f64().map(|v| v as f32).unwrap_or(default)
}

fn name(value: &Value) -> &str {
    value.as_str().unwrap_or("")
}

// =============================================================================
// Table
// =============================================================================

fn build_setters() -> HashMap<&'static str, PropSetter> {
    let mut t: HashMap<&'static str, PropSetter> = HashMap::new();

    // ===== Dimensions =====
    t.insert("width", |s, v| s.width = dimension(v));
    t.insert("height", |s, v| s.height = dimension(v));
    t.insert("minWidth", |s, v| s.min_width = dimension(v));
    t.insert("minHeight", |s, v| s.min_height = dimension(v));
    t.insert("maxWidth", |s, v| s.max_width = dimension(v));
    t.insert("maxHeight", |s, v| s.max_height = dimension(v));
    t.insert("aspectRatio", |s, v| s.aspect_ratio = v.as_f64().map(|r| r as f32));

    // ===== Container =====
    t.insert("display", |s, v| s.display = Display::from_name(name(v)).unwrap_or_default());
    t.insert("flexDirection", |s, v| {
        s.flex_direction = FlexDirection::from_name(name(v)).unwrap_or_default()
    });
    t.insert("flexWrap", |s, v| s.flex_wrap = FlexWrap::from_name(name(v)).unwrap_or_default());
    t.insert("justifyContent", |s, v| {
        s.justify_content = JustifyContent::from_name(name(v)).unwrap_or_default()
    });
    t.insert("alignItems", |s, v| s.align_items = AlignItems::from_name(name(v)).unwrap_or_default());
    t.insert("alignContent", |s, v| {
        s.align_content = AlignContent::from_name(name(v)).unwrap_or_default()
    });
    t.insert("overflow", |s, v| s.overflow = Overflow::from_name(name(v)).unwrap_or_default());

    // ===== Item =====
    t.insert("flex", |s, v| {
        let flex = number(v, 0.0);
        if flex > 0.0 {
            s.flex_grow = flex;
            s.flex_shrink = 0.0;
            s.flex_basis = Dimension::Points(0.0);
        } else if flex < 0.0 {
            s.flex_grow = 0.0;
            s.flex_shrink = -flex;
            s.flex_basis = Dimension::Auto;
        } else {
            s.flex_grow = 0.0;
            s.flex_shrink = 0.0;
            s.flex_basis = Dimension::Auto;
        }
    });
    t.insert("flexGrow", |s, v| s.flex_grow = number(v, 0.0));
    t.insert("flexShrink", |s, v| s.flex_shrink = number(v, 0.0));
    t.insert("flexBasis", |s, v| s.flex_basis = dimension(v));
    t.insert("alignSelf", |s, v| s.align_self = AlignSelf::from_name(name(v)).unwrap_or_default());
    t.insert("position", |s, v| {
        s.position_type = PositionType::from_name(name(v)).unwrap_or_default()
    });

    // ===== Position offsets =====
    t.insert("top", |s, v| s.position.top = dimension(v));
    t.insert("right", |s, v| s.position.right = dimension(v));
    t.insert("bottom", |s, v| s.position.bottom = dimension(v));
    t.insert("left", |s, v| s.position.left = dimension(v));

    // ===== Margin =====
    t.insert("margin", |s, v| s.margin = Edges::all(spacing(v)));
    t.insert("marginVertical", |s, v| {
        let d = spacing(v);
        s.margin.top = d;
        s.margin.bottom = d;
    });
    t.insert("marginHorizontal", |s, v| {
        let d = spacing(v);
        s.margin.left = d;
        s.margin.right = d;
    });
    t.insert("marginTop", |s, v| s.margin.top = spacing(v));
    t.insert("marginRight", |s, v| s.margin.right = spacing(v));
    t.insert("marginBottom", |s, v| s.margin.bottom = spacing(v));
    t.insert("marginLeft", |s, v| s.margin.left = spacing(v));

    // ===== Padding =====
    t.insert("padding", |s, v| s.padding = Edges::all(spacing(v)));
    t.insert("paddingVertical", |s, v| {
        let d = spacing(v);
        s.padding.top = d;
        s.padding.bottom = d;
    });
    t.insert("paddingHorizontal", |s, v| {
        let d = spacing(v);
        s.padding.left = d;
        s.padding.right = d;
    });
    t.insert("paddingTop", |s, v| s.padding.top = spacing(v));
    t.insert("paddingRight", |s, v| s.padding.right = spacing(v));
    t.insert("paddingBottom", |s, v| s.padding.bottom = spacing(v));
    t.insert("paddingLeft", |s, v| s.padding.left = spacing(v));

    // ===== Border =====
    t.insert("borderWidth", |s, v| s.border = Edges::all(number(v, 0.0)));
    t.insert("borderTopWidth", |s, v| s.border.top = number(v, 0.0));
    t.insert("borderRightWidth", |s, v| s.border.right = number(v, 0.0));
    t.insert("borderBottomWidth", |s, v| s.border.bottom = number(v, 0.0));
    t.insert("borderLeftWidth", |s, v| s.border.left = number(v, 0.0));

    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(name: &str, value: Value) -> LayoutStyle {
        let mut style = LayoutStyle::default();
        if let Some(setter) = setter_for(name) {
            setter(&mut style, &value);
        }
        style
    }

    #[test]
    fn test_layout_prop_names() {
        assert!(is_layout_prop("width"));
        assert!(is_layout_prop("marginHorizontal"));
        assert!(is_layout_prop("borderWidth"));
        assert!(!is_layout_prop("backgroundColor"));
        assert!(!is_layout_prop("onLayout"));
    }

    #[test]
    fn test_shorthands() {
        let style = apply("paddingHorizontal", json!(4));
        assert_eq!(style.padding.left, Dimension::Points(4.0));
        assert_eq!(style.padding.right, Dimension::Points(4.0));
        assert_eq!(style.padding.top, Dimension::Points(0.0));

        let style = apply("borderWidth", json!(2));
        assert_eq!(style.border, Edges::all(2.0));
    }

    #[test]
    fn test_flex_shorthand() {
        let style = apply("flex", json!(1));
        assert_eq!(style.flex_grow, 1.0);
        assert_eq!(style.flex_basis, Dimension::Points(0.0));

        let style = apply("flex", json!(-1));
        assert_eq!(style.flex_shrink, 1.0);
        assert_eq!(style.flex_grow, 0.0);
    }

    #[test]
    fn test_null_resets() {
        let mut style = apply("width", json!("50%"));
        assert_eq!(style.width, Dimension::Percent(50.0));
        if let Some(setter) = setter_for("width") {
            setter(&mut style, &Value::Null);
        }
        assert_eq!(style.width, Dimension::Auto);

        let style = apply("flexDirection", json!("row"));
        assert_eq!(style.flex_direction, FlexDirection::Row);
        let style = apply("flexDirection", json!(12));
        assert_eq!(style.flex_direction, FlexDirection::Column);
    }
}
