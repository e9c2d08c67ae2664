//! Taffy Bridge - Integration with Taffy layout engine
//!
//! Converts shadow node styles to Taffy styles, runs layout computation for
//! one root, and writes the resulting frames back onto the shadow nodes.
//!
//! The Taffy tree is rebuilt for every dirty root on every batch. Virtual
//! nodes never reach it. Virtual anchors and nodes with a measure function
//! become leaves sized by their measure callback.

use std::collections::HashMap;

use taffy::{
    AlignContent as TaffyAlignContent, AlignItems as TaffyAlignItems,
    AlignSelf as TaffyAlignSelf, AvailableSpace, Dimension as TaffyDimension,
    Display as TaffyDisplay, FlexDirection as TaffyFlexDirection, FlexWrap as TaffyFlexWrap,
    JustifyContent as TaffyJustifyContent, LengthPercentage, LengthPercentageAuto, NodeId,
    Overflow as TaffyOverflow, Position as TaffyPosition, Rect, Size, Style, TaffyTree,
};
use taffy::prelude::TaffyMaxContent;
use tracing::{trace, trace_span};

use crate::engine::{LayoutFrame, LayoutStyle, ShadowTree};
use crate::error::Result;
use crate::types::{
    AlignContent, AlignItems, AlignSelf, Dimension, Display, FlexDirection, FlexWrap,
    JustifyContent, Overflow, PositionType, Tag,
};

// =============================================================================
// DIMENSION CONVERSION
// =============================================================================

/// Convert our Dimension to Taffy's Dimension.
fn to_taffy_dimension(dim: Dimension) -> TaffyDimension {
    match dim {
        Dimension::Auto => TaffyDimension::Auto,
        Dimension::Points(n) => TaffyDimension::Length(n),
        Dimension::Percent(p) => TaffyDimension::Percent(p / 100.0),
    }
}

/// Convert our Dimension to Taffy's LengthPercentageAuto.
fn to_taffy_lpa(dim: Dimension) -> LengthPercentageAuto {
    match dim {
        Dimension::Auto => LengthPercentageAuto::Auto,
        Dimension::Points(n) => LengthPercentageAuto::Length(n),
        Dimension::Percent(p) => LengthPercentageAuto::Percent(p / 100.0),
    }
}

/// Convert our Dimension to Taffy's LengthPercentage (auto collapses to 0).
fn to_taffy_lp(dim: Dimension) -> LengthPercentage {
    match dim {
        Dimension::Auto => LengthPercentage::Length(0.0),
        Dimension::Points(n) => LengthPercentage::Length(n),
        Dimension::Percent(p) => LengthPercentage::Percent(p / 100.0),
    }
}

// =============================================================================
// ENUM CONVERSIONS
// =============================================================================

fn to_taffy_flex_direction(dir: FlexDirection) -> TaffyFlexDirection {
    match dir {
        FlexDirection::Column => TaffyFlexDirection::Column,
        FlexDirection::Row => TaffyFlexDirection::Row,
        FlexDirection::ColumnReverse => TaffyFlexDirection::ColumnReverse,
        FlexDirection::RowReverse => TaffyFlexDirection::RowReverse,
    }
}

fn to_taffy_flex_wrap(wrap: FlexWrap) -> TaffyFlexWrap {
    match wrap {
        FlexWrap::NoWrap => TaffyFlexWrap::NoWrap,
        FlexWrap::Wrap => TaffyFlexWrap::Wrap,
        FlexWrap::WrapReverse => TaffyFlexWrap::WrapReverse,
    }
}

fn to_taffy_justify_content(justify: JustifyContent) -> Option<TaffyJustifyContent> {
    Some(match justify {
        JustifyContent::FlexStart => TaffyJustifyContent::FlexStart,
        JustifyContent::Center => TaffyJustifyContent::Center,
        JustifyContent::FlexEnd => TaffyJustifyContent::FlexEnd,
        JustifyContent::SpaceBetween => TaffyJustifyContent::SpaceBetween,
        JustifyContent::SpaceAround => TaffyJustifyContent::SpaceAround,
        JustifyContent::SpaceEvenly => TaffyJustifyContent::SpaceEvenly,
    })
}

fn to_taffy_align_items(align: AlignItems) -> Option<TaffyAlignItems> {
    Some(match align {
        AlignItems::Stretch => TaffyAlignItems::Stretch,
        AlignItems::FlexStart => TaffyAlignItems::FlexStart,
        AlignItems::Center => TaffyAlignItems::Center,
        AlignItems::FlexEnd => TaffyAlignItems::FlexEnd,
        AlignItems::Baseline => TaffyAlignItems::Baseline,
    })
}

fn to_taffy_align_content(align: AlignContent) -> Option<TaffyAlignContent> {
    Some(match align {
        AlignContent::Stretch => TaffyAlignContent::Stretch,
        AlignContent::FlexStart => TaffyAlignContent::FlexStart,
        AlignContent::Center => TaffyAlignContent::Center,
        AlignContent::FlexEnd => TaffyAlignContent::FlexEnd,
        AlignContent::SpaceBetween => TaffyAlignContent::SpaceBetween,
        AlignContent::SpaceAround => TaffyAlignContent::SpaceAround,
    })
}

fn to_taffy_align_self(align: AlignSelf) -> Option<TaffyAlignSelf> {
    match align {
        AlignSelf::Auto => None, // inherit from parent
        AlignSelf::Stretch => Some(TaffyAlignSelf::Stretch),
        AlignSelf::FlexStart => Some(TaffyAlignSelf::FlexStart),
        AlignSelf::Center => Some(TaffyAlignSelf::Center),
        AlignSelf::FlexEnd => Some(TaffyAlignSelf::FlexEnd),
        AlignSelf::Baseline => Some(TaffyAlignSelf::Baseline),
    }
}

fn to_taffy_overflow(overflow: Overflow) -> TaffyOverflow {
    match overflow {
        Overflow::Visible => TaffyOverflow::Visible,
        Overflow::Hidden => TaffyOverflow::Clip,
        Overflow::Scroll => TaffyOverflow::Scroll,
    }
}

fn to_taffy_position(position: PositionType) -> TaffyPosition {
    match position {
        PositionType::Relative => TaffyPosition::Relative,
        PositionType::Absolute => TaffyPosition::Absolute,
    }
}

fn to_taffy_display(display: Display) -> TaffyDisplay {
    match display {
        Display::Flex => TaffyDisplay::Flex,
        Display::None => TaffyDisplay::None,
    }
}

// =============================================================================
// STYLE BUILDING
// =============================================================================

/// Build a Taffy Style from a shadow node's layout style.
fn build_style(s: &LayoutStyle) -> Style {
    Style {
        display: to_taffy_display(s.display),
        position: to_taffy_position(s.position_type),

        // Flex container properties
        flex_direction: to_taffy_flex_direction(s.flex_direction),
        flex_wrap: to_taffy_flex_wrap(s.flex_wrap),
        justify_content: to_taffy_justify_content(s.justify_content),
        align_items: to_taffy_align_items(s.align_items),
        align_content: to_taffy_align_content(s.align_content),

        // Flex item properties
        flex_grow: s.flex_grow,
        flex_shrink: s.flex_shrink,
        flex_basis: to_taffy_dimension(s.flex_basis),
        align_self: to_taffy_align_self(s.align_self),
        aspect_ratio: s.aspect_ratio,

        // Dimensions
        size: Size {
            width: to_taffy_dimension(s.width),
            height: to_taffy_dimension(s.height),
        },
        min_size: Size {
            width: to_taffy_dimension(s.min_width),
            height: to_taffy_dimension(s.min_height),
        },
        max_size: Size {
            width: to_taffy_dimension(s.max_width),
            height: to_taffy_dimension(s.max_height),
        },

        // Offsets for absolute/relative positioning
        inset: Rect {
            top: to_taffy_lpa(s.position.top),
            right: to_taffy_lpa(s.position.right),
            bottom: to_taffy_lpa(s.position.bottom),
            left: to_taffy_lpa(s.position.left),
        },

        margin: Rect {
            top: to_taffy_lpa(s.margin.top),
            right: to_taffy_lpa(s.margin.right),
            bottom: to_taffy_lpa(s.margin.bottom),
            left: to_taffy_lpa(s.margin.left),
        },

        // Padding (uses LengthPercentage, not LengthPercentageAuto)
        padding: Rect {
            top: to_taffy_lp(s.padding.top),
            right: to_taffy_lp(s.padding.right),
            bottom: to_taffy_lp(s.padding.bottom),
            left: to_taffy_lp(s.padding.left),
        },

        border: Rect {
            top: LengthPercentage::Length(s.border.top),
            right: LengthPercentage::Length(s.border.right),
            bottom: LengthPercentage::Length(s.border.bottom),
            left: LengthPercentage::Length(s.border.left),
        },

        overflow: taffy::Point {
            x: to_taffy_overflow(s.overflow),
            y: to_taffy_overflow(s.overflow),
        },

        ..Default::default()
    }
}

// =============================================================================
// TREE BUILDING
// =============================================================================

/// Mirror the non-virtual part of the shadow subtree under `tag` into Taffy.
fn build_subtree(
    shadow: &ShadowTree,
    taffy: &mut TaffyTree<Tag>,
    tag: Tag,
    nodes: &mut HashMap<Tag, NodeId>,
) -> Result<Option<NodeId>> {
    let node = shadow.node(tag, "calculate_layout")?;
    if node.is_virtual() {
        return Ok(None);
    }

    let style = build_style(&node.style);

    // Anchors and content-sized leaves are measured, their children are not
    // laid out by the shadow tree.
    if node.is_virtual_anchor() || node.has_measure_function() {
        let id = taffy.new_leaf_with_context(style, tag)?;
        nodes.insert(tag, id);
        return Ok(Some(id));
    }

    let id = taffy.new_leaf(style)?;
    nodes.insert(tag, id);
    for &child in node.children() {
        if let Some(child_id) = build_subtree(shadow, taffy, child, nodes)? {
            taffy.add_child(id, child_id)?;
        }
    }
    Ok(Some(id))
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Compute layout for one root and store each node's frame.
///
/// # Arguments
///
/// * `shadow` - The shadow tree
/// * `root_tag` - Root to lay out; its own style carries the root size
pub fn calculate_layout(shadow: &mut ShadowTree, root_tag: Tag) -> Result<()> {
    let _span = trace_span!("calculate_layout", root_tag).entered();

    let mut taffy: TaffyTree<Tag> = TaffyTree::new();
    let mut nodes: HashMap<Tag, NodeId> = HashMap::new();

    let Some(root_id) = build_subtree(shadow, &mut taffy, root_tag, &mut nodes)? else {
        return Ok(());
    };

    {
        let shadow_ref: &ShadowTree = shadow;
        let mut measure_fn = |known_dimensions: Size<Option<f32>>,
                              available_space: Size<AvailableSpace>,
                              _node_id: NodeId,
                              context: Option<&mut Tag>,
                              _style: &Style| {
            let measured = context
                .and_then(|tag| shadow_ref.get(*tag))
                .and_then(|node| {
                    node.measure_function()
                        .map(|measure| measure(node, known_dimensions, available_space))
                })
                .unwrap_or(Size::ZERO);
            Size {
                width: known_dimensions.width.unwrap_or(measured.width),
                height: known_dimensions.height.unwrap_or(measured.height),
            }
        };

        taffy.compute_layout_with_measure(root_id, Size::MAX_CONTENT, &mut measure_fn)?;
    }

    // Extract results
    for (&tag, &node_id) in &nodes {
        let layout = taffy.layout(node_id)?;
        let frame = LayoutFrame {
            x: layout.location.x,
            y: layout.location.y,
            width: layout.size.width,
            height: layout.size.height,
        };
        if let Some(node) = shadow.get_mut(tag) {
            node.set_computed_layout(frame);
        }
    }

    trace!(root_tag, nodes = nodes.len(), "layout computed");
    Ok(())
}
