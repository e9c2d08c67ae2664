//! Shadow engine - Shadow nodes and the tree that owns them.
//!
//! The engine manages the layout-side data structures:
//! - ShadowNode: per-element layout style, flags and computed frame
//! - Props: the layout property setter table
//! - ShadowTree: node registry, root set and structural mutation
//!
//! # Architecture
//!
//! Nodes are NOT linked by references. They live in one tag-keyed map and
//! point at each other by tag:
//!
//! ```text
//! Tag 1: Root (parent=None, children=[2, 3])
//! Tag 2: View (parent=1,    children=[4])
//! Tag 4: Text (parent=2,    anchor, measured)
//! ```

mod props;
mod shadow_node;
mod shadow_tree;

pub use props::*;
pub use shadow_node::*;
pub use shadow_tree::*;
