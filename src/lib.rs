//! # uimanager
//!
//! Native-side UI reconciliation engine.
//!
//! A scripting runtime sends batched `create / update / reparent / delete`
//! commands. The engine keeps two retained trees in step:
//!
//! - the **shadow tree**, used only for flexbox layout, and
//! - the **native view hierarchy**, real widgets owned by the UI thread.
//!
//! ## Architecture
//!
//! Elements are identified by integer tags shared by both trees. Shadow nodes
//! flagged virtual never get a widget, so an optimizer rewrites every shadow
//! child-list change into native indices before it is queued.
//!
//! ```text
//! command thread:  UiImplementation → ShadowTree → taffy → Optimizer → OperationQueue
//! UI thread:       frame callback → committed batches → NativeViewHierarchyManager
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Tags, props, frames and layout enums
//! - [`engine`] - Shadow nodes, the property setter table and the shadow tree
//! - [`layout`] - Taffy bridge computing frames for a dirty root
//! - [`native`] - View managers, tag registry and the hierarchy manager
//! - [`pipeline`] - Choreographer, operation queue, optimizer and orchestrator

pub mod config;
pub mod engine;
pub mod error;
pub mod layout;
pub mod native;
pub mod pipeline;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use config::UiManagerConfig;
pub use error::{Result, UiError};

pub use engine::{LayoutStyle, MeasureFunc, NodeFlags, ShadowNode, ShadowTree};

pub use layout::calculate_layout;

pub use native::{
    AnyThread, DispatcherThread, NativeView, NativeViewHierarchyManager, Panel, PanelViewManager,
    ThreadAffinity, ViewManager, ViewManagerRegistry, ViewParentManager,
};

pub use pipeline::{
    Choreographer, LayoutEvent, NativeViewHierarchyOptimizer, OperationQueue, UiImplementation,
    UiOperation,
};
