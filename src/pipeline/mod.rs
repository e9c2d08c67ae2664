//! Pipeline
//!
//! This module connects the command thread to the UI thread.
//!
//! # Pipeline Architecture
//!
//! ```text
//! commands → UiImplementation → ShadowTree ─► calculate_layout
//!                  │
//!                  ▼
//!        NativeViewHierarchyOptimizer
//!                  │  (native indices, virtual nodes elided)
//!                  ▼
//!            OperationQueue ──frame──► NativeViewHierarchyManager
//! ```
//!
//! ## Data Flow
//!
//! 1. **UiImplementation** - Mutates the shadow tree, lays out dirty roots
//! 2. **NativeViewHierarchyOptimizer** - Rewrites shadow changes into native ones
//! 3. **OperationQueue** - Buffers native operations until the next frame
//! 4. **Choreographer** - Tells the host loop when a frame has work
//!
//! ## Key Design Principles
//!
//! - **One boundary**: only queued closures touch the native hierarchy
//! - **Transactional batches**: a batch commits as one closure, batches run FIFO

pub mod frame;
pub mod operation_queue;
pub mod optimizer;
pub mod ui_implementation;

// Re-exports
pub use frame::{BATCHED_CALLBACK_KEY, Choreographer, NON_BATCHED_CALLBACK_KEY};
pub use operation_queue::{ExceptionHandler, MeasureCallback, OperationQueue, TouchTargetCallback, UiOperation};
pub use optimizer::NativeViewHierarchyOptimizer;
pub use ui_implementation::{LayoutEvent, LayoutEventListener, UiImplementation};
