//! Native side - View managers, the tag registry and the hierarchy manager.
//!
//! Everything in this module except the view manager registry is confined to
//! the UI thread. Cross-thread access goes through the operation queue.

mod affinity;
mod animation;
mod hierarchy;
mod panel;
mod tag_registry;
mod view_manager;

pub use affinity::*;
pub use animation::*;
pub use hierarchy::*;
pub use panel::*;
pub use tag_registry::*;
pub use view_manager::*;
