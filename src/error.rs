//! UI manager error types.
//!
//! Everything except the measurement family is a protocol error: the producer
//! sent a command that cannot apply to the current trees, and the batch stops.

use thiserror::Error;

use crate::types::Tag;

#[derive(Debug, Error)]
pub enum UiError {
    #[error("{operation}: no view or node registered for tag {tag}")]
    TagNotFound { tag: Tag, operation: &'static str },

    #[error("no view manager registered for class '{0}'")]
    UnknownViewManager(String),

    #[error("tag {0} is already registered")]
    DuplicateTag(Tag),

    #[error("view with tag {0} is not registered as a root view")]
    NotARoot(Tag),

    #[error("{operation}: manager of tag {tag} cannot have children")]
    NotAParent { tag: Tag, operation: &'static str },

    #[error("manage_children: removal index {index} of tag {tag} is out of range (child count {count})")]
    RemoveIndexOutOfRange { tag: Tag, index: usize, count: usize },

    #[error("manage_children: removal index {index} of tag {tag} repeats or is not below the previous index {previous}")]
    RemoveIndexOrder { tag: Tag, index: usize, previous: usize },

    #[error("{operation}: index {index} is out of bounds for tag {tag} (child count {count})")]
    ChildIndexOutOfBounds {
        tag: Tag,
        index: usize,
        count: usize,
        operation: &'static str,
    },

    #[error("tag {child} already has parent {parent}")]
    AlreadyParented { child: Tag, parent: Tag },

    #[error("{operation}: tag {child} is listed more than once under tag {tag}")]
    DuplicateChild { tag: Tag, child: Tag, operation: &'static str },

    #[error("root tag {0} cannot become a child")]
    RootAsChild(Tag),

    #[error("tag {0} has no parent")]
    Detached(Tag),

    #[error("root view {0} cannot be replaced")]
    ReplaceRoot(Tag),

    #[error("tag {child} belongs to root {child_root}, cannot attach under root {parent_root}")]
    CrossRoot {
        child: Tag,
        child_root: Tag,
        parent_root: Tag,
    },

    #[error("{operation}: size mismatch for tag {tag} ({left} vs {right})")]
    SizeMismatch {
        tag: Tag,
        operation: &'static str,
        left: usize,
        right: usize,
    },

    #[error("{operation}: tag {tag} is no longer on screen")]
    NotOnScreen { tag: Tag, operation: &'static str },

    #[error("no touch target under ({x}, {y}) in tag {tag}")]
    NoTouchTarget { tag: Tag, x: f64, y: f64 },

    #[error("tag {ancestor} is not an ancestor of tag {tag}")]
    NotAnAncestor { tag: Tag, ancestor: Tag },

    #[error("tag {0} lays out its children itself, measure_layout is not supported below it")]
    CustomLayoutAncestor(Tag),

    #[error("layout engine error: {0}")]
    Layout(#[from] taffy::TaffyError),

    #[error("invalid layout animation config: {0}")]
    AnimationConfig(#[from] serde_json::Error),
}

impl UiError {
    /// Measurement failures are expected under normal use (views leave the
    /// screen between request and flush); they are reported to the caller's
    /// callback instead of aborting the flush.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotOnScreen { .. } | Self::NoTouchTarget { .. })
    }
}

pub type Result<T> = std::result::Result<T, UiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_family() {
        assert!(UiError::NotOnScreen { tag: 3, operation: "measure" }.is_recoverable());
        assert!(UiError::NoTouchTarget { tag: 3, x: 1.0, y: 2.0 }.is_recoverable());
        assert!(!UiError::NotARoot(99).is_recoverable());
        assert!(!UiError::UnknownViewManager("Nope".into()).is_recoverable());
    }

    #[test]
    fn test_messages_name_tag_and_operation() {
        let err = UiError::TagNotFound { tag: 42, operation: "update_props" };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("update_props"));
        assert!(UiError::NotARoot(99).to_string().contains("not registered as a root"));
    }
}
