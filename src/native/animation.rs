//! Layout animation bookkeeping.
//!
//! The animation engine itself lives outside this crate. What lives here is
//! the per-batch configuration and the deferred exit queue: a view whose
//! deletion animates stays attached until the engine reports completion
//! through its [`AnimationToken`].

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::types::Tag;

/// Animation of one phase (create, update or delete).
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSpec {
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub delay: Option<f64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
}

/// Configuration sent by `configureNextLayoutAnimation`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutAnimationConfig {
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub create: Option<AnimationSpec>,
    #[serde(default)]
    pub update: Option<AnimationSpec>,
    #[serde(default)]
    pub delete: Option<AnimationSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnimationToken(u64);

/// A deletion waiting for its exit animation to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingExit {
    pub token: AnimationToken,
    pub parent: Tag,
    pub tag: Tag,
}

#[derive(Debug, Default)]
pub struct LayoutAnimationController {
    enabled: bool,
    config: Option<LayoutAnimationConfig>,
    next_token: u64,
    pending: BTreeMap<AnimationToken, PendingExit>,
    exiting: HashSet<Tag>,
}

impl LayoutAnimationController {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, ..Default::default() }
    }

    /// Configure animations for the current batch.
    pub fn initialize_from_config(&mut self, config: &Value) -> Result<()> {
        self.config = Some(LayoutAnimationConfig::deserialize(config)?);
        Ok(())
    }

    /// Forget the batch configuration. Pending exits stay pending.
    pub fn reset(&mut self) {
        self.config = None;
    }

    pub fn config(&self) -> Option<&LayoutAnimationConfig> {
        self.config.as_ref()
    }

    /// Whether a deletion in this batch should play an exit animation.
    pub fn should_animate_exit(&self) -> bool {
        self.enabled && self.config.as_ref().is_some_and(|c| c.delete.is_some())
    }

    pub fn schedule_exit(&mut self, parent: Tag, tag: Tag) -> PendingExit {
        let token = AnimationToken(self.next_token);
        self.next_token += 1;
        let exit = PendingExit { token, parent, tag };
        self.pending.insert(token, exit);
        self.exiting.insert(tag);
        exit
    }

    /// Take the pending exit for a finished animation.
    pub fn complete(&mut self, token: AnimationToken) -> Option<PendingExit> {
        let exit = self.pending.remove(&token)?;
        self.exiting.remove(&exit.tag);
        Some(exit)
    }

    /// Forget a view that was dropped before its animation finished.
    pub fn forget(&mut self, tag: Tag) {
        if self.exiting.remove(&tag) {
            self.pending.retain(|_, exit| exit.tag != tag);
        }
    }

    /// Check whether a view is still attached only to play its exit.
    pub fn is_exiting(&self, tag: Tag) -> bool {
        self.exiting.contains(&tag)
    }

    pub fn pending(&self) -> Vec<PendingExit> {
        self.pending.values().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_gates_exit() {
        let mut controller = LayoutAnimationController::new(true);
        assert!(!controller.should_animate_exit());

        controller
            .initialize_from_config(&json!({ "duration": 300, "delete": { "type": "linear", "property": "opacity" } }))
            .unwrap();
        assert!(controller.should_animate_exit());
        assert_eq!(controller.config().unwrap().duration, 300.0);

        controller.reset();
        assert!(!controller.should_animate_exit());
    }

    #[test]
    fn test_disabled_never_animates() {
        let mut controller = LayoutAnimationController::new(false);
        controller.initialize_from_config(&json!({ "delete": {} })).unwrap();
        assert!(!controller.should_animate_exit());
    }

    #[test]
    fn test_bad_config() {
        let mut controller = LayoutAnimationController::new(true);
        assert!(controller.initialize_from_config(&json!({ "duration": "slow" })).is_err());
    }

    #[test]
    fn test_exit_tokens() {
        let mut controller = LayoutAnimationController::new(true);
        let a = controller.schedule_exit(1, 10);
        let b = controller.schedule_exit(1, 11);
        assert_ne!(a.token, b.token);
        assert!(controller.is_exiting(10));

        assert_eq!(controller.complete(a.token), Some(a));
        assert!(!controller.is_exiting(10));
        assert_eq!(controller.complete(a.token), None);

        controller.forget(11);
        assert!(controller.pending().is_empty());
    }
}
