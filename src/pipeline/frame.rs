//! Frame choreographer - Tracks which producers want the next frame callback.
//!
//! The host loop asks [`Choreographer::has_pending_frame`] once per vsync and,
//! if true, runs the operation queue's frame dispatch on the UI thread.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use tracing::trace;

/// Key for committed batches.
pub const BATCHED_CALLBACK_KEY: &str = "UIViewOperationQueue";

/// Key for the non-batched view creation lane.
pub const NON_BATCHED_CALLBACK_KEY: &str = "UIViewOperationQueue_NonBatched";

#[derive(Debug)]
struct ChoreographerState {
    active: BTreeSet<&'static str>,
    subscribed: bool,
}

#[derive(Debug)]
pub struct Choreographer {
    state: Mutex<ChoreographerState>,
}

impl Default for Choreographer {
    fn default() -> Self {
        Self::new()
    }
}

impl Choreographer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChoreographerState { active: BTreeSet::new(), subscribed: true }),
        }
    }

    pub fn activate(&self, key: &'static str) {
        if self.state.lock().active.insert(key) {
            trace!(key, "frame callback activated");
        }
    }

    pub fn deactivate(&self, key: &'static str) {
        if self.state.lock().active.remove(key) {
            trace!(key, "frame callback deactivated");
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.state.lock().active.contains(key)
    }

    pub fn active_keys(&self) -> Vec<&'static str> {
        self.state.lock().active.iter().copied().collect()
    }

    pub fn subscribe(&self) {
        self.state.lock().subscribed = true;
    }

    pub fn unsubscribe(&self) {
        self.state.lock().subscribed = false;
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().subscribed
    }

    /// Whether the next frame should run the queue.
    pub fn has_pending_frame(&self) -> bool {
        let state = self.state.lock();
        state.subscribed && !state.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation() {
        let choreographer = Choreographer::new();
        assert!(!choreographer.has_pending_frame());

        choreographer.activate(BATCHED_CALLBACK_KEY);
        choreographer.activate(BATCHED_CALLBACK_KEY);
        assert_eq!(choreographer.active_keys(), vec![BATCHED_CALLBACK_KEY]);
        assert!(choreographer.has_pending_frame());

        choreographer.deactivate(BATCHED_CALLBACK_KEY);
        assert!(!choreographer.has_pending_frame());
    }

    #[test]
    fn test_unsubscribed_has_no_frame() {
        let choreographer = Choreographer::new();
        choreographer.activate(NON_BATCHED_CALLBACK_KEY);
        choreographer.unsubscribe();
        assert!(!choreographer.has_pending_frame());
        assert!(choreographer.is_active(NON_BATCHED_CALLBACK_KEY));
        choreographer.subscribe();
        assert!(choreographer.has_pending_frame());
    }
}
