//! Thread affinity checks for native mutation.

use std::thread::{self, ThreadId};

/// Answers whether the calling thread may touch native views.
pub trait ThreadAffinity: Send + Sync {
    fn is_current(&self) -> bool;
}

/// Accepts every thread. For tests and single-threaded hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyThread;

impl ThreadAffinity for AnyThread {
    fn is_current(&self) -> bool {
        true
    }
}

/// Bound to the thread that created it.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherThread {
    id: ThreadId,
}

impl DispatcherThread {
    /// Capture the calling thread as the UI thread.
    pub fn current() -> Self {
        Self { id: thread::current().id() }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }
}

impl ThreadAffinity for DispatcherThread {
    fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_thread() {
        let affinity = DispatcherThread::current();
        assert!(affinity.is_current());

        let other = thread::spawn(move || affinity.is_current()).join().unwrap();
        assert!(!other);
        assert!(AnyThread.is_current());
    }
}
