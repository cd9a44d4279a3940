//! Cooperative cancellation for running searches

use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle shared between the session that issued a search and the thread
/// running it.
///
/// Cancelling sets a flag the reader checks between lines and kills the
/// attached process, so a reader blocked on output wakes up with EOF.
/// `cancel` never waits for the process to exit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    child: Mutex<Option<Child>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        if let Some(child) = self.child().as_mut() {
            // Already exited is fine; the reader sees EOF either way
            let _ = child.kill();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Hand the running process to the token. A token cancelled before the
    /// process existed kills it right away.
    pub(crate) fn attach(&self, child: Child) {
        let mut slot = self.child();
        *slot = Some(child);
        if self.is_cancelled()
            && let Some(child) = slot.as_mut()
        {
            let _ = child.kill();
        }
    }

    /// Take the process back, e.g. to wait on it
    pub(crate) fn detach(&self) -> Option<Child> {
        self.child().take()
    }

    fn child(&self) -> MutexGuard<'_, Option<Child>> {
        self.inner
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
