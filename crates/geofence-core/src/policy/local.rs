//! In-process notification policy
//!
//! Holds the interruption filter in memory behind a policy-access flag.
//! Clones share state, so a test or host can keep a handle after giving one
//! to the [`TransitionHandler`](crate::transition::TransitionHandler).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::traits::{InterruptionFilter, NotificationPolicy};

#[derive(Debug, Clone)]
pub struct LocalNotificationPolicy {
    access_granted: Arc<AtomicBool>,
    filter: Arc<RwLock<InterruptionFilter>>,
    set_count: Arc<AtomicUsize>,
}

impl LocalNotificationPolicy {
    /// Create a policy starting at `AllowAll`
    pub fn new(access_granted: bool) -> Self {
        Self {
            access_granted: Arc::new(AtomicBool::new(access_granted)),
            filter: Arc::new(RwLock::new(InterruptionFilter::AllowAll)),
            set_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Grant or revoke policy access
    pub fn set_access_granted(&self, granted: bool) {
        self.access_granted.store(granted, Ordering::SeqCst);
    }

    /// Current filter
    pub fn filter(&self) -> InterruptionFilter {
        match self.filter.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Number of times the filter was set
    pub fn set_count(&self) -> usize {
        self.set_count.load(Ordering::SeqCst)
    }
}

impl NotificationPolicy for LocalNotificationPolicy {
    fn has_policy_access(&self) -> bool {
        self.access_granted.load(Ordering::SeqCst)
    }

    fn current_filter(&self) -> Option<InterruptionFilter> {
        Some(self.filter())
    }

    fn set_interruption_filter(&self, filter: InterruptionFilter) {
        match self.filter.write() {
            Ok(mut guard) => *guard = filter,
            Err(poisoned) => *poisoned.into_inner() = filter,
        }
        self.set_count.fetch_add(1, Ordering::SeqCst);
    }
}
