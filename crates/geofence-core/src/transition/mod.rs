//! Transition handling
//!
//! Maps each provider transition event to an interruption filter change:
//!
//! | Event                  | Effect                      |
//! |------------------------|-----------------------------|
//! | error set              | log only                    |
//! | `ENTER`                | filter → block-all (DND on) |
//! | `EXIT`                 | filter → allow-all (DND off)|
//! | `UNKNOWN`              | warning only                |
//! | no policy access       | warning only                |
//!
//! No state is kept between events. Duplicate deliveries are harmless: a
//! filter that is already in the target state is left alone. Side effects
//! are applied one at a time, so the latest delivered event wins.

use std::fmt;
use std::pin::Pin;

use tokio::sync::{Mutex, oneshot};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::traits::{
    InterruptionFilter, NotificationPolicy, TransitionError, TransitionEvent, TransitionKind,
};

/// Why an event produced no side effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoredReason {
    /// Diagnostic-only event from the provider
    ProviderError(TransitionError),
    /// Transition code other than ENTER/EXIT
    UnknownTransition(i32),
    /// The process may not change the interruption filter
    PermissionDenied,
}

impl fmt::Display for IgnoredReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderError(e) => write!(f, "provider error: {}", e),
            Self::UnknownTransition(code) => write!(f, "unhandled transition {}", code),
            Self::PermissionDenied => f.write_str("notification policy access not granted"),
        }
    }
}

/// Result of handling one transition event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The filter was changed to this state
    Applied(InterruptionFilter),
    /// The filter was already in this state
    Unchanged(InterruptionFilter),
    /// No side effect
    Ignored(IgnoredReason),
}

/// Applies transition events to the notification policy
pub struct TransitionHandler {
    policy: Box<dyn NotificationPolicy>,
    /// Serializes read-compare-set on the filter
    apply_lock: Mutex<()>,
}

impl TransitionHandler {
    pub fn new(policy: Box<dyn NotificationPolicy>) -> Self {
        Self {
            policy,
            apply_lock: Mutex::new(()),
        }
    }

    /// Handle one transition event
    ///
    /// Never fails; every non-actionable case is logged and reported as
    /// [`TransitionOutcome::Ignored`].
    pub async fn handle(&self, event: &TransitionEvent) -> TransitionOutcome {
        if let Some(err) = &event.error {
            error!("Geofencing error: {}", err);
            return TransitionOutcome::Ignored(IgnoredReason::ProviderError(err.clone()));
        }

        let target = match event.kind {
            TransitionKind::Enter => InterruptionFilter::BlockAll,
            TransitionKind::Exit => InterruptionFilter::AllowAll,
            TransitionKind::Unknown(code) => {
                warn!("Unhandled geofence transition: {}", code);
                return TransitionOutcome::Ignored(IgnoredReason::UnknownTransition(code));
            }
        };

        let _guard = self.apply_lock.lock().await;

        if !self.policy.has_policy_access() {
            warn!("Notification policy access not granted; skipping DND update.");
            return TransitionOutcome::Ignored(IgnoredReason::PermissionDenied);
        }

        match event.kind {
            TransitionKind::Enter => info!("Entered geofence: {:?}", event.region_ids),
            _ => info!("Exited geofence: {:?}", event.region_ids),
        }

        if self.policy.current_filter() == Some(target) {
            debug!("Interruption filter already {}; nothing to do", target);
            return TransitionOutcome::Unchanged(target);
        }

        self.policy.set_interruption_filter(target);
        debug!("Interruption filter set to {}", target);
        TransitionOutcome::Applied(target)
    }

    /// Handle transitions until the stream ends or SIGINT is received
    ///
    /// # Returns
    ///
    /// The number of events handled
    pub async fn run(
        &self,
        transitions: Pin<Box<dyn Stream<Item = TransitionEvent> + Send + 'static>>,
    ) -> usize {
        self.run_internal(transitions, None).await
    }

    /// Handle transitions until the stream ends or `shutdown_rx` fires
    ///
    /// Dropping the sender also counts as a shutdown signal.
    pub async fn run_with_shutdown(
        &self,
        transitions: Pin<Box<dyn Stream<Item = TransitionEvent> + Send + 'static>>,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> usize {
        self.run_internal(transitions, Some(shutdown_rx)).await
    }

    async fn run_internal(
        &self,
        mut transitions: Pin<Box<dyn Stream<Item = TransitionEvent> + Send + 'static>>,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> usize {
        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let mut handled = 0;
        loop {
            tokio::select! {
                next = transitions.next() => match next {
                    Some(event) => {
                        let outcome = self.handle(&event).await;
                        debug!("Transition {} for {:?}: {:?}", event.kind, event.region_ids, outcome);
                        handled += 1;
                    }
                    None => {
                        info!("Transition stream ended");
                        break;
                    }
                },

                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping transition handler");
                    break;
                }
            }
        }

        handled
    }
}
