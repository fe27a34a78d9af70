// # Notification Policy Trait
//
// Outbound side effect of a transition: the system interruption filter
// (do-not-disturb). Changing it requires an OS-granted policy-access
// permission.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Interruption filter states used by this system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionFilter {
    /// Do-not-disturb: no notification interrupts
    BlockAll,
    /// Normal: every notification may interrupt
    AllowAll,
}

impl fmt::Display for InterruptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockAll => f.write_str("block-all"),
            Self::AllowAll => f.write_str("allow-all"),
        }
    }
}

/// Trait for the platform notification policy
///
/// Calls are synchronous and cheap; the transition handler serializes them.
/// Setting the filter to its current state must be harmless.
pub trait NotificationPolicy: Send + Sync {
    /// Whether this process may change the interruption filter
    fn has_policy_access(&self) -> bool;

    /// Current filter, if the platform reports one
    fn current_filter(&self) -> Option<InterruptionFilter>;

    /// Apply a filter state
    fn set_interruption_filter(&self, filter: InterruptionFilter);
}
