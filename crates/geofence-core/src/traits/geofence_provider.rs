// # Geofence Provider Trait
//
// Defines the interface to the platform's geofencing service.
//
// ## Implementations
//
// - In-process mirror: `provider::LocalGeofenceProvider`
// - Platform backends (OS location services) live outside this crate
//
// ## Usage
//
// ```rust,ignore
// use geofence_core::traits::{GeofenceProvider, GeofenceRequest};
// use tokio_stream::StreamExt;
//
// let provider = /* GeofenceProvider implementation */;
//
// // Arm one region for ENTER/EXIT monitoring
// provider.register_batch(&GeofenceRequest::new(vec![region])).await?;
//
// // Consume boundary crossings
// let mut transitions = provider.transitions();
// while let Some(event) = transitions.next().await {
//     println!("transition: {:?}", event);
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::error::ProviderError;
use crate::traits::region_store::Region;

/// Platform code for an ENTER transition
pub const TRANSITION_ENTER: i32 = 1;

/// Platform code for an EXIT transition
pub const TRANSITION_EXIT: i32 = 2;

/// Transition types a region is monitored for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTypes {
    pub enter: bool,
    pub exit: bool,
}

impl TransitionTypes {
    /// Monitor both boundary crossings
    pub const ENTER_AND_EXIT: Self = Self {
        enter: true,
        exit: true,
    };
}

/// How long a registration stays armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiration {
    /// Armed until explicitly unregistered
    Never,
}

/// Transition reported immediately if the device is already inside a region
/// when it is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialTrigger {
    Enter,
}

/// A single registration call covering one or more regions
///
/// The provider reports success or failure once for the whole request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRequest {
    pub regions: Vec<Region>,
    pub transition_types: TransitionTypes,
    pub expiration: Expiration,
    pub initial_trigger: InitialTrigger,
}

impl GeofenceRequest {
    /// Build an ENTER+EXIT, never-expiring request with initial trigger ENTER
    pub fn new(regions: Vec<Region>) -> Self {
        Self {
            regions,
            transition_types: TransitionTypes::ENTER_AND_EXIT,
            expiration: Expiration::Never,
            initial_trigger: InitialTrigger::Enter,
        }
    }

    /// Ids of every region in the request
    pub fn region_ids(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.id.clone()).collect()
    }
}

/// Kind of boundary crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Enter,
    Exit,
    /// Any other provider-reported code (e.g. dwell)
    Unknown(i32),
}

impl TransitionKind {
    /// Classify a platform transition code
    pub fn from_code(code: i32) -> Self {
        match code {
            TRANSITION_ENTER => Self::Enter,
            TRANSITION_EXIT => Self::Exit,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => f.write_str("ENTER"),
            Self::Exit => f.write_str("EXIT"),
            Self::Unknown(code) => write!(f, "UNKNOWN({})", code),
        }
    }
}

/// Why a transition event carries no actionable data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The provider flagged the event with an error code
    Provider(i32),
    /// The event named no triggering regions
    NoTriggeringRegions,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(code) => write!(f, "geofencing error code {}", code),
            Self::NoTriggeringRegions => f.write_str("no triggering regions"),
        }
    }
}

/// Raw transition notification as delivered by the OS location service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionNotification {
    #[serde(default)]
    pub error_code: Option<i32>,
    #[serde(default)]
    pub transition: i32,
    #[serde(default)]
    pub region_ids: Vec<String>,
}

/// A detected boundary crossing (ephemeral, never persisted)
///
/// When `error` is set the event is diagnostic only and must not be acted upon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub region_ids: Vec<String>,
    pub kind: TransitionKind,
    pub error: Option<TransitionError>,
}

impl TransitionEvent {
    /// Create an actionable transition event
    pub fn new(kind: TransitionKind, region_ids: Vec<String>) -> Self {
        let error = region_ids
            .is_empty()
            .then_some(TransitionError::NoTriggeringRegions);
        Self {
            region_ids,
            kind,
            error,
        }
    }

    /// Create a diagnostic-only event carrying a provider error code
    pub fn error(code: i32) -> Self {
        Self {
            region_ids: Vec::new(),
            kind: TransitionKind::Unknown(0),
            error: Some(TransitionError::Provider(code)),
        }
    }
}

impl From<TransitionNotification> for TransitionEvent {
    fn from(notification: TransitionNotification) -> Self {
        match notification.error_code {
            Some(code) => Self::error(code),
            None => Self::new(
                TransitionKind::from_code(notification.transition),
                notification.region_ids,
            ),
        }
    }
}

/// Trait for geofence provider implementations
///
/// Wraps the OS geofencing service. The provider owns no durable state; its
/// monitoring set is a mirror of the region store and is lost on restart.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Call the platform geofencing API
/// - ✅ Forward platform transition callbacks into the `transitions()` stream
///
/// ## Forbidden Capabilities
/// - ❌ Access the region store (owned by `RegistryCoordinator`)
/// - ❌ Retry failed registrations (a failure is returned once, the
///   coordinator decides what happens next)
/// - ❌ Filter or deduplicate transition deliveries
///
/// ## Completion
///
/// Each call completes exactly once with success or failure. Completions
/// belong to their own call; implementations must not share request state
/// across concurrent calls.
#[async_trait]
pub trait GeofenceProvider: Send + Sync {
    /// Arm every region in `request` for ENTER and EXIT monitoring
    ///
    /// Re-registering an already armed id replaces its definition.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: All regions are armed
    /// - `Err(ProviderError)`: The request was refused as a whole
    async fn register_batch(&self, request: &GeofenceRequest) -> Result<(), ProviderError>;

    /// Stop monitoring the named regions
    ///
    /// Removing an id that is not armed is not an error.
    async fn unregister(&self, ids: &[String]) -> Result<(), ProviderError>;

    /// Stream of transition events for every monitored region
    ///
    /// Delivery is at-least-once and may be arbitrarily delayed. All regions
    /// share this single callback target.
    fn transitions(&self) -> Pin<Box<dyn Stream<Item = TransitionEvent> + Send + 'static>>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
