//! Core traits for the geofence registry
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RegionStore`]: Durable snapshot of registered regions
//! - [`GeofenceProvider`]: Platform geofencing service (arm/disarm, transitions)
//! - [`NotificationPolicy`]: Interruption filter toggled by transitions

pub mod geofence_provider;
pub mod notification_policy;
pub mod region_store;

pub use geofence_provider::{
    Expiration, GeofenceProvider, GeofenceRequest, InitialTrigger, TransitionError,
    TransitionEvent, TransitionKind, TransitionNotification, TransitionTypes, TRANSITION_ENTER,
    TRANSITION_EXIT,
};
pub use notification_policy::{InterruptionFilter, NotificationPolicy};
pub use region_store::{Region, RegionStore, RegistrySnapshot};
