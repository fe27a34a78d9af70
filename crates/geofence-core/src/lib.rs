// # geofence-core
//
// Core library for the geofence registry.
//
// ## Architecture Overview
//
// This library keeps a durable set of circular regions consistent with what
// is armed in the platform's geofencing service, and reacts to boundary
// crossings by toggling the do-not-disturb interruption filter:
// - **RegionStore**: Trait for the durable region snapshot
// - **GeofenceProvider**: Trait for the platform geofencing service
// - **NotificationPolicy**: Trait for the interruption filter side effect
// - **RegistryCoordinator**: Orchestrates provider calls and store updates
// - **TransitionHandler**: Turns ENTER/EXIT events into filter changes
// - **CallBridge**: Typed method-call surface for the application shell
//
// ## Design Principles
//
// 1. **Store is the source of truth**: the provider is a mirror, re-armed on startup
// 2. **Confirm before persisting**: no region is stored before the provider arms it
// 3. **Single attempt**: failures are reported once, never retried internally
// 4. **Idempotent transitions**: duplicate deliveries are harmless
// 5. **Library-First**: providers and policies are injected, never global

pub mod bridge;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod policy;
pub mod provider;
pub mod store;
pub mod traits;
pub mod transition;

// Re-export core types for convenience
pub use bridge::{BridgeError, CallBridge, ErrorCode, MethodCall, MethodResponse};
pub use config::{CoordinatorConfig, GeofenceConfig, StoreConfig};
pub use coordinator::{RegistryCoordinator, RegistryEvent, ResyncOutcome};
pub use error::{Error, ProviderError, RegistrationError, Result};
pub use policy::LocalNotificationPolicy;
pub use provider::LocalGeofenceProvider;
pub use store::{FileRegionStore, MemoryRegionStore};
pub use traits::{GeofenceProvider, NotificationPolicy, Region, RegionStore, RegistrySnapshot};
pub use transition::{TransitionHandler, TransitionOutcome};
