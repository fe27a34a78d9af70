// # Geofence Provider Implementations
//
// Platform backends wrap OS location services and live with the host
// application. This module ships the in-process provider used for
// embedding, the stdio daemon and tests.

pub mod local;

pub use local::{LocalGeofenceProvider, MonitoredRegions, TransitionSender};
