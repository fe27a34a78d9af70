// # Notification Policy Implementations

pub mod local;

pub use local::LocalNotificationPolicy;
