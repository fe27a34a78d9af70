//! Call bridge
//!
//! Typed surface consumed by the application shell. Raw method calls arrive
//! as `{"method": ..., "arguments": {...}}`; each method's arguments are
//! decoded into a request struct and validated here, before anything reaches
//! the [`RegistryCoordinator`].
//!
//! | Method               | Arguments                          | Errors                            |
//! |----------------------|------------------------------------|-----------------------------------|
//! | `registerGeofence`   | `id`, `lat`, `lng`, `radiusMeters` | `ARGUMENT_ERROR`, `ADD_FAILED`    |
//! | `removeGeofence`     | `id`                               | `ARGUMENT_ERROR`, `REMOVE_FAILED` |
//! | `getStoredGeofences` | none                               | `LIST_FAILED`                     |
//!
//! Any other method answers `NOT_IMPLEMENTED`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::coordinator::RegistryCoordinator;
use crate::error::RegistrationError;
use crate::traits::Region;

const INVALID_GEOFENCE_ARGUMENTS: &str = "Missing or invalid geofence arguments";
const GEOFENCE_ID_REQUIRED: &str = "Geofence id is required";

/// Error codes reported to the application shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ArgumentError,
    AddFailed,
    RemoveFailed,
    ListFailed,
    NotImplemented,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::ArgumentError => "ARGUMENT_ERROR",
            Self::AddFailed => "ADD_FAILED",
            Self::RemoveFailed => "REMOVE_FAILED",
            Self::ListFailed => "LIST_FAILED",
            Self::NotImplemented => "NOT_IMPLEMENTED",
        };
        f.write_str(code)
    }
}

/// A failed call, as seen by the application shell
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct BridgeError {
    pub code: ErrorCode,
    pub message: String,
}

impl BridgeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Map a registry error, using `failure` for provider and store failures
    fn from_registration(err: RegistrationError, failure: ErrorCode) -> Self {
        match err {
            RegistrationError::InvalidArgument(msg) => Self::new(ErrorCode::ArgumentError, msg),
            RegistrationError::ProviderRejected(cause) => Self::new(failure, cause.to_string()),
            RegistrationError::Persistence(msg) => Self::new(failure, msg),
        }
    }
}

/// Untyped method call as delivered by the shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Arguments of `registerGeofence`
///
/// Fields are optional so that a missing argument is reported as
/// `ARGUMENT_ERROR` rather than a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterGeofenceRequest {
    pub id: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_meters: Option<f64>,
}

impl RegisterGeofenceRequest {
    /// Validate into a region
    pub fn into_region(self) -> Result<Region, BridgeError> {
        let invalid = || BridgeError::new(ErrorCode::ArgumentError, INVALID_GEOFENCE_ARGUMENTS);

        let (Some(id), Some(lat), Some(lng), Some(radius)) =
            (self.id, self.lat, self.lng, self.radius_meters)
        else {
            return Err(invalid());
        };

        Region::new(id, lat, lng, radius).map_err(|e| {
            debug!("Rejected registerGeofence arguments: {}", e);
            invalid()
        })
    }
}

/// Arguments of `removeGeofence`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoveGeofenceRequest {
    pub id: Option<String>,
}

impl RemoveGeofenceRequest {
    /// Validate into a non-blank id
    pub fn into_id(self) -> Result<String, BridgeError> {
        match self.id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(BridgeError::new(ErrorCode::ArgumentError, GEOFENCE_ID_REQUIRED)),
        }
    }
}

/// A decoded, typed method call
#[derive(Debug, Clone, PartialEq)]
pub enum MethodCall {
    RegisterGeofence(RegisterGeofenceRequest),
    RemoveGeofence(RemoveGeofenceRequest),
    GetStoredGeofences,
}

impl TryFrom<RawMethodCall> for MethodCall {
    type Error = BridgeError;

    fn try_from(raw: RawMethodCall) -> Result<Self, Self::Error> {
        match raw.method.as_str() {
            "registerGeofence" => decode_arguments(raw.arguments, INVALID_GEOFENCE_ARGUMENTS)
                .map(MethodCall::RegisterGeofence),
            "removeGeofence" => {
                decode_arguments(raw.arguments, GEOFENCE_ID_REQUIRED).map(MethodCall::RemoveGeofence)
            }
            "getStoredGeofences" => Ok(MethodCall::GetStoredGeofences),
            other => Err(BridgeError::new(
                ErrorCode::NotImplemented,
                format!("Method {} is not implemented", other),
            )),
        }
    }
}

/// Decode an arguments map, treating `null` as "no arguments"
fn decode_arguments<T>(arguments: Value, message: &str) -> Result<T, BridgeError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if arguments.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(arguments).map_err(|e| {
        debug!("Undecodable call arguments: {}", e);
        BridgeError::new(ErrorCode::ArgumentError, message)
    })
}

/// Wire response for one method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Success { result: Value },
    Error { code: ErrorCode, message: String },
}

impl From<Result<Value, BridgeError>> for MethodResponse {
    fn from(result: Result<Value, BridgeError>) -> Self {
        match result {
            Ok(result) => Self::Success { result },
            Err(e) => Self::Error {
                code: e.code,
                message: e.message,
            },
        }
    }
}

/// Dispatches shell method calls to the registry coordinator
#[derive(Clone)]
pub struct CallBridge {
    coordinator: Arc<RegistryCoordinator>,
}

impl CallBridge {
    pub fn new(coordinator: Arc<RegistryCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Handle a typed call
    ///
    /// Success payloads: `null` for register/remove, the stored region list
    /// for `getStoredGeofences`.
    pub async fn handle(&self, call: MethodCall) -> Result<Value, BridgeError> {
        match call {
            MethodCall::RegisterGeofence(request) => {
                let region = request.into_region()?;
                self.coordinator
                    .register_region(
                        region.id,
                        region.latitude,
                        region.longitude,
                        region.radius_meters,
                    )
                    .await
                    .map_err(|e| BridgeError::from_registration(e, ErrorCode::AddFailed))?;
                Ok(Value::Null)
            }
            MethodCall::RemoveGeofence(request) => {
                let id = request.into_id()?;
                self.coordinator
                    .remove_region(&id)
                    .await
                    .map_err(|e| BridgeError::from_registration(e, ErrorCode::RemoveFailed))?;
                Ok(Value::Null)
            }
            MethodCall::GetStoredGeofences => {
                let snapshot = self.coordinator.list_regions().await;
                serde_json::to_value(&snapshot).map_err(|e| {
                    BridgeError::new(
                        ErrorCode::ListFailed,
                        format!("Failed to encode stored geofences: {}", e),
                    )
                })
            }
        }
    }

    /// Decode and handle an untyped call
    pub async fn handle_raw(&self, raw: RawMethodCall) -> MethodResponse {
        let result = match MethodCall::try_from(raw) {
            Ok(call) => self.handle(call).await,
            Err(e) => Err(e),
        };
        result.into()
    }

    /// Decode and handle a JSON-encoded call
    pub async fn handle_json(&self, line: &str) -> MethodResponse {
        match serde_json::from_str::<RawMethodCall>(line) {
            Ok(raw) => self.handle_raw(raw).await,
            Err(e) => MethodResponse::Error {
                code: ErrorCode::ArgumentError,
                message: format!("Malformed method call: {}", e),
            },
        }
    }
}
