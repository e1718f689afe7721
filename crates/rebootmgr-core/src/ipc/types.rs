//! Control protocol messages.
//!
//! Every call is one [`CallRequest`] answered by one [`CallReply`]. The
//! parameter objects of each method are typed structs below; fields without
//! `Option` are mandatory and a reply lacking one fails to decode.

use rebootmgr_config::{RebootMethod, RebootStatus, RebootStrategy};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Interface prefix shared by method names and error ids.
pub const INTERFACE: &str = "org.openSUSE.rebootmgr";

/// Fully qualified method names.
pub mod method {
    pub const REBOOT: &str = "org.openSUSE.rebootmgr.Reboot";
    pub const CANCEL: &str = "org.openSUSE.rebootmgr.Cancel";
    pub const STATUS: &str = "org.openSUSE.rebootmgr.Status";
    pub const FULL_STATUS: &str = "org.openSUSE.rebootmgr.FullStatus";
    pub const SET_STRATEGY: &str = "org.openSUSE.rebootmgr.SetStrategy";
    pub const SET_WINDOW: &str = "org.openSUSE.rebootmgr.SetWindow";
}

/// Fully qualified error ids.
pub mod error_id {
    /// A reboot is already pending; the reply carries its method and time.
    pub const ALREADY_IN_PROGRESS: &str = "org.openSUSE.rebootmgr.AlreadyInProgress";
    pub const INVALID_PARAMETER: &str = "org.openSUSE.rebootmgr.InvalidParameter";
    pub const WRITE_FAILED: &str = "org.openSUSE.rebootmgr.WriteFailed";
    pub const METHOD_NOT_FOUND: &str = "org.openSUSE.rebootmgr.MethodNotFound";
}

/// One protocol call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub method: String,
    #[serde(default)]
    pub parameters: Value,
}

impl CallRequest {
    pub fn new<P: Serialize>(method: &str, parameters: &P) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: method.to_string(),
            parameters: serde_json::to_value(parameters)?,
        })
    }

    /// A call without parameters.
    pub fn bare(method: &str) -> Self {
        Self {
            method: method.to_string(),
            parameters: Value::Object(Default::default()),
        }
    }
}

/// The answer to one call: a parameter object, an error id, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallReply {
    pub fn ok<P: Serialize>(parameters: &P) -> Result<Self, serde_json::Error> {
        Ok(Self {
            parameters: Some(serde_json::to_value(parameters)?),
            error: None,
        })
    }

    /// Success with an empty parameter object.
    pub fn empty() -> Self {
        Self {
            parameters: Some(Value::Object(Default::default())),
            error: None,
        }
    }

    pub fn error(id: &str) -> Self {
        Self {
            parameters: None,
            error: Some(id.to_string()),
        }
    }

    /// An error that also carries parameters for message enrichment.
    pub fn error_with<P: Serialize>(id: &str, parameters: &P) -> Result<Self, serde_json::Error> {
        Ok(Self {
            parameters: Some(serde_json::to_value(parameters)?),
            error: Some(id.to_string()),
        })
    }

    /// The error id, if the call failed. An empty id means success.
    pub fn error_id(&self) -> Option<&str> {
        self.error.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RebootParams {
    #[serde(rename = "Reboot")]
    pub method: RebootMethod,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RebootReply {
    pub method: RebootMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CancelReply {
    pub success: bool,
}

/// Optional method field: an unrecognised value becomes
/// [`RebootMethod::Unknown`] instead of failing the whole reply.
fn lenient_method<'de, D>(deserializer: D) -> Result<Option<RebootMethod>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.map(|value| {
        RebootMethod::try_from(value).unwrap_or_else(|e| {
            warn!(error = %e, "Unrecognised RequestedMethod, treating as unknown");
            RebootMethod::Unknown
        })
    }))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusReply {
    pub reboot_status: RebootStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reboot_time: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_method"
    )]
    pub requested_method: Option<RebootMethod>,
}

impl StatusReply {
    /// Status text, worded for the requested method.
    pub fn describe(&self) -> &'static str {
        self.reboot_status
            .describe(self.requested_method.unwrap_or(RebootMethod::Hard))
    }
}

/// Status plus the effective strategy and maintenance window.
///
/// `maintenance_window_start` is empty when no window is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FullStatusReply {
    pub reboot_status: RebootStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reboot_time: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_method"
    )]
    pub requested_method: Option<RebootMethod>,
    pub reboot_strategy: RebootStrategy,
    pub maintenance_window_start: String,
    /// Seconds.
    pub maintenance_window_duration: u64,
}

impl FullStatusReply {
    pub fn describe(&self) -> &'static str {
        self.reboot_status
            .describe(self.requested_method.unwrap_or(RebootMethod::Hard))
    }

    pub fn has_window(&self) -> bool {
        !self.maintenance_window_start.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetStrategyParams {
    pub strategy: RebootStrategy,
}

/// An empty `start` clears the maintenance window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetWindowParams {
    pub start: String,
    /// Seconds.
    pub duration: u64,
}

/// Generic transport-level error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
