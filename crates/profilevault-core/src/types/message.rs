//! Wire types of the request/response message protocol
//!
//! ```text
//! Request:  { "type": "UPDATE_PROFILE", "payload": {...}, "requestId": "01J..." }
//! Response: { "success": true, "data": {...}, "requestId": "01J..." }
//!           { "success": false, "error": "Profile not found: ...", "requestId": "01J..." }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type tag.
///
/// Tags this crate does not know about are kept verbatim in
/// [`MessageType::Other`] so the router can report them by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Fetch the active profile
    GetProfile,
    /// Patch fields of an existing profile
    UpdateProfile,
    /// Store a new profile
    SaveProfile,
    /// Fetch settings
    GetSettings,
    /// Patch settings
    UpdateSettings,
    /// List every stored profile
    ListProfiles,
    /// Remove a profile
    DeleteProfile,
    /// Select the active profile
    SetActiveProfile,
    /// Export the whole store as a snapshot
    ExportData,
    /// Replace the whole store from a snapshot
    ImportData,
    /// Wipe the store back to first-run defaults
    ClearAll,
    /// Any tag not listed above
    Other(String),
}

impl MessageType {
    /// Every known tag
    pub const KNOWN: [MessageType; 11] = [
        MessageType::GetProfile,
        MessageType::UpdateProfile,
        MessageType::SaveProfile,
        MessageType::GetSettings,
        MessageType::UpdateSettings,
        MessageType::ListProfiles,
        MessageType::DeleteProfile,
        MessageType::SetActiveProfile,
        MessageType::ExportData,
        MessageType::ImportData,
        MessageType::ClearAll,
    ];

    /// The tag as it appears on the wire
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::GetProfile => "GET_PROFILE",
            MessageType::UpdateProfile => "UPDATE_PROFILE",
            MessageType::SaveProfile => "SAVE_PROFILE",
            MessageType::GetSettings => "GET_SETTINGS",
            MessageType::UpdateSettings => "UPDATE_SETTINGS",
            MessageType::ListProfiles => "LIST_PROFILES",
            MessageType::DeleteProfile => "DELETE_PROFILE",
            MessageType::SetActiveProfile => "SET_ACTIVE_PROFILE",
            MessageType::ExportData => "EXPORT_DATA",
            MessageType::ImportData => "IMPORT_DATA",
            MessageType::ClearAll => "CLEAR_ALL",
            MessageType::Other(tag) => tag,
        }
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        MessageType::KNOWN
            .into_iter()
            .find(|known| known.as_str() == tag)
            .unwrap_or(MessageType::Other(tag))
    }
}

impl From<&str> for MessageType {
    fn from(tag: &str) -> Self {
        MessageType::from(tag.to_string())
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Correlation id, echoed verbatim on the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Request {
    pub fn new(kind: impl Into<MessageType>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            request_id: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Outbound response, correlated to its request by `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Response {
    pub fn success(data: Value, request_id: Option<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            request_id,
        }
    }

    pub fn failure(error: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            request_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_tags_roundtrip() {
        for kind in MessageType::KNOWN {
            assert_eq!(MessageType::from(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_unknown_tag_preserved() {
        let kind = MessageType::from("DETECT_FORMS");
        assert_eq!(kind, MessageType::Other("DETECT_FORMS".to_string()));
        assert_eq!(kind.to_string(), "DETECT_FORMS");
    }

    #[test]
    fn test_request_wire_shape() {
        let request: Request = serde_json::from_value(json!({
            "type": "UPDATE_PROFILE",
            "payload": {"profileId": "p1", "updates": {"city": "X"}},
            "requestId": "r-1"
        }))
        .unwrap();

        assert_eq!(request.kind, MessageType::UpdateProfile);
        assert_eq!(request.request_id.as_deref(), Some("r-1"));
        assert!(request.payload.is_some());
    }

    #[test]
    fn test_request_without_payload_or_id() {
        let request: Request = serde_json::from_value(json!({"type": "GET_SETTINGS"})).unwrap();
        assert_eq!(request.kind, MessageType::GetSettings);
        assert!(request.payload.is_none());
        assert!(request.request_id.is_none());
    }

    #[test]
    fn test_failure_response_shape() {
        let response = Response::failure("boom", Some("r-2".to_string()));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": false, "error": "boom", "requestId": "r-2"})
        );
    }
}
