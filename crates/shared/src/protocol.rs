use serde::{Deserialize, Serialize};

use crate::domain::NotifyAction;

/// Body of the POST sent to the mail relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub client_email: String,
    pub admin_email: String,
    pub project_title: String,
    pub description: String,
    pub action: NotifyAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub status: RelayStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RelayResponse {
    pub fn success() -> Self {
        Self {
            status: RelayStatus::Success,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RelayStatus::Error,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RelayStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_request_uses_relay_field_names() {
        let request = NotificationRequest {
            client_email: "c@x.com".into(),
            admin_email: "admin@studio.test".into(),
            project_title: "Logo".into(),
            description: "Minimal mark".into(),
            action: NotifyAction::Created,
        };
        let value = serde_json::to_value(&request).expect("json");
        assert_eq!(value["clientEmail"], "c@x.com");
        assert_eq!(value["adminEmail"], "admin@studio.test");
        assert_eq!(value["projectTitle"], "Logo");
        assert_eq!(value["action"], "created");
    }

    #[test]
    fn relay_response_without_message_parses() {
        let response: RelayResponse =
            serde_json::from_str(r#"{"status":"success"}"#).expect("json");
        assert!(response.is_success());
        assert_eq!(response.message, None);

        let response: RelayResponse =
            serde_json::from_str(r#"{"status":"error","message":"no data"}"#).expect("json");
        assert!(!response.is_success());
        assert_eq!(response.message.as_deref(), Some("no data"));
    }
}
