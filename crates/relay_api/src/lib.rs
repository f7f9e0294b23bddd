use std::sync::Arc;

use serde::Deserialize;
use shared::{
    error::{ApiError, ErrorCode},
    locale::Locale,
    protocol::{NotificationRequest, RelayResponse},
};
use tracing::{info, warn};

pub mod transport;

pub use transport::{
    LogTransport, MailError, MailTransport, OutgoingMail, SendmailTransport, SENDMAIL_TIMEOUT,
};

#[derive(Clone)]
pub struct RelayContext {
    pub transport: Arc<dyn MailTransport>,
    pub locale: Locale,
    /// Sender domain when the request carries no usable `Host` header.
    pub fallback_domain: String,
}

/// Notification as the relay reads it. Absent fields are empty and `action`
/// is free text that only ends up in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayRequest {
    pub client_email: String,
    pub admin_email: String,
    pub project_title: String,
    pub description: String,
    pub action: String,
}

impl From<NotificationRequest> for RelayRequest {
    fn from(value: NotificationRequest) -> Self {
        Self {
            client_email: value.client_email,
            admin_email: value.admin_email,
            project_title: value.project_title,
            description: value.description,
            action: value.action.as_str().to_string(),
        }
    }
}

/// Refuses bodies that are empty, not JSON, or not a JSON object.
pub fn parse_request(body: &[u8]) -> Result<RelayRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(no_data());
    }
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::new(ErrorCode::Validation, format!("invalid notification: {e}")))?;
    if !value.is_object() {
        return Err(no_data());
    }
    serde_json::from_value(value)
        .map_err(|e| ApiError::new(ErrorCode::Validation, format!("invalid notification: {e}")))
}

fn no_data() -> ApiError {
    ApiError::new(ErrorCode::Validation, "no data")
}

/// Strips any port from a `Host` header value.
pub fn sender_domain(host: Option<&str>, fallback: &str) -> String {
    host.map(str::trim)
        .filter(|h| !h.is_empty())
        .map(|h| match h.rsplit_once(':') {
            Some((name, port)) if !name.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
                name
            }
            _ => h,
        })
        .unwrap_or(fallback)
        .to_string()
}

/// The client message followed by the designer's copy.
pub fn compose(ctx: &RelayContext, request: &RelayRequest, host: Option<&str>) -> Vec<OutgoingMail> {
    let from = format!("no-reply@{}", sender_domain(host, &ctx.fallback_domain));
    let body = ctx
        .locale
        .mail_body(&request.project_title, &request.description);

    [
        (&request.client_email, ctx.locale.mail_subject().to_string()),
        (&request.admin_email, ctx.locale.copy_subject()),
    ]
    .into_iter()
    .filter_map(|(to, subject)| {
        let to = to.trim();
        if to.is_empty() {
            warn!(action = %request.action, "skipping mail with blank recipient");
            return None;
        }
        Some(OutgoingMail {
            to: to.to_string(),
            from: from.clone(),
            subject,
            body: body.clone(),
        })
    })
    .collect()
}

/// Attempts every send and reports success regardless of hand-off failures;
/// the relay offers no delivery confirmation.
pub async fn relay_notification(
    ctx: &RelayContext,
    request: &RelayRequest,
    host: Option<&str>,
) -> RelayResponse {
    for mail in compose(ctx, request, host) {
        match ctx.transport.send(&mail).await {
            Ok(()) => info!(to = %mail.to, action = %request.action, "mail handed off"),
            Err(error) => warn!(to = %mail.to, action = %request.action, %error, "mail hand-off failed"),
        }
    }
    RelayResponse::success()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared::domain::NotifyAction;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<OutgoingMail>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
            self.sent.lock().await.push(mail.clone());
            if self.fail {
                return Err(MailError::Io(std::io::Error::other("sendmail missing")));
            }
            Ok(())
        }
    }

    fn context(transport: Arc<RecordingTransport>, locale: Locale) -> RelayContext {
        RelayContext {
            transport,
            locale,
            fallback_domain: "relay.local".into(),
        }
    }

    fn request() -> RelayRequest {
        RelayRequest {
            client_email: "c@x.com".into(),
            admin_email: "admin@studio.test".into(),
            project_title: "Logo".into(),
            description: "Minimal mark".into(),
            action: "created".into(),
        }
    }

    #[test]
    fn rejects_empty_and_malformed_bodies() {
        let err = parse_request(b"  ").expect_err("empty");
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.message, "no data");

        let err = parse_request(b"{\"clientEmail\":").expect_err("truncated");
        assert_eq!(err.code, ErrorCode::Validation);

        let err = parse_request(b"[1, 2]").expect_err("array");
        assert_eq!(err.message, "no data");

        let err = parse_request(b"\"hello\"").expect_err("string");
        assert_eq!(err.message, "no data");

        let err = parse_request(br#"{"clientEmail":5}"#).expect_err("wrong type");
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[test]
    fn parses_relay_payload() {
        let notification = NotificationRequest {
            client_email: "c@x.com".into(),
            admin_email: "admin@studio.test".into(),
            project_title: "Logo".into(),
            description: "Minimal mark".into(),
            action: NotifyAction::Created,
        };
        let body = serde_json::to_vec(&notification).expect("json");
        assert_eq!(parse_request(&body).expect("parse"), request());
        assert_eq!(RelayRequest::from(notification), request());
    }

    #[test]
    fn accepts_partial_payload_with_free_text_action() {
        let parsed = parse_request(
            br#"{"clientEmail":"c@x.com","adminEmail":"admin@studio.test","projectTitle":"Logo","action":"aprobado"}"#,
        )
        .expect("parse");
        assert_eq!(parsed.action, "aprobado");
        assert_eq!(parsed.description, "");

        let parsed = parse_request(b"{}").expect("empty object");
        assert_eq!(parsed, RelayRequest::default());
    }

    #[test]
    fn sender_domain_drops_port() {
        assert_eq!(sender_domain(Some("studio.example:8080"), "relay.local"), "studio.example");
        assert_eq!(sender_domain(Some("studio.example"), "relay.local"), "studio.example");
        assert_eq!(sender_domain(Some(" "), "relay.local"), "relay.local");
        assert_eq!(sender_domain(None, "relay.local"), "relay.local");
    }

    #[test]
    fn composes_client_mail_then_admin_copy() {
        let ctx = context(Arc::default(), Locale::Es);
        let mails = compose(&ctx, &request(), Some("studio.example"));

        assert_eq!(mails.len(), 2);
        assert_eq!(mails[0].to, "c@x.com");
        assert_eq!(mails[0].subject, "Nueva actualización de diseño");
        assert_eq!(mails[1].to, "admin@studio.test");
        assert_eq!(mails[1].subject, "Copia: Nueva actualización de diseño");
        assert!(mails.iter().all(|m| m.from == "no-reply@studio.example"));
        assert!(mails[0].body.contains("Logo"));
        assert!(mails[0].body.contains("Minimal mark"));
    }

    #[test]
    fn blank_recipients_are_skipped() {
        let ctx = context(Arc::default(), Locale::En);
        let mut request = request();
        request.admin_email = "  ".into();
        let mails = compose(&ctx, &request, None);
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].from, "no-reply@relay.local");
    }

    #[tokio::test]
    async fn transport_failures_still_report_success() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..RecordingTransport::default()
        });
        let ctx = context(transport.clone(), Locale::En);

        let response = relay_notification(&ctx, &request(), None).await;
        assert!(response.is_success());
        assert_eq!(transport.sent.lock().await.len(), 2);
    }

    #[test]
    fn rfc5322_rejects_header_injection() {
        let mail = OutgoingMail {
            to: "c@x.com\r\nBcc: everyone@x.com".into(),
            from: "no-reply@relay.local".into(),
            subject: "hi".into(),
            body: "body".into(),
        };
        assert!(matches!(mail.to_rfc5322(), Err(MailError::InvalidHeader("To"))));
    }

    #[test]
    fn rfc5322_encodes_non_ascii_subject() {
        let mail = OutgoingMail {
            to: "c@x.com".into(),
            from: "no-reply@relay.local".into(),
            subject: Locale::Es.mail_subject().into(),
            body: "line one\nline two".into(),
        };
        let message = mail.to_rfc5322().expect("message");
        assert!(message.contains("Subject: =?UTF-8?B?"));
        assert!(message.ends_with("\r\n\r\nline one\r\nline two\r\n"));
    }
}
