use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{NotifyAction, Submission},
    locale::Locale,
    protocol::{NotificationRequest, RelayResponse},
};
use thiserror::Error;
use tokio::{
    runtime::Handle,
    sync::Mutex,
    task::{JoinError, JoinHandle},
};
use tracing::{debug, info, warn};
use url::Url;

pub const NOTIFICATION_LOG_CAPACITY: usize = 5;
const RELAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("mail relay unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected notification (http {status}): {}", .message.as_deref().unwrap_or("no message"))]
    Rejected {
        status: u16,
        message: Option<String>,
    },
    #[error("no async runtime available to relay the notification")]
    NoRuntime,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Delivered,
    /// No relay configured; only the attempt line was recorded.
    Skipped,
    Failed(DispatchError),
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// A notification handed off in the background; awaiting it yields the outcome.
#[derive(Debug)]
pub enum PendingNotification {
    Spawned(JoinHandle<DispatchOutcome>),
    /// No runtime was available; the failure is already in the log.
    Dropped,
}

impl Future for PendingNotification {
    type Output = Result<DispatchOutcome, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut() {
            Self::Spawned(handle) => Pin::new(handle).poll(cx),
            Self::Dropped => Poll::Ready(Ok(DispatchOutcome::Failed(DispatchError::NoRuntime))),
        }
    }
}

#[async_trait]
pub trait MailRelay: Send + Sync {
    async fn relay(&self, request: &NotificationRequest) -> Result<(), DispatchError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

pub struct HttpMailRelay {
    http: Client,
    url: Url,
}

impl HttpMailRelay {
    pub fn new(url: Url) -> Result<Self, DispatchError> {
        let http = Client::builder().timeout(RELAY_TIMEOUT).build()?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl MailRelay for HttpMailRelay {
    async fn relay(&self, request: &NotificationRequest) -> Result<(), DispatchError> {
        let response = self
            .http
            .post(self.url.clone())
            .json(request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        // The body is advisory: a 2xx that does not parse still counts as sent.
        let parsed = serde_json::from_str::<RelayResponse>(&body).ok();

        if !status.is_success() {
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                message: parsed.and_then(|r| r.message),
            });
        }
        match parsed {
            Some(reply) if !reply.is_success() => Err(DispatchError::Rejected {
                status: status.as_u16(),
                message: reply.message,
            }),
            _ => Ok(()),
        }
    }
}

/// Relay used when no endpoint is configured.
pub struct DisabledRelay;

#[async_trait]
impl MailRelay for DisabledRelay {
    async fn relay(&self, _request: &NotificationRequest) -> Result<(), DispatchError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Most-recent-first log of dispatch attempts, capped at five lines.
#[derive(Clone, Default)]
pub struct NotificationLog {
    entries: Arc<Mutex<VecDeque<String>>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, line: impl Into<String>) {
        let mut entries = self.entries.lock().await;
        entries.push_front(line.into());
        entries.truncate(NOTIFICATION_LOG_CAPACITY);
    }

    /// For callers outside any runtime; must not be used from async code.
    pub fn push_blocking(&self, line: impl Into<String>) {
        let mut entries = self.entries.blocking_lock();
        entries.push_front(line.into());
        entries.truncate(NOTIFICATION_LOG_CAPACITY);
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.entries.lock().await.iter().cloned().collect()
    }
}

pub fn build_request(
    submission: &Submission,
    admin_email: &str,
    action: NotifyAction,
    locale: Locale,
) -> NotificationRequest {
    let description = if submission.description.trim().is_empty() {
        locale.action_description(action)
    } else {
        submission.description.clone()
    };
    NotificationRequest {
        client_email: submission.client_email.clone(),
        admin_email: admin_email.to_string(),
        project_title: submission.title.clone(),
        description,
        action,
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    relay: Arc<dyn MailRelay>,
    log: NotificationLog,
    locale: Locale,
}

impl NotificationDispatcher {
    pub fn new(relay: Arc<dyn MailRelay>, locale: Locale) -> Self {
        Self {
            relay,
            log: NotificationLog::new(),
            locale,
        }
    }

    pub fn log(&self) -> &NotificationLog {
        &self.log
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Records the attempt, relays once, and swallows any failure.
    pub async fn notify(
        &self,
        submission: &Submission,
        admin_email: &str,
        action: NotifyAction,
    ) -> DispatchOutcome {
        let request = build_request(submission, admin_email, action, self.locale);
        self.log.push(self.attempt_line(&request)).await;

        if !self.relay.is_enabled() {
            debug!(submission_id = %submission.id, %action, "mail relay disabled, skipping send");
            return DispatchOutcome::Skipped;
        }

        match self.relay.relay(&request).await {
            Ok(()) => {
                info!(submission_id = %submission.id, %action, "notification relayed");
                self.log
                    .push(self.locale.delivered_line(&request.project_title))
                    .await;
                DispatchOutcome::Delivered
            }
            Err(error) => {
                warn!(submission_id = %submission.id, %action, %error, "notification dropped");
                self.log
                    .push(self.locale.failed_line(&request.project_title))
                    .await;
                DispatchOutcome::Failed(error)
            }
        }
    }

    /// Runs [`Self::notify`] on the current tokio runtime without blocking the
    /// caller. Outside a runtime the notification is logged as failed and dropped.
    pub fn spawn_notify(
        &self,
        submission: Submission,
        admin_email: String,
        action: NotifyAction,
    ) -> PendingNotification {
        match Handle::try_current() {
            Ok(runtime) => {
                let dispatcher = self.clone();
                PendingNotification::Spawned(runtime.spawn(async move {
                    dispatcher.notify(&submission, &admin_email, action).await
                }))
            }
            Err(_) => {
                let request = build_request(&submission, &admin_email, action, self.locale);
                warn!(submission_id = %submission.id, %action, "no tokio runtime, notification dropped");
                self.log.push_blocking(self.attempt_line(&request));
                self.log
                    .push_blocking(self.locale.failed_line(&request.project_title));
                PendingNotification::Dropped
            }
        }
    }

    fn attempt_line(&self, request: &NotificationRequest) -> String {
        self.locale.attempt_line(
            request.action,
            &request.client_email,
            &request.admin_email,
            &request.project_title,
        )
    }
}

#[cfg(test)]
#[path = "tests/notification_tests.rs"]
mod tests;
