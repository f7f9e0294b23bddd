use std::sync::Arc;

use anyhow::Context;
use shared::{
    domain::{DesignerTab, NotifyAction, Role, Submission, SubmissionDraft, SubmissionId, SubmissionStatus},
    error::{ApiError, ErrorCode},
    locale::Locale,
};
use storage::{StorageUsage, SubmissionStore, ViewFilter};
use tracing::info;

use crate::{
    config::ClientSettings,
    notification::{
        DisabledRelay, HttpMailRelay, MailRelay, NotificationDispatcher, PendingNotification,
    },
};

/// A committed mutation together with the notification it triggered.
#[derive(Debug)]
pub struct Committed {
    pub submission: Submission,
    pub notification: PendingNotification,
}

/// Single-session review state: the submission store plus everything the
/// designer and client views are derived from.
///
/// Notifications are relayed on the ambient tokio runtime when there is one.
pub struct ReviewSession {
    store: SubmissionStore,
    dispatcher: NotificationDispatcher,
    role: Role,
    designer_tab: DesignerTab,
    client_session: Option<String>,
    admin_email: String,
    drive_connected: bool,
    storage_limit_mb: f64,
}

impl ReviewSession {
    pub fn new(settings: &ClientSettings, relay: Arc<dyn MailRelay>) -> Self {
        Self {
            store: SubmissionStore::new(),
            dispatcher: NotificationDispatcher::new(relay, settings.locale),
            role: Role::Designer,
            designer_tab: DesignerTab::Active,
            client_session: None,
            admin_email: settings.admin_email.clone(),
            drive_connected: false,
            storage_limit_mb: settings.storage_limit_mb,
        }
    }

    /// Builds the relay from `settings.relay_url`, or a disabled relay when unset.
    pub fn from_settings(settings: &ClientSettings) -> anyhow::Result<Self> {
        let relay: Arc<dyn MailRelay> = match &settings.relay_url {
            Some(url) => Arc::new(
                HttpMailRelay::new(url.clone())
                    .with_context(|| format!("failed to build mail relay client for {url}"))?,
            ),
            None => Arc::new(DisabledRelay),
        };
        Ok(Self::new(settings, relay))
    }

    pub fn with_store(mut self, store: SubmissionStore) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &SubmissionStore {
        &self.store
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn switch_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn designer_tab(&self) -> DesignerTab {
        self.designer_tab
    }

    pub fn set_designer_tab(&mut self, tab: DesignerTab) {
        self.designer_tab = tab;
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    pub fn set_admin_email(&mut self, email: impl Into<String>) {
        self.admin_email = email.into();
    }

    pub fn drive_connected(&self) -> bool {
        self.drive_connected
    }

    pub fn connect_drive(&mut self) {
        self.drive_connected = true;
    }

    pub fn client_session(&self) -> Option<&str> {
        self.client_session.as_deref()
    }

    /// Email-only sign in: a filter key for the client view, not authentication.
    pub fn login_client(&mut self, email: &str) -> Result<(), ApiError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ApiError::new(ErrorCode::Validation, "email is required"));
        }
        self.client_session = Some(email.to_string());
        self.role = Role::Client;
        Ok(())
    }

    pub fn logout_client(&mut self) {
        self.client_session = None;
    }

    pub fn locale(&self) -> Locale {
        self.dispatcher.locale()
    }

    pub fn upload(&mut self, draft: SubmissionDraft) -> Result<Committed, ApiError> {
        self.require_role(Role::Designer)?;
        let submission = self.store.create(draft, self.drive_connected)?;
        info!(
            submission_id = %submission.id,
            client_email = %submission.client_email,
            drive_linked = submission.drive_linked,
            "submission created"
        );
        Ok(self.commit(submission, NotifyAction::Created))
    }

    /// Blank feedback falls back to the localized "approved" note.
    pub fn approve(&mut self, id: SubmissionId, feedback: &str) -> Result<Committed, ApiError> {
        let feedback = if feedback.trim().is_empty() {
            self.locale().default_approval_feedback()
        } else {
            feedback
        };
        self.decide(id, SubmissionStatus::Approved, feedback.to_string())
    }

    pub fn reject(&mut self, id: SubmissionId, feedback: &str) -> Result<Committed, ApiError> {
        self.decide(id, SubmissionStatus::Rejected, feedback.to_string())
    }

    pub fn archive(&mut self, id: SubmissionId) -> Result<Submission, ApiError> {
        self.require_role(Role::Designer)?;
        let submission = self.store.archive(id)?;
        info!(submission_id = %id, "submission archived");
        Ok(submission)
    }

    pub fn unarchive(&mut self, id: SubmissionId) -> Result<Submission, ApiError> {
        self.require_role(Role::Designer)?;
        let submission = self.store.unarchive(id)?;
        info!(submission_id = %id, "submission restored");
        Ok(submission)
    }

    pub fn toggle_archive(&mut self, id: SubmissionId) -> Result<Submission, ApiError> {
        self.require_role(Role::Designer)?;
        let submission = self.store.toggle_archive(id)?;
        info!(submission_id = %id, archived = submission.is_archived, "archive toggled");
        Ok(submission)
    }

    pub fn delete(&mut self, id: SubmissionId) -> Result<Submission, ApiError> {
        self.require_role(Role::Designer)?;
        let submission = self.store.delete(id)?;
        info!(submission_id = %id, "submission deleted");
        Ok(submission)
    }

    /// Filter for the current role; `None` for a client who has not signed in.
    pub fn view_filter(&self) -> Option<ViewFilter> {
        match self.role {
            Role::Designer => Some(ViewFilter::Designer {
                tab: self.designer_tab,
            }),
            Role::Client => self
                .client_session
                .as_ref()
                .map(|email| ViewFilter::Client {
                    email: email.clone(),
                }),
        }
    }

    pub fn visible_submissions(&self) -> Vec<Submission> {
        match self.view_filter() {
            Some(filter) => self.store.visible(&filter).into_iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn storage_usage(&self) -> StorageUsage {
        self.store.storage_usage(self.storage_limit_mb)
    }

    pub async fn notification_log(&self) -> Vec<String> {
        self.dispatcher.log().snapshot().await
    }

    fn decide(
        &mut self,
        id: SubmissionId,
        status: SubmissionStatus,
        feedback: String,
    ) -> Result<Committed, ApiError> {
        self.require_role(Role::Client)?;
        let filter = match self.view_filter() {
            Some(filter) => filter,
            None => {
                return Err(ApiError::new(
                    ErrorCode::Forbidden,
                    "client must sign in before reviewing",
                ))
            }
        };
        // Records addressed to another client read as missing.
        let owned = self.store.get(id).is_some_and(|s| filter.matches(s));
        if !owned {
            return Err(ApiError::new(
                ErrorCode::NotFound,
                format!("submission {id} not found"),
            ));
        }

        let submission = self.store.update_status(id, status, feedback)?;
        info!(submission_id = %id, %status, "submission reviewed");
        let action = NotifyAction::for_decision(status).ok_or_else(|| {
            ApiError::new(ErrorCode::Internal, format!("{status} is not a review decision"))
        })?;
        Ok(self.commit(submission, action))
    }

    fn commit(&self, submission: Submission, action: NotifyAction) -> Committed {
        let notification =
            self.dispatcher
                .spawn_notify(submission.clone(), self.admin_email.clone(), action);
        Committed {
            submission,
            notification,
        }
    }

    fn require_role(&self, expected: Role) -> Result<(), ApiError> {
        if self.role == expected {
            return Ok(());
        }
        let message = match expected {
            Role::Designer => "only the designer can do this",
            Role::Client => "only the client can review submissions",
        };
        Err(ApiError::new(ErrorCode::Forbidden, message))
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
