use std::ops::Range;

use chrono::{DateTime, Utc};
use rand::Rng;
use shared::{
    domain::{DesignerTab, Submission, SubmissionDraft, SubmissionId, SubmissionStatus},
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1557683316-973673baf926?auto=format&fit=crop&q=80&w=800";
pub const DEFAULT_STORAGE_LIMIT_MB: f64 = 2000.0;
const NEAR_LIMIT_PERCENT: f64 = 85.0;
const SIMULATED_FILE_SIZE_MB: Range<u32> = 10..60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("submission {0} not found")]
    NotFound(SubmissionId),
    #[error("invalid submission: {0}")]
    Validation(String),
    #[error("submission {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: SubmissionId,
        from: SubmissionStatus,
        to: SubmissionStatus,
    },
    #[error("submission id space exhausted")]
    IdsExhausted,
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        let code = match &value {
            StoreError::NotFound(_) => ErrorCode::NotFound,
            StoreError::Validation(_) => ErrorCode::Validation,
            StoreError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            StoreError::IdsExhausted => ErrorCode::Internal,
        };
        ApiError::new(code, value.to_string())
    }
}

/// Which slice of the collection a reader is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewFilter {
    Designer { tab: DesignerTab },
    /// Convenience filter keyed on a free-text email; not an access boundary.
    Client { email: String },
}

impl ViewFilter {
    pub fn matches(&self, submission: &Submission) -> bool {
        match self {
            Self::Designer { tab } => submission.is_archived == tab.shows_archived(),
            Self::Client { email } => {
                !submission.is_archived
                    && normalize_email(&submission.client_email) == normalize_email(email)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageUsage {
    pub used: f64,
    pub limit: f64,
    pub percent: f64,
    pub near_limit: bool,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// In-memory submission collection, most recent first.
#[derive(Debug, Clone, Default)]
pub struct SubmissionStore {
    submissions: Vec<Submission>,
    last_id: i64,
}

impl SubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing records, kept in the given order.
    pub fn with_submissions(submissions: Vec<Submission>) -> Self {
        let last_id = submissions.iter().map(|s| s.id.0).max().unwrap_or_default();
        Self {
            submissions,
            last_id,
        }
    }

    pub fn create(
        &mut self,
        draft: SubmissionDraft,
        drive_connected: bool,
    ) -> Result<Submission, StoreError> {
        self.create_at(draft, drive_connected, Utc::now())
    }

    pub fn create_at(
        &mut self,
        draft: SubmissionDraft,
        drive_connected: bool,
        now: DateTime<Utc>,
    ) -> Result<Submission, StoreError> {
        validate_draft(&draft)?;

        let id = self.next_id(now)?;
        let image_url = draft
            .image_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string());
        let file_size = draft.file_size.unwrap_or_else(simulated_file_size);

        let submission = Submission {
            id,
            title: draft.title.trim().to_string(),
            description: draft.description,
            client_email: draft.client_email.trim().to_string(),
            status: SubmissionStatus::Pending,
            feedback: String::new(),
            image_url,
            date: now.date_naive(),
            file_name: draft.file_name,
            file_size,
            is_archived: false,
            drive_linked: drive_connected,
        };
        self.submissions.insert(0, submission.clone());
        Ok(submission)
    }

    pub fn update_status(
        &mut self,
        id: SubmissionId,
        status: SubmissionStatus,
        feedback: impl Into<String>,
    ) -> Result<Submission, StoreError> {
        let submission = self.get_mut(id)?;
        if submission.status != SubmissionStatus::Pending || !status.is_decision() {
            return Err(StoreError::InvalidTransition {
                id,
                from: submission.status,
                to: status,
            });
        }
        submission.status = status;
        submission.feedback = feedback.into();
        Ok(submission.clone())
    }

    pub fn archive(&mut self, id: SubmissionId) -> Result<Submission, StoreError> {
        self.set_archived(id, true)
    }

    pub fn unarchive(&mut self, id: SubmissionId) -> Result<Submission, StoreError> {
        self.set_archived(id, false)
    }

    pub fn toggle_archive(&mut self, id: SubmissionId) -> Result<Submission, StoreError> {
        let submission = self.get_mut(id)?;
        submission.is_archived = !submission.is_archived;
        Ok(submission.clone())
    }

    pub fn delete(&mut self, id: SubmissionId) -> Result<Submission, StoreError> {
        let index = self
            .submissions
            .iter()
            .position(|s| s.id == id)
            .ok_or(StoreError::NotFound(id))?;
        Ok(self.submissions.remove(index))
    }

    pub fn get(&self, id: SubmissionId) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.id == id)
    }

    pub fn all(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    pub fn visible(&self, filter: &ViewFilter) -> Vec<&Submission> {
        self.submissions
            .iter()
            .filter(|s| filter.matches(s))
            .collect()
    }

    /// Totals every record, archived or not.
    pub fn storage_usage(&self, limit: f64) -> StorageUsage {
        let used: f64 = self.submissions.iter().map(|s| s.file_size).sum();
        let percent = if limit > 0.0 {
            (used / limit * 100.0).min(100.0)
        } else {
            100.0
        };
        StorageUsage {
            used,
            limit,
            percent,
            near_limit: percent > NEAR_LIMIT_PERCENT,
        }
    }

    fn set_archived(&mut self, id: SubmissionId, archived: bool) -> Result<Submission, StoreError> {
        let submission = self.get_mut(id)?;
        submission.is_archived = archived;
        Ok(submission.clone())
    }

    fn get_mut(&mut self, id: SubmissionId) -> Result<&mut Submission, StoreError> {
        self.submissions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    fn next_id(&mut self, now: DateTime<Utc>) -> Result<SubmissionId, StoreError> {
        let floor = self
            .last_id
            .checked_add(1)
            .ok_or(StoreError::IdsExhausted)?;
        let id = now.timestamp_millis().max(floor);
        self.last_id = id;
        Ok(SubmissionId(id))
    }
}

fn validate_draft(draft: &SubmissionDraft) -> Result<(), StoreError> {
    let client_email = draft.client_email.trim();
    if client_email.is_empty() {
        return Err(StoreError::Validation("client email is required".into()));
    }
    if !client_email.contains('@') {
        return Err(StoreError::Validation(format!(
            "client email '{client_email}' is not an email address"
        )));
    }
    if draft.title.trim().is_empty() {
        return Err(StoreError::Validation("title is required".into()));
    }
    if let Some(size) = draft.file_size {
        if !size.is_finite() || size < 0.0 {
            return Err(StoreError::Validation(format!("invalid file size {size}")));
        }
    }
    Ok(())
}

fn simulated_file_size() -> f64 {
    f64::from(rand::rng().random_range(SIMULATED_FILE_SIZE_MB))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
