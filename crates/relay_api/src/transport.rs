use std::{future::Future, path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tokio::{io::AsyncWriteExt, process::Command, time::timeout};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    /// Renders a plain-text RFC 5322 message. Header values must be single-line.
    pub fn to_rfc5322(&self) -> Result<String, MailError> {
        for (name, value) in [("To", &self.to), ("From", &self.from), ("Subject", &self.subject)] {
            if value.contains(['\r', '\n']) {
                return Err(MailError::InvalidHeader(name));
            }
        }
        Ok(format!(
            "To: {}\r\nFrom: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=UTF-8\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{}\r\n",
            self.to,
            self.from,
            encode_header(&self.subject),
            self.body.replace("\r\n", "\n").replace('\n', "\r\n"),
        ))
    }
}

fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("header {0} contains a line break")]
    InvalidHeader(&'static str),
    #[error("failed to run mail program: {0}")]
    Io(#[from] std::io::Error),
    #[error("mail program exited with {0}")]
    Exit(std::process::ExitStatus),
    #[error("mail program did not finish within {0:?}")]
    TimedOut(Duration),
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Writes each message to the tracing log instead of sending it.
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = mail.to_rfc5322()?;
        info!(to = %mail.to, subject = %mail.subject, bytes = message.len(), "mail (log transport)");
        Ok(())
    }
}

pub const SENDMAIL_TIMEOUT: Duration = Duration::from_secs(30);

/// Hands messages to the host `sendmail -t -i`, as PHP's `mail()` does.
pub struct SendmailTransport {
    program: PathBuf,
    timeout: Duration,
}

impl SendmailTransport {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: SENDMAIL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn pipe(&self, message: &str) -> Result<(), MailError> {
        let mut child = Command::new(&self.program)
            .arg("-t")
            .arg("-i")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        let status = child.wait().await?;
        if !status.success() {
            return Err(MailError::Exit(status));
        }
        Ok(())
    }
}

/// Bounds a hand-off; the child is killed when its future is dropped.
async fn within<F>(limit: Duration, hand_off: F) -> Result<(), MailError>
where
    F: Future<Output = Result<(), MailError>>,
{
    timeout(limit, hand_off)
        .await
        .map_err(|_| MailError::TimedOut(limit))?
}

#[async_trait]
impl MailTransport for SendmailTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = mail.to_rfc5322()?;
        within(self.timeout, self.pipe(&message)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stalled_hand_off_times_out() {
        let limit = Duration::from_millis(20);
        let result = within(limit, std::future::pending()).await;
        assert!(matches!(result, Err(MailError::TimedOut(d)) if d == limit));
    }

    #[tokio::test]
    async fn finished_hand_off_passes_through() {
        let result = within(Duration::from_secs(1), async { Ok(()) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn missing_program_reports_io_error() {
        let transport = SendmailTransport::new("/nonexistent/sendmail")
            .with_timeout(Duration::from_secs(5));
        let mail = OutgoingMail {
            to: "c@x.com".into(),
            from: "no-reply@relay.local".into(),
            subject: "hi".into(),
            body: "body".into(),
        };
        assert!(matches!(transport.send(&mail).await, Err(MailError::Io(_))));
    }
}
