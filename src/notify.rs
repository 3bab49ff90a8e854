//!
//! # Notification Sink
//!
//! Best-effort email on task mutations. Handlers hand a message to a
//! bounded queue and move on; a background worker owns the SMTP transport
//! and performs the actual sends with a short timeout. Nothing on this
//! path ever blocks or fails the mutating request: a full queue, a
//! missing recipient, an unconfigured transport, and a failed send all
//! degrade to a counter increment and a log line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::mpsc;

use crate::config::SmtpConfig;

const QUEUE_CAPACITY: usize = 64;
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

struct EmailJob {
    to: String,
    subject: String,
    body: String,
}

/// Fire-and-forget email dispatcher.
pub struct Notifier {
    tx: Option<mpsc::Sender<EmailJob>>,
    failed: Arc<AtomicU64>,
}

impl Notifier {
    /// A notifier with no transport; every `notify` is a no-op.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Spawns the worker task if SMTP is configured. Must be called from
    /// within a tokio runtime.
    pub fn new(smtp: Option<SmtpConfig>) -> Self {
        match smtp {
            None => Self::disabled(),
            Some(config) => {
                let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
                let failed = Arc::new(AtomicU64::new(0));
                tokio::spawn(run_worker(config, rx, Arc::clone(&failed)));
                Self {
                    tx: Some(tx),
                    failed,
                }
            }
        }
    }

    /// Queues a message. No-op if no transport is configured or no
    /// recipient is known; drops (and counts) the message if the queue
    /// is full. Never blocks, never returns an error.
    pub fn notify(&self, to: Option<&str>, subject: &str, body: &str) {
        let tx = match &self.tx {
            Some(tx) => tx,
            None => return,
        };
        let to = match to {
            Some(to) if !to.is_empty() => to.to_string(),
            _ => return,
        };

        let job = EmailJob {
            to,
            subject: subject.to_string(),
            body: body.to_string(),
        };
        if tx.try_send(job).is_err() {
            self.failed.fetch_add(1, Ordering::Relaxed);
            log::warn!("notification queue full, dropping message");
        }
    }

    /// Number of notifications that were dropped or failed to send.
    pub fn failed_sends(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

async fn run_worker(
    config: SmtpConfig,
    mut rx: mpsc::Receiver<EmailJob>,
    failed: Arc<AtomicU64>,
) {
    let mailer = match build_mailer(&config) {
        Ok(mailer) => mailer,
        Err(e) => {
            log::error!("cannot construct SMTP transport ({}), notifications disabled", e);
            while rx.recv().await.is_some() {
                failed.fetch_add(1, Ordering::Relaxed);
            }
            return;
        }
    };

    while let Some(job) = rx.recv().await {
        if let Err(e) = send_one(&mailer, &config, job).await {
            failed.fetch_add(1, Ordering::Relaxed);
            log::warn!("notification send failed: {}", e);
        }
    }
}

fn build_mailer(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        .map_err(|e| e.to_string())?
        .port(config.port);

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    Ok(builder.build())
}

async fn send_one(
    mailer: &AsyncSmtpTransport<Tokio1Executor>,
    config: &SmtpConfig,
    job: EmailJob,
) -> Result<(), String> {
    let email = Message::builder()
        .from(config.from.parse().map_err(|e| format!("invalid from address: {}", e))?)
        .to(job.to.parse().map_err(|e| format!("invalid to address: {}", e))?)
        .subject(job.subject)
        .header(ContentType::TEXT_HTML)
        .body(job.body)
        .map_err(|e| e.to_string())?;

    match tokio::time::timeout(SEND_TIMEOUT, mailer.send(email)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("send timed out".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn test_disabled_notifier_is_a_noop() {
        let notifier = Notifier::disabled();
        notifier.notify(Some("user@example.com"), "subject", "body");
        assert_eq!(notifier.failed_sends(), 0);
    }

    #[actix_rt::test]
    async fn test_missing_recipient_is_a_noop() {
        let notifier = Notifier::new(Some(SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: None,
            password: None,
            from: "no-reply@example.com".to_string(),
        }));

        notifier.notify(None, "subject", "body");
        notifier.notify(Some(""), "subject", "body");

        // Nothing was queued, so nothing can have failed.
        assert_eq!(notifier.failed_sends(), 0);
    }

    #[actix_rt::test]
    async fn test_unreachable_transport_counts_failures_without_erroring() {
        let notifier = Notifier::new(Some(SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1, // nothing listens here
            username: None,
            password: None,
            from: "no-reply@example.com".to_string(),
        }));

        notifier.notify(Some("user@example.com"), "subject", "body");

        // The send happens off the caller's path; wait for the worker to
        // record the failure.
        for _ in 0..100 {
            if notifier.failed_sends() == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("expected the failed send to be counted");
    }
}
