pub mod templates;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{MailConfig, SmtpConfig, SmtpEncryption};

const QUEUE_CAPACITY: usize = 100;

/// Outbound message queued for the background consumer.
#[derive(Debug)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    /// No SMTP configured; messages are logged instead of sent.
    Log,
}

/// Cloneable handle to the mail queue. A single consumer task drains
/// the queue and serializes all sends; delivery failures are logged and
/// never surfaced to the HTTP caller.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::Sender<Email>,
    pending: Arc<AtomicUsize>,
}

impl Mailer {
    pub fn start(config: &MailConfig) -> Mailer {
        let transport = match &config.smtp {
            Some(smtp) => match build_smtp(smtp) {
                Ok(t) => Transport::Smtp(t),
                Err(e) => {
                    warn!(error = %e, "SMTP transport unavailable, falling back to log transport");
                    Transport::Log
                }
            },
            None => Transport::Log,
        };

        let from = format!("{} <{}>", config.from_name, config.from_address);
        let (tx, mut rx) = mpsc::channel::<Email>(QUEUE_CAPACITY);
        let pending = Arc::new(AtomicUsize::new(0));

        let counter = pending.clone();
        tokio::spawn(async move {
            while let Some(email) = rx.recv().await {
                if let Err(e) = deliver(&transport, &from, email).await {
                    error!(error = %e, "mail delivery failed");
                }
                counter.fetch_sub(1, Ordering::SeqCst);
            }
        });

        Mailer { tx, pending }
    }

    /// Fire-and-forget enqueue. Awaits only when the queue is full,
    /// which blocks the detached sending task, never an HTTP response.
    pub async fn enqueue(&self, email: Email) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(email).await.is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            error!("mail queue closed, dropping message");
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}

fn build_smtp(smtp: &SmtpConfig) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
    let credentials = Credentials::new(smtp.user.clone(), smtp.pass.clone());
    let transport = match smtp.encryption {
        SmtpEncryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
            .port(smtp.port)
            .credentials(credentials)
            .build(),
        SmtpEncryption::StartTls => {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
                .port(smtp.port)
                .credentials(credentials)
                .build()
        }
        SmtpEncryption::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
            .port(smtp.port)
            .credentials(credentials)
            .build(),
    };
    Ok(transport)
}

async fn deliver(transport: &Transport, from: &str, email: Email) -> anyhow::Result<()> {
    match transport {
        Transport::Log => {
            info!(to = %email.to, subject = %email.subject, "SMTP disabled, logging outbound mail");
            Ok(())
        }
        Transport::Smtp(mailer) => {
            let message = Message::builder()
                .from(from.parse()?)
                .to(email.to.parse()?)
                .subject(&email.subject)
                .header(ContentType::TEXT_HTML)
                .body(email.html)?;
            mailer.send(message).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn log_only_config() -> MailConfig {
        MailConfig {
            smtp: None,
            from_name: "gatekit".into(),
            from_address: "no-reply@localhost".into(),
        }
    }

    async fn wait_until_idle(mailer: &Mailer) {
        for _ in 0..200 {
            if mailer.is_idle() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("mail queue did not drain");
    }

    #[tokio::test]
    async fn queue_drains_with_log_transport() {
        let mailer = Mailer::start(&log_only_config());
        for i in 0..5 {
            mailer
                .enqueue(Email {
                    to: format!("user{i}@example.com"),
                    subject: "hello".into(),
                    html: "<p>hi</p>".into(),
                })
                .await;
        }
        wait_until_idle(&mailer).await;
        assert_eq!(mailer.pending(), 0);
    }

    #[tokio::test]
    async fn cloned_handles_share_the_queue() {
        let mailer = Mailer::start(&log_only_config());
        let clone = mailer.clone();
        clone
            .enqueue(Email {
                to: "user@example.com".into(),
                subject: "hello".into(),
                html: "<p>hi</p>".into(),
            })
            .await;
        wait_until_idle(&mailer).await;
        assert!(clone.is_idle());
    }
}
