use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::error::Error;
use crate::settings::EmailSettings;

/// A fully composed html email.
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingEmail {
    pub from_name: String,
    pub from_email: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Address used when a project has no verified sender of its own.
    fn default_sender(&self) -> &str;

    async fn send(&self, email: &OutgoingEmail) -> Result<(), Error>;
}

fn parse_address(address: &str) -> Result<Address, Error> {
    address.parse().map_err(|_| Error::InvalidEmailAddress {
        address: address.to_owned(),
    })
}

fn compose(email: &OutgoingEmail) -> Result<Message, Error> {
    let from = Mailbox::new(
        Some(email.from_name.clone()),
        parse_address(&email.from_email)?,
    );

    let mut builder = Message::builder()
        .from(from)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_HTML);
    for to in &email.to {
        builder = builder.to(Mailbox::new(None, parse_address(to)?));
    }

    Ok(builder.body(email.html.clone())?)
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    default_sender: String,
}

impl SmtpMailer {
    pub fn new(host: &str, settings: &EmailSettings) -> Result<SmtpMailer, Error> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(settings.smtp_port);
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(SmtpMailer {
            transport: builder.build(),
            default_sender: settings.default_sender.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn default_sender(&self) -> &str {
        &self.default_sender
    }

    #[tracing::instrument(skip(self, email), fields(subject = %email.subject, recipients = email.to.len()))]
    async fn send(&self, email: &OutgoingEmail) -> Result<(), Error> {
        let message = compose(email)?;
        self.transport.send(message).await?;

        info!("email sent");
        Ok(())
    }
}

/// Stands in for SMTP when no relay is configured. Messages are validated
/// the same way and then only logged.
pub struct LogMailer {
    default_sender: String,
}

impl LogMailer {
    pub fn new(default_sender: String) -> LogMailer {
        LogMailer { default_sender }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    fn default_sender(&self) -> &str {
        &self.default_sender
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), Error> {
        compose(email)?;

        info!(
            from = %email.from_email,
            to = ?email.to,
            subject = %email.subject,
            "no smtp relay configured, not sending email"
        );
        Ok(())
    }
}

pub fn from_settings(settings: &EmailSettings) -> Result<Box<dyn Mailer>, Error> {
    match &settings.smtp_host {
        Some(host) => Ok(Box::new(SmtpMailer::new(host, settings)?)),
        None => Ok(Box::new(LogMailer::new(settings.default_sender.clone()))),
    }
}
