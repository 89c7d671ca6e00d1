//! The SMTP transport (C5): a `lettre::AsyncSmtpTransport<Tokio1Executor>` builder with a
//! localhost-skips-TLS dev affordance, sending whatever `template` and `content` map it is handed
//! rather than a fixed set of named methods, since the dispatcher owns retry and the templates
//! live at the call site.
use async_trait::async_trait;
use domain::errors::EmailError;
use domain::ports::{EmailTransportPort, OutgoingMessage};
use lettre::{
    message::header::ContentType,
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;
use crate::templates;

#[derive(Clone)]
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    pub fn new(config: &EmailConfig) -> anyhow::Result<Self> {
        let creds = Credentials::new(config.smtp_user.clone(), config.smtp_pass.clone());

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(creds);

        if config.smtp_host != "127.0.0.1" && config.smtp_host != "localhost" {
            let tls_params = TlsParameters::new(config.smtp_host.clone())?;
            builder = builder.tls(Tls::Required(tls_params));
        } else {
            builder = builder.tls(Tls::None);
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl EmailTransportPort for SmtpTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), EmailError> {
        let body = templates::render(&message.template, &message.content)?;

        let email = Message::builder()
            .from(
                message
                    .from
                    .parse()
                    .map_err(|e| EmailError::Transport(format!("invalid from address: {}", e)))?,
            )
            .to(message
                .to
                .parse()
                .map_err(|e| EmailError::Transport(format!("invalid to address: {}", e)))?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(body)
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        Ok(())
    }
}
