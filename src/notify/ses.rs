//! Amazon SES (v2) mail transport

use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};

use super::{Mailer, OutgoingEmail};
use crate::config::{EmailConfig, StorageConfig};
use crate::error::AppError;

/// SES mailer
pub struct SesMailer {
    client: aws_sdk_sesv2::Client,
    from: String,
    reply_to: String,
}

impl SesMailer {
    /// Build the SES client
    ///
    /// The AWS access keys are the ones configured for storage.
    pub fn new(config: &EmailConfig, credentials: &StorageConfig) -> Self {
        use aws_sdk_sesv2::config::{BehaviorVersion, Credentials, Region};

        let credentials = Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            None,
            None,
            "propnest-email",
        );

        let ses_config = aws_sdk_sesv2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .http_client(crate::storage::build_aws_http_client())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .build();

        Self {
            client: aws_sdk_sesv2::Client::from_conf(ses_config),
            from: config.from.clone(),
            reply_to: config.reply_to.clone(),
        }
    }
}

fn utf8(data: String) -> anyhow::Result<Content> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .context("building Content")
}

#[async_trait]
impl Mailer for SesMailer {
    #[tracing::instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        let destination = Destination::builder().to_addresses(email.to).build();

        let body = Body::builder().html(utf8(email.html)?).build();
        let message = Message::builder()
            .subject(utf8(email.subject)?)
            .body(body)
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .reply_to_addresses(email.reply_to.unwrap_or_else(|| self.reply_to.clone()))
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| AppError::Email(format!("SES send failed: {}", e)))?;

        Ok(())
    }
}
