//! Notification adapter
//!
//! Transactional email. `Mailer` is the transport (SES in production);
//! `Notifier` renders the message for each event and records the outcome.

mod ses;
mod templates;

pub use ses::SesMailer;
pub use templates::Templates;

use std::sync::Arc;

use async_trait::async_trait;

use crate::data::{Listing, PublicOwner, User};
use crate::error::AppError;
use crate::metrics::EMAILS_SENT_TOTAL;

/// A rendered email
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    /// Overrides the configured reply-to address
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
}

/// Email transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError>;
}

/// Sends the application's transactional emails
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    templates: Templates,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, templates: Templates) -> Self {
        Self { mailer, templates }
    }

    async fn dispatch(&self, kind: &'static str, email: OutgoingEmail) -> Result<(), AppError> {
        let result = self.mailer.send(email).await;
        let outcome = if result.is_ok() { "sent" } else { "failed" };
        EMAILS_SENT_TOTAL.with_label_values(&[kind, outcome]).inc();
        if let Err(e) = &result {
            tracing::error!(kind, error = %e, "Email dispatch failed");
        }
        result
    }

    pub async fn send_welcome(&self, to: &str) -> Result<(), AppError> {
        self.dispatch("welcome", self.templates.welcome(to)).await
    }

    pub async fn send_password_reset(&self, to: &str, reset_url: &str) -> Result<(), AppError> {
        self.dispatch("password_reset", self.templates.password_reset(to, reset_url))
            .await
    }

    /// Enquiry notice to a listing's owner; replies go to the requester
    pub async fn send_enquiry(
        &self,
        listing: &Listing,
        owner: &PublicOwner,
        requester: &User,
        message: &str,
    ) -> Result<(), AppError> {
        self.dispatch(
            "enquiry",
            self.templates.enquiry(listing, owner, requester, message),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> Templates {
        Templates::new("Propnest", "https://propnest.test", "support@propnest.test")
    }

    #[tokio::test]
    async fn welcome_goes_to_new_user() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email| email.to == "new@example.com" && email.subject == "Welcome to Propnest")
            .times(1)
            .returning(|_| Ok(()));

        let notifier = Notifier::new(Arc::new(mailer), templates());
        notifier.send_welcome("new@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn transport_failure_is_returned() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .returning(|_| Err(AppError::Email("throttled".to_string())));

        let notifier = Notifier::new(Arc::new(mailer), templates());
        let result = notifier
            .send_password_reset("a@example.com", "https://propnest.test/reset-password/x")
            .await;
        assert!(matches!(result, Err(AppError::Email(_))));
    }
}
