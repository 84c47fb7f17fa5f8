//! HTML email templates
//!
//! Every user-supplied value is HTML-escaped before it is interpolated.

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use super::OutgoingEmail;
use crate::data::{Listing, PublicOwner, User};

/// Renders the transactional emails
#[derive(Debug, Clone)]
pub struct Templates {
    app_name: String,
    client_url: String,
    support_email: String,
}

impl Templates {
    pub fn new(app_name: &str, client_url: &str, support_email: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            client_url: client_url.trim_end_matches('/').to_string(),
            support_email: support_email.to_string(),
        }
    }

    pub fn welcome(&self, to: &str) -> OutgoingEmail {
        let app = text(&self.app_name);
        let client = attr(&self.client_url);
        let html = format!(
            r#"<html>
  <body>
    <p>Good day! Welcome to {app} and thank you for joining us.</p>
    <div style="margin:20px auto;">
      <a href="{client}" style="margin-right:50px">Browse properties</a>
      <a href="{client}/post-ad">Post ad</a>
    </div>
    <i>Team {app}</i>
  </body>
</html>"#
        );

        OutgoingEmail {
            to: to.to_string(),
            reply_to: None,
            subject: format!("Welcome to {}", self.app_name),
            html,
        }
    }

    pub fn password_reset(&self, to: &str, reset_url: &str) -> OutgoingEmail {
        let app = text(&self.app_name);
        let href = attr(reset_url);
        let shown = text(reset_url);
        let support = text(&self.support_email);
        let html = format!(
            r#"<!DOCTYPE html>
<html>
  <head><meta charset="UTF-8"></head>
  <body style="margin: 0; padding: 0; font-family: Arial, sans-serif; line-height: 1.6; background-color: #f4f4f4;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px; background: #ffffff; border-radius: 10px;">
      <h1 style="color: #2c3e50; text-align: center;">{app}</h1>
      <h2 style="color: #2c3e50;">Password Reset Request</h2>
      <p>We received a request to reset your password for your {app} account. If you didn't make this request, please ignore this email.</p>
      <p>To reset your password, click the button below. This link will expire in <strong>1 hour</strong>.</p>
      <div style="text-align: center; margin: 30px 0;">
        <a href="{href}" style="display: inline-block; padding: 15px 30px; background-color: #3498db; color: #ffffff; text-decoration: none; border-radius: 5px;">Reset Your Password</a>
      </div>
      <p style="font-size: 14px;">If the button doesn't work, copy and paste this link into your browser:<br><a href="{href}">{shown}</a></p>
      <p style="font-size: 14px; color: #666;">Need help? Contact our support team at {support}</p>
    </div>
  </body>
</html>"#
        );

        OutgoingEmail {
            to: to.to_string(),
            reply_to: None,
            subject: format!("Reset Your {} Password", self.app_name),
            html,
        }
    }

    pub fn enquiry(
        &self,
        listing: &Listing,
        owner: &PublicOwner,
        requester: &User,
        message: &str,
    ) -> OutgoingEmail {
        let app = text(&self.app_name);
        let client = text(&self.client_url);
        let owner_name = text(owner.name.as_deref().unwrap_or(&owner.username));
        let requester_name = text(requester.name.as_deref().unwrap_or(&requester.username));
        let requester_email = text(&requester.email);
        let requester_mailto = attr(&requester.email);
        let phone = text(requester.phone.as_deref().unwrap_or("-"));
        let href = format!("{}/{}", self.client_url, listing.slug);
        let listing_href = attr(&href);
        let headline = format!(
            "{} for {} - {} - ({})",
            listing.property_type, listing.action, listing.address, listing.pricing.price
        );
        let summary = text(&headline);
        let message = text(message);
        let html = format!(
            r#"<html>
  <body>
    <p>Good day! {owner_name},</p>
    <p>You have received a new enquiry from {requester_name} via {client}.</p>
    <p><strong>Details:</strong></p>
    <ul>
      <li>Name: {requester_name}</li>
      <li>Email: <a href="mailto:{requester_mailto}">{requester_email}</a></li>
      <li>Phone: {phone}</li>
      <li>Enquired Ad: <a href="{listing_href}">{summary}</a></li>
    </ul>
    <p><strong>Message:</strong></p>
    <p>{message}</p>
    <p>Thank you!</p>
    <i>Team {app}</i>
  </body>
</html>"#
        );

        OutgoingEmail {
            to: owner.email.clone(),
            reply_to: Some(requester.email.clone()),
            subject: format!("Enquiry received - {}", self.app_name),
            html,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> Templates {
        Templates::new("Propnest", "https://propnest.test/", "support@propnest.test")
    }

    #[test]
    fn welcome_links_to_client() {
        let email = templates().welcome("new@example.com");
        assert!(email.html.contains(r#"href="https://propnest.test/post-ad""#));
        assert_eq!(email.reply_to, None);
    }

    #[test]
    fn reset_email_carries_link() {
        let email = templates().password_reset(
            "a@example.com",
            "https://propnest.test/reset-password/abc123",
        );
        assert!(email.html.contains("https://propnest.test/reset-password/abc123"));
        assert_eq!(email.subject, "Reset Your Propnest Password");
    }
}
