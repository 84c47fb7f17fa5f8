//! Enquiry service
//!
//! Contacting a listing's owner. Every listing a user has enquired about
//! is kept in their add-only enquired set.

use std::sync::Arc;

use chrono::Utc;

use super::input::non_blank;
use super::listing::{ListingPage, newest_page};
use crate::data::{Condition, Database, ListingFilter, UserSet};
use crate::error::AppError;
use crate::notify::Notifier;

pub struct EnquiryService {
    db: Arc<Database>,
    notifier: Arc<Notifier>,
}

impl EnquiryService {
    pub fn new(db: Arc<Database>, notifier: Arc<Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Send an enquiry about a listing to its owner
    ///
    /// The enquired set and the contact log are updated before the email is
    /// sent; a failed email still fails the request.
    pub async fn contact_agent(
        &self,
        user_id: &str,
        listing_id: &str,
        message: &str,
    ) -> Result<(), AppError> {
        let message = non_blank(Some(message))
            .ok_or_else(|| AppError::Validation("Message is required".to_string()))?;

        let listing = self
            .db
            .get_listing(listing_id)
            .await?
            .ok_or(AppError::NotFound("Ad"))?;
        let requester = self
            .db
            .get_user(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        let now = Utc::now();
        self.db.add_enquired(user_id, &listing.id, now).await?;
        self.db
            .append_contact_request(&listing.id, user_id, message, now)
            .await?;

        let owner = self
            .db
            .get_owners(std::slice::from_ref(&listing.posted_by))
            .await?
            .remove(&listing.posted_by)
            .ok_or(AppError::NotFound("User"))?;

        self.notifier
            .send_enquiry(&listing, &owner, &requester, message)
            .await?;
        tracing::info!(slug = %listing.slug, requester = %user_id, "Enquiry sent");

        Ok(())
    }

    /// Listings the user has enquired about, newest first
    pub async fn list(&self, user_id: &str, page: u32) -> Result<ListingPage, AppError> {
        let filter = ListingFilter::new().and(Condition::InUserSet {
            set: UserSet::Enquired,
            user_id: user_id.to_string(),
        });
        newest_page(&self.db, filter, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Listing;
    use crate::notify::{MockMailer, Templates};
    use crate::service::ListingService;
    use crate::service::test_support::{
        create_test_db, listing_input, png, seed_user, stub_geocoder, stub_pipeline,
    };
    use crate::storage::UploadedImage;

    fn templates() -> Templates {
        Templates::new("Propnest", "https://propnest.test", "support@propnest.test")
    }

    async fn seed_listing(db: &Arc<Database>, owner_id: &str) -> Listing {
        ListingService::new(db.clone(), stub_geocoder(), stub_pipeline())
            .create(
                owner_id,
                listing_input("1 King St"),
                vec![UploadedImage { bytes: png(4, 4) }],
            )
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn enquiry_reaches_owner_and_is_remembered_once() {
        let (db, _dir) = create_test_db().await;
        let owner = seed_user(&db, "owner@example.com").await;
        let buyer = seed_user(&db, "buyer@example.com").await;
        let listing = seed_listing(&db, &owner.id).await;

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email| {
                email.to == "owner@example.com"
                    && email.reply_to.as_deref() == Some("buyer@example.com")
                    && email.html.contains("Is it still available?")
            })
            .times(2)
            .returning(|_| Ok(()));
        let enquiries = EnquiryService::new(
            db.clone(),
            Arc::new(Notifier::new(Arc::new(mailer), templates())),
        );

        for _ in 0..2 {
            enquiries
                .contact_agent(&buyer.id, &listing.id, "Is it still available?")
                .await
                .unwrap();
        }

        let user = db.get_user(&buyer.id).await.unwrap().unwrap();
        assert_eq!(user.enquired_properties, vec![listing.id.clone()]);
        let stored = db.get_listing(&listing.id).await.unwrap().unwrap();
        assert_eq!(stored.analytics.contact_requests, 2);
        assert_eq!(enquiries.list(&buyer.id, 1).await.unwrap().ads.len(), 1);
    }

    #[tokio::test]
    async fn enquiry_email_links_the_listing_and_escapes_the_message() {
        let (db, _dir) = create_test_db().await;
        let owner = seed_user(&db, "owner@example.com").await;
        let buyer = seed_user(&db, "buyer@example.com").await;
        let listing = seed_listing(&db, &owner.id).await;

        let link = format!(r#"href="https://propnest.test/{}""#, listing.slug);
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(move |email| {
                email.html.contains(&link)
                    && email
                        .html
                        .contains("Residential-House for Sell - 1 King St - (500000)")
                    && email.html.contains("&lt;b&gt;Saturday?&lt;/b&gt;")
                    && !email.html.contains("<b>Saturday?</b>")
            })
            .times(1)
            .returning(|_| Ok(()));
        let enquiries =
            EnquiryService::new(db, Arc::new(Notifier::new(Arc::new(mailer), templates())));

        enquiries
            .contact_agent(&buyer.id, &listing.id, "<b>Saturday?</b>")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_email_fails_the_request() {
        let (db, _dir) = create_test_db().await;
        let owner = seed_user(&db, "owner@example.com").await;
        let buyer = seed_user(&db, "buyer@example.com").await;
        let listing = seed_listing(&db, &owner.id).await;

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .returning(|_| Err(AppError::Email("throttled".to_string())));
        let enquiries = EnquiryService::new(
            db.clone(),
            Arc::new(Notifier::new(Arc::new(mailer), templates())),
        );

        let error = enquiries
            .contact_agent(&buyer.id, &listing.id, "Hello")
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Email(_)));
    }

    #[tokio::test]
    async fn missing_listing_is_not_found() {
        let (db, _dir) = create_test_db().await;
        let buyer = seed_user(&db, "buyer@example.com").await;
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();
        let enquiries =
            EnquiryService::new(db, Arc::new(Notifier::new(Arc::new(mailer), templates())));

        assert!(matches!(
            enquiries.contact_agent(&buyer.id, "missing", "Hello").await,
            Err(AppError::NotFound("Ad"))
        ));
    }
}
