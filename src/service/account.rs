//! Account service
//!
//! Sign-in (with sign-up on first login), password reset and profile
//! maintenance.

use std::sync::Arc;

use chrono::{Duration, Utc};
use lazy_static::lazy_static;
use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::Regex;
use serde::Serialize;

use super::input::non_blank;
use crate::auth::{Session, create_session_token, hash_password, verify_password};
use crate::config::AppConfig;
use crate::data::{Database, ProfileChanges, User};
use crate::error::AppError;
use crate::notify::Notifier;
use crate::storage::{ImagePipeline, UploadedImage};

const MIN_PASSWORD_LEN: usize = 6;
const USERNAME_LEN: usize = 6;
const RESET_TOKEN_LEN: usize = 32;
const USERNAME_ATTEMPTS: usize = 5;

/// Reply for a forgot-password request, whether or not the account exists
pub const RESET_REQUESTED_MESSAGE: &str =
    "If we find your account, you will receive an email from us shortly";

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    )
    .expect("email regex is valid");
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn check_new_password(password: &str, message: &str) -> Result<(), AppError> {
    if password.trim().is_empty() || password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(())
}

async fn hash_blocking(password: &str) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
}

async fn verify_blocking(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let (password, stored_hash) = (password.to_string(), stored_hash.to_string());
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))
}

/// Token and the signed-in user
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Profile update request
#[derive(Debug, Default)]
pub struct ProfileForm {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub about: Option<String>,
    pub photo: Option<UploadedImage>,
    pub logo: Option<UploadedImage>,
}

pub struct AccountService {
    db: Arc<Database>,
    notifier: Arc<Notifier>,
    images: Arc<ImagePipeline>,
    config: Arc<AppConfig>,
}

impl AccountService {
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<Notifier>,
        images: Arc<ImagePipeline>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            notifier,
            images,
            config,
        }
    }

    /// Sign in, creating the account on first login
    ///
    /// An unknown email gets a welcome email and a new Buyer account; if the
    /// email cannot be sent no account is created. A known email must match
    /// the stored password.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AppError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::Validation("A valid email is required".to_string()));
        }
        if password.trim().is_empty() {
            return Err(AppError::Validation("Password is required".to_string()));
        }
        check_new_password(password, "Password should be at least 6 characters long")?;

        let user = match self.db.get_user_by_email(&email).await? {
            Some(user) => {
                if !verify_blocking(password, &user.password_hash).await? {
                    return Err(AppError::Validation("Wrong password".to_string()));
                }
                user
            }
            None => self.sign_up(&email, password).await?,
        };

        let session = Session::new(&user.id, self.config.auth.token_max_age);
        let token = create_session_token(&session, &self.config.auth.token_secret)?;
        Ok(LoginResponse { token, user })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<User, AppError> {
        self.notifier.send_welcome(email).await?;

        let password_hash = hash_blocking(password).await?;
        let username = self.free_username().await?;
        let user = User::new(email, &username, password_hash, Utc::now());
        self.db.insert_user(&user).await?;

        tracing::info!(user = %user.id, username = %user.username, "Account created");
        Ok(user)
    }

    async fn free_username(&self) -> Result<String, AppError> {
        for _ in 0..USERNAME_ATTEMPTS {
            let username = random_text(USERNAME_LEN);
            if self.db.get_user_id_by_username(&username).await?.is_none() {
                return Ok(username);
            }
        }
        Err(AppError::Internal(anyhow::anyhow!(
            "No free username after {} attempts",
            USERNAME_ATTEMPTS
        )))
    }

    /// Email a password reset link
    ///
    /// Unknown emails get the same reply. If the email cannot be sent the
    /// token is withdrawn.
    pub async fn forgot_password(&self, email: &str) -> Result<&'static str, AppError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.db.get_user_by_email(&email).await? else {
            return Ok(RESET_REQUESTED_MESSAGE);
        };

        let token = random_text(RESET_TOKEN_LEN);
        let expires_at = Utc::now() + Duration::seconds(self.config.auth.reset_token_ttl);
        self.db
            .set_reset_token(&user.id, Some((&token, expires_at)))
            .await?;

        let reset_url = self
            .config
            .server
            .client_link(&format!("reset-password/{token}"));
        if let Err(e) = self.notifier.send_password_reset(&user.email, &reset_url).await {
            if let Err(clear) = self.db.set_reset_token(&user.id, None).await {
                tracing::error!(user = %user.id, error = %clear, "Failed to withdraw reset token");
            }
            return Err(e);
        }

        Ok("Password reset link has been sent to your email")
    }

    /// Set a new password with a reset token
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        check_new_password(new_password, "Password must be at least 6 characters long")?;

        let user = match non_blank(Some(token)) {
            Some(token) => self.db.get_user_by_reset_token(token, Utc::now()).await?,
            None => None,
        }
        .ok_or_else(|| {
            AppError::Validation(
                "Invalid or expired reset token. Please request a new password reset".to_string(),
            )
        })?;

        let password_hash = hash_blocking(new_password).await?;
        self.db
            .update_password_hash(&user.id, &password_hash, Utc::now())
            .await?;

        tracing::info!(user = %user.id, "Password reset");
        Ok(())
    }

    pub async fn current_user(&self, user_id: &str) -> Result<User, AppError> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))
    }

    /// Change password after checking the current one
    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if old_password.trim().is_empty() {
            return Err(AppError::Validation("Old password is required".to_string()));
        }
        if new_password.trim().is_empty() {
            return Err(AppError::Validation("New password is required".to_string()));
        }
        check_new_password(
            new_password,
            "New password must be at least 6 characters long",
        )?;

        let user = self.current_user(user_id).await?;
        if !verify_blocking(old_password, &user.password_hash).await? {
            return Err(AppError::Validation("Old password is incorrect".to_string()));
        }

        let password_hash = hash_blocking(new_password).await?;
        self.db
            .update_password_hash(&user.id, &password_hash, Utc::now())
            .await?;

        tracing::info!(user = %user.id, "Password changed");
        Ok(())
    }

    pub async fn update_username(&self, user_id: &str, username: &str) -> Result<User, AppError> {
        let username = non_blank(Some(username))
            .ok_or_else(|| AppError::Validation("Username is required".to_string()))?;

        if let Some(holder) = self.db.get_user_id_by_username(username).await? {
            if holder != user_id {
                return Err(AppError::Validation(
                    "Username is already taken. Try another one".to_string(),
                ));
            }
        }

        self.db
            .update_username(user_id, username, Utc::now())
            .await?;
        self.current_user(user_id).await
    }

    /// Update profile text and images; blank or absent fields are kept
    pub async fn update_profile(&self, user_id: &str, form: ProfileForm) -> Result<User, AppError> {
        let text = |value: &Option<String>| non_blank(value.as_deref()).map(str::to_string);
        let mut changes = ProfileChanges {
            name: text(&form.name),
            phone: text(&form.phone),
            company: text(&form.company),
            address: text(&form.address),
            about: text(&form.about),
            ..Default::default()
        };

        if let Some(photo) = form.photo {
            changes.photo = self.store_one(photo, user_id).await?;
        }
        if let Some(logo) = form.logo {
            changes.logo = self.store_one(logo, user_id).await?;
        }

        self.db
            .update_profile(user_id, &changes, Utc::now())
            .await?;
        self.current_user(user_id).await
    }

    async fn store_one(&self, image: UploadedImage, user_id: &str) -> Result<Option<String>, AppError> {
        let photos = self.images.store(vec![image], user_id).await?;
        Ok(photos.into_iter().next().map(|photo| photo.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_session_token;
    use crate::config::tests::valid_config;
    use crate::notify::{MockMailer, Templates};
    use crate::service::test_support::{RecordingMailer, create_test_db, png, stub_pipeline};

    fn templates() -> Templates {
        Templates::new("Propnest", "http://localhost:3000", "support@propnest.test")
    }

    fn service(db: Arc<Database>, notifier: Notifier) -> AccountService {
        AccountService::new(
            db,
            Arc::new(notifier),
            stub_pipeline(),
            Arc::new(valid_config()),
        )
    }

    fn recording() -> (Arc<RecordingMailer>, Notifier) {
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(mailer.clone(), templates());
        (mailer, notifier)
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("jo.smith+ads@example.com.au"));
        assert!(!is_valid_email("jo.smith"));
        assert!(!is_valid_email("jo@localhost"));
        assert!(!is_valid_email("jo @example.com"));
    }

    #[tokio::test]
    async fn first_login_creates_the_account() {
        let (db, _dir) = create_test_db().await;
        let (mailer, notifier) = recording();
        let accounts = service(db.clone(), notifier);

        let created = accounts.login("New@Example.com ", "secret1").await.unwrap();
        assert_eq!(created.user.email, "new@example.com");
        assert_eq!(created.user.username.len(), USERNAME_LEN);
        assert_eq!(mailer.sent().len(), 1);

        let session = verify_session_token(&created.token, &"x".repeat(32)).unwrap();
        assert_eq!(session.user_id, created.user.id);

        let again = accounts.login("new@example.com", "secret1").await.unwrap();
        assert_eq!(again.user.id, created.user.id);
        assert_eq!(mailer.sent().len(), 1);

        let json = serde_json::to_value(&again).unwrap();
        assert!(json["user"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let (db, _dir) = create_test_db().await;
        let (_mailer, notifier) = recording();
        let accounts = service(db, notifier);

        accounts.login("jo@example.com", "secret1").await.unwrap();
        let error = accounts
            .login("jo@example.com", "secret2")
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Wrong password");
    }

    #[tokio::test]
    async fn login_input_is_checked_before_lookup() {
        let (db, _dir) = create_test_db().await;
        let (mailer, notifier) = recording();
        let accounts = service(db, notifier);

        let error = accounts.login("not-an-email", "secret1").await.unwrap_err();
        assert_eq!(error.to_string(), "A valid email is required");
        let error = accounts.login("jo@example.com", "12345").await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "Password should be at least 6 characters long"
        );
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn failed_welcome_email_creates_nothing() {
        let (db, _dir) = create_test_db().await;
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .returning(|_| Err(AppError::Email("rejected".to_string())));
        let accounts = service(db.clone(), Notifier::new(Arc::new(mailer), templates()));

        assert!(matches!(
            accounts.login("jo@example.com", "secret1").await,
            Err(AppError::Email(_))
        ));
        assert!(db.get_user_by_email("jo@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_link_sets_a_new_password_once() {
        let (db, _dir) = create_test_db().await;
        let (mailer, notifier) = recording();
        let accounts = service(db.clone(), notifier);
        accounts.login("jo@example.com", "secret1").await.unwrap();

        accounts.forgot_password("jo@example.com").await.unwrap();
        let reset = mailer.sent().pop().unwrap();
        let token = reset
            .html
            .split("reset-password/")
            .nth(1)
            .map(|rest| rest.chars().take(RESET_TOKEN_LEN).collect::<String>())
            .unwrap();
        assert_eq!(token.len(), RESET_TOKEN_LEN);

        accounts.reset_password(&token, "newsecret").await.unwrap();
        accounts.login("jo@example.com", "newsecret").await.unwrap();

        // Token is single use
        assert!(matches!(
            accounts.reset_password(&token, "another1").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn unknown_email_gets_the_generic_reply() {
        let (db, _dir) = create_test_db().await;
        let (mailer, notifier) = recording();
        let accounts = service(db, notifier);

        let message = accounts.forgot_password("ghost@example.com").await.unwrap();
        assert_eq!(message, RESET_REQUESTED_MESSAGE);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn change_password_checks_the_stored_hash() {
        let (db, _dir) = create_test_db().await;
        let (_mailer, notifier) = recording();
        let accounts = service(db, notifier);
        let user = accounts.login("jo@example.com", "secret1").await.unwrap().user;

        let error = accounts
            .change_password(&user.id, "newsecret", "newsecret")
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Old password is incorrect");

        accounts
            .change_password(&user.id, "secret1", "newsecret")
            .await
            .unwrap();
        accounts.login("jo@example.com", "newsecret").await.unwrap();
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let (db, _dir) = create_test_db().await;
        let (_mailer, notifier) = recording();
        let accounts = service(db, notifier);
        let jo = accounts.login("jo@example.com", "secret1").await.unwrap().user;
        let sam = accounts.login("sam@example.com", "secret1").await.unwrap().user;

        let renamed = accounts.update_username(&jo.id, "  jo_realty ").await.unwrap();
        assert_eq!(renamed.username, "jo_realty");
        // Keeping your own name is fine
        accounts.update_username(&jo.id, "jo_realty").await.unwrap();

        let error = accounts
            .update_username(&sam.id, "jo_realty")
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Username is already taken. Try another one");
    }

    #[tokio::test]
    async fn profile_keeps_blank_fields_and_stores_images() {
        let (db, _dir) = create_test_db().await;
        let (_mailer, notifier) = recording();
        let accounts = service(db, notifier);
        let user = accounts.login("jo@example.com", "secret1").await.unwrap().user;

        accounts
            .update_profile(
                &user.id,
                ProfileForm {
                    name: Some("Jo Smith".to_string()),
                    phone: Some("0400 111 222".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = accounts
            .update_profile(
                &user.id,
                ProfileForm {
                    name: Some("   ".to_string()),
                    company: Some(" Smith Realty ".to_string()),
                    logo: Some(UploadedImage { bytes: png(4, 4) }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name.as_deref(), Some("Jo Smith"));
        assert_eq!(updated.company.as_deref(), Some("Smith Realty"));
        assert!(updated.logo.unwrap().starts_with("https://media.test/"));
        assert!(updated.photo.is_none());
    }
}
