//! Session tokens
//!
//! Uses HMAC-signed bearer tokens carrying the user id.
//! No server-side session storage needed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Token payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Id of the signed-in user
    pub user_id: String,
    /// When the token was issued
    pub created_at: DateTime<Utc>,
    /// When the token expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// New session for a user, valid for `max_age_seconds`
    pub fn new(user_id: &str, max_age_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(max_age_seconds),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Create a signed session token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `session` - Session data to encode
/// * `secret` - HMAC secret key
pub fn create_session_token(
    session: &Session,
    secret: &str,
) -> Result<String, crate::error::AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Serialize session to JSON
    let payload =
        serde_json::to_string(session).map_err(|e| crate::error::AppError::Internal(e.into()))?;

    // 2. Base64 encode the payload
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    // 3. Create HMAC-SHA256 signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| crate::error::AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    // 4. Return "{payload}.{signature}"
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a session token
///
/// # Errors
/// `AppError::Unauthorized` if the token is malformed, forged or expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, crate::error::AppError> {
    use crate::error::AppError;
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Split token into payload and signature
    let (payload_b64, signature_b64) = token.split_once('.').ok_or(AppError::Unauthorized)?;

    // 2. Verify HMAC signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;

    mac.verify_slice(&expected_signature)
        .map_err(|_| AppError::Unauthorized)?;

    // 3. Decode and deserialize payload
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;

    let session: Session =
        serde_json::from_slice(&payload_bytes).map_err(|_| AppError::Unauthorized)?;

    // 4. Check if session is expired
    if session.is_expired() {
        return Err(AppError::Unauthorized);
    }

    Ok(session)
}
