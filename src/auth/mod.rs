//! Authentication
//!
//! Handles:
//! - Bearer token issue/verify (HMAC-signed, stateless)
//! - Password hashing
//! - Request extractors for the signed-in user

mod middleware;
mod password;
pub mod session;

pub use middleware::{CurrentUser, MaybeUser};
pub use password::{hash_password, verify_password};
pub use session::{Session, create_session_token, verify_session_token};
