//! Data layer module
//!
//! Handles all data persistence:
//! - Listing and user models
//! - Listing filters translated to SQL
//! - SQLite database operations

mod database;
mod filter;
mod models;

pub use database::{Database, is_slug_conflict};
pub use filter::{
    Collection, Condition, EARTH_RADIUS_KM, Field, ListingFilter, ListingSort, PageRequest,
    UserSet,
};
pub use models::*;
