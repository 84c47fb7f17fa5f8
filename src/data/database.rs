//! SQLite database operations
//!
//! All database access goes through this module. Listings keep their
//! sub-documents in JSON columns; per-user reference sets and analytics logs
//! live in their own tables so that every mutation is a single atomic
//! statement.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Pool, QueryBuilder, Sqlite, SqlitePool};

use super::filter::{ListingFilter, ListingSort, PageRequest};
use super::models::*;
use crate::error::AppError;

const LISTING_SELECT: &str = "SELECT listings.id, listings.slug, listings.title, \
    listings.description, listings.address, listings.property_type, listings.action, \
    listings.status, listings.furnishing_status, listings.possession_status, \
    listings.construction_age, listings.inspection_time, listings.published, \
    listings.longitude, listings.latitude, listings.photos, listings.virtual_tour, \
    listings.locality, listings.property_details, listings.amenities, listings.features, \
    listings.pricing, listings.legal, listings.posted_by, listings.views_total, \
    (SELECT COUNT(*) FROM listing_viewers WHERE listing_id = listings.id) AS unique_viewers, \
    (SELECT COUNT(*) FROM listing_contact_requests WHERE listing_id = listings.id) AS contact_requests, \
    (SELECT COUNT(*) FROM listing_shortlists WHERE listing_id = listings.id) AS shortlists, \
    listings.last_viewed_at, listings.is_verified, listings.verified_by, listings.verified_at, \
    listings.is_featured, listings.featured_from, listings.featured_until, \
    listings.created_at, listings.updated_at \
    FROM listings";

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

/// Whether a listing write was rejected because another listing holds its slug
pub fn is_slug_conflict(error: &AppError) -> bool {
    if let AppError::Database(sqlx::Error::Database(db_err)) = error
        && db_err.is_unique_violation()
    {
        return db_err.message().contains("listings.slug");
    }
    false
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Insert a new listing
    ///
    /// `geocoder_payload` is the raw provider response kept for reference;
    /// it is never returned to clients.
    pub async fn insert_listing(
        &self,
        listing: &Listing,
        geocoder_payload: &serde_json::Value,
    ) -> Result<(), AppError> {
        let point = listing.location.point();
        let [unit_x, unit_y, unit_z] = point.unit_vector();

        sqlx::query(
            r#"
            INSERT INTO listings (
                id, slug, title, description, address, property_type, action, status,
                furnishing_status, possession_status, construction_age, inspection_time,
                published, longitude, latitude, unit_x, unit_y, unit_z, geocoder_payload,
                photos, virtual_tour, locality, property_details, amenities, features,
                pricing, legal, posted_by, views_total, is_verified, is_featured,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                    ?, ?, ?, 0, 0, 0, ?, ?)
            "#,
        )
        .bind(&listing.id)
        .bind(&listing.slug)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.address)
        .bind(listing.property_type)
        .bind(listing.action)
        .bind(listing.status)
        .bind(listing.furnishing_status)
        .bind(listing.possession_status)
        .bind(listing.construction_age)
        .bind(&listing.inspection_time)
        .bind(listing.published)
        .bind(point.longitude)
        .bind(point.latitude)
        .bind(unit_x)
        .bind(unit_y)
        .bind(unit_z)
        .bind(Json(geocoder_payload))
        .bind(Json(&listing.photos))
        .bind(listing.virtual_tour.as_ref().map(Json))
        .bind(Json(&listing.locality))
        .bind(Json(&listing.property_details))
        .bind(Json(&listing.amenities))
        .bind(Json(&listing.features))
        .bind(Json(&listing.pricing))
        .bind(Json(&listing.legal))
        .bind(&listing.posted_by)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Rewrite the owner-editable fields of a listing
    ///
    /// Identity, owner, analytics and creation time are left untouched.
    /// The geocoder payload is only replaced when one is given.
    pub async fn update_listing(
        &self,
        listing: &Listing,
        geocoder_payload: Option<&serde_json::Value>,
    ) -> Result<(), AppError> {
        let point = listing.location.point();
        let [unit_x, unit_y, unit_z] = point.unit_vector();

        let result = sqlx::query(
            r#"
            UPDATE listings SET
                slug = ?, title = ?, description = ?, address = ?, property_type = ?,
                action = ?, status = ?, furnishing_status = ?, possession_status = ?,
                construction_age = ?, inspection_time = ?, published = ?,
                longitude = ?, latitude = ?, unit_x = ?, unit_y = ?, unit_z = ?,
                geocoder_payload = COALESCE(?, geocoder_payload),
                photos = ?, virtual_tour = ?, locality = ?, property_details = ?,
                amenities = ?, features = ?, pricing = ?, legal = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&listing.slug)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.address)
        .bind(listing.property_type)
        .bind(listing.action)
        .bind(listing.status)
        .bind(listing.furnishing_status)
        .bind(listing.possession_status)
        .bind(listing.construction_age)
        .bind(&listing.inspection_time)
        .bind(listing.published)
        .bind(point.longitude)
        .bind(point.latitude)
        .bind(unit_x)
        .bind(unit_y)
        .bind(unit_z)
        .bind(geocoder_payload.map(Json))
        .bind(Json(&listing.photos))
        .bind(listing.virtual_tour.as_ref().map(Json))
        .bind(Json(&listing.locality))
        .bind(Json(&listing.property_details))
        .bind(Json(&listing.amenities))
        .bind(Json(&listing.features))
        .bind(Json(&listing.pricing))
        .bind(Json(&listing.legal))
        .bind(listing.updated_at)
        .bind(&listing.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Ad"));
        }

        Ok(())
    }

    /// Replace the market status of a listing
    pub async fn update_listing_status(
        &self,
        id: &str,
        status: ListingStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE listings SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete a listing permanently
    ///
    /// Analytics logs and user reference-set entries cascade.
    pub async fn delete_listing(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_listing_by_slug(&self, slug: &str) -> Result<Option<Listing>, AppError> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "{LISTING_SELECT} WHERE listings.slug = ?"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Listing::from))
    }

    pub async fn get_listing(&self, id: &str) -> Result<Option<Listing>, AppError> {
        let row = sqlx::query_as::<_, ListingRow>(&format!("{LISTING_SELECT} WHERE listings.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Listing::from))
    }

    pub async fn slug_exists(&self, slug: &str) -> Result<bool, AppError> {
        let exists =
            sqlx::query_scalar::<_, i64>("SELECT EXISTS(SELECT 1 FROM listings WHERE slug = ?)")
                .bind(slug)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists != 0)
    }

    /// Fetch one page of listings matching a filter
    pub async fn find_listings(
        &self,
        filter: &ListingFilter,
        sort: &ListingSort,
        page: PageRequest,
    ) -> Result<Vec<Listing>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(LISTING_SELECT);
        filter.push_where(&mut builder);
        sort.push_order_by(&mut builder);
        builder.push(" LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder
            .build_query_as::<ListingRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Listing::from).collect())
    }

    /// Count listings matching a filter
    pub async fn count_listings(&self, filter: &ListingFilter) -> Result<i64, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM listings");
        filter.push_where(&mut builder);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Listing analytics
    // =========================================================================

    /// Increment the view counter and record a signed-in viewer
    pub async fn record_view(
        &self,
        listing_id: &str,
        viewer_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE listings SET views_total = views_total + 1, last_viewed_at = ? WHERE id = ?",
        )
        .bind(at)
        .bind(listing_id)
        .execute(&self.pool)
        .await?;

        if let Some(viewer_id) = viewer_id {
            sqlx::query("INSERT OR IGNORE INTO listing_viewers (listing_id, user_id) VALUES (?, ?)")
                .bind(listing_id)
                .bind(viewer_id)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    pub async fn append_contact_request(
        &self,
        listing_id: &str,
        user_id: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO listing_contact_requests (id, listing_id, user_id, message, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(EntityId::new().0)
        .bind(listing_id)
        .bind(user_id)
        .bind(message)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a user together with its roles
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, username, password_hash, name, phone, company, address, about,
                photo, logo, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.company)
        .bind(&user.address)
        .bind(&user.about)
        .bind(&user.photo)
        .bind(&user.logo)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await?;

        for role in &user.roles {
            sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
                .bind(&user.id)
                .bind(*role)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn hydrate_user(&self, row: UserRow) -> Result<User, AppError> {
        let roles = sqlx::query_scalar::<_, Role>(
            "SELECT role FROM user_roles WHERE user_id = ? ORDER BY rowid",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;
        let wishlist = self.get_user_set_ids(&row.id, "wishlist_items").await?;
        let enquired = self.get_user_set_ids(&row.id, "enquired_listings").await?;

        Ok(row.into_user(roles, wishlist, enquired))
    }

    async fn get_user_set_ids(&self, user_id: &str, table: &str) -> Result<Vec<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>(&format!(
            "SELECT listing_id FROM {table} WHERE user_id = ? ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_user(row).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_user(row).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_user_id_by_username(&self, username: &str) -> Result<Option<String>, AppError> {
        let id = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(id)
    }

    /// Find the user holding an unexpired reset token
    pub async fn get_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE reset_password_token = ? AND reset_password_expires_at > ?",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_user(row).await?)),
            None => Ok(None),
        }
    }

    /// Public owner projections keyed by user id
    pub async fn get_owners(&self, ids: &[String]) -> Result<HashMap<String, PublicOwner>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, name, username, email, phone, company, photo, logo FROM users WHERE id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let owners = builder
            .build_query_as::<PublicOwner>()
            .fetch_all(&self.pool)
            .await?;

        Ok(owners
            .into_iter()
            .map(|owner| (owner.id.clone(), owner))
            .collect())
    }

    /// Add a role (set semantics)
    pub async fn add_role(&self, user_id: &str, role: Role) -> Result<(), AppError> {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
            .bind(user_id)
            .bind(role)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET password_hash = ?, reset_password_token = NULL, \
             reset_password_expires_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(password_hash)
        .bind(updated_at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store (or clear, with `None`) a password reset token
    pub async fn set_reset_token(
        &self,
        user_id: &str,
        token: Option<(&str, DateTime<Utc>)>,
    ) -> Result<(), AppError> {
        let (token, expires_at) = match token {
            Some((token, expires_at)) => (Some(token), Some(expires_at)),
            None => (None, None),
        };

        sqlx::query(
            "UPDATE users SET reset_password_token = ?, reset_password_expires_at = ? WHERE id = ?",
        )
        .bind(token)
        .bind(expires_at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_username(
        &self,
        user_id: &str,
        username: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET username = ?, updated_at = ? WHERE id = ?")
            .bind(username)
            .bind(updated_at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Apply profile changes; absent fields keep their stored value
    pub async fn update_profile(
        &self,
        user_id: &str,
        changes: &ProfileChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                phone = COALESCE(?, phone),
                company = COALESCE(?, company),
                address = COALESCE(?, address),
                about = COALESCE(?, about),
                photo = COALESCE(?, photo),
                logo = COALESCE(?, logo),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.name)
        .bind(&changes.phone)
        .bind(&changes.company)
        .bind(&changes.address)
        .bind(&changes.about)
        .bind(&changes.photo)
        .bind(&changes.logo)
        .bind(updated_at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Reference sets
    // =========================================================================

    /// Flip wishlist membership
    ///
    /// Runs in one write transaction so concurrent toggles of the same item
    /// apply one after the other. Adding also appends a shortlist entry to
    /// the listing's analytics.
    ///
    /// # Returns
    /// `true` if this call added the listing, `false` if it removed it
    pub async fn toggle_wishlist(
        &self,
        user_id: &str,
        listing_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM wishlist_items WHERE user_id = ? AND listing_id = ?")
            .bind(user_id)
            .bind(listing_id)
            .execute(&mut *tx)
            .await?;

        let added = if removed.rows_affected() > 0 {
            false
        } else {
            let inserted = sqlx::query(
                "INSERT OR IGNORE INTO wishlist_items (user_id, listing_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(listing_id)
            .bind(at)
            .execute(&mut *tx)
            .await?;
            inserted.rows_affected() > 0
        };

        if added {
            sqlx::query(
                "INSERT INTO listing_shortlists (id, listing_id, user_id, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(EntityId::new().0)
            .bind(listing_id)
            .bind(user_id)
            .bind(at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(added)
    }

    pub async fn get_wishlist_ids(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        self.get_user_set_ids(user_id, "wishlist_items").await
    }

    /// Add to the enquired set (no-op if already present)
    ///
    /// # Returns
    /// `true` if the listing was newly added
    pub async fn add_enquired(
        &self,
        user_id: &str,
        listing_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO enquired_listings (user_id, listing_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(listing_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
