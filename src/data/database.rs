//! SQLite database operations
//!
//! All database access goes through this module. Every public operation is
//! self-contained: it checks a connection out of the pool (or opens a
//! transaction), does its work and releases it.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use super::models::*;
use crate::error::AppError;

/// How long a writer waits for the write lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection pool wrapper.
///
/// Construction does not touch the schema; call
/// [`Database::ensure_schema_exists`] before using any other operation.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file (and its parent directory) if it doesn't
    /// exist. Connections use WAL mode with foreign keys enforced.
    ///
    /// # Errors
    /// Returns error if the directory can't be created or the connection fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Internal(anyhow::anyhow!(
                    "failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        tracing::info!(path = %path.display(), "Database connected");

        Ok(Self { pool })
    }

    /// Create the schema if it is absent.
    ///
    /// Idempotent; safe to call on every process start.
    pub async fn ensure_schema_exists(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::debug!("Database schema is up to date");
        Ok(())
    }

    // =========================================================================
    // Sites
    // =========================================================================

    /// Insert a site unless it already exists
    ///
    /// # Returns
    /// `true` if a row was inserted, `false` if the site was already known.
    pub async fn add_site(&self, site_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("INSERT OR IGNORE INTO sites (site_id) VALUES (?)")
            .bind(site_id)
            .execute(&self.pool)
            .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            tracing::debug!(site_id, "Added site to database");
        }

        Ok(inserted)
    }

    /// Insert every site that doesn't exist yet, atomically.
    ///
    /// # Returns
    /// Number of sites that were inserted.
    pub async fn add_sites<'a, I>(&self, site_ids: I) -> Result<usize, AppError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for site_id in site_ids {
            let result = sqlx::query("INSERT OR IGNORE INTO sites (site_id) VALUES (?)")
                .bind(site_id)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() > 0 {
                tracing::debug!(site_id, "Added site to database");
                inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Get all known site ids. Order is not significant.
    pub async fn get_all_site_ids(&self) -> Result<Vec<String>, AppError> {
        let site_ids = sqlx::query_scalar::<_, String>("SELECT site_id FROM sites")
            .fetch_all(&self.pool)
            .await?;

        Ok(site_ids)
    }

    // =========================================================================
    // Followers
    // =========================================================================

    /// Add a follower to a site
    ///
    /// The site lookup and the insert are one statement, so concurrent
    /// Follows only ever wait on the write lock. A repeated Follow from the
    /// same actor creates a second row.
    ///
    /// # Arguments
    /// * `site_id` - Site being followed
    /// * `actor_id` - ActivityPub actor id, usually the URL of their profile
    ///
    /// # Returns
    /// The id of the new follower row
    ///
    /// # Errors
    /// `AppError::UnknownSite` if the site was never added
    pub async fn add_follower(&self, site_id: &str, actor_id: &str) -> Result<FollowerId, AppError> {
        // Keep this a single statement: under WAL a deferred transaction
        // that reads before writing gets SQLITE_BUSY without waiting.
        let result = sqlx::query(
            r#"
            INSERT INTO followers (actor_id, site_id, accepted_attempts)
            SELECT ?, site_id, 0 FROM sites WHERE site_id = ?
            "#,
        )
        .bind(actor_id)
        .bind(site_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UnknownSite(site_id.to_string()));
        }

        let id = result.last_insert_rowid();
        tracing::debug!(site_id, actor_id, follower_id = id, "Added follower");

        Ok(id)
    }

    /// Get the actor ids of every follower of a site, oldest first
    ///
    /// # Errors
    /// `AppError::UnknownSite` if the site was never added
    pub async fn get_all_followers_for_site(&self, site_id: &str) -> Result<Vec<String>, AppError> {
        let mut tx = self.pool.begin().await?;

        ensure_site_exists(&mut tx, site_id).await?;

        let actor_ids = sqlx::query_scalar::<_, String>(
            "SELECT actor_id FROM followers WHERE site_id = ? ORDER BY id",
        )
        .bind(site_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(actor_ids)
    }

    /// Get follower by ID
    pub async fn get_follower(&self, id: FollowerId) -> Result<Option<Follower>, AppError> {
        let follower = sqlx::query_as::<_, Follower>(
            "SELECT id, actor_id, site_id, accepted_attempts FROM followers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(follower)
    }

    // =========================================================================
    // Accept handshake
    // =========================================================================

    /// Followers of a site whose Accept has not been delivered yet
    ///
    /// # Errors
    /// `AppError::UnknownSite` if the site was never added
    pub async fn get_pending_accepts(&self, site_id: &str) -> Result<Vec<Follower>, AppError> {
        let mut tx = self.pool.begin().await?;

        ensure_site_exists(&mut tx, site_id).await?;

        let followers = sqlx::query_as::<_, Follower>(
            r#"
            SELECT id, actor_id, site_id, accepted_attempts
            FROM followers
            WHERE site_id = ? AND accepted_attempts IS NOT NULL
            ORDER BY id
            "#,
        )
        .bind(site_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(followers)
    }

    /// Count one more Accept delivery attempt for a pending follower.
    ///
    /// # Returns
    /// `false` if the follower doesn't exist or was already accepted.
    pub async fn record_accept_attempt(&self, id: FollowerId) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE followers
            SET accepted_attempts = accepted_attempts + 1
            WHERE id = ? AND accepted_attempts IS NOT NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark the Accept for a follower as delivered.
    ///
    /// # Returns
    /// `false` if the follower doesn't exist.
    pub async fn mark_accept_delivered(&self, id: FollowerId) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE followers SET accepted_attempts = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn ensure_site_exists(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    site_id: &str,
) -> Result<(), AppError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM sites WHERE site_id = ?")
        .bind(site_id)
        .fetch_optional(&mut **tx)
        .await?
        .is_some();

    if exists {
        Ok(())
    } else {
        Err(AppError::UnknownSite(site_id.to_string()))
    }
}
