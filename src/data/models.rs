//! Data models
//!
//! Rust structs representing database rows.

use serde::{Deserialize, Serialize};

/// Store-assigned follower id. Strictly increasing and never reused.
pub type FollowerId = i64;

// =============================================================================
// Follower
// =============================================================================

/// A remote actor that sent a Follow to one of our sites
///
/// `(site_id, actor_id)` is not unique: a repeated Follow creates another row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follower {
    pub id: FollowerId,
    /// ActivityPub actor id, usually the URL of the remote profile
    pub actor_id: String,
    pub site_id: String,
    /// Number of attempts made to deliver our Accept.
    /// `None` once the Accept has been delivered.
    pub accepted_attempts: Option<i64>,
}

impl Follower {
    /// Whether the accept handshake with the remote actor has completed
    pub fn is_accepted(&self) -> bool {
        self.accepted_attempts.is_none()
    }
}
