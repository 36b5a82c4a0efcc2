//! Activity dispatch
//!
//! Classifies an inbound activity by its declared type and decides what the
//! inbox should do with it. The accepted vocabulary is a closed set: a new
//! activity type needs a new `ActivityType` variant and a new arm here.

use super::activity::{Activity, ActivityType};
use crate::error::AppError;

/// What the inbox should do with an accepted activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxAction {
    /// Record `actor_id` as a follower of the site
    AddFollower { actor_id: String },
    /// Acknowledge an Undo. Nothing is reversed yet.
    Undo { object_type: Option<ActivityType> },
    /// Accept and log, no state change
    Acknowledge(ActivityType),
}

impl InboxAction {
    /// Type of the activity this action was derived from
    pub fn activity_type(&self) -> ActivityType {
        match self {
            Self::AddFollower { .. } => ActivityType::Follow,
            Self::Undo { .. } => ActivityType::Undo,
            Self::Acknowledge(kind) => kind.clone(),
        }
    }
}

/// Classify an activity by the first entry of its `type`
///
/// # Errors
/// - `InvalidActivity` when the type is missing or blank
/// - `UnsupportedActivityType` carrying the offending type otherwise
pub fn classify(activity: &Activity) -> Result<ActivityType, AppError> {
    let raw = activity
        .first_type()
        .ok_or_else(|| AppError::InvalidActivity("missing type field".to_string()))?;

    match ActivityType::parse(raw) {
        ActivityType::Unrecognized(raw) => Err(AppError::UnsupportedActivityType(raw)),
        kind => Ok(kind),
    }
}

/// Classify an activity and pick the action for it
pub fn route(activity: &Activity) -> Result<InboxAction, AppError> {
    let action = match classify(activity)? {
        ActivityType::Follow => {
            let actor_id = activity
                .actor_id()
                .ok_or_else(|| AppError::InvalidActivity("missing actor field".to_string()))?;
            InboxAction::AddFollower {
                actor_id: actor_id.to_string(),
            }
        }
        ActivityType::Undo => InboxAction::Undo {
            object_type: activity.object_type(),
        },
        kind @ (ActivityType::Like | ActivityType::Announce | ActivityType::Dislike) => {
            InboxAction::Acknowledge(kind)
        }
        ActivityType::Unrecognized(raw) => return Err(AppError::UnsupportedActivityType(raw)),
    };

    Ok(action)
}
