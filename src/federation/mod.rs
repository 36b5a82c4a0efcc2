//! ActivityPub federation module
//!
//! Handles:
//! - ActivityStreams object shapes (inbound activities, collections)
//! - Activity classification and dispatch

mod activity;
pub mod dispatcher;

pub use activity::{Activity, ActivityType, OrderedCollection};
pub use dispatcher::{InboxAction, classify, route};
