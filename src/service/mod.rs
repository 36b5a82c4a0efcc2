//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the site registry, activity dispatch and the database.

mod inbox;
mod sites;

pub use inbox::{InboxService, PooledTask};
pub use sites::SiteRegistry;
