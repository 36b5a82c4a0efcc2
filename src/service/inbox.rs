//! Inbox service
//!
//! The single entry point used by the HTTP layer. Composes the site
//! registry, the activity dispatcher and the follower store.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::sites::SiteRegistry;
use crate::config::SiteConfig;
use crate::data::{Database, FollowerId};
use crate::error::AppError;
use crate::federation::{self, Activity, ActivityType, InboxAction, OrderedCollection};
use crate::metrics::{ACTIVITIES_RECEIVED, FOLLOWERS_ADDED};

/// Inbox service
pub struct InboxService {
    db: Arc<Database>,
    sites: SiteRegistry,
    workers: Arc<Semaphore>,
}

impl InboxService {
    /// Prepare the store and register the configured sites
    ///
    /// # Steps
    /// 1. Create the database schema if needed
    /// 2. Register every configured site (idempotent)
    ///
    /// The service only exists once both steps completed, so nothing can
    /// reach the store before its schema is in place.
    ///
    /// # Arguments
    /// * `max_concurrent_operations` - Permits for the `spawn_*` entry points
    pub async fn init(
        db: Arc<Database>,
        sites: Vec<SiteConfig>,
        max_concurrent_operations: usize,
    ) -> Result<Self, AppError> {
        db.ensure_schema_exists().await?;

        let mut registry = SiteRegistry::new();
        registry.register(&db, sites).await?;

        tracing::info!(
            sites = registry.len(),
            max_concurrent_operations,
            "Inbox initialized"
        );

        Ok(Self {
            db,
            sites: registry,
            workers: Arc::new(Semaphore::new(max_concurrent_operations)),
        })
    }

    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }

    /// Handle an activity posted to a site's inbox
    ///
    /// # Errors
    /// - `UnknownSite` if the site isn't registered
    /// - `InvalidActivity` / `UnsupportedActivityType` if dispatch rejects it
    /// - `Database` if recording a follower fails
    pub async fn handle_activity(&self, site_id: &str, activity: &Activity) -> Result<(), AppError> {
        let site = self.sites.resolve(site_id)?;

        let action = match federation::route(activity) {
            Ok(action) => action,
            Err(error) => {
                let activity_type = activity.first_type().unwrap_or("<missing>");
                tracing::info!(
                    site_id,
                    activity_type,
                    %error,
                    "Rejected activity"
                );
                ACTIVITIES_RECEIVED
                    .with_label_values(&[rejected_type_label(&error), "rejected"])
                    .inc();
                return Err(error);
            }
        };

        let activity_type = action.activity_type();
        match action {
            InboxAction::AddFollower { actor_id } => {
                let follower_id = self.add_follower(site, &actor_id).await?;
                tracing::info!(
                    site_id,
                    actor_id = %actor_id,
                    follower_id,
                    "New follower"
                );
            }
            InboxAction::Undo { object_type } => self.handle_undo(site, activity, object_type),
            InboxAction::Acknowledge(kind) => {
                tracing::info!(
                    site_id,
                    activity_type = %kind,
                    actor_id = activity.actor_id().unwrap_or("<unknown>"),
                    "Activity acknowledged"
                );
            }
        }

        ACTIVITIES_RECEIVED
            .with_label_values(&[activity_type.as_str(), "accepted"])
            .inc();

        Ok(())
    }

    /// Get the activities collection of a site
    ///
    /// Always empty for now; no follower rows are read back into it.
    pub async fn get_activities(&self, site_id: &str) -> Result<OrderedCollection, AppError> {
        self.sites.resolve(site_id)?;
        Ok(OrderedCollection::empty())
    }

    /// Get the actor ids following a site, oldest first
    pub async fn get_followers(&self, site_id: &str) -> Result<Vec<String>, AppError> {
        let site = self.sites.resolve(site_id)?;
        self.db.get_all_followers_for_site(&site.id).await
    }

    /// Run [`InboxService::handle_activity`] on the worker pool
    ///
    /// The work starts immediately and keeps running if the returned future
    /// is dropped.
    pub fn spawn_handle_activity(
        self: &Arc<Self>,
        site_id: String,
        activity: Activity,
    ) -> PooledTask<()> {
        let service = Arc::clone(self);
        self.spawn_pooled(async move { service.handle_activity(&site_id, &activity).await })
    }

    /// Run [`InboxService::get_activities`] on the worker pool
    pub fn spawn_get_activities(self: &Arc<Self>, site_id: String) -> PooledTask<OrderedCollection> {
        let service = Arc::clone(self);
        self.spawn_pooled(async move { service.get_activities(&site_id).await })
    }

    fn spawn_pooled<T, F>(&self, work: F) -> PooledTask<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let workers = Arc::clone(&self.workers);
        let handle = tokio::spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|e| AppError::Internal(e.into()))?;
            work.await
        });

        PooledTask { handle }
    }

    async fn add_follower(&self, site: &SiteConfig, actor_id: &str) -> Result<FollowerId, AppError> {
        let follower_id = self.db.add_follower(&site.id, actor_id).await?;
        FOLLOWERS_ADDED.with_label_values(&[site.id.as_str()]).inc();
        Ok(follower_id)
    }

    /// Undo is acknowledged but nothing is reversed yet. Reverting a Follow
    /// would remove the follower row here.
    fn handle_undo(&self, site: &SiteConfig, activity: &Activity, object_type: Option<ActivityType>) {
        tracing::info!(
            site_id = %site.id,
            actor_id = activity.actor_id().unwrap_or("<unknown>"),
            object_type = object_type.as_ref().map(ActivityType::as_str).unwrap_or("<unknown>"),
            "Undo acknowledged without reversal"
        );
    }
}

fn rejected_type_label(error: &AppError) -> &'static str {
    match error {
        AppError::UnsupportedActivityType(_) => "unsupported",
        _ => "invalid",
    }
}

/// Result of an inbox operation running on the worker pool
///
/// Dropping it detaches the task rather than cancelling it.
#[must_use = "the result of the inbox operation is only available by awaiting it"]
pub struct PooledTask<T> {
    handle: JoinHandle<Result<T, AppError>>,
}

impl<T> Future for PooledTask<T> {
    type Output = Result<T, AppError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_error)) => Poll::Ready(Err(AppError::Internal(join_error.into()))),
            Poll::Pending => Poll::Pending,
        }
    }
}
