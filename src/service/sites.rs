//! Site registry
//!
//! In-memory, authoritative set of the sites this inbox hosts. Filled once
//! at startup and only read afterwards.

use std::collections::{HashMap, HashSet};

use crate::config::SiteConfig;
use crate::data::Database;
use crate::error::AppError;

/// Site registry
#[derive(Debug, Default)]
pub struct SiteRegistry {
    sites: HashMap<String, SiteConfig>,
}

impl SiteRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register sites and persist their ids
    ///
    /// Sites whose id is already registered are left untouched, so calling
    /// this repeatedly with the same list changes nothing.
    ///
    /// # Errors
    /// Returns error if the site ids can't be written to the database. The
    /// in-memory registry is only updated once the write succeeded.
    pub async fn register<I>(&mut self, db: &Database, sites: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = SiteConfig>,
    {
        let mut seen = HashSet::new();
        let new_sites: Vec<SiteConfig> = sites
            .into_iter()
            .filter(|site| !self.sites.contains_key(&site.id) && seen.insert(site.id.clone()))
            .collect();

        let inserted = db
            .add_sites(new_sites.iter().map(|site| site.id.as_str()))
            .await?;

        for site in new_sites {
            tracing::info!(
                site_id = %site.id,
                profile_url = %site.profile_url,
                "Registered site"
            );
            self.sites.insert(site.id.clone(), site);
        }

        tracing::debug!(
            sites = self.sites.len(),
            inserted,
            "Site registration complete"
        );

        Ok(())
    }

    /// Look up a site by its exact, case-sensitive id
    ///
    /// # Errors
    /// `AppError::UnknownSite` if no such site is registered
    pub fn resolve(&self, site_id: &str) -> Result<&SiteConfig, AppError> {
        self.sites
            .get(site_id)
            .ok_or_else(|| AppError::UnknownSite(site_id.to_string()))
    }

    pub fn contains(&self, site_id: &str) -> bool {
        self.sites.contains_key(site_id)
    }

    /// Ids of all registered sites, in no particular order
    pub fn site_ids(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn site(id: &str) -> SiteConfig {
        SiteConfig {
            id: id.to_string(),
            private_key_file: PathBuf::from(format!("{id}/private.pem")),
            public_key_file: PathBuf::from(format!("{id}/public.pem")),
            profile_url: url::Url::parse(&format!("https://{id}.example.com/profile.json"))
                .unwrap(),
        }
    }

    async fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::connect(&temp_dir.path().join("sites.db"))
            .await
            .unwrap();
        db.ensure_schema_exists().await.unwrap();
        (db, temp_dir)
    }

    #[tokio::test]
    async fn register_makes_sites_resolvable() {
        let (db, _temp_dir) = create_test_db().await;
        let mut registry = SiteRegistry::new();

        registry
            .register(&db, [site("roclongboarding"), site("troop53stories")])
            .await
            .unwrap();

        assert!(registry.contains("roclongboarding"));
        assert!(registry.contains("troop53stories"));
        assert_eq!(
            registry.resolve("roclongboarding").unwrap(),
            &site("roclongboarding")
        );

        let mut stored = db.get_all_site_ids().await.unwrap();
        stored.sort();
        assert_eq!(stored, vec!["roclongboarding", "troop53stories"]);
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let (db, _temp_dir) = create_test_db().await;
        let mut registry = SiteRegistry::new();

        registry.register(&db, [site("a"), site("b")]).await.unwrap();
        let mut first = db.get_all_site_ids().await.unwrap();
        first.sort();

        registry.register(&db, [site("a"), site("b")]).await.unwrap();
        let mut second = db.get_all_site_ids().await.unwrap();
        second.sort();

        assert_eq!(registry.len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn register_keeps_the_first_definition() {
        let (db, _temp_dir) = create_test_db().await;
        let mut registry = SiteRegistry::new();

        let original = site("a");
        let mut changed = site("a");
        changed.profile_url = url::Url::parse("https://changed.example.com/").unwrap();

        registry.register(&db, [original.clone()]).await.unwrap();
        registry.register(&db, [changed]).await.unwrap();

        assert_eq!(registry.resolve("a").unwrap(), &original);
    }

    #[tokio::test]
    async fn register_tolerates_sites_already_in_the_database() {
        let (db, _temp_dir) = create_test_db().await;
        db.add_site("a").await.unwrap();

        let mut registry = SiteRegistry::new();
        registry.register(&db, [site("a")]).await.unwrap();

        assert!(registry.contains("a"));
        assert_eq!(db.get_all_site_ids().await.unwrap(), vec!["a"]);
    }

    #[test]
    fn resolve_is_case_sensitive() {
        let registry = SiteRegistry {
            sites: HashMap::from([("roclongboarding".to_string(), site("roclongboarding"))]),
        };

        assert!(registry.resolve("roclongboarding").is_ok());
        assert!(matches!(
            registry.resolve("RocLongboarding"),
            Err(AppError::UnknownSite(site)) if site == "RocLongboarding"
        ));
        assert!(!registry.contains("ghost"));
    }
}
