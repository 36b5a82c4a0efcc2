//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{AppError, ValidationErrors};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub inbox: InboxConfig,
    pub logging: LoggingConfig,
    /// Sites hosted by this inbox (`[[sites]]` tables)
    #[serde(default)]
    pub sites: Vec<SiteConfigEntry>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file holding sites and followers
    pub path: PathBuf,
}

/// Inbox behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct InboxConfig {
    /// Upper bound on inbox operations running at the same time
    pub max_concurrent_operations: usize,
    /// Directory relative key file paths are resolved against
    pub base_key_directory: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// `EnvFilter` directives applying `level` to this crate and the HTTP
    /// trace layer
    pub fn filter_directives(&self) -> String {
        let level = self.level.trim().to_ascii_lowercase();
        format!("activitypub_inbox={level},tower_http={level}")
    }

    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }

    fn try_validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.level.trim().parse::<tracing::Level>().is_err() {
            errors.push(format!(
                "logging.level '{}' must be one of trace, debug, info, warn, error",
                self.level
            ));
        }
        if !self.is_json() && !self.format.trim().eq_ignore_ascii_case("pretty") {
            errors.push(format!(
                "logging.format '{}' must be \"pretty\" or \"json\"",
                self.format
            ));
        }

        errors
    }
}

/// A site as written in the configuration file
///
/// Every field is optional here so that all missing fields can be reported
/// at once by [`SiteConfig::from_entry`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteConfigEntry {
    pub id: Option<String>,
    pub private_key_file: Option<PathBuf>,
    pub public_key_file: Option<PathBuf>,
    pub profile_url: Option<String>,
}

/// Identity of one hosted actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Stable tenant key, used in inbox URLs and as the database key
    pub id: String,
    pub private_key_file: PathBuf,
    pub public_key_file: PathBuf,
    pub profile_url: Url,
}

impl SiteConfig {
    /// Build a site from its configuration entry
    ///
    /// Relative key paths are resolved against `base_key_directory` when
    /// one is given.
    ///
    /// # Errors
    /// Every missing field and an unparsable profile URL, reported together
    pub fn from_entry(
        entry: &SiteConfigEntry,
        base_key_directory: Option<&Path>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = Vec::new();

        let resolve = |path: &PathBuf| match base_key_directory {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.clone(),
        };

        let private_key_file = entry.private_key_file.as_ref().map(resolve);
        let public_key_file = entry.public_key_file.as_ref().map(resolve);

        let profile_url = match entry.profile_url.as_deref() {
            Some(raw) => match Url::parse(raw) {
                Ok(url) => Some(url),
                Err(error) => {
                    errors.push(format!("profile_url '{raw}' is not a valid URL: {error}"));
                    None
                }
            },
            None => None,
        };

        if private_key_file.is_none() {
            errors.push("missing private_key_file".to_string());
        }
        if public_key_file.is_none() {
            errors.push("missing public_key_file".to_string());
        }
        if entry.profile_url.is_none() {
            errors.push("missing profile_url".to_string());
        }
        if entry.id.is_none() {
            errors.push("missing id".to_string());
        }

        match (entry.id.clone(), private_key_file, public_key_file, profile_url) {
            (Some(id), Some(private_key_file), Some(public_key_file), Some(profile_url))
                if errors.is_empty() =>
            {
                Ok(Self {
                    id,
                    private_key_file,
                    public_key_file,
                    profile_url,
                })
            }
            _ => Err(ValidationErrors {
                context: "Invalid site configuration".to_string(),
                errors,
            }),
        }
    }

    /// All problems with this site, empty when it is valid
    pub fn try_validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.private_key_file.is_file() {
            errors.push(format!(
                "{} does not exist",
                self.private_key_file.display()
            ));
        }

        if !self.public_key_file.is_file() {
            errors.push(format!("{} does not exist", self.public_key_file.display()));
        }

        if self.id.trim().is_empty() {
            errors.push("site id can not be empty or whitespace".to_string());
        }

        errors
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        ValidationErrors::check(
            format!("Errors found when validating site '{}'", self.id),
            self.try_validate(),
        )
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (ACTPUB_INBOX__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/actpub.db")?
            .set_default("inbox.max_concurrent_operations", 16)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (ACTPUB_INBOX__*)
            .add_source(
                Environment::with_prefix("ACTPUB_INBOX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Build and validate every configured site
    ///
    /// Problems across all sites are collected into one
    /// [`AppError::InvalidConfig`] instead of stopping at the first.
    pub fn site_configs(&self) -> Result<Vec<SiteConfig>, AppError> {
        let base_key_directory = self.inbox.base_key_directory.as_deref();
        let mut errors = Vec::new();
        let mut sites = Vec::with_capacity(self.sites.len());
        let mut seen = HashSet::new();

        for (index, entry) in self.sites.iter().enumerate() {
            let label = entry
                .id
                .clone()
                .unwrap_or_else(|| format!("#{}", index + 1));

            match SiteConfig::from_entry(entry, base_key_directory) {
                Ok(site) => {
                    errors.extend(
                        site.try_validate()
                            .into_iter()
                            .map(|error| format!("site '{label}': {error}")),
                    );
                    if !seen.insert(site.id.clone()) {
                        errors.push(format!("site '{label}' is configured more than once"));
                    }
                    sites.push(site);
                }
                Err(invalid) => errors.extend(
                    invalid
                        .errors
                        .into_iter()
                        .map(|error| format!("site '{label}': {error}")),
                ),
            }
        }

        ValidationErrors::check("Errors when validating site configuration", errors)?;
        Ok(sites)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.inbox.max_concurrent_operations == 0 {
            return Err(AppError::Config(
                "inbox.max_concurrent_operations must be greater than 0".to_string(),
            ));
        }

        ValidationErrors::check(
            "Errors when validating logging configuration",
            self.logging.try_validate(),
        )?;

        self.site_configs()?;
        Ok(())
    }
}
