//! Common test utilities for E2E tests

use std::path::PathBuf;

use activitypub_inbox::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Sites every test server hosts
pub const TEST_SITES: [&str; 2] = ["roclongboarding", "troop53stories"];

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        activitypub_inbox::metrics::init_metrics();

        // Temporary directory for the database and the site keys
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let key_dir = temp_dir.path().join("keys");

        let sites = TEST_SITES
            .iter()
            .map(|site| {
                let site_dir = key_dir.join(site);
                std::fs::create_dir_all(&site_dir).unwrap();
                std::fs::write(site_dir.join("private.pem"), "test_private_key").unwrap();
                std::fs::write(site_dir.join("public.pem"), "test_public_key").unwrap();

                config::SiteConfigEntry {
                    id: Some(site.to_string()),
                    private_key_file: Some(PathBuf::from(format!("{site}/private.pem"))),
                    public_key_file: Some(PathBuf::from(format!("{site}/public.pem"))),
                    profile_url: Some(format!("https://{site}.example.com/activitypub/profile.json")),
                }
            })
            .collect();

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            database: config::DatabaseConfig { path: db_path },
            inbox: config::InboxConfig {
                max_concurrent_operations: 4,
                base_key_directory: Some(key_dir),
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            sites,
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = activitypub_inbox::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// POST an activity to a site's inbox
    pub async fn post_activity(&self, site_id: &str, activity: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/{site_id}/inbox")))
            .header("Content-Type", "application/activity+json")
            .json(activity)
            .send()
            .await
            .unwrap()
    }

    /// Current value of a counter sample on /metrics, `0` when absent
    ///
    /// `sample` is the full series name with labels, e.g.
    /// `actpub_inbox_followers_added_total{site_id="roclongboarding"}`.
    pub async fn counter_value(&self, sample: &str) -> u64 {
        let body = self
            .client
            .get(self.url("/metrics"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        body.lines()
            .filter_map(|line| line.strip_prefix(sample))
            .filter_map(|rest| rest.strip_prefix(' '))
            .map(|value| value.trim().parse::<f64>().unwrap() as u64)
            .next()
            .unwrap_or(0)
    }
}
