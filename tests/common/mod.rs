//! Common test utilities for E2E tests

use rookery::{AppState, config};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

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
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            database: config::DatabaseConfig { path: db_path },
            limits: config::LimitsConfig {
                max_body_bytes: 1024 * 1024,
                default_page_size: 20,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).await.unwrap();
        let app = rookery::build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();

        Self {
            addr,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Build a full URL for a path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Register a user through the API; returns their ID.
    pub async fn register_user(&self, username: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/v1/accounts"))
            .json(&serde_json::json!({ "username": username }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201, "registering {username} failed");

        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    /// POST with the gateway-asserted caller identity header.
    pub fn post_as(&self, user_id: &str, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("X-User-Id", user_id)
    }

    /// GET with the gateway-asserted caller identity header.
    pub fn get_as(&self, user_id: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).header("X-User-Id", user_id)
    }

    /// DELETE with the gateway-asserted caller identity header.
    pub fn delete_as(&self, user_id: &str, path: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(self.url(path))
            .header("X-User-Id", user_id)
    }

    /// Create a group as `leader_id`; returns the group ID.
    pub async fn create_group(&self, leader_id: &str, name: &str) -> String {
        let response = self
            .post_as(leader_id, "/api/v1/groups")
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201, "creating group {name} failed");

        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    /// Create a post as `author_id`; returns the post ID.
    pub async fn create_post(&self, author_id: &str, content: &str, visibility: &str) -> String {
        let response = self
            .post_as(author_id, "/api/v1/posts")
            .json(&serde_json::json!({ "content": content, "visibility": visibility }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201, "creating post failed");

        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    /// Make two users friends via mutual requests (auto-accept).
    pub async fn befriend(&self, a: &str, b: &str) {
        let response = self
            .post_as(a, &format!("/api/v1/friendships/{b}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let response = self
            .post_as(b, &format!("/api/v1/friendships/{a}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "accepted");
    }
}
