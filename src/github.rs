//! GitHub API client for repository creation.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::GitHubCredentials;
use crate::error::{ProvisionError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Handle to a freshly created remote repository.
#[derive(Debug, Clone)]
pub struct RepositoryHandle {
    pub web_url: String,
    pub push_url: String,
}

pub struct GitHubClient {
    client: Client,
    base_url: String,
    credentials: GitHubCredentials,
}

impl GitHubClient {
    pub fn new(base_url: &str, credentials: GitHubCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("bot-foundry")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Create an empty repository under the authenticated account.
    pub async fn create_repository(&self, name: &str, private: bool) -> Result<RepositoryHandle> {
        let url = format!("{}/user/repos", self.base_url);
        let req = CreateRepoRequest {
            name,
            private,
            auto_init: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.credentials.token)
            .header("Accept", "application/vnd.github+json")
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        if !matches!(status.as_u16(), 200 | 201) {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::RemoteRejected {
                provider: "github",
                status: status.as_u16(),
                body,
            });
        }

        let repo: CreateRepoResponse = response.json().await?;
        info!("✓ GitHub repository created: {}", repo.html_url);

        Ok(RepositoryHandle {
            push_url: credentialed_push_url(&repo.clone_url, &self.credentials),
            web_url: repo.html_url,
        })
    }
}

/// Embed the account credentials into an https clone URL so the push does
/// not depend on ambient git credential helpers. Other transports (ssh,
/// local paths) carry their own auth and pass through untouched.
pub fn credentialed_push_url(clone_url: &str, credentials: &GitHubCredentials) -> String {
    match clone_url.strip_prefix("https://") {
        Some(rest) => format!(
            "https://{}:{}@{}",
            credentials.username, credentials.token, rest
        ),
        None => clone_url.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Debug, Deserialize)]
struct CreateRepoResponse {
    html_url: String,
    clone_url: String,
}
