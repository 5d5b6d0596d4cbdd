//! Render API client for hosted-service registration.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RenderCredentials;
use crate::error::{ProvisionError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.render.com/v1";

/// Handle to a registered hosted service.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    pub id: String,
    pub status: String,
}

pub struct RenderClient {
    client: Client,
    base_url: String,
    credentials: RenderCredentials,
}

impl RenderClient {
    pub fn new(base_url: &str, credentials: RenderCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Register a dockerized web service deploying `repo_url`'s main branch.
    pub async fn create_service(&self, repo_url: &str, name: &str) -> Result<ServiceHandle> {
        let url = format!("{}/services", self.base_url);
        let req = CreateServiceRequest {
            owner_id: &self.credentials.owner_id,
            name,
            service_type: "web_service",
            repo: repo_url,
            branch: "main",
            auto_deploy: true,
            root_dir: ".",
            env_vars: vec![
                EnvVar {
                    key: "PORT",
                    value: "8000",
                },
                EnvVar {
                    key: "MODE",
                    value: "paper",
                },
            ],
            region: "oregon",
            service_details: ServiceDetails {
                env: "docker",
                plan: "starter",
                health_check_path: "/status",
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.credentials.api_key)
            .header("Accept", "application/json")
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        if !matches!(status.as_u16(), 200 | 201) {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::RemoteRejected {
                provider: "render",
                status: status.as_u16(),
                body,
            });
        }

        let created: CreateServiceResponse = response.json().await?;
        info!("✓ Render service created: {}", created.id);

        Ok(ServiceHandle {
            id: created.id,
            status: created.status.unwrap_or_else(|| "created".to_string()),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateServiceRequest<'a> {
    owner_id: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    service_type: &'a str,
    repo: &'a str,
    branch: &'a str,
    auto_deploy: bool,
    root_dir: &'a str,
    env_vars: Vec<EnvVar<'a>>,
    region: &'a str,
    service_details: ServiceDetails<'a>,
}

#[derive(Debug, Serialize)]
struct EnvVar<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDetails<'a> {
    env: &'a str,
    plan: &'a str,
    health_check_path: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateServiceResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
}
