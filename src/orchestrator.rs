//! Provisioning pipeline: scaffold, remote repository, hosted service.
//!
//! Stages run strictly in sequence; each later stage consumes the previous
//! stage's output. Remote stages skip when their credentials are absent and
//! their failures never abort the run; only a scaffold failure does, since
//! nothing downstream is meaningful without the local project.

use std::path::Path;

use tracing::{error, info, warn};

use crate::config::{BotSpec, Credentials};
use crate::error::ProvisionError;
use crate::git;
use crate::github::{GitHubClient, RepositoryHandle};
use crate::outcome::{self, RunReport, StageOutcome};
use crate::render::{RenderClient, ServiceHandle};
use crate::scaffold::Scaffolder;

/// Remote API endpoints, overridable for tests.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub github_api: String,
    pub render_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            github_api: crate::github::DEFAULT_API_BASE.to_string(),
            render_api: crate::render::DEFAULT_API_BASE.to_string(),
        }
    }
}

pub struct Orchestrator {
    scaffolder: Scaffolder,
    credentials: Credentials,
    endpoints: Endpoints,
    private_repo: bool,
}

impl Orchestrator {
    pub fn new(
        scaffolder: Scaffolder,
        credentials: Credentials,
        endpoints: Endpoints,
        private_repo: bool,
    ) -> Self {
        Self {
            scaffolder,
            credentials,
            endpoints,
            private_repo,
        }
    }

    /// Run the pipeline for one bot. Always reaches the end of the report;
    /// only a scaffold failure leaves the later stages unattempted.
    pub async fn run(&self, spec: &BotSpec) -> RunReport {
        info!(
            "Provisioning bot '{}' ({} on {}, {})",
            spec.name,
            spec.strategy.as_str(),
            spec.pair,
            spec.timeframe
        );

        let scaffolded = match self.scaffolder.scaffold(spec).await {
            Ok(result) => result,
            Err(err) => {
                error!("Scaffold failed: {}", err);
                return RunReport {
                    scaffold: StageOutcome::Failed(err),
                    repository: StageOutcome::skipped(outcome::NO_LOCAL_PROJECT),
                    service: StageOutcome::skipped(outcome::NO_REPOSITORY),
                };
            }
        };

        let repository = self.provision_repository(spec, &scaffolded.root).await;
        let service = self.publish_service(spec, &repository).await;

        RunReport {
            scaffold: StageOutcome::Succeeded(scaffolded),
            repository,
            service,
        }
    }

    /// Create the remote repository and push the scaffolded tree to it.
    async fn provision_repository(
        &self,
        spec: &BotSpec,
        root: &Path,
    ) -> StageOutcome<RepositoryHandle> {
        let creds = match self.credentials.github() {
            Ok(creds) => creds.clone(),
            Err(err) => {
                info!("{}; skipping repository stage", err);
                return StageOutcome::skipped(outcome::NO_VCS_CREDENTIALS);
            }
        };

        let attempt = async {
            let client = GitHubClient::new(&self.endpoints.github_api, creds)?;
            let handle = client.create_repository(&spec.name, self.private_repo).await?;
            git::publish(root, &handle.push_url).await?;
            Ok::<_, ProvisionError>(handle)
        };

        match attempt.await {
            Ok(handle) => StageOutcome::Succeeded(handle),
            Err(err) => {
                // The scaffold stays on disk; a created repository is not
                // rolled back. Cleanup is an operator action.
                warn!("Repository stage failed: {}", err);
                StageOutcome::Failed(err)
            }
        }
    }

    /// Register the hosted service against the pushed repository.
    async fn publish_service(
        &self,
        spec: &BotSpec,
        repository: &StageOutcome<RepositoryHandle>,
    ) -> StageOutcome<ServiceHandle> {
        let handle = match repository.value() {
            Some(handle) => handle,
            None => return StageOutcome::skipped(outcome::NO_REPOSITORY),
        };

        let creds = match self.credentials.render() {
            Ok(creds) => creds.clone(),
            Err(err) => {
                info!("{}; skipping service stage", err);
                return StageOutcome::skipped(outcome::NO_DEPLOY_CREDENTIALS);
            }
        };

        let attempt = async {
            let client = RenderClient::new(&self.endpoints.render_api, creds)?;
            client.create_service(&handle.web_url, &spec.name).await
        };

        match attempt.await {
            Ok(service) => StageOutcome::Succeeded(service),
            Err(err) => {
                warn!("Service stage failed: {}", err);
                StageOutcome::Failed(err)
            }
        }
    }
}
