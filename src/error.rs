//! Error taxonomy for the provisioning pipeline.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("invalid bot config: {0}")]
    ConfigInvalid(String),

    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("template '{template}' requires variable '{variable}'")]
    MissingVariable { template: String, variable: String },

    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Credentials for a remote stage are not configured. This is a skip
    /// condition for the orchestrator, not a run failure.
    #[error("missing credentials: {0}")]
    AuthMissing(&'static str),

    #[error("{provider} rejected the request: {status} - {body}")]
    RemoteRejected {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{command} failed (exit {status}): {stderr}")]
    VcsCommand {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
