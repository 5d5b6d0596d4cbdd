//! Local git driver: init, commit and push a scaffolded project.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ProvisionError, Result};

const COMMIT_MESSAGE: &str = "init bot";

async fn run_git(root: &Path, args: &[&str]) -> Result<()> {
    debug!("git {}", args.join(" "));
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .await
        .map_err(|source| ProvisionError::VcsCommand {
            command: format!("git {}", args.join(" ")),
            status: -1,
            stderr: source.to_string(),
        })?;

    if !output.status.success() {
        return Err(ProvisionError::VcsCommand {
            command: format!("git {}", args.join(" ")),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Initialize a repository at `root`, commit the whole tree on `main` and
/// push it to `push_url`. Push failures (e.g. no usable transport
/// credentials) surface as `VcsCommand` with the failing subcommand's
/// stderr.
pub async fn publish(root: &Path, push_url: &str) -> Result<()> {
    run_git(root, &["init"]).await?;
    run_git(root, &["checkout", "-B", "main"]).await?;
    run_git(root, &["add", "."]).await?;
    // Fallback identity so a fresh container with no git config can commit;
    // a locally-configured identity still wins for everything else.
    run_git(
        root,
        &[
            "-c",
            "user.name=bot-foundry",
            "-c",
            "user.email=bot-foundry@localhost",
            "commit",
            "-m",
            COMMIT_MESSAGE,
        ],
    )
    .await?;
    run_git(root, &["remote", "add", "origin", push_url]).await?;
    run_git(root, &["push", "-u", "origin", "main"]).await?;

    info!("✓ Pushed {} to origin/main", root.display());
    Ok(())
}
