//! Bot configuration and the process-wide credential snapshot.

use std::fmt;
use std::str::FromStr;

use crate::error::{ProvisionError, Result};

/// Trading strategy baked into a generated bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Ema,
    RsiMacd,
    Scalping,
    Combo,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Ema => "ema",
            Strategy::RsiMacd => "rsi_macd",
            Strategy::Scalping => "scalping",
            Strategy::Combo => "combo",
        }
    }
}

impl FromStr for Strategy {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ema" => Ok(Strategy::Ema),
            "rsi_macd" => Ok(Strategy::RsiMacd),
            "scalping" => Ok(Strategy::Scalping),
            "combo" => Ok(Strategy::Combo),
            other => Err(ProvisionError::ConfigInvalid(format!(
                "unknown strategy '{}' (expected ema, rsi_macd, scalping or combo)",
                other
            ))),
        }
    }
}

/// Configuration for one provisioning run. Immutable once the run starts.
#[derive(Debug, Clone)]
pub struct BotSpec {
    pub name: String,
    pub bot_id: String,
    pub pair: String,
    pub strategy: Strategy,
    pub timeframe: String,
}

impl BotSpec {
    /// Validate and build a spec. `name` doubles as the project directory
    /// and the remote repository name, so it is restricted to lowercase
    /// alphanumerics and hyphens.
    pub fn new(
        name: String,
        bot_id: String,
        pair: String,
        strategy: &str,
        timeframe: String,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(ProvisionError::ConfigInvalid(
                "bot name must not be empty".to_string(),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ProvisionError::ConfigInvalid(format!(
                "bot name '{}' must contain only lowercase alphanumerics and hyphens",
                name
            )));
        }
        if pair.is_empty() {
            return Err(ProvisionError::ConfigInvalid(
                "trading pair must not be empty".to_string(),
            ));
        }
        if timeframe.is_empty() {
            return Err(ProvisionError::ConfigInvalid(
                "timeframe must not be empty".to_string(),
            ));
        }

        Ok(Self {
            name,
            bot_id,
            pair,
            strategy: strategy.parse()?,
            timeframe,
        })
    }
}

/// GitHub account used to create and push the remote repository.
#[derive(Clone, Debug)]
pub struct GitHubCredentials {
    pub username: String,
    pub token: String,
}

/// Render account used to register the hosted service.
#[derive(Clone, Debug)]
pub struct RenderCredentials {
    pub api_key: String,
    pub owner_id: String,
}

/// Remote-side credentials, snapshotted once at process start and passed
/// into the orchestrator. A missing leg skips the matching stage instead of
/// failing the run.
#[derive(Clone)]
pub struct Credentials {
    pub github: Option<GitHubCredentials>,
    pub render: Option<RenderCredentials>,
}

impl Credentials {
    /// Read `GITHUB_USERNAME`/`GITHUB_TOKEN` and `RENDER_API_KEY`/
    /// `RENDER_OWNER_ID`. A leg is only present when both of its variables
    /// are set and non-empty. Loads `.env` first if one exists.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let github = match (env_non_empty("GITHUB_USERNAME"), env_non_empty("GITHUB_TOKEN")) {
            (Some(username), Some(token)) => Some(GitHubCredentials { username, token }),
            _ => None,
        };
        let render = match (env_non_empty("RENDER_API_KEY"), env_non_empty("RENDER_OWNER_ID")) {
            (Some(api_key), Some(owner_id)) => Some(RenderCredentials { api_key, owner_id }),
            _ => None,
        };

        Self { github, render }
    }

    /// Empty credential set: every remote stage will be skipped.
    pub fn none() -> Self {
        Self {
            github: None,
            render: None,
        }
    }

    pub fn github(&self) -> Result<&GitHubCredentials> {
        self.github
            .as_ref()
            .ok_or(ProvisionError::AuthMissing("GITHUB_USERNAME / GITHUB_TOKEN"))
    }

    pub fn render(&self) -> Result<&RenderCredentials> {
        self.render
            .as_ref()
            .ok_or(ProvisionError::AuthMissing("RENDER_API_KEY / RENDER_OWNER_ID"))
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field(
                "github",
                &self.github.as_ref().map(|c| c.username.as_str()),
            )
            .field(
                "render",
                &self.render.as_ref().map(|c| c.owner_id.as_str()),
            )
            .finish()
    }
}
