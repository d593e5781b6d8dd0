//! GovWatch configuration system.
//!
//! Settings live in a TOML file; credentials can additionally be
//! supplied (or overridden) through environment variables so they stay
//! out of the config file on shared hosts.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GovWatchError, Result};
use crate::types::SpaceConfig;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovWatchConfig {
    /// Postgres connection string.
    #[serde(default)]
    pub db_uri: String,
    /// Ethereum JSON-RPC endpoint.
    #[serde(default)]
    pub rpc_url: String,
    /// Snapshot GraphQL API endpoint.
    #[serde(default = "default_snapshot_graphql_url")]
    pub snapshot_graphql_url: String,
    /// Spaces to monitor, `ens:start_block` pairs separated by commas,
    /// e.g. `kleros.eth:3000000,1inch.eth:6000000`.
    #[serde(default)]
    pub spaces: String,
    /// Max number of blocks to scan per space per iteration.
    #[serde(default = "default_max_blocks_batch_size")]
    pub max_blocks_batch_size: u64,
    /// Seconds to sleep between iterations.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

fn default_snapshot_graphql_url() -> String {
    "https://hub.snapshot.org/graphql".into()
}
fn default_max_blocks_batch_size() -> u64 {
    200
}
fn default_cooldown_secs() -> u64 {
    300
}

impl Default for GovWatchConfig {
    fn default() -> Self {
        Self {
            db_uri: String::new(),
            rpc_url: String::new(),
            snapshot_graphql_url: default_snapshot_graphql_url(),
            spaces: String::new(),
            max_blocks_batch_size: default_max_blocks_batch_size(),
            cooldown_secs: default_cooldown_secs(),
            heartbeat: HeartbeatConfig::default(),
            channel: ChannelConfig::default(),
        }
    }
}

/// Optional uptime heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
}

fn default_heartbeat_interval() -> u64 {
    60
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            url: None,
            interval_secs: default_heartbeat_interval(),
        }
    }
}

/// Outbound channel configuration. A missing section disables the
/// channel for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub slack: Option<SlackConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    pub from: String,
    /// Recipients, comma separated.
    pub to: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl GovWatchConfig {
    /// Load config from a path, then apply environment overrides.
    /// A missing file yields the defaults (env vars can carry the
    /// whole configuration).
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| GovWatchError::Config(format!("Failed to read config: {e}")))?;
            toml::from_str(&content)
                .map_err(|e| GovWatchError::Config(format!("Failed to parse config: {e}")))?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables take precedence over the file. Variable
    /// names match the ones the deployment scripts already export.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DB_URI") {
            self.db_uri = v;
        }
        if let Ok(v) = std::env::var("MAINNET_RPC_URL") {
            self.rpc_url = v;
        }
        if let Ok(v) = std::env::var("SNAPSHOT_GRAPHQL_URL") {
            self.snapshot_graphql_url = v;
        }
        if let Ok(v) = std::env::var("SPACES") {
            self.spaces = v;
        }
        if let Ok(v) = std::env::var("MAX_BLOCKS_BATCH_SIZE")
            && let Ok(n) = v.parse()
        {
            self.max_blocks_batch_size = n;
        }
        if let Ok(v) = std::env::var("SLACK_WEBHOOK") {
            self.channel.slack = Some(SlackConfig { webhook_url: v });
        }
        if let (Ok(token), Ok(chat_id)) = (
            std::env::var("TELEGRAM_TOKEN"),
            std::env::var("TELEGRAM_CHAT_ID"),
        ) {
            self.channel.telegram = Some(TelegramConfig {
                bot_token: token,
                chat_id,
            });
        }
        if let Ok(url) = std::env::var("HEARTBEAT_URL") {
            self.heartbeat.url = Some(url);
        }
    }

    /// Reject configurations that cannot possibly run.
    pub fn validate(&self) -> Result<()> {
        if self.db_uri.is_empty() {
            return Err(GovWatchError::Config("db_uri is required".into()));
        }
        if self.rpc_url.is_empty() {
            return Err(GovWatchError::Config("rpc_url is required".into()));
        }
        if self.max_blocks_batch_size == 0 {
            return Err(GovWatchError::Config(
                "max_blocks_batch_size must be greater than zero".into(),
            ));
        }
        parse_spaces(&self.spaces).map(|_| ())
    }
}

/// Parse the `spaces` setting into `ens:start_block` pairs. The ENS
/// must be a `.eth` name and the start block a decimal integer; at
/// least one space is required.
pub fn parse_spaces(input: &str) -> Result<Vec<SpaceConfig>> {
    let invalid = || GovWatchError::Config(format!("Invalid spaces format: {input:?}"));

    if input.is_empty() {
        return Err(invalid());
    }

    input
        .split(',')
        .map(|pair| {
            let (ens, start_block) = pair.split_once(':').ok_or_else(invalid)?;
            let name = ens.strip_suffix(".eth").ok_or_else(invalid)?;
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(invalid());
            }
            let start_block = start_block.parse().map_err(|_| invalid())?;
            Ok(SpaceConfig {
                ens: ens.to_string(),
                start_block,
            })
        })
        .collect()
}

/// Split the email recipients setting into individual addresses.
pub fn parse_email_recipients(to: &str) -> Vec<String> {
    to.split(',')
        .map(|addr| addr.trim().to_string())
        .filter(|addr| !addr.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_space() {
        let spaces = parse_spaces("kleros.eth:3000000").unwrap();
        assert_eq!(spaces.len(), 1);
        assert_eq!(spaces[0].ens, "kleros.eth");
        assert_eq!(spaces[0].start_block, 3_000_000);
    }

    #[test]
    fn parses_multiple_spaces() {
        let spaces = parse_spaces("kleros.eth:3000000,1inch.eth:6000000").unwrap();
        assert_eq!(spaces.len(), 2);
        assert_eq!(spaces[1].ens, "1inch.eth");
        assert_eq!(spaces[1].start_block, 6_000_000);
    }

    #[test]
    fn rejects_bad_formats() {
        for input in [
            "",
            "kleros.eth",
            "kleros:3000000",
            "kleros.eth,1inch.eth",
            "kleros.eth:3000000,1inch.eth",
            ".eth:100",
            "kleros.eth:abc",
        ] {
            assert!(parse_spaces(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn splits_email_recipients() {
        let recipients = parse_email_recipients("a@example.org, b@example.org");
        assert_eq!(recipients, vec!["a@example.org", "b@example.org"]);
    }

    #[test]
    fn validate_requires_essentials() {
        let config = GovWatchConfig::default();
        assert!(config.validate().is_err());

        let config = GovWatchConfig {
            db_uri: "postgresql://localhost/govwatch".into(),
            rpc_url: "http://localhost:8545".into(),
            spaces: "kleros.eth:3000000".into(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
