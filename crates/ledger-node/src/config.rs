//! Configuration loading: environment variables (`LEDGER__*`) and an
//! optional config file, merged via the `config` crate, then overridden by
//! `clap` command-line flags -- a simplified version of `ilp-node`'s
//! cmdline/config-file/env layering (no stdin layer, since this service has
//! no equivalent secret-over-stdin concern).

use clap::Parser;
use config::{Config, Environment, File};
use ledger_errors::LedgerError;
use serde::Deserialize;
use std::net::SocketAddr;

fn default_http_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}
fn default_database_url() -> String {
    "postgres://localhost/ledger".to_owned()
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_owned()
}
fn default_counter_key_prefix() -> String {
    "ledger".to_owned()
}
fn default_settlement_period_secs() -> u64 {
    5
}
fn default_settlement_batch_size() -> usize {
    200
}
fn default_health_probe_interval_secs() -> u64 {
    5
}
fn default_breaker_failure_threshold() -> u32 {
    3
}
fn default_breaker_cooldown_secs() -> u64 {
    30
}
fn default_consistency_interval_secs() -> u64 {
    60
}
fn default_service_name() -> String {
    "ledger".to_owned()
}

/// The fully resolved configuration the composition root builds every
/// component from. Each field mirrors a tunable named in the component
/// design (settlement period/batch size, breaker threshold/cooldown,
/// health probe interval) rather than being invented ambient plumbing.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_http_bind_address")]
    pub http_bind_address: SocketAddr,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_counter_key_prefix")]
    pub counter_key_prefix: String,
    #[serde(default = "default_settlement_period_secs")]
    pub settlement_period_secs: u64,
    #[serde(default = "default_settlement_batch_size")]
    pub settlement_batch_size: usize,
    #[serde(default = "default_health_probe_interval_secs")]
    pub health_probe_interval_secs: u64,
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,
    #[serde(default = "default_breaker_cooldown_secs")]
    pub breaker_cooldown_secs: u64,
    #[serde(default = "default_consistency_interval_secs")]
    pub consistency_interval_secs: u64,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

/// Command-line overrides. Anything left `None` falls through to the
/// environment/file-sourced value (or its default).
#[derive(Debug, Parser)]
#[command(name = "ledger-node", about = "Account ledger admission/settlement service")]
pub struct Cli {
    /// Path to an optional YAML or JSON config file.
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub http_bind_address: Option<SocketAddr>,

    #[arg(long)]
    pub database_url: Option<String>,

    #[arg(long)]
    pub redis_url: Option<String>,
}

pub fn load(cli: &Cli) -> Result<NodeConfig, LedgerError> {
    let mut builder =
        Config::builder().add_source(Environment::with_prefix("LEDGER").separator("__"));
    if let Some(path) = &cli.config {
        builder = builder.add_source(File::with_name(path));
    }

    let raw = builder.build().map_err(config_err)?;
    let mut node: NodeConfig = raw.try_deserialize().map_err(config_err)?;

    if let Some(addr) = cli.http_bind_address {
        node.http_bind_address = addr;
    }
    if let Some(url) = &cli.database_url {
        node.database_url = url.clone();
    }
    if let Some(url) = &cli.redis_url {
        node.redis_url = url.clone();
    }

    Ok(node)
}

fn config_err(err: config::ConfigError) -> LedgerError {
    LedgerError::FatalIo(Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        std::env::remove_var("LEDGER__DATABASE_URL");
        let cli = Cli {
            config: None,
            http_bind_address: None,
            database_url: None,
            redis_url: None,
        };
        let node = load(&cli).unwrap();
        assert_eq!(node.settlement_period_secs, 5);
        assert_eq!(node.breaker_failure_threshold, 3);
    }

    #[test]
    fn cmdline_overrides_win_over_defaults() {
        let cli = Cli {
            config: None,
            http_bind_address: None,
            database_url: Some("postgres://example/override".to_owned()),
            redis_url: None,
        };
        let node = load(&cli).unwrap();
        assert_eq!(node.database_url, "postgres://example/override");
    }
}
