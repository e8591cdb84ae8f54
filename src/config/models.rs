use crate::dispatch::DispatchMode;
use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub fetchers: HashMap<String, FetcherConfig>,
}

/// Bounded execution settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Wall-clock slice granted to each bounded execution
    #[serde(default = "default_budget")]
    pub budget: HumanDuration,
    /// Optional ceiling on executions per chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_links: Option<u32>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            max_links: None,
        }
    }
}

fn default_budget() -> HumanDuration {
    HumanDuration::from_secs(10)
}

/// Where dispatch-mode continuations are submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchTarget {
    /// POST to a remote worker endpoint
    Http,
    /// Hand off to an in-process worker pool
    #[default]
    Local,
}

/// Continuation dispatch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub mode: DispatchMode,
    #[serde(default = "default_worker_name")]
    pub worker_name: String,
    #[serde(default)]
    pub target: DispatchTarget,
    /// Base URL of the worker facility (required for the http target)
    pub endpoint: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_local_workers")]
    pub local_workers: usize,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Shared secret for the worker endpoint (loaded from environment only)
    #[serde(skip)]
    pub auth_token: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            worker_name: default_worker_name(),
            target: DispatchTarget::default(),
            endpoint: None,
            request_timeout: default_request_timeout(),
            local_workers: default_local_workers(),
            queue_depth: default_queue_depth(),
            auth_token: None,
        }
    }
}

fn default_worker_name() -> String {
    "async-fetch".to_string()
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(5)
}

fn default_local_workers() -> usize {
    4
}

fn default_queue_depth() -> usize {
    100
}

/// Worker endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_payload_bytes() -> usize {
    // Matches the async invocation payload ceiling of common function platforms
    256 * 1024
}

/// Record sink backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkProvider {
    Memory,
    #[default]
    Local,
}

/// Destination for harvested pages
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub provider: SinkProvider,
    #[serde(default = "default_sink_root")]
    pub root: PathBuf,
    #[serde(default = "default_sink_prefix")]
    pub prefix: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            provider: SinkProvider::default(),
            root: default_sink_root(),
            prefix: default_sink_prefix(),
        }
    }
}

fn default_sink_root() -> PathBuf {
    PathBuf::from("data/records")
}

fn default_sink_prefix() -> String {
    "harvested".to_string()
}

/// Chain ledger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_enabled")]
    pub enabled: bool,
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: default_ledger_enabled(),
            path: default_ledger_path(),
        }
    }
}

fn default_ledger_enabled() -> bool {
    true
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

/// One harvest type: which fetcher kind serves it and the params it starts from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    /// Fetcher implementation (e.g., "json_feed")
    pub kind: String,
    /// Params merged under every request of this harvest type
    #[serde(default)]
    pub defaults: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config {
            runner: RunnerConfig::default(),
            dispatch: DispatchConfig::default(),
            server: ServerConfig::default(),
            sink: SinkConfig::default(),
            ledger: LedgerConfig::default(),
            fetchers: HashMap::new(),
        };

        assert_eq!(config.runner.budget.as_duration(), Duration::from_secs(10));
        assert_eq!(config.runner.max_links, None);
        assert_eq!(config.dispatch.mode, DispatchMode::Dispatch);
        assert_eq!(config.dispatch.worker_name, "async-fetch");
        assert_eq!(config.dispatch.target, DispatchTarget::Local);
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.sink.provider, SinkProvider::Local);
        assert!(config.ledger.enabled);
    }

    #[test]
    fn test_fetcher_defaults_from_toml() {
        let config: Config = toml::from_str(
            r#"
[fetchers.nuxeo]
kind = "json_feed"

[fetchers.nuxeo.defaults]
url = "https://nuxeo.example.org/api/records"
cursor_param = "currentPageIndex"
            "#,
        )
        .unwrap();

        let nuxeo = &config.fetchers["nuxeo"];
        assert_eq!(nuxeo.kind, "json_feed");
        assert_eq!(nuxeo.defaults["cursor_param"], "currentPageIndex");
    }
}
