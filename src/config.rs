use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub chain: ChainConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub rpc_http: String,
    pub rpc_ws: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

// ============================================================
// Relay Feed Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_relay_url")]
    pub url: String,
    #[serde(default = "default_relay_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            timeout_ms: default_relay_timeout_ms(),
        }
    }
}

fn default_relay_url() -> String {
    "https://blocks.flashbots.net/v1/blocks?limit=4".to_string()
}

fn default_relay_timeout_ms() -> u64 {
    10_000
}

// ============================================================
// Detector Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// Counters are flushed on every block number divisible by this.
    #[serde(default = "default_persist_interval")]
    pub persist_interval: u64,
    #[serde(default = "default_max_alerts_per_block")]
    pub max_alerts_per_block: usize,
    /// Hard cap on undelivered alerts; the oldest are dropped beyond it.
    #[serde(default = "default_max_pending_alerts")]
    pub max_pending_alerts: usize,
    #[serde(default = "default_relayed_key")]
    pub relayed_key: String,
    #[serde(default = "default_total_key")]
    pub total_key: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            persist_interval: default_persist_interval(),
            max_alerts_per_block: default_max_alerts_per_block(),
            max_pending_alerts: default_max_pending_alerts(),
            relayed_key: default_relayed_key(),
            total_key: default_total_key(),
        }
    }
}

fn default_persist_interval() -> u64 {
    240
}

fn default_max_alerts_per_block() -> usize {
    10
}

fn default_max_pending_alerts() -> usize {
    1000
}

fn default_relayed_key() -> String {
    "relay-watch-relayed-txs".to_string()
}

fn default_total_key() -> String {
    "relay-watch-total-txs".to_string()
}

// ============================================================
// Database / Output / Logging
// ============================================================

/// Counter persistence. Without a `url` counters live in memory only.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OutputConfig {
    /// Append delivered alerts as JSON lines to this file.
    pub jsonl_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if !is_http_url(&self.chain.rpc_http) {
            return Err(eyre::eyre!(
                "chain.rpc_http must be an http(s) URL, got '{}'",
                self.chain.rpc_http
            ));
        }
        if let Some(ws) = &self.chain.rpc_ws {
            if !(ws.starts_with("ws://") || ws.starts_with("wss://")) {
                return Err(eyre::eyre!("chain.rpc_ws must be a ws(s) URL, got '{}'", ws));
            }
        }
        if !is_http_url(&self.relay.url) {
            return Err(eyre::eyre!(
                "relay.url must be an http(s) URL, got '{}'",
                self.relay.url
            ));
        }
        if self.chain.poll_interval_ms == 0 || self.relay.timeout_ms == 0 {
            return Err(eyre::eyre!("poll_interval_ms and timeout_ms must be non-zero"));
        }
        let detector = &self.detector;
        if detector.persist_interval == 0
            || detector.max_alerts_per_block == 0
            || detector.max_pending_alerts == 0
        {
            return Err(eyre::eyre!(
                "detector.persist_interval, max_alerts_per_block and max_pending_alerts must be non-zero"
            ));
        }
        if detector.relayed_key == detector.total_key {
            return Err(eyre::eyre!(
                "detector.relayed_key and detector.total_key must differ"
            ));
        }
        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[chain]
rpc_http = "http://localhost:8545"
rpc_ws = "ws://localhost:8546"

[database]
url = "postgres://localhost/test"
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.chain.rpc_ws.as_deref(), Some("ws://localhost:8546"));
        assert_eq!(config.chain.poll_interval_ms, 2000); // default
        assert_eq!(config.relay.url, "https://blocks.flashbots.net/v1/blocks?limit=4");
        assert_eq!(config.detector.persist_interval, 240);
        assert_eq!(config.detector.max_alerts_per_block, 10);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.output.jsonl_path.is_none());
        assert!(!config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_rpc_url() {
        let config: Config = toml::from_str(
            r#"
[chain]
rpc_http = "localhost:8545"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config: Config = toml::from_str(
            r#"
[chain]
rpc_http = "http://localhost:8545"
"#,
        )
        .unwrap();
        config.detector.persist_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_same_counter_keys() {
        let mut config: Config = toml::from_str(
            r#"
[chain]
rpc_http = "http://localhost:8545"
"#,
        )
        .unwrap();
        config.detector.total_key = config.detector.relayed_key.clone();
        assert!(config.validate().is_err());
    }
}
