//! Server configuration: TOML plus `HYDROGEN_`-prefixed environment
//! overrides, grounded on the teacher's `forwarder::config` raw-then-
//! validated two-struct pattern (spec §6.5 recognized key set).

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub use_tls: bool,
}

#[derive(Debug, Clone)]
pub struct FeaturesConfig {
    pub auto_reconnect: bool,
    pub device_discovery: bool,
    pub heartbeat: bool,
}

#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    pub worker_threads: usize,
    pub max_queue_size: usize,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct TcpListenerConfig {
    pub server_address: String,
    pub server_port: u16,
    pub is_server: bool,
    pub enable_keep_alive: bool,
    pub max_connections: usize,
    pub bind_interface: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    pub network: NetworkConfig,
    pub features: FeaturesConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
    pub tcp: TcpListenerConfig,
    /// §4.7 `clientTimeout` — sessions idle past this are swept.
    pub client_timeout: Duration,
    /// §4.7 sweep interval for the auto-cleanup timer.
    pub cleanup_interval: Duration,
    /// §4.7 heartbeat interval; `None` disables the heartbeat timer.
    pub heartbeat_interval: Option<Duration>,
    pub allowed_commands: Vec<String>,
    pub max_clients: usize,
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    network: Option<RawNetwork>,
    features: Option<RawFeatures>,
    performance: Option<RawPerformance>,
    logging: Option<RawLogging>,
    tcp: Option<RawTcp>,
    server: Option<RawServer>,
}

#[derive(Debug, Deserialize, Default)]
struct RawNetwork {
    host: Option<String>,
    port: Option<u16>,
    endpoint: Option<String>,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    use_tls: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawFeatures {
    auto_reconnect: Option<bool>,
    device_discovery: Option<bool>,
    heartbeat: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawPerformance {
    worker_threads: Option<usize>,
    max_queue_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RawLogging {
    level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawTcp {
    server_address: Option<String>,
    server_port: Option<u16>,
    is_server: Option<bool>,
    enable_keep_alive: Option<bool>,
    max_connections: Option<usize>,
    bind_interface: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawServer {
    client_timeout_ms: Option<u64>,
    cleanup_interval_ms: Option<u64>,
    heartbeat_interval_ms: Option<u64>,
    allowed_commands: Option<Vec<String>>,
    max_clients: Option<usize>,
}

/// Loads `path`, applies `HYDROGEN_`-prefixed environment overrides, and
/// validates into a [`ServerRuntimeConfig`].
pub fn load_config(path: &std::path::Path) -> Result<ServerRuntimeConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
    load_config_from_str(&toml_str, "HYDROGEN_")
}

pub fn load_config_from_str(toml_str: &str, env_prefix: &str) -> Result<ServerRuntimeConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let raw_network = raw.network.unwrap_or_default();
    let network = NetworkConfig {
        host: env_override(format!("{env_prefix}NETWORK_HOST"), raw_network.host).unwrap_or_else(|| "0.0.0.0".to_owned()),
        port: env_override_parsed(format!("{env_prefix}NETWORK_PORT"), raw_network.port).unwrap_or(7420),
        endpoint: raw_network.endpoint.unwrap_or_else(|| "/hydrogen".to_owned()),
        connect_timeout: Duration::from_millis(raw_network.connect_timeout_ms.unwrap_or(5_000)),
        read_timeout: Duration::from_millis(raw_network.read_timeout_ms.unwrap_or(30_000)),
        write_timeout: Duration::from_millis(raw_network.write_timeout_ms.unwrap_or(10_000)),
        use_tls: raw_network.use_tls.unwrap_or(false),
    };

    let raw_features = raw.features.unwrap_or_default();
    let features = FeaturesConfig {
        auto_reconnect: raw_features.auto_reconnect.unwrap_or(true),
        device_discovery: raw_features.device_discovery.unwrap_or(false),
        heartbeat: raw_features.heartbeat.unwrap_or(true),
    };

    let raw_performance = raw.performance.unwrap_or_default();
    let performance = PerformanceConfig {
        worker_threads: raw_performance.worker_threads.unwrap_or(4),
        max_queue_size: raw_performance.max_queue_size.unwrap_or(1000),
    };

    let raw_logging = raw.logging.unwrap_or_default();
    let logging = LoggingConfig {
        level: env_override(format!("{env_prefix}LOGGING_LEVEL"), raw_logging.level).unwrap_or_else(|| "info".to_owned()),
    };

    let raw_tcp = raw.tcp.unwrap_or_default();
    let tcp = TcpListenerConfig {
        server_address: raw_tcp.server_address.unwrap_or_else(|| "0.0.0.0".to_owned()),
        server_port: env_override_parsed(format!("{env_prefix}TCP_SERVER_PORT"), raw_tcp.server_port).unwrap_or(7421),
        is_server: raw_tcp.is_server.unwrap_or(true),
        enable_keep_alive: raw_tcp.enable_keep_alive.unwrap_or(true),
        max_connections: raw_tcp.max_connections.unwrap_or(256),
        bind_interface: raw_tcp.bind_interface,
    };

    let raw_server = raw.server.unwrap_or_default();
    let allowed_commands = raw_server.allowed_commands.unwrap_or_default();
    let max_clients = raw_server.max_clients.unwrap_or(256);
    if max_clients == 0 {
        return Err(ConfigError::InvalidValue("server.max_clients must be > 0".into()));
    }

    Ok(ServerRuntimeConfig {
        network,
        features,
        performance,
        logging,
        tcp,
        client_timeout: Duration::from_millis(raw_server.client_timeout_ms.unwrap_or(300_000)),
        cleanup_interval: Duration::from_millis(raw_server.cleanup_interval_ms.unwrap_or(60_000)),
        heartbeat_interval: raw_server.heartbeat_interval_ms.map(Duration::from_millis),
        allowed_commands,
        max_clients,
    })
}

fn env_override(key: impl AsRef<str>, fallback: Option<String>) -> Option<String> {
    std::env::var(key.as_ref()).ok().or(fallback)
}

fn env_override_parsed<T: std::str::FromStr>(key: impl AsRef<str>, fallback: Option<T>) -> Option<T> {
    std::env::var(key.as_ref()).ok().and_then(|v| v.parse().ok()).or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_sections_are_absent() {
        let config = load_config_from_str("", "HYDROGEN_TEST_").unwrap();
        assert_eq!(config.network.port, 7420);
        assert_eq!(config.max_clients, 256);
        assert!(config.features.auto_reconnect);
    }

    #[test]
    fn toml_values_override_defaults() {
        let toml = r#"
            [network]
            port = 9000
            [server]
            max_clients = 10
            allowed_commands = ["move", "status"]
        "#;
        let config = load_config_from_str(toml, "HYDROGEN_TEST_").unwrap();
        assert_eq!(config.network.port, 9000);
        assert_eq!(config.max_clients, 10);
        assert_eq!(config.allowed_commands, vec!["move", "status"]);
    }

    #[test]
    fn zero_max_clients_is_rejected() {
        let toml = "[server]\nmax_clients = 0\n";
        assert!(load_config_from_str(toml, "HYDROGEN_TEST_").is_err());
    }

    #[test]
    fn env_override_beats_toml_value() {
        let prefix = "HYDROGEN_CFGTEST_";
        std::env::set_var(format!("{prefix}NETWORK_PORT"), "12345");
        let toml = "[network]\nport = 9000\n";
        let config = load_config_from_str(toml, prefix).unwrap();
        assert_eq!(config.network.port, 12345);
        std::env::remove_var(format!("{prefix}NETWORK_PORT"));
    }
}
