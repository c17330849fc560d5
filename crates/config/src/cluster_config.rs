use std::env;
use std::net::Ipv4Addr;
use std::time::Duration;

use derive_builder::Builder;
use primitives::NodeAddress;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnvVar { var: &'static str, value: String },

    #[error("failed to read config file: {0}")]
    File(#[from] config::ConfigError),
}

type Result<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_DISCOVERY_PORT: u16 = 4321;
pub const DEFAULT_MESSAGE_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_millis(550);
pub const DEFAULT_PREELECTION_TIMEOUT: Duration = Duration::from_millis(550);

/// Runtime configuration for the cluster membership/coordination daemon.
/// Every field is overridable from the environment (see spec §6); none are
/// persisted across restarts.
#[derive(Builder, Debug, Clone, Deserialize)]
#[builder(setter(into))]
pub struct ClusterConfig {
    /// Local interface address used to derive this node's identity and
    /// priority. Not itself transmitted on the wire.
    #[builder(default = "Ipv4Addr::new(127, 0, 0, 1)")]
    pub local_address: NodeAddress,

    /// Netmask for the selected interface, used alongside `local_address`
    /// to derive priority and the broadcast address.
    #[builder(default = "Ipv4Addr::new(255, 255, 255, 0)")]
    pub netmask: NodeAddress,

    /// UDP port discovery/election/coordinator traffic is exchanged on.
    #[builder(default = "DEFAULT_DISCOVERY_PORT")]
    pub discovery_port: u16,

    /// Retransmit period for unicast/broadcast transactions.
    #[builder(default = "DEFAULT_MESSAGE_INTERVAL")]
    pub message_interval: Duration,

    /// Retransmit deadline; an un-ACKed transaction is abandoned after this
    /// much time has elapsed since it started.
    #[builder(default = "DEFAULT_MESSAGE_TIMEOUT")]
    pub message_timeout: Duration,

    /// Debounce window after a membership change before an election starts.
    #[builder(default = "DEFAULT_PREELECTION_TIMEOUT")]
    pub preelection_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            local_address: Ipv4Addr::new(127, 0, 0, 1),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            discovery_port: DEFAULT_DISCOVERY_PORT,
            message_interval: DEFAULT_MESSAGE_INTERVAL,
            message_timeout: DEFAULT_MESSAGE_TIMEOUT,
            preelection_timeout: DEFAULT_PREELECTION_TIMEOUT,
        }
    }
}

impl ClusterConfig {
    /// Builds a config from `local_address`/`netmask` plus whichever of the
    /// `DISCOVERY_*` environment variables from spec §6 are present,
    /// falling back to defaults for the rest. All variables are optional.
    pub fn from_env(local_address: NodeAddress, netmask: NodeAddress) -> Result<Self> {
        let mut config = ClusterConfig {
            local_address,
            netmask,
            ..ClusterConfig::default()
        };

        if let Some(v) = env_var("DISCOVERY_PORT") {
            config.discovery_port = parse_env("DISCOVERY_PORT", &v)?;
        }

        if let Some(v) = env_var("DISCOVERY_MESSAGE_INTERVAL") {
            config.message_interval = Duration::from_millis(parse_env("DISCOVERY_MESSAGE_INTERVAL", &v)?);
        }

        if let Some(v) = env_var("DISCOVERY_MESSAGE_TIMEOUT") {
            config.message_timeout = Duration::from_millis(parse_env("DISCOVERY_MESSAGE_TIMEOUT", &v)?);
        }

        if let Some(v) = env_var("DISCOVERY_PREELECTION_TIMEOUT") {
            config.preelection_timeout =
                Duration::from_millis(parse_env("DISCOVERY_PREELECTION_TIMEOUT", &v)?);
        }

        Ok(config)
    }

    pub fn from_file(config_path: &str) -> Result<Self> {
        let s = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .build()?;

        Ok(s.try_deserialize()?)
    }

    pub fn priority(&self) -> primitives::Priority {
        primitives::priority(self.local_address, self.netmask)
    }

    pub fn broadcast_address(&self) -> NodeAddress {
        primitives::broadcast_address(self.local_address, self.netmask)
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvVar { var, value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let config = ClusterConfig::default();

        assert_eq!(config.discovery_port, 4321);
        assert_eq!(config.message_interval, Duration::from_millis(100));
        assert_eq!(config.message_timeout, Duration::from_millis(550));
        assert_eq!(config.preelection_timeout, Duration::from_millis(550));
    }

    #[test]
    fn builder_overrides_individual_fields() {
        let config = ClusterConfigBuilder::default()
            .discovery_port(1234u16)
            .build()
            .unwrap();

        assert_eq!(config.discovery_port, 1234);
        assert_eq!(config.message_interval, DEFAULT_MESSAGE_INTERVAL);
    }

    #[test]
    fn priority_and_broadcast_derive_from_address_and_mask() {
        let config = ClusterConfigBuilder::default()
            .local_address(Ipv4Addr::new(10, 0, 0, 3))
            .netmask(Ipv4Addr::new(255, 255, 255, 0))
            .build()
            .unwrap();

        assert_eq!(config.priority(), 3);
        assert_eq!(config.broadcast_address(), Ipv4Addr::new(10, 0, 0, 255));
    }

    #[test]
    fn from_file_surfaces_errors_instead_of_silently_defaulting() {
        let path = std::env::temp_dir().join(format!("cluster_config_test_{}.json", std::process::id()));
        std::fs::write(&path, "{}").unwrap();

        let result = ClusterConfig::from_file(path.to_str().unwrap());
        std::fs::remove_file(&path).ok();

        assert!(
            result.is_err(),
            "a config file missing required fields must surface a ConfigError, not silently default"
        );
    }
}
