//! TOML configuration for the Strand daemon.
//!
//! The `[peers]` table is the static roster: every node that may ever
//! appear on the ring, mapped to its UDP address. All nodes should run
//! with the same roster.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;
use strand_ring::{NotifyPolicy, RingConfig};

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Node identity and address.
    pub node: NodeSection,
    /// Ring protocol tuning.
    pub ring: RingSection,
    /// Identifier-to-address roster, `id = "host:port"`.
    pub peers: BTreeMap<String, String>,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// This node's ring identifier.
    pub id: String,
    /// UDP address for inter-node communication.
    pub listen_addr: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: String::new(),
            listen_addr: "0.0.0.0:4820".to_string(),
        }
    }
}

/// `[ring]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RingSection {
    /// Milliseconds between stabilize rounds.
    pub stabilize_interval_ms: Option<u64>,
    /// Milliseconds before an unanswered ping is reported failed.
    pub ping_timeout_ms: Option<u64>,
    /// Notify acceptance policy: `"guarded"` (default) or
    /// `"unconditional"`.
    pub notify_policy: Option<String>,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("reading {}", p.display()))?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Effective ring protocol configuration.
    pub fn ring_config(&self) -> anyhow::Result<RingConfig> {
        let defaults = RingConfig::default_config();
        let notify_policy = match self.ring.notify_policy.as_deref() {
            None | Some("guarded") => NotifyPolicy::Guarded,
            Some("unconditional") => NotifyPolicy::Unconditional,
            Some(other) => bail!("unknown notify policy {other:?}"),
        };
        Ok(RingConfig {
            stabilize_interval: self
                .ring
                .stabilize_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.stabilize_interval),
            ping_timeout: self
                .ring
                .ping_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.ping_timeout),
            notify_policy,
        })
    }
}
