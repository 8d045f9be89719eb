//! Load config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

/// Daemon configuration. File: ~/.config/nfc-gate/config.toml or /etc/nfc-gate/config.toml.
/// Env overrides: GATE_SERVER_HOST, GATE_SERVER_PORT, GATE_KEEPALIVE_SECS, GATE_MAX_TUNNEL_DEPTH.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Relay server host (default 127.0.0.1).
    #[serde(default = "default_server_host")]
    pub server_host: String,
    /// Relay server TCP port (default 5566).
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Seconds between keepalive requests while in a session; 0 disables (default 10).
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Deepest accepted tunnel nesting (default 8).
    #[serde(default = "default_max_tunnel_depth")]
    pub max_tunnel_depth: usize,
    /// Echo local errors to the peer as status messages (default true).
    #[serde(default = "default_report_errors_to_peer")]
    pub report_errors_to_peer: bool,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    5566
}
fn default_keepalive_secs() -> u64 {
    10
}
fn default_max_tunnel_depth() -> usize {
    gate_core::core::DEFAULT_MAX_TUNNEL_DEPTH
}
fn default_report_errors_to_peer() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: default_server_port(),
            keepalive_secs: default_keepalive_secs(),
            max_tunnel_depth: default_max_tunnel_depth(),
            report_errors_to_peer: default_report_errors_to_peer(),
        }
    }
}

impl Config {
    /// Core settings. The daemon ticks the core once per second.
    pub fn core_config(&self) -> gate_core::Config {
        gate_core::Config {
            max_tunnel_depth: self.max_tunnel_depth,
            report_errors_to_peer: self.report_errors_to_peer,
            keepalive_interval_ticks: self.keepalive_secs,
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |key| std::env::var(key).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("GATE_SERVER_HOST") {
        if !s.is_empty() {
            c.server_host = s;
        }
    }
    if let Some(s) = var("GATE_SERVER_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.server_port = p;
        }
    }
    if let Some(s) = var("GATE_KEEPALIVE_SECS") {
        if let Ok(n) = s.parse::<u64>() {
            c.keepalive_secs = n;
        }
    }
    if let Some(s) = var("GATE_MAX_TUNNEL_DEPTH") {
        if let Ok(n) = s.parse::<usize>() {
            c.max_tunnel_depth = n;
        }
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/nfc-gate/config.toml"));
    }
    out.push(PathBuf::from("/etc/nfc-gate/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p) {
                Ok(s) => match toml::from_str::<Config>(&s) {
                    Ok(c) => return Some(c),
                    Err(e) => warn!("ignoring {}: {}", p.display(), e),
                },
                Err(e) => warn!("cannot read {}: {}", p.display(), e),
            }
            break;
        }
    }
    None
}

/// Parse a `host:port` server override from the command line.
pub fn parse_server(s: &str) -> Option<(String, u16)> {
    let (host, port) = s.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port.parse().ok()?))
}
