//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::types::Contestant;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ContestConfig {
    /// Unique contest identifier (e.g. "nationals-day1")
    #[serde(default = "default_contest_id")]
    pub id: String,
    /// Path to the route definition JSON
    #[serde(default = "default_route_file")]
    pub route_file: String,
}

impl Default for ContestConfig {
    fn default() -> Self {
        Self { id: default_contest_id(), route_file: default_route_file() }
    }
}

fn default_contest_id() -> String {
    "contest".to_string()
}

fn default_route_file() -> String {
    "routes/demo.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    /// Enable the TCP report listener
    #[serde(default = "default_listener_enabled")]
    pub enabled: bool,
    /// Report listener TCP port
    #[serde(default = "default_listener_port")]
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { enabled: default_listener_enabled(), port: default_listener_port() }
    }
}

fn default_listener_enabled() -> bool {
    true
}

fn default_listener_port() -> u16 {
    25410
}

#[derive(Debug, Clone, Deserialize)]
pub struct EgressConfig {
    /// File path for score update egress (JSONL format)
    #[serde(default = "default_egress_file")]
    pub file: String,
    /// Egress channel buffer size
    #[serde(default = "default_egress_buffer")]
    pub buffer: usize,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self { file: default_egress_file(), buffer: default_egress_buffer() }
    }
}

fn default_egress_file() -> String {
    "scores.jsonl".to_string()
}

fn default_egress_buffer() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Grace period after finished-by before a contestant worker stops
    #[serde(default = "default_session_grace_secs")]
    pub grace_secs: u64,
    /// Per-contestant report channel buffer size
    #[serde(default = "default_report_buffer")]
    pub report_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { grace_secs: default_session_grace_secs(), report_buffer: default_report_buffer() }
    }
}

fn default_session_grace_secs() -> u64 {
    300
}

fn default_report_buffer() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// Virtual clock speed factor for historical replay (1.0 = real time)
    #[serde(default = "default_replay_speed")]
    pub speed_factor: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { speed_factor: default_replay_speed() }
    }
}

fn default_replay_speed() -> f64 {
    10.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub contest: ContestConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub egress: EgressConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub contestants: Vec<Contestant>,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    contest_id: String,
    route_file: String,
    listener_enabled: bool,
    listener_port: u16,
    egress_file: String,
    egress_buffer: usize,
    metrics_interval_secs: u64,
    session_grace_secs: u64,
    report_buffer: usize,
    replay_speed_factor: f64,
    contestants: Vec<Contestant>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contest_id: default_contest_id(),
            route_file: default_route_file(),
            listener_enabled: true,
            listener_port: default_listener_port(),
            egress_file: default_egress_file(),
            egress_buffer: default_egress_buffer(),
            metrics_interval_secs: default_metrics_interval(),
            session_grace_secs: default_session_grace_secs(),
            report_buffer: default_report_buffer(),
            replay_speed_factor: default_replay_speed(),
            contestants: Vec::new(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        // Check for --config argument
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        // Default to dev.toml
        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            contest_id: toml_config.contest.id,
            route_file: toml_config.contest.route_file,
            listener_enabled: toml_config.listener.enabled,
            listener_port: toml_config.listener.port,
            egress_file: toml_config.egress.file,
            egress_buffer: toml_config.egress.buffer,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            session_grace_secs: toml_config.session.grace_secs,
            report_buffer: toml_config.session.report_buffer,
            replay_speed_factor: toml_config.replay.speed_factor,
            contestants: toml_config.contestants,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load configuration from command line args / environment
    pub fn load(args: &[String]) -> Self {
        Self::load_from_path(Self::resolve_config_path(args))
    }

    // Getters for all config fields
    pub fn contest_id(&self) -> &str {
        &self.contest_id
    }

    pub fn route_file(&self) -> &str {
        &self.route_file
    }

    pub fn listener_enabled(&self) -> bool {
        self.listener_enabled
    }

    pub fn listener_port(&self) -> u16 {
        self.listener_port
    }

    pub fn egress_file(&self) -> &str {
        &self.egress_file
    }

    pub fn egress_buffer(&self) -> usize {
        self.egress_buffer
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn session_grace_secs(&self) -> u64 {
        self.session_grace_secs
    }

    pub fn report_buffer(&self) -> usize {
        self.report_buffer
    }

    pub fn replay_speed_factor(&self) -> f64 {
        self.replay_speed_factor
    }

    pub fn contestants(&self) -> &[Contestant] {
        &self.contestants
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the egress file
    #[cfg(test)]
    pub fn with_egress_file(mut self, file: &str) -> Self {
        self.egress_file = file.to_string();
        self
    }

    /// Builder method for tests to set contestants
    #[cfg(test)]
    pub fn with_contestants(mut self, contestants: Vec<Contestant>) -> Self {
        self.contestants = contestants;
        self
    }
}
