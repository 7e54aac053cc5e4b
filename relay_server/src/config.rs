use relay_control::ControlServerConfig;
use relay_network::ConnectionConfig;

use std::collections::HashMap;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing_core::LevelFilter;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinLogTarget {
    Stdout,
    Stderr,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum LogTarget {
    File { filename: PathBuf },
    Builtin(BuiltinLogTarget),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct LogEntry {
    pub target: LogTarget,
    #[serde(default)]
    pub modules: Vec<String>,
    pub level: Option<LogLevel>,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Directory in which file targets are written
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    pub default_level: Option<LogLevel>,
    #[serde(default)]
    pub module_levels: HashMap<String, LogLevel>,
    pub targets: Vec<LogEntry>,
}

/// Top-level configuration for a relay server process
#[derive(Clone, Debug, serde::Deserialize)]
pub struct ServerConfig {
    pub control: ControlServerConfig,
    pub log: LoggingConfig,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("I/O error on {1}: {0}")]
    IoError(std::io::Error, PathBuf),
    #[error("JSON parse error in {1}: {0}")]
    JsonError(serde_json::Error, PathBuf),
    #[error("Invalid control config in {1}: {0}")]
    ControlError(relay_control::ConfigError, PathBuf),
    #[error("Duplicate connection name {0} in {1}")]
    DuplicateConnection(String, PathBuf),
}

impl ServerConfig {
    /// Load and validate the server configuration from a given file path
    pub fn load_file<P: AsRef<Path>>(filename: P) -> Result<Self, ServerConfigError> {
        let filename = filename.as_ref();
        let file = File::open(filename)
            .map_err(|e| ServerConfigError::IoError(e, filename.to_owned()))?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)
            .map_err(|e| ServerConfigError::JsonError(e, filename.to_owned()))?;

        config.validate(filename)?;
        Ok(config)
    }

    fn validate(&self, filename: &Path) -> Result<(), ServerConfigError> {
        self.control
            .validate()
            .map_err(|e| ServerConfigError::ControlError(e, filename.to_owned()))?;

        let mut seen = std::collections::HashSet::new();
        for conn in &self.connections {
            if !seen.insert(conn.name.as_str()) {
                return Err(ServerConfigError::DuplicateConnection(
                    conn.name.clone(),
                    filename.to_owned(),
                ));
            }
        }
        Ok(())
    }
}

impl LoggingConfig {
    /// Whether any target writes to a file under [`dir`](Self::dir)
    pub fn uses_files(&self) -> bool {
        self.targets
            .iter()
            .any(|t| matches!(t.target, LogTarget::File { .. }))
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(arg: LogLevel) -> LevelFilter {
        match arg {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}
