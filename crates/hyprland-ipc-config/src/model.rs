//! Configuration data model

use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub log_level: LogLevel,
    pub instance: InstanceConfig,
    pub command: CommandConfig,
    pub watch: WatchConfig,
}

/// Which Hyprland instance to address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Overrides `$HYPRLAND_INSTANCE_SIGNATURE` when set
    pub signature: Option<String>,
    /// Directory containing `hypr/<signature>/`, instead of `$XDG_RUNTIME_DIR`
    pub runtime_dir: Option<PathBuf>,
}

/// Command socket settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandConfig {
    /// `None` waits for as long as the compositor keeps the connection open
    pub timeout: Option<Duration>,
}

/// Defaults for `hypripc watch`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchConfig {
    /// Event names to print; empty means all of them
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}
