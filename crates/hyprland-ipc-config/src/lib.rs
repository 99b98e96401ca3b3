//! Configuration parsing for hyprland-ipc clients
//!
//! This crate reads the KDL configuration file used by the `hypripc` tool:
//! which instance to talk to, how long to wait for commands, and which
//! events to watch by default.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{default_config_path, load_config, parse_config, parse_config_str};
