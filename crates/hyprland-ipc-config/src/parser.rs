//! KDL configuration parser

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::*;

/// Location used when no `--config` is given
const DEFAULT_CONFIG_PATH: &str = "~/.config/hyprland-ipc/config.kdl";

/// The default config path with `~` expanded
pub fn default_config_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATH).into_owned())
}

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Like [`parse_config`], but a missing file yields the defaults
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl carries its own miette version; rebuild the span for ours
        let offset = e.span.offset();
        let len = e.span.len();
        ConfigError::ParseError {
            src: content.to_string(),
            span: miette::SourceSpan::from((offset, len)),
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "log-level" => {
                let (entry, val) = required_string(node, content)?;
                config.log_level = val
                    .parse()
                    .map_err(|e| invalid_entry(entry, content, e))?;
            }
            "instance" => {
                config.instance = parse_instance(node, content)?;
            }
            "command" => {
                config.command = parse_command(node, content)?;
            }
            "watch" => {
                config.watch = parse_watch(node, content)?;
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_instance(node: &kdl::KdlNode, source: &str) -> Result<InstanceConfig, ConfigError> {
    let mut instance = InstanceConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "signature" => {
                    let (entry, val) = required_string(child, source)?;
                    if val.trim().is_empty() {
                        return Err(invalid_entry(
                            entry,
                            source,
                            "instance signature must not be empty".to_string(),
                        ));
                    }
                    instance.signature = Some(val.trim().to_string());
                }
                "runtime-dir" => {
                    let (_, val) = required_string(child, source)?;
                    instance.runtime_dir = Some(shellexpand::tilde(val).into_owned().into());
                }
                name => {
                    tracing::warn!("Unknown instance config option: {}", name);
                }
            }
        }
    }

    Ok(instance)
}

fn parse_command(node: &kdl::KdlNode, source: &str) -> Result<CommandConfig, ConfigError> {
    let mut command = CommandConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "timeout-ms" => {
                    let entry = child.entries().first().ok_or_else(|| {
                        invalid_node(child, source, "timeout-ms expects an integer".to_string())
                    })?;
                    let millis = entry.value().as_i64().ok_or_else(|| {
                        invalid_entry(entry, source, "timeout-ms expects an integer".to_string())
                    })?;
                    command.timeout = match millis {
                        0 => None,
                        ms if ms > 0 => Some(Duration::from_millis(ms as u64)),
                        ms => {
                            return Err(invalid_entry(
                                entry,
                                source,
                                format!("timeout-ms must not be negative, got {}", ms),
                            ))
                        }
                    };
                }
                name => {
                    tracing::warn!("Unknown command config option: {}", name);
                }
            }
        }
    }

    Ok(command)
}

fn parse_watch(node: &kdl::KdlNode, source: &str) -> Result<WatchConfig, ConfigError> {
    let mut watch = WatchConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "events" => {
                    for entry in child.entries() {
                        let name = entry.value().as_string().ok_or_else(|| {
                            invalid_entry(
                                entry,
                                source,
                                format!("events expects strings, got {}", entry.value()),
                            )
                        })?;
                        watch.events.push(name.to_string());
                    }
                }
                name => {
                    tracing::warn!("Unknown watch config option: {}", name);
                }
            }
        }
    }

    Ok(watch)
}

/// First argument of `node` as a string, with the entry it came from
fn required_string<'a>(
    node: &'a kdl::KdlNode,
    source: &str,
) -> Result<(&'a kdl::KdlEntry, &'a str), ConfigError> {
    let message = || format!("{} expects a string value", node.name().value());

    let entry = node
        .entries()
        .first()
        .ok_or_else(|| invalid_node(node, source, message()))?;
    let val = entry
        .value()
        .as_string()
        .ok_or_else(|| invalid_entry(entry, source, message()))?;
    Ok((entry, val))
}

/// Invalid value error labelled at a node's name
fn invalid_node(node: &kdl::KdlNode, source: &str, message: String) -> ConfigError {
    let span = node.name().span();
    ConfigError::invalid_at(source, span.offset(), span.len(), message)
}

/// Invalid value error labelled at one entry
fn invalid_entry(entry: &kdl::KdlEntry, source: &str, message: String) -> ConfigError {
    let span = entry.span();
    ConfigError::invalid_at(source, span.offset(), span.len(), message)
}
