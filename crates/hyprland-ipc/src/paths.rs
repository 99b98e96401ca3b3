//! Instance signature and socket path discovery

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::HyprError;

/// Environment variable holding the signature of the running instance
pub const SIGNATURE_ENV: &str = "HYPRLAND_INSTANCE_SIGNATURE";

/// Environment variable for the per-user runtime directory
const RUNTIME_DIR_ENV: &str = "XDG_RUNTIME_DIR";

/// Directory Hyprland used for its sockets before moving to the runtime dir
const LEGACY_SOCKET_ROOT: &str = "/tmp/hypr";

const COMMAND_SOCKET_NAME: &str = ".socket.sock";
const EVENT_SOCKET_NAME: &str = ".socket2.sock";

/// Opaque identifier of one running Hyprland session
///
/// Cheap to clone; immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceSignature(Arc<str>);

impl InstanceSignature {
    /// Wrap a signature string
    ///
    /// # Errors
    ///
    /// Returns `HyprError::EmptySignature` if `signature` is empty.
    pub fn new(signature: impl AsRef<str>) -> Result<Self, HyprError> {
        let signature = signature.as_ref().trim();
        if signature.is_empty() {
            return Err(HyprError::EmptySignature);
        }
        Ok(Self(Arc::from(signature)))
    }

    /// Read the signature from `$HYPRLAND_INSTANCE_SIGNATURE`
    ///
    /// # Errors
    ///
    /// Returns `HyprError::SignatureNotSet` if the variable is unset, or
    /// `HyprError::EmptySignature` if it is set to an empty string.
    pub fn from_env() -> Result<Self, HyprError> {
        let value = std::env::var(SIGNATURE_ENV).map_err(|_| HyprError::SignatureNotSet)?;
        Self::new(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locations of the two sockets belonging to one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketPaths {
    dir: PathBuf,
}

impl SocketPaths {
    /// Derive socket paths for `signature`
    ///
    /// Uses `<runtime_dir>/hypr/<signature>/`, where `runtime_dir` defaults to
    /// `$XDG_RUNTIME_DIR` or `/run/user/<uid>`. Falls back to the legacy
    /// `/tmp/hypr/<signature>/` when only that directory exists.
    pub fn resolve(signature: &InstanceSignature, runtime_dir: Option<&Path>) -> Self {
        let root = runtime_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(default_runtime_dir);
        let dir = root.join("hypr").join(signature.as_str());

        if !dir.exists() {
            let legacy = Path::new(LEGACY_SOCKET_ROOT).join(signature.as_str());
            if legacy.exists() {
                tracing::debug!(path = %legacy.display(), "Using legacy Hyprland socket directory");
                return Self { dir: legacy };
            }
        }

        Self { dir }
    }

    /// Use an explicit directory holding both sockets
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the request/response socket
    pub fn command_socket(&self) -> PathBuf {
        self.dir.join(COMMAND_SOCKET_NAME)
    }

    /// Path of the event notification socket
    pub fn event_socket(&self) -> PathBuf {
        self.dir.join(EVENT_SOCKET_NAME)
    }
}

fn default_runtime_dir() -> PathBuf {
    match std::env::var(RUNTIME_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let uid = nix::unistd::getuid();
            tracing::debug!("XDG_RUNTIME_DIR not set, assuming /run/user/{}", uid);
            PathBuf::from(format!("/run/user/{}", uid))
        }
    }
}
