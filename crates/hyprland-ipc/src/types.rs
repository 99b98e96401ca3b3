//! Window, workspace and monitor records
//!
//! These mirror the JSON Hyprland returns for `j/clients`, `j/workspaces`
//! and `j/monitors`. Only the fields this crate's getters and the CLI use
//! are modelled; unknown fields are ignored so newer compositors still parse.

use serde::{Deserialize, Serialize};

/// Workspace reference embedded in window and monitor records
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceRef {
    pub id: i64,
    pub name: String,
}

/// A window managed by Hyprland
///
/// # Example
///
/// ```ignore
/// for window in instance.get_windows().await? {
///     println!("{} {} ({})", window.address, window.wm_class, window.title);
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    /// Hex address, e.g. `0x55d3c4a2b7e0`
    ///
    /// Event payloads use the same value without the `0x` prefix in some
    /// versions; compare with [`Window::address_as_int`].
    pub address: String,

    #[serde(rename = "class")]
    pub wm_class: String,

    pub title: String,

    #[serde(default)]
    pub initial_class: String,

    #[serde(default)]
    pub initial_title: String,

    pub workspace: WorkspaceRef,

    /// Id of the monitor the window is on
    #[serde(default)]
    pub monitor: i64,

    #[serde(default)]
    pub pid: i64,

    #[serde(default)]
    pub mapped: bool,

    #[serde(default)]
    pub hidden: bool,

    #[serde(default)]
    pub floating: bool,

    #[serde(default)]
    pub pinned: bool,

    #[serde(default)]
    pub xwayland: bool,

    /// Top-left corner in layout coordinates
    #[serde(default)]
    pub at: (i32, i32),

    #[serde(default)]
    pub size: (i32, i32),
}

impl Window {
    /// The address as an integer, for comparisons that ignore formatting
    pub fn address_as_int(&self) -> Option<u64> {
        parse_address(&self.address)
    }
}

/// A workspace, including special workspaces (negative ids)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: i64,
    pub name: String,

    /// Name of the monitor showing the workspace
    #[serde(default)]
    pub monitor: String,

    #[serde(rename = "monitorID", default)]
    pub monitor_id: i64,

    /// Number of windows on the workspace
    #[serde(default)]
    pub windows: u32,

    #[serde(rename = "hasfullscreen", default)]
    pub has_fullscreen: bool,

    /// Address of the last focused window, `0x0` if there is none
    #[serde(rename = "lastwindow", default)]
    pub last_window: String,

    #[serde(rename = "lastwindowtitle", default)]
    pub last_window_title: String,
}

/// A connected output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    pub id: i64,

    /// Connector name, e.g. `DP-1`
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub make: String,

    #[serde(default)]
    pub model: String,

    pub width: u32,
    pub height: u32,

    #[serde(default)]
    pub refresh_rate: f64,

    #[serde(default)]
    pub x: i32,

    #[serde(default)]
    pub y: i32,

    #[serde(default = "default_scale")]
    pub scale: f64,

    pub active_workspace: WorkspaceRef,

    /// `id` is 0 and `name` empty when no special workspace is shown
    #[serde(default)]
    pub special_workspace: Option<WorkspaceRef>,

    #[serde(default)]
    pub focused: bool,

    #[serde(default)]
    pub disabled: bool,
}

fn default_scale() -> f64 {
    1.0
}

/// Parse a window address, with or without the `0x` prefix
pub fn parse_address(address: &str) -> Option<u64> {
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
