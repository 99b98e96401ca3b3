//! Hyprland event catalog and payload decoding
//!
//! The event socket delivers lines of the form `name>>field1,field2,...`.
//! Which names exist, and how many fields each carries, is fixed by the
//! compositor; this module is the client-side copy of that table.
//!
//! Decoding rules:
//! - A payload is split on `,` into at most the event's arity, so the last
//!   field keeps embedded commas (window titles do contain them).
//! - `0`/`1` fields are booleans.
//! - Workspace ids are integers; `special` and `special:<name>` map to
//!   [`SPECIAL_WORKSPACE_ID`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Token between the event name and its payload
pub const EVENT_SEPARATOR: &str = ">>";

/// Token between payload fields
const FIELD_SEPARATOR: char = ',';

/// Workspace id reported for special (scratchpad) workspaces
pub const SPECIAL_WORKSPACE_ID: i64 = -99;

macro_rules! event_kinds {
    ($($variant:ident => $name:literal, $arity:literal;)+) => {
        /// Every event name the client knows how to decode
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum EventKind {
            $($variant,)+
        }

        impl EventKind {
            /// All known kinds, in protocol-name order
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant,)+];

            /// The name used on the wire
            pub fn name(self) -> &'static str {
                match self {
                    $(EventKind::$variant => $name,)+
                }
            }

            /// Look up a wire name; `None` for names this client does not model
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(EventKind::$variant),)+
                    _ => None,
                }
            }

            /// Number of comma-separated payload fields
            pub fn arity(self) -> usize {
                match self {
                    $(EventKind::$variant => $arity,)+
                }
            }
        }
    };
}

event_kinds! {
    ActiveLayout => "activelayout", 2;
    ActiveSpecial => "activespecial", 2;
    ActiveWindow => "activewindow", 2;
    ActiveWindowV2 => "activewindowv2", 1;
    ChangeFloatingMode => "changefloatingmode", 2;
    CloseLayer => "closelayer", 1;
    CloseWindow => "closewindow", 1;
    ConfigReloaded => "configreloaded", 0;
    CreateWorkspace => "createworkspace", 1;
    CreateWorkspaceV2 => "createworkspacev2", 2;
    DestroyWorkspace => "destroyworkspace", 1;
    DestroyWorkspaceV2 => "destroyworkspacev2", 2;
    FocusedMon => "focusedmon", 2;
    Fullscreen => "fullscreen", 1;
    IgnoreGroupLock => "ignoregrouplock", 1;
    LockGroups => "lockgroups", 1;
    Minimize => "minimize", 2;
    MonitorAdded => "monitoradded", 1;
    MonitorAddedV2 => "monitoraddedv2", 3;
    MonitorRemoved => "monitorremoved", 1;
    MoveIntoGroup => "moveintogroup", 1;
    MoveOutOfGroup => "moveoutofgroup", 1;
    MoveWindow => "movewindow", 2;
    MoveWindowV2 => "movewindowv2", 3;
    MoveWorkspace => "moveworkspace", 2;
    MoveWorkspaceV2 => "moveworkspacev2", 3;
    OpenLayer => "openlayer", 1;
    OpenWindow => "openwindow", 4;
    Pin => "pin", 2;
    RenameWorkspace => "renameworkspace", 2;
    Screencast => "screencast", 2;
    Submap => "submap", 1;
    ToggleGroup => "togglegroup", 2;
    Urgent => "urgent", 1;
    WindowTitle => "windowtitle", 1;
    Workspace => "workspace", 1;
    WorkspaceV2 => "workspacev2", 2;
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name half of an event line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName<'a> {
    Known(EventKind),
    /// Emitted by a newer compositor; never routed
    Unknown(&'a str),
}

/// One event line split into name and raw payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent<'a> {
    pub name: EventName<'a>,
    pub payload: &'a str,
}

impl<'a> RawEvent<'a> {
    /// Split `line` at the first `>>`
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::MissingSeparator` if the line has no `>>`.
    pub fn parse(line: &'a str) -> Result<Self, DecodeError> {
        let (name, payload) =
            line.split_once(EVENT_SEPARATOR)
                .ok_or_else(|| DecodeError::MissingSeparator {
                    line: line.to_string(),
                })?;

        let name = match EventKind::from_name(name) {
            Some(kind) => EventName::Known(kind),
            None => EventName::Unknown(name),
        };

        Ok(Self { name, payload })
    }
}

/// Why an event line could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("event line has no '>>' separator: {line:?}")]
    MissingSeparator { line: String },

    #[error("event line is not valid UTF-8")]
    InvalidUtf8,

    #[error("'{event}' event is missing field '{field}'")]
    MissingField {
        event: EventKind,
        field: &'static str,
    },

    #[error("'{event}' field '{field}' is not an integer: {value:?}")]
    InvalidInteger {
        event: EventKind,
        field: &'static str,
        value: String,
    },

    #[error("'{event}' field '{field}' is not 0 or 1: {value:?}")]
    InvalidBool {
        event: EventKind,
        field: &'static str,
        value: String,
    },
}

/// A decoded compositor event with its named fields
///
/// Serializes as `{"event": "<wire name>", ...fields}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Event {
    ActiveLayout {
        keyboard_name: String,
        layout_name: String,
    },
    /// `workspace_name` is empty when the special workspace was closed
    ActiveSpecial {
        workspace_name: String,
        monitor_name: String,
    },
    ActiveWindow {
        window_class: String,
        window_title: String,
    },
    /// `window_address` is `None` when focus left all windows
    ActiveWindowV2 {
        window_address: Option<String>,
    },
    ChangeFloatingMode {
        window_address: String,
        is_floating: bool,
    },
    CloseLayer {
        namespace: String,
    },
    CloseWindow {
        window_address: String,
    },
    ConfigReloaded,
    CreateWorkspace {
        workspace_id: i64,
        workspace_name: String,
    },
    CreateWorkspaceV2 {
        workspace_id: i64,
        workspace_name: String,
    },
    DestroyWorkspace {
        workspace_id: i64,
        workspace_name: String,
    },
    DestroyWorkspaceV2 {
        workspace_id: i64,
        workspace_name: String,
    },
    FocusedMon {
        monitor_name: String,
        workspace_name: String,
    },
    Fullscreen {
        is_fullscreen: bool,
    },
    IgnoreGroupLock {
        enabled: bool,
    },
    LockGroups {
        locked: bool,
    },
    Minimize {
        window_address: String,
        is_minimized: bool,
    },
    MonitorAdded {
        monitor_name: String,
    },
    MonitorAddedV2 {
        monitor_id: i64,
        monitor_name: String,
        monitor_description: String,
    },
    MonitorRemoved {
        monitor_name: String,
    },
    MoveIntoGroup {
        window_address: String,
    },
    MoveOutOfGroup {
        window_address: String,
    },
    MoveWindow {
        window_address: String,
        workspace_name: String,
    },
    MoveWindowV2 {
        window_address: String,
        workspace_id: i64,
        workspace_name: String,
    },
    MoveWorkspace {
        workspace_name: String,
        monitor_name: String,
    },
    MoveWorkspaceV2 {
        workspace_id: i64,
        workspace_name: String,
        monitor_name: String,
    },
    OpenLayer {
        namespace: String,
    },
    OpenWindow {
        window_address: String,
        workspace_name: String,
        window_class: String,
        window_title: String,
    },
    Pin {
        window_address: String,
        is_pinned: bool,
    },
    RenameWorkspace {
        workspace_id: i64,
        new_name: String,
    },
    /// `is_window_share` is false for a whole-monitor share
    Screencast {
        is_active: bool,
        is_window_share: bool,
    },
    /// `submap_name` is empty for the default submap
    Submap {
        submap_name: String,
    },
    /// `is_open` is false when the group was destroyed
    ToggleGroup {
        is_open: bool,
        window_addresses: Vec<String>,
    },
    Urgent {
        window_address: String,
    },
    WindowTitle {
        window_address: String,
    },
    Workspace {
        workspace_id: i64,
        workspace_name: String,
    },
    WorkspaceV2 {
        workspace_id: i64,
        workspace_name: String,
    },
}

impl Event {
    /// Decode `payload` according to the schema of `kind`
    pub fn decode(kind: EventKind, payload: &str) -> Result<Self, DecodeError> {
        let mut f = Fields::new(kind, payload);

        let event = match kind {
            EventKind::ActiveLayout => Event::ActiveLayout {
                keyboard_name: f.text("keyboard_name")?,
                layout_name: f.text("layout_name")?,
            },
            EventKind::ActiveSpecial => Event::ActiveSpecial {
                workspace_name: f.text("workspace_name")?,
                monitor_name: f.text("monitor_name")?,
            },
            EventKind::ActiveWindow => Event::ActiveWindow {
                window_class: f.text("window_class")?,
                window_title: f.text("window_title")?,
            },
            EventKind::ActiveWindowV2 => {
                let address = f.text("window_address")?;
                Event::ActiveWindowV2 {
                    window_address: match address.as_str() {
                        "" | "," => None,
                        _ => Some(address),
                    },
                }
            }
            EventKind::ChangeFloatingMode => Event::ChangeFloatingMode {
                window_address: f.text("window_address")?,
                is_floating: f.flag("is_floating")?,
            },
            EventKind::CloseLayer => Event::CloseLayer {
                namespace: f.text("namespace")?,
            },
            EventKind::CloseWindow => Event::CloseWindow {
                window_address: f.text("window_address")?,
            },
            EventKind::ConfigReloaded => Event::ConfigReloaded,
            EventKind::CreateWorkspace => {
                let (workspace_id, workspace_name) = f.named_workspace()?;
                Event::CreateWorkspace {
                    workspace_id,
                    workspace_name,
                }
            }
            EventKind::CreateWorkspaceV2 => Event::CreateWorkspaceV2 {
                workspace_id: f.workspace_id("workspace_id")?,
                workspace_name: f.text("workspace_name")?,
            },
            EventKind::DestroyWorkspace => {
                let (workspace_id, workspace_name) = f.named_workspace()?;
                Event::DestroyWorkspace {
                    workspace_id,
                    workspace_name,
                }
            }
            EventKind::DestroyWorkspaceV2 => Event::DestroyWorkspaceV2 {
                workspace_id: f.workspace_id("workspace_id")?,
                workspace_name: f.text("workspace_name")?,
            },
            EventKind::FocusedMon => Event::FocusedMon {
                monitor_name: f.text("monitor_name")?,
                workspace_name: f.text("workspace_name")?,
            },
            EventKind::Fullscreen => Event::Fullscreen {
                is_fullscreen: f.flag("is_fullscreen")?,
            },
            EventKind::IgnoreGroupLock => Event::IgnoreGroupLock {
                enabled: f.flag("enabled")?,
            },
            EventKind::LockGroups => Event::LockGroups {
                locked: f.flag("locked")?,
            },
            EventKind::Minimize => Event::Minimize {
                window_address: f.text("window_address")?,
                is_minimized: f.flag("is_minimized")?,
            },
            EventKind::MonitorAdded => Event::MonitorAdded {
                monitor_name: f.text("monitor_name")?,
            },
            EventKind::MonitorAddedV2 => Event::MonitorAddedV2 {
                monitor_id: f.integer("monitor_id")?,
                monitor_name: f.text("monitor_name")?,
                monitor_description: f.text("monitor_description")?,
            },
            EventKind::MonitorRemoved => Event::MonitorRemoved {
                monitor_name: f.text("monitor_name")?,
            },
            EventKind::MoveIntoGroup => Event::MoveIntoGroup {
                window_address: f.text("window_address")?,
            },
            EventKind::MoveOutOfGroup => Event::MoveOutOfGroup {
                window_address: f.text("window_address")?,
            },
            EventKind::MoveWindow => Event::MoveWindow {
                window_address: f.text("window_address")?,
                workspace_name: f.text("workspace_name")?,
            },
            EventKind::MoveWindowV2 => Event::MoveWindowV2 {
                window_address: f.text("window_address")?,
                workspace_id: f.workspace_id("workspace_id")?,
                workspace_name: f.text("workspace_name")?,
            },
            EventKind::MoveWorkspace => Event::MoveWorkspace {
                workspace_name: f.text("workspace_name")?,
                monitor_name: f.text("monitor_name")?,
            },
            EventKind::MoveWorkspaceV2 => Event::MoveWorkspaceV2 {
                workspace_id: f.workspace_id("workspace_id")?,
                workspace_name: f.text("workspace_name")?,
                monitor_name: f.text("monitor_name")?,
            },
            EventKind::OpenLayer => Event::OpenLayer {
                namespace: f.text("namespace")?,
            },
            EventKind::OpenWindow => Event::OpenWindow {
                window_address: f.text("window_address")?,
                workspace_name: f.text("workspace_name")?,
                window_class: f.text("window_class")?,
                window_title: f.text("window_title")?,
            },
            EventKind::Pin => Event::Pin {
                window_address: f.text("window_address")?,
                is_pinned: f.flag("is_pinned")?,
            },
            EventKind::RenameWorkspace => Event::RenameWorkspace {
                workspace_id: f.workspace_id("workspace_id")?,
                new_name: f.text("new_name")?,
            },
            EventKind::Screencast => Event::Screencast {
                is_active: f.flag("is_active")?,
                is_window_share: f.flag("is_window_share")?,
            },
            EventKind::Submap => Event::Submap {
                submap_name: f.text("submap_name")?,
            },
            EventKind::ToggleGroup => {
                let is_open = f.flag("is_open")?;
                let window_addresses = f
                    .optional_text()
                    .map(|rest| {
                        rest.split(FIELD_SEPARATOR)
                            .filter(|address| !address.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
                Event::ToggleGroup {
                    is_open,
                    window_addresses,
                }
            }
            EventKind::Urgent => Event::Urgent {
                window_address: f.text("window_address")?,
            },
            EventKind::WindowTitle => Event::WindowTitle {
                window_address: f.text("window_address")?,
            },
            EventKind::Workspace => {
                let (workspace_id, workspace_name) = f.named_workspace()?;
                Event::Workspace {
                    workspace_id,
                    workspace_name,
                }
            }
            EventKind::WorkspaceV2 => Event::WorkspaceV2 {
                workspace_id: f.workspace_id("workspace_id")?,
                workspace_name: f.text("workspace_name")?,
            },
        };

        Ok(event)
    }

    /// Parse and decode a whole line
    ///
    /// Returns `Ok(None)` for event names outside the catalog.
    pub fn from_line(line: &str) -> Result<Option<Self>, DecodeError> {
        let raw = RawEvent::parse(line)?;
        match raw.name {
            EventName::Known(kind) => Self::decode(kind, raw.payload).map(Some),
            EventName::Unknown(_) => Ok(None),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::ActiveLayout { .. } => EventKind::ActiveLayout,
            Event::ActiveSpecial { .. } => EventKind::ActiveSpecial,
            Event::ActiveWindow { .. } => EventKind::ActiveWindow,
            Event::ActiveWindowV2 { .. } => EventKind::ActiveWindowV2,
            Event::ChangeFloatingMode { .. } => EventKind::ChangeFloatingMode,
            Event::CloseLayer { .. } => EventKind::CloseLayer,
            Event::CloseWindow { .. } => EventKind::CloseWindow,
            Event::ConfigReloaded => EventKind::ConfigReloaded,
            Event::CreateWorkspace { .. } => EventKind::CreateWorkspace,
            Event::CreateWorkspaceV2 { .. } => EventKind::CreateWorkspaceV2,
            Event::DestroyWorkspace { .. } => EventKind::DestroyWorkspace,
            Event::DestroyWorkspaceV2 { .. } => EventKind::DestroyWorkspaceV2,
            Event::FocusedMon { .. } => EventKind::FocusedMon,
            Event::Fullscreen { .. } => EventKind::Fullscreen,
            Event::IgnoreGroupLock { .. } => EventKind::IgnoreGroupLock,
            Event::LockGroups { .. } => EventKind::LockGroups,
            Event::Minimize { .. } => EventKind::Minimize,
            Event::MonitorAdded { .. } => EventKind::MonitorAdded,
            Event::MonitorAddedV2 { .. } => EventKind::MonitorAddedV2,
            Event::MonitorRemoved { .. } => EventKind::MonitorRemoved,
            Event::MoveIntoGroup { .. } => EventKind::MoveIntoGroup,
            Event::MoveOutOfGroup { .. } => EventKind::MoveOutOfGroup,
            Event::MoveWindow { .. } => EventKind::MoveWindow,
            Event::MoveWindowV2 { .. } => EventKind::MoveWindowV2,
            Event::MoveWorkspace { .. } => EventKind::MoveWorkspace,
            Event::MoveWorkspaceV2 { .. } => EventKind::MoveWorkspaceV2,
            Event::OpenLayer { .. } => EventKind::OpenLayer,
            Event::OpenWindow { .. } => EventKind::OpenWindow,
            Event::Pin { .. } => EventKind::Pin,
            Event::RenameWorkspace { .. } => EventKind::RenameWorkspace,
            Event::Screencast { .. } => EventKind::Screencast,
            Event::Submap { .. } => EventKind::Submap,
            Event::ToggleGroup { .. } => EventKind::ToggleGroup,
            Event::Urgent { .. } => EventKind::Urgent,
            Event::WindowTitle { .. } => EventKind::WindowTitle,
            Event::Workspace { .. } => EventKind::Workspace,
            Event::WorkspaceV2 { .. } => EventKind::WorkspaceV2,
        }
    }
}

/// Map a workspace reference to its id, honouring the special sentinel
pub fn parse_workspace_id(value: &str) -> Option<i64> {
    if value == "special" || value.starts_with("special:") {
        return Some(SPECIAL_WORKSPACE_ID);
    }
    value.parse().ok()
}

/// Cursor over the comma-separated fields of one payload
struct Fields<'a> {
    kind: EventKind,
    parts: std::str::SplitN<'a, char>,
}

impl<'a> Fields<'a> {
    fn new(kind: EventKind, payload: &'a str) -> Self {
        Self {
            kind,
            // arity 0 still needs a valid SplitN; it is simply never read
            parts: payload.splitn(kind.arity().max(1), FIELD_SEPARATOR),
        }
    }

    fn text(&mut self, field: &'static str) -> Result<String, DecodeError> {
        self.parts
            .next()
            .map(String::from)
            .ok_or(DecodeError::MissingField {
                event: self.kind,
                field,
            })
    }

    fn optional_text(&mut self) -> Option<&'a str> {
        self.parts.next()
    }

    fn flag(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        let value = self.text(field)?;
        match value.as_str() {
            "1" => Ok(true),
            "0" => Ok(false),
            _ => Err(DecodeError::InvalidBool {
                event: self.kind,
                field,
                value,
            }),
        }
    }

    fn integer(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        let value = self.text(field)?;
        value.parse().map_err(|_| DecodeError::InvalidInteger {
            event: self.kind,
            field,
            value,
        })
    }

    fn workspace_id(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        let value = self.text(field)?;
        parse_workspace_id(&value).ok_or(DecodeError::InvalidInteger {
            event: self.kind,
            field,
            value,
        })
    }

    /// v1 workspace events carry only the name; the id is derived from it
    fn named_workspace(&mut self) -> Result<(i64, String), DecodeError> {
        let name = self.text("workspace_name")?;
        let id = parse_workspace_id(&name).ok_or_else(|| DecodeError::InvalidInteger {
            event: self.kind,
            field: "workspace_id",
            value: name.clone(),
        })?;
        Ok((id, name))
    }
}
