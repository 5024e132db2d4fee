use serde::{Deserialize, Serialize};
use std::fmt;

use super::passage::PassageRef;

/// Which family of failure an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A navigation target does not exist.
    Navigation,
    /// A template or markup stage failed.
    Render,
    /// A save token could not be decoded.
    Persistence,
    /// The host refused to store a history frame.
    HistoryWrite,
    /// A startup script failed.
    UserScript,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Navigation => "NavigationError",
            Self::Render => "RenderError",
            Self::Persistence => "PersistenceError",
            Self::HistoryWrite => "HistoryWriteError",
            Self::UserScript => "UserScriptError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lifecycle notification for external observers.
///
/// Events are fire-and-forget: nothing an observer does feeds back into the
/// engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoryEvent {
    /// Startup finished; the first passage is about to be shown.
    Started { story: String },
    /// The current passage is about to be replaced.
    Hidden { passage: Option<PassageRef> },
    /// A passage is about to be displayed.
    Showing { passage: PassageRef },
    /// A passage has been written to the display surface.
    Shown { passage: PassageRef },
    CheckpointAdding { name: Option<String> },
    CheckpointAdded { name: String },
    /// The host refused a history frame.
    CheckpointError { error: String, description: String },
    Saved,
    RestoreSucceeded,
    RestoreFailed { error: String },
    /// A reported failure, recovered or not.
    Error {
        kind: ErrorKind,
        source: String,
        message: String,
    },
    /// Raised by story scripts through `emit(name, detail)`.
    Custom {
        name: String,
        detail: serde_json::Value,
    },
}

impl StoryEvent {
    /// The notification name observers subscribe to.
    pub fn name(&self) -> &str {
        match self {
            Self::Started { .. } => "story:started",
            Self::Hidden { .. } => "story:hidden",
            Self::Showing { .. } => "story:showing",
            Self::Shown { .. } => "story:shown",
            Self::CheckpointAdding { .. } => "checkpoint:adding",
            Self::CheckpointAdded { .. } => "checkpoint:added",
            Self::CheckpointError { .. } => "checkpoint:error",
            Self::Saved => "story:saved",
            Self::RestoreSucceeded => "restore:success",
            Self::RestoreFailed { .. } => "restore:error",
            Self::Error { .. } => "error",
            Self::Custom { name, .. } => name.as_str(),
        }
    }
}
