//! The surface a story plays on: display, history frames, location fragment,
//! page title and styles.

use thiserror::Error;

use crate::core::codec::SaveData;
use crate::schema::passage::PassageRef;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host forbids the operation, e.g. history writes from a `file:` page.
    #[error("security restriction: {0}")]
    Denied(String),
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

/// Everything the engine asks of its environment.
pub trait Host {
    /// Replace the display surface with `html`, tagged with the passage.
    fn display(&mut self, passage: &PassageRef, html: &str);

    /// Open a new back-stack entry holding `frame`.
    fn push_frame(&mut self, frame: &SaveData) -> Result<(), HostError>;

    /// Overwrite the current back-stack entry with `frame`.
    fn replace_frame(&mut self, frame: &SaveData) -> Result<(), HostError>;

    /// The addressable-location fragment, without `#`, if any.
    fn location_hash(&self) -> Option<String>;

    fn set_location_hash(&mut self, token: &str);

    fn insert_style(&mut self, css: &str);

    fn set_title(&mut self, title: &str);

    /// Replace the display surface with a halted-session message.
    fn show_error(&mut self, message: &str);
}

/// A host that keeps everything in memory. Useful for tests, terminal
/// players and server-side rendering.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    /// Current passage and its markup.
    pub screen: Option<(PassageRef, String)>,
    /// Back-stack entries, oldest first. The page's initial entry has no frame.
    pub frames: Vec<Option<SaveData>>,
    pub hash: Option<String>,
    pub styles: Vec<String>,
    pub title: Option<String>,
    pub error_screen: Option<String>,
    /// When set, every history write is refused.
    pub deny_history: bool,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self {
            screen: None,
            frames: vec![None],
            hash: None,
            styles: Vec::new(),
            title: None,
            error_screen: None,
            deny_history: false,
        }
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose location fragment already holds `token`.
    pub fn with_hash(token: impl Into<String>) -> Self {
        Self {
            hash: Some(token.into()),
            ..Self::default()
        }
    }

    /// Step back one entry, returning the frame now current. `None` when
    /// already at the first entry.
    pub fn back(&mut self) -> Option<Option<SaveData>> {
        if self.frames.len() <= 1 {
            return None;
        }
        self.frames.pop();
        self.frames.last().cloned()
    }

    pub fn html(&self) -> Option<&str> {
        self.screen.as_ref().map(|(_, html)| html.as_str())
    }

    pub fn passage_name(&self) -> Option<&str> {
        self.screen.as_ref().map(|(p, _)| p.name.as_str())
    }

    fn check_history(&self) -> Result<(), HostError> {
        if self.deny_history {
            Err(HostError::Denied("history writes are disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Host for MemoryHost {
    fn display(&mut self, passage: &PassageRef, html: &str) {
        self.screen = Some((passage.clone(), html.to_string()));
    }

    fn push_frame(&mut self, frame: &SaveData) -> Result<(), HostError> {
        self.check_history()?;
        self.frames.push(Some(frame.clone()));
        Ok(())
    }

    fn replace_frame(&mut self, frame: &SaveData) -> Result<(), HostError> {
        self.check_history()?;
        match self.frames.last_mut() {
            Some(top) => *top = Some(frame.clone()),
            None => self.frames.push(Some(frame.clone())),
        }
        Ok(())
    }

    fn location_hash(&self) -> Option<String> {
        self.hash.clone().filter(|h| !h.is_empty())
    }

    fn set_location_hash(&mut self, token: &str) {
        self.hash = Some(token.to_string());
    }

    fn insert_style(&mut self, css: &str) {
        self.styles.push(css.to_string());
    }

    fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    fn show_error(&mut self, message: &str) {
        self.error_screen = Some(message.to_string());
    }
}
