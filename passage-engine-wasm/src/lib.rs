//! WASM bindings for passage-engine: plays a story inside a web page.
//!
//! The engine never touches the DOM. Everything it asks of the page is queued
//! as a JSON command that page glue drains and applies after each call:
//!
//! ```js
//! const player = new StoryPlayer(storyJson, location.hash.slice(1), undefined);
//! player.start();
//! for (const cmd of JSON.parse(player.drain_commands())) apply(cmd);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use passage_engine::{
    Host, HostError, PassageRef, SaveData, Story, StoryData, StoryError, StoryEvent, StoryState,
};

// ---------------------------------------------------------------------------
// Commands for page glue
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command {
    /// Replace the passage element's contents and set its `passage` attribute.
    Display { passage: String, html: String },
    /// `history.pushState(frame, "", "")`
    PushFrame { frame: SaveData },
    /// `history.replaceState(frame, "", "")`
    ReplaceFrame { frame: SaveData },
    SetHash { token: String },
    InsertStyle { css: String },
    SetTitle { title: String },
    ShowError { message: String },
}

/// A host that records what the page should do.
#[derive(Debug, Default)]
struct PageHost {
    hash: Option<String>,
    commands: Vec<Command>,
    /// Pages served from `file:` may forbid history writes.
    history_denied: bool,
}

impl PageHost {
    fn frame_allowed(&self) -> Result<(), HostError> {
        if self.history_denied {
            Err(HostError::Denied("the page refused a history write".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Host for PageHost {
    fn display(&mut self, passage: &PassageRef, html: &str) {
        self.commands.push(Command::Display {
            passage: passage.name.clone(),
            html: html.to_string(),
        });
    }

    fn push_frame(&mut self, frame: &SaveData) -> Result<(), HostError> {
        self.frame_allowed()?;
        self.commands.push(Command::PushFrame {
            frame: frame.clone(),
        });
        Ok(())
    }

    fn replace_frame(&mut self, frame: &SaveData) -> Result<(), HostError> {
        self.frame_allowed()?;
        self.commands.push(Command::ReplaceFrame {
            frame: frame.clone(),
        });
        Ok(())
    }

    fn location_hash(&self) -> Option<String> {
        self.hash.clone().filter(|h| !h.is_empty())
    }

    fn set_location_hash(&mut self, token: &str) {
        self.hash = Some(token.to_string());
        self.commands.push(Command::SetHash {
            token: token.to_string(),
        });
    }

    fn insert_style(&mut self, css: &str) {
        self.commands.push(Command::InsertStyle {
            css: css.to_string(),
        });
    }

    fn set_title(&mut self, title: &str) {
        self.commands.push(Command::SetTitle {
            title: title.to_string(),
        });
    }

    fn show_error(&mut self, message: &str) {
        self.commands.push(Command::ShowError {
            message: message.to_string(),
        });
    }
}

fn js_error(context: &str, err: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {err}"))
}

fn story_error(err: StoryError) -> JsError {
    JsError::new(&format!("{}: {err}", err.name()))
}

// ---------------------------------------------------------------------------
// StoryPlayer: the JS-facing API
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StoryPlayer {
    story: Story<PageHost>,
    events: Rc<RefCell<Vec<StoryEvent>>>,
}

#[wasm_bindgen]
impl StoryPlayer {
    /// Build a player from the story document as JSON. `location_hash` is the
    /// page's fragment without `#`; a save token there is restored by `start`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        story_json: &str,
        location_hash: Option<String>,
        seed: Option<u64>,
    ) -> Result<StoryPlayer, JsError> {
        let data = StoryData::parse_json(story_json).map_err(|e| js_error("Invalid story", e))?;
        let host = PageHost {
            hash: location_hash,
            ..PageHost::default()
        };
        let mut builder = Story::builder(data);
        if let Some(seed) = seed {
            builder = builder.seed(seed);
        }
        let mut story = builder.build(host).map_err(story_error)?;

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        story.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        Ok(StoryPlayer { story, events })
    }

    pub fn start(&mut self) -> Result<(), JsError> {
        self.story.start().map_err(story_error)
    }

    /// Show a passage by name.
    pub fn show(&mut self, name: &str) -> Result<(), JsError> {
        self.story.show(name, false).map_err(story_error)
    }

    /// Handle a click on an anchor; pass its raw `data-passage` attribute.
    pub fn activate_link(&mut self, data_passage: &str) -> Result<(), JsError> {
        self.story.activate_link(data_passage).map_err(story_error)
    }

    /// Handle `popstate`; pass `JSON.stringify(event.state)`, or nothing when
    /// the entry has no state.
    pub fn pop_state(&mut self, frame_json: Option<String>) -> Result<(), JsError> {
        let frame = match frame_json.as_deref() {
            None | Some("null") => None,
            Some(json) => Some(
                serde_json::from_str::<SaveData>(json)
                    .map_err(|e| js_error("Invalid history frame", e))?,
            ),
        };
        self.story.pop_state(frame).map_err(story_error)
    }

    /// Handle `hashchange`.
    pub fn hash_changed(&mut self, fragment: &str) -> Result<(), JsError> {
        self.story.hash_changed(fragment).map_err(story_error)
    }

    pub fn checkpoint(&mut self, name: Option<String>) {
        self.story.checkpoint(name.as_deref());
    }

    /// Save to the location fragment; returns the token.
    pub fn save(&mut self) -> Result<String, JsError> {
        self.story.save().map_err(story_error)
    }

    pub fn save_hash(&self) -> Result<String, JsError> {
        self.story.save_hash().map_err(story_error)
    }

    pub fn restore(&mut self, token: &str) -> Result<(), JsError> {
        self.story.restore(token).map_err(story_error)
    }

    /// Render a passage by name without navigating.
    pub fn render(&mut self, name: &str) -> Result<String, JsError> {
        self.story.render(name).map_err(story_error)
    }

    pub fn visits(&self, name: &str) -> usize {
        self.story.visits(name)
    }

    /// The story variables as a JSON object.
    pub fn state_json(&self) -> Result<String, JsError> {
        serde_json::to_string(self.story.state()).map_err(|e| js_error("Serialization error", e))
    }

    /// Replace the story variables with a JSON object.
    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsError> {
        let state: StoryState =
            serde_json::from_str(json).map_err(|e| js_error("Invalid state JSON", e))?;
        *self.story.state_mut() = state;
        Ok(())
    }

    pub fn history(&self) -> Vec<u32> {
        self.story.history().to_vec()
    }

    pub fn set_ignore_errors(&mut self, ignore: bool) {
        self.story.set_ignore_errors(ignore);
    }

    /// Turn history writes off, e.g. after `pushState` threw.
    pub fn set_history_available(&mut self, available: bool) {
        self.story.host_mut().history_denied = !available;
    }

    pub fn error_message(&self) -> String {
        self.story.error_message().to_string()
    }

    /// Take the queued page commands as a JSON array.
    pub fn drain_commands(&mut self) -> Result<String, JsError> {
        let commands = std::mem::take(&mut self.story.host_mut().commands);
        serde_json::to_string(&commands).map_err(|e| js_error("Serialization error", e))
    }

    /// Take the events emitted since the last drain as a JSON array.
    pub fn drain_events(&mut self) -> Result<String, JsError> {
        let events = std::mem::take(&mut *self.events.borrow_mut());
        serde_json::to_string(&events).map_err(|e| js_error("Serialization error", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORY: &str = r#"{
        "name": "Tiny",
        "startnode": 1,
        "passages": [
            { "pid": 1, "name": "One", "tags": "", "text": "Go [[Two]]" },
            { "pid": 2, "name": "Two", "tags": "", "text": "<% checkpoint('Two') %>Done." }
        ],
        "styles": ["body { color: red; }"]
    }"#;

    fn new_player(hash: Option<String>) -> StoryPlayer {
        match StoryPlayer::new(STORY, hash, Some(3)) {
            Ok(player) => player,
            Err(_) => panic!("fixture story should load"),
        }
    }

    fn host_commands(player: &StoryPlayer) -> Vec<Command> {
        player.story.host().commands.clone()
    }

    #[test]
    fn start_queues_style_frame_and_display() {
        let mut player = new_player(None);
        player.story.start().unwrap();
        let commands = host_commands(&player);
        assert!(matches!(commands[0], Command::InsertStyle { .. }));
        assert!(matches!(commands[1], Command::ReplaceFrame { .. }));
        match &commands[2] {
            Command::Display { passage, html } => {
                assert_eq!(passage, "One");
                assert!(html.contains("data-passage=\"Two\""));
            }
            other => panic!("expected display, got {other:?}"),
        }
    }

    #[test]
    fn commands_serialize_with_op_tags() {
        let json = serde_json::to_value(Command::SetTitle {
            title: "Tiny: Two".to_string(),
        })
        .unwrap();
        assert_eq!(json["op"], "set_title");
        assert_eq!(json["title"], "Tiny: Two");
    }

    #[test]
    fn saved_hash_resumes_in_a_new_player() {
        let mut player = new_player(None);
        player.story.start().unwrap();
        player.story.activate_link("Two").unwrap();
        let token = player.story.save().unwrap();

        let mut resumed = new_player(Some(token));
        resumed.story.start().unwrap();
        assert_eq!(resumed.history(), vec![1, 2]);
        assert!(resumed
            .events
            .borrow()
            .iter()
            .any(|e| matches!(e, StoryEvent::RestoreSucceeded)));
    }
}
