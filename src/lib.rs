//! Passage Engine: a playback runtime for hypertext stories.
//!
//! A story is a graph of passages. The engine renders one passage at a time
//! onto a host surface, keeps the player's history and variables, and can
//! resume a session from a compact save token, all without a server.
//!
//! ```no_run
//! use passage_engine::{MemoryHost, Story, StoryData};
//!
//! let data = StoryData::load_from_ron("story.ron".as_ref())?;
//! let mut story = Story::builder(data).seed(42).build(MemoryHost::new())?;
//! story.start()?;
//! story.activate_link("Cellar")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod core;
pub mod schema;

pub use crate::core::codec::{PersistenceError, SaveData};
pub use crate::core::host::{Host, HostError, MemoryHost};
pub use crate::core::markup::{RenderError, Rendered};
pub use crate::core::script::ScriptError;
pub use crate::core::state::StoryState;
pub use crate::core::store::PassageStore;
pub use crate::core::story::{Phase, Story, StoryBuilder, StoryError};
pub use crate::schema::event::{ErrorKind, StoryEvent};
pub use crate::schema::passage::{Passage, PassageKey, PassageRef};
pub use crate::schema::story_data::{PassageData, StoryData, StoryDataError};
