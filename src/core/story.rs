//! The navigation engine: current passage, history, state and checkpoints.

use std::marker::PhantomData;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::core::bus::{EventBus, ObserverId};
use crate::core::codec::{self, PersistenceError, SaveData};
use crate::core::host::{Host, HostError};
use crate::core::markup::{self, RenderError, Rendered};
use crate::core::scope::{Effects, RenderScope};
use crate::core::script::{Program, ScriptError};
use crate::core::state::StoryState;
use crate::core::store::PassageStore;
use crate::schema::event::{ErrorKind, StoryEvent};
use crate::schema::passage::{unescape_html, Passage, PassageKey};
use crate::schema::story_data::StoryData;

/// Default bound on `render(...)` nesting inside passages.
pub const DEFAULT_MAX_RENDER_DEPTH: usize = 16;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("There is no passage with the ID or name \"{0}\"")]
    Navigation(PassageKey),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    HistoryWrite(#[from] HostError),
    #[error(transparent)]
    UserScript(#[from] ScriptError),
}

impl StoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Navigation(_) => ErrorKind::Navigation,
            Self::Render(_) => ErrorKind::Render,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::HistoryWrite(_) => ErrorKind::HistoryWrite,
            Self::UserScript(_) => ErrorKind::UserScript,
        }
    }

    /// Error name shown to players. Script failures keep their own name
    /// (`TypeError`, `ReferenceError`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Render(err) => err.name(),
            Self::UserScript(err) => err.name(),
            other => other.kind().name(),
        }
    }
}

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Built but not started.
    Idle,
    /// A passage is on the display surface.
    Showing { passage: u32 },
}

/// A story being played.
///
/// Built with [`Story::builder`]. The story owns its state bag, history and
/// checkpoint label; the host owns the display and the back-stack.
pub struct Story<H: Host> {
    name: String,
    start_passage: u32,
    creator: String,
    creator_version: String,
    store: PassageStore,
    scripts: Vec<String>,
    styles: Vec<String>,

    history: Vec<u32>,
    state: StoryState,
    checkpoint_name: String,
    at_checkpoint: bool,
    ignore_errors: bool,
    error_message: String,
    phase: Phase,

    max_render_depth: usize,
    rng: StdRng,
    bus: EventBus,
    host: H,
}

/// Builder for constructing a [`Story`]. The host type is fixed by
/// [`StoryBuilder::build`].
pub struct StoryBuilder<H> {
    data: StoryData,
    seed: Option<u64>,
    ignore_errors: bool,
    max_render_depth: usize,
    _host: PhantomData<fn() -> H>,
}

impl<H: Host> StoryBuilder<H> {
    /// Seed the `random(...)` helper. Without a seed it draws from entropy.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Keep the passage on screen when a runtime error occurs.
    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    pub fn max_render_depth(mut self, depth: usize) -> Self {
        self.max_render_depth = depth;
        self
    }

    /// Index the passages and attach the host. Fails if the start passage
    /// does not exist.
    pub fn build(self, host: H) -> Result<Story<H>, StoryError> {
        let data = self.data;
        let store = PassageStore::from_data(&data.passages);
        if !store.contains_id(data.start_node) {
            return Err(StoryError::Navigation(PassageKey::Id(data.start_node)));
        }
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        tracing::debug!(
            story = %data.name,
            passages = store.len(),
            scripts = data.scripts.len(),
            "story built"
        );

        Ok(Story {
            name: data.name,
            start_passage: data.start_node,
            creator: data.creator,
            creator_version: data.creator_version,
            store,
            scripts: data.scripts,
            styles: data.styles,
            history: Vec::new(),
            state: StoryState::new(),
            checkpoint_name: String::new(),
            at_checkpoint: false,
            ignore_errors: self.ignore_errors,
            error_message: String::new(),
            phase: Phase::Idle,
            max_render_depth: self.max_render_depth,
            rng,
            bus: EventBus::new(),
            host,
        })
    }
}

impl<H: Host> Story<H> {
    pub fn builder(data: StoryData) -> StoryBuilder<H> {
        StoryBuilder {
            data,
            seed: None,
            ignore_errors: false,
            max_render_depth: DEFAULT_MAX_RENDER_DEPTH,
            _host: PhantomData,
        }
    }

    // --- Lifecycle ---

    /// Begin play: insert user styles, run user scripts, then resume from
    /// the host's location fragment or show the start passage.
    #[tracing::instrument(level = "debug", skip(self), fields(story = %self.name))]
    pub fn start(&mut self) -> Result<(), StoryError> {
        for css in &self.styles {
            self.host.insert_style(css);
        }
        self.run_user_scripts();
        let started = StoryEvent::Started {
            story: self.name.clone(),
        };
        self.emit(&started);

        if let Some(token) = self.host.location_hash() {
            if self.restore(&token).is_ok() {
                return Ok(());
            }
        }
        self.show(self.start_passage, false)?;
        self.at_checkpoint = true;
        Ok(())
    }

    fn run_user_scripts(&mut self) {
        for (index, script) in self.scripts.clone().iter().enumerate() {
            let mut scope = RenderScope::new(
                &mut self.state,
                &self.history,
                &self.store,
                &mut self.rng,
                self.max_render_depth,
            );
            let result = Program::compile_script(script).and_then(|p| p.run(&mut scope));
            let effects = scope.into_effects();
            if let Err(err) = result {
                tracing::warn!(script = index, error = %err, "user script failed");
                self.report(&StoryError::UserScript(err), &format!("user script {}", index + 1));
            }
            self.apply_effects(effects, true);
        }
    }

    // --- Navigation ---

    /// Display a passage, replacing the current one.
    ///
    /// Unless `no_history` is set, the passage is appended to the history and
    /// a frame is written to the host: a new back-stack entry right after a
    /// checkpoint, otherwise an overwrite of the current entry. An unknown
    /// passage fails with [`StoryError::Navigation`] and changes nothing.
    pub fn show(&mut self, key: impl Into<PassageKey>, no_history: bool) -> Result<(), StoryError> {
        self.show_passage(key.into(), no_history)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn show_passage(&mut self, key: PassageKey, no_history: bool) -> Result<(), StoryError> {
        let (passage, source) = match self.store.lookup(&key) {
            Some(p) => (p.to_ref(), p.source.clone()),
            None => return Err(StoryError::Navigation(key)),
        };

        let hidden = StoryEvent::Hidden {
            passage: self.current().map(Passage::to_ref),
        };
        self.emit(&hidden);
        self.emit(&StoryEvent::Showing {
            passage: passage.clone(),
        });

        if !no_history {
            self.history.push(passage.id);
            self.write_frame(&key);
        }

        self.phase = Phase::Showing {
            passage: passage.id,
        };
        self.at_checkpoint = false;

        let (rendered, effects) = self.render_source(&source);
        self.host.display(&passage, &rendered.html);
        self.report_render_errors(rendered.errors, "show");
        self.apply_effects(effects, true);

        self.emit(&StoryEvent::Shown { passage });
        Ok(())
    }

    /// Write the current snapshot as a history frame. A refusal is reported
    /// and play continues.
    fn write_frame(&mut self, key: &PassageKey) {
        let frame = self.snapshot();
        let written = if self.at_checkpoint {
            self.host.push_frame(&frame)
        } else {
            self.host.replace_frame(&frame)
        };
        match written {
            Ok(()) => self.emit(&StoryEvent::CheckpointAdded {
                name: key.to_string(),
            }),
            Err(err) => {
                tracing::warn!(error = %err, "history frame refused");
                self.emit(&StoryEvent::CheckpointError {
                    error: err.to_string(),
                    description: "Checkpoint failed to save".to_string(),
                });
            }
        }
    }

    /// Render a passage without touching history, display or checkpoint
    /// state, for embedding one passage in another.
    pub fn render(&mut self, key: impl Into<PassageKey>) -> Result<String, StoryError> {
        let key = key.into();
        let Some(source) = self.store.lookup(&key).map(|p| p.source.clone()) else {
            let err = StoryError::Navigation(key);
            self.report(&err, "render");
            return Err(err);
        };
        let (rendered, effects) = self.render_source(&source);
        self.report_render_errors(rendered.errors, "render");
        self.apply_effects(effects, false);
        Ok(rendered.html)
    }

    /// Mark the next `show` as opening a new back-stack entry. A name also
    /// becomes part of the page title.
    pub fn checkpoint(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                self.host.set_title(&format!("{}: {}", self.name, name));
                self.checkpoint_name = name.to_string();
            }
            None => self.checkpoint_name.clear(),
        }
        self.at_checkpoint = true;
        self.emit(&StoryEvent::CheckpointAdding {
            name: name.map(str::to_string),
        });
    }

    // --- Host-triggered entry points ---

    /// Handle activation of an anchor carrying `data-passage`.
    pub fn activate_link(&mut self, data_passage: &str) -> Result<(), StoryError> {
        let target = unescape_html(data_passage);
        self.show(target, false)
            .inspect_err(|err| self.fail(err, "link activation"))
    }

    /// Handle back/forward navigation. `frame` is the frame of the entry the
    /// host moved to, if it has one.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn pop_state(&mut self, frame: Option<SaveData>) -> Result<(), StoryError> {
        let result = match frame {
            Some(frame) => self.resume(frame),
            None if self.history.len() > 1 => {
                self.state.clear();
                self.history.clear();
                self.checkpoint_name.clear();
                self.show(self.start_passage, true)
            }
            None => Ok(()),
        };
        result.inspect_err(|err| self.fail(err, "history navigation"))
    }

    /// Handle a change of the location fragment.
    pub fn hash_changed(&mut self, fragment: &str) -> Result<(), StoryError> {
        self.restore(fragment)
    }

    // --- Persistence ---

    /// The current save token, without side effects.
    pub fn save_hash(&self) -> Result<String, StoryError> {
        Ok(codec::encode(&self.snapshot())?)
    }

    /// Put the current save token in the host's location fragment.
    pub fn save(&mut self) -> Result<String, StoryError> {
        let token = self.save_hash()?;
        self.host.set_location_hash(&token);
        self.emit(&StoryEvent::Saved);
        Ok(token)
    }

    /// Resume from a save token. Nothing changes unless the token decodes to
    /// a non-empty history of known passages.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn restore(&mut self, token: &str) -> Result<(), StoryError> {
        let result = codec::decode(token)
            .map_err(StoryError::from)
            .and_then(|save| self.resume(save));
        match &result {
            Ok(()) => self.emit(&StoryEvent::RestoreSucceeded),
            Err(err) => {
                tracing::warn!(error = %err, "restore failed");
                self.emit(&StoryEvent::RestoreFailed {
                    error: err.to_string(),
                });
            }
        }
        result
    }

    fn resume(&mut self, save: SaveData) -> Result<(), StoryError> {
        let last = self.validate(&save)?;
        self.state = save.state;
        self.history = save.history;
        self.checkpoint_name = save.checkpoint_name;
        self.show(last, true)
    }

    fn validate(&self, save: &SaveData) -> Result<u32, PersistenceError> {
        if let Some(&missing) = save.history.iter().find(|&&id| !self.store.contains_id(id)) {
            return Err(PersistenceError::UnknownPassage(missing));
        }
        save.last_passage().ok_or(PersistenceError::EmptyHistory)
    }

    /// Everything a save or history frame carries.
    pub fn snapshot(&self) -> SaveData {
        SaveData {
            state: self.state.clone(),
            history: self.history.clone(),
            checkpoint_name: self.checkpoint_name.clone(),
        }
    }

    // --- Errors and events ---

    /// Report an unrecovered error: record the player-facing message and,
    /// unless errors are ignored, put it on the display surface.
    pub fn fail(&mut self, err: &StoryError, source: &str) {
        self.error_message = format!("In {source}: {}: {err}", err.name());
        self.report(err, source);
        if !self.ignore_errors {
            self.host.show_error(&self.error_message);
        }
    }

    fn report(&mut self, err: &StoryError, source: &str) {
        tracing::debug!(kind = %err.kind(), source, error = %err, "reported error");
        self.emit(&StoryEvent::Error {
            kind: err.kind(),
            source: source.to_string(),
            message: err.to_string(),
        });
    }

    fn report_render_errors(&mut self, errors: Vec<RenderError>, source: &str) {
        for err in errors {
            self.report(&StoryError::Render(err), source);
        }
    }

    fn emit(&mut self, event: &StoryEvent) {
        self.bus.emit(event);
    }

    /// Receive every event.
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&StoryEvent) + 'static,
    {
        self.bus.subscribe(observer)
    }

    /// Receive events named `name`, e.g. `"story:shown"`.
    pub fn on<F>(&mut self, name: &str, observer: F) -> ObserverId
    where
        F: FnMut(&StoryEvent) + 'static,
    {
        self.bus.on(name, observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.bus.unsubscribe(id)
    }

    // --- Rendering internals ---

    fn render_source(&mut self, source: &str) -> (Rendered, Effects) {
        let mut scope = RenderScope::new(
            &mut self.state,
            &self.history,
            &self.store,
            &mut self.rng,
            self.max_render_depth,
        );
        let rendered = markup::render(source, &mut scope);
        (rendered, scope.into_effects())
    }

    fn apply_effects(&mut self, effects: Effects, allow_checkpoint: bool) {
        self.report_render_errors(effects.nested_errors, "embedded passage");
        for event in &effects.events {
            self.emit(event);
        }
        if allow_checkpoint {
            if let Some(name) = effects.checkpoint {
                self.checkpoint(name.as_deref());
            }
        }
    }

    // --- Accessors ---

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_passage(&self) -> u32 {
        self.start_passage
    }

    pub fn creator(&self) -> &str {
        &self.creator
    }

    pub fn creator_version(&self) -> &str {
        &self.creator_version
    }

    pub fn passages(&self) -> &PassageStore {
        &self.store
    }

    pub fn passage(&self, key: impl Into<PassageKey>) -> Option<&Passage> {
        self.store.lookup(&key.into())
    }

    /// The passage on the display surface, if any.
    pub fn current(&self) -> Option<&Passage> {
        match self.phase {
            Phase::Idle => None,
            Phase::Showing { passage } => self.store.get(passage),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn history(&self) -> &[u32] {
        &self.history
    }

    pub fn state(&self) -> &StoryState {
        &self.state
    }

    /// Story variables are the player's; hosts may edit them freely.
    pub fn state_mut(&mut self) -> &mut StoryState {
        &mut self.state
    }

    pub fn checkpoint_name(&self) -> &str {
        &self.checkpoint_name
    }

    pub fn at_checkpoint(&self) -> bool {
        self.at_checkpoint
    }

    pub fn ignore_errors(&self) -> bool {
        self.ignore_errors
    }

    pub fn set_ignore_errors(&mut self, ignore: bool) {
        self.ignore_errors = ignore;
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn visited(&self, key: impl Into<PassageKey>) -> bool {
        self.visits(key) > 0
    }

    pub fn visits(&self, key: impl Into<PassageKey>) -> usize {
        match self.store.lookup(&key.into()) {
            Some(p) => self.history.iter().filter(|&&id| id == p.id).count(),
            None => 0,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}
