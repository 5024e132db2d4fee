//! The helper functions passage scripts can call, and the effects they defer.

use rand::rngs::StdRng;
use rand::Rng;
use serde_json::Value;

use crate::core::markup::{self, RenderError};
use crate::core::script::value::{number, to_display};
use crate::core::script::{ScriptError, ScriptHost};
use crate::core::state::StoryState;
use crate::core::store::PassageStore;
use crate::schema::event::StoryEvent;
use crate::schema::passage::PassageKey;

/// Requests a script made that the engine applies once the render is over.
#[derive(Debug, Default)]
pub(crate) struct Effects {
    /// `Some(name)` when `checkpoint(...)` was called; the last call wins.
    pub checkpoint: Option<Option<String>>,
    pub events: Vec<StoryEvent>,
    /// Failures inside passages embedded with `render(...)`.
    pub nested_errors: Vec<RenderError>,
}

/// The script host passages render against: the live state bag plus the
/// story helpers. History and the store are read-only here.
pub(crate) struct RenderScope<'a> {
    state: &'a mut StoryState,
    history: &'a [u32],
    store: &'a PassageStore,
    rng: &'a mut StdRng,
    depth: usize,
    max_depth: usize,
    effects: Effects,
}

impl<'a> RenderScope<'a> {
    pub(crate) fn new(
        state: &'a mut StoryState,
        history: &'a [u32],
        store: &'a PassageStore,
        rng: &'a mut StdRng,
        max_depth: usize,
    ) -> Self {
        Self {
            state,
            history,
            store,
            rng,
            depth: 0,
            max_depth,
            effects: Effects::default(),
        }
    }

    pub(crate) fn into_effects(self) -> Effects {
        self.effects
    }

    fn resolve(&self, arg: &Value) -> Result<u32, ScriptError> {
        let key = key_from_value(arg)?;
        self.store.lookup(&key).map(|p| p.id).ok_or_else(|| {
            ScriptError::Helper(format!(
                "There is no passage with the ID or name \"{key}\""
            ))
        })
    }

    /// Unknown passages count as never visited.
    fn visits_of(&self, arg: &Value) -> usize {
        match self.resolve(arg) {
            Ok(id) => self.history.iter().filter(|&&h| h == id).count(),
            Err(_) => 0,
        }
    }

    fn random(&mut self, args: Vec<Value>) -> Value {
        let mut choices = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Value::Array(items) => choices.extend(items),
                other => choices.push(other),
            }
        }
        if choices.is_empty() {
            return Value::Null;
        }
        let pick = self.rng.gen_range(0..choices.len());
        choices.swap_remove(pick)
    }

    fn embed(&mut self, arg: &Value) -> Result<Value, ScriptError> {
        let id = self.resolve(arg)?;
        if self.depth >= self.max_depth {
            return Err(ScriptError::Helper(format!(
                "render() nested deeper than {} passages",
                self.max_depth
            )));
        }
        let Some(passage) = self.store.get(id) else {
            return Err(ScriptError::Helper(format!("There is no passage with the ID {id}")));
        };
        let source = passage.source.clone();
        self.depth += 1;
        let rendered = markup::render(&source, self);
        self.depth -= 1;
        self.effects.nested_errors.extend(rendered.errors);
        Ok(Value::String(rendered.html))
    }
}

fn key_from_value(arg: &Value) -> Result<PassageKey, ScriptError> {
    match arg {
        Value::Number(n) => n
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .map(PassageKey::Id)
            .ok_or_else(|| ScriptError::Helper(format!("{n} is not a passage id"))),
        Value::String(name) => Ok(PassageKey::Name(name.clone())),
        other => Err(ScriptError::Helper(format!(
            "expected a passage id or name, got {other}"
        ))),
    }
}

impl ScriptHost for RenderScope<'_> {
    fn state(&self) -> &StoryState {
        self.state
    }

    fn state_mut(&mut self) -> &mut StoryState {
        self.state
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, ScriptError> {
        match name {
            "random" => Ok(self.random(args)),
            "visited" | "hasVisited" => {
                Ok(Value::Bool(args.iter().any(|a| self.visits_of(a) > 0)))
            }
            "visits" => match args.as_slice() {
                [] => Ok(number(0.0)),
                [one] => Ok(Value::from(self.visits_of(one))),
                many => Ok(Value::Array(
                    many.iter().map(|a| Value::from(self.visits_of(a))).collect(),
                )),
            },
            "render" => match args.first() {
                Some(arg) => self.embed(arg),
                None => Err(ScriptError::Helper("render() needs a passage".to_string())),
            },
            "checkpoint" => {
                let label = args.first().map(to_display).filter(|l| !l.is_empty());
                self.effects.checkpoint = Some(label);
                Ok(Value::Null)
            }
            "emit" => {
                let mut args = args.into_iter();
                let event = args.next().map(|v| to_display(&v)).unwrap_or_default();
                if event.is_empty() {
                    return Err(ScriptError::Helper("emit() needs an event name".to_string()));
                }
                self.effects.events.push(StoryEvent::Custom {
                    name: event,
                    detail: args.next().unwrap_or(Value::Null),
                });
                Ok(Value::Null)
            }
            _ => Err(ScriptError::UnknownFunction(name.to_string())),
        }
    }
}
