//! Fire-and-forget delivery of [`StoryEvent`]s to observers.

use crate::schema::event::StoryEvent;

type Observer = Box<dyn FnMut(&StoryEvent) + 'static>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Subscription {
    id: ObserverId,
    /// Only events with this name are delivered; `None` receives all.
    filter: Option<String>,
    observer: Observer,
}

#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event.
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&StoryEvent) + 'static,
    {
        self.add(None, Box::new(observer))
    }

    /// Receive events named `name`, e.g. `"story:shown"`.
    pub fn on<F>(&mut self, name: &str, observer: F) -> ObserverId
    where
        F: FnMut(&StoryEvent) + 'static,
    {
        self.add(Some(name.to_string()), Box::new(observer))
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn emit(&mut self, event: &StoryEvent) {
        tracing::trace!(event = event.name(), "emit");
        for sub in &mut self.subscriptions {
            if sub.filter.as_deref().map_or(true, |f| f == event.name()) {
                (sub.observer)(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    fn add(&mut self, filter: Option<String>, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            filter,
            observer,
        });
        id
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.subscriptions.len())
            .finish()
    }
}
