//! Passage store: id- and name-indexed lookup over an immutable passage set.

use rustc_hash::FxHashMap;

use crate::schema::passage::{Passage, PassageKey};
use crate::schema::story_data::PassageData;

/// All passages of a story, ordered by id.
///
/// Names are not required to be unique. A name lookup returns the first
/// passage in id order whose name matches exactly, or failing that, the first
/// whose name matches case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PassageStore {
    passages: Vec<Passage>,
    by_id: FxHashMap<u32, usize>,
    by_name: FxHashMap<String, usize>,
    by_folded_name: FxHashMap<String, usize>,
}

impl PassageStore {
    /// Build a store. A later passage with an already seen id replaces the
    /// earlier one.
    pub fn new(passages: impl IntoIterator<Item = Passage>) -> Self {
        let mut unique: FxHashMap<u32, Passage> = FxHashMap::default();
        for passage in passages {
            unique.insert(passage.id, passage);
        }
        let mut passages: Vec<Passage> = unique.into_values().collect();
        passages.sort_by_key(|p| p.id);

        let mut by_id = FxHashMap::default();
        let mut by_name = FxHashMap::default();
        let mut by_folded_name = FxHashMap::default();
        for (index, passage) in passages.iter().enumerate() {
            by_id.insert(passage.id, index);
            by_name.entry(passage.name.clone()).or_insert(index);
            by_folded_name
                .entry(passage.name.to_lowercase())
                .or_insert(index);
        }

        Self {
            passages,
            by_id,
            by_name,
            by_folded_name,
        }
    }

    pub fn from_data(records: &[PassageData]) -> Self {
        Self::new(records.iter().map(PassageData::to_passage))
    }

    /// Resolve an id or name. Never has side effects.
    pub fn lookup(&self, key: &PassageKey) -> Option<&Passage> {
        match key {
            PassageKey::Id(id) => self.get(*id),
            PassageKey::Name(name) => self.find_by_name(name),
        }
    }

    pub fn get(&self, id: u32) -> Option<&Passage> {
        self.by_id.get(&id).map(|&i| &self.passages[i])
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Passage> {
        self.by_name
            .get(name)
            .or_else(|| self.by_folded_name.get(&name.to_lowercase()))
            .map(|&i| &self.passages[i])
    }

    pub fn contains_id(&self, id: u32) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Passage> {
        self.passages.iter()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}
