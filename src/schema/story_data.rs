//! The source document: story metadata, passage records, user scripts and styles.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::passage::Passage;

#[derive(Debug, Error)]
pub enum StoryDataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One passage record as it appears in the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassageData {
    #[serde(default)]
    pub pid: u32,
    #[serde(default)]
    pub name: String,
    /// Whitespace-separated tag list.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub text: String,
}

impl PassageData {
    pub fn to_passage(&self) -> Passage {
        Passage::new(self.pid, &self.name, self.tags.split_whitespace(), &self.text)
    }
}

/// The story container, materialized from whatever the host stores it in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryData {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_start_node", alias = "startnode")]
    pub start_node: u32,
    #[serde(default)]
    pub creator: String,
    #[serde(default, alias = "creator-version")]
    pub creator_version: String,
    #[serde(default)]
    pub passages: Vec<PassageData>,
    /// User scripts, run once at startup in document order.
    #[serde(default)]
    pub scripts: Vec<String>,
    /// User stylesheets, handed to the host verbatim at startup.
    #[serde(default)]
    pub styles: Vec<String>,
}

fn default_start_node() -> u32 {
    1
}

impl Default for StoryData {
    fn default() -> Self {
        Self {
            name: String::new(),
            start_node: default_start_node(),
            creator: String::new(),
            creator_version: String::new(),
            passages: Vec::new(),
            scripts: Vec::new(),
            styles: Vec::new(),
        }
    }
}

impl StoryData {
    /// Load a story document from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<StoryData, StoryDataError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a story document from a RON string.
    pub fn parse_ron(input: &str) -> Result<StoryData, StoryDataError> {
        Ok(ron::from_str(input)?)
    }

    /// Parse a story document from JSON, the shape browser glue produces.
    pub fn parse_json(input: &str) -> Result<StoryData, StoryDataError> {
        Ok(serde_json::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ron_document() {
        let data = StoryData::parse_ron(
            r#"(
                name: "Test",
                start_node: 2,
                passages: [
                    (pid: 1, name: "One", tags: "a b", text: "first"),
                    (pid: 2, name: "Two", text: "second"),
                ],
                scripts: ["s.ready = true"],
            )"#,
        )
        .unwrap();
        assert_eq!(data.name, "Test");
        assert_eq!(data.start_node, 2);
        assert_eq!(data.passages.len(), 2);
        assert_eq!(data.scripts.len(), 1);
        assert!(data.styles.is_empty());

        let p = data.passages[0].to_passage();
        assert!(p.has_tag("a") && p.has_tag("b"));
    }

    #[test]
    fn parse_json_uses_document_attribute_names() {
        let data = StoryData::parse_json(
            r#"{
                "name": "Web",
                "startnode": 3,
                "creator": "Twine",
                "creator-version": "2.6",
                "passages": [{"pid": 3, "name": "Start", "tags": "", "text": "Hi"}]
            }"#,
        )
        .unwrap();
        assert_eq!(data.start_node, 3);
        assert_eq!(data.creator_version, "2.6");
        assert!(data.passages[0].to_passage().tags.is_empty());
    }

    #[test]
    fn start_node_defaults_to_one() {
        let data = StoryData::parse_json(r#"{"name": "Empty"}"#).unwrap();
        assert_eq!(data.start_node, 1);
        assert_eq!(StoryData::default().start_node, 1);
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(StoryData::parse_ron("(name: ").is_err());
        assert!(StoryData::parse_json("{").is_err());
    }
}
