use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a passage is addressed: by numeric id or by name.
///
/// Names are never parsed as numbers, so `PassageKey::from("2")` looks for a
/// passage *named* "2".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PassageKey {
    Id(u32),
    Name(String),
}

impl From<u32> for PassageKey {
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for PassageKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for PassageKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for PassageKey {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl fmt::Display for PassageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// A single addressable unit of story text. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: u32,
    pub name: String,
    pub tags: FxHashSet<String>,
    /// Raw passage text with HTML entities already decoded.
    pub source: String,
}

impl Passage {
    /// Build a passage from document fields.
    ///
    /// An id of 0 becomes 1 and an empty name becomes "Default". The source is
    /// HTML-unescaped, since documents store passage bodies entity-encoded.
    pub fn new<I, S>(id: u32, name: &str, tags: I, source: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: if id == 0 { 1 } else { id },
            name: if name.is_empty() {
                "Default".to_string()
            } else {
                name.to_string()
            },
            tags: tags
                .into_iter()
                .map(|t| -> String { t.into() })
                .filter(|t| !t.is_empty())
                .collect(),
            source: unescape_html(source),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// A lightweight reference for event payloads.
    pub fn to_ref(&self) -> PassageRef {
        PassageRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// A lightweight reference to a passage, carried by events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageRef {
    pub id: u32,
    pub name: String,
}

/// Decode the five entities HTML serializers emit for text content.
pub fn unescape_html(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let decoded = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&#39;", '\''),
        ]
        .iter()
        .find(|(entity, _)| tail.starts_with(entity));
        match decoded {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &tail[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Encode `& < > " '` so text is safe inside markup and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_missing_id_and_name() {
        let p = Passage::new(0, "", Vec::<String>::new(), "text");
        assert_eq!(p.id, 1);
        assert_eq!(p.name, "Default");
        assert!(p.tags.is_empty());
    }

    #[test]
    fn source_is_unescaped() {
        let p = Passage::new(3, "Hall", ["dark"], "&lt;%= s.x %&gt; &amp; &quot;hi&quot; &#39;");
        assert_eq!(p.source, "<%= s.x %> & \"hi\" '");
        assert!(p.has_tag("dark"));
    }

    #[test]
    fn unknown_entities_pass_through() {
        assert_eq!(unescape_html("a &nbsp; b & c"), "a &nbsp; b & c");
    }

    #[test]
    fn escape_then_unescape() {
        let raw = "<a href=\"x\">Tom's</a> & co";
        assert_eq!(unescape_html(&escape_html(raw)), raw);
    }

    #[test]
    fn key_display() {
        assert_eq!(PassageKey::from(7).to_string(), "7");
        assert_eq!(PassageKey::from("Cellar").to_string(), "Cellar");
    }
}
