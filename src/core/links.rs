//! Link shorthand: `[[...]]` and `[[...]]{attrs}` become passage anchors.
//!
//! Inside the brackets three forms pick display text and target, tried in
//! this order: `display|target`, `display->target`, `target<-display`.
//! Anything else uses the whole text as both. Link syntax never spans lines.

use crate::schema::passage::escape_html;

/// `href` given to every passage anchor; navigation goes through
/// `data-passage` instead.
pub const NOOP_HREF: &str = "javascript:void(0)";

/// Split link text into `(display, target)`.
pub fn split_link(inner: &str) -> (&str, &str) {
    if let Some(bar) = inner.find('|') {
        return (&inner[..bar], &inner[bar + 1..]);
    }
    if let Some(arrow) = inner.find("->") {
        return (&inner[..arrow], &inner[arrow + 2..]);
    }
    if let Some(arrow) = inner.find("<-") {
        return (&inner[arrow + 2..], &inner[..arrow]);
    }
    (inner, inner)
}

/// Parse a `key:value, #id.class, flag` attribute list.
///
/// Values are unquoted and end at the next comma. An entry without a colon
/// is either `#id`/`.class` shorthand or a bare attribute with an empty
/// value. Keys that are not valid attribute names are dropped.
pub fn parse_attributes(input: &str) -> Vec<(String, String)> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if let Some((key, value)) = entry.split_once(':') {
            set_attr(&mut attrs, key.trim(), value.trim());
        } else if entry.starts_with('#') || entry.starts_with('.') {
            for (sigil, name) in shorthand_parts(entry) {
                if name.is_empty() {
                    continue;
                }
                if sigil == '#' {
                    set_attr(&mut attrs, "id", name);
                } else {
                    set_attr(&mut attrs, "class", name);
                }
            }
        } else {
            set_attr(&mut attrs, entry, "");
        }
    }
    attrs
}

/// Split `#id.a.b` into `[('#', "id"), ('.', "a"), ('.', "b")]`.
fn shorthand_parts(entry: &str) -> Vec<(char, &str)> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut sigil = '.';
    for (i, ch) in entry.char_indices() {
        if ch == '#' || ch == '.' {
            if i > start {
                parts.push((sigil, &entry[start..i]));
            }
            sigil = ch;
            start = i + 1;
        }
    }
    if start < entry.len() {
        parts.push((sigil, &entry[start..]));
    }
    parts
}

/// Later values replace earlier ones, except `class`, which accumulates.
fn set_attr(attrs: &mut Vec<(String, String)>, key: &str, value: &str) {
    if !is_attribute_name(key) {
        return;
    }
    match attrs.iter_mut().find(|(k, _)| k == key) {
        Some((_, existing)) if key == "class" && !existing.is_empty() => {
            existing.push(' ');
            existing.push_str(value);
        }
        Some((_, existing)) => *existing = value.to_string(),
        None => attrs.push((key.to_string(), value.to_string())),
    }
}

fn is_attribute_name(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

fn anchor(display: &str, target: &str, extra: &[(String, String)]) -> String {
    let mut out = format!(
        "<a href=\"{NOOP_HREF}\" data-passage=\"{}\"",
        escape_html(target)
    );
    for (key, value) in extra {
        if key == "href" || key == "data-passage" {
            continue;
        }
        out.push_str(&format!(" {key}=\"{}\"", escape_html(value)));
    }
    out.push('>');
    out.push_str(display);
    out.push_str("</a>");
    out
}

/// Index of the first `needle` in `hay`, unless a newline comes first.
fn find_on_line(hay: &str, needle: &str) -> Option<usize> {
    let pos = hay.find(needle)?;
    (!hay[..pos].contains('\n')).then_some(pos)
}

/// Rewrite `[[link]]{attrs}` into anchors carrying the parsed attributes.
/// `href` and `data-passage` are always the engine's own.
pub fn rewrite_extended_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("[[") {
        let body = &rest[open + 2..];
        let matched = find_on_line(body, "]]").and_then(|close| {
            let attrs = body[close + 2..].strip_prefix('{')?;
            let end = find_on_line(attrs, "}")?;
            Some((close, end))
        });
        match matched {
            Some((close, end)) => {
                out.push_str(&rest[..open]);
                let (display, target) = split_link(&body[..close]);
                let attrs_start = close + 3;
                let attrs = parse_attributes(&body[attrs_start..attrs_start + end]);
                out.push_str(&anchor(display, target, &attrs));
                rest = &body[attrs_start + end + 1..];
            }
            None => {
                out.push_str(&rest[..open + 1]);
                rest = &rest[open + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Rewrite `[[link]]` into minimal anchors.
pub fn rewrite_plain_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("[[") {
        let body = &rest[open + 2..];
        match find_on_line(body, "]]") {
            Some(close) => {
                out.push_str(&rest[..open]);
                let (display, target) = split_link(&body[..close]);
                out.push_str(&anchor(display, target, &[]));
                rest = &body[close + 2..];
            }
            None => {
                out.push_str(&rest[..open + 1]);
                rest = &rest[open + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_forms_and_precedence() {
        assert_eq!(split_link("A|B"), ("A", "B"));
        assert_eq!(split_link("A->B"), ("A", "B"));
        assert_eq!(split_link("B<-A"), ("A", "B"));
        assert_eq!(split_link("Cellar"), ("Cellar", "Cellar"));
        // A bar wins over arrows.
        assert_eq!(split_link("go->now|Cellar"), ("go->now", "Cellar"));
    }

    #[test]
    fn plain_links() {
        let expected = "<a href=\"javascript:void(0)\" data-passage=\"B\">A</a>";
        assert_eq!(rewrite_plain_links("[[A->B]]"), expected);
        assert_eq!(rewrite_plain_links("[[B<-A]]"), expected);
        assert_eq!(rewrite_plain_links("[[A|B]]"), expected);
        assert_eq!(
            rewrite_plain_links("Go [[north]] now"),
            "Go <a href=\"javascript:void(0)\" data-passage=\"north\">north</a> now"
        );
    }

    #[test]
    fn extended_link_with_id_shorthand() {
        assert_eq!(
            rewrite_extended_links("[[A|B]]{#id}"),
            "<a href=\"javascript:void(0)\" data-passage=\"B\" id=\"id\">A</a>"
        );
    }

    #[test]
    fn extended_link_attributes() {
        let out = rewrite_extended_links("[[Open]]{.door.big, title: Knock first, data-x:1}");
        assert!(out.starts_with("<a href=\"javascript:void(0)\" data-passage=\"Open\""));
        assert!(out.contains(" class=\"door big\""));
        assert!(out.contains(" title=\"Knock first\""));
        assert!(out.contains(" data-x=\"1\""));
        assert!(out.ends_with(">Open</a>"));
    }

    #[test]
    fn forced_attributes_cannot_be_overridden() {
        let out = rewrite_extended_links("[[A|B]]{href: http://evil, data-passage: C}");
        assert_eq!(out, "<a href=\"javascript:void(0)\" data-passage=\"B\">A</a>");
    }

    #[test]
    fn extended_rewrite_leaves_plain_links_alone() {
        assert_eq!(rewrite_extended_links("[[A]] and [[B]]"), "[[A]] and [[B]]");
        assert_eq!(
            rewrite_extended_links("[[A]] x [[B]]{#b}"),
            "[[A]] x <a href=\"javascript:void(0)\" data-passage=\"B\" id=\"b\">B</a>"
        );
    }

    #[test]
    fn links_do_not_span_lines() {
        assert_eq!(rewrite_plain_links("[[A\nB]]"), "[[A\nB]]");
    }

    #[test]
    fn targets_are_attribute_escaped() {
        assert_eq!(
            rewrite_plain_links("[[Say \"hi\"]]"),
            "<a href=\"javascript:void(0)\" data-passage=\"Say &quot;hi&quot;\">Say \"hi\"</a>"
        );
    }

    #[test]
    fn bare_and_invalid_attribute_keys() {
        assert_eq!(
            parse_attributes("hidden, bad key:1, ok:2"),
            vec![
                ("hidden".to_string(), String::new()),
                ("ok".to_string(), "2".to_string())
            ]
        );
    }
}
