//! Passage text to display markup.
//!
//! Rendering runs four stages in order: the template, extended links, plain
//! links, then Markdown. A template failure empties the text for the later
//! stages but never aborts the render; the failure is returned alongside
//! the markup.

use pulldown_cmark::{html, Options, Parser};
use thiserror::Error;

use crate::core::links::{rewrite_extended_links, rewrite_plain_links};
use crate::core::script::{Program, ScriptError, ScriptHost};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("template failed: {0}")]
    Template(#[from] ScriptError),
}

impl RenderError {
    /// The name reported in error events, e.g. `TypeError`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Template(err) => err.name(),
        }
    }
}

/// Markup from one render plus every stage failure met along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub html: String,
    pub errors: Vec<RenderError>,
}

impl Rendered {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Render passage source against `host`.
pub fn render(source: &str, host: &mut dyn ScriptHost) -> Rendered {
    let mut errors = Vec::new();
    let text = match Program::compile_template(source).and_then(|p| p.run(host)) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!(error = %err, "template stage failed");
            errors.push(RenderError::Template(err));
            String::new()
        }
    };
    let text = rewrite_extended_links(&text);
    let text = rewrite_plain_links(&text);
    Rendered {
        html: markdown(&text),
        errors,
    }
}

/// Markdown to HTML. Output that is exactly one paragraph is unwrapped,
/// unless the input itself already ended with a closing `</p>`.
pub fn markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    let mut out = String::with_capacity(text.len() + text.len() / 2);
    html::push_html(&mut out, Parser::new_ext(text, options));

    if text.trim_end().ends_with("</p>") {
        return out;
    }
    match single_paragraph(&out) {
        Some(inner) => inner.to_string(),
        None => out,
    }
}

fn single_paragraph(html: &str) -> Option<&str> {
    let inner = html.strip_prefix("<p>")?.strip_suffix("</p>\n")?;
    (!inner.contains("<p>")).then_some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::StoryState;
    use serde_json::Value;

    struct Bare(StoryState);

    impl ScriptHost for Bare {
        fn state(&self) -> &StoryState {
            &self.0
        }
        fn state_mut(&mut self) -> &mut StoryState {
            &mut self.0
        }
        fn call(&mut self, name: &str, _: Vec<Value>) -> Result<Value, ScriptError> {
            Err(ScriptError::UnknownFunction(name.to_string()))
        }
    }

    fn bare() -> Bare {
        Bare(StoryState::new())
    }

    #[test]
    fn single_paragraph_is_unwrapped() {
        assert_eq!(markdown("Hello *there*"), "Hello <em>there</em>");
    }

    #[test]
    fn multiple_blocks_keep_paragraphs() {
        assert_eq!(markdown("one\n\ntwo"), "<p>one</p>\n<p>two</p>\n");
        assert_eq!(markdown("# Title"), "<h1>Title</h1>\n");
    }

    #[test]
    fn explicit_trailing_paragraph_is_kept() {
        let out = markdown("<p>raw</p>");
        assert!(out.contains("<p>raw</p>"));
    }

    #[test]
    fn extended_link_survives_markdown() {
        let out = render("[[A|B]]{#id}", &mut bare());
        assert!(out.is_clean());
        assert_eq!(
            out.html,
            "<a href=\"javascript:void(0)\" data-passage=\"B\" id=\"id\">A</a>"
        );
    }

    #[test]
    fn arrow_links_render_identically() {
        let expected = "<a href=\"javascript:void(0)\" data-passage=\"B\">A</a>";
        assert_eq!(render("[[A->B]]", &mut bare()).html, expected);
        assert_eq!(render("[[B<-A]]", &mut bare()).html, expected);
    }

    #[test]
    fn template_runs_before_links() {
        let mut host = bare();
        host.0.set("door", "Cellar");
        let out = render("Go [[<%= s.door %>]]", &mut host);
        assert_eq!(
            out.html,
            "Go <a href=\"javascript:void(0)\" data-passage=\"Cellar\">Cellar</a>"
        );
    }

    #[test]
    fn template_failure_is_reported_not_fatal() {
        let out = render("before <%= s.a.b %> after", &mut bare());
        assert_eq!(out.html, "");
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].name(), "TypeError");
    }

    #[test]
    fn rendering_is_deterministic_without_randomness() {
        let src = "A [[door]] and **bold**\n\n* x\n* y";
        let first = render(src, &mut bare()).html;
        assert_eq!(first, render(src, &mut bare()).html);
    }
}
