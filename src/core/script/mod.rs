//! Sandboxed script host for passage templates and startup scripts.
//!
//! Passage text is a micro-template:
//! - `<%= expr %>` inserts the value of `expr` as-is
//! - `<%- expr %>` inserts it HTML-escaped
//! - `<% code %>` runs statements; code may span several delimiters, so
//!   `<% if (s.lamp) { %>lit<% } else { %>dark<% } %>` works
//!
//! Scripts only see the state bag `s` and the helpers a [`ScriptHost`] offers.

mod ast;
mod interp;
mod lexer;
mod parser;
pub(crate) mod value;

use thiserror::Error;

use crate::core::state::StoryState;
use interp::Interpreter;
use lexer::{lex_fragment, Span, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("{0} is not defined")]
    UnknownVariable(String),
    #[error("{0} is not a function")]
    UnknownFunction(String),
    #[error("{0}")]
    Type(String),
    /// A helper refused its arguments or failed.
    #[error("{0}")]
    Helper(String),
}

impl ScriptError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// The JavaScript-style error name, used in player-facing messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "SyntaxError",
            Self::UnknownVariable(_) => "ReferenceError",
            Self::UnknownFunction(_) | Self::Type(_) => "TypeError",
            Self::Helper(_) => "Error",
        }
    }
}

/// The capabilities a script runs with: the state bag and named helpers.
pub trait ScriptHost {
    fn state(&self) -> &StoryState;
    fn state_mut(&mut self) -> &mut StoryState;
    /// Call a helper such as `visited(...)`. Unknown names should return
    /// [`ScriptError::UnknownFunction`].
    fn call(&mut self, name: &str, args: Vec<serde_json::Value>)
        -> Result<serde_json::Value, ScriptError>;
}

/// A segment of passage text, split on template delimiters.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSegment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// `<%= expr %>`
    Interpolate(String),
    /// `<%- expr %>`
    Escape(String),
    /// `<% code %>`
    Evaluate(String),
}

/// Split passage text into literal and code segments.
pub fn split_template(input: &str) -> Result<Vec<(usize, TemplateSegment)>, ScriptError> {
    let mut segments = Vec::new();
    let mut pos = 0;
    while let Some(rel) = input[pos..].find("<%") {
        let open = pos + rel;
        if open > pos {
            segments.push((pos, TemplateSegment::Literal(input[pos..open].to_string())));
        }
        let body_start = open + 2;
        let (segment, code_start): (fn(String) -> TemplateSegment, usize) =
            match input.as_bytes().get(body_start) {
                Some(b'=') => (TemplateSegment::Interpolate, body_start + 1),
                Some(b'-') => (TemplateSegment::Escape, body_start + 1),
                _ => (TemplateSegment::Evaluate, body_start),
            };
        let close = input[code_start..]
            .find("%>")
            .map(|r| code_start + r)
            .ok_or_else(|| ScriptError::syntax(open, "unclosed template tag, expected '%>'"))?;
        segments.push((code_start, segment(input[code_start..close].to_string())));
        pos = close + 2;
    }
    if pos < input.len() {
        segments.push((pos, TemplateSegment::Literal(input[pos..].to_string())));
    }
    Ok(segments)
}

/// A compiled template or script, ready to run against a host.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    stmts: Vec<ast::Stmt>,
}

impl Program {
    /// Compile passage text with `<% %>` delimiters.
    pub fn compile_template(source: &str) -> Result<Program, ScriptError> {
        let mut tokens = Vec::new();
        for (offset, segment) in split_template(source)? {
            match segment {
                TemplateSegment::Literal(text) => tokens.push(Token {
                    kind: TokenKind::Text(text),
                    span: Span {
                        start: offset,
                        end: offset,
                    },
                }),
                TemplateSegment::Interpolate(code) => {
                    tokens.push(marker(TokenKind::EmitRaw, offset));
                    tokens.extend(lex_fragment(&code, offset)?);
                    tokens.push(marker(TokenKind::EndEmit, offset + code.len()));
                }
                TemplateSegment::Escape(code) => {
                    tokens.push(marker(TokenKind::EmitEscaped, offset));
                    tokens.extend(lex_fragment(&code, offset)?);
                    tokens.push(marker(TokenKind::EndEmit, offset + code.len()));
                }
                TemplateSegment::Evaluate(code) => {
                    tokens.extend(lex_fragment(&code, offset)?);
                    // A closing delimiter ends the statement in progress.
                    tokens.push(marker(TokenKind::Semi, offset + code.len()));
                }
            }
        }
        tokens.push(marker(TokenKind::Eof, source.len()));
        Ok(Program {
            stmts: parser::parse_program(tokens)?,
        })
    }

    /// Compile plain script code, as found in startup script blocks.
    pub fn compile_script(source: &str) -> Result<Program, ScriptError> {
        let mut tokens = lex_fragment(source, 0)?;
        tokens.push(marker(TokenKind::Eof, source.len()));
        Ok(Program {
            stmts: parser::parse_program(tokens)?,
        })
    }

    /// Run against `host`, returning the template output.
    pub fn run(&self, host: &mut dyn ScriptHost) -> Result<String, ScriptError> {
        let mut interp = Interpreter::new(host);
        interp.exec_block(&self.stmts)?;
        Ok(interp.finish())
    }
}

fn marker(kind: TokenKind, at: usize) -> Token {
    Token {
        kind,
        span: Span { start: at, end: at },
    }
}
