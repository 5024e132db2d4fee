use super::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    Undefined,
    If,
    Else,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Semi,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Bang,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,

    EqEq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,

    AndAnd,
    OrOr,

    Question,
    Colon,

    /// Literal template text between delimiters.
    Text(String),
    /// Opens `<%= ... %>`.
    EmitRaw,
    /// Opens `<%- ... %>`.
    EmitEscaped,
    /// Closes an emit opened by `EmitRaw` or `EmitEscaped`.
    EndEmit,

    Eof,
}

/// Lex one code fragment. `base` is the fragment's byte offset in the whole
/// source, so spans point into the original text. No `Eof` is appended.
pub(crate) fn lex_fragment(input: &str, base: usize) -> Result<Vec<Token>, ScriptError> {
    let mut out = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let span = |end: usize| Span {
            start: base + start,
            end: base + end,
        };

        // Line comments run to the end of the fragment line.
        if c == '/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        if c.is_ascii_digit()
            || (c == '.' && i + 1 < bytes.len() && (bytes[i + 1] as char).is_ascii_digit())
        {
            if c != '.' {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < bytes.len()
                && bytes[i] == b'.'
                && i + 1 < bytes.len()
                && bytes[i + 1].is_ascii_digit()
            {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
                let e_pos = i;
                i += 1;
                if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
                    i += 1;
                }
                let exp_start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if exp_start == i {
                    return Err(ScriptError::syntax(
                        base + e_pos,
                        "invalid number exponent (expected digits)",
                    ));
                }
            }
            let v: f64 = input[start..i]
                .parse()
                .map_err(|_| ScriptError::syntax(base + start, "invalid number"))?;
            out.push(Token {
                kind: TokenKind::Number(v),
                span: span(i),
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            i += 1;
            while i < bytes.len() {
                let ch = bytes[i] as char;
                if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                    i += 1;
                } else {
                    break;
                }
            }
            let kind = match &input[start..i] {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                "null" => TokenKind::Null,
                "undefined" => TokenKind::Undefined,
                "if" => TokenKind::If,
                "else" => TokenKind::Else,
                s => TokenKind::Ident(s.to_owned()),
            };
            out.push(Token {
                kind,
                span: span(i),
            });
            continue;
        }

        if c == '"' || c == '\'' {
            let (text, end) = lex_string(input, i, base)?;
            i = end;
            out.push(Token {
                kind: TokenKind::Str(text),
                span: span(i),
            });
            continue;
        }

        if input[i..].starts_with("===") || input[i..].starts_with("!==") {
            let kind = if c == '=' {
                TokenKind::StrictEq
            } else {
                TokenKind::StrictNe
            };
            i += 3;
            out.push(Token {
                kind,
                span: span(i),
            });
            continue;
        }

        if i + 1 < bytes.len() {
            let kind = match &bytes[i..i + 2] {
                b"&&" => Some(TokenKind::AndAnd),
                b"||" => Some(TokenKind::OrOr),
                b"==" => Some(TokenKind::EqEq),
                b"!=" => Some(TokenKind::Ne),
                b"<=" => Some(TokenKind::Le),
                b">=" => Some(TokenKind::Ge),
                b"+=" => Some(TokenKind::PlusAssign),
                b"-=" => Some(TokenKind::MinusAssign),
                b"*=" => Some(TokenKind::StarAssign),
                b"/=" => Some(TokenKind::SlashAssign),
                _ => None,
            };
            if let Some(kind) = kind {
                i += 2;
                out.push(Token {
                    kind,
                    span: span(i),
                });
                continue;
            }
        }

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semi,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '!' => TokenKind::Bang,
            '=' => TokenKind::Assign,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            _ => {
                let ch = input[i..].chars().next().unwrap_or(c);
                return Err(ScriptError::syntax(
                    base + start,
                    format!("unexpected character '{ch}'"),
                ));
            }
        };
        i += 1;
        out.push(Token {
            kind,
            span: span(i),
        });
    }

    Ok(out)
}

/// Lex a quoted string starting at `start`; returns the text and the byte
/// index just past the closing quote.
fn lex_string(input: &str, start: usize, base: usize) -> Result<(String, usize), ScriptError> {
    let quote = input.as_bytes()[start] as char;
    let mut text = String::new();
    let mut chars = input[start + 1..].char_indices();
    while let Some((offset, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((text, start + 1 + offset + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, 'r')) => text.push('\r'),
                Some((_, other)) => text.push(other),
                None => break,
            },
            '\n' => break,
            c => text.push(c),
        }
    }
    Err(ScriptError::syntax(base + start, "unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex_fragment(src, 0)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_assignment_statement() {
        assert_eq!(
            kinds("s.gold += 5;"),
            vec![
                TokenKind::Ident("s".into()),
                TokenKind::Dot,
                TokenKind::Ident("gold".into()),
                TokenKind::PlusAssign,
                TokenKind::Number(5.0),
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn lexes_strict_equality_and_strings() {
        assert_eq!(
            kinds(r#"s.name === 'Ada' && s.x !== "it\"s""#),
            vec![
                TokenKind::Ident("s".into()),
                TokenKind::Dot,
                TokenKind::Ident("name".into()),
                TokenKind::StrictEq,
                TokenKind::Str("Ada".into()),
                TokenKind::AndAnd,
                TokenKind::Ident("s".into()),
                TokenKind::Dot,
                TokenKind::Ident("x".into()),
                TokenKind::StrictNe,
                TokenKind::Str("it\"s".into()),
            ]
        );
    }

    #[test]
    fn spans_are_offset_by_base() {
        let tokens = lex_fragment("  s", 10).unwrap();
        assert_eq!(tokens[0].span, Span { start: 12, end: 13 });
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(kinds("1 // one\n2"), vec![TokenKind::Number(1.0), TokenKind::Number(2.0)]);
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(lex_fragment("s.a @ 1", 0).is_err());
        assert!(lex_fragment("'open", 0).is_err());
    }
}
