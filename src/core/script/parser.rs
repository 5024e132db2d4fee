use serde_json::Value;

use super::ast::{AssignOp, BinaryOp, Expr, Stmt, UnaryOp};
use super::lexer::{Span, Token, TokenKind};
use super::ScriptError;

/// Parse a token stream (terminated by `Eof`) into statements.
pub(crate) fn parse_program(tokens: Vec<Token>) -> Result<Vec<Stmt>, ScriptError> {
    let mut p = Parser { tokens, pos: 0 };
    let mut stmts = Vec::new();
    while p.peek().kind != TokenKind::Eof {
        if let Some(stmt) = p.parse_stmt()? {
            stmts.push(stmt);
        }
    }
    Ok(stmts)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if t.kind != TokenKind::Eof {
            self.pos += 1;
        }
        t
    }

    fn span(&self) -> Span {
        self.peek().span
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::syntax(self.span().start, message)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ScriptError> {
        if self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {kind:?}, found {:?}",
                self.peek().kind
            )))
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    /// One statement, or `None` for an empty one (`;`).
    fn parse_stmt(&mut self) -> Result<Option<Stmt>, ScriptError> {
        match self.peek().kind.clone() {
            TokenKind::Semi => {
                self.bump();
                Ok(None)
            }
            TokenKind::Text(text) => {
                self.bump();
                Ok(Some(Stmt::Text(text)))
            }
            TokenKind::EmitRaw | TokenKind::EmitEscaped => {
                let escape = self.bump().kind == TokenKind::EmitEscaped;
                if self.consume(TokenKind::EndEmit) {
                    return Ok(None);
                }
                let expr = self.parse_expr()?;
                self.expect(TokenKind::EndEmit)?;
                Ok(Some(Stmt::Emit { expr, escape }))
            }
            TokenKind::If => self.parse_if().map(Some),
            TokenKind::LBrace => {
                let body = self.parse_block()?;
                Ok(Some(Stmt::If {
                    cond: Expr::Lit(Value::Bool(true)),
                    then: body,
                    otherwise: Vec::new(),
                }))
            }
            TokenKind::Eof => Err(self.error("unexpected end of script")),
            _ => {
                let stmt = self.parse_simple()?;
                self.end_of_simple()?;
                Ok(Some(stmt))
            }
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, ScriptError> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let then = self.parse_body()?;
        let otherwise = if self.consume(TokenKind::Else) {
            if self.peek().kind == TokenKind::If {
                vec![self.parse_if()?]
            } else {
                self.parse_body()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    /// A braced block, or a single statement.
    fn parse_body(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        if self.peek().kind == TokenKind::LBrace {
            return self.parse_block();
        }
        Ok(self.parse_stmt()?.into_iter().collect())
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.consume(TokenKind::RBrace) {
            if self.peek().kind == TokenKind::Eof {
                return Err(self.error("unclosed block, expected '}'"));
            }
            if let Some(stmt) = self.parse_stmt()? {
                stmts.push(stmt);
            }
        }
        Ok(stmts)
    }

    /// An expression statement or an assignment.
    fn parse_simple(&mut self) -> Result<Stmt, ScriptError> {
        let start = self.span().start;
        let target = self.parse_expr()?;
        let op = match self.peek().kind {
            TokenKind::Assign => AssignOp::Set,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Sub,
            TokenKind::StarAssign => AssignOp::Mul,
            TokenKind::SlashAssign => AssignOp::Div,
            _ => return Ok(Stmt::Expr(target)),
        };
        self.bump();
        let value = self.parse_expr()?;
        let path = state_path(target).ok_or_else(|| {
            ScriptError::syntax(start, "can only assign to a property of s")
        })?;
        Ok(Stmt::Assign { path, op, value })
    }

    /// Simple statements end at `;`, or where the next token can't continue
    /// them: a closing brace, template text, an emit, or the end.
    fn end_of_simple(&mut self) -> Result<(), ScriptError> {
        match self.peek().kind {
            TokenKind::Semi => {
                self.bump();
                Ok(())
            }
            TokenKind::RBrace
            | TokenKind::Text(_)
            | TokenKind::EmitRaw
            | TokenKind::EmitEscaped
            | TokenKind::Eof => Ok(()),
            ref other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ScriptError> {
        let cond = self.parse_or()?;
        if !self.consume(TokenKind::Question) {
            return Ok(cond);
        }
        let then = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let otherwise = self.parse_expr()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ScriptError> {
        let mut e = self.parse_and()?;
        while self.consume(TokenKind::OrOr) {
            let r = self.parse_and()?;
            e = binary(BinaryOp::Or, e, r);
        }
        Ok(e)
    }

    fn parse_and(&mut self) -> Result<Expr, ScriptError> {
        let mut e = self.parse_equality()?;
        while self.consume(TokenKind::AndAnd) {
            let r = self.parse_equality()?;
            e = binary(BinaryOp::And, e, r);
        }
        Ok(e)
    }

    fn parse_equality(&mut self) -> Result<Expr, ScriptError> {
        let mut e = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                TokenKind::StrictEq => BinaryOp::StrictEq,
                TokenKind::StrictNe => BinaryOp::StrictNe,
                _ => break,
            };
            self.bump();
            let r = self.parse_comparison()?;
            e = binary(op, e, r);
        }
        Ok(e)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ScriptError> {
        let mut e = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.bump();
            let r = self.parse_term()?;
            e = binary(op, e, r);
        }
        Ok(e)
    }

    fn parse_term(&mut self) -> Result<Expr, ScriptError> {
        let mut e = self.parse_factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let r = self.parse_factor()?;
            e = binary(op, e, r);
        }
        Ok(e)
    }

    fn parse_factor(&mut self) -> Result<Expr, ScriptError> {
        let mut e = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.bump();
            let r = self.parse_unary()?;
            e = binary(op, e, r);
        }
        Ok(e)
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.bump();
        let e = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(e),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut e = self.parse_primary()?;

        loop {
            if self.consume(TokenKind::Dot) {
                let t = self.bump();
                let name = match t.kind {
                    TokenKind::Ident(s) => s,
                    other => {
                        return Err(ScriptError::syntax(
                            t.span.start,
                            format!("expected property name after '.', found {other:?}"),
                        ));
                    }
                };
                e = Expr::Member {
                    object: Box::new(e),
                    key: Box::new(Expr::Lit(Value::String(name))),
                };
                continue;
            }

            if self.consume(TokenKind::LBracket) {
                let key = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                e = Expr::Member {
                    object: Box::new(e),
                    key: Box::new(key),
                };
                continue;
            }

            if self.peek().kind == TokenKind::LParen {
                let func = match e {
                    Expr::Var(name) => name,
                    _ => return Err(self.error("call target must be a helper name")),
                };
                self.bump();
                let args = self.parse_args()?;
                e = Expr::Call { func, args };
                continue;
            }

            break;
        }

        Ok(e)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ScriptError> {
        let mut args = Vec::new();
        if self.consume(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.consume(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        let t = self.bump();
        match t.kind {
            TokenKind::Number(v) => Ok(Expr::Lit(super::value::number(v))),
            TokenKind::Str(s) => Ok(Expr::Lit(Value::String(s))),
            TokenKind::True => Ok(Expr::Lit(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Lit(Value::Bool(false))),
            TokenKind::Null | TokenKind::Undefined => Ok(Expr::Lit(Value::Null)),
            TokenKind::Ident(s) => Ok(Expr::Var(s)),
            TokenKind::LParen => {
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                if !self.consume(TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.consume(TokenKind::Comma) {
                            continue;
                        }
                        self.expect(TokenKind::RBracket)?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            other => Err(ScriptError::syntax(
                t.span.start,
                format!("unexpected token {other:?}"),
            )),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Flatten `s.a[b].c` into its keys `[a, b, c]`; `None` unless rooted at `s`
/// with at least one key.
pub(crate) fn state_path(expr: Expr) -> Option<Vec<Expr>> {
    let mut keys = Vec::new();
    let mut cur = expr;
    loop {
        match cur {
            Expr::Member { object, key } => {
                keys.push(*key);
                cur = *object;
            }
            Expr::Var(name) if name == "s" && !keys.is_empty() => {
                keys.reverse();
                return Some(keys);
            }
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::lexer::lex_fragment;

    fn parse(src: &str) -> Vec<Stmt> {
        let mut tokens = lex_fragment(src, 0).unwrap();
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span {
                start: src.len(),
                end: src.len(),
            },
        });
        parse_program(tokens).unwrap()
    }

    #[test]
    fn parses_arithmetic_precedence() {
        match &parse("1 + 2 * 3")[0] {
            Stmt::Expr(Expr::Binary {
                op: BinaryOp::Add, ..
            }) => {}
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn parses_state_assignment() {
        match &parse("s.inventory['lamp'] = true;")[0] {
            Stmt::Assign { path, op, .. } => {
                assert_eq!(*op, AssignOp::Set);
                assert_eq!(
                    path,
                    &vec![
                        Expr::Lit(Value::String("inventory".into())),
                        Expr::Lit(Value::String("lamp".into())),
                    ]
                );
            }
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn rejects_assignment_outside_state() {
        let mut tokens = lex_fragment("x = 1", 0).unwrap();
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span { start: 5, end: 5 },
        });
        assert!(parse_program(tokens).is_err());
    }

    #[test]
    fn parses_if_else_chain() {
        let stmts = parse("if (s.a) { s.b = 1 } else if (s.c) s.b = 2; else { s.b = 3 }");
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::If { otherwise, .. } => {
                assert!(matches!(otherwise[0], Stmt::If { .. }));
            }
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn parses_calls_and_ternary() {
        match &parse("visited('Cellar') ? 'again' : 'first'")[0] {
            Stmt::Expr(Expr::Conditional { cond, .. }) => {
                assert!(matches!(&**cond, Expr::Call { func, args } if func == "visited" && args.len() == 1));
            }
            other => panic!("unexpected ast: {other:?}"),
        }
    }
}
