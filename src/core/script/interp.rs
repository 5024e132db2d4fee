use serde_json::Value;
use std::cmp::Ordering;

use super::ast::{AssignOp, BinaryOp, Expr, Stmt, UnaryOp};
use super::value::{self, number, to_display, to_number, truthy};
use super::{ScriptError, ScriptHost};
use crate::schema::passage::escape_html;

/// Largest array an assignment may grow to.
const MAX_ARRAY_LEN: usize = 1 << 16;

/// Tree-walking evaluator. Statements can only read and write the state bag
/// and call host helpers; there are no loops, so evaluation always ends.
pub(crate) struct Interpreter<'h> {
    host: &'h mut dyn ScriptHost,
    out: String,
}

impl<'h> Interpreter<'h> {
    pub(crate) fn new(host: &'h mut dyn ScriptHost) -> Self {
        Self {
            host,
            out: String::new(),
        }
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }

    pub(crate) fn exec_block(&mut self, stmts: &[Stmt]) -> Result<(), ScriptError> {
        for stmt in stmts {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), ScriptError> {
        match stmt {
            Stmt::Text(text) => self.out.push_str(text),
            Stmt::Emit { expr, escape } => {
                let text = to_display(&self.eval(expr)?);
                if *escape {
                    self.out.push_str(&escape_html(&text));
                } else {
                    self.out.push_str(&text);
                }
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Assign { path, op, value } => {
                let keys = path
                    .iter()
                    .map(|k| self.eval(k))
                    .collect::<Result<Vec<_>, _>>()?;
                let rhs = self.eval(value)?;
                let new_value = match op {
                    AssignOp::Set => rhs,
                    _ => {
                        let current = self.read_state(&keys)?;
                        match op {
                            AssignOp::Add => value::add(&current, &rhs),
                            AssignOp::Sub => number(to_number(&current) - to_number(&rhs)),
                            AssignOp::Mul => number(to_number(&current) * to_number(&rhs)),
                            AssignOp::Div => number(to_number(&current) / to_number(&rhs)),
                            AssignOp::Set => rhs,
                        }
                    }
                };
                self.write_state(&keys, new_value)?;
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if truthy(&self.eval(cond)?) {
                    self.exec_block(then)?;
                } else {
                    self.exec_block(otherwise)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Lit(v) => Ok(v.clone()),
            Expr::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Expr::Var(name) if name == "s" => {
                Ok(Value::Object(self.host.state().as_map().clone()))
            }
            Expr::Var(name) => Err(ScriptError::UnknownVariable(name.clone())),
            Expr::Member { object, key } => {
                if let Some(keys) = member_keys(expr) {
                    let keys = keys
                        .into_iter()
                        .map(|k| self.eval(k))
                        .collect::<Result<Vec<_>, _>>()?;
                    return self.read_state(&keys);
                }
                let object = self.eval(object)?;
                let key = self.eval(key)?;
                value::index(&object, &key).map_err(ScriptError::Type)
            }
            Expr::Unary { op, expr } => {
                let v = self.eval(expr)?;
                Ok(match op {
                    UnaryOp::Neg => number(-to_number(&v)),
                    UnaryOp::Not => Value::Bool(!truthy(&v)),
                })
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if truthy(&self.eval(cond)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call { func, args } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.host.call(func, args)
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, ScriptError> {
        // Logical operators short-circuit and yield an operand, as in JS.
        match op {
            BinaryOp::And => {
                let l = self.eval(left)?;
                return if truthy(&l) { self.eval(right) } else { Ok(l) };
            }
            BinaryOp::Or => {
                let l = self.eval(left)?;
                return if truthy(&l) { Ok(l) } else { self.eval(right) };
            }
            _ => {}
        }

        let l = self.eval(left)?;
        let r = self.eval(right)?;
        Ok(match op {
            BinaryOp::Add => value::add(&l, &r),
            BinaryOp::Sub => number(to_number(&l) - to_number(&r)),
            BinaryOp::Mul => number(to_number(&l) * to_number(&r)),
            BinaryOp::Div => number(to_number(&l) / to_number(&r)),
            BinaryOp::Mod => number(to_number(&l) % to_number(&r)),
            BinaryOp::Eq => Value::Bool(value::loose_eq(&l, &r)),
            BinaryOp::Ne => Value::Bool(!value::loose_eq(&l, &r)),
            BinaryOp::StrictEq => Value::Bool(value::strict_eq(&l, &r)),
            BinaryOp::StrictNe => Value::Bool(!value::strict_eq(&l, &r)),
            BinaryOp::Lt => Value::Bool(value::compare(&l, &r) == Some(Ordering::Less)),
            BinaryOp::Le => Value::Bool(matches!(
                value::compare(&l, &r),
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinaryOp::Gt => Value::Bool(value::compare(&l, &r) == Some(Ordering::Greater)),
            BinaryOp::Ge => Value::Bool(matches!(
                value::compare(&l, &r),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        })
    }

    /// Walk `keys` from the state root without cloning the whole bag.
    fn read_state(&self, keys: &[Value]) -> Result<Value, ScriptError> {
        let Some((first, rest)) = keys.split_first() else {
            return Ok(Value::Object(self.host.state().as_map().clone()));
        };
        let mut cur = self
            .host
            .state()
            .get(&to_display(first))
            .cloned()
            .unwrap_or(Value::Null);
        for key in rest {
            cur = value::index(&cur, key).map_err(ScriptError::Type)?;
        }
        Ok(cur)
    }

    fn write_state(&mut self, keys: &[Value], new_value: Value) -> Result<(), ScriptError> {
        let Some((last, parents)) = keys.split_last() else {
            return Err(ScriptError::Type("cannot replace s".to_string()));
        };
        let Some((first, middle)) = parents.split_first() else {
            self.host.state_mut().set(to_display(last), new_value);
            return Ok(());
        };

        let map = self.host.state_mut().map_mut();
        let mut cur = map.get_mut(&to_display(first)).ok_or_else(|| {
            ScriptError::Type(format!(
                "cannot set property '{}' of null",
                to_display(last)
            ))
        })?;
        for key in middle {
            cur = child_mut(cur, key).ok_or_else(|| {
                ScriptError::Type(format!(
                    "cannot set property '{}' of null",
                    to_display(last)
                ))
            })?;
        }
        match cur {
            Value::Object(obj) => {
                obj.insert(to_display(last), new_value);
            }
            Value::Array(items) => {
                let i = value::array_index(last)
                    .filter(|&i| i < MAX_ARRAY_LEN)
                    .ok_or_else(|| {
                        ScriptError::Type(format!("invalid array index '{}'", to_display(last)))
                    })?;
                if i >= items.len() {
                    items.resize(i + 1, Value::Null);
                }
                items[i] = new_value;
            }
            other => {
                return Err(ScriptError::Type(format!(
                    "cannot set property '{}' of {}",
                    to_display(last),
                    if other.is_null() { "null" } else { "a primitive" }
                )));
            }
        }
        Ok(())
    }
}

fn child_mut<'v>(parent: &'v mut Value, key: &Value) -> Option<&'v mut Value> {
    match parent {
        Value::Object(obj) => obj.get_mut(&to_display(key)),
        Value::Array(items) => value::array_index(key).and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// The key expressions of a member chain rooted at `s`, outermost last.
fn member_keys(expr: &Expr) -> Option<Vec<&Expr>> {
    let mut keys = Vec::new();
    let mut cur = expr;
    loop {
        match cur {
            Expr::Member { object, key } => {
                keys.push(&**key);
                cur = object;
            }
            Expr::Var(name) if name == "s" => {
                keys.reverse();
                return Some(keys);
            }
            _ => return None,
        }
    }
}
