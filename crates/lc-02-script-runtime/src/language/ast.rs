//! # Script Syntax
//!
//! A script is a JSON document. Any JSON value evaluates to itself, except
//! that an object with exactly one key beginning with `$` is an operator
//! application:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `{"$quote": v}` | `v`, unevaluated |
//! | `{"$var": "a.b.0"}` | variable `a`, then member `b`, then index `0` |
//! | `{"$let": ["x", e1, "y", e2, body]}` | sequential bindings, then `body` |
//! | `{"$do": [e1, .., en]}` | evaluate in order, yield `en` |
//! | `{"$if": [c, t, e]}` | `t` if `c` is truthy, else `e` (`e` optional) |
//! | `{"$eq": [a, b]}` ... `$ne $lt $le $gt $ge` | comparison |
//! | `{"$add": [a, b]}` ... `$sub $mul $div $mod` | checked integer arithmetic |
//! | `{"$concat": [..]}` | join strings or arrays |
//! | `{"$not": e}`, `{"$and": [..]}`, `{"$or": [..]}` | boolean logic, short-circuit |
//! | `{"$field": [v, k]}` | member of an object or element of an array |
//! | `{"$len": e}` | length of a string, array or object |
//! | `{"$map": [list, "x", body]}` | `body` for each element bound to `x` |
//! | `{"$get": [t, k]}`, `{"$put": [t, k, v]}`, `{"$remove": [t, k]}`, `{"$has": [t, k]}` | table access |
//! | `{"$def": ["f", ["a", "b"], body]}` | define a function |
//! | `{"$call": ["f", a, b]}` | call a function |
//! | `{"$raise": e}` | abort the script |
//!
//! `false` and `null` are falsy; every other value is truthy. There is no
//! clock, randomness, or I/O: a program's output depends only on its
//! arguments and the tables it reads.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::errors::ScriptFault;

/// Global that scripts may read but never rebind.
pub const ENV_GLOBAL: &str = "env";

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `$eq`
    Eq,
    /// `$ne`
    Ne,
    /// `$lt`
    Lt,
    /// `$le`
    Le,
    /// `$gt`
    Gt,
    /// `$ge`
    Ge,
}

/// Integer arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `$add`
    Add,
    /// `$sub`
    Sub,
    /// `$mul`
    Mul,
    /// `$div`
    Div,
    /// `$mod`
    Mod,
}

/// Table operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOp {
    /// `$get`
    Get,
    /// `$put`
    Put,
    /// `$remove`
    Remove,
    /// `$has`
    Has,
}

impl TableOp {
    /// True for operators that modify the table.
    pub fn is_write(self) -> bool {
        matches!(self, Self::Put | Self::Remove)
    }
}

/// A parsed script expression.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    Record(Vec<(String, Expr)>),
    Var(Vec<String>),
    Let {
        bindings: Vec<(String, Expr)>,
        body: Box<Expr>,
    },
    Do(Vec<Expr>),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Concat(Vec<Expr>),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Field(Box<Expr>, Box<Expr>),
    Len(Box<Expr>),
    Map {
        list: Box<Expr>,
        param: String,
        body: Box<Expr>,
    },
    Table {
        op: TableOp,
        table: Box<Expr>,
        key: Box<Expr>,
        value: Option<Box<Expr>>,
    },
    Def {
        name: String,
        params: Vec<String>,
        body: Arc<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Raise(Box<Expr>),
}

fn invalid(message: impl Into<String>) -> ScriptFault {
    ScriptFault::InvalidScript(message.into())
}

fn operands<'v>(op: &str, value: &'v Value, count: usize) -> Result<&'v [Value], ScriptFault> {
    match value {
        Value::Array(items) if items.len() == count => Ok(items),
        _ => Err(invalid(format!("{op} takes an array of {count} operands"))),
    }
}

fn list<'v>(op: &str, value: &'v Value) -> Result<&'v [Value], ScriptFault> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| invalid(format!("{op} takes an array of operands")))
}

fn name(op: &str, value: &Value) -> Result<String, ScriptFault> {
    match value.as_str() {
        Some(s) if !s.is_empty() && !s.contains('.') => Ok(s.to_string()),
        _ => Err(invalid(format!("{op}: expected a name, found {value}"))),
    }
}

fn binding_name(op: &str, value: &Value) -> Result<String, ScriptFault> {
    let name = name(op, value)?;
    if name == ENV_GLOBAL {
        return Err(invalid(format!("{op}: '{ENV_GLOBAL}' is read-only")));
    }
    Ok(name)
}

fn boxed(value: &Value) -> Result<Box<Expr>, ScriptFault> {
    Expr::parse(value).map(Box::new)
}

fn all(values: &[Value]) -> Result<Vec<Expr>, ScriptFault> {
    values.iter().map(Expr::parse).collect()
}

impl Expr {
    /// Parse a JSON document into an expression.
    pub fn parse(value: &Value) -> Result<Self, ScriptFault> {
        match value {
            Value::Array(items) => Ok(Self::Array(all(items)?)),
            Value::Object(map) => match single_operator(map) {
                Some((op, arg)) => Self::parse_operator(op, arg),
                None => map
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Self::parse(v)?)))
                    .collect::<Result<_, ScriptFault>>()
                    .map(Self::Record),
            },
            scalar => Ok(Self::Literal(scalar.clone())),
        }
    }

    fn parse_operator(op: &str, arg: &Value) -> Result<Self, ScriptFault> {
        let compare = |c| -> Result<Self, ScriptFault> {
            let [a, b] = operands(op, arg, 2)? else {
                return Err(invalid(op));
            };
            Ok(Self::Compare(c, boxed(a)?, boxed(b)?))
        };
        let arith = |a| -> Result<Self, ScriptFault> {
            let [x, y] = operands(op, arg, 2)? else {
                return Err(invalid(op));
            };
            Ok(Self::Arith(a, boxed(x)?, boxed(y)?))
        };

        match op {
            "$quote" => Ok(Self::Literal(arg.clone())),
            "$var" => {
                let path = arg
                    .as_str()
                    .ok_or_else(|| invalid("$var takes a dotted path string"))?;
                let segments: Vec<String> = path.split('.').map(str::to_string).collect();
                if segments.iter().any(String::is_empty) {
                    return Err(invalid(format!("$var: malformed path '{path}'")));
                }
                Ok(Self::Var(segments))
            }
            "$let" => {
                let items = list(op, arg)?;
                if items.len() % 2 == 0 {
                    return Err(invalid("$let takes name/value pairs followed by a body"));
                }
                let (pairs, body) = items.split_at(items.len() - 1);
                let bindings = pairs
                    .chunks(2)
                    .map(|pair| Ok((binding_name(op, &pair[0])?, Self::parse(&pair[1])?)))
                    .collect::<Result<_, ScriptFault>>()?;
                Ok(Self::Let {
                    bindings,
                    body: boxed(&body[0])?,
                })
            }
            "$do" => Ok(Self::Do(all(list(op, arg)?)?)),
            "$if" => match list(op, arg)? {
                [c, t] => Ok(Self::If {
                    cond: boxed(c)?,
                    then: boxed(t)?,
                    otherwise: None,
                }),
                [c, t, e] => Ok(Self::If {
                    cond: boxed(c)?,
                    then: boxed(t)?,
                    otherwise: Some(boxed(e)?),
                }),
                _ => Err(invalid("$if takes [cond, then] or [cond, then, else]")),
            },
            "$eq" => compare(CompareOp::Eq),
            "$ne" => compare(CompareOp::Ne),
            "$lt" => compare(CompareOp::Lt),
            "$le" => compare(CompareOp::Le),
            "$gt" => compare(CompareOp::Gt),
            "$ge" => compare(CompareOp::Ge),
            "$add" => arith(ArithOp::Add),
            "$sub" => arith(ArithOp::Sub),
            "$mul" => arith(ArithOp::Mul),
            "$div" => arith(ArithOp::Div),
            "$mod" => arith(ArithOp::Mod),
            "$concat" => Ok(Self::Concat(all(list(op, arg)?)?)),
            "$not" => Ok(Self::Not(boxed(arg)?)),
            "$and" => Ok(Self::And(all(list(op, arg)?)?)),
            "$or" => Ok(Self::Or(all(list(op, arg)?)?)),
            "$field" => {
                let [v, k] = operands(op, arg, 2)? else {
                    return Err(invalid(op));
                };
                Ok(Self::Field(boxed(v)?, boxed(k)?))
            }
            "$len" => Ok(Self::Len(boxed(arg)?)),
            "$map" => {
                let [l, param, body] = operands(op, arg, 3)? else {
                    return Err(invalid(op));
                };
                Ok(Self::Map {
                    list: boxed(l)?,
                    param: binding_name(op, param)?,
                    body: boxed(body)?,
                })
            }
            "$get" | "$has" | "$remove" => {
                let table_op = match op {
                    "$get" => TableOp::Get,
                    "$has" => TableOp::Has,
                    _ => TableOp::Remove,
                };
                let [t, k] = operands(op, arg, 2)? else {
                    return Err(invalid(op));
                };
                Ok(Self::Table {
                    op: table_op,
                    table: boxed(t)?,
                    key: boxed(k)?,
                    value: None,
                })
            }
            "$put" => {
                let [t, k, v] = operands(op, arg, 3)? else {
                    return Err(invalid(op));
                };
                Ok(Self::Table {
                    op: TableOp::Put,
                    table: boxed(t)?,
                    key: boxed(k)?,
                    value: Some(boxed(v)?),
                })
            }
            "$def" => {
                let [n, params, body] = operands(op, arg, 3)? else {
                    return Err(invalid(op));
                };
                let params = list(op, params)?
                    .iter()
                    .map(|p| binding_name(op, p))
                    .collect::<Result<_, _>>()?;
                Ok(Self::Def {
                    name: name(op, n)?,
                    params,
                    body: Arc::new(Self::parse(body)?),
                })
            }
            "$call" => match list(op, arg)? {
                [n, rest @ ..] => Ok(Self::Call {
                    name: name(op, n)?,
                    args: all(rest)?,
                }),
                [] => Err(invalid("$call takes a function name")),
            },
            "$raise" => Ok(Self::Raise(boxed(arg)?)),
            other => Err(invalid(format!("unknown operator {other}"))),
        }
    }
}

fn single_operator(map: &Map<String, Value>) -> Option<(&str, &Value)> {
    if map.len() != 1 {
        return None;
    }
    map.iter()
        .next()
        .filter(|(k, _)| k.starts_with('$'))
        .map(|(k, v)| (k.as_str(), v))
}
