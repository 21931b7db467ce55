//! # Script Interpreter
//!
//! Tree-walking evaluator for [`Expr`]. Every evaluated node costs one step,
//! and every value built or copied costs one more step per element (strings:
//! per [`STRING_BYTES_PER_STEP`] bytes). Running out of steps, nesting calls
//! too deeply or nesting expressions too deeply aborts the script.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::limits::{ExecutionLimits, STRING_BYTES_PER_STEP};
use crate::errors::{type_name, ScriptFault};
use crate::language::ast::{ArithOp, CompareOp, Expr, TableOp};
use crate::ports::outbound::ScriptTables;

/// A function defined with `$def`.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    params: Vec<String>,
    body: Arc<Expr>,
}

static NULL: Value = Value::Null;

/// Functions visible to a script, by name.
pub type FunctionTable = BTreeMap<String, Function>;

/// Truthiness: only `false` and `null` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Step cost of holding a copy of `value`, beyond the step of the
/// expression that produced it.
fn weight(value: &Value) -> u64 {
    let string = |s: &str| (s.len() / STRING_BYTES_PER_STEP) as u64;
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => 0,
        Value::String(s) => string(s),
        Value::Array(items) => items
            .iter()
            .fold(items.len() as u64, |acc, v| acc.saturating_add(weight(v))),
        Value::Object(map) => map.iter().fold(map.len() as u64, |acc, (k, v)| {
            acc.saturating_add(string(k)).saturating_add(weight(v))
        }),
    }
}

fn integer(op: &'static str, value: &Value) -> Result<i64, ScriptFault> {
    value
        .as_i64()
        .ok_or_else(|| ScriptFault::type_error(op, "integer", value))
}

/// Evaluation state for one script execution.
pub struct Interpreter<'a, T: ScriptTables + ?Sized> {
    tables: &'a mut T,
    globals: &'a Map<String, Value>,
    functions: FunctionTable,
    limits: ExecutionLimits,
    steps: u64,
    call_depth: usize,
    eval_depth: usize,
    locals: Vec<(String, Value)>,
}

impl<'a, T: ScriptTables + ?Sized> Interpreter<'a, T> {
    /// Create an interpreter over the given tables and globals.
    pub fn new(
        tables: &'a mut T,
        globals: &'a Map<String, Value>,
        functions: FunctionTable,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            tables,
            globals,
            functions,
            limits,
            steps: 0,
            call_depth: 0,
            eval_depth: 0,
            locals: Vec::new(),
        }
    }

    /// Steps consumed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Functions defined so far (including any the interpreter started with).
    pub fn into_functions(self) -> FunctionTable {
        self.functions
    }

    fn charge(&mut self, cost: u64) -> Result<(), ScriptFault> {
        self.steps = self.steps.saturating_add(cost);
        if self.steps > self.limits.max_steps {
            return Err(ScriptFault::StepLimitExceeded {
                limit: self.limits.max_steps,
            });
        }
        Ok(())
    }

    /// Charge for a value that was just built or copied.
    fn charged(&mut self, value: Value) -> Result<Value, ScriptFault> {
        self.charge(weight(&value))?;
        Ok(value)
    }

    /// Evaluate an expression.
    pub fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptFault> {
        self.charge(1)?;
        if self.eval_depth >= self.limits.max_eval_depth {
            return Err(ScriptFault::NestingTooDeep {
                limit: self.limits.max_eval_depth,
            });
        }
        self.eval_depth += 1;
        let result = self.eval_expr(expr);
        self.eval_depth -= 1;
        result
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, ScriptFault> {
        match expr {
            Expr::Literal(value) => {
                self.charge(weight(value))?;
                Ok(value.clone())
            }
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Record(fields) => {
                let mut map = Map::new();
                for (key, field) in fields {
                    let value = self.eval(field)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::Var(path) => {
                let cost = weight(self.lookup(path)?);
                self.charge(cost)?;
                self.lookup(path).cloned()
            }
            Expr::Let { bindings, body } => {
                let mark = self.locals.len();
                let result = self.eval_let(bindings, body);
                self.locals.truncate(mark);
                result
            }
            Expr::Do(exprs) => {
                let mut last = Value::Null;
                for e in exprs {
                    last = self.eval(e)?;
                }
                Ok(last)
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                if is_truthy(&self.eval(cond)?) {
                    self.eval(then)
                } else if let Some(otherwise) = otherwise {
                    self.eval(otherwise)
                } else {
                    Ok(Value::Null)
                }
            }
            Expr::Compare(op, a, b) => {
                let a = self.eval(a)?;
                let b = self.eval(b)?;
                compare(*op, &a, &b).map(Value::Bool)
            }
            Expr::Arith(op, a, b) => {
                let a = self.eval(a)?;
                let b = self.eval(b)?;
                arith(*op, &a, &b).map(Value::from)
            }
            Expr::Concat(parts) => {
                let values = parts
                    .iter()
                    .map(|p| self.eval(p))
                    .collect::<Result<Vec<_>, _>>()?;
                let joined = concat(values)?;
                self.charged(joined)
            }
            Expr::Not(e) => Ok(Value::Bool(!is_truthy(&self.eval(e)?))),
            Expr::And(exprs) => {
                for e in exprs {
                    if !is_truthy(&self.eval(e)?) {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Expr::Or(exprs) => {
                for e in exprs {
                    if is_truthy(&self.eval(e)?) {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Expr::Field(target, key) => {
                let target = self.eval(target)?;
                let key = self.eval(key)?;
                let value = field(&target, &key)?;
                self.charged(value)
            }
            Expr::Len(e) => {
                let value = self.eval(e)?;
                let len = match &value {
                    Value::String(s) => s.chars().count(),
                    Value::Array(a) => a.len(),
                    Value::Object(o) => o.len(),
                    other => {
                        return Err(ScriptFault::type_error(
                            "$len",
                            "string, array or object",
                            other,
                        ))
                    }
                };
                Ok(Value::from(len))
            }
            Expr::Map { list, param, body } => {
                let items = match self.eval(list)? {
                    Value::Array(items) => items,
                    other => return Err(ScriptFault::type_error("$map", "array", &other)),
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    self.locals.push((param.clone(), item));
                    let result = self.eval(body);
                    self.locals.pop();
                    out.push(result?);
                }
                Ok(Value::Array(out))
            }
            Expr::Table {
                op,
                table,
                key,
                value,
            } => self.eval_table(*op, table, key, value.as_deref()),
            Expr::Def { name, params, body } => {
                self.functions.insert(
                    name.clone(),
                    Function {
                        params: params.clone(),
                        body: Arc::clone(body),
                    },
                );
                Ok(Value::Null)
            }
            Expr::Call { name, args } => {
                let function = self
                    .functions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ScriptFault::UndefinedFunction(name.clone()))?;
                if function.params.len() != args.len() {
                    return Err(ScriptFault::ArityMismatch {
                        function: name.clone(),
                        expected: function.params.len(),
                        actual: args.len(),
                    });
                }
                let values = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(&function, values)
            }
            Expr::Raise(e) => {
                let message = match self.eval(e)? {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Err(ScriptFault::Raised(message))
            }
        }
    }

    fn eval_let(
        &mut self,
        bindings: &[(String, Expr)],
        body: &Expr,
    ) -> Result<Value, ScriptFault> {
        for (name, e) in bindings {
            let value = self.eval(e)?;
            self.locals.push((name.clone(), value));
        }
        self.eval(body)
    }

    fn call(&mut self, function: &Function, args: Vec<Value>) -> Result<Value, ScriptFault> {
        if self.call_depth >= self.limits.max_call_depth {
            return Err(ScriptFault::CallDepthExceeded {
                limit: self.limits.max_call_depth,
            });
        }
        // Functions see globals and their own parameters, never the caller's locals.
        let frame = function.params.iter().cloned().zip(args).collect();
        let saved = std::mem::replace(&mut self.locals, frame);
        self.call_depth += 1;
        let result = self.eval(&function.body);
        self.call_depth -= 1;
        self.locals = saved;
        result
    }

    fn lookup(&self, path: &[String]) -> Result<&Value, ScriptFault> {
        let Some((root, members)) = path.split_first() else {
            return Err(ScriptFault::InvalidScript("empty variable path".into()));
        };
        let mut current = self
            .locals
            .iter()
            .rev()
            .find(|(name, _)| name == root)
            .map(|(_, value)| value)
            .or_else(|| self.globals.get(root))
            .ok_or_else(|| ScriptFault::UndefinedVariable(root.clone()))?;

        for member in members {
            let next = match current {
                Value::Object(map) => map.get(member),
                Value::Array(items) => member.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Ok(&NULL),
            }
        }
        Ok(current)
    }

    fn eval_table(
        &mut self,
        op: TableOp,
        table: &Expr,
        key: &Expr,
        value: Option<&Expr>,
    ) -> Result<Value, ScriptFault> {
        let table = match self.eval(table)? {
            Value::String(name) => name,
            other => return Err(ScriptFault::type_error("table operation", "table name", &other)),
        };
        let key = self.eval(key)?;
        match op {
            TableOp::Get => {
                let value = self.tables.get(&table, &key)?.unwrap_or(Value::Null);
                self.charged(value)
            }
            TableOp::Has => self.tables.has(&table, &key).map(Value::Bool),
            TableOp::Remove => self.tables.remove(&table, &key).map(Value::Bool),
            TableOp::Put => {
                let value = match value {
                    Some(e) => self.eval(e)?,
                    None => Value::Null,
                };
                self.tables.put(&table, key, value)?;
                Ok(Value::Null)
            }
        }
    }
}

fn compare(op: CompareOp, a: &Value, b: &Value) -> Result<bool, ScriptFault> {
    let ordering = |name: &'static str| -> Result<Ordering, ScriptFault> {
        match (a, b) {
            (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
            (Value::Number(_), Value::Number(_)) => Ok(integer(name, a)?.cmp(&integer(name, b)?)),
            _ => Err(ScriptFault::TypeError {
                op: name,
                expected: "two integers or two strings",
                found: format!("{} and {}", type_name(a), type_name(b)),
            }),
        }
    };
    Ok(match op {
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
        CompareOp::Lt => ordering("$lt")?.is_lt(),
        CompareOp::Le => ordering("$le")?.is_le(),
        CompareOp::Gt => ordering("$gt")?.is_gt(),
        CompareOp::Ge => ordering("$ge")?.is_ge(),
    })
}

fn arith(op: ArithOp, a: &Value, b: &Value) -> Result<i64, ScriptFault> {
    let name = match op {
        ArithOp::Add => "$add",
        ArithOp::Sub => "$sub",
        ArithOp::Mul => "$mul",
        ArithOp::Div => "$div",
        ArithOp::Mod => "$mod",
    };
    let x = integer(name, a)?;
    let y = integer(name, b)?;
    if matches!(op, ArithOp::Div | ArithOp::Mod) && y == 0 {
        return Err(ScriptFault::Arithmetic("division by zero"));
    }
    let result = match op {
        ArithOp::Add => x.checked_add(y),
        ArithOp::Sub => x.checked_sub(y),
        ArithOp::Mul => x.checked_mul(y),
        ArithOp::Div => x.checked_div(y),
        ArithOp::Mod => x.checked_rem(y),
    };
    result.ok_or(ScriptFault::Arithmetic("integer overflow"))
}

fn concat(values: Vec<Value>) -> Result<Value, ScriptFault> {
    if values.iter().all(Value::is_string) {
        let joined: String = values.iter().filter_map(Value::as_str).collect();
        return Ok(Value::String(joined));
    }
    if values.iter().all(Value::is_array) {
        let joined = values
            .into_iter()
            .flat_map(|v| match v {
                Value::Array(items) => items,
                _ => Vec::new(),
            })
            .collect();
        return Ok(Value::Array(joined));
    }
    let found = values
        .iter()
        .find(|v| !v.is_string())
        .map(type_name)
        .unwrap_or("mixed");
    Err(ScriptFault::TypeError {
        op: "$concat",
        expected: "all strings or all arrays",
        found: found.to_string(),
    })
}

fn field(target: &Value, key: &Value) -> Result<Value, ScriptFault> {
    match (target, key) {
        (Value::Object(map), Value::String(k)) => Ok(map.get(k).cloned().unwrap_or(Value::Null)),
        (Value::Array(items), Value::Number(_)) => {
            let index = integer("$field", key)?;
            Ok(usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null))
        }
        (Value::Null, _) => Ok(Value::Null),
        (Value::Object(_), other) => Err(ScriptFault::type_error("$field", "string key", other)),
        (Value::Array(_), other) => Err(ScriptFault::type_error("$field", "integer index", other)),
        (other, _) => Err(ScriptFault::type_error("$field", "object or array", other)),
    }
}
