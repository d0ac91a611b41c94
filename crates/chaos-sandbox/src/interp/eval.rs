//! Statement and expression evaluation

use super::ast::{BinOp, Expr, Stmt, Target, UnOp};
use super::methods::{self, Args};
use super::parser;
use super::value::{Module, Value};
use crate::error::{Error, Result};
use crate::table::{Cell, Column};
use std::collections::HashMap;
use std::sync::Arc;

/// Evaluation environment holding the snippet's variables
#[derive(Debug, Default)]
pub struct Interpreter {
    vars: HashMap<String, Value>,
}

impl Interpreter {
    /// Create an empty environment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Read a variable
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Parse and run a snippet
    pub fn run(&mut self, src: &str) -> Result<()> {
        let stmts = parser::parse(src)?;
        for stmt in &stmts {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr { expr, line } => {
                self.eval(expr).map_err(|e| at_line(e, *line))?;
            }
            Stmt::Assign {
                target: Target::Name(name),
                value,
                line,
            } => {
                let v = self.eval(value).map_err(|e| at_line(e, *line))?;
                self.vars.insert(name.clone(), v);
            }
            Stmt::Assign {
                target: Target::Index { name, key },
                value,
                line,
            } => {
                let updated = self
                    .assign_index(name, key, value)
                    .map_err(|e| at_line(e, *line))?;
                self.vars.insert(name.clone(), updated);
            }
        }
        Ok(())
    }

    fn assign_index(&mut self, name: &str, key: &Expr, value: &Expr) -> Result<Value> {
        let key = self.eval(key)?;
        let value = self.eval(value)?;
        match (self.lookup(name)?, key) {
            (Value::Table(table), Value::Str(col)) => {
                let values = broadcast(&value, table.len())?;
                Ok(Value::table(table.with_column(&col, values)?))
            }
            (Value::Dict(items), key) => {
                let key = dict_key(&key);
                let mut items = items.clone();
                match items.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = value,
                    None => items.push((key, value)),
                }
                Ok(Value::Dict(items))
            }
            (Value::List(items), Value::Int(i)) => {
                let mut items = items.clone();
                let idx = list_index(i, items.len())?;
                items[idx] = value;
                Ok(Value::List(items))
            }
            (other, key) => Err(Error::execution(format!(
                "'{}' object does not support item assignment with key {}",
                other.type_name(),
                key.repr()
            ))),
        }
    }

    fn lookup(&self, name: &str) -> Result<&Value> {
        self.vars
            .get(name)
            .ok_or_else(|| Error::execution(format!("name '{}' is not defined", name)))
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value> {
        Ok(match expr {
            Expr::None => Value::None,
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Int(i) => Value::Int(*i),
            Expr::Float(f) => Value::Float(*f),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::Name(name) => match self.vars.get(name) {
                Some(v) => v.clone(),
                None => match name.as_str() {
                    "np" | "numpy" | "math" => Value::Module(Module::Numeric),
                    "pd" | "pandas" => Value::Module(Module::Tabular),
                    _ => return Err(Error::execution(format!("name '{}' is not defined", name))),
                },
            },
            Expr::List(items) => Value::List(
                items
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Result<_>>()?,
            ),
            Expr::Dict(entries) => {
                let mut out: Vec<(String, Value)> = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    let key = dict_key(&self.eval(k)?);
                    let value = self.eval(v)?;
                    match out.iter_mut().find(|(existing, _)| *existing == key) {
                        Some(slot) => slot.1 = value,
                        None => out.push((key, value)),
                    }
                }
                Value::Dict(out)
            }
            Expr::Unary(op, inner) => {
                let v = self.eval(inner)?;
                unary(*op, v)?
            }
            Expr::Binary(BinOp::And, lhs, rhs) => {
                let l = self.eval(lhs)?;
                if l.truthy()? {
                    self.eval(rhs)?
                } else {
                    l
                }
            }
            Expr::Binary(BinOp::Or, lhs, rhs) => {
                let l = self.eval(lhs)?;
                if l.truthy()? {
                    l
                } else {
                    self.eval(rhs)?
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                binary(*op, &l, &r)?
            }
            Expr::IfElse(cond, then, other) => {
                if self.eval(cond)?.truthy()? {
                    self.eval(then)?
                } else {
                    self.eval(other)?
                }
            }
            Expr::Attr(obj, name) => {
                let o = self.eval(obj)?;
                attribute(o, name)?
            }
            Expr::Index(obj, key) => {
                let o = self.eval(obj)?;
                let k = self.eval(key)?;
                index(o, k)?
            }
            Expr::Call(callee, raw_args) => {
                let mut args = Args::default();
                for arg in raw_args {
                    let v = self.eval(&arg.value)?;
                    match &arg.name {
                        Some(n) => args.named.push((n.clone(), v)),
                        None => args.positional.push(v),
                    }
                }
                match callee.as_ref() {
                    Expr::Attr(obj, name) => {
                        let o = self.eval(obj)?;
                        methods::call_method(o, name, &args)?
                    }
                    Expr::Name(name) if !self.vars.contains_key(name) => {
                        methods::call_builtin(name, &args)?
                    }
                    other => {
                        let v = self.eval(other)?;
                        return Err(Error::execution(format!(
                            "'{}' object is not callable",
                            v.type_name()
                        )));
                    }
                }
            }
        })
    }
}

/// Longest string a snippet may build by repetition
pub(crate) const MAX_STRING_CHARS: usize = 1_000_000;

fn repeat_str(s: &str, n: i64) -> Result<Value> {
    let n = usize::try_from(n).unwrap_or(0);
    match s.chars().count().checked_mul(n) {
        Some(len) if len <= MAX_STRING_CHARS => Ok(Value::Str(s.repeat(n))),
        _ => Err(Error::execution("string repetition result too large")),
    }
}

/// Integer `a // b` rounding toward negative infinity; `None` on overflow
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div_euclid(b)?;
    let r = a.checked_rem_euclid(b)?;
    if b < 0 && r != 0 {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Integer `a % b` taking the sign of `b`; `None` on overflow
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && (r < 0) != (b < 0) {
        r.checked_add(b)
    } else {
        Some(r)
    }
}

fn at_line(err: Error, line: usize) -> Error {
    match err {
        Error::Execution(msg) if !msg.starts_with("syntax error") => {
            Error::Execution(format!("line {}: {}", line, msg))
        }
        other => other,
    }
}

pub(crate) fn dict_key(v: &Value) -> String {
    match v {
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn list_index(i: i64, len: usize) -> Result<usize> {
    let idx = if i < 0 { len as i64 + i } else { i };
    if idx < 0 || idx as usize >= len {
        return Err(Error::execution(format!("index {} is out of bounds", i)));
    }
    Ok(idx as usize)
}

/// Expand a scalar to `len` cells, or check a column's length
pub(crate) fn broadcast(value: &Value, len: usize) -> Result<Vec<Cell>> {
    match value {
        Value::Column(col) if col.len() == len => Ok(col.values.clone()),
        Value::List(items) if items.len() == len => items.iter().map(Value::to_cell).collect(),
        Value::Column(_) | Value::List(_) => Err(Error::execution(format!(
            "length of values does not match length of table ({})",
            len
        ))),
        scalar => Ok(vec![scalar.to_cell()?; len]),
    }
}

fn unary(op: UnOp, v: Value) -> Result<Value> {
    match (op, v) {
        (UnOp::Not, v) => Ok(Value::Bool(!v.truthy()?)),
        (UnOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
        (UnOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnOp::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(b))),
        (UnOp::Neg, Value::None) => Ok(Value::None),
        (UnOp::Invert, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnOp::Invert, Value::Int(i)) => Ok(Value::Int(!i)),
        (op, Value::Column(col)) => {
            let values = col
                .values
                .iter()
                .map(|c| unary(op, Value::from_cell(c))?.to_cell())
                .collect::<Result<_>>()?;
            Ok(Value::Column(Column::new(col.name, values)))
        }
        (op, other) => Err(Error::execution(format!(
            "bad operand type for unary {}: '{}'",
            match op {
                UnOp::Neg => "-",
                UnOp::Invert => "~",
                UnOp::Not => "not",
            },
            other.type_name()
        ))),
    }
}

/// Apply a binary operator, element-wise when a column is involved
pub(crate) fn binary(op: BinOp, l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Column(a), Value::Column(b)) => {
            if a.len() != b.len() {
                return Err(Error::execution(format!(
                    "cannot combine columns of length {} and {}",
                    a.len(),
                    b.len()
                )));
            }
            let values = a
                .values
                .iter()
                .zip(&b.values)
                .map(|(x, y)| {
                    scalar(op, &Value::from_cell(x), &Value::from_cell(y), true)?.to_cell()
                })
                .collect::<Result<_>>()?;
            Ok(Value::Column(Column::new(a.name.clone(), values)))
        }
        (Value::Column(a), s) => {
            let values = a
                .values
                .iter()
                .map(|x| scalar(op, &Value::from_cell(x), s, true)?.to_cell())
                .collect::<Result<_>>()?;
            Ok(Value::Column(Column::new(a.name.clone(), values)))
        }
        (s, Value::Column(b)) => {
            let values = b
                .values
                .iter()
                .map(|y| scalar(op, s, &Value::from_cell(y), true)?.to_cell())
                .collect::<Result<_>>()?;
            Ok(Value::Column(Column::new(b.name.clone(), values)))
        }
        (Value::List(a), Value::List(b)) if op == BinOp::Add => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        _ => scalar(op, l, r, false),
    }
}

fn scalar(op: BinOp, l: &Value, r: &Value, elementwise: bool) -> Result<Value> {
    use BinOp::*;
    let unsupported = || {
        Error::execution(format!(
            "unsupported operand types for {:?}: '{}' and '{}'",
            op,
            l.type_name(),
            r.type_name()
        ))
    };

    match op {
        Eq | Ne => {
            let equal = match (l.to_cell(), r.to_cell()) {
                (Ok(a), Ok(b)) if a.is_null() || b.is_null() => false,
                (Ok(a), Ok(b)) => a == b,
                _ => l.to_json() == r.to_json(),
            };
            return Ok(Value::Bool(if op == Eq { equal } else { !equal }));
        }
        Lt | Le | Gt | Ge => {
            let ord = match (l, r) {
                (Value::None, _) | (_, Value::None) => return Ok(Value::Bool(false)),
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                _ => match (l.as_f64(), r.as_f64()) {
                    (Some(a), Some(b)) => match a.partial_cmp(&b) {
                        Some(o) => o,
                        None => return Ok(Value::Bool(false)),
                    },
                    _ => return Err(unsupported()),
                },
            };
            let result = match op {
                Lt => ord.is_lt(),
                Le => ord.is_le(),
                Gt => ord.is_gt(),
                _ => ord.is_ge(),
            };
            return Ok(Value::Bool(result));
        }
        BitAnd | BitOr => {
            return match (l, r) {
                (Value::Bool(a), Value::Bool(b)) => {
                    Ok(Value::Bool(if op == BitAnd { *a && *b } else { *a || *b }))
                }
                (Value::None, Value::Bool(_)) | (Value::Bool(_), Value::None) | (Value::None, Value::None) => {
                    Ok(Value::Bool(false))
                }
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(if op == BitAnd { a & b } else { a | b })),
                _ => Err(unsupported()),
            };
        }
        And | Or => return Err(unsupported()),
        _ => {}
    }

    // arithmetic
    match (l, r) {
        (Value::None, _) | (_, Value::None) => return Ok(Value::None),
        (Value::Str(a), Value::Str(b)) if op == Add => return Ok(Value::Str(format!("{}{}", a, b))),
        (Value::Str(a), Value::Int(n)) if op == Mul => return repeat_str(a, *n),
        _ => {}
    }

    let as_int = |v: &Value| match v {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    let zero_division = || {
        if elementwise {
            Ok(Value::None)
        } else {
            Err(Error::execution("division by zero"))
        }
    };

    if let (Some(a), Some(b)) = (as_int(l), as_int(r)) {
        let checked = match op {
            Add => a.checked_add(b),
            Sub => a.checked_sub(b),
            Mul => a.checked_mul(b),
            FloorDiv | Mod if b == 0 => return zero_division(),
            FloorDiv => floor_div(a, b),
            Mod => floor_mod(a, b),
            Pow if b >= 0 => u32::try_from(b).ok().and_then(|e| a.checked_pow(e)),
            _ => None,
        };
        if let Some(v) = checked {
            return Ok(Value::Int(v));
        }
    }

    let (a, b) = match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(unsupported()),
    };
    let v = match op {
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        Div | FloorDiv | Mod if b == 0.0 => return zero_division(),
        Div => a / b,
        FloorDiv => (a / b).floor(),
        Mod => a - b * (a / b).floor(),
        Pow => a.powf(b),
        _ => return Err(unsupported()),
    };
    Ok(Value::Float(v))
}

fn attribute(obj: Value, name: &str) -> Result<Value> {
    let missing = |obj: &Value| {
        Error::execution(format!(
            "'{}' object has no attribute '{}'",
            obj.type_name(),
            name
        ))
    };
    match &obj {
        Value::Table(t) => match name {
            "columns" => Ok(Value::List(
                t.column_names().iter().cloned().map(Value::Str).collect(),
            )),
            "shape" => Ok(Value::List(vec![
                Value::Int(t.len() as i64),
                Value::Int(t.width() as i64),
            ])),
            "dtypes" => Ok(Value::Dict(
                t.dtypes()
                    .into_iter()
                    .map(|(n, d)| (n, Value::Str(d.to_string())))
                    .collect(),
            )),
            "empty" => Ok(Value::Bool(t.is_empty())),
            "size" => Ok(Value::Int((t.len() * t.width()) as i64)),
            col if t.has_column(col) => Ok(Value::Column(t.column(col)?)),
            _ => Err(missing(&obj)),
        },
        Value::Column(c) => match name {
            "name" => Ok(Value::Str(c.name.clone())),
            "size" => Ok(Value::Int(c.len() as i64)),
            "shape" => Ok(Value::List(vec![Value::Int(c.len() as i64)])),
            "dtype" => Ok(Value::Str(c.dtype().to_string())),
            "empty" => Ok(Value::Bool(c.is_empty())),
            "values" => Ok(obj.clone()),
            "str" => Ok(Value::StrAccessor(c.clone())),
            _ => Err(missing(&obj)),
        },
        Value::GroupBy(g) => match name {
            "ngroups" => Ok(Value::Int(g.len() as i64)),
            col if g.has_column(col) => Ok(Value::GroupedColumn(Arc::clone(g), col.to_string())),
            _ => Err(missing(&obj)),
        },
        Value::Module(Module::Numeric) => match name {
            "nan" => Ok(Value::None),
            "pi" => Ok(Value::Float(std::f64::consts::PI)),
            "e" => Ok(Value::Float(std::f64::consts::E)),
            "inf" => Ok(Value::Float(f64::INFINITY)),
            _ => Err(missing(&obj)),
        },
        _ => Err(missing(&obj)),
    }
}

fn index(obj: Value, key: Value) -> Result<Value> {
    match (&obj, &key) {
        (Value::Table(t), Value::Str(col)) => Ok(Value::Column(t.column(col)?)),
        (Value::Table(t), Value::List(cols)) => {
            let names: Vec<String> = cols
                .iter()
                .map(|c| match c {
                    Value::Str(s) => Ok(s.clone()),
                    other => Err(Error::execution(format!(
                        "column names must be strings, got {}",
                        other.type_name()
                    ))),
                })
                .collect::<Result<_>>()?;
            Ok(Value::table(t.select(&names)?))
        }
        (Value::Table(t), Value::Column(mask)) => Ok(Value::table(t.filter(&mask.as_mask()?)?)),
        (Value::Column(c), Value::Int(i)) => {
            let idx = list_index(*i, c.len())?;
            Ok(Value::from_cell(&c.values[idx]))
        }
        (Value::Column(c), Value::Column(mask)) => {
            let mask = mask.as_mask()?;
            if mask.len() != c.len() {
                return Err(Error::execution("boolean index has wrong length"));
            }
            let values = c
                .values
                .iter()
                .zip(mask)
                .filter(|(_, keep)| *keep)
                .map(|(v, _)| v.clone())
                .collect();
            Ok(Value::Column(Column::new(c.name.clone(), values)))
        }
        (Value::List(items), Value::Int(i)) => Ok(items[list_index(*i, items.len())?].clone()),
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[list_index(*i, chars.len())?].to_string()))
        }
        (Value::Dict(items), key) => {
            let k = dict_key(key);
            items
                .iter()
                .find(|(name, _)| *name == k)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| Error::execution(format!("KeyError: '{}'", k)))
        }
        (Value::GroupBy(g), Value::Str(col)) => {
            if !g.has_column(col) {
                return Err(Error::execution(format!("column not found: '{}'", col)));
            }
            Ok(Value::GroupedColumn(Arc::clone(g), col.clone()))
        }
        _ => Err(Error::execution(format!(
            "'{}' object cannot be indexed with {}",
            obj.type_name(),
            key.type_name()
        ))),
    }
}
