//! Built-in functions and methods
//!
//! Covers the tabular toolkit exposed to snippets: table and column methods,
//! group-by aggregations, string helpers and the `np` / `pd` namespaces.
//! Nothing here touches the filesystem, the network or other processes.

use super::eval::{binary, dict_key};
use super::ast::BinOp;
use super::value::{Module, Value};
use crate::error::{Error, Result};
use crate::table::{stats, Agg, Cell, Column, GroupBy, JoinHow, Table};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Evaluated call arguments
#[derive(Debug, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

impl Args {
    fn get(&self, pos: usize, name: &str) -> Option<&Value> {
        self.named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.positional.get(pos))
    }

    fn required(&self, pos: usize, name: &str, func: &str) -> Result<&Value> {
        self.get(pos, name).ok_or_else(|| {
            Error::execution(format!("{}() missing required argument '{}'", func, name))
        })
    }

    fn usize_or(&self, pos: usize, name: &str, default: usize) -> Result<usize> {
        match self.get(pos, name) {
            None | Some(Value::None) => Ok(default),
            Some(Value::Int(n)) if *n >= 0 => Ok(*n as usize),
            Some(other) => Err(Error::execution(format!(
                "argument '{}' must be a non-negative integer, got {}",
                name,
                other.repr()
            ))),
        }
    }

    fn bool_or(&self, pos: usize, name: &str, default: bool) -> Result<bool> {
        match self.get(pos, name) {
            None => Ok(default),
            Some(v) => v.truthy(),
        }
    }

    fn names_or(&self, pos: usize, name: &str) -> Result<Option<Vec<String>>> {
        self.get(pos, name).map(names).transpose()
    }
}

/// Interpret a string or list of strings as column names
fn names(v: &Value) -> Result<Vec<String>> {
    match v {
        Value::Str(s) => Ok(vec![s.clone()]),
        Value::List(items) => items
            .iter()
            .map(|i| match i {
                Value::Str(s) => Ok(s.clone()),
                other => Err(Error::execution(format!(
                    "column names must be strings, got {}",
                    other.type_name()
                ))),
            })
            .collect(),
        Value::None => Ok(Vec::new()),
        other => Err(Error::execution(format!(
            "expected a column name or list of names, got {}",
            other.type_name()
        ))),
    }
}

/// Cells of a column, list or scalar
fn cells(v: &Value) -> Result<Vec<Cell>> {
    match v {
        Value::Column(c) => Ok(c.values.clone()),
        Value::List(items) => items.iter().map(Value::to_cell).collect(),
        scalar => Ok(vec![scalar.to_cell()?]),
    }
}

fn unknown(obj: &Value, name: &str) -> Error {
    Error::execution(format!(
        "'{}' object has no method '{}'",
        obj.type_name(),
        name
    ))
}

fn map_column(col: &Column, f: impl Fn(&Cell) -> Result<Cell>) -> Result<Value> {
    let values = col.values.iter().map(f).collect::<Result<_>>()?;
    Ok(Value::Column(Column::new(col.name.clone(), values)))
}

fn round_f64(x: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (x * factor).round() / factor
}

fn reduce(agg: Agg, values: &[Cell]) -> Value {
    Value::from_cell(&agg.apply(values))
}

/// Call a free function such as `len` or `round`
pub fn call_builtin(name: &str, args: &Args) -> Result<Value> {
    let first = || args.required(0, "x", name);
    match name {
        "print" | "display" => Ok(Value::None),
        "len" => match first()? {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            Value::Dict(items) => Ok(Value::Int(items.len() as i64)),
            Value::Column(c) => Ok(Value::Int(c.len() as i64)),
            Value::Table(t) => Ok(Value::Int(t.len() as i64)),
            Value::GroupBy(g) => Ok(Value::Int(g.len() as i64)),
            other => Err(Error::execution(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        },
        "round" => {
            let digits = args.get(1, "ndigits");
            round_value(first()?, digits)
        }
        "abs" => match first()? {
            Value::Int(i) => Ok(Value::Int(i.abs())),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            Value::Column(c) => column_method(c, "abs", &Args::default()),
            other => Err(Error::execution(format!(
                "bad operand type for abs(): '{}'",
                other.type_name()
            ))),
        },
        "min" | "max" | "sum" => {
            let values = if args.positional.len() > 1 {
                args.positional
                    .iter()
                    .map(Value::to_cell)
                    .collect::<Result<Vec<_>>>()?
            } else {
                cells(first()?)?
            };
            let agg = match name {
                "min" => Agg::Min,
                "max" => Agg::Max,
                _ => Agg::Sum,
            };
            if values.is_empty() && agg != Agg::Sum {
                return Err(Error::execution(format!("{}() arg is an empty sequence", name)));
            }
            Ok(reduce(agg, &values))
        }
        "float" => match first()? {
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| Error::execution(format!("could not convert string to float: '{}'", s))),
            v => v
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| Error::execution(format!("float() argument must be a number, not '{}'", v.type_name()))),
        },
        "int" => match first()? {
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Error::execution(format!("invalid literal for int(): '{}'", s))),
            v => v
                .as_f64()
                .map(|f| Value::Int(f.trunc() as i64))
                .ok_or_else(|| Error::execution(format!("int() argument must be a number, not '{}'", v.type_name()))),
        },
        "str" => Ok(Value::Str(first()?.to_string())),
        "bool" => Ok(Value::Bool(first()?.truthy()?)),
        "list" => match first()? {
            Value::Column(c) => Ok(Value::List(c.values.iter().map(Value::from_cell).collect())),
            Value::List(items) => Ok(Value::List(items.clone())),
            Value::Dict(items) => Ok(Value::List(items.iter().map(|(k, _)| Value::Str(k.clone())).collect())),
            Value::Table(t) => Ok(Value::List(t.column_names().iter().cloned().map(Value::Str).collect())),
            other => Err(Error::execution(format!("'{}' object is not iterable", other.type_name()))),
        },
        "sorted" => {
            let mut values = cells(first()?)?;
            values.sort();
            if args.bool_or(1, "reverse", false)? {
                values.reverse();
            }
            Ok(Value::List(values.iter().map(Value::from_cell).collect()))
        }
        "range" => {
            let (start, stop) = match (args.positional.first(), args.positional.get(1)) {
                (Some(Value::Int(a)), Some(Value::Int(b))) => (*a, *b),
                (Some(Value::Int(b)), None) => (0, *b),
                _ => return Err(Error::execution("range() expects integer arguments")),
            };
            if stop.saturating_sub(start) > 1_000_000 {
                return Err(Error::execution("range() is limited to one million items"));
            }
            Ok(Value::List((start..stop).map(Value::Int).collect()))
        }
        "open" | "exec" | "eval" | "compile" | "__import__" | "input" | "globals" | "locals" => Err(
            Error::execution(format!("'{}' is not available in the sandbox", name)),
        ),
        _ => Err(Error::execution(format!("name '{}' is not defined", name))),
    }
}

fn round_value(v: &Value, digits: Option<&Value>) -> Result<Value> {
    let digits = match digits {
        None | Some(Value::None) => None,
        Some(Value::Int(d)) => Some(*d as i32),
        Some(other) => {
            return Err(Error::execution(format!(
                "ndigits must be an integer, got {}",
                other.type_name()
            )))
        }
    };
    match (v, digits) {
        (Value::Int(i), _) => Ok(Value::Int(*i)),
        (Value::Float(f), None) => Ok(Value::Int(f.round() as i64)),
        (Value::Float(f), Some(d)) => Ok(Value::Float(round_f64(*f, d))),
        (Value::None, _) => Ok(Value::None),
        (Value::Column(c), d) => map_column(c, |cell| {
            Ok(match cell {
                Cell::Float(f) => Cell::Float(round_f64(*f, d.unwrap_or(0))),
                other => other.clone(),
            })
        }),
        (Value::Table(t), d) => {
            let mut out = (**t).clone();
            for name in t.column_names() {
                let col = t.column(name)?;
                let digits = Value::Int(i64::from(d.unwrap_or(0)));
                if let Value::Column(rounded) = round_value(&Value::Column(col), Some(&digits))? {
                    out = out.with_column(name, rounded.values)?;
                }
            }
            Ok(Value::table(out))
        }
        (Value::Dict(items), d) => Ok(Value::Dict(
            items
                .iter()
                .map(|(k, v)| {
                    let digits = d.map(|d| Value::Int(i64::from(d)));
                    Ok((k.clone(), round_value(v, digits.as_ref())?))
                })
                .collect::<Result<_>>()?,
        )),
        (other, _) => Err(Error::execution(format!(
            "type {} doesn't define round()",
            other.type_name()
        ))),
    }
}

/// Dispatch `obj.name(args)`
pub fn call_method(obj: Value, name: &str, args: &Args) -> Result<Value> {
    match &obj {
        Value::Table(t) => table_method(t, name, args),
        Value::Column(c) => column_method(c, name, args),
        Value::GroupBy(g) => group_method(g, name, args),
        Value::GroupedColumn(g, col) => grouped_column_method(g, col, name, args),
        Value::StrAccessor(c) => str_method(c, name, args),
        Value::Module(m) => module_function(*m, name, args),
        Value::Str(s) => text_method(s, name, args),
        Value::Dict(items) => match name {
            "keys" => Ok(Value::List(items.iter().map(|(k, _)| Value::Str(k.clone())).collect())),
            "values" => Ok(Value::List(items.iter().map(|(_, v)| v.clone()).collect())),
            "items" => Ok(Value::List(
                items
                    .iter()
                    .map(|(k, v)| Value::List(vec![Value::Str(k.clone()), v.clone()]))
                    .collect(),
            )),
            "get" => {
                let key = dict_key(args.required(0, "key", "get")?);
                Ok(items
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.clone())
                    .or_else(|| args.get(1, "default").cloned())
                    .unwrap_or(Value::None))
            }
            _ => Err(unknown(&obj, name)),
        },
        Value::List(items) => match name {
            "count" => {
                let needle = args.required(0, "value", "count")?;
                let n = items
                    .iter()
                    .filter(|v| matches!(binary(BinOp::Eq, v, needle), Ok(Value::Bool(true))))
                    .count();
                Ok(Value::Int(n as i64))
            }
            "index" => {
                let needle = args.required(0, "value", "index")?;
                items
                    .iter()
                    .position(|v| matches!(binary(BinOp::Eq, v, needle), Ok(Value::Bool(true))))
                    .map(|i| Value::Int(i as i64))
                    .ok_or_else(|| Error::execution(format!("{} is not in list", needle.repr())))
            }
            _ => Err(unknown(&obj, name)),
        },
        Value::Float(f) if name == "is_integer" => Ok(Value::Bool(f.fract() == 0.0)),
        _ => Err(unknown(&obj, name)),
    }
}

fn table_method(t: &Arc<Table>, name: &str, args: &Args) -> Result<Value> {
    let last_column = || {
        t.column_names()
            .last()
            .cloned()
            .ok_or_else(|| Error::execution("table has no columns"))
    };
    match name {
        "head" => Ok(Value::table(t.head(args.usize_or(0, "n", 5)?))),
        "tail" => Ok(Value::table(t.tail(args.usize_or(0, "n", 5)?))),
        "copy" | "reset_index" | "to_frame" => Ok(Value::Table(Arc::clone(t))),
        "sort_values" => {
            let by = match args.names_or(0, "by")? {
                Some(by) if !by.is_empty() => by,
                _ => vec![last_column()?],
            };
            let ascending = args.bool_or(1, "ascending", true)?;
            Ok(Value::table(t.sort_by(&by, ascending)?))
        }
        "nlargest" | "nsmallest" => {
            let n = args.usize_or(0, "n", 5)?;
            let by = match args.names_or(1, "columns")? {
                Some(by) if !by.is_empty() => by,
                _ => vec![last_column()?],
            };
            let sorted = t.sort_by(&by, name == "nsmallest")?;
            Ok(Value::table(sorted.head(n)))
        }
        "groupby" => {
            let keys = names(args.required(0, "by", "groupby")?)?;
            Ok(Value::GroupBy(Arc::new(GroupBy::new(Arc::clone(t), keys)?)))
        }
        "merge" | "join" => {
            let right = match args.required(0, "right", name)? {
                Value::Table(r) => Arc::clone(r),
                other => {
                    return Err(Error::execution(format!(
                        "can only merge with a DataFrame, got {}",
                        other.type_name()
                    )))
                }
            };
            merge(t, &right, args, 1)
        }
        "describe" => Ok(Value::table(t.describe())),
        "dropna" => {
            let subset = args.names_or(0, "subset")?.unwrap_or_default();
            Ok(Value::table(t.drop_nulls(&subset)?))
        }
        "drop_duplicates" => Ok(Value::table(t.drop_duplicates())),
        "isna" | "isnull" => Ok(Value::table(t.null_mask(true))),
        "notna" | "notnull" => Ok(Value::table(t.null_mask(false))),
        "rename" => {
            let mapping = match args.get(0, "columns") {
                Some(Value::Dict(items)) => items
                    .iter()
                    .map(|(k, v)| (k.clone(), dict_key(v)))
                    .collect::<BTreeMap<_, _>>(),
                _ => return Err(Error::execution("rename() expects columns={old: new}")),
            };
            Ok(Value::table(t.rename(&mapping)))
        }
        "drop" => {
            let drop = names(args.required(0, "columns", "drop")?)?;
            let keep: Vec<String> = t
                .column_names()
                .iter()
                .filter(|c| !drop.contains(c))
                .cloned()
                .collect();
            Ok(Value::table(t.select(&keep)?))
        }
        "idxmax" | "idxmin" => {
            let target = last_column()?;
            let sorted = t.sort_by(&[target], name == "idxmin")?;
            Ok(sorted
                .rows()
                .first()
                .map_or(Value::None, |row| Value::from_cell(&row[0])))
        }
        "to_dict" => {
            let orient = match args.get(0, "orient") {
                Some(Value::Str(s)) => s.clone(),
                _ => "list".to_string(),
            };
            if orient == "records" {
                Ok(records(t))
            } else {
                let mut out = Vec::with_capacity(t.width());
                for col in t.column_names() {
                    let c = t.column(col)?;
                    out.push((col.clone(), Value::List(c.values.iter().map(Value::from_cell).collect())));
                }
                Ok(Value::Dict(out))
            }
        }
        "agg" | "aggregate" => match args.required(0, "func", name)? {
            Value::Dict(spec) => {
                let mut out = Vec::with_capacity(spec.len());
                for (col, func) in spec {
                    let agg = agg_name(func)?;
                    out.push((col.clone(), reduce(agg, &t.column(col)?.values)));
                }
                Ok(Value::Dict(out))
            }
            func => per_column(t, agg_name(func)?),
        },
        _ => match name.parse::<Agg>() {
            Ok(agg) if args.positional.is_empty() => per_column(t, agg),
            _ => Err(unknown(&Value::Table(Arc::clone(t)), name)),
        },
    }
}

fn records(t: &Table) -> Value {
    Value::List(
        t.rows()
            .iter()
            .map(|row| {
                Value::Dict(
                    t.column_names()
                        .iter()
                        .zip(row)
                        .map(|(n, c)| (n.clone(), Value::from_cell(c)))
                        .collect(),
                )
            })
            .collect(),
    )
}

/// Reduce every column of a table; numeric reductions skip text columns
fn per_column(t: &Table, agg: Agg) -> Result<Value> {
    let numeric_only = matches!(agg, Agg::Sum | Agg::Mean | Agg::Median | Agg::Std | Agg::Var);
    let mut out = Vec::new();
    for (name, dtype) in t.dtypes() {
        if numeric_only && !matches!(dtype, "int64" | "float64" | "bool") {
            continue;
        }
        out.push((name.clone(), reduce(agg, &t.column(&name)?.values)));
    }
    Ok(Value::Dict(out))
}

fn agg_name(v: &Value) -> Result<Agg> {
    match v {
        Value::Str(s) => s.parse::<Agg>().map_err(Error::Execution),
        other => Err(Error::execution(format!(
            "aggregation must be named by a string, got {}",
            other.type_name()
        ))),
    }
}

fn merge(left: &Table, right: &Table, args: &Args, pos: usize) -> Result<Value> {
    let on = match args.names_or(pos, "on")? {
        Some(on) if !on.is_empty() => on,
        _ => left
            .column_names()
            .iter()
            .filter(|c| right.has_column(c))
            .cloned()
            .collect(),
    };
    let how = match args.get(pos + 1, "how") {
        Some(Value::Str(s)) => s.parse::<JoinHow>()?,
        _ => JoinHow::Inner,
    };
    Ok(Value::table(left.merge(right, &on, how)?))
}

fn column_method(c: &Column, name: &str, args: &Args) -> Result<Value> {
    let obj = || Value::Column(c.clone());
    match name {
        "quantile" => {
            let q = args.get(0, "q").and_then(Value::as_f64).unwrap_or(0.5);
            Ok(stats::quantile(&c.values, q).map_or(Value::None, Value::Float))
        }
        "unique" => Ok(Value::List(
            stats::unique(&c.values).iter().map(Value::from_cell).collect(),
        )),
        "value_counts" => {
            let normalize = args.bool_or(0, "normalize", false)?;
            let counts = stats::value_counts(&c.values);
            let total: usize = counts.iter().map(|(_, n)| n).sum();
            let label = if normalize { "proportion" } else { "count" };
            let rows = counts
                .into_iter()
                .map(|(value, n)| {
                    let measure = if normalize {
                        Cell::Float(n as f64 / total.max(1) as f64)
                    } else {
                        Cell::Int(n as i64)
                    };
                    vec![value, measure]
                })
                .collect();
            Ok(Value::table(Table::new(
                vec![c.name.clone(), label.to_string()],
                rows,
            )?))
        }
        "tolist" | "to_list" => Ok(Value::List(c.values.iter().map(Value::from_cell).collect())),
        "head" => {
            let n = args.usize_or(0, "n", 5)?;
            Ok(Value::Column(Column::new(c.name.clone(), c.values.iter().take(n).cloned().collect())))
        }
        "tail" => {
            let n = args.usize_or(0, "n", 5)?;
            let skip = c.len().saturating_sub(n);
            Ok(Value::Column(Column::new(c.name.clone(), c.values[skip..].to_vec())))
        }
        "abs" => map_column(c, |cell| {
            Ok(match cell {
                Cell::Int(i) => Cell::Int(i.abs()),
                Cell::Float(f) => Cell::Float(f.abs()),
                other => other.clone(),
            })
        }),
        "round" => round_value(&obj(), args.get(0, "decimals")),
        "isna" | "isnull" => map_column(c, |cell| Ok(Cell::Bool(cell.is_null()))),
        "notna" | "notnull" => map_column(c, |cell| Ok(Cell::Bool(!cell.is_null()))),
        "fillna" => {
            let fill = args.required(0, "value", "fillna")?.to_cell()?;
            map_column(c, |cell| Ok(if cell.is_null() { fill.clone() } else { cell.clone() }))
        }
        "dropna" => Ok(Value::Column(Column::new(
            c.name.clone(),
            c.values.iter().filter(|v| !v.is_null()).cloned().collect(),
        ))),
        "between" => {
            let lo = args.required(0, "left", "between")?;
            let hi = args.required(1, "right", "between")?;
            let low = binary(BinOp::Ge, &obj(), lo)?;
            let high = binary(BinOp::Le, &obj(), hi)?;
            binary(BinOp::BitAnd, &low, &high)
        }
        "isin" => {
            let allowed = cells(args.required(0, "values", "isin")?)?;
            map_column(c, |cell| Ok(Cell::Bool(!cell.is_null() && allowed.contains(cell))))
        }
        "sort_values" => {
            let ascending = args.bool_or(0, "ascending", true)?;
            let mut values = c.values.clone();
            values.sort_by(|a, b| match (a.is_null(), b.is_null()) {
                (false, false) if !ascending => b.cmp(a),
                _ => a.cmp(b),
            });
            Ok(Value::Column(Column::new(c.name.clone(), values)))
        }
        "corr" => match args.required(0, "other", "corr")? {
            Value::Column(other) => Ok(stats::correlation(&c.values, &other.values)
                .map_or(Value::None, Value::Float)),
            other => Err(Error::execution(format!(
                "corr() expects a Series, got {}",
                other.type_name()
            ))),
        },
        "idxmax" | "idxmin" => {
            let best = c
                .values
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_null())
                .reduce(|a, b| {
                    let better = if name == "idxmax" { b.1 > a.1 } else { b.1 < a.1 };
                    if better {
                        b
                    } else {
                        a
                    }
                });
            Ok(best.map_or(Value::None, |(i, _)| Value::Int(i as i64)))
        }
        "astype" => {
            let target = match args.required(0, "dtype", "astype")? {
                Value::Str(s) => s.clone(),
                other => other.to_string(),
            };
            map_column(c, |cell| cast(cell, &target))
        }
        "cumsum" => {
            let mut running = Cell::Int(0);
            let values = c
                .values
                .iter()
                .map(|cell| {
                    if cell.is_null() {
                        return Cell::Null;
                    }
                    running = stats::sum(&[running.clone(), cell.clone()]);
                    running.clone()
                })
                .collect();
            Ok(Value::Column(Column::new(c.name.clone(), values)))
        }
        "any" => Ok(Value::Bool(c.values.iter().any(|v| v.as_f64().is_some_and(|f| f != 0.0)))),
        "all" => Ok(Value::Bool(c.values.iter().filter(|v| !v.is_null()).all(|v| v.as_f64().is_some_and(|f| f != 0.0)))),
        "describe" => Ok(Value::table(Table::from_columns(vec![c.clone()])?.describe())),
        "to_frame" => Ok(Value::table(Table::from_columns(vec![c.clone()])?)),
        "copy" | "reset_index" => Ok(obj()),
        "agg" | "aggregate" => Ok(reduce(agg_name(args.required(0, "func", name)?)?, &c.values)),
        _ => match name.parse::<Agg>() {
            Ok(agg) => Ok(reduce(agg, &c.values)),
            Err(_) => Err(unknown(&obj(), name)),
        },
    }
}

fn cast(cell: &Cell, target: &str) -> Result<Cell> {
    if cell.is_null() {
        return Ok(Cell::Null);
    }
    let fail = || Error::execution(format!("cannot convert {} to {}", cell, target));
    Ok(match target {
        "int" | "int64" | "int32" => match cell {
            Cell::Str(s) => Cell::Int(s.trim().parse().map_err(|_| fail())?),
            other => Cell::Int(other.as_f64().ok_or_else(fail)?.trunc() as i64),
        },
        "float" | "float64" | "float32" => match cell {
            Cell::Str(s) => Cell::Float(s.trim().parse().map_err(|_| fail())?),
            other => Cell::Float(other.as_f64().ok_or_else(fail)?),
        },
        "str" | "string" | "object" => Cell::Str(cell.to_string()),
        "bool" => Cell::Bool(cell.as_f64().map_or_else(|| !cell.to_string().is_empty(), |f| f != 0.0)),
        _ => return Err(Error::execution(format!("unsupported dtype '{}'", target))),
    })
}

fn group_method(g: &Arc<GroupBy>, name: &str, args: &Args) -> Result<Value> {
    match name {
        "size" => Ok(Value::table(g.size())),
        "agg" | "aggregate" => match args.required(0, "func", name)? {
            Value::Dict(spec) => {
                let specs = spec
                    .iter()
                    .map(|(col, func)| Ok((col.clone(), agg_name(func)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::table(g.agg_many(&specs)?))
            }
            func => Ok(Value::table(g.agg_all(agg_name(func)?)?)),
        },
        _ => match name.parse::<Agg>() {
            Ok(agg) => Ok(Value::table(g.agg_all(agg)?)),
            Err(_) => Err(unknown(&Value::GroupBy(Arc::clone(g)), name)),
        },
    }
}

fn grouped_column_method(g: &Arc<GroupBy>, col: &str, name: &str, args: &Args) -> Result<Value> {
    let agg = match name {
        "agg" | "aggregate" => agg_name(args.required(0, "func", name)?)?,
        other => other.parse::<Agg>().map_err(|_| {
            unknown(&Value::GroupedColumn(Arc::clone(g), col.to_string()), name)
        })?,
    };
    Ok(Value::table(g.agg(col, agg)?))
}

fn str_method(c: &Column, name: &str, args: &Args) -> Result<Value> {
    let text = |cell: &Cell| match cell {
        Cell::Str(s) => Some(s.clone()),
        _ => None,
    };
    match name {
        "contains" | "startswith" | "endswith" => {
            let pat = match args.required(0, "pat", name)? {
                Value::Str(s) => s.clone(),
                other => other.to_string(),
            };
            let case = args.bool_or(1, "case", true)?;
            map_column(c, |cell| {
                Ok(match text(cell) {
                    None => Cell::Bool(false),
                    Some(s) => {
                        let (s, p) = if case {
                            (s, pat.clone())
                        } else {
                            (s.to_lowercase(), pat.to_lowercase())
                        };
                        Cell::Bool(match name {
                            "contains" => s.contains(&p),
                            "startswith" => s.starts_with(&p),
                            _ => s.ends_with(&p),
                        })
                    }
                })
            })
        }
        "lower" | "upper" | "strip" => map_column(c, |cell| {
            Ok(match text(cell) {
                None => cell.clone(),
                Some(s) => Cell::Str(match name {
                    "lower" => s.to_lowercase(),
                    "upper" => s.to_uppercase(),
                    _ => s.trim().to_string(),
                }),
            })
        }),
        "len" => map_column(c, |cell| {
            Ok(text(cell).map_or(Cell::Null, |s| Cell::Int(s.chars().count() as i64)))
        }),
        "replace" => {
            let from = dict_key(args.required(0, "pat", name)?);
            let to = dict_key(args.required(1, "repl", name)?);
            map_column(c, |cell| {
                Ok(text(cell).map_or_else(|| cell.clone(), |s| Cell::Str(s.replace(&from, &to))))
            })
        }
        _ => Err(unknown(&Value::StrAccessor(c.clone()), name)),
    }
}

fn text_method(s: &str, name: &str, args: &Args) -> Result<Value> {
    match name {
        "lower" => Ok(Value::Str(s.to_lowercase())),
        "upper" => Ok(Value::Str(s.to_uppercase())),
        "strip" => Ok(Value::Str(s.trim().to_string())),
        "startswith" => Ok(Value::Bool(s.starts_with(&dict_key(args.required(0, "prefix", name)?)))),
        "endswith" => Ok(Value::Bool(s.ends_with(&dict_key(args.required(0, "suffix", name)?)))),
        "replace" => Ok(Value::Str(s.replace(
            &dict_key(args.required(0, "old", name)?),
            &dict_key(args.required(1, "new", name)?),
        ))),
        "split" => {
            let parts: Vec<Value> = match args.get(0, "sep") {
                Some(Value::Str(sep)) => s.split(sep.as_str()).map(|p| Value::Str(p.to_string())).collect(),
                _ => s.split_whitespace().map(|p| Value::Str(p.to_string())).collect(),
            };
            Ok(Value::List(parts))
        }
        _ => Err(unknown(&Value::Str(s.to_string()), name)),
    }
}

fn module_function(module: Module, name: &str, args: &Args) -> Result<Value> {
    let first = || args.required(0, "x", name);
    match (module, name) {
        (Module::Numeric, "sqrt" | "log" | "log10" | "exp" | "floor" | "ceil" | "isnan") => {
            let f = |x: f64| match name {
                "sqrt" => x.sqrt(),
                "log" => x.ln(),
                "log10" => x.log10(),
                "exp" => x.exp(),
                "floor" => x.floor(),
                "ceil" => x.ceil(),
                _ => x,
            };
            match first()? {
                Value::Column(c) => map_column(c, |cell| {
                    Ok(match (name, cell.as_f64()) {
                        ("isnan", _) => Cell::Bool(cell.is_null()),
                        (_, Some(x)) => Cell::Float(f(x)),
                        _ => Cell::Null,
                    })
                }),
                Value::None if name == "isnan" => Ok(Value::Bool(true)),
                v if name == "isnan" => Ok(Value::Bool(v.as_f64().is_some_and(f64::is_nan))),
                v => v
                    .as_f64()
                    .map(|x| Value::Float(f(x)))
                    .ok_or_else(|| Error::execution(format!("{}() expects a number", name))),
            }
        }
        (Module::Numeric, "round") => round_value(first()?, args.get(1, "decimals")),
        (Module::Numeric, "abs") => call_builtin("abs", args),
        (Module::Numeric, "percentile") => {
            let q = args
                .required(1, "q", name)?
                .as_f64()
                .ok_or_else(|| Error::execution("percentile() expects a numeric q"))?;
            Ok(stats::quantile(&cells(first()?)?, q / 100.0).map_or(Value::None, Value::Float))
        }
        (Module::Numeric, "std" | "var") => {
            // numpy defaults to the population estimator
            let values = stats::numeric(&cells(first()?)?);
            if values.is_empty() {
                return Ok(Value::None);
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            Ok(Value::Float(if name == "std" { var.sqrt() } else { var }))
        }
        (Module::Numeric, _) => match name.parse::<Agg>() {
            Ok(agg) => Ok(reduce(agg, &cells(first()?)?)),
            Err(_) => Err(unknown(&Value::Module(module), name)),
        },
        (Module::Tabular, "merge") => {
            let (left, right) = match (args.required(0, "left", name)?, args.required(1, "right", name)?) {
                (Value::Table(l), Value::Table(r)) => (Arc::clone(l), Arc::clone(r)),
                _ => return Err(Error::execution("merge() expects two DataFrames")),
            };
            merge(&left, &right, args, 2)
        }
        (Module::Tabular, "concat") => {
            let tables: Vec<Arc<Table>> = match first()? {
                Value::List(items) => items
                    .iter()
                    .map(|v| match v {
                        Value::Table(t) => Ok(Arc::clone(t)),
                        other => Err(Error::execution(format!(
                            "concat() expects DataFrames, got {}",
                            other.type_name()
                        ))),
                    })
                    .collect::<Result<_>>()?,
                _ => return Err(Error::execution("concat() expects a list of DataFrames")),
            };
            Ok(Value::table(concat(&tables)?))
        }
        (Module::Tabular, "isna" | "isnull") => match first()? {
            Value::Column(c) => map_column(c, |cell| Ok(Cell::Bool(cell.is_null()))),
            v => Ok(Value::Bool(matches!(v, Value::None))),
        },
        (Module::Tabular, "notna" | "notnull") => match first()? {
            Value::Column(c) => map_column(c, |cell| Ok(Cell::Bool(!cell.is_null()))),
            v => Ok(Value::Bool(!matches!(v, Value::None))),
        },
        (Module::Tabular, "to_numeric") => match first()? {
            Value::Column(c) => map_column(c, |cell| Ok(cast(cell, "float").unwrap_or(Cell::Null))),
            v => cast(&v.to_cell()?, "float").map(Value::from),
        },
        (Module::Tabular, "DataFrame") => match first()? {
            Value::Dict(items) => {
                let columns = items
                    .iter()
                    .map(|(k, v)| Ok(Column::new(k.clone(), cells(v)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::table(Table::from_columns(columns)?))
            }
            Value::List(rows) => {
                let mut columns: Vec<String> = Vec::new();
                for row in rows {
                    if let Value::Dict(items) = row {
                        for (k, _) in items {
                            if !columns.contains(k) {
                                columns.push(k.clone());
                            }
                        }
                    }
                }
                let table_rows = rows
                    .iter()
                    .map(|row| match row {
                        Value::Dict(items) => columns
                            .iter()
                            .map(|c| {
                                items
                                    .iter()
                                    .find(|(k, _)| k == c)
                                    .map_or(Ok(Cell::Null), |(_, v)| v.to_cell())
                            })
                            .collect::<Result<Vec<_>>>(),
                        other => Err(Error::execution(format!(
                            "DataFrame() rows must be dicts, got {}",
                            other.type_name()
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::table(Table::new(columns, table_rows)?))
            }
            other => Err(Error::execution(format!(
                "DataFrame() expects a dict or list of dicts, got {}",
                other.type_name()
            ))),
        },
        (Module::Tabular, "Series") => {
            let name_arg = match args.get(1, "name") {
                Some(Value::Str(s)) => s.clone(),
                _ => String::new(),
            };
            Ok(Value::Column(Column::new(name_arg, cells(first()?)?)))
        }
        (Module::Tabular, _) => Err(unknown(&Value::Module(module), name)),
    }
}

fn concat(tables: &[Arc<Table>]) -> Result<Table> {
    let mut columns: Vec<String> = Vec::new();
    for t in tables {
        for c in t.column_names() {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }
    }
    let mut rows = Vec::new();
    for t in tables {
        let idx: Vec<Option<usize>> = columns.iter().map(|c| t.column_index(c).ok()).collect();
        for row in t.rows() {
            rows.push(
                idx.iter()
                    .map(|i| i.map_or(Cell::Null, |i| row[i].clone()))
                    .collect(),
            );
        }
    }
    Table::new(columns, rows)
}

