//! Runtime values of the analysis language

use crate::error::{Error, Result};
use crate::table::{Cell, Column, GroupBy, Table};
use serde_json::{Map, Value as Json};
use std::fmt;
use std::sync::Arc;

/// Built-in namespaces reachable from snippets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    /// Numeric helpers (`np.mean`, `np.sqrt`, ...)
    Numeric,
    /// Table helpers (`pd.merge`, `pd.isna`, ...)
    Tabular,
}

/// A value produced while evaluating a snippet
#[derive(Debug, Clone)]
pub enum Value {
    /// Missing value
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Text
    Str(String),
    /// List literal or list result
    List(Vec<Value>),
    /// Insertion-ordered mapping
    Dict(Vec<(String, Value)>),
    /// A named column (pandas `Series`)
    Column(Column),
    /// A table (pandas `DataFrame`)
    Table(Arc<Table>),
    /// Rows partitioned by key columns
    GroupBy(Arc<GroupBy>),
    /// One column of a grouped table, awaiting an aggregation
    GroupedColumn(Arc<GroupBy>, String),
    /// `.str` accessor of a text column
    StrAccessor(Column),
    /// A built-in namespace
    Module(Module),
}

impl Value {
    /// Convert a table cell into a scalar value
    #[must_use]
    pub fn from_cell(cell: &Cell) -> Self {
        match cell {
            Cell::Null => Self::None,
            Cell::Bool(b) => Self::Bool(*b),
            Cell::Int(i) => Self::Int(*i),
            Cell::Float(f) if f.is_nan() => Self::None,
            Cell::Float(f) => Self::Float(*f),
            Cell::Str(s) => Self::Str(s.clone()),
        }
    }

    /// Convert a scalar value into a table cell
    pub fn to_cell(&self) -> Result<Cell> {
        Ok(match self {
            Self::None => Cell::Null,
            Self::Bool(b) => Cell::Bool(*b),
            Self::Int(i) => Cell::Int(*i),
            Self::Float(f) => Cell::Float(*f),
            Self::Str(s) => Cell::Str(s.clone()),
            other => {
                return Err(Error::execution(format!(
                    "expected a scalar, got {}",
                    other.type_name()
                )))
            }
        })
    }

    /// Wrap a table
    #[must_use]
    pub fn table(table: Table) -> Self {
        Self::Table(Arc::new(table))
    }

    /// Type name used in error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Column(_) => "Series",
            Self::Table(_) => "DataFrame",
            Self::GroupBy(_) => "DataFrameGroupBy",
            Self::GroupedColumn(..) => "SeriesGroupBy",
            Self::StrAccessor(_) => "StringMethods",
            Self::Module(_) => "module",
        }
    }

    /// Numeric view of a scalar
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Truthiness for `and` / `or` / `not` / `if`
    pub fn truthy(&self) -> Result<bool> {
        Ok(match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Dict(items) => !items.is_empty(),
            Self::Column(_) | Self::Table(_) => {
                return Err(Error::execution(format!(
                    "the truth value of a {} is ambiguous; use & and | for element-wise logic",
                    self.type_name()
                )))
            }
            _ => true,
        })
    }

    /// Structured conversion used for the result slot
    ///
    /// Tables become a list of records and columns become arrays; values
    /// with no structured form fall back to their textual rendering.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::None => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Str(s) => Json::String(s.clone()),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Dict(items) => {
                let mut map = Map::with_capacity(items.len());
                for (k, v) in items {
                    map.insert(k.clone(), v.to_json());
                }
                Json::Object(map)
            }
            Self::Column(col) => col.to_json(),
            Self::Table(table) => table.to_records(),
            other => Json::String(other.to_string()),
        }
    }

    pub(crate) fn repr(&self) -> String {
        match self {
            Self::Str(s) => format!("'{}'", s),
            other => other.to_string(),
        }
    }
}

impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        Self::from_cell(&cell)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{:.1}", x)
            }
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(Self::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Dict(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|(k, v)| format!("'{}': {}", k, v.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Self::Column(col) => {
                for (i, v) in col.values.iter().take(20).enumerate() {
                    writeln!(f, "{}\t{}", i, v)?;
                }
                write!(f, "Name: {}, Length: {}", col.name, col.len())
            }
            Self::Table(table) => write!(f, "{}", table),
            Self::GroupBy(g) => write!(f, "{}", g),
            Self::GroupedColumn(g, col) => write!(f, "{}['{}']", g, col),
            Self::StrAccessor(col) => write!(f, "<StringMethods of {}>", col.name),
            Self::Module(Module::Numeric) => write!(f, "<module 'np'>"),
            Self::Module(Module::Tabular) => write!(f, "<module 'pd'>"),
        }
    }
}
