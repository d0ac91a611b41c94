//! In-memory tables
//!
//! Row-major tables of [`Cell`]s loaded from CSV files. Provides the
//! operations the analysis language exposes:
//! - column selection and boolean-mask filtering
//! - sorting, head/tail, de-duplication
//! - group-by aggregation and merges
//! - summary statistics

mod catalog;
mod cell;
pub(crate) mod stats;

#[cfg(test)]
mod tests;

pub use catalog::{discover_csv, load_datasets, DatasetFile, Datasets};
pub use cell::Cell;
pub use stats::Agg;

use crate::error::{Error, Result};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Rows shown by the textual rendering
const RENDER_ROWS: usize = 20;

/// A named column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Values, one per row
    pub values: Vec<Cell>,
}

impl Column {
    /// Create a new column
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Number of values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the column has no values
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Inferred column type
    #[must_use]
    pub fn dtype(&self) -> &'static str {
        infer_dtype(&self.values)
    }

    /// Interpret the column as a boolean mask
    pub fn as_mask(&self) -> Result<Vec<bool>> {
        self.values
            .iter()
            .map(|c| match c {
                Cell::Bool(b) => Ok(*b),
                c if c.is_null() => Ok(false),
                other => Err(Error::execution(format!(
                    "cannot use non-boolean value {} as a filter mask",
                    other
                ))),
            })
            .collect()
    }

    /// Values as a JSON array
    #[must_use]
    pub fn to_json(&self) -> Json {
        Json::Array(self.values.iter().map(Cell::to_json).collect())
    }
}

/// Join strategy for [`Table::merge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinHow {
    /// Only matching keys
    #[default]
    Inner,
    /// Every left row
    Left,
    /// Every right row
    Right,
    /// Every row of both sides
    Outer,
}

impl FromStr for JoinHow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inner" => Ok(Self::Inner),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "outer" => Ok(Self::Outer),
            other => Err(Error::execution(format!("unknown join type: {}", other))),
        }
    }
}

/// A row-major table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create a table, checking that every row matches the header width
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(Error::execution(format!(
                "row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from equally long columns
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let len = columns.first().map_or(0, Column::len);
        if columns.iter().any(|c| c.len() != len) {
            return Err(Error::execution("columns have different lengths"));
        }
        let names = columns.iter().map(|c| c.name.clone()).collect();
        let rows = (0..len)
            .map(|i| columns.iter().map(|c| c.values[i].clone()).collect())
            .collect();
        Ok(Self {
            columns: names,
            rows,
        })
    }

    /// Read a CSV document with a header row
    pub fn from_csv_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let load_err = |e: csv::Error| Error::Load {
            name: name.to_string(),
            message: e.to_string(),
        };
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let columns: Vec<String> = rdr
            .headers()
            .map_err(load_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let width = columns.len();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(load_err)?;
            let mut row: Vec<Cell> = record.iter().take(width).map(Cell::parse).collect();
            row.resize(width, Cell::Null);
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    /// Read a CSV file; the dataset name is used in error messages
    pub fn from_csv_path(name: &str, path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::Load {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        Self::from_csv_reader(name, std::io::BufReader::new(file))
    }

    /// Column names in order
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Rows in order
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Whether a column exists
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Position of a column
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::execution(format!("column not found: '{}'", name)))
    }

    /// Extract a column
    pub fn column(&self, name: &str) -> Result<Column> {
        let idx = self.column_index(name)?;
        Ok(Column::new(
            name,
            self.rows.iter().map(|r| r[idx].clone()).collect(),
        ))
    }

    /// Inferred type of every column
    #[must_use]
    pub fn dtypes(&self) -> Vec<(String, &'static str)> {
        (0..self.width())
            .map(|i| {
                let values: Vec<Cell> = self.rows.iter().map(|r| r[i].clone()).collect();
                (self.columns[i].clone(), infer_dtype(&values))
            })
            .collect()
    }

    /// First `n` rows
    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Last `n` rows
    #[must_use]
    pub fn tail(&self, n: usize) -> Self {
        let skip = self.rows.len().saturating_sub(n);
        Self {
            columns: self.columns.clone(),
            rows: self.rows[skip..].to_vec(),
        }
    }

    /// Keep the named columns, in the given order
    pub fn select(&self, names: &[String]) -> Result<Self> {
        let idx: Vec<usize> = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<_>>()?;
        Ok(Self {
            columns: names.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// Keep rows where the mask is true
    pub fn filter(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.rows.len() {
            return Err(Error::execution(format!(
                "mask length {} does not match table length {}",
                mask.len(),
                self.rows.len()
            )));
        }
        Ok(Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(r, _)| r.clone())
                .collect(),
        })
    }

    /// Stable sort by one or more columns
    pub fn sort_by(&self, keys: &[String], ascending: bool) -> Result<Self> {
        let idx: Vec<usize> = keys
            .iter()
            .map(|k| self.column_index(k))
            .collect::<Result<_>>()?;
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            for &i in &idx {
                // missing values stay last in both directions
                let ord = match (a[i].is_null(), b[i].is_null()) {
                    (false, false) if ascending => a[i].cmp(&b[i]),
                    (false, false) => b[i].cmp(&a[i]),
                    _ => a[i].cmp(&b[i]),
                };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
        Ok(Self {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Add or replace a column
    pub fn with_column(&self, name: &str, values: Vec<Cell>) -> Result<Self> {
        if values.len() != self.rows.len() {
            return Err(Error::execution(format!(
                "length of values ({}) does not match length of table ({})",
                values.len(),
                self.rows.len()
            )));
        }
        let mut out = self.clone();
        match self.columns.iter().position(|c| c == name) {
            Some(i) => {
                for (row, v) in out.rows.iter_mut().zip(values) {
                    row[i] = v;
                }
            }
            None => {
                out.columns.push(name.to_string());
                for (row, v) in out.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
        Ok(out)
    }

    /// Rename columns; unknown names are ignored
    #[must_use]
    pub fn rename(&self, mapping: &BTreeMap<String, String>) -> Self {
        let mut out = self.clone();
        for col in &mut out.columns {
            if let Some(new) = mapping.get(col) {
                *col = new.clone();
            }
        }
        out
    }

    /// Drop rows with a missing value in any of the given columns (all when empty)
    pub fn drop_nulls(&self, subset: &[String]) -> Result<Self> {
        let idx: Vec<usize> = if subset.is_empty() {
            (0..self.width()).collect()
        } else {
            subset
                .iter()
                .map(|c| self.column_index(c))
                .collect::<Result<_>>()?
        };
        Ok(Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| idx.iter().all(|&i| !r[i].is_null()))
                .cloned()
                .collect(),
        })
    }

    /// Drop repeated rows, keeping the first occurrence
    #[must_use]
    pub fn drop_duplicates(&self) -> Self {
        let mut seen = BTreeMap::new();
        let rows = self
            .rows
            .iter()
            .filter(|r| seen.insert((*r).clone(), ()).is_none())
            .cloned()
            .collect();
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Map every cell to a boolean null flag
    #[must_use]
    pub fn null_mask(&self, nulls: bool) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .map(|r| r.iter().map(|c| Cell::Bool(c.is_null() == nulls)).collect())
                .collect(),
        }
    }

    /// Join two tables on shared key columns
    ///
    /// Non-key columns present on both sides get `_x` / `_y` suffixes.
    pub fn merge(&self, other: &Self, on: &[String], how: JoinHow) -> Result<Self> {
        if on.is_empty() {
            return Err(Error::execution("merge requires at least one key column"));
        }
        let lk: Vec<usize> = on
            .iter()
            .map(|k| self.column_index(k))
            .collect::<Result<_>>()?;
        let rk: Vec<usize> = on
            .iter()
            .map(|k| other.column_index(k))
            .collect::<Result<_>>()?;
        let right_rest: Vec<usize> = (0..other.width()).filter(|i| !rk.contains(i)).collect();
        let left_rest: Vec<&String> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| !lk.contains(i))
            .map(|(_, n)| n)
            .collect();

        let mut columns = Vec::with_capacity(self.width() + right_rest.len());
        for (i, name) in self.columns.iter().enumerate() {
            let clash = !lk.contains(&i) && right_rest.iter().any(|&j| other.columns[j] == *name);
            columns.push(if clash {
                format!("{}_x", name)
            } else {
                name.clone()
            });
        }
        for &j in &right_rest {
            let name = &other.columns[j];
            columns.push(if left_rest.contains(&name) {
                format!("{}_y", name)
            } else {
                name.clone()
            });
        }

        let key = |row: &[Cell], idx: &[usize]| -> Vec<Cell> {
            idx.iter().map(|&i| row[i].clone()).collect()
        };
        let index = |table: &Self, idx: &[usize]| {
            let mut map: BTreeMap<Vec<Cell>, Vec<usize>> = BTreeMap::new();
            for (n, row) in table.rows.iter().enumerate() {
                let k = key(row, idx);
                if k.iter().any(Cell::is_null) {
                    continue;
                }
                map.entry(k).or_default().push(n);
            }
            map
        };
        let combine = |left: Option<&Vec<Cell>>, right: Option<&Vec<Cell>>| -> Vec<Cell> {
            let mut out = Vec::with_capacity(columns.len());
            for i in 0..self.width() {
                out.push(match (left, right) {
                    (Some(l), _) => l[i].clone(),
                    (None, Some(r)) => lk
                        .iter()
                        .position(|&k| k == i)
                        .map_or(Cell::Null, |p| r[rk[p]].clone()),
                    (None, None) => Cell::Null,
                });
            }
            for &j in &right_rest {
                out.push(right.map_or(Cell::Null, |r| r[j].clone()));
            }
            out
        };

        let mut rows = Vec::new();
        if how == JoinHow::Right {
            let left_index = index(self, &lk);
            for r in &other.rows {
                match left_index.get(&key(r, &rk)) {
                    Some(matches) => {
                        for &i in matches {
                            rows.push(combine(Some(&self.rows[i]), Some(r)));
                        }
                    }
                    None => rows.push(combine(None, Some(r))),
                }
            }
        } else {
            let right_index = index(other, &rk);
            let mut matched = vec![false; other.rows.len()];
            for l in &self.rows {
                match right_index.get(&key(l, &lk)) {
                    Some(matches) => {
                        for &j in matches {
                            matched[j] = true;
                            rows.push(combine(Some(l), Some(&other.rows[j])));
                        }
                    }
                    None if matches!(how, JoinHow::Left | JoinHow::Outer) => {
                        rows.push(combine(Some(l), None));
                    }
                    None => {}
                }
            }
            if how == JoinHow::Outer {
                for (j, r) in other.rows.iter().enumerate() {
                    if !matched[j] {
                        rows.push(combine(None, Some(r)));
                    }
                }
            }
        }
        Ok(Self { columns, rows })
    }

    /// Summary statistics, one row per statistic
    ///
    /// Numeric columns get count/mean/std/min/quartiles/max; when no column
    /// is numeric, every column gets count/unique/top/freq instead.
    #[must_use]
    pub fn describe(&self) -> Self {
        let cols: Vec<Column> = self
            .columns
            .iter()
            .filter_map(|n| self.column(n).ok())
            .collect();
        let numeric: Vec<&Column> = cols
            .iter()
            .filter(|c| matches!(c.dtype(), "int64" | "float64"))
            .collect();

        let mut columns = vec!["stat".to_string()];
        let mut rows: Vec<Vec<Cell>> = Vec::new();
        if numeric.is_empty() {
            columns.extend(cols.iter().map(|c| c.name.clone()));
            let summary: [(&str, fn(&[Cell]) -> Cell); 4] = [
                ("count", |v: &[Cell]| Cell::Int(stats::count(v) as i64)),
                ("unique", |v: &[Cell]| Cell::Int(stats::unique(v).len() as i64)),
                ("top", |v: &[Cell]| {
                    stats::value_counts(v)
                        .first()
                        .map_or(Cell::Null, |(c, _)| c.clone())
                }),
                ("freq", |v: &[Cell]| {
                    stats::value_counts(v)
                        .first()
                        .map_or(Cell::Null, |(_, n)| Cell::Int(*n as i64))
                }),
            ];
            for (label, f) in summary {
                let mut row = vec![Cell::from(label)];
                row.extend(cols.iter().map(|c| f(&c.values)));
                rows.push(row);
            }
        } else {
            columns.extend(numeric.iter().map(|c| c.name.clone()));
            let float = |v: Option<f64>| v.map_or(Cell::Null, Cell::Float);
            let summary: [(&str, Box<dyn Fn(&[Cell]) -> Cell>); 8] = [
                ("count", Box::new(|v: &[Cell]| Cell::Int(stats::count(v) as i64))),
                ("mean", Box::new(move |v: &[Cell]| float(stats::mean(v)))),
                ("std", Box::new(move |v: &[Cell]| float(stats::variance(v).map(f64::sqrt)))),
                ("min", Box::new(stats::min)),
                ("25%", Box::new(move |v: &[Cell]| float(stats::quantile(v, 0.25)))),
                ("50%", Box::new(move |v: &[Cell]| float(stats::quantile(v, 0.5)))),
                ("75%", Box::new(move |v: &[Cell]| float(stats::quantile(v, 0.75)))),
                ("max", Box::new(stats::max)),
            ];
            for (label, f) in &summary {
                let mut row = vec![Cell::from(*label)];
                row.extend(numeric.iter().map(|c| f(&c.values)));
                rows.push(row);
            }
        }
        Self { columns, rows }
    }

    /// Rows as a JSON array of objects
    #[must_use]
    pub fn to_records(&self) -> Json {
        Json::Array(
            self.rows
                .iter()
                .map(|r| {
                    let mut obj = Map::with_capacity(self.columns.len());
                    for (name, cell) in self.columns.iter().zip(r) {
                        obj.insert(name.clone(), cell.to_json());
                    }
                    Json::Object(obj)
                })
                .collect(),
        )
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in self.rows.iter().take(RENDER_ROWS) {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        if self.rows.len() > RENDER_ROWS {
            writeln!(f, "...")?;
        }
        write!(f, "[{} rows x {} columns]", self.rows.len(), self.columns.len())
    }
}

/// Rows of a table partitioned by key columns, keys in sorted order
#[derive(Debug, Clone)]
pub struct GroupBy {
    table: Arc<Table>,
    keys: Vec<String>,
    groups: Vec<(Vec<Cell>, Vec<usize>)>,
}

impl GroupBy {
    /// Group rows of `table` by the key columns
    pub fn new(table: Arc<Table>, keys: Vec<String>) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::execution("groupby requires at least one key column"));
        }
        let idx: Vec<usize> = keys
            .iter()
            .map(|k| table.column_index(k))
            .collect::<Result<_>>()?;
        let mut map: BTreeMap<Vec<Cell>, Vec<usize>> = BTreeMap::new();
        for (n, row) in table.rows.iter().enumerate() {
            let key: Vec<Cell> = idx.iter().map(|&i| row[i].clone()).collect();
            // rows with missing keys are dropped
            if key.iter().any(Cell::is_null) {
                continue;
            }
            map.entry(key).or_default().push(n);
        }
        Ok(Self {
            table,
            keys,
            groups: map.into_iter().collect(),
        })
    }

    /// Key column names
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Number of groups
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether a column exists in the grouped table
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.table.has_column(name)
    }

    /// Aggregate one column per group
    pub fn agg(&self, column: &str, agg: Agg) -> Result<Table> {
        self.agg_many(&[(column.to_string(), agg)])
    }

    /// Aggregate several columns per group
    pub fn agg_many(&self, specs: &[(String, Agg)]) -> Result<Table> {
        let idx: Vec<usize> = specs
            .iter()
            .map(|(c, _)| self.table.column_index(c))
            .collect::<Result<_>>()?;
        let mut columns = self.keys.clone();
        columns.extend(specs.iter().map(|(c, _)| c.clone()));
        let rows = self
            .groups
            .iter()
            .map(|(key, members)| {
                let mut row = key.clone();
                for (&i, (_, agg)) in idx.iter().zip(specs) {
                    let values: Vec<Cell> =
                        members.iter().map(|&m| self.table.rows[m][i].clone()).collect();
                    row.push(agg.apply(&values));
                }
                row
            })
            .collect();
        Table::new(columns, rows)
    }

    /// Aggregate every non-key column; numeric aggregations skip text columns
    pub fn agg_all(&self, agg: Agg) -> Result<Table> {
        let numeric_only = matches!(
            agg,
            Agg::Sum | Agg::Mean | Agg::Median | Agg::Std | Agg::Var
        );
        let specs: Vec<(String, Agg)> = self
            .table
            .dtypes()
            .into_iter()
            .filter(|(name, _)| !self.keys.contains(name))
            .filter(|(_, dtype)| !numeric_only || matches!(*dtype, "int64" | "float64" | "bool"))
            .map(|(name, _)| (name, agg))
            .collect();
        self.agg_many(&specs)
    }

    /// Row count per group
    #[must_use]
    pub fn size(&self) -> Table {
        let mut columns = self.keys.clone();
        columns.push("size".to_string());
        let rows = self
            .groups
            .iter()
            .map(|(key, members)| {
                let mut row = key.clone();
                row.push(Cell::Int(members.len() as i64));
                row
            })
            .collect();
        Table { columns, rows }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<GroupBy by [{}] with {} groups>",
            self.keys.join(", "),
            self.groups.len()
        )
    }
}

fn infer_dtype(values: &[Cell]) -> &'static str {
    let (mut ints, mut floats, mut bools, mut strs) = (false, false, false, false);
    for cell in values.iter().filter(|c| !c.is_null()) {
        match cell {
            Cell::Int(_) => ints = true,
            Cell::Float(_) => floats = true,
            Cell::Bool(_) => bools = true,
            Cell::Str(_) => strs = true,
            Cell::Null => {}
        }
    }
    match (ints, floats, bools, strs) {
        (_, _, _, true) => "object",
        (_, _, true, false) if ints || floats => "object",
        (_, true, false, false) => "float64",
        (true, false, false, false) => "int64",
        (false, false, true, false) => "bool",
        _ => "object",
    }
}
