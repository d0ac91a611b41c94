//! Column reductions

use super::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Aggregation function applied to a column or a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agg {
    /// Number of non-missing values
    Count,
    /// Number of rows, missing values included
    Size,
    /// Sum
    Sum,
    /// Arithmetic mean
    Mean,
    /// Median
    Median,
    /// Minimum
    Min,
    /// Maximum
    Max,
    /// Sample standard deviation
    Std,
    /// Sample variance
    Var,
    /// Number of distinct non-missing values
    Nunique,
    /// First non-missing value
    First,
    /// Last non-missing value
    Last,
}

impl Agg {
    /// Get the aggregation name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Size => "size",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Min => "min",
            Self::Max => "max",
            Self::Std => "std",
            Self::Var => "var",
            Self::Nunique => "nunique",
            Self::First => "first",
            Self::Last => "last",
        }
    }

    /// Apply the aggregation to a slice of cells
    #[must_use]
    pub fn apply(&self, values: &[Cell]) -> Cell {
        match self {
            Self::Count => Cell::Int(count(values) as i64),
            Self::Size => Cell::Int(values.len() as i64),
            Self::Sum => sum(values),
            Self::Mean => opt_float(mean(values)),
            Self::Median => opt_float(median(values)),
            Self::Min => min(values),
            Self::Max => max(values),
            Self::Std => opt_float(variance(values).map(f64::sqrt)),
            Self::Var => opt_float(variance(values)),
            Self::Nunique => Cell::Int(unique(values).len() as i64),
            Self::First => values.iter().find(|c| !c.is_null()).cloned().unwrap_or(Cell::Null),
            Self::Last => values
                .iter()
                .rev()
                .find(|c| !c.is_null())
                .cloned()
                .unwrap_or(Cell::Null),
        }
    }
}

impl fmt::Display for Agg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Agg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "size" => Ok(Self::Size),
            "sum" => Ok(Self::Sum),
            "mean" | "avg" | "average" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "std" => Ok(Self::Std),
            "var" => Ok(Self::Var),
            "nunique" => Ok(Self::Nunique),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            _ => Err(format!("unknown aggregation: {}", s)),
        }
    }
}

fn opt_float(v: Option<f64>) -> Cell {
    v.map(Cell::Float).unwrap_or(Cell::Null)
}

/// Numeric values of a column, skipping missing and non-numeric cells
#[must_use]
pub fn numeric(values: &[Cell]) -> Vec<f64> {
    values.iter().filter_map(Cell::as_f64).collect()
}

/// Count non-missing values
#[must_use]
pub fn count(values: &[Cell]) -> usize {
    values.iter().filter(|c| !c.is_null()).count()
}

/// Sum, staying integral when every value is an integer
#[must_use]
pub fn sum(values: &[Cell]) -> Cell {
    let mut int_total: i64 = 0;
    let mut integral = true;
    for cell in values {
        match cell {
            Cell::Int(i) => match int_total.checked_add(*i) {
                Some(t) => int_total = t,
                None => integral = false,
            },
            Cell::Bool(b) => int_total += i64::from(*b),
            c if c.is_null() => {}
            _ => integral = false,
        }
    }
    if integral {
        Cell::Int(int_total)
    } else {
        Cell::Float(numeric(values).iter().sum())
    }
}

/// Arithmetic mean
#[must_use]
pub fn mean(values: &[Cell]) -> Option<f64> {
    let nums = numeric(values);
    if nums.is_empty() {
        None
    } else {
        Some(nums.iter().sum::<f64>() / nums.len() as f64)
    }
}

/// Median
#[must_use]
pub fn median(values: &[Cell]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Linear-interpolated quantile, `q` in `[0, 1]`
#[must_use]
pub fn quantile(values: &[Cell], q: f64) -> Option<f64> {
    let mut nums = numeric(values);
    if nums.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    nums.sort_by(f64::total_cmp);
    let pos = q * (nums.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(nums[lo] + (nums[hi] - nums[lo]) * frac)
}

/// Sample variance (one degree of freedom)
#[must_use]
pub fn variance(values: &[Cell]) -> Option<f64> {
    let nums = numeric(values);
    if nums.len() < 2 {
        return None;
    }
    let m = nums.iter().sum::<f64>() / nums.len() as f64;
    let ss: f64 = nums.iter().map(|x| (x - m).powi(2)).sum();
    Some(ss / (nums.len() - 1) as f64)
}

/// Minimum non-missing value
#[must_use]
pub fn min(values: &[Cell]) -> Cell {
    values
        .iter()
        .filter(|c| !c.is_null())
        .min()
        .cloned()
        .unwrap_or(Cell::Null)
}

/// Maximum non-missing value
#[must_use]
pub fn max(values: &[Cell]) -> Cell {
    values
        .iter()
        .filter(|c| !c.is_null())
        .max()
        .cloned()
        .unwrap_or(Cell::Null)
}

/// Distinct non-missing values in order of first appearance
#[must_use]
pub fn unique(values: &[Cell]) -> Vec<Cell> {
    let mut seen = BTreeMap::new();
    let mut out = Vec::new();
    for cell in values.iter().filter(|c| !c.is_null()) {
        if seen.insert(cell.clone(), ()).is_none() {
            out.push(cell.clone());
        }
    }
    out
}

/// Frequency of each distinct value, most frequent first
#[must_use]
pub fn value_counts(values: &[Cell]) -> Vec<(Cell, usize)> {
    let mut counts: BTreeMap<Cell, usize> = BTreeMap::new();
    for cell in values.iter().filter(|c| !c.is_null()) {
        *counts.entry(cell.clone()).or_default() += 1;
    }
    let mut out: Vec<(Cell, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

/// Pearson correlation over rows where both values are numeric
#[must_use]
pub fn correlation(a: &[Cell], b: &[Cell]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in &pairs {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}
