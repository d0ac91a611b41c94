//! Restricted analysis language
//!
//! Snippets are written in a small pandas-flavoured expression language:
//! assignments, arithmetic, comparisons, indexing, attribute access and
//! calls into a fixed toolkit of table operations. There are no imports,
//! loops, function definitions or I/O builtins, so a snippet can only
//! read the datasets it was handed and write to the `result` variable.

mod ast;
mod eval;
mod methods;
mod parser;
mod value;

#[cfg(test)]
mod tests;

pub use eval::Interpreter;
pub use value::{Module, Value};

use crate::table::{Datasets, Table};
use std::sync::Arc;

/// Name of the variable a snippet assigns its answer to
pub const RESULT_VAR: &str = "result";

/// Name of the variable bound to the primary dataset
pub const PRIMARY_VAR: &str = "df";

/// Run a snippet against the primary table and every registered dataset
///
/// Besides `df` each dataset is bound under its own name, which is what
/// makes cross-dataset joins possible. Extra parameters are exposed as a
/// `params` dict. Returns the value left in `result`, or `None` when the
/// snippet never assigned it.
pub fn run_snippet(
    code: &str,
    primary: Arc<Table>,
    datasets: &Datasets,
    params: Vec<(String, Value)>,
) -> crate::Result<Value> {
    let mut interp = Interpreter::new();
    for (name, table) in datasets {
        interp.set(name.clone(), Value::Table(Arc::clone(table)));
    }
    interp.set(PRIMARY_VAR, Value::Table(primary));
    interp.set("params", Value::Dict(params));
    interp.set(RESULT_VAR, Value::None);
    interp.run(code)?;
    Ok(interp.get(RESULT_VAR).cloned().unwrap_or(Value::None))
}
