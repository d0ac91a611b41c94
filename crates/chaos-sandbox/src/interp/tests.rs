//! Tests for the analysis language

use super::*;
use crate::table::{Datasets, Table};
use crate::Error;
use serde_json::json;
use std::sync::Arc;

fn workouts() -> Arc<Table> {
    let csv = "user,activity,distance,heart_rate\n\
               alice,run,5.0,150\n\
               bob,walk,2.5,\n\
               alice,walk,1.5,95\n\
               carol,run,10.0,160\n";
    Arc::new(Table::from_csv_reader("workouts", csv.as_bytes()).unwrap())
}

fn users() -> Arc<Table> {
    let csv = "user,city\nalice,Paris\nbob,Lyon\ndave,Nice\n";
    Arc::new(Table::from_csv_reader("users", csv.as_bytes()).unwrap())
}

fn datasets() -> Datasets {
    let mut map = Datasets::new();
    map.insert("workouts".to_string(), workouts());
    map.insert("users".to_string(), users());
    map
}

fn run(code: &str) -> crate::Result<Value> {
    run_snippet(code, workouts(), &datasets(), Vec::new())
}

#[test]
fn test_scalar_arithmetic() {
    let v = run("x = 7\ny = 2\nresult = [x // y, x % y, x / y, x ** y, -x // y]").unwrap();
    assert_eq!(v.to_json(), json!([3, 1, 3.5, 49, -4]));
}

#[test]
fn test_result_defaults_to_none() {
    let v = run("x = 1").unwrap();
    assert!(matches!(v, Value::None));
}

#[test]
fn test_filter_and_mean() {
    let v = run("runs = df[df['activity'] == 'run']\nresult = runs['distance'].mean()").unwrap();
    assert_eq!(v.to_json(), json!(7.5));
}

#[test]
fn test_boolean_masks_combine() {
    let v = run("result = len(df[(df.distance > 2) & (df.activity == 'walk')])").unwrap();
    assert_eq!(v.to_json(), json!(1));
}

#[test]
fn test_groupby_column_sum() {
    let v = run("result = df.groupby('user')['distance'].sum()").unwrap();
    assert_eq!(
        v.to_json(),
        json!([
            {"user": "alice", "distance": 6.5},
            {"user": "bob", "distance": 2.5},
            {"user": "carol", "distance": 10.0},
        ])
    );
}

#[test]
fn test_groupby_size_and_agg_dict() {
    let v = run("result = df.groupby('activity').size()").unwrap();
    assert_eq!(
        v.to_json(),
        json!([{"activity": "run", "size": 2}, {"activity": "walk", "size": 2}])
    );

    let v = run("result = df.groupby('activity').agg({'distance': 'max'})").unwrap();
    assert_eq!(
        v.to_json(),
        json!([{"activity": "run", "distance": 10.0}, {"activity": "walk", "distance": 2.5}])
    );
}

#[test]
fn test_cross_dataset_merge() {
    let v = run("joined = df.merge(users, on='user')\nresult = sorted(joined['city'].unique())").unwrap();
    assert_eq!(v.to_json(), json!(["Lyon", "Paris"]));

    let v = run("result = len(pd.merge(workouts, users, on='user', how='left'))").unwrap();
    assert_eq!(v.to_json(), json!(4));
}

#[test]
fn test_column_assignment() {
    let v = run("df['km'] = df['distance'] * 1000\nresult = df['km'].max()").unwrap();
    assert_eq!(v.to_json(), json!(10000.0));
}

#[test]
fn test_missing_values() {
    let v = run("result = [df['heart_rate'].isna().sum(), df['heart_rate'].count(), len(df.dropna())]")
        .unwrap();
    assert_eq!(v.to_json(), json!([1, 3, 3]));

    let v = run("result = df['heart_rate'].fillna(0).min()").unwrap();
    assert_eq!(v.to_json(), json!(0));
}

#[test]
fn test_sort_and_head() {
    let v = run("result = df.sort_values('distance', ascending=False).head(2)['user'].tolist()")
        .unwrap();
    assert_eq!(v.to_json(), json!(["carol", "alice"]));

    let v = run("result = df.nlargest(1, 'heart_rate')['user'].tolist()").unwrap();
    assert_eq!(v.to_json(), json!(["carol"]));
}

#[test]
fn test_string_accessor() {
    let v = run("result = int(df['user'].str.startswith('a').sum())").unwrap();
    assert_eq!(v.to_json(), json!(2));

    let v = run("result = df['activity'].str.upper().unique()").unwrap();
    assert_eq!(v.to_json(), json!(["RUN", "WALK"]));
}

#[test]
fn test_value_counts_table() {
    let v = run("result = df['user'].value_counts()").unwrap();
    assert_eq!(
        v.to_json(),
        json!([
            {"user": "alice", "count": 2},
            {"user": "bob", "count": 1},
            {"user": "carol", "count": 1},
        ])
    );
}

#[test]
fn test_numeric_module() {
    let v = run("result = round(np.sqrt(16) + np.mean(df['distance']), 2)").unwrap();
    assert_eq!(v.to_json(), json!(8.75));

    let v = run("result = np.percentile(df['distance'], 50)").unwrap();
    assert_eq!(v.to_json(), json!(3.75));
}

#[test]
fn test_dict_results() {
    let v = run("result = {'users': df['user'].nunique(), 'total': df['distance'].sum()}").unwrap();
    assert_eq!(v.to_json(), json!({"users": 3, "total": 19.0}));

    let v = run("stats = {}\nstats['n'] = len(df)\nresult = stats.get('n')").unwrap();
    assert_eq!(v.to_json(), json!(4));
}

#[test]
fn test_conditional_expression() {
    let v = run("n = len(df)\nresult = 'many' if n > 3 else 'few'").unwrap();
    assert_eq!(v.to_json(), json!("many"));
}

#[test]
fn test_params_are_exposed() {
    let params = vec![("threshold".to_string(), Value::Int(100))];
    let v = run_snippet(
        "result = len(df[df.heart_rate > params['threshold']])",
        workouts(),
        &datasets(),
        params,
    )
    .unwrap();
    assert_eq!(v.to_json(), json!(2));
}

#[test]
fn test_comments_and_continuations() {
    let code = "# average distance\nresult = df[\n    'distance'\n].mean()  # trailing\n";
    assert_eq!(run(code).unwrap().to_json(), json!(4.75));
}

#[test]
fn test_unknown_name_reports_line() {
    let err = run("x = 1\ny = missing + 1").unwrap_err();
    match err {
        Error::Execution(msg) => {
            assert!(msg.contains("line 2"), "{}", msg);
            assert!(msg.contains("missing"), "{}", msg);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_unknown_column() {
    let err = run("result = df['nope']").unwrap_err();
    assert!(err.to_string().starts_with("Code execution failed:"));
    assert!(err.to_string().contains("nope"));
}

#[test]
fn test_imports_and_io_are_rejected() {
    assert!(run("import os").is_err());
    assert!(run("from os import path").is_err());
    assert!(run("result = open('/etc/passwd')").is_err());
    assert!(run("def f():\n    return 1").is_err());
    assert!(run("for x in df:\n    pass").is_err());
}

#[test]
fn test_syntax_error() {
    let err = run("result = (1 + ").unwrap_err();
    assert!(err.to_string().contains("syntax error"), "{}", err);
}

#[test]
fn test_ambiguous_truth_value() {
    let err = run("result = df['distance'] > 1 and True").unwrap_err();
    assert!(err.to_string().contains("ambiguous"));
}

#[test]
fn test_division_by_zero() {
    assert!(run("result = 1 / 0").is_err());
    let v = run("result = (df['distance'] / 0).tolist()").unwrap();
    assert_eq!(v.to_json(), json!([null, null, null, null]));
}

#[test]
fn test_describe_has_stat_rows() {
    let v = run("result = df.describe()").unwrap();
    let records = v.to_json();
    let rows = records.as_array().unwrap();
    assert_eq!(rows.len(), 8);
    assert_eq!(rows[0]["stat"], json!("count"));
    assert_eq!(rows[0]["heart_rate"], json!(3));
}

#[test]
fn test_dataframe_constructor() {
    let v = run("t = pd.DataFrame({'a': [1, 2, 3], 'b': ['x', 'y', 'z']})\nresult = t[t.a >= 2]['b'].tolist()")
        .unwrap();
    assert_eq!(v.to_json(), json!(["y", "z"]));
}

#[test]
fn test_string_repetition_is_capped() {
    assert_eq!(run("result = 'ab' * 3").unwrap().to_json(), json!("ababab"));
    assert_eq!(run("result = 'ab' * -2").unwrap().to_json(), json!(""));
    let err = run("result = len('x' * 1000000000000000)").unwrap_err();
    assert!(err.to_string().contains("string repetition result too large"), "{}", err);
    let err = run("s = 'abcd' * 250000\nresult = s * 2").unwrap_err();
    assert!(err.to_string().contains("too large"), "{}", err);
}

#[test]
fn test_integer_overflow_falls_back_to_float() {
    let v = run("m = 0 - 9223372036854775807 - 1\nresult = [m % -1, m // -1]").unwrap();
    assert!(matches!(v, Value::List(_)), "{:?}", v);
    let v = run("result = [7 // -2, -7 // 2, -7 // -2, -7 % 2, 7 % -2, 6 % -3]").unwrap();
    assert_eq!(v.to_json(), json!([-4, -4, 3, 1, -1, 0]));
}
