//! Tests for the table module

use super::*;
use std::sync::Arc;

fn sample() -> Table {
    let csv = "user,activity,distance,heart_rate\n\
               alice,run,5.0,150\n\
               bob,walk,2.5,\n\
               alice,walk,1.5,95\n\
               carol,run,10.0,160\n";
    Table::from_csv_reader("sample", csv.as_bytes()).unwrap()
}

#[test]
fn test_csv_type_inference() {
    let table = sample();
    assert_eq!(table.len(), 4);
    assert_eq!(table.width(), 4);
    let dtypes = table.dtypes();
    assert_eq!(dtypes[0], ("user".to_string(), "object"));
    assert_eq!(dtypes[2], ("distance".to_string(), "float64"));
    assert_eq!(dtypes[3], ("heart_rate".to_string(), "int64"));
    assert!(table.rows()[1][3].is_null());
}

#[test]
fn test_cell_parse_and_order() {
    assert_eq!(Cell::parse("42"), Cell::Int(42));
    assert_eq!(Cell::parse("4.5"), Cell::Float(4.5));
    assert_eq!(Cell::parse("True"), Cell::Bool(true));
    assert!(Cell::parse("").is_null());
    assert!(Cell::parse("NaN").is_null());
    assert_eq!(Cell::parse("hello"), Cell::from("hello"));

    // ints and floats compare numerically, missing values sort last
    assert_eq!(Cell::Int(1), Cell::Float(1.0));
    assert!(Cell::Int(1) < Cell::Float(1.5));
    assert!(Cell::Float(99.0) < Cell::Null);
}

#[test]
fn test_filter_and_select() {
    let table = sample();
    let activity = table.column("activity").unwrap();
    let mask: Vec<bool> = activity.values.iter().map(|c| *c == Cell::from("run")).collect();
    let runs = table.filter(&mask).unwrap();
    assert_eq!(runs.len(), 2);

    let narrow = runs.select(&["user".to_string()]).unwrap();
    assert_eq!(narrow.column_names(), &["user".to_string()]);
    assert!(table.filter(&[true]).is_err());
    assert!(table.select(&["missing".to_string()]).is_err());
}

#[test]
fn test_sort_keeps_nulls_last() {
    let table = sample();
    let desc = table.sort_by(&["heart_rate".to_string()], false).unwrap();
    let hr = desc.column("heart_rate").unwrap();
    assert_eq!(hr.values[0], Cell::Int(160));
    assert!(hr.values[3].is_null());

    let asc = table.sort_by(&["heart_rate".to_string()], true).unwrap();
    let hr = asc.column("heart_rate").unwrap();
    assert_eq!(hr.values[0], Cell::Int(95));
    assert!(hr.values[3].is_null());
}

#[test]
fn test_groupby_aggregations() {
    let table = Arc::new(sample());
    let groups = GroupBy::new(Arc::clone(&table), vec!["user".to_string()]).unwrap();
    assert_eq!(groups.len(), 3);

    let totals = groups.agg("distance", Agg::Sum).unwrap();
    assert_eq!(totals.column_names(), &["user".to_string(), "distance".to_string()]);
    assert_eq!(totals.rows()[0], vec![Cell::from("alice"), Cell::Float(6.5)]);

    let sizes = groups.size();
    assert_eq!(sizes.rows()[0][1], Cell::Int(2));

    let means = groups.agg_all(Agg::Mean).unwrap();
    assert!(!means.has_column("activity"));
    assert!(means.has_column("heart_rate"));
}

#[test]
fn test_merge_variants() {
    let left = sample();
    let right = Table::from_csv_reader(
        "users",
        "user,age,distance\nalice,30,1\nbob,41,2\ndave,25,3\n".as_bytes(),
    )
    .unwrap();
    let on = vec!["user".to_string()];

    let inner = left.merge(&right, &on, JoinHow::Inner).unwrap();
    assert_eq!(inner.len(), 3);
    assert!(inner.has_column("distance_x"));
    assert!(inner.has_column("distance_y"));

    let left_join = left.merge(&right, &on, JoinHow::Left).unwrap();
    assert_eq!(left_join.len(), 4);
    let carol = left_join
        .rows()
        .iter()
        .find(|r| r[0] == Cell::from("carol"))
        .unwrap();
    assert!(carol[left_join.column_index("age").unwrap()].is_null());

    let outer = left.merge(&right, &on, JoinHow::Outer).unwrap();
    assert_eq!(outer.len(), 5);
    let dave = outer.rows().iter().find(|r| r[0] == Cell::from("dave"));
    assert!(dave.is_some());
}

#[test]
fn test_describe_numeric() {
    let described = sample().describe();
    assert_eq!(described.column_names()[0], "stat");
    assert!(described.has_column("distance"));
    assert!(!described.has_column("user"));
    let count_row = &described.rows()[0];
    assert_eq!(count_row[0], Cell::from("count"));
}

#[test]
fn test_stats() {
    let values = vec![Cell::Int(1), Cell::Int(2), Cell::Int(3), Cell::Int(4), Cell::Null];
    assert_eq!(stats::sum(&values), Cell::Int(10));
    assert_eq!(stats::mean(&values), Some(2.5));
    assert_eq!(stats::median(&values), Some(2.5));
    assert_eq!(stats::count(&values), 4);
    let var = stats::variance(&values).unwrap();
    assert!((var - 1.666_666).abs() < 1e-4);

    let counts = stats::value_counts(&[Cell::from("a"), Cell::from("b"), Cell::from("b")]);
    assert_eq!(counts[0], (Cell::from("b"), 2));
    assert_eq!("avg".parse::<Agg>().unwrap(), Agg::Mean);
    assert!("bogus".parse::<Agg>().is_err());
}

#[test]
fn test_records_serialization() {
    let records = sample().head(1).to_records();
    assert_eq!(
        records,
        serde_json::json!([{"user": "alice", "activity": "run", "distance": 5.0, "heart_rate": 150}])
    );
}

#[test]
fn test_discover_recursive_first_stem_wins() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
    std::fs::write(dir.path().join("a_steps.csv"), "x\n1\n").unwrap();
    std::fs::write(dir.path().join("nested/deeper/sleep.csv"), "y\n2\n").unwrap();
    std::fs::write(dir.path().join("nested/sleep.CSV"), "y\n3\n").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let found = discover_csv(dir.path()).unwrap();
    let names: Vec<&str> = found.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a_steps", "sleep"]);

    let datasets = load_datasets(dir.path()).unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets["sleep"].rows()[0][0], Cell::Int(2));
}

#[test]
fn test_discover_missing_dir() {
    let found = discover_csv(Path::new("/definitely/not/here")).unwrap();
    assert!(found.is_empty());
}
