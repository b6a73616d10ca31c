//! Crate-level integration coverage for crash-truncation and compaction
//! (spec §4.1), driven purely through `TableFile`'s public API.

use std::io::Write;

use basicsql_core::{Column, DataType, Value};
use basicsql_storage::codec::ROW_TAG_LIVE;
use basicsql_storage::TableFile;
use tempfile::tempdir;

fn schema() -> Vec<Column> {
    let mut id = Column::new("id", DataType::Integer);
    id.not_null = true;
    id.primary_key = true;
    let mut name = Column::new("name", DataType::Text);
    name.not_null = true;
    vec![id, name]
}

#[test]
fn partial_trailing_row_from_a_simulated_crash_is_truncated_on_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.tbl");
    {
        let table = TableFile::create(&path, schema()).unwrap();
        table
            .insert(vec![Value::Integer32(1), Value::Text("a".into())])
            .unwrap();
    }

    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[ROW_TAG_LIVE]).unwrap();
    file.write_all(&500u32.to_le_bytes()).unwrap();
    file.write_all(b"half-written").unwrap();
    drop(file);

    let reopened = TableFile::open(&path).unwrap();
    assert_eq!(reopened.scan().unwrap().len(), 1);

    reopened
        .insert(vec![Value::Integer32(2), Value::Text("b".into())])
        .unwrap();
    assert_eq!(reopened.scan().unwrap().len(), 2);
}

#[test]
fn auto_increment_counter_survives_a_simulated_crash_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.tbl");
    {
        let table = TableFile::create(&path, schema()).unwrap();
        table.next_auto().unwrap();
        table.next_auto().unwrap();
    }
    let reopened = TableFile::open(&path).unwrap();
    assert_eq!(reopened.next_auto().unwrap(), 3);
}

#[test]
fn compaction_drops_tombstones_and_the_result_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.tbl");
    let table = TableFile::create(&path, schema()).unwrap();
    let mut ids = Vec::new();
    for i in 1..=4 {
        ids.push(
            table
                .insert(vec![Value::Integer32(i), Value::Text(format!("n{i}"))])
                .unwrap(),
        );
    }
    table.delete(ids[0]).unwrap();
    table.delete(ids[1]).unwrap();
    table.delete(ids[2]).unwrap();

    assert!(table.compact_if_sparse().unwrap());
    drop(table);

    let reopened = TableFile::open(&path).unwrap();
    let rows = reopened.scan().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values[1], Value::Text("n4".into()));
}

#[test]
fn compaction_is_a_no_op_when_the_file_is_not_sparse() {
    let dir = tempdir().unwrap();
    let table = TableFile::create(dir.path().join("t.tbl"), schema()).unwrap();
    table
        .insert(vec![Value::Integer32(1), Value::Text("a".into())])
        .unwrap();
    table
        .insert(vec![Value::Integer32(2), Value::Text("b".into())])
        .unwrap();

    assert!(!table.compact_if_sparse().unwrap());
    assert_eq!(table.scan().unwrap().len(), 2);
}
