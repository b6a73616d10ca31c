//! Owned engine lifecycle: open a root directory, serve statements, no
//! global mutable state (spec §9 "Session state vs global engine").

use std::path::Path;

use basicsql_catalog::Catalog;
use tracing::{info, instrument};

use crate::error::Result;
use crate::executor;
use crate::result::SqlResult;
use crate::session::Session;

pub struct Engine {
    catalog: Catalog,
}

impl Engine {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let catalog = Catalog::open(root)?;
        info!("engine opened");
        Ok(Self { catalog })
    }

    /// The single entry point collaborators drive the engine through (spec
    /// §6): parse, plan, and execute one statement, never suspending the
    /// connection task across statement boundaries.
    #[instrument(skip(self, session, sql_text), fields(database = session.database()))]
    pub fn execute(&self, session: &mut Session, sql_text: &str) -> SqlResult {
        let statement = match basicsql_sql::parse(sql_text) {
            Ok(statement) => statement,
            Err(err) => return SqlResult::Error(err.to_string()),
        };
        match executor::dispatch(&self.catalog, session, statement) {
            Ok(result) => result,
            Err(err) => SqlResult::Error(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basicsql_core::Value;
    use tempfile::tempdir;

    #[test]
    fn end_to_end_create_insert_select() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        let mut session = Session::new();

        let create = engine.execute(
            &mut session,
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTO_INCREMENT, name TEXT NOT NULL)",
        );
        assert_eq!(create, SqlResult::Mutation { rows_affected: 0, generated: None });

        let insert_a = engine.execute(&mut session, "INSERT INTO t (name) VALUES ('a')");
        assert_eq!(
            insert_a,
            SqlResult::Mutation {
                rows_affected: 1,
                generated: Some(("id".to_string(), Value::Integer32(1)))
            }
        );
        engine.execute(&mut session, "INSERT INTO t (name) VALUES ('b')");

        let select = engine.execute(&mut session, "SELECT * FROM t ORDER BY id");
        match select {
            SqlResult::Rows { columns, rows } => {
                assert_eq!(columns, vec!["id".to_string(), "name".to_string()]);
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0][1], Value::Text("a".into()));
                assert_eq!(rows[1][1], Value::Text("b".into()));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn null_violation_surfaces_as_error_result() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        let mut session = Session::new();
        engine.execute(
            &mut session,
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTO_INCREMENT, name TEXT NOT NULL)",
        );
        let result = engine.execute(&mut session, "INSERT INTO t (name) VALUES (NULL)");
        assert!(matches!(result, SqlResult::Error(_)));
    }

    #[test]
    fn duplicate_primary_key_surfaces_as_error_result() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        let mut session = Session::new();
        engine.execute(&mut session, "CREATE TABLE u (k INTEGER PRIMARY KEY)");
        let first = engine.execute(&mut session, "INSERT INTO u (k) VALUES (5)");
        assert!(first.is_success());
        let second = engine.execute(&mut session, "INSERT INTO u (k) VALUES (5)");
        assert!(matches!(second, SqlResult::Error(_)));
    }

    #[test]
    fn like_filters_by_prefix() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        let mut session = Session::new();
        engine.execute(&mut session, "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)");
        engine.execute(&mut session, "INSERT INTO t (id, name) VALUES (1, 'a')");
        engine.execute(&mut session, "INSERT INTO t (id, name) VALUES (2, 'b')");
        engine.execute(&mut session, "INSERT INTO t (id, name) VALUES (3, 'aa')");

        let result = engine.execute(&mut session, "SELECT name FROM t WHERE name LIKE 'a%'");
        match result {
            SqlResult::Rows { rows, .. } => {
                let names: Vec<String> = rows
                    .into_iter()
                    .map(|r| match &r[0] {
                        Value::Text(s) => s.clone(),
                        _ => panic!("expected text"),
                    })
                    .collect();
                assert_eq!(names, vec!["a".to_string(), "aa".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn update_and_delete_affect_only_matching_rows() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        let mut session = Session::new();
        engine.execute(&mut session, "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)");
        engine.execute(&mut session, "INSERT INTO t (id, name) VALUES (1, 'a')");
        engine.execute(&mut session, "INSERT INTO t (id, name) VALUES (2, 'b')");
        engine.execute(&mut session, "INSERT INTO t (id, name) VALUES (3, 'c')");

        let updated = engine.execute(&mut session, "UPDATE t SET name='Z' WHERE id>=2");
        assert_eq!(updated, SqlResult::Mutation { rows_affected: 2, generated: None });

        let deleted = engine.execute(&mut session, "DELETE FROM t WHERE id=1");
        assert_eq!(deleted, SqlResult::Mutation { rows_affected: 1, generated: None });

        let select = engine.execute(&mut session, "SELECT * FROM t ORDER BY id");
        match select {
            SqlResult::Rows { rows, .. } => assert_eq!(rows.len(), 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn use_unknown_database_is_an_error() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        let mut session = Session::new();
        let result = engine.execute(&mut session, "USE nope");
        assert!(matches!(result, SqlResult::Error(_)));
    }
}
