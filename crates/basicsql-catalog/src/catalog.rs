//! Database → table namespace and on-disk layout (spec §4.2, §6).
//!
//! ```text
//! <root>/
//!   databases/
//!     default/
//!       catalog.idx
//!       <table>.tbl
//!     <other_db>/
//!       ...
//! ```
//!
//! `catalog.idx` is a free-format index (here: one table name per line, in
//! first-seen casing) used purely for table discovery; it is not a source of
//! truth for schema, which lives in each `.tbl` file's own header.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use basicsql_core::Column;
use basicsql_storage::TableFile;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// The reserved database name that always exists (spec §3).
pub const DEFAULT_DATABASE: &str = "default";

struct TableEntry {
    display_name: String,
    file: Arc<TableFile>,
}

struct DatabaseEntry {
    display_name: String,
    dir: PathBuf,
    tables: HashMap<String, TableEntry>,
    /// Tables whose header failed to open, keyed by lowercase name. Looking
    /// one of these up returns `IOError`; other tables in the database are
    /// unaffected (spec §7).
    failed: HashMap<String, String>,
}

impl DatabaseEntry {
    fn index_path(&self) -> PathBuf {
        self.dir.join("catalog.idx")
    }

    fn write_index(&self) -> Result<()> {
        let mut names: Vec<&str> = self.tables.values().map(|t| t.display_name.as_str()).collect();
        names.sort();
        fs::write(self.index_path(), names.join("\n"))?;
        Ok(())
    }

    fn load(display_name: String, dir: PathBuf) -> Result<Self> {
        let mut tables = HashMap::new();
        let mut failed = HashMap::new();
        let index_path = dir.join("catalog.idx");
        let names: Vec<String> = if index_path.exists() {
            fs::read_to_string(&index_path)?
                .lines()
                .map(str::to_string)
                .filter(|l| !l.is_empty())
                .collect()
        } else {
            // Bootstrap from whatever `.tbl` files are physically present.
            let mut discovered = Vec::new();
            if dir.exists() {
                for entry in fs::read_dir(&dir)? {
                    let entry = entry?;
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) == Some("tbl") {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            discovered.push(stem.to_string());
                        }
                    }
                }
            }
            discovered
        };

        for name in names {
            let file_path = dir.join(format!("{name}.tbl"));
            if !file_path.exists() {
                continue;
            }
            let table = match TableFile::open(&file_path) {
                Ok(table) => table,
                Err(err) => {
                    warn!(table = %name, error = %err, "table has an unreadable header, isolating it");
                    failed.insert(name.to_ascii_lowercase(), err.to_string());
                    continue;
                }
            };
            tables.insert(
                name.to_ascii_lowercase(),
                TableEntry {
                    display_name: name,
                    file: Arc::new(table),
                },
            );
        }

        let entry = Self {
            display_name,
            dir,
            tables,
            failed,
        };
        if !index_path.exists() && !entry.tables.is_empty() {
            entry.write_index()?;
        }
        Ok(entry)
    }
}

/// Maps `(database_name, table_name)` to an open table handle.
pub struct Catalog {
    root: PathBuf,
    databases: RwLock<HashMap<String, DatabaseEntry>>,
}

impl Catalog {
    /// Open (creating if necessary) the catalog rooted at `root`. Database
    /// directories already on disk are discovered; `default` is not created
    /// until it is first used (spec §4.2).
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let databases_dir = root.join("databases");
        fs::create_dir_all(&databases_dir)?;

        let mut databases = HashMap::new();
        for entry in fs::read_dir(&databases_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let display_name = entry.file_name().to_string_lossy().to_string();
            let loaded = DatabaseEntry::load(display_name.clone(), entry.path())?;
            databases.insert(display_name.to_ascii_lowercase(), loaded);
        }

        Ok(Self {
            root,
            databases: RwLock::new(databases),
        })
    }

    fn databases_dir(&self) -> PathBuf {
        self.root.join("databases")
    }

    /// All known database names, always including `default` even if its
    /// directory has not yet been materialized (spec §3).
    pub fn list_databases(&self) -> Vec<String> {
        let databases = self.databases.read().unwrap();
        let mut names: Vec<String> =
            databases.values().map(|d| d.display_name.clone()).collect();
        if !databases.contains_key(DEFAULT_DATABASE) {
            names.push(DEFAULT_DATABASE.to_string());
        }
        names.sort();
        names
    }

    /// Validate that `name` refers to an existing database (creating
    /// `default`'s directory lazily if it is the one being resolved),
    /// returning its first-seen display casing.
    pub fn use_database(&self, name: &str) -> Result<String> {
        let key = name.to_ascii_lowercase();
        {
            let databases = self.databases.read().unwrap();
            if let Some(entry) = databases.get(&key) {
                return Ok(entry.display_name.clone());
            }
        }
        if key == DEFAULT_DATABASE {
            let dir = self.databases_dir().join(DEFAULT_DATABASE);
            fs::create_dir_all(&dir)?;
            info!("materialized default database directory");
            let entry = DatabaseEntry::load(DEFAULT_DATABASE.to_string(), dir)?;
            let mut databases = self.databases.write().unwrap();
            databases.insert(key, entry);
            return Ok(DEFAULT_DATABASE.to_string());
        }
        Err(Error::UnknownDatabase(name.to_string()))
    }

    pub fn list_tables(&self, db: &str) -> Result<Vec<String>> {
        let canonical = self.use_database(db)?;
        let databases = self.databases.read().unwrap();
        let entry = databases
            .get(&canonical.to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownDatabase(db.to_string()))?;
        let mut names: Vec<String> = entry.tables.values().map(|t| t.display_name.clone()).collect();
        names.sort();
        Ok(names)
    }

    pub fn create_table(&self, db: &str, name: &str, columns: Vec<Column>) -> Result<()> {
        let canonical = self.use_database(db)?;
        let mut databases = self.databases.write().unwrap();
        let entry = databases
            .get_mut(&canonical.to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownDatabase(db.to_string()))?;

        let key = name.to_ascii_lowercase();
        if entry.tables.contains_key(&key) {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        let file_path = entry.dir.join(format!("{name}.tbl"));
        let table = TableFile::create(&file_path, columns)?;
        entry.tables.insert(
            key,
            TableEntry {
                display_name: name.to_string(),
                file: Arc::new(table),
            },
        );
        entry.write_index()?;
        Ok(())
    }

    pub fn drop_table(&self, db: &str, name: &str) -> Result<()> {
        let canonical = self.use_database(db)?;
        let mut databases = self.databases.write().unwrap();
        let entry = databases
            .get_mut(&canonical.to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownDatabase(db.to_string()))?;

        let key = name.to_ascii_lowercase();
        let removed = entry
            .tables
            .remove(&key)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))?;
        fs::remove_file(removed.file.path())?;
        entry.write_index()?;
        Ok(())
    }

    /// Fetch the open table handle for `(db, name)`, matched case-insensitively.
    pub fn get_table(&self, db: &str, name: &str) -> Result<Arc<TableFile>> {
        let canonical = self.use_database(db)?;
        let databases = self.databases.read().unwrap();
        let entry = databases
            .get(&canonical.to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownDatabase(db.to_string()))?;
        let key = name.to_ascii_lowercase();
        if let Some(table) = entry.tables.get(&key) {
            return Ok(Arc::clone(&table.file));
        }
        if let Some(reason) = entry.failed.get(&key) {
            return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, reason.clone())));
        }
        Err(Error::UnknownTable(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basicsql_core::DataType;
    use tempfile::tempdir;

    fn sample_columns() -> Vec<Column> {
        let mut id = Column::new("id", DataType::Integer);
        id.not_null = true;
        id.primary_key = true;
        vec![id]
    }

    #[test]
    fn default_database_is_listed_before_creation() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        assert!(catalog.list_databases().contains(&"default".to_string()));
        assert!(!dir.path().join("databases/default").exists());
    }

    #[test]
    fn create_table_then_get_table_round_trips() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        catalog
            .create_table("default", "Users", sample_columns())
            .unwrap();
        let table = catalog.get_table("DEFAULT", "users").unwrap();
        assert_eq!(table.columns().len(), 1);
    }

    #[test]
    fn duplicate_table_creation_fails() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        catalog.create_table("default", "t", sample_columns()).unwrap();
        assert!(catalog.create_table("default", "T", sample_columns()).is_err());
    }

    #[test]
    fn unknown_database_is_rejected() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        assert!(catalog.list_tables("nope").is_err());
    }

    #[test]
    fn drop_table_removes_file_and_index_entry() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        catalog.create_table("default", "t", sample_columns()).unwrap();
        catalog.drop_table("default", "t").unwrap();
        assert!(catalog.list_tables("default").unwrap().is_empty());
    }

    #[test]
    fn corrupt_table_header_is_isolated_from_the_rest_of_the_catalog() {
        let dir = tempdir().unwrap();
        {
            let catalog = Catalog::open(dir.path()).unwrap();
            catalog.create_table("default", "good", sample_columns()).unwrap();
            catalog.create_table("default", "bad", sample_columns()).unwrap();
        }
        fs::write(dir.path().join("databases/default/bad.tbl"), b"not a table file").unwrap();

        let reopened = Catalog::open(dir.path()).unwrap();
        assert!(reopened.get_table("default", "good").is_ok());
        let err = reopened.get_table("default", "bad").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn reopening_catalog_rediscovers_tables_from_index() {
        let dir = tempdir().unwrap();
        {
            let catalog = Catalog::open(dir.path()).unwrap();
            catalog.create_table("default", "t", sample_columns()).unwrap();
        }
        let reopened = Catalog::open(dir.path()).unwrap();
        assert_eq!(reopened.list_tables("default").unwrap(), vec!["t".to_string()]);
    }
}
