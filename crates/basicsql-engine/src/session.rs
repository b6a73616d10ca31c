//! Per-connection state: authenticated user and current database (spec §4.7).

use basicsql_catalog::DEFAULT_DATABASE;

#[derive(Debug, Clone)]
pub struct Session {
    user: Option<String>,
    database: String,
}

impl Session {
    pub fn new() -> Self {
        Self {
            user: None,
            database: DEFAULT_DATABASE.to_string(),
        }
    }

    pub fn authenticate(&mut self, username: impl Into<String>) {
        self.user = Some(username.into());
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn set_database(&mut self, canonical_name: impl Into<String>) {
        self.database = canonical_name.into();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
