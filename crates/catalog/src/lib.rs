//! `volmon-catalog`: readers for the platform's catalog database.
//!
//! Both backends implement [`volmon_recon::CatalogReader`] over the same SQL
//! (see [`queries`]). Connections are opened lazily and dropped on `close()`.

pub mod mysql;
pub mod queries;
pub mod sqlite;

pub use mysql::MySqlCatalog;
pub use sqlite::SqliteCatalog;

use volmon_config::CatalogTarget;
use volmon_recon::{CatalogError, CatalogReader};

/// Pick the backend for a profile's catalog target. Does not connect.
pub fn open_catalog(target: &CatalogTarget) -> Result<Box<dyn CatalogReader>, CatalogError> {
    match target {
        CatalogTarget::MySql(t) => Ok(Box::new(MySqlCatalog::new(t)?)),
        CatalogTarget::Sqlite { path } => Ok(Box::new(SqliteCatalog::new(path.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volmon_config::{MySqlTarget, Secret};

    #[test]
    fn sqlite_target_opens_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let target = CatalogTarget::Sqlite { path: dir.path().join("missing.db") };

        // Nothing touches the file until the first query.
        let mut catalog = open_catalog(&target).unwrap();
        let err = catalog.list_scoping_entities(None).unwrap_err();
        assert!(matches!(err, CatalogError::Connect(_)));
    }

    #[test]
    fn mysql_target_builds_without_connecting() {
        let target = CatalogTarget::MySql(MySqlTarget {
            host: "127.0.0.1".into(),
            port: 1,
            user: "cloud".into(),
            password: Secret::new("pw"),
            database: "cloud".into(),
        });
        let mut catalog = open_catalog(&target).unwrap();
        // Closing an unopened reader is a no-op.
        catalog.close();
    }
}
