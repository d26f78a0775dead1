//! Catalog reader over a SQLite replica of the catalog database.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::debug;
use rusqlite::{params_from_iter, Connection, OpenFlags, Row};

use volmon_recon::{CatalogError, CatalogReader, ScopingEntity, VolumeRecord};

use crate::queries;

pub struct SqliteCatalog {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteCatalog {
    /// Nothing is opened until the first query.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), conn: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn connection(&mut self) -> Result<&Connection, CatalogError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let conn = Connection::open_with_flags(
                    &self.path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .map_err(|e| CatalogError::Connect(format!("{}: {e}", self.path.display())))?;
                debug!("opened catalog {}", self.path.display());
                conn
            }
        };
        Ok(self.conn.insert(conn))
    }
}

impl CatalogReader for SqliteCatalog {
    fn list_scoping_entities(
        &mut self,
        account_filter: Option<u64>,
    ) -> Result<Vec<ScopingEntity>, CatalogError> {
        let args = account_filter.map(to_sql_id).transpose()?;
        let conn = self.connection()?;
        let sql = queries::scoping_entities(args.is_some());
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;

        let raw = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                let id: i64 = row.get(0)?;
                let name: Option<String> = row.get(1)?;
                let description: Option<String> = row.get(2)?;
                Ok((id, name, description))
            })
            .map_err(query_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_err)?;

        raw.into_iter()
            .map(|(id, name, description)| {
                Ok(ScopingEntity {
                    id: from_sql_id(id, "project_account_id")?,
                    name: name.unwrap_or_default(),
                    description,
                })
            })
            .collect()
    }

    fn list_volumes(&mut self, account_id: u64) -> Result<Vec<VolumeRecord>, CatalogError> {
        let arg = to_sql_id(account_id)?;
        let conn = self.connection()?;
        let mut stmt = conn.prepare(queries::VOLUMES_BY_ACCOUNT).map_err(query_err)?;

        let raw = stmt
            .query_map([arg], RawVolume::from_row)
            .map_err(query_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_err)?;

        raw.into_iter().map(RawVolume::into_record).collect()
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                debug!("closing catalog {}: {e}", self.path.display());
            }
        }
    }
}

// ── Row decoding ────────────────────────────────────────────────────

struct RawVolume {
    id: i64,
    account_id: i64,
    name: Option<String>,
    uuid: Option<String>,
    path: Option<String>,
    pool_id: Option<i64>,
    template_id: Option<i64>,
    instance_id: Option<i64>,
    removed: Option<String>,
}

impl RawVolume {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            account_id: row.get(1)?,
            name: row.get(2)?,
            uuid: row.get(3)?,
            path: row.get(4)?,
            pool_id: row.get(5)?,
            template_id: row.get(6)?,
            instance_id: row.get(7)?,
            removed: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<VolumeRecord, CatalogError> {
        Ok(VolumeRecord {
            id: from_sql_id(self.id, "id")?,
            account_id: from_sql_id(self.account_id, "account_id")?,
            name: self.name,
            uuid: self.uuid,
            path: self.path,
            pool_id: self.pool_id.map(|v| from_sql_id(v, "pool_id")).transpose()?,
            template_id: self.template_id.map(|v| from_sql_id(v, "template_id")).transpose()?,
            instance_id: self.instance_id.map(|v| from_sql_id(v, "instance_id")).transpose()?,
            removed: self.removed.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn query_err(e: rusqlite::Error) -> CatalogError {
    CatalogError::Query(e.to_string())
}

fn to_sql_id(id: u64) -> Result<i64, CatalogError> {
    i64::try_from(id).map_err(|_| CatalogError::Query(format!("id {id} out of range for SQLite")))
}

fn from_sql_id(value: i64, column: &str) -> Result<u64, CatalogError> {
    u64::try_from(value).map_err(|_| CatalogError::Decode(format!("{column}: negative id {value}")))
}

/// Catalog timestamps are `YYYY-MM-DD HH:MM:SS`, optionally with `T` and a
/// fractional part.
fn parse_timestamp(value: &str) -> Result<NaiveDateTime, CatalogError> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|_| CatalogError::Decode(format!("removed: cannot parse timestamp '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(dir: &Path) -> PathBuf {
        let path = dir.join("cloud.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(queries::REPLICA_SCHEMA).unwrap();
        conn.execute_batch(
            "INSERT INTO projects (id, name, display_text) VALUES
                (1, 'web', 'Web tier'),
                (2, 'batch', NULL);
             INSERT INTO project_account (id, account_id, project_id, project_account_id) VALUES
                (1, 2, 1, 101),
                (2, 3, 1, 101),
                (3, 2, 2, 202);
             INSERT INTO volumes (id, account_id, name, uuid, path, pool_id, template_id, instance_id, state, display_volume, removed) VALUES
                (12, 101, 'DATA-12', 'u-12', 'p12', 1, NULL, 7, 'Ready', 1, NULL),
                (10, 101, 'ROOT-10', 'u-10', 'p10', 1, 5, 7, 'Ready', 1, NULL),
                (11, 101, 'alloc', 'u-11', NULL, NULL, NULL, NULL, 'Allocated', 1, NULL),
                (13, 101, 'no-path', 'u-13', NULL, NULL, NULL, NULL, 'Ready', 1, NULL),
                (14, 101, 'hidden', 'u-14', 'p14', 1, NULL, NULL, 'Ready', 0, NULL),
                (15, 101, 'gone', 'u-15', 'p15', 1, NULL, NULL, 'Expunged', 1, '2026-03-01 10:00:00'),
                (20, 202, 'DATA-20', 'u-20', 'p20', 2, NULL, NULL, 'Ready', 1, NULL);",
        )
        .unwrap();
        path
    }

    #[test]
    fn lists_distinct_entities_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = SqliteCatalog::new(fixture(dir.path()));

        let entities = catalog.list_scoping_entities(None).unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].id, 101);
        assert_eq!(entities[0].name, "web");
        assert_eq!(entities[0].description.as_deref(), Some("Web tier"));
        assert_eq!(entities[1].id, 202);
        assert_eq!(entities[1].description, None);
    }

    #[test]
    fn entity_filter_limits_to_one_account() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = SqliteCatalog::new(fixture(dir.path()));

        let entities = catalog.list_scoping_entities(Some(202)).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "batch");

        assert!(catalog.list_scoping_entities(Some(999)).unwrap().is_empty());
    }

    #[test]
    fn volume_query_applies_catalog_filters() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = SqliteCatalog::new(fixture(dir.path()));

        let volumes = catalog.list_volumes(101).unwrap();
        let ids: Vec<u64> = volumes.iter().map(|v| v.id).collect();

        // 13 has no path and is not allocated, 14 is hidden, 15 is removed
        assert_eq!(ids, vec![10, 11, 12]);
        assert_eq!(volumes[0].template_id, Some(5));
        assert_eq!(volumes[1].path, None);
        assert_eq!(volumes[1].pool_id, None);
        assert!(volumes.iter().all(|v| v.removed.is_none()));
    }

    #[test]
    fn reopens_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = SqliteCatalog::new(fixture(dir.path()));

        assert!(!catalog.is_open());
        catalog.list_scoping_entities(None).unwrap();
        assert!(catalog.is_open());
        catalog.close();
        assert!(!catalog.is_open());

        assert_eq!(catalog.list_volumes(202).unwrap().len(), 1);
        assert!(catalog.is_open());
    }

    #[test]
    fn missing_database_is_a_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = SqliteCatalog::new(dir.path().join("absent.db"));

        let err = catalog.list_scoping_entities(None).unwrap_err();
        assert!(matches!(err, CatalogError::Connect(_)), "{err:?}");
        assert!(err.to_string().contains("absent.db"));
    }

    #[test]
    fn missing_tables_are_a_query_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path).unwrap().execute_batch("CREATE TABLE t (x INTEGER);").unwrap();
        let mut catalog = SqliteCatalog::new(path);

        let err = catalog.list_volumes(1).unwrap_err();
        assert!(matches!(err, CatalogError::Query(_)), "{err:?}");
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2026-03-01 10:00:00").is_ok());
        assert!(parse_timestamp("2026-03-01T10:00:00").is_ok());
        assert!(parse_timestamp("2026-03-01 10:00:00.250").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
