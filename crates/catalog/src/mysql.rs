//! Catalog reader over the live MySQL catalog.
//!
//! sqlx is async; the reader owns a current-thread tokio runtime and blocks
//! on it so the engine above stays synchronous.

use chrono::NaiveDateTime;
use log::debug;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Connection, Row};
use tokio::runtime::{Builder, Runtime};

use volmon_config::MySqlTarget;
use volmon_recon::{CatalogError, CatalogReader, ScopingEntity, VolumeRecord};

use crate::queries;

pub struct MySqlCatalog {
    options: MySqlConnectOptions,
    label: String,
    runtime: Runtime,
    conn: Option<MySqlConnection>,
}

impl MySqlCatalog {
    /// Builds the runtime; the connection itself is opened on first use.
    pub fn new(target: &MySqlTarget) -> Result<Self, CatalogError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CatalogError::Connect(format!("tokio runtime: {e}")))?;

        let options = MySqlConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&target.user)
            .password(target.password.expose())
            .database(&target.database);

        Ok(Self {
            options,
            label: format!("{}@{}:{}/{}", target.user, target.host, target.port, target.database),
            runtime,
            conn: None,
        })
    }

    fn ensure_connected(&mut self) -> Result<(), CatalogError> {
        if self.conn.is_none() {
            let conn = self
                .runtime
                .block_on(MySqlConnection::connect_with(&self.options))
                .map_err(|e| CatalogError::Connect(format!("{}: {e}", self.label)))?;
            debug!("connected to catalog {}", self.label);
            self.conn = Some(conn);
        }
        Ok(())
    }

    fn fetch(&mut self, sql: &str, arg: Option<u64>) -> Result<Vec<MySqlRow>, CatalogError> {
        self.ensure_connected()?;
        let Self { runtime, conn, .. } = self;
        let conn = conn
            .as_mut()
            .ok_or_else(|| CatalogError::Connect("connection not open".to_string()))?;

        let mut query = sqlx::query(sql);
        if let Some(id) = arg {
            query = query.bind(id);
        }
        runtime
            .block_on(query.fetch_all(&mut *conn))
            .map_err(|e| CatalogError::Query(e.to_string()))
    }
}

impl CatalogReader for MySqlCatalog {
    fn list_scoping_entities(
        &mut self,
        account_filter: Option<u64>,
    ) -> Result<Vec<ScopingEntity>, CatalogError> {
        let sql = queries::scoping_entities(account_filter.is_some());
        let rows = self.fetch(&sql, account_filter)?;

        rows.iter()
            .map(|row| {
                Ok(ScopingEntity {
                    id: get_id(row, 0)?,
                    name: get_opt::<String>(row, 1)?.unwrap_or_default(),
                    description: get_opt(row, 2)?,
                })
            })
            .collect()
    }

    fn list_volumes(&mut self, account_id: u64) -> Result<Vec<VolumeRecord>, CatalogError> {
        let rows = self.fetch(queries::VOLUMES_BY_ACCOUNT, Some(account_id))?;

        rows.iter()
            .map(|row| {
                Ok(VolumeRecord {
                    id: get_id(row, 0)?,
                    account_id: get_id(row, 1)?,
                    name: get_opt(row, 2)?,
                    uuid: get_opt(row, 3)?,
                    path: get_opt(row, 4)?,
                    pool_id: get_opt_id(row, 5)?,
                    template_id: get_opt_id(row, 6)?,
                    instance_id: get_opt_id(row, 7)?,
                    removed: get_opt::<NaiveDateTime>(row, 8)?,
                })
            })
            .collect()
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.runtime.block_on(conn.close()) {
                debug!("closing catalog {}: {e}", self.label);
            }
        }
    }
}

impl Drop for MySqlCatalog {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Column decoding ─────────────────────────────────────────────────
//
// Catalog ids are BIGINT UNSIGNED in stock schemas but signed in some
// exports; accept both.

fn get_opt<'r, T>(row: &'r MySqlRow, idx: usize) -> Result<Option<T>, CatalogError>
where
    T: sqlx::Decode<'r, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    row.try_get::<Option<T>, _>(idx)
        .map_err(|e| CatalogError::Decode(format!("column {idx}: {e}")))
}

fn get_opt_id(row: &MySqlRow, idx: usize) -> Result<Option<u64>, CatalogError> {
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return Ok(v);
    }
    match row.try_get::<Option<i64>, _>(idx) {
        Ok(None) => Ok(None),
        Ok(Some(v)) => u64::try_from(v)
            .map(Some)
            .map_err(|_| CatalogError::Decode(format!("column {idx}: negative id {v}"))),
        Err(e) => Err(CatalogError::Decode(format!("column {idx}: {e}"))),
    }
}

fn get_id(row: &MySqlRow, idx: usize) -> Result<u64, CatalogError> {
    get_opt_id(row, idx)?.ok_or_else(|| CatalogError::Decode(format!("column {idx}: unexpected NULL id")))
}
