use crate::DBSettings;
use log::{debug, info};
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    Row, Sqlite, SqlitePool,
};
use std::{
    hash::{DefaultHasher, Hash, Hasher},
    time::Duration as StdDuration,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

static PICKS_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/picks");

#[derive(Debug, Clone)]
pub struct DatabasePoolConfig {
    pub read_max_connections: u32,
    pub write_max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub busy_timeout_ms: u32,
    pub journal_mode: SqliteJournalMode,
    pub in_memory: bool,
}

impl Default for DatabasePoolConfig {
    fn default() -> Self {
        DBSettings::default().into()
    }
}

impl From<DBSettings> for DatabasePoolConfig {
    fn from(settings: DBSettings) -> Self {
        let journal_mode = match settings.journal_mode.to_uppercase().as_str() {
            "DELETE" => SqliteJournalMode::Delete,
            "MEMORY" => SqliteJournalMode::Memory,
            _ => SqliteJournalMode::Wal,
        };
        Self {
            read_max_connections: settings.read_max_connections,
            // sqlite only ever admits one writer
            write_max_connections: settings.write_max_connections.max(1),
            acquire_timeout_secs: settings.acquire_timeout_secs,
            busy_timeout_ms: settings.busy_timeout_ms,
            journal_mode,
            in_memory: settings.in_memory,
        }
    }
}

impl DatabasePoolConfig {
    fn connect_options(&self, database_path: &str, read_only: bool) -> SqliteConnectOptions {
        let options = if self.in_memory {
            // Both pools must land on the same shared in-memory database
            let mut hasher = DefaultHasher::new();
            database_path.hash(&mut hasher);
            SqliteConnectOptions::new()
                .filename(format!("file:memdb_{}?mode=memory&cache=shared", hasher.finish()))
                .shared_cache(true)
                .journal_mode(SqliteJournalMode::Memory)
        } else {
            SqliteConnectOptions::new()
                .filename(database_path)
                .read_only(read_only)
                .create_if_missing(!read_only)
                .journal_mode(self.journal_mode)
        };

        options
            .busy_timeout(StdDuration::from_millis(self.busy_timeout_ms as u64))
            .foreign_keys(true)
    }
}

#[derive(Clone, Debug)]
pub struct DBConnection {
    pub database_name: String,
    pub database_path: String,
    read_pool: SqlitePool,
    write_pool: SqlitePool,
}

impl DBConnection {
    /// Opens `{path}/{db_name}.db` with separate reader and writer pools and
    /// brings the schema up to date.
    pub async fn new(
        path: &str,
        db_name: &str,
        pool_config: DatabasePoolConfig,
    ) -> Result<Self, sqlx::Error> {
        let database_path = format!("{}/{}.db", path, db_name);

        if !pool_config.in_memory {
            std::fs::create_dir_all(path)?;
            let database_url = format!("sqlite:{}", database_path);
            if !Sqlite::database_exists(&database_url).await? {
                info!("creating database at {}", database_path);
                Sqlite::create_database(&database_url).await?;
            }
        }

        let write_options = pool_config.connect_options(&database_path, false);
        debug!("Write connection: {:?}", write_options);
        let write_pool = SqlitePoolOptions::new()
            .max_connections(pool_config.write_max_connections)
            .min_connections(1)
            .acquire_timeout(StdDuration::from_secs(pool_config.acquire_timeout_secs))
            .connect_with(write_options)
            .await?;

        // Migrations run before the read pool opens, read-only connections can't create tables
        PICKS_MIGRATOR
            .run(&write_pool)
            .await
            .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;

        let read_options = pool_config.connect_options(&database_path, true);
        debug!("Read connection: {:?}", read_options);
        let read_pool = SqlitePoolOptions::new()
            .max_connections(pool_config.read_max_connections)
            .acquire_timeout(StdDuration::from_secs(pool_config.acquire_timeout_secs))
            .connect_with(read_options)
            .await?;

        Ok(Self {
            database_name: db_name.to_string(),
            database_path,
            read_pool,
            write_pool,
        })
    }

    #[cfg(test)]
    pub fn new_with_pools(
        database_name: String,
        database_path: String,
        read_pool: SqlitePool,
        write_pool: SqlitePool,
    ) -> Self {
        Self {
            database_name,
            database_path,
            read_pool,
            write_pool,
        }
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        let _: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.read_pool)
            .await?;
        let _: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.write_pool)
            .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.read_pool.close().await;
        self.write_pool.close().await;
    }

    pub fn read(&self) -> &SqlitePool {
        &self.read_pool
    }

    pub fn write(&self) -> &SqlitePool {
        &self.write_pool
    }
}

fn decode_error<E>(column: &str, source: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

pub fn format_datetime(value: OffsetDateTime) -> Result<String, sqlx::Error> {
    value
        .format(&Rfc3339)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

pub fn parse_required_datetime(
    row: &SqliteRow,
    column: &str,
) -> Result<OffsetDateTime, sqlx::Error> {
    let date_str: String = row.try_get(column)?;
    OffsetDateTime::parse(&date_str, &Rfc3339).map_err(|e| decode_error(column, e))
}

pub fn parse_required_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|e| decode_error(column, e))
}

/// Decodes a text column through one of the domain `TryFrom<&str>` impls
pub fn parse_required_enum<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: for<'a> TryFrom<&'a str, Error = picks_core::CoreError>,
{
    let raw: String = row.try_get(column)?;
    T::try_from(raw.as_str()).map_err(|e| decode_error(column, e))
}

pub fn parse_optional_enum<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, sqlx::Error>
where
    T: for<'a> TryFrom<&'a str, Error = picks_core::CoreError>,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| T::try_from(raw.as_str()).map_err(|e| decode_error(column, e)))
        .transpose()
}
