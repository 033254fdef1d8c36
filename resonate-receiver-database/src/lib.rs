use async_trait::async_trait;
use resonate_receiver_controls::identity::IdentityBackend;
use resonate_receiver_models::ServerTarget;
use snafu::prelude::*;
use sqlx::{Pool, Sqlite, SqlitePool, sqlite::SqliteConnectOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SERVER_TARGET_KEY: &str = "server_target";
const AUTO_DISCOVERY_KEY: &str = "auto_discovery";
const CLIENT_ID_KEY: &str = "client_id";

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("Unable to find database location"))]
    DatabaseLocationError,
    #[snafu(display("Unable to migrate database to latest version"))]
    DatabaseMigrationError,
    #[snafu(display("Database error: {source}"))]
    DatabaseError {
        #[snafu(source)]
        source: sqlx::Error,
    },
    #[snafu(display("Serialization error: {source}"))]
    SerializationError {
        #[snafu(source)]
        source: serde_json::Error,
    },
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(_value: sqlx::migrate::MigrateError) -> Self {
        Self::DatabaseMigrationError
    }
}

impl From<sqlx::Error> for Error {
    fn from(source: sqlx::Error) -> Self {
        Self::DatabaseError { source }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::SerializationError { source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Key-value settings persisted in SQLite.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new() -> Result<Self> {
        let database_url = if let Ok(url) = std::env::var("DATABASE_URL") {
            PathBuf::from(url.replace("sqlite://", ""))
        } else {
            let Some(mut url) = dirs::data_local_dir() else {
                return Err(Error::DatabaseLocationError);
            };
            url.push("resonate-receiver");

            if !url.exists() {
                let Ok(_) = std::fs::create_dir_all(&url) else {
                    return Err(Error::DatabaseLocationError);
                };
            }

            url.push("data.db");

            url
        };

        Database::open(&database_url).await
    }

    pub async fn open(path: &Path) -> Result<Self> {
        debug!(path = %path.to_string_lossy(), "opening database");

        let options = SqliteConnectOptions::new()
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;

        Database::init(pool).await
    }

    async fn init(pool: Pool<Sqlite>) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn get_server_target(&self) -> Result<Option<ServerTarget>> {
        let Some(value) = self.get(SERVER_TARGET_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&value) {
            Ok(target) => Ok(Some(target)),
            Err(error) => {
                warn!(%error, "ignoring unreadable server target");
                Ok(None)
            }
        }
    }

    pub async fn set_server_target(&self, target: &ServerTarget) -> Result<()> {
        let serialized = serde_json::to_string(target)?;
        self.set(SERVER_TARGET_KEY, &serialized).await
    }

    pub async fn clear_server_target(&self) -> Result<()> {
        self.remove(SERVER_TARGET_KEY).await
    }

    pub async fn get_auto_discovery(&self) -> Result<bool> {
        Ok(self
            .get(AUTO_DISCOVERY_KEY)
            .await?
            .is_some_and(|value| value == "true"))
    }

    pub async fn set_auto_discovery(&self, enabled: bool) -> Result<()> {
        self.set(AUTO_DISCOVERY_KEY, if enabled { "true" } else { "false" })
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn identity_error(error: Error) -> resonate_receiver_controls::error::Error {
    resonate_receiver_controls::error::Error::Identity {
        message: error.to_string(),
    }
}

#[async_trait]
impl IdentityBackend for Database {
    async fn load_client_id(&self) -> resonate_receiver_controls::Result<Option<String>> {
        self.get(CLIENT_ID_KEY).await.map_err(identity_error)
    }

    async fn store_client_id(&self, client_id: &str) -> resonate_receiver_controls::Result<()> {
        self.set(CLIENT_ID_KEY, client_id)
            .await
            .map_err(identity_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use resonate_receiver_controls::identity::IdentityStore;

    use super::*;

    #[sqlx::test]
    async fn server_target_round_trips(pool: Pool<Sqlite>) {
        let db = Database::init(pool).await.unwrap();
        assert_eq!(db.get_server_target().await.unwrap(), None);

        let target = ServerTarget::new("192.168.1.100", 8080, Some("Living Room".into()));
        db.set_server_target(&target).await.unwrap();
        assert_eq!(db.get_server_target().await.unwrap(), Some(target));

        let replacement = ServerTarget::new("studio.local", 8927, None);
        db.set_server_target(&replacement).await.unwrap();
        assert_eq!(db.get_server_target().await.unwrap(), Some(replacement));

        db.clear_server_target().await.unwrap();
        assert_eq!(db.get_server_target().await.unwrap(), None);
    }

    #[sqlx::test]
    async fn unreadable_target_reads_as_none(pool: Pool<Sqlite>) {
        let db = Database::init(pool).await.unwrap();
        db.set(SERVER_TARGET_KEY, "{not json").await.unwrap();

        assert_eq!(db.get_server_target().await.unwrap(), None);
    }

    #[sqlx::test]
    async fn auto_discovery_defaults_to_off(pool: Pool<Sqlite>) {
        let db = Database::init(pool).await.unwrap();
        assert!(!db.get_auto_discovery().await.unwrap());

        db.set_auto_discovery(true).await.unwrap();
        assert!(db.get_auto_discovery().await.unwrap());

        db.set_auto_discovery(false).await.unwrap();
        assert!(!db.get_auto_discovery().await.unwrap());
    }

    #[tokio::test]
    async fn settings_and_identity_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let target = ServerTarget::new("10.0.0.5", 8080, None);

        let first_id = {
            let db = Arc::new(Database::open(&path).await.unwrap());
            db.set_server_target(&target).await.unwrap();
            IdentityStore::new(db).current_client_id().await.unwrap()
        };

        let db = Arc::new(Database::open(&path).await.unwrap());
        assert_eq!(db.get_server_target().await.unwrap(), Some(target));

        let second_id = IdentityStore::new(db).current_client_id().await.unwrap();
        assert_eq!(first_id, second_id);
    }
}
