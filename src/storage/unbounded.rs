//! Unbounded tier: one record per file in an embedded database.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use surrealdb::engine::local::{Db, RocksDb};
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::models::{FileIndex, FileRecord};

pub const DATABASE_NAME: &str = "MiniIndexDB";
pub const DATABASE_VERSION: u32 = 1;
pub const FILES_TABLE: &str = "files";

const NAMESPACE: &str = "mini_index";
const META_TABLE: &str = "meta";
const SCHEMA_RECORD: &str = "schema";

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Deletes every stored record, then stores every record of `index`.
    async fn replace_all(&self, index: &FileIndex) -> Result<(), StorageError>;

    async fn load_all(&self) -> Result<FileIndex, StorageError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaVersion {
    version: u32,
}

pub struct SurrealRecordStore {
    db: Surreal<Db>,
}

impl SurrealRecordStore {
    /// Opens (creating if absent) the database under `dir`.
    pub async fn open(dir: &Path) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(dir).await?;
        let db_path = dir.join(DATABASE_NAME);
        let db = Surreal::new::<RocksDb>(&*db_path.to_string_lossy()).await?;
        db.use_ns(NAMESPACE).use_db(DATABASE_NAME).await?;

        let store = Self { db };
        store.upgrade().await?;
        Ok(store)
    }

    async fn upgrade(&self) -> Result<(), StorageError> {
        let current: Option<SchemaVersion> = self.db.select((META_TABLE, SCHEMA_RECORD)).await?;
        let current = current.map_or(0, |schema| schema.version);
        if current >= DATABASE_VERSION {
            return Ok(());
        }

        info!(
            "Upgrading {} from version {} to {}",
            DATABASE_NAME, current, DATABASE_VERSION
        );
        self.db
            .query(
                "
                DEFINE TABLE files SCHEMALESS;
                DEFINE INDEX idx_path ON files FIELDS path UNIQUE;
            ",
            )
            .await?
            .check()?;

        let _: Option<SchemaVersion> = self
            .db
            .update((META_TABLE, SCHEMA_RECORD))
            .content(SchemaVersion {
                version: DATABASE_VERSION,
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SurrealRecordStore {
    async fn replace_all(&self, index: &FileIndex) -> Result<(), StorageError> {
        let records: Vec<FileRecord> = index.records().cloned().collect();

        self.db
            .query(
                "
                BEGIN TRANSACTION;
                DELETE type::table($table);
                FOR $record IN $records {
                    CREATE type::thing($table, $record.path) CONTENT $record;
                };
                COMMIT TRANSACTION;
            ",
            )
            .bind(("table", FILES_TABLE))
            .bind(("records", records))
            .await?
            .check()?;

        debug!("Stored {} records in {}", index.len(), DATABASE_NAME);
        Ok(())
    }

    async fn load_all(&self) -> Result<FileIndex, StorageError> {
        let records: Vec<FileRecord> = self.db.select(FILES_TABLE).await?;
        Ok(records.into_iter().collect())
    }
}
