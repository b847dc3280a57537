// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use sadhya_config::model::StorageConfig;
use sadhya_core::{
    AdapterType, CommitOutcome, ConsumeOutcome, HealthStatus, MessageId, Order, OrderId,
    OutboxEntry, OutboxJob, PluginAdapter, SadhyaError, Session, StorageAdapter,
    TokenConsumption, TransitionCommit, VerificationToken,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, SadhyaError> {
        self.db
            .get()
            .ok_or_else(|| SadhyaError::storage("storage not initialized -- call initialize() first"))
    }

    async fn checkpoint(db: &Database) -> Result<(), SadhyaError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, SadhyaError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SadhyaError> {
        if let Some(db) = self.db.get() {
            Self::checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), SadhyaError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| SadhyaError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), SadhyaError> {
        Self::checkpoint(self.database()?).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Sessions ---

    async fn get_session(&self, phone: &str) -> Result<Option<Session>, SadhyaError> {
        queries::sessions::get_session(self.database()?, phone).await
    }

    async fn commit_transition(
        &self,
        commit: TransitionCommit,
    ) -> Result<CommitOutcome, SadhyaError> {
        queries::sessions::commit_transition(self.database()?, commit).await
    }

    async fn is_event_processed(&self, message_id: &MessageId) -> Result<bool, SadhyaError> {
        queries::sessions::is_event_processed(self.database()?, message_id).await
    }

    async fn list_sessions_idle_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Session>, SadhyaError> {
        queries::sessions::list_idle_since(self.database()?, cutoff).await
    }

    async fn delete_session(
        &self,
        phone: &str,
        expected_version: u64,
    ) -> Result<bool, SadhyaError> {
        queries::sessions::delete_session(self.database()?, phone, expected_version).await
    }

    async fn prune_processed_events(&self, cutoff: DateTime<Utc>) -> Result<u64, SadhyaError> {
        queries::sessions::prune_processed_events(self.database()?, cutoff).await
    }

    // --- Orders and tokens ---

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, SadhyaError> {
        queries::orders::get_order(self.database()?, order_id).await
    }

    async fn set_payment_proof_ref(
        &self,
        order_id: &OrderId,
        reference: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, SadhyaError> {
        queries::orders::set_payment_proof_ref(self.database()?, order_id, reference, updated_at)
            .await
    }

    async fn get_token(&self, token: &str) -> Result<Option<VerificationToken>, SadhyaError> {
        queries::tokens::get_token(self.database()?, token).await
    }

    async fn tokens_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<VerificationToken>, SadhyaError> {
        queries::tokens::tokens_for_order(self.database()?, order_id).await
    }

    async fn consume_token_pair(
        &self,
        consumption: TokenConsumption,
    ) -> Result<ConsumeOutcome, SadhyaError> {
        queries::tokens::consume_token_pair(self.database()?, consumption).await
    }

    // --- Outbox ---

    async fn enqueue_jobs(
        &self,
        jobs: Vec<OutboxJob>,
        now: DateTime<Utc>,
    ) -> Result<(), SadhyaError> {
        queries::outbox::enqueue_jobs(self.database()?, jobs, now).await
    }

    async fn dequeue_job(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<OutboxEntry>, SadhyaError> {
        queries::outbox::dequeue_job(self.database()?, now, lease_until).await
    }

    async fn ack_job(&self, id: i64) -> Result<(), SadhyaError> {
        queries::outbox::ack_job(self.database()?, id).await
    }

    async fn fail_job(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), SadhyaError> {
        queries::outbox::fail_job(self.database()?, id, error, retry_at).await
    }

    async fn prune_outbox(&self, before: DateTime<Utc>) -> Result<u64, SadhyaError> {
        queries::outbox::prune_finished(self.database()?, before).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn health_check_reflects_initialization() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.health_check().await.is_err());
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.shutdown().await.unwrap();
    }
}
