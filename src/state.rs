use std::sync::Arc;

use crate::backup::BackupJob;
use crate::config::AppConfig;
use crate::db::notification_repository::{MongoNotificationRepository, NotificationRepository};
use crate::db::session_repository::{MongoSessionRepository, SessionRepository};
use crate::db::staged_repository::{MongoStagedRepository, StagedRepository};
use crate::db::stock_repository::{MongoStockRepository, StockRepository};
use crate::models::asset::{AssetDisposal, AssetIssue, AssetPurchase, AssetReturn, AssetService};
use crate::models::faculty::{Faculty, FacultyUpdate};
use crate::models::user::User;
use crate::storage::client::StorageClient;

/// Shared application state, available to all Axum handlers.
///
/// Every repository is a trait object so tests can swap in in-memory
/// implementations.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn StagedRepository<User>>,
    pub faculty: Arc<dyn StagedRepository<Faculty>>,
    pub faculty_updates: Arc<dyn StagedRepository<FacultyUpdate>>,
    pub purchases: Arc<dyn StagedRepository<AssetPurchase>>,
    pub issues: Arc<dyn StagedRepository<AssetIssue>>,
    pub returns: Arc<dyn StagedRepository<AssetReturn>>,
    pub services: Arc<dyn StagedRepository<AssetService>>,
    pub disposals: Arc<dyn StagedRepository<AssetDisposal>>,
    pub stock: Arc<dyn StockRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub storage_client: Arc<dyn StorageClient>,
    /// `None` when scheduled backups are disabled.
    pub backup: Option<Arc<BackupJob>>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire every repository to collections of `db`.
    pub fn from_database(
        db: &mongodb::Database,
        storage_client: Arc<dyn StorageClient>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            users: Arc::new(MongoStagedRepository::<User>::new(db)),
            faculty: Arc::new(MongoStagedRepository::<Faculty>::new(db)),
            faculty_updates: Arc::new(MongoStagedRepository::<FacultyUpdate>::new(db)),
            purchases: Arc::new(MongoStagedRepository::<AssetPurchase>::new(db)),
            issues: Arc::new(MongoStagedRepository::<AssetIssue>::new(db)),
            returns: Arc::new(MongoStagedRepository::<AssetReturn>::new(db)),
            services: Arc::new(MongoStagedRepository::<AssetService>::new(db)),
            disposals: Arc::new(MongoStagedRepository::<AssetDisposal>::new(db)),
            stock: Arc::new(MongoStockRepository::new(db)),
            notifications: Arc::new(MongoNotificationRepository::new(db)),
            sessions: Arc::new(MongoSessionRepository::new(db)),
            storage_client,
            backup: None,
            config,
        }
    }

    pub fn with_backup(mut self, job: Arc<BackupJob>) -> Self {
        self.backup = Some(job);
        self
    }
}
