use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;

use crate::error::AppError;
use crate::models::asset::{AssetItem, StockDelta, StockEntry};

/// Repository trait for per-item stock counters.
#[async_trait]
pub trait StockRepository: Send + Sync {
    /// Apply `delta` to the item's counters in one atomic step.
    ///
    /// Returns the updated entry, or `None` if a decreasing counter does not
    /// hold enough (the entry is left untouched). Additive deltas create the
    /// entry on first use.
    async fn apply(&self, item: &AssetItem, delta: &StockDelta)
        -> Result<Option<StockEntry>, AppError>;

    async fn find(&self, item: &AssetItem) -> Result<Option<StockEntry>, AppError>;

    /// All entries sorted by type, category and item name.
    async fn list(&self) -> Result<Vec<StockEntry>, AppError>;
}

/// MongoDB implementation of the StockRepository.
pub struct MongoStockRepository {
    collection: mongodb::Collection<StockEntry>,
}

impl MongoStockRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("asset_stock"),
        }
    }
}

#[async_trait]
impl StockRepository for MongoStockRepository {
    async fn apply(
        &self,
        item: &AssetItem,
        delta: &StockDelta,
    ) -> Result<Option<StockEntry>, AppError> {
        let mut filter = doc! { "_id": item.stock_key() };
        for (field, minimum) in delta.guards() {
            filter.insert(field, doc! { "$gte": minimum });
        }

        let mut increments = Document::new();
        for (field, change) in delta.changes() {
            increments.insert(field, change);
        }

        let asset_type = mongodb::bson::to_bson(&item.asset_type)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let update = doc! {
            "$inc": increments,
            "$setOnInsert": {
                "asset_type": asset_type,
                "category": item.category.trim(),
                "item_name": item.item_name.trim(),
            },
        };

        self.collection
            .find_one_and_update(filter, update)
            .upsert(delta.is_additive())
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find(&self, item: &AssetItem) -> Result<Option<StockEntry>, AppError> {
        self.collection
            .find_one(doc! { "_id": item.stock_key() })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list(&self) -> Result<Vec<StockEntry>, AppError> {
        let cursor = self
            .collection
            .find(doc! {})
            .sort(doc! { "asset_type": 1, "category": 1, "item_name": 1 })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
