//! Product store.
//!
//! Research records are keyed by `(user_id, url)` for updates and carry a
//! store-assigned numeric id. Two backends implement [`ProductRepository`]:
//! - **SQLite**: on-disk store used by the service
//! - **In-memory**: process-local store for tests and `:memory:` deployments
//!
//! Every write is a single-record transaction.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::domain::{NewProduct, ProductRecord, ProductUpdate};
use crate::error::ResearchResult;

/// Persistence contract for research records.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Insert a new record and return it with its assigned id.
    async fn insert(&self, product: NewProduct) -> ResearchResult<ProductRecord>;

    /// Oldest record for `url`, whoever owns it.
    async fn find_by_url(&self, url: &str) -> ResearchResult<Option<ProductRecord>>;

    /// The record for `(user_id, url)`, if any.
    async fn find_by_user_and_url(
        &self,
        user_id: &str,
        url: &str,
    ) -> ResearchResult<Option<ProductRecord>>;

    /// Apply `update` to the record for `(user_id, url)`.
    ///
    /// Fails with `NotFound` when no such record exists. The id is preserved.
    async fn update_by_user_and_url(
        &self,
        user_id: &str,
        url: &str,
        update: ProductUpdate,
    ) -> ResearchResult<ProductRecord>;

    async fn find_by_id(&self, id: i64) -> ResearchResult<Option<ProductRecord>>;

    /// Records owned by `user_id` in insertion order.
    async fn find_by_user(&self, user_id: &str) -> ResearchResult<Vec<ProductRecord>>;
}

/// Configured product store.
#[derive(Clone)]
pub enum Database {
    Sqlite(SqliteStore),
    InMemory(InMemoryStore),
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(store) => write!(f, "Database::Sqlite({})", store.path().display()),
            Self::InMemory(_) => write!(f, "Database::InMemory"),
        }
    }
}

impl Database {
    /// Open the store named by `config`, creating the schema if needed.
    pub async fn from_config(config: &DatabaseConfig) -> ResearchResult<Self> {
        if config.is_in_memory() {
            return Ok(Self::in_memory());
        }
        Ok(Self::Sqlite(SqliteStore::open(&config.path).await?))
    }

    pub fn in_memory() -> Self {
        Self::InMemory(InMemoryStore::new())
    }

    /// Short backend name for logs.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::InMemory(_) => "in-memory",
        }
    }
}

#[async_trait]
impl ProductRepository for Database {
    async fn insert(&self, product: NewProduct) -> ResearchResult<ProductRecord> {
        match self {
            Self::Sqlite(store) => store.insert(product).await,
            Self::InMemory(store) => store.insert(product).await,
        }
    }

    async fn find_by_url(&self, url: &str) -> ResearchResult<Option<ProductRecord>> {
        match self {
            Self::Sqlite(store) => store.find_by_url(url).await,
            Self::InMemory(store) => store.find_by_url(url).await,
        }
    }

    async fn find_by_user_and_url(
        &self,
        user_id: &str,
        url: &str,
    ) -> ResearchResult<Option<ProductRecord>> {
        match self {
            Self::Sqlite(store) => store.find_by_user_and_url(user_id, url).await,
            Self::InMemory(store) => store.find_by_user_and_url(user_id, url).await,
        }
    }

    async fn update_by_user_and_url(
        &self,
        user_id: &str,
        url: &str,
        update: ProductUpdate,
    ) -> ResearchResult<ProductRecord> {
        match self {
            Self::Sqlite(store) => store.update_by_user_and_url(user_id, url, update).await,
            Self::InMemory(store) => store.update_by_user_and_url(user_id, url, update).await,
        }
    }

    async fn find_by_id(&self, id: i64) -> ResearchResult<Option<ProductRecord>> {
        match self {
            Self::Sqlite(store) => store.find_by_id(id).await,
            Self::InMemory(store) => store.find_by_id(id).await,
        }
    }

    async fn find_by_user(&self, user_id: &str) -> ResearchResult<Vec<ProductRecord>> {
        match self {
            Self::Sqlite(store) => store.find_by_user(user_id).await,
            Self::InMemory(store) => store.find_by_user(user_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_path_selects_in_memory_backend() {
        let config = DatabaseConfig {
            path: ":memory:".to_string(),
        };
        let db = Database::from_config(&config).await.unwrap();
        assert_eq!(db.backend_name(), "in-memory");
        assert_eq!(format!("{db:?}"), "Database::InMemory");
    }
}
