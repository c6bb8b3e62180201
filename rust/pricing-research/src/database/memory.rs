//! In-memory product store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::domain::{NewProduct, ProductRecord, ProductUpdate};
use crate::error::{ResearchError, ResearchResult};

use super::ProductRepository;

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    records: BTreeMap<i64, ProductRecord>,
}

/// Process-local [`ProductRepository`]. Ids start at 1 and are never reused.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl State {
    fn find(&self, user_id: &str, url: &str) -> Option<&ProductRecord> {
        self.records
            .values()
            .find(|r| r.user_id == user_id && r.url == url)
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn insert(&self, product: NewProduct) -> ResearchResult<ProductRecord> {
        let mut state = self.state.write();
        if state.find(&product.user_id, &product.url).is_some() {
            return Err(ResearchError::persistence(
                "insert",
                format!(
                    "record for user '{}' and url '{}' already exists",
                    product.user_id, product.url
                ),
            ));
        }

        state.next_id += 1;
        let now = Utc::now();
        let record = ProductRecord {
            id: state.next_id,
            user_id: product.user_id,
            url: product.url,
            title: product.title,
            scrape_details: product.scrape_details,
            analysis_result: product.analysis_result,
            country_pricing_analysis: product.country_pricing_analysis,
            competitor_analysis: product.competitor_analysis,
            created_at: now,
            updated_at: now,
        };
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_url(&self, url: &str) -> ResearchResult<Option<ProductRecord>> {
        Ok(self
            .state
            .read()
            .records
            .values()
            .find(|r| r.url == url)
            .cloned())
    }

    async fn find_by_user_and_url(
        &self,
        user_id: &str,
        url: &str,
    ) -> ResearchResult<Option<ProductRecord>> {
        Ok(self.state.read().find(user_id, url).cloned())
    }

    async fn update_by_user_and_url(
        &self,
        user_id: &str,
        url: &str,
        update: ProductUpdate,
    ) -> ResearchResult<ProductRecord> {
        let mut state = self.state.write();
        let record = state
            .records
            .values_mut()
            .find(|r| r.user_id == user_id && r.url == url)
            .ok_or_else(|| ResearchError::NotFound {
                user_id: user_id.to_string(),
                url: url.to_string(),
            })?;
        update.apply_to(record, Utc::now());
        Ok(record.clone())
    }

    async fn find_by_id(&self, id: i64) -> ResearchResult<Option<ProductRecord>> {
        Ok(self.state.read().records.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> ResearchResult<Vec<ProductRecord>> {
        Ok(self
            .state
            .read()
            .records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
