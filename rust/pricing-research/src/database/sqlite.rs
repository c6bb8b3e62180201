//! SQLite product store.
//!
//! One connection behind a mutex; every call runs on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::{NewProduct, ProductRecord, ProductUpdate};
use crate::error::{ResearchError, ResearchResult};

use super::schema::{PRODUCT_COLUMNS, SQLITE_SCHEMA};
use super::ProductRepository;

/// SQLite-backed [`ProductRepository`].
#[derive(Clone)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database file and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> ResearchResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db_path = path.clone();

        let conn = tokio::task::spawn_blocking(move || -> ResearchResult<Connection> {
            if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| ResearchError::persistence("open", e))?;
            }
            let conn = Connection::open(&db_path).map_err(sql_err("open"))?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(sql_err("open"))?;
            conn.execute_batch(SQLITE_SCHEMA).map_err(sql_err("migrate"))?;
            Ok(conn)
        })
        .await
        .map_err(|e| ResearchError::persistence("open", e))??;

        tracing::debug!(path = %path.display(), "SQLite product store opened");
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database, mainly for tests.
    pub fn open_in_memory() -> ResearchResult<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err("open"))?;
        conn.execute_batch(SQLITE_SCHEMA).map_err(sql_err("migrate"))?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, operation: &'static str, f: F) -> ResearchResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> ResearchResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| ResearchError::persistence(operation, e))?
    }
}

#[async_trait]
impl ProductRepository for SqliteStore {
    async fn insert(&self, product: NewProduct) -> ResearchResult<ProductRecord> {
        let pricing = to_json("insert", &product.country_pricing_analysis)?;
        let competitors = to_json("insert", &product.competitor_analysis)?;

        self.blocking("insert", move |conn| {
            let now = Utc::now();
            let stamp = now.to_rfc3339();
            conn.execute(
                "INSERT INTO products (user_id, url, title, scrape_details, analysis_result, \
                 country_pricing_analysis, competitor_analysis, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    product.user_id,
                    product.url,
                    product.title,
                    product.scrape_details,
                    product.analysis_result,
                    pricing,
                    competitors,
                    stamp,
                ],
            )
            .map_err(sql_err("insert"))?;

            Ok(ProductRecord {
                id: conn.last_insert_rowid(),
                user_id: product.user_id,
                url: product.url,
                title: product.title,
                scrape_details: product.scrape_details,
                analysis_result: product.analysis_result,
                country_pricing_analysis: product.country_pricing_analysis,
                competitor_analysis: product.competitor_analysis,
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    async fn find_by_url(&self, url: &str) -> ResearchResult<Option<ProductRecord>> {
        let url = url.to_string();
        self.blocking("find_by_url", move |conn| {
            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE url = ?1 ORDER BY id LIMIT 1");
            query_one(conn, "find_by_url", &sql, params![url])
        })
        .await
    }

    async fn find_by_user_and_url(
        &self,
        user_id: &str,
        url: &str,
    ) -> ResearchResult<Option<ProductRecord>> {
        let user_id = user_id.to_string();
        let url = url.to_string();
        self.blocking("find_by_user_and_url", move |conn| {
            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE user_id = ?1 AND url = ?2");
            query_one(conn, "find_by_user_and_url", &sql, params![user_id, url])
        })
        .await
    }

    async fn update_by_user_and_url(
        &self,
        user_id: &str,
        url: &str,
        update: ProductUpdate,
    ) -> ResearchResult<ProductRecord> {
        let user_id = user_id.to_string();
        let url = url.to_string();
        self.blocking("update", move |conn| {
            let tx = conn.transaction().map_err(sql_err("update"))?;

            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE user_id = ?1 AND url = ?2");
            let Some(mut record) = query_one(&tx, "update", &sql, params![user_id, url])? else {
                return Err(ResearchError::NotFound { user_id, url });
            };
            update.apply_to(&mut record, Utc::now());

            tx.execute(
                "UPDATE products SET title = ?1, scrape_details = ?2, analysis_result = ?3, \
                 country_pricing_analysis = ?4, competitor_analysis = ?5, updated_at = ?6 \
                 WHERE id = ?7",
                params![
                    record.title,
                    record.scrape_details,
                    record.analysis_result,
                    to_json("update", &record.country_pricing_analysis)?,
                    to_json("update", &record.competitor_analysis)?,
                    record.updated_at.to_rfc3339(),
                    record.id,
                ],
            )
            .map_err(sql_err("update"))?;
            tx.commit().map_err(sql_err("update"))?;
            Ok(record)
        })
        .await
    }

    async fn find_by_id(&self, id: i64) -> ResearchResult<Option<ProductRecord>> {
        self.blocking("find_by_id", move |conn| {
            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
            query_one(conn, "find_by_id", &sql, params![id])
        })
        .await
    }

    async fn find_by_user(&self, user_id: &str) -> ResearchResult<Vec<ProductRecord>> {
        let user_id = user_id.to_string();
        self.blocking("find_by_user", move |conn| {
            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE user_id = ?1 ORDER BY id");
            let mut stmt = conn.prepare(&sql).map_err(sql_err("find_by_user"))?;
            let rows = stmt
                .query_map(params![user_id], read_row)
                .map_err(sql_err("find_by_user"))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row.map_err(sql_err("find_by_user"))?.into_record()?);
            }
            Ok(records)
        })
        .await
    }
}

/// Raw column values, decoded outside the rusqlite row callback.
struct ProductRow {
    id: i64,
    user_id: String,
    url: String,
    title: String,
    scrape_details: String,
    analysis_result: String,
    country_pricing_analysis: String,
    competitor_analysis: String,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        scrape_details: row.get(4)?,
        analysis_result: row.get(5)?,
        country_pricing_analysis: row.get(6)?,
        competitor_analysis: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl ProductRow {
    fn into_record(self) -> ResearchResult<ProductRecord> {
        Ok(ProductRecord {
            id: self.id,
            user_id: self.user_id,
            url: self.url,
            title: self.title,
            scrape_details: self.scrape_details,
            analysis_result: self.analysis_result,
            country_pricing_analysis: serde_json::from_str(&self.country_pricing_analysis)
                .map_err(|e| ResearchError::persistence("decode", e))?,
            competitor_analysis: serde_json::from_str(&self.competitor_analysis)
                .map_err(|e| ResearchError::persistence("decode", e))?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn query_one(
    conn: &Connection,
    operation: &'static str,
    sql: &str,
    params: impl rusqlite::Params,
) -> ResearchResult<Option<ProductRecord>> {
    conn.query_row(sql, params, read_row)
        .optional()
        .map_err(sql_err(operation))?
        .map(ProductRow::into_record)
        .transpose()
}

fn sql_err(operation: &'static str) -> impl Fn(rusqlite::Error) -> ResearchError {
    move |e| ResearchError::persistence(operation, e)
}

fn to_json<T: serde::Serialize>(operation: &'static str, value: &T) -> ResearchResult<String> {
    serde_json::to_string(value).map_err(|e| ResearchError::persistence(operation, e))
}

fn parse_datetime(value: &str) -> ResearchResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ResearchError::persistence("decode", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CountryPricing;

    fn product(user: &str, url: &str) -> NewProduct {
        NewProduct {
            user_id: user.to_string(),
            url: url.to_string(),
            title: "Silk Tie".to_string(),
            scrape_details: "summary".to_string(),
            analysis_result: "analysis".to_string(),
            country_pricing_analysis: vec![CountryPricing {
                country: "US".to_string(),
                price: "$40".to_string(),
                analysis: "fair".to_string(),
            }],
            competitor_analysis: vec![],
        }
    }

    #[tokio::test]
    async fn test_insert_then_read_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = store.insert(product("u1", "https://a.example")).await.unwrap();
        assert!(created.id > 0);

        let found = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.country_pricing_analysis, created.country_pricing_analysis);
        assert_eq!(found.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_duplicate_user_and_url_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(product("u1", "https://a.example")).await.unwrap();
        let err = store
            .insert(product("u1", "https://a.example"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::Persistence { operation: "insert", .. }));
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .update_by_user_and_url("u1", "https://a.example", ProductUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::NotFound { .. }));
    }
}
