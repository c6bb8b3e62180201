//! SQLite schema for the product store.

/// Products table. `(user_id, url)` is the update key; `id` is stable for the
/// life of a record. List columns hold JSON arrays, timestamps RFC 3339 text.
pub const SQLITE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    scrape_details TEXT NOT NULL,
    analysis_result TEXT NOT NULL,
    country_pricing_analysis TEXT NOT NULL DEFAULT '[]',
    competitor_analysis TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (user_id, url)
);

CREATE INDEX IF NOT EXISTS idx_products_url ON products(url);
CREATE INDEX IF NOT EXISTS idx_products_user ON products(user_id, id);
"#;

/// Column list matching [`super::sqlite`] row decoding.
pub const PRODUCT_COLUMNS: &str = "id, user_id, url, title, scrape_details, analysis_result, \
    country_pricing_analysis, competitor_analysis, created_at, updated_at";
