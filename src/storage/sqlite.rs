use std::collections::HashMap;
use std::str::FromStr;

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{error, info};

use crate::crawler::models::Listing;

/// `(source, title)` pair that decides insert vs update. The source tag is
/// stored in the `page` column.
type Identity = (String, String);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertSummary {
    pub updated: usize,
    pub inserted: usize,
}

#[derive(Debug, sqlx::FromRow)]
pub struct StoredListing {
    pub listing_id: i64,
    pub page: Option<String>,
    pub title: Option<String>,
    pub price: Option<i64>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub area: Option<f64>,
    pub url: Option<String>,
}

pub struct Storage {
    pool: SqlitePool,
    // Session-local existence cache, rebuilt from the table on startup and
    // extended after every committed insert.
    existing: HashMap<Identity, i64>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                listing_id INTEGER PRIMARY KEY AUTOINCREMENT,
                page TEXT,
                title TEXT,
                price INTEGER,
                city TEXT,
                district TEXT,
                area REAL,
                url TEXT,
                scraped_at TEXT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let existing = Self::load_cache(&pool).await?;
        info!(known = existing.len(), "Identity cache initialized");

        Ok(Self { pool, existing })
    }

    async fn load_cache(pool: &SqlitePool) -> Result<HashMap<Identity, i64>> {
        let rows = sqlx::query("SELECT listing_id, page, title FROM listings")
            .fetch_all(pool)
            .await?;

        let mut cache = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("listing_id");
            let page: Option<String> = row.get("page");
            let title: Option<String> = row.get("title");
            cache.insert((page.unwrap_or_default(), title.unwrap_or_default()), id);
        }

        Ok(cache)
    }

    /// Classifies each listing against the identity cache, then applies the
    /// update and insert batches in one transaction. Persistence failures
    /// are logged and reported as a zero-effect summary; losing one page's
    /// writes must not end the crawl.
    pub async fn upsert_listings(&mut self, listings: &[Listing], source: &str) -> UpsertSummary {
        let mut updates: Vec<(&Listing, i64)> = Vec::new();
        let mut inserts: Vec<&Listing> = Vec::new();

        for listing in listings {
            let key = (source.to_string(), listing.identity_title().to_string());
            match self.existing.get(&key) {
                Some(&id) => updates.push((listing, id)),
                None => inserts.push(listing),
            }
        }

        let summary = UpsertSummary {
            updated: updates.len(),
            inserted: inserts.len(),
        };

        match self.apply(&updates, &inserts, source).await {
            Ok(new_ids) => {
                // Only a committed insert may extend the cache.
                self.existing.extend(new_ids);
                info!(
                    source,
                    updated = summary.updated,
                    inserted = summary.inserted,
                    "Upserted listings batch"
                );
                summary
            }
            Err(e) => {
                error!(
                    source,
                    batch = listings.len(),
                    error = %e,
                    "Failed to persist listings batch"
                );
                UpsertSummary::default()
            }
        }
    }

    async fn apply(
        &self,
        updates: &[(&Listing, i64)],
        inserts: &[&Listing],
        source: &str,
    ) -> Result<Vec<(Identity, i64)>> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for (listing, id) in updates {
            sqlx::query(
                r#"
                UPDATE listings
                SET price = ?1, city = ?2, district = ?3, area = ?4, url = ?5, scraped_at = ?6
                WHERE listing_id = ?7
                "#,
            )
            .bind(listing.price)
            .bind(&listing.city)
            .bind(&listing.district)
            .bind(listing.area)
            .bind(&listing.url)
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let mut new_ids = Vec::with_capacity(inserts.len());
        for listing in inserts {
            sqlx::query(
                r#"
                INSERT INTO listings (page, title, price, city, district, area, url, scraped_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(source)
            .bind(&listing.title)
            .bind(listing.price)
            .bind(&listing.city)
            .bind(&listing.district)
            .bind(listing.area)
            .bind(&listing.url)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            let row = sqlx::query("SELECT last_insert_rowid() AS id")
                .fetch_one(&mut *tx)
                .await?;
            let id: i64 = row.get("id");
            new_ids.push((
                (source.to_string(), listing.identity_title().to_string()),
                id,
            ));
        }

        tx.commit().await?;
        Ok(new_ids)
    }

    pub async fn fetch_for_source(&self, source: &str) -> Result<Vec<StoredListing>> {
        let rows = sqlx::query_as::<_, StoredListing>(
            r#"
            SELECT listing_id, page, title, price, city, district, area, url
            FROM listings
            WHERE page = ?1
            ORDER BY listing_id
            "#,
        )
        .bind(source)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn total(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM listings")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("total"))
    }
}
