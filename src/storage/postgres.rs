use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row as _};
use tracing::info;

use crate::config::PgParams;
use crate::error::StoreError;
use crate::model::{Product, StorageStats, TAGLINE_DEFAULT};

use super::{product_row, validate_batch, ProductStore, Row};

// Run one statement at a time; prepared statements reject multi-command strings.
// Text columns are unbounded so both backends accept the same records.
const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT NOT NULL,
        tagline     TEXT,
        description TEXT,
        url         TEXT,
        votes       INTEGER DEFAULT 0,
        comments    INTEGER DEFAULT 0,
        maker       TEXT,
        category    TEXT,
        launch_date TIMESTAMPTZ,
        image_url   TEXT,
        scraped_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        source_url  TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    // tables created with bounded VARCHAR columns; a no-op once they are TEXT
    r#"
    ALTER TABLE products
        ALTER COLUMN name       TYPE TEXT,
        ALTER COLUMN url        TYPE TEXT,
        ALTER COLUMN maker      TYPE TEXT,
        ALTER COLUMN category   TYPE TEXT,
        ALTER COLUMN image_url  TYPE TEXT,
        ALTER COLUMN source_url TYPE TEXT
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_products_name_source ON products (name, source_url)",
    "CREATE INDEX IF NOT EXISTS idx_products_name ON products (name)",
    "CREATE INDEX IF NOT EXISTS idx_products_scraped_at ON products (scraped_at)",
    "CREATE INDEX IF NOT EXISTS idx_products_votes ON products (votes DESC)",
];

const UPSERT: &str = r#"
    INSERT INTO products (
        name, tagline, description, url, votes, comments,
        maker, category, launch_date, image_url, scraped_at, source_url
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
    ON CONFLICT (name, source_url) DO UPDATE
      SET tagline     = EXCLUDED.tagline,
          description = EXCLUDED.description,
          votes       = EXCLUDED.votes,
          comments    = EXCLUDED.comments,
          updated_at  = now()
"#;

const SELECT_ROWS: &str = r#"
    SELECT id, name, tagline, description, url, votes, comments, maker, category,
           launch_date, image_url, scraped_at, source_url, created_at, updated_at
    FROM products
    ORDER BY scraped_at DESC, id ASC
    LIMIT $1
"#;

const SELECT_STATS: &str = r#"
    SELECT COUNT(*)::bigint               AS total_products,
           COUNT(DISTINCT source_url)::bigint AS unique_sources,
           MAX(scraped_at)                AS last_scraped,
           AVG(votes)::float8             AS avg_votes
    FROM products
"#;

pub struct PgStore {
    params: PgParams,
    pool: Option<PgPool>,
}

impl PgStore {
    pub fn new(params: PgParams) -> Self {
        Self { params, pool: None }
    }

    fn pool(&self) -> Result<&PgPool, StoreError> {
        self.pool.as_ref().ok_or_else(|| StoreError::Persistence("postgres store is not connected".to_string()))
    }
}

pub fn connect_options(params: &PgParams) -> Result<PgConnectOptions, StoreError> {
    match &params.url {
        Some(dsn) => PgConnectOptions::from_str(dsn).map_err(|e| StoreError::Connection(format!("invalid DATABASE_URL: {}", e))),
        None => Ok(PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .database(&params.database)
            .username(&params.user)
            .password(&params.password)),
    }
}

impl ProductStore for PgStore {
    fn backend(&self) -> &'static str { "postgresql" }

    async fn connect(&mut self) -> Result<(), StoreError> {
        let opts = connect_options(&self.params)?;
        let conn_err = |e: sqlx::Error| StoreError::Connection(e.to_string());

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(opts)
            .await
            .map_err(conn_err)?;

        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await.map_err(conn_err)?;
        }

        info!(target_db = %self.params.display_target(), "postgres connected, schema ready");
        self.pool = Some(pool);
        Ok(())
    }

    async fn try_upsert(&self, records: &[Product]) -> Result<usize, StoreError> {
        if records.is_empty() { return Ok(0); }
        validate_batch(records)?;
        let pool = self.pool()?;
        let persist_err = |e: sqlx::Error| StoreError::Persistence(e.to_string());

        let mut tx = pool.begin().await.map_err(persist_err)?;
        match write_batch(&mut tx, records).await {
            Ok(()) => {
                tx.commit().await.map_err(persist_err)?;
                Ok(records.len())
            }
            Err(e) => {
                // best effort; dropping the transaction rolls back as well
                let _ = tx.rollback().await;
                Err(persist_err(e))
            }
        }
    }

    async fn query(&self, limit: Option<i64>) -> Result<Vec<Row>, StoreError> {
        let pool = self.pool()?;
        let rows = sqlx::query(SELECT_ROWS)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        rows.iter()
            .map(|r| pg_row(r).map_err(|e| StoreError::Persistence(e.to_string())))
            .collect()
    }

    async fn stats(&self) -> Result<StorageStats, StoreError> {
        let pool = self.pool()?;
        let row = sqlx::query(SELECT_STATS)
            .fetch_one(pool)
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        stats_row(&row).map_err(|e| StoreError::Persistence(e.to_string()))
    }

    async fn disconnect(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            info!("postgres connection closed");
        }
    }
}

async fn write_batch(conn: &mut PgConnection, records: &[Product]) -> Result<(), sqlx::Error> {
    for p in records {
        sqlx::query(UPSERT)
            .bind(&p.name)
            .bind(&p.tagline)
            .bind(&p.description)
            .bind(&p.url)
            .bind(p.votes)
            .bind(p.comments)
            .bind(&p.maker)
            .bind(&p.category)
            .bind(p.launch_date)
            .bind(&p.image_url)
            .bind(p.scraped_at)
            .bind(&p.source_url)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn stats_row(row: &PgRow) -> Result<StorageStats, sqlx::Error> {
    Ok(StorageStats {
        total_products: row.try_get("total_products")?,
        unique_sources: row.try_get("unique_sources")?,
        last_scraped: row.try_get("last_scraped")?,
        avg_votes: row.try_get("avg_votes")?,
    })
}

fn pg_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    let p = Product {
        name: row.try_get("name")?,
        tagline: row.try_get::<Option<String>, _>("tagline")?.unwrap_or_else(|| TAGLINE_DEFAULT.to_string()),
        description: row.try_get("description")?,
        url: row.try_get("url")?,
        votes: row.try_get("votes")?,
        comments: row.try_get("comments")?,
        maker: row.try_get("maker")?,
        category: row.try_get("category")?,
        launch_date: row.try_get("launch_date")?,
        image_url: row.try_get("image_url")?,
        scraped_at: row.try_get("scraped_at")?,
        source_url: row.try_get("source_url")?,
    };
    let mut out = product_row(&p);
    out.insert("id".into(), Value::from(row.try_get::<i64, _>("id")?));
    out.insert("created_at".into(), Value::from(row.try_get::<DateTime<Utc>, _>("created_at")?.to_rfc3339()));
    out.insert("updated_at".into(), Value::from(row.try_get::<DateTime<Utc>, _>("updated_at")?.to_rfc3339()));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract;

    fn params(url: Option<&str>) -> PgParams {
        PgParams {
            host: "db.internal".into(),
            port: 5433,
            database: "catalog".into(),
            user: "scraper".into(),
            password: "pw".into(),
            url: url.map(String::from),
        }
    }

    #[test]
    fn schema_has_natural_key_index() {
        assert!(SCHEMA.iter().any(|s| s.contains("UNIQUE INDEX") && s.contains("(name, source_url)")));
        assert!(UPSERT.contains("ON CONFLICT (name, source_url)"));
    }

    #[test]
    fn text_columns_are_unbounded() {
        let create = SCHEMA[0];
        assert!(!create.contains("VARCHAR"));
        for col in ["name", "url", "maker", "category", "image_url", "source_url"] {
            assert!(create.lines().any(|l| l.split_whitespace().map(|w| w.trim_end_matches(',')).take(2).eq([col, "TEXT"])), "{} is not TEXT", col);
            assert!(SCHEMA[1].contains(&format!("ALTER COLUMN {:<10} TYPE TEXT", col)), "{} not widened", col);
        }
    }

    #[test]
    fn invalid_dsn_is_a_connection_error() {
        assert!(matches!(connect_options(&params(Some("not a dsn"))), Err(StoreError::Connection(_))));
        assert!(connect_options(&params(Some("postgres://u:p@localhost:5432/db"))).is_ok());
        assert!(connect_options(&params(None)).is_ok());
    }

    #[tokio::test]
    async fn unconnected_store_contract() {
        let mut store = PgStore::new(params(None));
        // no-op paths never touch the network
        assert!(store.upsert(&[]).await);
        store.disconnect().await;
        let p = Product::new("A", "https://s.test/", Utc::now());
        assert!(!store.upsert(&[p]).await);
        assert!(matches!(store.query(None).await, Err(StoreError::Persistence(_))));
        assert!(matches!(store.stats().await, Err(StoreError::Persistence(_))));
    }

    async fn reset(store: &PgStore) {
        sqlx::query("TRUNCATE products RESTART IDENTITY").execute(store.pool().unwrap()).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs PSCRAPE_TEST_DATABASE_URL pointing at a disposable database"]
    async fn live_database_contract() {
        let Ok(url) = std::env::var("PSCRAPE_TEST_DATABASE_URL") else { return };
        let mut store = PgStore::new(params(Some(&url)));
        store.connect().await.unwrap();
        // connect twice: the schema statements must be repeatable
        store.connect().await.unwrap();

        reset(&store).await;
        contract::idempotent_upsert(&store).await;
        reset(&store).await;
        contract::round_trip(&store).await;
        reset(&store).await;
        contract::newest_first_with_ties(&store).await;
        reset(&store).await;
        contract::stats_match_query(&store).await;
        reset(&store).await;
        contract::long_fields_are_stored(&store).await;
        reset(&store).await;
        contract::failed_batch_is_not_partial(&store).await;

        reset(&store).await;
        store.disconnect().await;
    }
}
