//! PostgreSQL product store
//!
//! Products live in `product` (one row per ASIN, upserted) and metric
//! snapshots in `product_metric` (append-only). Pool and connection failures
//! surface as [`StorageError::Unreachable`] so the acquisition pipeline can
//! fail open; server-side query errors surface as
//! [`StorageError::QueryFailed`].

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool, PoolError};
use pulse_core::{Asin, MetricSnapshot, Product, StorageError, StoredProduct, Timestamp};
use pulse_storage::ProductStore;
use tokio_postgres::Row;

const BACKEND: &str = "postgres";

/// Development schema. Production deployments manage migrations separately.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS product (
    asin             TEXT PRIMARY KEY,
    title            TEXT NOT NULL,
    brand            TEXT NOT NULL,
    category         TEXT NOT NULL,
    sub_category     TEXT,
    image            TEXT NOT NULL,
    price            DOUBLE PRECISION NOT NULL,
    bsr              BIGINT NOT NULL,
    est_sales        BIGINT NOT NULL,
    sellers          BIGINT NOT NULL,
    referral_fee     DOUBLE PRECISION NOT NULL,
    fba_fee          DOUBLE PRECISION NOT NULL,
    storage_fee      DOUBLE PRECISION NOT NULL,
    weight           TEXT,
    dimensions       TEXT,
    is_hazmat        BOOLEAN NOT NULL DEFAULT FALSE,
    is_ip_risk       BOOLEAN NOT NULL DEFAULT FALSE,
    is_oversized     BOOLEAN NOT NULL DEFAULT FALSE,
    rating           DOUBLE PRECISION NOT NULL DEFAULT 0,
    reviews          BIGINT NOT NULL DEFAULT 0,
    trend            DOUBLE PRECISION NOT NULL DEFAULT 0,
    description      TEXT NOT NULL DEFAULT '',
    seasonality_tags TEXT[] NOT NULL DEFAULT '{}',
    analysis         JSONB,
    updated_at       TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS product_updated_at_idx ON product (updated_at, asin);

CREATE TABLE IF NOT EXISTS product_metric (
    id          UUID PRIMARY KEY,
    asin        TEXT NOT NULL REFERENCES product (asin) ON DELETE CASCADE,
    price       DOUBLE PRECISION NOT NULL,
    bsr         BIGINT NOT NULL,
    "timestamp" TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS product_metric_asin_ts_idx
    ON product_metric (asin, "timestamp" DESC);
"#;

const SELECT_PRODUCT: &str = r#"
SELECT asin, title, brand, category, sub_category, image, price, bsr, est_sales,
       sellers, referral_fee, fba_fee, storage_fee, weight, dimensions, is_hazmat,
       is_ip_risk, is_oversized, rating, reviews, trend, description,
       seasonality_tags, analysis, updated_at
FROM product
WHERE asin = $1
"#;

const SELECT_RECENT_SNAPSHOTS: &str = r#"
SELECT id, asin, price, bsr, "timestamp"
FROM product_metric
WHERE asin = $1
ORDER BY "timestamp" DESC
LIMIT $2
"#;

const UPSERT_PRODUCT: &str = r#"
INSERT INTO product (
    asin, title, brand, category, sub_category, image, price, bsr, est_sales,
    sellers, referral_fee, fba_fee, storage_fee, weight, dimensions, is_hazmat,
    is_ip_risk, is_oversized, rating, reviews, trend, description,
    seasonality_tags, analysis, updated_at
) VALUES (
    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
    $17, $18, $19, $20, $21, $22, $23, $24, $25
)
ON CONFLICT (asin) DO UPDATE SET
    title = EXCLUDED.title,
    brand = EXCLUDED.brand,
    category = EXCLUDED.category,
    sub_category = EXCLUDED.sub_category,
    image = EXCLUDED.image,
    price = EXCLUDED.price,
    bsr = EXCLUDED.bsr,
    est_sales = EXCLUDED.est_sales,
    sellers = EXCLUDED.sellers,
    referral_fee = EXCLUDED.referral_fee,
    fba_fee = EXCLUDED.fba_fee,
    storage_fee = EXCLUDED.storage_fee,
    weight = EXCLUDED.weight,
    dimensions = EXCLUDED.dimensions,
    is_hazmat = EXCLUDED.is_hazmat,
    is_ip_risk = EXCLUDED.is_ip_risk,
    is_oversized = EXCLUDED.is_oversized,
    rating = EXCLUDED.rating,
    reviews = EXCLUDED.reviews,
    trend = EXCLUDED.trend,
    description = EXCLUDED.description,
    seasonality_tags = EXCLUDED.seasonality_tags,
    analysis = EXCLUDED.analysis,
    updated_at = EXCLUDED.updated_at
"#;

const INSERT_SNAPSHOT: &str = r#"
INSERT INTO product_metric (id, asin, price, bsr, "timestamp")
VALUES ($1, $2, $3, $4, $5)
"#;

const SELECT_STALEST: &str = r#"
SELECT asin FROM product ORDER BY updated_at ASC, asin ASC LIMIT $1
"#;

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_error(err: PoolError) -> StorageError {
    StorageError::unreachable(BACKEND, err)
}

/// Server-reported errors are query failures; everything else means the
/// connection is unusable.
fn query_error(err: tokio_postgres::Error) -> StorageError {
    if err.as_db_error().is_some() {
        StorageError::query_failed(BACKEND, err)
    } else {
        StorageError::unreachable(BACKEND, err)
    }
}

fn decode_error(err: impl ToString) -> StorageError {
    StorageError::Serialization {
        reason: err.to_string(),
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn row_asin(row: &Row) -> Result<Asin, StorageError> {
    let raw: String = row.try_get("asin").map_err(decode_error)?;
    Asin::parse(&raw).map_err(decode_error)
}

fn product_from_row(row: &Row) -> Result<Product, StorageError> {
    Ok(Product {
        asin: row_asin(row)?,
        title: row.try_get("title").map_err(decode_error)?,
        brand: row.try_get("brand").map_err(decode_error)?,
        category: row.try_get("category").map_err(decode_error)?,
        sub_category: row.try_get("sub_category").map_err(decode_error)?,
        image: row.try_get("image").map_err(decode_error)?,
        price: row.try_get("price").map_err(decode_error)?,
        bsr: row.try_get("bsr").map_err(decode_error)?,
        est_sales: row.try_get("est_sales").map_err(decode_error)?,
        sellers: row.try_get("sellers").map_err(decode_error)?,
        referral_fee: row.try_get("referral_fee").map_err(decode_error)?,
        fba_fee: row.try_get("fba_fee").map_err(decode_error)?,
        storage_fee: row.try_get("storage_fee").map_err(decode_error)?,
        weight: row.try_get("weight").map_err(decode_error)?,
        dimensions: row.try_get("dimensions").map_err(decode_error)?,
        is_hazmat: row.try_get("is_hazmat").map_err(decode_error)?,
        is_ip_risk: row.try_get("is_ip_risk").map_err(decode_error)?,
        is_oversized: row.try_get("is_oversized").map_err(decode_error)?,
        rating: row.try_get("rating").map_err(decode_error)?,
        reviews: row.try_get("reviews").map_err(decode_error)?,
        trend: row.try_get("trend").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        seasonality_tags: row.try_get("seasonality_tags").map_err(decode_error)?,
        analysis: row.try_get("analysis").map_err(decode_error)?,
        price_history: Vec::new(),
        bsr_history: Vec::new(),
        updated_at: row.try_get::<_, Timestamp>("updated_at").map_err(decode_error)?,
    })
}

fn snapshot_from_row(row: &Row) -> Result<MetricSnapshot, StorageError> {
    Ok(MetricSnapshot {
        id: row.try_get("id").map_err(decode_error)?,
        asin: row_asin(row)?,
        price: row.try_get("price").map_err(decode_error)?,
        bsr: row.try_get("bsr").map_err(decode_error)?,
        timestamp: row.try_get("timestamp").map_err(decode_error)?,
    })
}

// ============================================================================
// STORE
// ============================================================================

/// [`ProductStore`] backed by a deadpool-postgres pool.
#[derive(Clone)]
pub struct PgProductStore {
    pool: Pool,
}

impl std::fmt::Debug for PgProductStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("PgProductStore")
            .field("pool_size", &status.size)
            .field("pool_available", &status.available)
            .finish()
    }
}

impl PgProductStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<Object, StorageError> {
        self.pool.get().await.map_err(pool_error)
    }

    /// Create the tables and indexes if missing. Development use only.
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn().await?;
        conn.batch_execute(SCHEMA).await.map_err(query_error)?;
        tracing::info!("Product schema ensured");
        Ok(())
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn product_get(
        &self,
        asin: &Asin,
        history_limit: usize,
    ) -> Result<Option<StoredProduct>, StorageError> {
        let conn = self.conn().await?;

        let row = conn
            .query_opt(SELECT_PRODUCT, &[&asin.as_str()])
            .await
            .map_err(query_error)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let product = product_from_row(&row)?;

        let limit = i64::try_from(history_limit).unwrap_or(i64::MAX);
        let snapshots = conn
            .query(SELECT_RECENT_SNAPSHOTS, &[&asin.as_str(), &limit])
            .await
            .map_err(query_error)?
            .iter()
            .map(snapshot_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(StoredProduct { product, snapshots }))
    }

    async fn product_upsert(&self, product: &Product) -> Result<(), StorageError> {
        let conn = self.conn().await?;
        conn.execute(
            UPSERT_PRODUCT,
            &[
                &product.asin.as_str(),
                &product.title,
                &product.brand,
                &product.category,
                &product.sub_category,
                &product.image,
                &product.price,
                &product.bsr,
                &product.est_sales,
                &product.sellers,
                &product.referral_fee,
                &product.fba_fee,
                &product.storage_fee,
                &product.weight,
                &product.dimensions,
                &product.is_hazmat,
                &product.is_ip_risk,
                &product.is_oversized,
                &product.rating,
                &product.reviews,
                &product.trend,
                &product.description,
                &product.seasonality_tags,
                &product.analysis,
                &product.updated_at,
            ],
        )
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn identifiers_page(&self, limit: usize) -> Result<Vec<Asin>, StorageError> {
        let conn = self.conn().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        conn.query(SELECT_STALEST, &[&limit])
            .await
            .map_err(query_error)?
            .iter()
            .map(row_asin)
            .collect()
    }

    async fn snapshot_append(&self, snapshot: &MetricSnapshot) -> Result<(), StorageError> {
        let conn = self.conn().await?;
        conn.execute(
            INSERT_SNAPSHOT,
            &[
                &snapshot.id,
                &snapshot.asin.as_str(),
                &snapshot.price,
                &snapshot.bsr,
                &snapshot.timestamp,
            ],
        )
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let conn = self.conn().await?;
        conn.simple_query("SELECT 1").await.map_err(query_error)?;
        Ok(())
    }
}
