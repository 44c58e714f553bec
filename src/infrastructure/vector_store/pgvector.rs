//! PostgreSQL + pgvector reference vector store

use std::fmt::Debug;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::domain::vector::{
    BatchInsertResult, Label, ReferenceVector, SimilarityMatch, VectorSearchParams, VectorStore,
    VectorStoreStats,
};
use crate::domain::{DomainError, RequestContext};

/// Rows needed before an ivfflat index is worth building
const INDEX_MIN_ROWS: i64 = 1000;

/// One row per vector table with running search counters
const SEARCH_STATS_TABLE: &str = "vector_cache_stats";

/// Configuration for the pgvector store
#[derive(Debug, Clone)]
pub struct PgVectorConfig {
    /// Embedding dimensions of the `vector(N)` column
    pub dimensions: u32,
    /// Table holding the reference corpus
    pub table_name: String,
}

impl PgVectorConfig {
    pub fn new(dimensions: u32) -> Self {
        Self {
            dimensions,
            table_name: "security_vectors".to_string(),
        }
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    fn validate(&self) -> Result<(), DomainError> {
        let valid_name = !self.table_name.is_empty()
            && self
                .table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !self.table_name.starts_with(|c: char| c.is_ascii_digit());

        if !valid_name {
            return Err(DomainError::configuration(format!(
                "Invalid vector table name '{}'",
                self.table_name
            )));
        }

        if self.dimensions == 0 {
            return Err(DomainError::configuration("Vector dimensions must be positive"));
        }

        Ok(())
    }
}

/// pgvector-backed store using cosine distance (`<=>`)
pub struct PgVectorStore {
    pool: PgPool,
    config: PgVectorConfig,
}

impl Debug for PgVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgVectorStore")
            .field("config", &self.config)
            .finish()
    }
}

impl PgVectorStore {
    pub fn new(pool: PgPool, config: PgVectorConfig) -> Result<Self, DomainError> {
        config.validate()?;
        Ok(Self { pool, config })
    }

    /// Connect a new pool and wrap it
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        config: PgVectorConfig,
    ) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Self::new(pool, config)
    }

    /// Ensure the pgvector extension and the vector table exist
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::vector_store(format!("Failed to create vector extension: {}", e))
            })?;

        let table = &self.config.table_name;
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                text TEXT NOT NULL,
                text_hash VARCHAR(64) NOT NULL UNIQUE,
                label_text TEXT NOT NULL,
                label INTEGER NOT NULL,
                embedding vector({}) NOT NULL,
                embedding_type VARCHAR(32),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            table, self.config.dimensions
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::vector_store(format!("Failed to create table: {}", e)))?;

        let label_index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_label ON {} (label)",
            table, table
        );

        sqlx::query(&label_index)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::vector_store(format!("Failed to create label index: {}", e))
            })?;

        let stats_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                table_name TEXT PRIMARY KEY,
                total_searches BIGINT NOT NULL DEFAULT 0,
                avg_search_time_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            SEARCH_STATS_TABLE
        );

        sqlx::query(&stats_table)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::vector_store(format!("Failed to create search stats table: {}", e))
            })?;

        sqlx::query(&format!(
            "INSERT INTO {} (table_name) VALUES ($1) ON CONFLICT (table_name) DO NOTHING",
            SEARCH_STATS_TABLE
        ))
        .bind(table)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::vector_store(format!("Failed to seed search stats: {}", e)))?;

        tracing::info!(table = %table, dimensions = self.config.dimensions, "Vector schema ready");

        Ok(())
    }

    /// Fold one search latency into the running average without delaying
    /// the caller
    fn record_search(&self, elapsed: Duration) {
        let pool = self.pool.clone();
        let table = self.config.table_name.clone();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        tokio::spawn(async move {
            let query = format!(
                r#"
                UPDATE {}
                SET avg_search_time_ms =
                        (avg_search_time_ms * total_searches + $2) / (total_searches + 1),
                    total_searches = total_searches + 1,
                    updated_at = NOW()
                WHERE table_name = $1
                "#,
                SEARCH_STATS_TABLE
            );

            if let Err(e) = sqlx::query(&query)
                .bind(&table)
                .bind(elapsed_ms)
                .execute(&pool)
                .await
            {
                tracing::warn!(error = %e, "Failed to record search stats");
            }
        });
    }

    async fn search_stats(&self) -> (u64, f64) {
        let query = format!(
            "SELECT total_searches, avg_search_time_ms FROM {} WHERE table_name = $1",
            SEARCH_STATS_TABLE
        );

        match sqlx::query(&query)
            .bind(&self.config.table_name)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(row)) => (
                row.get::<i64, _>("total_searches") as u64,
                row.get::<f64, _>("avg_search_time_ms"),
            ),
            Ok(None) => (0, 0.0),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load search stats");
                (0, 0.0)
            }
        }
    }

    async fn insert_with<'e, E>(
        &self,
        executor: E,
        vector: &ReferenceVector,
    ) -> Result<Option<i64>, DomainError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let query = format!(
            r#"
            INSERT INTO {} (text, text_hash, label_text, label, embedding, embedding_type, created_at)
            VALUES ($1, $2, $3, $4, $5::vector, $6, $7)
            ON CONFLICT (text_hash) DO NOTHING
            RETURNING id
            "#,
            self.config.table_name
        );

        sqlx::query_scalar::<_, i64>(&query)
            .bind(vector.text())
            .bind(vector.text_hash())
            .bind(vector.label_text())
            .bind(i32::from(vector.label()))
            .bind(embedding_to_pgvector(vector.embedding()))
            .bind(vector.embedding_type())
            .bind(vector.created_at())
            .fetch_optional(executor)
            .await
            .map_err(|e| DomainError::vector_store(format!("Failed to insert vector: {}", e)))
    }
}

fn row_to_match(row: &PgRow) -> Result<SimilarityMatch, DomainError> {
    let similarity: f64 = row.get("similarity");
    Ok(SimilarityMatch::new(row_to_vector(row)?, similarity as f32))
}

fn row_to_vector(row: &PgRow) -> Result<ReferenceVector, DomainError> {
    let embedding_str: String = row.get("embedding");
    let label: i32 = row.get("label");
    let created_at: DateTime<Utc> = row.get("created_at");
    let embedding_type: Option<String> = row.get("embedding_type");

    let mut vector = ReferenceVector::new(
        row.get::<String, _>("text"),
        row.get::<String, _>("label_text"),
        Label::from(label),
        parse_pgvector(&embedding_str)?,
    )
    .with_id(row.get("id"))
    .with_created_at(created_at);

    if let Some(embedding_type) = embedding_type {
        vector = vector.with_embedding_type(embedding_type);
    }

    Ok(vector)
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn find_similar(
        &self,
        ctx: &RequestContext,
        embedding: &[f32],
        params: VectorSearchParams,
    ) -> Result<Vec<SimilarityMatch>, DomainError> {
        if ctx.is_cancelled() {
            return Err(DomainError::cancelled("vector search cancelled"));
        }

        let started = Instant::now();
        let query = format!(
            r#"
            SELECT
                id,
                text,
                label_text,
                label,
                embedding::text AS embedding,
                embedding_type,
                created_at,
                1 - (embedding <=> $1::vector) AS similarity
            FROM {}
            WHERE 1 - (embedding <=> $1::vector) >= $2
            ORDER BY embedding <=> $1::vector
            LIMIT $3
            "#,
            self.config.table_name
        );

        let rows = sqlx::query(&query)
            .bind(embedding_to_pgvector(embedding))
            .bind(params.min_similarity as f64)
            .bind(params.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, table = %self.config.table_name, "Vector search failed");
                DomainError::vector_store(format!("Search failed: {}", e))
            })?;

        let matches = rows
            .iter()
            .map(row_to_match)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            results = matches.len(),
            min_similarity = params.min_similarity,
            limit = params.limit,
            "Vector search completed"
        );

        self.record_search(started.elapsed());

        Ok(matches)
    }

    async fn insert(&self, vector: ReferenceVector) -> Result<bool, DomainError> {
        Ok(self.insert_with(&self.pool, &vector).await?.is_some())
    }

    async fn insert_batch(
        &self,
        vectors: Vec<ReferenceVector>,
    ) -> Result<BatchInsertResult, DomainError> {
        if vectors.is_empty() {
            return Ok(BatchInsertResult::default());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::vector_store(format!("Failed to begin transaction: {}", e)))?;

        let mut result = BatchInsertResult::default();
        for vector in &vectors {
            result.record(self.insert_with(&mut *tx, vector).await?);
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::vector_store(format!("Failed to commit batch: {}", e)))?;

        tracing::debug!(
            inserted = result.inserted,
            duplicates = result.duplicates,
            "Vector batch inserted"
        );

        Ok(result)
    }

    async fn malicious_vectors(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ReferenceVector>, DomainError> {
        let query = format!(
            r#"
            SELECT id, text, label_text, label, embedding::text AS embedding, embedding_type, created_at
            FROM {}
            WHERE label = 1
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
            self.config.table_name
        );

        let rows = sqlx::query(&query)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::vector_store(format!("Failed to list malicious vectors: {}", e)))?;

        rows.iter().map(row_to_vector).collect()
    }

    /// Builds the ivfflat index once the corpus is large enough
    async fn create_index(&self) -> Result<bool, DomainError> {
        let table = &self.config.table_name;
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::vector_store(format!("Failed to count vectors: {}", e)))?;

        if count < INDEX_MIN_ROWS {
            tracing::info!(
                rows = count,
                required = INDEX_MIN_ROWS,
                "Skipping ivfflat index creation, not enough rows"
            );
            return Ok(false);
        }

        let query = format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_embedding ON {} USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100)",
            table, table
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::vector_store(format!("Failed to create vector index: {}", e)))?;

        Ok(true)
    }

    async fn stats(&self) -> Result<VectorStoreStats, DomainError> {
        let query = format!(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE label = 1) AS malicious,
                COUNT(*) FILTER (WHERE label <> 1) AS safe
            FROM {}
            "#,
            self.config.table_name
        );

        let row = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::vector_store(format!("Failed to load stats: {}", e)))?;

        let (searches, avg_search_time_ms) = self.search_stats().await;

        Ok(VectorStoreStats {
            total: row.get::<i64, _>("total") as u64,
            malicious: row.get::<i64, _>("malicious") as u64,
            safe: row.get::<i64, _>("safe") as u64,
            searches,
            avg_search_time_ms,
        })
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn embedding_to_pgvector(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

fn parse_pgvector(s: &str) -> Result<Vec<f32>, DomainError> {
    let trimmed = s.trim_start_matches('[').trim_end_matches(']');
    if trimmed.trim().is_empty() {
        return Ok(Vec::new());
    }

    let values: Result<Vec<f32>, _> = trimmed.split(',').map(|v| v.trim().parse::<f32>()).collect();
    values.map_err(|e| DomainError::vector_store(format!("Failed to parse vector: {}", e)))
}
