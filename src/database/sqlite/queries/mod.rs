
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqliteExecutor;
use tracing::debug;
use uuid::Uuid;

use crate::responder::UsageRecord;

pub struct ManifestQueries;

impl ManifestQueries {
    #[inline]
    pub async fn insert<'e, E: SqliteExecutor<'e>>(executor: E, manifest: &Manifest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO manifest (id, namespace, embedding_model, dimension, chunk_count, created_at)
            VALUES (1, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&manifest.namespace)
        .bind(&manifest.embedding_model)
        .bind(manifest.dimension)
        .bind(manifest.chunk_count)
        .bind(manifest.created_at)
        .execute(executor)
        .await
        .context("Failed to insert manifest")?;

        Ok(())
    }

    #[inline]
    pub async fn get<'e, E: SqliteExecutor<'e>>(executor: E) -> Result<Option<Manifest>> {
        let manifest = sqlx::query_as::<_, Manifest>(
            r#"
            SELECT namespace, embedding_model, dimension, chunk_count, created_at
            FROM manifest WHERE id = 1
            "#,
        )
        .fetch_optional(executor)
        .await
        .context("Failed to read manifest")?;

        Ok(manifest)
    }
}

pub struct ChunkQueries;

impl ChunkQueries {
    #[inline]
    pub async fn insert<'e, E: SqliteExecutor<'e>>(executor: E, chunk: &StoredChunk) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chunks (position, content, start_offset, end_offset, overlap, oversized, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(chunk.position)
        .bind(&chunk.content)
        .bind(chunk.start_offset)
        .bind(chunk.end_offset)
        .bind(chunk.overlap)
        .bind(chunk.oversized)
        .bind(&chunk.embedding)
        .execute(executor)
        .await
        .with_context(|| format!("Failed to insert chunk {}", chunk.position))?;

        Ok(())
    }

    /// Every chunk in document order
    #[inline]
    pub async fn list<'e, E: SqliteExecutor<'e>>(executor: E) -> Result<Vec<StoredChunk>> {
        let chunks = sqlx::query_as::<_, StoredChunk>(
            r#"
            SELECT position, content, start_offset, end_offset, overlap, oversized, embedding
            FROM chunks ORDER BY position
            "#,
        )
        .fetch_all(executor)
        .await
        .context("Failed to list chunks")?;

        debug!("Read {} chunks", chunks.len());
        Ok(chunks)
    }
}

pub struct UsageQueries;

impl UsageQueries {
    #[inline]
    pub async fn insert<'e, E: SqliteExecutor<'e>>(
        executor: E,
        record: &UsageRecord,
    ) -> Result<StoredUsage> {
        let stored = StoredUsage {
            id: Uuid::new_v4(),
            namespace: record.namespace.clone(),
            model: record.model.clone(),
            prompt_tokens: i64::from(record.usage.prompt_tokens),
            completion_tokens: i64::from(record.usage.completion_tokens),
            total_tokens: i64::from(record.usage.total_tokens()),
            cost: record.cost,
            passages: record.passages as i64,
            created_at: Utc::now().naive_utc(),
        };

        sqlx::query(
            r#"
            INSERT INTO usage_records
                (id, namespace, model, prompt_tokens, completion_tokens, total_tokens, cost, passages, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(stored.id)
        .bind(&stored.namespace)
        .bind(&stored.model)
        .bind(stored.prompt_tokens)
        .bind(stored.completion_tokens)
        .bind(stored.total_tokens)
        .bind(stored.cost)
        .bind(stored.passages)
        .bind(stored.created_at)
        .execute(executor)
        .await
        .context("Failed to insert usage record")?;

        Ok(stored)
    }

    /// Most recent records first
    #[inline]
    pub async fn list_recent<'e, E: SqliteExecutor<'e>>(
        executor: E,
        limit: i64,
    ) -> Result<Vec<StoredUsage>> {
        let records = sqlx::query_as::<_, StoredUsage>(
            r#"
            SELECT id, namespace, model, prompt_tokens, completion_tokens, total_tokens,
                   cost, passages, created_at
            FROM usage_records
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(executor)
        .await
        .context("Failed to list usage records")?;

        Ok(records)
    }

    #[inline]
    pub async fn totals<'e, E: SqliteExecutor<'e>>(executor: E) -> Result<UsageTotals> {
        let totals = sqlx::query_as::<_, UsageTotals>(
            r#"
            SELECT NULL AS namespace,
                   COUNT(*) AS questions,
                   COALESCE(SUM(prompt_tokens), 0) AS prompt_tokens,
                   COALESCE(SUM(completion_tokens), 0) AS completion_tokens,
                   COALESCE(SUM(total_tokens), 0) AS total_tokens,
                   TOTAL(cost) AS cost
            FROM usage_records
            "#,
        )
        .fetch_one(executor)
        .await
        .context("Failed to total usage records")?;

        Ok(totals)
    }

    #[inline]
    pub async fn totals_by_namespace<'e, E: SqliteExecutor<'e>>(
        executor: E,
    ) -> Result<Vec<UsageTotals>> {
        let totals = sqlx::query_as::<_, UsageTotals>(
            r#"
            SELECT namespace,
                   COUNT(*) AS questions,
                   SUM(prompt_tokens) AS prompt_tokens,
                   SUM(completion_tokens) AS completion_tokens,
                   SUM(total_tokens) AS total_tokens,
                   TOTAL(cost) AS cost
            FROM usage_records
            GROUP BY namespace
            ORDER BY namespace
            "#,
        )
        .fetch_all(executor)
        .await
        .context("Failed to total usage records by namespace")?;

        Ok(totals)
    }
}
