//! The memory store: vector storage, similarity search, consolidation.
//!
//! [`MemoryStore`] is the seam the import pipeline talks through; the
//! Postgres implementation delegates straight to pgvector and owns no
//! pipeline state of its own.

use crate::db::Db;
use crate::error::Result;
use crate::memory::embedding::EmbeddingProvider;
use crate::model::memory::*;
use crate::telemetry::metrics;
use async_trait::async_trait;
use opentelemetry::KeyValue;

/// Advisory lock key guarding consolidation. Two passes never overlap,
/// even across processes sharing the database.
const CONSOLIDATE_LOCK_KEY: i64 = 0x6a61_7276_6973_0001;

/// Vector store for episodic memories.
///
/// `add` owns embedding generation, exactly as the backing engine's
/// embedding function would; callers hand over finished entries and
/// nothing else.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Store a batch of entries as one operation.
    async fn add(&self, entries: &[EpisodicMemoryEntry]) -> Result<()>;

    /// Search entries by similarity to `text`, most similar first.
    async fn query(
        &self,
        text: &str,
        filters: &MemoryFilters,
        limit: i64,
    ) -> Result<Vec<EpisodicMemoryEntry>>;

    /// Fetch entries by id. Unknown ids are silently absent.
    async fn get(&self, ids: &[String]) -> Result<Vec<EpisodicMemoryEntry>>;

    /// Merge near-duplicate entries, keeping the earliest-stored one of
    /// each group. Returns the number of entries merged away. When
    /// `short_only` is set, only short-term entries are merge candidates.
    async fn consolidate(&self, short_only: bool) -> Result<u64>;
}

/// Postgres + pgvector implementation.
pub struct PgMemoryStore {
    db: Db,
    embedder: Box<dyn EmbeddingProvider>,
    merge_threshold: f64,
}

impl PgMemoryStore {
    pub fn new(db: Db, embedder: Box<dyn EmbeddingProvider>, merge_threshold: f64) -> Self {
        Self {
            db,
            embedder,
            merge_threshold,
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

#[async_trait]
impl MemoryStore for PgMemoryStore {
    async fn add(&self, entries: &[EpisodicMemoryEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = entries.iter().map(|e| e.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut tx = self.db.pool().begin().await?;
        for (entry, embedding) in entries.iter().zip(embeddings.iter()) {
            sqlx::query(
                "INSERT INTO memories (id, content, speaker_role, talker, room_name,
                                       tier, source, server_id, metadata, event_at, embedding)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11::vector)",
            )
            .bind(&entry.id)
            .bind(&entry.content)
            .bind(entry.speaker_role.to_string())
            .bind(&entry.context.talker)
            .bind(&entry.context.room_name)
            .bind(entry.tier.to_string())
            .bind(&entry.source)
            .bind(&entry.server_id)
            .bind(&entry.metadata)
            .bind(entry.timestamp)
            .bind(format_vector(embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        metrics::memory_operations().add(1, &[KeyValue::new("operation", "add")]);
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        filters: &MemoryFilters,
        limit: i64,
    ) -> Result<Vec<EpisodicMemoryEntry>> {
        let embedding = self.embedder.embed(text).await?;

        let rows: Vec<MemoryRow> = sqlx::query_as(
            "SELECT id, content, speaker_role, talker, room_name, tier,
                    source, server_id, metadata, event_at
             FROM memories
             WHERE ($3::text IS NULL OR speaker_role = $3)
             AND ($4::text IS NULL OR talker = $4)
             AND ($5::text IS NULL OR room_name = $5)
             AND ($6::timestamptz IS NULL OR event_at >= $6)
             ORDER BY embedding <=> $1::vector
             LIMIT $2",
        )
        .bind(format_vector(&embedding))
        .bind(limit)
        .bind(filters.speaker_role.map(|r| r.to_string()))
        .bind(filters.talker.as_deref())
        .bind(filters.room_name.as_deref())
        .bind(filters.since)
        .fetch_all(self.db.pool())
        .await?;

        metrics::memory_operations().add(1, &[KeyValue::new("operation", "query")]);
        Ok(rows.into_iter().map(EpisodicMemoryEntry::from).collect())
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<EpisodicMemoryEntry>> {
        let rows: Vec<MemoryRow> = sqlx::query_as(
            "SELECT id, content, speaker_role, talker, room_name, tier,
                    source, server_id, metadata, event_at
             FROM memories
             WHERE id = ANY($1)
             ORDER BY event_at ASC",
        )
        .bind(ids)
        .fetch_all(self.db.pool())
        .await?;

        metrics::memory_operations().add(1, &[KeyValue::new("operation", "get")]);
        Ok(rows.into_iter().map(EpisodicMemoryEntry::from).collect())
    }

    async fn consolidate(&self, short_only: bool) -> Result<u64> {
        // Advisory locks are session-scoped: lock, merge, and unlock must
        // all run on the same connection.
        let mut conn = self.db.pool().acquire().await?;

        let (locked,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .bind(CONSOLIDATE_LOCK_KEY)
            .fetch_one(&mut *conn)
            .await?;
        if !locked {
            tracing::warn!("consolidation already running elsewhere, skipping");
            return Ok(0);
        }

        let max_distance = 1.0 - self.merge_threshold;
        let result = sqlx::query(
            "DELETE FROM memories d
             USING memories k
             WHERE d.id <> k.id
             AND (k.created_at, k.id) < (d.created_at, d.id)
             AND (k.embedding <=> d.embedding) < $1
             AND ($2 = false OR d.tier = 'short_term')",
        )
        .bind(max_distance)
        .bind(short_only)
        .execute(&mut *conn)
        .await;

        let _ = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(CONSOLIDATE_LOCK_KEY)
            .execute(&mut *conn)
            .await;

        let merged = result?.rows_affected();
        metrics::consolidation_merges().add(merged, &[]);
        metrics::memory_operations().add(1, &[KeyValue::new("operation", "consolidate")]);
        tracing::info!(merged, short_only, "consolidation pass complete");
        Ok(merged)
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct MemoryRow {
    id: String,
    content: String,
    speaker_role: String,
    talker: String,
    room_name: String,
    tier: String,
    source: Option<String>,
    server_id: Option<String>,
    metadata: serde_json::Value,
    event_at: chrono::DateTime<chrono::Utc>,
}

impl From<MemoryRow> for EpisodicMemoryEntry {
    fn from(row: MemoryRow) -> Self {
        Self {
            id: row.id,
            speaker_role: row.speaker_role.parse().unwrap_or(SpeakerRole::Other),
            content: row.content,
            context: MemoryContext {
                talker: row.talker,
                room_name: row.room_name,
            },
            timestamp: row.event_at,
            tier: row.tier.parse().unwrap_or(MemoryTier::LongTerm),
            source: row.source,
            server_id: row.server_id,
            metadata: row.metadata,
        }
    }
}

/// Format a f32 slice as a pgvector string literal: `"[0.1,0.2,0.3]"`
fn format_vector(v: &[f32]) -> String {
    let inner: Vec<String> = v.iter().map(|x| x.to_string()).collect();
    format!("[{}]", inner.join(","))
}
