//! Database schema for the knowledge-graph store (§4.4, §6)

use crate::error::Result;
use libsql::Connection;

/// Current schema version
/// v1: entities/observations/relations + FTS5 mirror + F32_BLOB entity embeddings
pub const SCHEMA_VERSION: i64 = 1;

fn schema_sql(embedding_dims: usize) -> String {
    format!(
        r#"
-- Entities (nodes in the knowledge graph)
CREATE TABLE IF NOT EXISTS entities (
    name TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    embedding F32_BLOB({embedding_dims}),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entities_created_at ON entities(created_at);

-- Observations (ordered facts attached to an entity)
CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_name TEXT NOT NULL REFERENCES entities(name) ON DELETE CASCADE,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_observations_entity ON observations(entity_name);

-- Relations (directed, typed edges between entities; a multiset, not deduped)
CREATE TABLE IF NOT EXISTS relations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL REFERENCES entities(name) ON DELETE CASCADE,
    target TEXT NOT NULL REFERENCES entities(name) ON DELETE CASCADE,
    relation_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_relations_source ON relations(source);
CREATE INDEX IF NOT EXISTS idx_relations_target ON relations(target);
CREATE INDEX IF NOT EXISTS idx_relations_source_target_type ON relations(source, target, relation_type);
CREATE INDEX IF NOT EXISTS idx_relations_type_source ON relations(relation_type, source);

-- Full-text mirror over observation content plus the owning entity's name,
-- so a name match and a content match can both surface from one query.
-- FTS5 tokenizer treats ':-_@./' as token characters and indexes prefixes
-- 2..7 so operators like 'tag:*' work as a prefix match.
CREATE VIRTUAL TABLE IF NOT EXISTS fts_observations USING fts5(
    entity_name,
    content,
    tokenize="unicode61 tokenchars ':-_@./'",
    prefix='2 3 4 5 6 7'
);

-- Bookkeeping: schema version, configured embedding dimension
CREATE TABLE IF NOT EXISTS index_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#
    )
}

// FTS5 doesn't support the ordinary trigger machinery SQLite documents for
// regular tables in every build; we mirror writes manually with DELETE+INSERT
// against fts_observations, always inside the same transaction as the base
// table write. backfill_fts covers observations written before the mirror
// existed (or before capability probing first ran).

/// Delete the FTS mirror row for one observation
pub async fn fts_delete(conn: &Connection, observation_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM fts_observations WHERE rowid = ?1",
        [observation_id],
    )
    .await?;
    Ok(())
}

/// Insert the FTS mirror row for one observation
pub async fn fts_insert(
    conn: &Connection,
    observation_id: i64,
    entity_name: &str,
    content: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO fts_observations(rowid, entity_name, content) VALUES (?1, ?2, ?3)",
        libsql::params![observation_id, entity_name, content],
    )
    .await?;
    Ok(())
}

/// Rebuild the FTS mirror from scratch against the current observations table
pub async fn backfill_fts(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM fts_observations", ()).await?;
    conn.execute(
        "INSERT INTO fts_observations(rowid, entity_name, content)
         SELECT id, entity_name, content FROM observations",
        (),
    )
    .await?;
    Ok(())
}

/// Ensure the database schema is up to date, creating it on first connect
pub async fn ensure_schema(conn: &Connection, embedding_dims: usize) -> Result<()> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='index_state'",
            (),
        )
        .await?;

    let table_exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i64>(0)? > 0
    } else {
        false
    };

    if !table_exists {
        conn.execute_batch(&schema_sql(embedding_dims)).await?;

        conn.execute(
            "INSERT INTO index_state (key, value) VALUES ('schema_version', ?1)",
            [SCHEMA_VERSION.to_string()],
        )
        .await?;

        conn.execute(
            "INSERT INTO index_state (key, value) VALUES ('embedding_dims', ?1)",
            [embedding_dims.to_string()],
        )
        .await?;

        tracing::info!(embedding_dims, "created knowledge-graph schema version {SCHEMA_VERSION}");
    } else {
        reconcile_embedding_dims(conn, embedding_dims).await?;

        let mut rows = conn
            .query(
                "SELECT CAST(value AS INTEGER) FROM index_state WHERE key = 'schema_version'",
                (),
            )
            .await?;

        let version: i64 = if let Some(row) = rows.next().await? {
            row.get(0)?
        } else {
            0
        };

        if version < SCHEMA_VERSION {
            migrate(conn, version).await?;
        }
    }

    Ok(())
}

/// Recover the store's intrinsic embedding dimension, if recorded (§4.1
/// dimension reconciliation). `None` means a freshly created database that
/// has not recorded one yet.
pub async fn stored_embedding_dims(conn: &Connection) -> Result<Option<usize>> {
    let mut rows = conn
        .query(
            "SELECT value FROM index_state WHERE key = 'embedding_dims'",
            (),
        )
        .await?;

    Ok(if let Some(row) = rows.next().await? {
        row.get::<String>(0)?.parse().ok()
    } else {
        None
    })
}

/// Confirm the store's recorded embedding dimension matches the configured
/// one, adopting the stored value as authoritative on mismatch (§4.1, §9)
async fn reconcile_embedding_dims(conn: &Connection, embedding_dims: usize) -> Result<()> {
    if let Some(stored) = stored_embedding_dims(conn).await? {
        if stored != embedding_dims {
            return Err(crate::Error::EmbeddingDimsMismatch {
                provider: embedding_dims,
                store: stored,
            });
        }
    }
    Ok(())
}

async fn migrate(conn: &Connection, from_version: i64) -> Result<()> {
    tracing::info!(from_version, to_version = SCHEMA_VERSION, "migrating schema");

    conn.execute(
        "UPDATE index_state SET value = ?1 WHERE key = 'schema_version'",
        [SCHEMA_VERSION.to_string()],
    )
    .await?;

    Ok(())
}

/// Ensure the native vector index exists, created lazily once at least one
/// embedding is present so libsql can infer dimensions from real data.
pub async fn ensure_vector_index(conn: &Connection) -> Result<bool> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_entities_vector'",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i64>(0)? > 0
    } else {
        false
    };

    if exists {
        return Ok(false);
    }

    let mut rows = conn
        .query("SELECT COUNT(*) FROM entities WHERE embedding IS NOT NULL", ())
        .await?;

    let count: i64 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    if count == 0 {
        return Ok(false);
    }

    let result = conn
        .execute(
            "CREATE INDEX IF NOT EXISTS idx_entities_vector
                ON entities(libsql_vector_idx(embedding, 'metric=cosine', 'compress_neighbors=float8', 'max_neighbors=32'))",
            (),
        )
        .await;

    match result {
        Ok(_) => {
            tracing::info!(count, "created vector index for native semantic search");
            Ok(true)
        }
        Err(e) => {
            tracing::debug!(error = %e, "vector index creation skipped");
            Ok(false)
        }
    }
}

/// Check whether the native vector index is present and usable
pub async fn has_vector_index(conn: &Connection) -> bool {
    let rows = conn
        .query(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_entities_vector'",
            (),
        )
        .await;

    match rows {
        Ok(mut rows) => {
            if let Ok(Some(row)) = rows.next().await {
                row.get::<i64>(0).unwrap_or(0) > 0
            } else {
                false
            }
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn memory_conn() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test]
    async fn test_schema_creation() {
        let conn = memory_conn().await;
        ensure_schema(&conn, 384).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
                (),
            )
            .await
            .unwrap();

        let mut tables = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            tables.push(row.get::<String>(0).unwrap());
        }

        assert!(tables.contains(&"entities".to_string()));
        assert!(tables.contains(&"observations".to_string()));
        assert!(tables.contains(&"relations".to_string()));
        assert!(tables.contains(&"index_state".to_string()));
    }

    #[tokio::test]
    async fn test_idempotent_schema() {
        let conn = memory_conn().await;
        ensure_schema(&conn, 384).await.unwrap();
        ensure_schema(&conn, 384).await.unwrap();
        ensure_schema(&conn, 384).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT CAST(value AS INTEGER) FROM index_state WHERE key = 'schema_version'",
                (),
            )
            .await
            .unwrap();

        let version: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_dims_mismatch_rejected() {
        let conn = memory_conn().await;
        ensure_schema(&conn, 384).await.unwrap();

        let err = ensure_schema(&conn, 768).await.unwrap_err();
        assert_eq!(err.code(), "EMBEDDING_DIMS_MISMATCH");
    }

    #[tokio::test]
    async fn test_fts_mirror_round_trip() {
        let conn = memory_conn().await;
        ensure_schema(&conn, 384).await.unwrap();

        conn.execute(
            "INSERT INTO entities (name, entity_type, created_at) VALUES ('alice', 'person', '2026-01-01')",
            (),
        )
        .await
        .unwrap();

        conn.execute(
            "INSERT INTO observations (id, entity_name, content, created_at) VALUES (1, 'alice', 'likes rust', '2026-01-01')",
            (),
        )
        .await
        .unwrap();

        fts_insert(&conn, 1, "alice", "likes rust").await.unwrap();

        let mut rows = conn
            .query(
                "SELECT rowid FROM fts_observations WHERE fts_observations MATCH 'rust'",
                (),
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap();
        assert!(row.is_some());

        fts_delete(&conn, 1).await.unwrap();
        let mut rows = conn
            .query(
                "SELECT rowid FROM fts_observations WHERE fts_observations MATCH 'rust'",
                (),
            )
            .await
            .unwrap();
        assert!(rows.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backfill_fts() {
        let conn = memory_conn().await;
        ensure_schema(&conn, 384).await.unwrap();

        conn.execute(
            "INSERT INTO entities (name, entity_type, created_at) VALUES ('alice', 'person', '2026-01-01')",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO observations (id, entity_name, content, created_at) VALUES (1, 'alice', 'likes rust', '2026-01-01')",
            (),
        )
        .await
        .unwrap();

        backfill_fts(&conn).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT rowid FROM fts_observations WHERE fts_observations MATCH 'rust'",
                (),
            )
            .await
            .unwrap();
        assert!(rows.next().await.unwrap().is_some());
    }
}
