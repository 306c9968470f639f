//! Search Engine (§4.5): text (FTS5 or LIKE fallback), vector (native ANN or
//! exact scan), and hybrid fusion of the two via Reciprocal Rank Fusion.

use std::collections::HashMap;

use graphmem_providers::EmbeddingProvider;
use libsql::{params, Connection};

use crate::config::{Bm25Config, HybridConfig};
use crate::error::Result;
use crate::manager::Capabilities;
use crate::metrics::MetricsRecorder;
use crate::store::{self, embedding, Entity, Relation};

/// A search query, already resolved from the polymorphic wire value into a
/// typed enum at the tool-service boundary (§4.5).
#[derive(Debug, Clone)]
pub enum Query {
    Text(String),
    Vector(Vec<f32>),
}

/// Everything the search engine needs beyond the connection and the query
/// itself; bundled so call sites don't thread five separate references.
pub struct SearchContext<'a> {
    pub caps: &'a Capabilities,
    pub bm25: &'a Bm25Config,
    pub hybrid: &'a HybridConfig,
    pub embedding_dims: usize,
    pub provider: Option<&'a (dyn EmbeddingProvider + Send + Sync)>,
    pub recorder: &'a dyn MetricsRecorder,
}

/// Run a search and return the matching entities plus every relation that
/// touches one of them (§4.5 result contract: never null, always initialized).
pub async fn search(
    conn: &Connection,
    ctx: &SearchContext<'_>,
    query: &Query,
    limit: usize,
    offset: usize,
) -> Result<(Vec<Entity>, Vec<Relation>)> {
    let names = match query {
        Query::Text(text) if ctx.hybrid.enabled => hybrid_search(conn, ctx, text, limit, offset).await?,
        Query::Text(text) => text_rank(conn, ctx.caps, ctx.bm25, ctx.recorder, text, limit, offset).await?,
        Query::Vector(vector) => vector_rank(conn, ctx.caps, ctx.recorder, vector, limit, offset).await?,
    };

    let entities = store::get_entities(conn, &names).await?;
    let ordered = reorder_entities(entities, &names);
    let relations = store::relations_touching(conn, &names).await?;
    Ok((ordered, relations))
}

fn reorder_entities(entities: Vec<Entity>, names: &[String]) -> Vec<Entity> {
    let mut by_name: HashMap<String, Entity> = entities.into_iter().map(|e| (e.name.clone(), e)).collect();
    names.iter().filter_map(|n| by_name.remove(n)).collect()
}

// ---------------------------------------------------------------------
// Text path
// ---------------------------------------------------------------------

async fn text_rank(
    conn: &Connection,
    caps: &Capabilities,
    bm25: &Bm25Config,
    recorder: &dyn MetricsRecorder,
    query: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<String>> {
    if !caps.fts(conn).await {
        return like_fallback(conn, query, limit, offset).await;
    }

    let fts_query = sanitize_fts_query(query);
    if fts_query.is_empty() {
        return Ok(Vec::new());
    }

    let matched = if bm25.enabled {
        bm25_query(conn, &fts_query, limit, offset).await
    } else {
        name_ordered_query(conn, &fts_query, limit, offset).await
    };

    match matched {
        Ok(names) => Ok(names),
        Err(e) => {
            caps.downgrade_fts();
            recorder.record_capability_downgrade("fts", &e.to_string());
            like_fallback(conn, query, limit, offset).await
        }
    }
}

/// Rank candidates for hybrid fusion: a wide, unpaginated slice starting at
/// rank 1, the `k=limit+offset` fetch the hybrid path fuses over (§4.5).
async fn text_rank_candidates(
    conn: &Connection,
    caps: &Capabilities,
    bm25: &Bm25Config,
    recorder: &dyn MetricsRecorder,
    query: &str,
    k: usize,
) -> Result<Vec<String>> {
    text_rank(conn, caps, bm25, recorder, query, k, 0).await
}

async fn bm25_query(conn: &Connection, fts_query: &str, limit: usize, offset: usize) -> Result<Vec<String>> {
    let mut rows = conn
        .query(
            "SELECT entity_name, MIN(bm25(fts_observations)) as score
             FROM fts_observations
             WHERE fts_observations MATCH ?1
             GROUP BY entity_name
             ORDER BY score ASC
             LIMIT ?2 OFFSET ?3",
            params![fts_query.to_string(), limit as i64, offset as i64],
        )
        .await?;

    let mut names = Vec::new();
    while let Some(row) = rows.next().await? {
        names.push(row.get::<String>(0)?);
    }
    Ok(names)
}

async fn name_ordered_query(conn: &Connection, fts_query: &str, limit: usize, offset: usize) -> Result<Vec<String>> {
    let mut rows = conn
        .query(
            "SELECT DISTINCT entity_name
             FROM fts_observations
             WHERE fts_observations MATCH ?1
             ORDER BY entity_name ASC
             LIMIT ?2 OFFSET ?3",
            params![fts_query.to_string(), limit as i64, offset as i64],
        )
        .await?;

    let mut names = Vec::new();
    while let Some(row) = rows.next().await? {
        names.push(row.get::<String>(0)?);
    }
    Ok(names)
}

async fn like_fallback(conn: &Connection, query: &str, limit: usize, offset: usize) -> Result<Vec<String>> {
    let pattern = like_pattern(query);
    if pattern.is_empty() {
        return Ok(Vec::new());
    }

    let mut rows = conn
        .query(
            "SELECT DISTINCT e.name
             FROM entities e
             LEFT JOIN observations o ON o.entity_name = e.name
             WHERE e.name LIKE ?1 OR e.entity_type LIKE ?1 OR o.content LIKE ?1
             ORDER BY e.name ASC
             LIMIT ?2 OFFSET ?3",
            params![pattern, limit as i64, offset as i64],
        )
        .await?;

    let mut names = Vec::new();
    while let Some(row) = rows.next().await? {
        names.push(row.get::<String>(0)?);
    }
    Ok(names)
}

/// Convert `*` wildcards to SQL `%`; a pattern with no wildcard at all
/// becomes a substring match, matching the teacher's permissive LIKE fallback.
fn like_pattern(query: &str) -> String {
    let query = query.trim();
    if query.is_empty() {
        return String::new();
    }
    let converted = query.replace('*', "%");
    if converted.contains('%') {
        converted
    } else {
        format!("%{converted}%")
    }
}

/// Characters FTS5's tokenizer treats as part of a token (schema.rs)
fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || ":-_@./".contains(c)
}

fn clean_term(term: &str) -> String {
    term.chars().filter(|c| is_token_char(*c)).collect()
}

/// Build the column-filter rewrite for a single token ending in `:*`
/// (§4.5): `tag:*` becomes `entity_name:"tag:"* OR content:"tag:"*`.
fn column_prefix_query(term: &str) -> Option<String> {
    let prefix = term.strip_suffix(":*")?;
    let clean = clean_term(prefix);
    if clean.is_empty() {
        return None;
    }
    Some(format!(
        "entity_name:\"{clean}:\"* OR content:\"{clean}:\"*"
    ))
}

/// Sanitize a query string for FTS5 MATCH, adding prefix matching per term
/// and special-casing the single-token `tag:*` column filter (§4.5).
fn sanitize_fts_query(query: &str) -> String {
    let query = query.trim();
    if query.is_empty() {
        return String::new();
    }

    let terms: Vec<&str> = query.split_whitespace().filter(|t| !t.is_empty()).collect();
    if terms.is_empty() {
        return String::new();
    }

    if terms.len() == 1 {
        if let Some(rewrite) = column_prefix_query(terms[0]) {
            return rewrite;
        }
    }

    let parts: Vec<String> = terms
        .iter()
        .filter_map(|term| {
            let stripped = term.trim_end_matches('*');
            let clean = clean_term(stripped);
            if clean.is_empty() {
                None
            } else {
                Some(format!("\"{clean}\"*"))
            }
        })
        .collect();

    if parts.is_empty() {
        return String::new();
    }

    parts.join(" AND ")
}

/// Normalize FTS5's BM25 score (negative, lower is better) to 0..1 where
/// higher is better. Kept for callers that want a user-facing relevance
/// number; ranking itself sorts on the raw BM25 value.
#[allow(dead_code)]
pub fn normalize_bm25_score(bm25_score: f64) -> f64 {
    1.0 / (1.0 + bm25_score.abs())
}

// ---------------------------------------------------------------------
// Vector path
// ---------------------------------------------------------------------

fn vector_literal(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

async fn vector_rank(
    conn: &Connection,
    caps: &Capabilities,
    recorder: &dyn MetricsRecorder,
    vector: &[f32],
    limit: usize,
    offset: usize,
) -> Result<Vec<String>> {
    if embedding::is_zero_vector(vector) {
        return Ok(Vec::new());
    }

    if caps.vector_search(conn).await {
        match vector_top_k_query(conn, vector, limit, offset).await {
            Ok(names) => return Ok(names),
            Err(e) => {
                caps.downgrade_vector();
                recorder.record_capability_downgrade("vector", &e.to_string());
            }
        }
    }

    exact_scan_query(conn, vector, limit, offset).await
}

async fn vector_rank_candidates(
    conn: &Connection,
    caps: &Capabilities,
    recorder: &dyn MetricsRecorder,
    vector: &[f32],
    k: usize,
) -> Result<Vec<String>> {
    vector_rank(conn, caps, recorder, vector, k, 0).await
}

async fn vector_top_k_query(conn: &Connection, vector: &[f32], limit: usize, offset: usize) -> Result<Vec<String>> {
    let literal = vector_literal(vector);
    let k = (limit + offset).max(1) as i64;

    let mut rows = conn
        .query(
            "WITH candidates AS (
                 SELECT id, distance FROM vector_top_k('idx_entities_vector', vector(?1), ?2)
             )
             SELECT e.name
             FROM candidates c
             JOIN entities e ON e.rowid = c.id
             WHERE e.embedding IS NOT NULL
             ORDER BY c.distance ASC
             LIMIT ?3 OFFSET ?4",
            params![literal, k, limit as i64, offset as i64],
        )
        .await?;

    let mut names = Vec::new();
    while let Some(row) = rows.next().await? {
        names.push(row.get::<String>(0)?);
    }
    Ok(names)
}

async fn exact_scan_query(conn: &Connection, vector: &[f32], limit: usize, offset: usize) -> Result<Vec<String>> {
    let literal = vector_literal(vector);

    let mut rows = conn
        .query(
            "SELECT name FROM entities
             WHERE embedding IS NOT NULL
             ORDER BY vector_distance_cos(embedding, vector(?1)) ASC
             LIMIT ?2 OFFSET ?3",
            params![literal, limit as i64, offset as i64],
        )
        .await?;

    let mut names = Vec::new();
    while let Some(row) = rows.next().await? {
        names.push(row.get::<String>(0)?);
    }
    Ok(names)
}

// ---------------------------------------------------------------------
// Hybrid path
// ---------------------------------------------------------------------

async fn hybrid_search(
    conn: &Connection,
    ctx: &SearchContext<'_>,
    text: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<String>> {
    let k = limit + offset;
    let text_ranked = text_rank_candidates(conn, ctx.caps, ctx.bm25, ctx.recorder, text, k).await?;

    let vector_ranked = fetch_vector_candidates(conn, ctx, text, k).await;

    if vector_ranked.is_empty() {
        return Ok(text_ranked.into_iter().skip(offset).take(limit).collect());
    }

    let fused = reciprocal_rank_fusion(&text_ranked, &vector_ranked, ctx.hybrid);
    Ok(fused.into_iter().skip(offset).take(limit).collect())
}

async fn fetch_vector_candidates(
    conn: &Connection,
    ctx: &SearchContext<'_>,
    text: &str,
    k: usize,
) -> Vec<String> {
    let Some(provider) = ctx.provider else {
        return Vec::new();
    };
    if provider.dimensions() != ctx.embedding_dims {
        return Vec::new();
    }

    let Ok(mut vectors) = provider.embed(&[text.to_string()]).await else {
        return Vec::new();
    };
    let Some(vector) = vectors.pop() else {
        return Vec::new();
    };

    vector_rank_candidates(conn, ctx.caps, ctx.recorder, &vector, k)
        .await
        .unwrap_or_default()
}

/// Weighted Reciprocal Rank Fusion, stable by insertion order on ties (§4.5).
fn reciprocal_rank_fusion(text_ranked: &[String], vector_ranked: &[String], hybrid: &HybridConfig) -> Vec<String> {
    let mut scores: HashMap<&str, f64> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for (i, name) in text_ranked.iter().enumerate() {
        let rank = (i + 1) as f64;
        if !scores.contains_key(name.as_str()) {
            order.push(name.as_str());
        }
        *scores.entry(name.as_str()).or_insert(0.0) += hybrid.text_weight / (hybrid.rrf_k + rank);
    }
    for (i, name) in vector_ranked.iter().enumerate() {
        let rank = (i + 1) as f64;
        if !scores.contains_key(name.as_str()) {
            order.push(name.as_str());
        }
        *scores.entry(name.as_str()).or_insert(0.0) += hybrid.vector_weight / (hybrid.rrf_k + rank);
    }

    order.sort_by(|a, b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.into_iter().map(|s| s.to_string()).collect()
}
