//! Entity/Observation/Relation Store (§4.4)
//!
//! Every multi-statement operation here runs between `BEGIN`/`COMMIT` and
//! rolls back as a unit on the first error, per §7's propagation policy.

pub mod embedding;
pub mod types;

use libsql::{params, Connection};

use crate::error::{Error, Result};
use crate::manager::schema;
pub use types::{
    EntityInput, EntityUpdate, ObservationUpdate, Relation, RelationChange, RelationInput,
    MAX_BOUND_VARIABLES,
};
pub use types::{Entity, Observation};

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{field} must not be empty")));
    }
    Ok(())
}

fn chunks<T>(items: &[T], size: usize) -> impl Iterator<Item = &[T]> {
    items.chunks(size.max(1))
}

fn in_clause(count: usize) -> String {
    std::iter::repeat("?")
        .take(count)
        .collect::<Vec<_>>()
        .join(",")
}

async fn begin(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN", ()).await?;
    Ok(())
}

async fn commit(conn: &Connection) -> Result<()> {
    conn.execute("COMMIT", ()).await?;
    Ok(())
}

async fn rollback(conn: &Connection) {
    let _ = conn.execute("ROLLBACK", ()).await;
}

/// Create or replace entities in a batch. Each entity is a separate
/// transaction: re-running `create_entities` for an existing name is a
/// deliberate *replace* of its observations, distinct from `add_observations`.
pub async fn create_entities(conn: &Connection, batch: &[EntityInput]) -> Result<usize> {
    let mut created = 0;
    for entity in batch {
        require_non_empty("entity name", &entity.name)?;
        require_non_empty("entity type", &entity.entity_type)?;
        if entity.observations.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "entity '{}' must have at least one observation",
                entity.name
            )));
        }

        begin(conn).await?;
        if let Err(e) = upsert_entity(conn, entity).await {
            rollback(conn).await;
            return Err(e);
        }
        commit(conn).await?;
        created += 1;
    }
    Ok(created)
}

async fn upsert_entity(conn: &Connection, entity: &EntityInput) -> Result<()> {
    let embedding_bytes = entity
        .embedding
        .as_ref()
        .filter(|v| !embedding::is_zero_vector(v))
        .map(|v| embedding::embedding_to_bytes(v));

    let rows = conn
        .execute(
            "UPDATE entities SET entity_type = ?1, embedding = ?2 WHERE name = ?3",
            params![
                entity.entity_type.clone(),
                embedding_bytes.clone(),
                entity.name.clone()
            ],
        )
        .await?;

    if rows == 0 {
        conn.execute(
            "INSERT INTO entities (name, entity_type, embedding, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                entity.name.clone(),
                entity.entity_type.clone(),
                embedding_bytes,
                now()
            ],
        )
        .await?;
    }

    replace_observations(conn, &entity.name, &entity.observations).await?;
    Ok(())
}

/// Clear all observations for an entity, then insert the given ones in order
async fn replace_observations(conn: &Connection, entity_name: &str, observations: &[String]) -> Result<()> {
    let mut rows = conn
        .query(
            "SELECT id FROM observations WHERE entity_name = ?1",
            [entity_name],
        )
        .await?;
    let mut old_ids = Vec::new();
    while let Some(row) = rows.next().await? {
        old_ids.push(row.get::<i64>(0)?);
    }
    for id in &old_ids {
        schema::fts_delete(conn, *id).await?;
    }
    conn.execute(
        "DELETE FROM observations WHERE entity_name = ?1",
        [entity_name],
    )
    .await?;

    append_observations(conn, entity_name, observations).await
}

/// Append observations after whatever is already present, preserving order
async fn append_observations(conn: &Connection, entity_name: &str, observations: &[String]) -> Result<()> {
    for content in observations {
        require_non_empty("observation", content)?;
        conn.execute(
            "INSERT INTO observations (entity_name, content, created_at) VALUES (?1, ?2, ?3)",
            params![entity_name, content.clone(), now()],
        )
        .await?;
        let id = conn.last_insert_rowid();
        schema::fts_insert(conn, id, entity_name, content).await?;
    }
    Ok(())
}

/// Append observations to an existing entity (§4.4)
pub async fn add_observations(conn: &Connection, entity_name: &str, observations: &[String]) -> Result<usize> {
    if !entity_exists(conn, entity_name).await? {
        return Err(Error::NotFound(format!("entity '{entity_name}' not found")));
    }
    begin(conn).await?;
    if let Err(e) = append_observations(conn, entity_name, observations).await {
        rollback(conn).await;
        return Err(e);
    }
    commit(conn).await?;
    Ok(observations.len())
}

/// Update entity type, embedding, and/or observations (§4.4, §8)
pub async fn update_entities(conn: &Connection, updates: &[EntityUpdate]) -> Result<usize> {
    let mut updated = 0;
    for spec in updates {
        if !entity_exists(conn, &spec.name).await? {
            return Err(Error::NotFound(format!("entity '{}' not found", spec.name)));
        }

        begin(conn).await?;
        if let Err(e) = apply_update(conn, spec).await {
            rollback(conn).await;
            return Err(e);
        }
        commit(conn).await?;
        updated += 1;
    }
    Ok(updated)
}

async fn apply_update(conn: &Connection, spec: &EntityUpdate) -> Result<()> {
    if let Some(entity_type) = &spec.entity_type {
        conn.execute(
            "UPDATE entities SET entity_type = ?1 WHERE name = ?2",
            params![entity_type.clone(), spec.name.clone()],
        )
        .await?;
    }
    if let Some(embedding) = &spec.embedding {
        let bytes = if embedding::is_zero_vector(embedding) {
            None
        } else {
            Some(embedding::embedding_to_bytes(embedding))
        };
        conn.execute(
            "UPDATE entities SET embedding = ?1 WHERE name = ?2",
            params![bytes, spec.name.clone()],
        )
        .await?;
    }

    match &spec.observations {
        Some(ObservationUpdate::Replace(obs)) => {
            replace_observations(conn, &spec.name, obs).await?;
        }
        Some(ObservationUpdate::Merge(obs)) => {
            append_observations(conn, &spec.name, obs).await?;
        }
        None => {}
    }

    Ok(())
}

async fn entity_exists(conn: &Connection, name: &str) -> Result<bool> {
    let mut rows = conn
        .query("SELECT 1 FROM entities WHERE name = ?1", [name])
        .await?;
    Ok(rows.next().await?.is_some())
}

async fn load_observations(conn: &Connection, entity_name: &str) -> Result<Vec<Observation>> {
    let mut rows = conn
        .query(
            "SELECT id, content, created_at FROM observations WHERE entity_name = ?1 ORDER BY id ASC",
            [entity_name],
        )
        .await?;
    let mut observations = Vec::new();
    while let Some(row) = rows.next().await? {
        observations.push(Observation {
            id: row.get(0)?,
            content: row.get(1)?,
            created_at: row.get(2)?,
        });
    }
    Ok(observations)
}

fn decode_embedding(bytes: Option<Vec<u8>>) -> Option<Vec<f32>> {
    bytes.map(|b| embedding::bytes_to_embedding(&b))
}

/// Load one entity with its observations and decoded embedding (§4.4)
pub async fn get_entity(conn: &Connection, name: &str) -> Result<Entity> {
    let mut rows = conn
        .query(
            "SELECT name, entity_type, embedding, created_at FROM entities WHERE name = ?1",
            [name],
        )
        .await?;

    let row = rows
        .next()
        .await?
        .ok_or_else(|| Error::NotFound(format!("entity '{name}' not found")))?;

    let entity = Entity {
        name: row.get(0)?,
        entity_type: row.get(1)?,
        embedding: decode_embedding(row.get::<Option<Vec<u8>>>(2)?),
        created_at: row.get(3)?,
        observations: load_observations(conn, name).await?,
    };
    Ok(entity)
}

/// Load many entities by name, skipping any that don't exist (§4.4)
pub async fn get_entities(conn: &Connection, names: &[String]) -> Result<Vec<Entity>> {
    let mut out = Vec::new();
    for chunk in chunks(names, MAX_BOUND_VARIABLES) {
        let sql = format!(
            "SELECT name, entity_type, embedding, created_at FROM entities WHERE name IN ({})",
            in_clause(chunk.len())
        );
        let bound: Vec<libsql::Value> = chunk.iter().map(|n| n.clone().into()).collect();
        let mut rows = conn.query(&sql, bound).await?;
        let mut partial = Vec::new();
        while let Some(row) = rows.next().await? {
            let name: String = row.get(0)?;
            let entity_type: String = row.get(1)?;
            let embedding_bytes: Option<Vec<u8>> = row.get(2)?;
            let created_at: String = row.get(3)?;
            partial.push((name, entity_type, embedding_bytes, created_at));
        }
        for (name, entity_type, embedding_bytes, created_at) in partial {
            let observations = load_observations(conn, &name).await?;
            out.push(Entity {
                name,
                entity_type,
                embedding: decode_embedding(embedding_bytes),
                created_at,
                observations,
            });
        }
    }
    Ok(out)
}

/// Read every entity, newest first, bounded by `limit` (§6 `read_graph`)
pub async fn read_graph(conn: &Connection, limit: usize) -> Result<(Vec<Entity>, Vec<Relation>)> {
    let mut rows = conn
        .query(
            "SELECT name FROM entities ORDER BY created_at DESC, name DESC LIMIT ?1",
            [limit as i64],
        )
        .await?;
    let mut names = Vec::new();
    while let Some(row) = rows.next().await? {
        names.push(row.get::<String>(0)?);
    }
    let entities = get_entities(conn, &names).await?;
    let relations = relations_touching(conn, &names).await?;
    Ok((entities, relations))
}

/// Create relations in a batch, rejecting any whose endpoints don't exist (§4.4)
pub async fn create_relations(conn: &Connection, relations: &[RelationInput]) -> Result<usize> {
    begin(conn).await?;
    if let Err(e) = create_relations_inner(conn, relations).await {
        rollback(conn).await;
        return Err(e);
    }
    commit(conn).await?;
    Ok(relations.len())
}

async fn create_relations_inner(conn: &Connection, relations: &[RelationInput]) -> Result<()> {
    for rel in relations {
        require_non_empty("relation source", &rel.source)?;
        require_non_empty("relation target", &rel.target)?;
        require_non_empty("relation type", &rel.relation_type)?;
        ensure_entity_exists(conn, &rel.source).await?;
        ensure_entity_exists(conn, &rel.target).await?;

        conn.execute(
            "INSERT INTO relations (source, target, relation_type, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![rel.source.clone(), rel.target.clone(), rel.relation_type.clone(), now()],
        )
        .await?;
    }
    Ok(())
}

async fn ensure_entity_exists(conn: &Connection, name: &str) -> Result<()> {
    let mut rows = conn.query("SELECT 1 FROM entities WHERE name = ?1", [name]).await?;
    if rows.next().await?.is_none() {
        return Err(Error::NotFound(format!("entity '{name}' not found")));
    }
    Ok(())
}

/// Delete every relation matching any of the given tuples; relations are a
/// multiset, so a tuple with duplicates removes all matching rows (§3, §4.4)
pub async fn delete_relations(conn: &Connection, relations: &[RelationInput]) -> Result<usize> {
    begin(conn).await?;
    let mut deleted = 0;
    for rel in relations {
        let affected = conn
            .execute(
                "DELETE FROM relations WHERE source = ?1 AND target = ?2 AND relation_type = ?3",
                params![rel.source.clone(), rel.target.clone(), rel.relation_type.clone()],
            )
            .await;
        match affected {
            Ok(n) => deleted += n as usize,
            Err(e) => {
                rollback(conn).await;
                return Err(e.into());
            }
        }
    }
    commit(conn).await?;
    Ok(deleted)
}

/// Repoint, retype, or both, a set of relation tuples (§4.4, §8 scenario 4)
pub async fn update_relations(conn: &Connection, changes: &[RelationChange]) -> Result<usize> {
    begin(conn).await?;
    if let Err(e) = update_relations_inner(conn, changes).await {
        rollback(conn).await;
        return Err(e);
    }
    commit(conn).await?;
    Ok(changes.len())
}

async fn update_relations_inner(conn: &Connection, changes: &[RelationChange]) -> Result<()> {
    for change in changes {
        let resolved = change.resolved();
        ensure_entity_exists(conn, &resolved.source).await?;
        ensure_entity_exists(conn, &resolved.target).await?;

        let mut rows = conn
            .query(
                "SELECT id FROM relations WHERE source = ?1 AND target = ?2 AND relation_type = ?3 LIMIT 1",
                params![change.source.clone(), change.target.clone(), change.relation_type.clone()],
            )
            .await?;
        let id: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => {
                return Err(Error::NotFound(format!(
                    "relation {}->{}:{} not found",
                    change.source, change.target, change.relation_type
                )))
            }
        };

        conn.execute("DELETE FROM relations WHERE id = ?1", [id]).await?;
        conn.execute(
            "INSERT INTO relations (source, target, relation_type, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![resolved.source, resolved.target, resolved.relation_type, now()],
        )
        .await?;
    }
    Ok(())
}

/// Delete one entity; cascades to its observations and relations via FK (§4.4)
pub async fn delete_entity(conn: &Connection, name: &str) -> Result<()> {
    let affected = conn.execute("DELETE FROM entities WHERE name = ?1", [name]).await?;
    if affected == 0 {
        return Err(Error::NotFound(format!("entity '{name}' not found")));
    }
    Ok(())
}

/// Bulk-delete entities, chunked to respect the bound-variable limit (§4.4)
pub async fn delete_entities(conn: &Connection, names: &[String]) -> Result<usize> {
    let mut deleted = 0;
    for chunk in chunks(names, MAX_BOUND_VARIABLES) {
        let sql = format!(
            "DELETE FROM entities WHERE name IN ({})",
            in_clause(chunk.len())
        );
        let bound: Vec<libsql::Value> = chunk.iter().map(|n| n.clone().into()).collect();
        deleted += conn.execute(&sql, bound).await? as usize;
    }
    Ok(deleted)
}

/// Delete observations for an entity by id, by content, or all of them when
/// both selector arrays are empty (§4.4, §9 content-delete fallback)
pub async fn delete_observations(
    conn: &Connection,
    entity_name: &str,
    ids: &[i64],
    contents: &[String],
) -> Result<usize> {
    begin(conn).await?;
    let result = delete_observations_inner(conn, entity_name, ids, contents).await;
    match result {
        Ok(count) => {
            commit(conn).await?;
            Ok(count)
        }
        Err(e) => {
            rollback(conn).await;
            Err(e)
        }
    }
}

async fn delete_observations_inner(
    conn: &Connection,
    entity_name: &str,
    ids: &[i64],
    contents: &[String],
) -> Result<usize> {
    if ids.is_empty() && contents.is_empty() {
        let mut rows = conn
            .query(
                "SELECT id FROM observations WHERE entity_name = ?1",
                [entity_name],
            )
            .await?;
        let mut all_ids = Vec::new();
        while let Some(row) = rows.next().await? {
            all_ids.push(row.get::<i64>(0)?);
        }
        return delete_observation_ids(conn, entity_name, &all_ids).await;
    }

    let mut deleted = 0;
    if !ids.is_empty() {
        deleted += delete_observation_ids(conn, entity_name, ids).await?;
    }
    if !contents.is_empty() {
        deleted += delete_observations_by_content(conn, entity_name, contents).await?;
    }
    Ok(deleted)
}

async fn delete_observation_ids(conn: &Connection, entity_name: &str, ids: &[i64]) -> Result<usize> {
    let mut deleted = 0;
    for chunk in chunks(ids, MAX_BOUND_VARIABLES) {
        for id in chunk {
            schema::fts_delete(conn, *id).await?;
        }
        let sql = format!(
            "DELETE FROM observations WHERE entity_name = ?1 AND id IN ({})",
            in_clause(chunk.len())
        );
        let mut bound: Vec<libsql::Value> = vec![entity_name.to_string().into()];
        bound.extend(chunk.iter().map(|id| (*id).into()));
        deleted += conn.execute(&sql, bound).await? as usize;
    }
    Ok(deleted)
}

/// Delete by content text; if the bulk form fails, resolve matching ids first
/// and delete by id instead, preserving the committed row count (§9)
async fn delete_observations_by_content(
    conn: &Connection,
    entity_name: &str,
    contents: &[String],
) -> Result<usize> {
    let mut deleted = 0;
    for chunk in chunks(contents, MAX_BOUND_VARIABLES) {
        let select_sql = format!(
            "SELECT id FROM observations WHERE entity_name = ?1 AND content IN ({})",
            in_clause(chunk.len())
        );
        let mut bound: Vec<libsql::Value> = vec![entity_name.to_string().into()];
        bound.extend(chunk.iter().map(|c| c.clone().into()));

        let matched = conn.query(&select_sql, bound).await;
        let ids: Vec<i64> = match matched {
            Ok(mut rows) => {
                let mut ids = Vec::new();
                while let Some(row) = rows.next().await? {
                    ids.push(row.get::<i64>(0)?);
                }
                ids
            }
            Err(_) => Vec::new(),
        };
        deleted += delete_observation_ids(conn, entity_name, &ids).await?;
    }
    Ok(deleted)
}

/// All relations whose source or target is in the given name set, used to
/// fill out the `relations` half of every `{entities, relations}` result (§4.5, §4.6)
pub async fn relations_touching(conn: &Connection, names: &[String]) -> Result<Vec<Relation>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for chunk in chunks(names, MAX_BOUND_VARIABLES / 2) {
        let placeholders = in_clause(chunk.len());
        let sql = format!(
            "SELECT source, target, relation_type, created_at FROM relations
             WHERE source IN ({placeholders}) OR target IN ({placeholders})"
        );
        let mut bound: Vec<libsql::Value> = chunk.iter().map(|n| n.clone().into()).collect();
        bound.extend(chunk.iter().map(|n| n.clone().into()));
        let mut rows = conn.query(&sql, bound).await?;
        while let Some(row) = rows.next().await? {
            out.push(Relation {
                source: row.get(0)?,
                target: row.get(1)?,
                relation_type: row.get(2)?,
                created_at: row.get(3)?,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::schema;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", ()).await.unwrap();
        schema::ensure_schema(&conn, 4).await.unwrap();
        conn
    }

    fn entity(name: &str, obs: &[&str]) -> EntityInput {
        EntityInput {
            name: name.to_string(),
            entity_type: "t".to_string(),
            observations: obs.iter().map(|s| s.to_string()).collect(),
            embedding: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_entity() {
        let conn = setup().await;
        create_entities(&conn, &[entity("alice", &["o1", "o2"])]).await.unwrap();

        let e = get_entity(&conn, "alice").await.unwrap();
        assert_eq!(e.observations.len(), 2);
        assert_eq!(e.observations[0].content, "o1");
        assert_eq!(e.observations[1].content, "o2");
    }

    #[tokio::test]
    async fn test_create_entities_replaces_observations() {
        let conn = setup().await;
        create_entities(&conn, &[entity("alice", &["o1", "o2"])]).await.unwrap();
        create_entities(&conn, &[entity("alice", &["o3"])]).await.unwrap();

        let e = get_entity(&conn, "alice").await.unwrap();
        assert_eq!(e.observations.len(), 1);
        assert_eq!(e.observations[0].content, "o3");
    }

    #[tokio::test]
    async fn test_add_observations_requires_existing_entity() {
        let conn = setup().await;
        let err = add_observations(&conn, "ghost", &["x".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_add_observations_appends() {
        let conn = setup().await;
        create_entities(&conn, &[entity("alice", &["o1"])]).await.unwrap();
        add_observations(&conn, "alice", &["o2".to_string()]).await.unwrap();

        let e = get_entity(&conn, "alice").await.unwrap();
        assert_eq!(e.observations.len(), 2);
    }

    #[tokio::test]
    async fn test_update_entities_merge_vs_replace() {
        let conn = setup().await;
        create_entities(&conn, &[entity("alice", &["o1"])]).await.unwrap();

        update_entities(
            &conn,
            &[EntityUpdate {
                name: "alice".to_string(),
                entity_type: None,
                embedding: None,
                observations: Some(ObservationUpdate::Merge(vec!["o2".to_string()])),
            }],
        )
        .await
        .unwrap();
        assert_eq!(get_entity(&conn, "alice").await.unwrap().observations.len(), 2);

        update_entities(
            &conn,
            &[EntityUpdate {
                name: "alice".to_string(),
                entity_type: None,
                embedding: None,
                observations: Some(ObservationUpdate::Replace(vec!["o3".to_string()])),
            }],
        )
        .await
        .unwrap();
        let e = get_entity(&conn, "alice").await.unwrap();
        assert_eq!(e.observations.len(), 1);
        assert_eq!(e.observations[0].content, "o3");
    }

    #[tokio::test]
    async fn test_delete_entity_cascades() {
        let conn = setup().await;
        create_entities(
            &conn,
            &[entity("a", &["oa"]), entity("b", &["ob"])],
        )
        .await
        .unwrap();
        create_relations(
            &conn,
            &[RelationInput {
                source: "a".to_string(),
                target: "b".to_string(),
                relation_type: "r".to_string(),
            }],
        )
        .await
        .unwrap();

        delete_entity(&conn, "a").await.unwrap();

        assert!(get_entity(&conn, "a").await.is_err());
        let relations = relations_touching(&conn, &["b".to_string()]).await.unwrap();
        assert!(relations.is_empty());
    }

    #[tokio::test]
    async fn test_create_relations_rejects_missing_endpoint() {
        let conn = setup().await;
        create_entities(&conn, &[entity("a", &["oa"])]).await.unwrap();
        let err = create_relations(
            &conn,
            &[RelationInput {
                source: "a".to_string(),
                target: "ghost".to_string(),
                relation_type: "r".to_string(),
            }],
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_relations_repoints_target() {
        let conn = setup().await;
        create_entities(
            &conn,
            &[entity("x", &["ox"]), entity("y", &["oy"]), entity("z", &["oz"])],
        )
        .await
        .unwrap();
        create_relations(
            &conn,
            &[RelationInput {
                source: "x".to_string(),
                target: "y".to_string(),
                relation_type: "r".to_string(),
            }],
        )
        .await
        .unwrap();

        update_relations(
            &conn,
            &[RelationChange {
                source: "x".to_string(),
                target: "y".to_string(),
                relation_type: "r".to_string(),
                new_source: None,
                new_target: Some("z".to_string()),
                new_relation_type: None,
            }],
        )
        .await
        .unwrap();

        let relations = relations_touching(&conn, &["x".to_string()]).await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].target, "z");
    }

    #[tokio::test]
    async fn test_delete_observations_by_content_then_relation() {
        let conn = setup().await;
        create_entities(
            &conn,
            &[entity("a", &["oa1", "oa2"]), entity("b", &["ob1"])],
        )
        .await
        .unwrap();
        create_relations(
            &conn,
            &[RelationInput {
                source: "a".to_string(),
                target: "b".to_string(),
                relation_type: "r".to_string(),
            }],
        )
        .await
        .unwrap();

        let deleted = delete_observations(&conn, "a", &[], &["oa1".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(get_entity(&conn, "a").await.unwrap().observations.len(), 1);

        delete_relations(
            &conn,
            &[RelationInput {
                source: "a".to_string(),
                target: "b".to_string(),
                relation_type: "r".to_string(),
            }],
        )
        .await
        .unwrap();

        let relations = relations_touching(&conn, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert!(relations.is_empty());
    }

    #[tokio::test]
    async fn test_multi_project_isolation_via_get_entity() {
        let conn_a = setup().await;
        let conn_b = setup().await;
        create_entities(&conn_a, &[entity("n1", &["o1"])]).await.unwrap();

        assert!(get_entity(&conn_a, "n1").await.is_ok());
        assert!(get_entity(&conn_b, "n1").await.is_err());
    }
}
