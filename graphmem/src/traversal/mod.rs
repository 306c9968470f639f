//! Traversal Engine (§4.6): neighbor expansion, bounded breadth-first walk,
//! and shortest-path reconstruction over the relations table.

use std::collections::{HashMap, HashSet};

use libsql::{params, Connection};

use crate::error::Result;
use crate::store::{self, Entity, Relation, MAX_BOUND_VARIABLES};

/// Which way a relation edge is followed during expansion (§4.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Out,
    In,
    #[default]
    Both,
}

impl std::str::FromStr for Direction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "out" => Ok(Direction::Out),
            "in" => Ok(Direction::In),
            "both" => Ok(Direction::Both),
            _ => Err(crate::Error::InvalidArgument(format!("unknown direction: {s}"))),
        }
    }
}

/// One hop of relations touching `seeds` along `direction`, oldest-first,
/// chunked to respect the engine's bound-variable limit (§4.6). `limit`
/// caps the number of rows returned; `None` leaves the fetch unbounded
/// (used by `shortest_path`, whose own BFS bounds the total work done).
async fn relations_for_seeds(
    conn: &Connection,
    seeds: &[String],
    direction: Direction,
    limit: Option<usize>,
) -> Result<Vec<Relation>> {
    if seeds.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for chunk in seeds.chunks(MAX_BOUND_VARIABLES.max(1)) {
        let placeholders = std::iter::repeat("?").take(chunk.len()).collect::<Vec<_>>().join(",");
        let where_clause = match direction {
            Direction::Out => format!("source IN ({placeholders})"),
            Direction::In => format!("target IN ({placeholders})"),
            Direction::Both => format!("source IN ({placeholders}) OR target IN ({placeholders})"),
        };

        let mut sql = format!(
            "SELECT source, target, relation_type, created_at FROM relations WHERE {where_clause} ORDER BY id ASC"
        );
        let mut bound: Vec<libsql::Value> = chunk.iter().map(|n| n.clone().into()).collect();
        if direction == Direction::Both {
            bound.extend(chunk.iter().map(|n| n.clone().into()));
        }
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            bound.push((limit as i64).into());
        }

        let mut rows = conn.query(&sql, bound).await?;
        while let Some(row) = rows.next().await? {
            out.push(Relation {
                source: row.get(0)?,
                target: row.get(1)?,
                relation_type: row.get(2)?,
                created_at: row.get(3)?,
            });
            if let Some(limit) = limit {
                if out.len() >= limit {
                    return Ok(out);
                }
            }
        }
    }
    Ok(out)
}

fn reorder_entities(entities: Vec<Entity>, names: &[String]) -> Vec<Entity> {
    let mut by_name: HashMap<String, Entity> = entities.into_iter().map(|e| (e.name.clone(), e)).collect();
    names.iter().filter_map(|n| by_name.remove(n)).collect()
}

/// Direct neighbors of `seeds` along `direction`; the seed set itself is
/// always included in the returned entity set (§4.6).
pub async fn neighbors(
    conn: &Connection,
    seeds: &[String],
    direction: Direction,
    limit: usize,
) -> Result<(Vec<Entity>, Vec<Relation>)> {
    if seeds.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let relations = relations_for_seeds(conn, seeds, direction, Some(limit)).await?;

    let mut names: HashSet<String> = seeds.iter().cloned().collect();
    for r in &relations {
        names.insert(r.source.clone());
        names.insert(r.target.clone());
    }
    let mut sorted_names: Vec<String> = names.into_iter().collect();
    sorted_names.sort();

    let entities = store::get_entities(conn, &sorted_names).await?;
    Ok((reorder_entities(entities, &sorted_names), relations))
}

/// Breadth-first expansion from `seeds` up to `max_depth` hops, reusing the
/// same per-hop relation fetch as `neighbors`. `limit` is a cumulative cap
/// on the number of entities visited across the whole walk (§4.6).
pub async fn walk(
    conn: &Connection,
    seeds: &[String],
    max_depth: usize,
    direction: Direction,
    limit: usize,
) -> Result<(Vec<Entity>, Vec<Relation>)> {
    if seeds.is_empty() || max_depth == 0 {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut visited: HashSet<String> = seeds.iter().cloned().collect();
    let mut frontier: Vec<String> = seeds.to_vec();
    let mut all_relations = Vec::new();
    let mut seen_edges: HashSet<(String, String, String)> = HashSet::new();

    for _ in 0..max_depth {
        if frontier.is_empty() || visited.len() >= limit {
            break;
        }

        let relations = relations_for_seeds(conn, &frontier, direction, Some(limit)).await?;
        let frontier_set: HashSet<&String> = frontier.iter().collect();
        let mut next_frontier = Vec::new();

        for r in relations {
            let edge_key = (r.source.clone(), r.target.clone(), r.relation_type.clone());
            if seen_edges.insert(edge_key) {
                all_relations.push(r.clone());
            }

            let other = if frontier_set.contains(&r.source) {
                r.target.clone()
            } else {
                r.source.clone()
            };

            if visited.len() >= limit {
                break;
            }
            if visited.insert(other.clone()) {
                next_frontier.push(other);
            }
        }

        frontier = next_frontier;
    }

    let mut names: Vec<String> = visited.into_iter().collect();
    names.sort();
    let entities = store::get_entities(conn, &names).await?;
    Ok((reorder_entities(entities, &names), all_relations))
}

/// Breadth-first shortest path from `from` to `to`; the reconstructed edges
/// carry the synthetic relation type `"path"`, not the original types (§4.6).
pub async fn shortest_path(
    conn: &Connection,
    from: &str,
    to: &str,
    direction: Direction,
) -> Result<(Vec<Entity>, Vec<Relation>)> {
    if from.is_empty() || to.is_empty() || from == to {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(from.to_string());
    let mut frontier = vec![from.to_string()];
    let mut parent: HashMap<String, String> = HashMap::new();
    let mut found = false;

    'bfs: while !frontier.is_empty() {
        let relations = relations_for_seeds(conn, &frontier, direction, None).await?;
        let frontier_set: HashSet<&String> = frontier.iter().collect();
        let mut next_frontier = Vec::new();

        for r in relations {
            let (parent_node, child) = if frontier_set.contains(&r.source) {
                (r.source.clone(), r.target.clone())
            } else {
                (r.target.clone(), r.source.clone())
            };

            if visited.contains(&child) {
                continue;
            }
            visited.insert(child.clone());
            parent.insert(child.clone(), parent_node);

            if child == to {
                found = true;
                break 'bfs;
            }
            next_frontier.push(child);
        }

        frontier = next_frontier;
    }

    if !found {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut path_nodes = vec![to.to_string()];
    let mut cursor = to.to_string();
    while cursor != from {
        let Some(p) = parent.get(&cursor) else { break };
        path_nodes.push(p.clone());
        cursor = p.clone();
    }
    path_nodes.reverse();

    let path_relations = path_nodes
        .windows(2)
        .map(|pair| Relation {
            source: pair[0].clone(),
            target: pair[1].clone(),
            relation_type: "path".to_string(),
            created_at: String::new(),
        })
        .collect();

    let entities = store::get_entities(conn, &path_nodes).await?;
    Ok((reorder_entities(entities, &path_nodes), path_relations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::schema;
    use crate::store::{EntityInput, RelationInput};
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", ()).await.unwrap();
        schema::ensure_schema(&conn, 4).await.unwrap();
        conn
    }

    fn entity(name: &str) -> EntityInput {
        EntityInput {
            name: name.to_string(),
            entity_type: "t".to_string(),
            observations: vec!["o".to_string()],
            embedding: None,
        }
    }

    fn relation(source: &str, target: &str) -> RelationInput {
        RelationInput {
            source: source.to_string(),
            target: target.to_string(),
            relation_type: "r".to_string(),
        }
    }

    async fn chain(conn: &Connection) {
        store::create_entities(conn, &[entity("a"), entity("b"), entity("c"), entity("d")])
            .await
            .unwrap();
        store::create_relations(
            conn,
            &[relation("a", "b"), relation("b", "c"), relation("c", "d")],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_neighbors_includes_seed_and_direct_edges() {
        let conn = setup().await;
        chain(&conn).await;

        let (entities, relations) = neighbors(&conn, &["b".to_string()], Direction::Out, 10).await.unwrap();
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"b"));
        assert!(names.contains(&"c"));
        assert_eq!(relations.len(), 1);
    }

    #[tokio::test]
    async fn test_walk_respects_max_depth() {
        let conn = setup().await;
        chain(&conn).await;

        let (entities, _) = walk(&conn, &["a".to_string()], 1, Direction::Out, 100).await.unwrap();
        let names: HashSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains("a"));
        assert!(names.contains("b"));
        assert!(!names.contains("c"));
    }

    #[tokio::test]
    async fn test_walk_respects_entity_cap() {
        let conn = setup().await;
        chain(&conn).await;

        let (entities, _) = walk(&conn, &["a".to_string()], 10, Direction::Out, 2).await.unwrap();
        assert!(entities.len() <= 2);
    }

    #[tokio::test]
    async fn test_shortest_path_reconstructs_chain() {
        let conn = setup().await;
        chain(&conn).await;

        let (entities, relations) = shortest_path(&conn, "a", "d", Direction::Out).await.unwrap();
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(relations.len(), 3);
        assert!(relations.iter().all(|r| r.relation_type == "path"));
    }

    #[tokio::test]
    async fn test_shortest_path_degenerate_same_endpoint() {
        let conn = setup().await;
        chain(&conn).await;
        let (entities, relations) = shortest_path(&conn, "a", "a", Direction::Out).await.unwrap();
        assert!(entities.is_empty());
        assert!(relations.is_empty());
    }

    #[tokio::test]
    async fn test_shortest_path_no_path_returns_empty() {
        let conn = setup().await;
        chain(&conn).await;
        let (entities, relations) = shortest_path(&conn, "d", "a", Direction::Out).await.unwrap();
        assert!(entities.is_empty());
        assert!(relations.is_empty());
    }
}
