//! End-to-end tests driving the full engine through the Tool Service layer,
//! seeded from the concrete scenarios the engine's invariants are checked
//! against.

use graphmem::config::{Config, StorageMode};
use graphmem::manager::ConnectionManager;
use graphmem::metrics::NoopRecorder;
use graphmem::service::{AddObservationsArgs, DeleteObservationsArgs, ToolService, TraversalArgs};
use graphmem::store::{EntityInput, RelationChange, RelationInput};
use std::sync::Arc;

fn service_with_dims(dims: usize) -> ToolService {
    let mut config = Config::default();
    config.storage = StorageMode::Single {
        url: ":memory:".to_string(),
        auth_token: None,
    };
    config.embedding_dims = dims;
    let manager = ConnectionManager::new(config);
    ToolService::new(manager, None, Arc::new(NoopRecorder))
}

fn service() -> ToolService {
    service_with_dims(4)
}

fn entity(name: &str, observations: &[&str]) -> EntityInput {
    EntityInput {
        name: name.to_string(),
        entity_type: "t".to_string(),
        observations: observations.iter().map(|s| s.to_string()).collect(),
        embedding: None,
    }
}

/// Scenario 1: seed two entities, search and read_graph both see them.
#[tokio::test]
async fn scenario_search_and_read_graph_see_seeded_entities() {
    let service = service();
    service
        .create_entities(None, vec![entity("n1", &["o1"]), entity("n2", &["o2"])], None)
        .await
        .unwrap();

    let search = service
        .search_nodes(None, serde_json::json!("n"), Some(10), None, None)
        .await
        .unwrap();
    let graph = search.graph.unwrap();
    assert_eq!(graph.entities.len(), 2);

    let read = service.read_graph(None, Some(10), None).await.unwrap();
    let graph = read.graph.unwrap();
    assert_eq!(graph.entities.len(), 2);
    assert!(graph.relations.is_empty());
}

/// Scenario 2: a->b, b->c, a->d. Neighbors, walk, and shortest_path all
/// agree on the reachable set in the `out` direction.
#[tokio::test]
async fn scenario_traversal_over_a_small_graph() {
    let service = service();
    service
        .create_entities(
            None,
            vec![entity("a", &[]), entity("b", &[]), entity("c", &[]), entity("d", &[])],
            None,
        )
        .await
        .unwrap();
    service
        .create_relations(
            None,
            vec![
                RelationInput {
                    source: "a".to_string(),
                    target: "b".to_string(),
                    relation_type: "r".to_string(),
                },
                RelationInput {
                    source: "b".to_string(),
                    target: "c".to_string(),
                    relation_type: "r".to_string(),
                },
                RelationInput {
                    source: "a".to_string(),
                    target: "d".to_string(),
                    relation_type: "r".to_string(),
                },
            ],
            None,
        )
        .await
        .unwrap();

    let neighbors = service
        .neighbors(
            None,
            TraversalArgs {
                names: vec!["a".to_string()],
                direction: Some("out".to_string()),
                max_depth: None,
                limit: None,
            },
            None,
        )
        .await
        .unwrap();
    let graph = neighbors.graph.unwrap();
    let names: Vec<&str> = graph.entities.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"a"));
    assert!(names.contains(&"b"));
    assert!(names.contains(&"d"));

    let walked = service
        .walk(
            None,
            TraversalArgs {
                names: vec!["a".to_string()],
                direction: Some("out".to_string()),
                max_depth: Some(2),
                limit: None,
            },
            None,
        )
        .await
        .unwrap();
    let walked_names: Vec<&str> = walked.graph.unwrap().entities.iter().map(|e| e.name.as_str()).collect();
    for n in ["a", "b", "c", "d"] {
        assert!(walked_names.contains(&n), "walk should reach {n}");
    }

    let path = service
        .shortest_path(None, "a".to_string(), "c".to_string(), Some("out".to_string()), None)
        .await
        .unwrap();
    let graph = path.graph.unwrap();
    let path_names: Vec<&str> = graph.entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(path_names, vec!["a", "b", "c"]);
    assert_eq!(graph.relations.len(), 2);
    assert!(graph.relations.iter().all(|r| r.relation_type == "path"));
}

/// Scenario 3: deleting one observation by content leaves the rest, and
/// deleting the relation between two entities removes it from the graph.
#[tokio::test]
async fn scenario_delete_one_observation_then_a_relation() {
    let service = service();
    service
        .create_entities(None, vec![entity("a", &["oa1", "oa2"]), entity("b", &["ob1"])], None)
        .await
        .unwrap();
    service
        .create_relations(
            None,
            vec![RelationInput {
                source: "a".to_string(),
                target: "b".to_string(),
                relation_type: "r".to_string(),
            }],
            None,
        )
        .await
        .unwrap();

    let deleted = service
        .delete_observations(
            None,
            DeleteObservationsArgs {
                entity_name: "a".to_string(),
                ids: vec![],
                contents: vec!["oa1".to_string()],
            },
            None,
        )
        .await
        .unwrap();
    assert!(deleted.summary.contains('1'));

    service
        .delete_relations(
            None,
            vec![RelationInput {
                source: "a".to_string(),
                target: "b".to_string(),
                relation_type: "r".to_string(),
            }],
            None,
        )
        .await
        .unwrap();

    let opened = service
        .open_nodes(None, vec!["a".to_string(), "b".to_string()], true, None)
        .await
        .unwrap();
    assert!(opened.graph.unwrap().relations.is_empty());
}

/// Scenario 4: retargeting a relation replaces the old edge with the new one.
#[tokio::test]
async fn scenario_update_relations_retargets_edge() {
    let service = service();
    service
        .create_entities(None, vec![entity("x", &[]), entity("y", &[]), entity("z", &[])], None)
        .await
        .unwrap();
    service
        .create_relations(
            None,
            vec![RelationInput {
                source: "x".to_string(),
                target: "y".to_string(),
                relation_type: "r".to_string(),
            }],
            None,
        )
        .await
        .unwrap();

    service
        .update_relations(
            None,
            vec![RelationChange {
                source: "x".to_string(),
                target: "y".to_string(),
                relation_type: "r".to_string(),
                new_source: None,
                new_target: Some("z".to_string()),
                new_relation_type: None,
            }],
            None,
        )
        .await
        .unwrap();

    let opened = service
        .open_nodes(None, vec!["x".to_string(), "y".to_string(), "z".to_string()], true, None)
        .await
        .unwrap();
    let graph = opened.graph.unwrap();
    assert!(graph.relations.iter().any(|r| r.source == "x" && r.target == "z"));
    assert!(!graph.relations.iter().any(|r| r.source == "x" && r.target == "y"));
}

/// Scenario 5: a vector query and the same query as an array of numeric
/// strings resolve to the same ordering.
#[tokio::test]
async fn scenario_vector_query_accepts_numeric_strings() {
    let service = service_with_dims(4);
    service
        .create_entities(
            None,
            vec![EntityInput {
                name: "v1".to_string(),
                entity_type: "t".to_string(),
                observations: vec!["point".to_string()],
                embedding: Some(vec![0.1, 0.2, 0.3, 0.4]),
            }],
            None,
        )
        .await
        .unwrap();

    let numeric = service
        .search_nodes(None, serde_json::json!([0.1, 0.2, 0.3, 0.4]), None, None, None)
        .await
        .unwrap();
    let stringly = service
        .search_nodes(None, serde_json::json!(["0.1", "0.2", "0.3", "0.4"]), None, None, None)
        .await
        .unwrap();

    let names_a: Vec<&str> = numeric.graph.as_ref().unwrap().entities.iter().map(|e| e.name.as_str()).collect();
    let names_b: Vec<&str> = stringly.graph.as_ref().unwrap().entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names_a, names_b);
    assert_eq!(names_a, vec!["v1"]);
}

/// Scenario 6: multi-project isolation. An entity created under one project
/// is invisible (NOT_FOUND) to another.
#[tokio::test]
async fn scenario_multi_project_isolation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage = StorageMode::MultiProject {
        projects_dir: dir.path().to_path_buf(),
    };
    config.embedding_dims = 4;
    let manager = ConnectionManager::new(config);
    let service = ToolService::new(manager, None, Arc::new(NoopRecorder));

    service
        .create_entities(Some("p1"), vec![entity("n1", &["o1"])], None)
        .await
        .unwrap();
    service
        .create_entities(Some("p2"), vec![entity("n2", &["o2"])], None)
        .await
        .unwrap();

    let err = service
        .add_observations(
            Some("p1"),
            AddObservationsArgs {
                entity_name: "n2".to_string(),
                observations: vec!["x".to_string()],
            },
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    let ok = service
        .open_nodes(Some("p2"), vec!["n2".to_string()], false, None)
        .await
        .unwrap();
    assert_eq!(ok.graph.unwrap().entities.len(), 1);
}

/// Create-replace: creating the same name twice replaces observations
/// rather than accumulating them.
#[tokio::test]
async fn create_entities_twice_replaces_observations() {
    let service = service();
    service
        .create_entities(None, vec![entity("e", &["o1", "o2"])], None)
        .await
        .unwrap();
    service
        .create_entities(None, vec![entity("e", &["o3"])], None)
        .await
        .unwrap();

    let opened = service.open_nodes(None, vec!["e".to_string()], false, None).await.unwrap();
    let graph = opened.graph.unwrap();
    assert_eq!(graph.entities[0].observations.len(), 1);
    assert_eq!(graph.entities[0].observations[0].content, "o3");
}

/// Cascade: deleting an entity removes its observations and touching
/// relations.
#[tokio::test]
async fn delete_entity_cascades_observations_and_relations() {
    let service = service();
    service
        .create_entities(None, vec![entity("a", &["o1"]), entity("b", &["o2"])], None)
        .await
        .unwrap();
    service
        .create_relations(
            None,
            vec![RelationInput {
                source: "a".to_string(),
                target: "b".to_string(),
                relation_type: "r".to_string(),
            }],
            None,
        )
        .await
        .unwrap();

    service.delete_entity(None, "a".to_string(), None).await.unwrap();

    let opened = service.open_nodes(None, vec!["b".to_string()], true, None).await.unwrap();
    assert!(opened.graph.unwrap().relations.is_empty());

    let err = service
        .add_observations(
            None,
            AddObservationsArgs {
                entity_name: "a".to_string(),
                observations: vec!["x".to_string()],
            },
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}
