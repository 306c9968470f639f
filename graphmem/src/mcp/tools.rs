//! MCP tool handlers for graphmem
//!
//! Each tool handler deserializes its arguments, calls the corresponding
//! [`ToolService`] operation, and renders the result as MCP tool content.

use serde_json::{json, Value};

use super::protocol::{JsonRpcError, ToolDefinition, ToolResult};
use crate::service::{
    AddObservationsArgs, DeleteObservationsArgs, GraphSlice, ToolOutcome, ToolService, TraversalArgs,
};
use crate::store::{EntityInput, EntityUpdate, ObservationUpdate, RelationChange, RelationInput};

/// Get all tool definitions (§6 tool operation surface)
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    let project_args = json!({
        "description": "Project to operate on: a bare project name string, or {\"name\": ..., \"token\": ...} \
                         to also present a multi-tenant auth token; omitted for the default project in \
                         single-tenant mode"
    });

    vec![
        ToolDefinition {
            name: "create_entities".to_string(),
            description: "Create new entities, or replace the observations of existing ones by name.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entities": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "entityType": {"type": "string"},
                                "observations": {"type": "array", "items": {"type": "string"}}
                            },
                            "required": ["name", "entityType", "observations"]
                        }
                    },
                    "project_args": project_args
                },
                "required": ["entities"]
            }),
        },
        ToolDefinition {
            name: "add_observations".to_string(),
            description: "Append observations to an existing entity.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_name": {"type": "string"},
                    "observations": {"type": "array", "items": {"type": "string"}},
                    "project_args": project_args
                },
                "required": ["entity_name", "observations"]
            }),
        },
        ToolDefinition {
            name: "update_entities".to_string(),
            description: "Update an entity's type, embedding, and/or observations.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "updates": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "entityType": {"type": "string"},
                                "observations": {"type": "array", "items": {"type": "string"}},
                                "mergeObservations": {"type": "boolean", "default": false}
                            },
                            "required": ["name"]
                        }
                    },
                    "project_args": project_args
                },
                "required": ["updates"]
            }),
        },
        ToolDefinition {
            name: "create_relations".to_string(),
            description: "Create directed, typed relations between existing entities.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "relations": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "source": {"type": "string"},
                                "target": {"type": "string"},
                                "relationType": {"type": "string"}
                            },
                            "required": ["source", "target", "relationType"]
                        }
                    },
                    "project_args": project_args
                },
                "required": ["relations"]
            }),
        },
        ToolDefinition {
            name: "update_relations".to_string(),
            description: "Repoint or retype existing relations.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "updates": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "source": {"type": "string"},
                                "target": {"type": "string"},
                                "relationType": {"type": "string"},
                                "newSource": {"type": "string"},
                                "newTarget": {"type": "string"},
                                "newRelationType": {"type": "string"}
                            },
                            "required": ["source", "target", "relationType"]
                        }
                    },
                    "project_args": project_args
                },
                "required": ["updates"]
            }),
        },
        ToolDefinition {
            name: "delete_entity".to_string(),
            description: "Delete a single entity by name; cascades to its observations and relations.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "project_args": project_args
                },
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: "delete_entities".to_string(),
            description: "Delete one or more entities by name; cascades to their observations and relations.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "names": {"type": "array", "items": {"type": "string"}},
                    "project_args": project_args
                },
                "required": ["names"]
            }),
        },
        ToolDefinition {
            name: "delete_relation".to_string(),
            description: "Delete a single relation matching the given (source, target, relationType) tuple.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "source": {"type": "string"},
                    "target": {"type": "string"},
                    "relationType": {"type": "string"},
                    "project_args": project_args
                },
                "required": ["source", "target", "relationType"]
            }),
        },
        ToolDefinition {
            name: "delete_relations".to_string(),
            description: "Delete relations matching the given (source, target, relationType) tuples.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "relations": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "source": {"type": "string"},
                                "target": {"type": "string"},
                                "relationType": {"type": "string"}
                            },
                            "required": ["source", "target", "relationType"]
                        }
                    },
                    "project_args": project_args
                },
                "required": ["relations"]
            }),
        },
        ToolDefinition {
            name: "delete_observations".to_string(),
            description: "Delete observations from an entity by id, by content, or all of them if neither is given.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_name": {"type": "string"},
                    "ids": {"type": "array", "items": {"type": "integer"}},
                    "contents": {"type": "array", "items": {"type": "string"}},
                    "project_args": project_args
                },
                "required": ["entity_name"]
            }),
        },
        ToolDefinition {
            name: "open_nodes".to_string(),
            description: "Fetch entities by name, optionally with every relation touching them.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "names": {"type": "array", "items": {"type": "string"}},
                    "include_relations": {"type": "boolean", "default": true},
                    "project_args": project_args
                },
                "required": ["names"]
            }),
        },
        ToolDefinition {
            name: "read_graph".to_string(),
            description: "Read the most recently created entities and the relations between them.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "default": 100},
                    "project_args": project_args
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "search_nodes".to_string(),
            description: "Search entities by text (keyword/hybrid) or by a numeric embedding vector.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "description": "A search string, or a numeric array for vector search"
                    },
                    "limit": {"type": "integer", "default": 10},
                    "offset": {"type": "integer", "default": 0},
                    "project_args": project_args
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "neighbors".to_string(),
            description: "Fetch the direct neighbors of a set of entities.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "names": {"type": "array", "items": {"type": "string"}},
                    "direction": {"type": "string", "enum": ["out", "in", "both"], "default": "both"},
                    "limit": {"type": "integer", "default": 100},
                    "project_args": project_args
                },
                "required": ["names"]
            }),
        },
        ToolDefinition {
            name: "walk".to_string(),
            description: "Breadth-first expansion from a set of entities up to a maximum depth.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "names": {"type": "array", "items": {"type": "string"}},
                    "max_depth": {"type": "integer", "default": 2},
                    "direction": {"type": "string", "enum": ["out", "in", "both"], "default": "both"},
                    "limit": {"type": "integer", "default": 100},
                    "project_args": project_args
                },
                "required": ["names"]
            }),
        },
        ToolDefinition {
            name: "shortest_path".to_string(),
            description: "Find the shortest path between two entities.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "from": {"type": "string"},
                    "to": {"type": "string"},
                    "direction": {"type": "string", "enum": ["out", "in", "both"], "default": "out"},
                    "project_args": project_args
                },
                "required": ["from", "to"]
            }),
        },
        ToolDefinition {
            name: "health_check".to_string(),
            description: "Report process name/version, multi-project mode, and configured embedding dimensions.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
    ]
}

/// Pull the project name and, for multi-tenant callers, the bearer token out
/// of `project_args` (§4.2): either a bare project name string, or an object
/// `{"name": ..., "token": ...}` carrying both.
fn project_arg(args: &Value) -> (Option<String>, Option<String>) {
    match args.get("project_args") {
        Some(Value::String(name)) => (Some(name.clone()), None),
        Some(Value::Object(fields)) => (
            fields.get("name").and_then(|v| v.as_str()).map(String::from),
            fields.get("token").and_then(|v| v.as_str()).map(String::from),
        ),
        _ => (None, None),
    }
}

fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, JsonRpcError> {
    args.get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| JsonRpcError::invalid_params(format!("missing required field '{field}'")))
}

fn required_str_array(args: &Value, field: &str) -> Result<Vec<String>, JsonRpcError> {
    args.get(field)
        .and_then(|v| v.as_array())
        .ok_or_else(|| JsonRpcError::invalid_params(format!("missing required field '{field}'")))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(String::from)
                .ok_or_else(|| JsonRpcError::invalid_params(format!("'{field}' must be an array of strings")))
        })
        .collect()
}

fn optional_usize(args: &Value, field: &str) -> Option<usize> {
    args.get(field).and_then(|v| v.as_u64()).map(|v| v as usize)
}

fn optional_str(args: &Value, field: &str) -> Option<String> {
    args.get(field).and_then(|v| v.as_str()).map(String::from)
}

fn parse_entity_input(value: &Value) -> Result<EntityInput, JsonRpcError> {
    serde_json::from_value(json!({
        "name": required_str(value, "name")?,
        "entity_type": required_str(value, "entityType")?,
        "observations": required_str_array(value, "observations")?,
    }))
    .map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

fn parse_entity_update(value: &Value) -> Result<EntityUpdate, JsonRpcError> {
    let name = required_str(value, "name")?.to_string();
    let entity_type = optional_str(value, "entityType");
    let observations = match value.get("observations").and_then(|v| v.as_array()) {
        Some(items) => {
            let obs: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect();
            let merge = value
                .get("mergeObservations")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            Some(if merge {
                ObservationUpdate::Merge(obs)
            } else {
                ObservationUpdate::Replace(obs)
            })
        }
        None => None,
    };
    Ok(EntityUpdate {
        name,
        entity_type,
        embedding: None,
        observations,
    })
}

fn parse_relation_input(value: &Value) -> Result<RelationInput, JsonRpcError> {
    Ok(RelationInput {
        source: required_str(value, "source")?.to_string(),
        target: required_str(value, "target")?.to_string(),
        relation_type: required_str(value, "relationType")?.to_string(),
    })
}

fn parse_relation_change(value: &Value) -> Result<RelationChange, JsonRpcError> {
    Ok(RelationChange {
        source: required_str(value, "source")?.to_string(),
        target: required_str(value, "target")?.to_string(),
        relation_type: required_str(value, "relationType")?.to_string(),
        new_source: optional_str(value, "newSource"),
        new_target: optional_str(value, "newTarget"),
        new_relation_type: optional_str(value, "newRelationType"),
    })
}

fn graph_result(summary: String, graph: Option<GraphSlice>) -> Result<ToolResult, JsonRpcError> {
    let graph = graph.unwrap_or_default();
    let text = serde_json::to_string_pretty(&json!({
        "summary": summary,
        "entities": graph.entities,
        "relations": graph.relations,
    }))
    .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;
    Ok(ToolResult::text(text))
}

fn text_result(outcome: ToolOutcome) -> Result<ToolResult, JsonRpcError> {
    Ok(ToolResult::text(outcome.summary))
}

/// Dispatch one `tools/call` to the matching [`ToolService`] operation
pub async fn handle_tool_call(
    service: &ToolService,
    tool_name: &str,
    arguments: &Value,
) -> Result<ToolResult, JsonRpcError> {
    let (project, token) = project_arg(arguments);

    match tool_name {
        "create_entities" => {
            let entities = arguments
                .get("entities")
                .and_then(|v| v.as_array())
                .ok_or_else(|| JsonRpcError::invalid_params("missing required field 'entities'"))?
                .iter()
                .map(parse_entity_input)
                .collect::<Result<Vec<_>, _>>()?;
            let outcome = service
                .create_entities(project.as_deref(), entities, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            text_result(outcome)
        }
        "add_observations" => {
            let args: AddObservationsArgs = serde_json::from_value(arguments.clone())
                .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
            let outcome = service
                .add_observations(project.as_deref(), args, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            text_result(outcome)
        }
        "update_entities" => {
            let updates = arguments
                .get("updates")
                .and_then(|v| v.as_array())
                .ok_or_else(|| JsonRpcError::invalid_params("missing required field 'updates'"))?
                .iter()
                .map(parse_entity_update)
                .collect::<Result<Vec<_>, _>>()?;
            let outcome = service
                .update_entities(project.as_deref(), updates, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            text_result(outcome)
        }
        "create_relations" => {
            let relations = arguments
                .get("relations")
                .and_then(|v| v.as_array())
                .ok_or_else(|| JsonRpcError::invalid_params("missing required field 'relations'"))?
                .iter()
                .map(parse_relation_input)
                .collect::<Result<Vec<_>, _>>()?;
            let outcome = service
                .create_relations(project.as_deref(), relations, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            text_result(outcome)
        }
        "update_relations" => {
            let updates = arguments
                .get("updates")
                .and_then(|v| v.as_array())
                .ok_or_else(|| JsonRpcError::invalid_params("missing required field 'updates'"))?
                .iter()
                .map(parse_relation_change)
                .collect::<Result<Vec<_>, _>>()?;
            let outcome = service
                .update_relations(project.as_deref(), updates, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            text_result(outcome)
        }
        "delete_entity" => {
            let name = required_str(arguments, "name")?.to_string();
            let outcome = service
                .delete_entity(project.as_deref(), name, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            text_result(outcome)
        }
        "delete_entities" => {
            let names = required_str_array(arguments, "names")?;
            let outcome = service
                .delete_entities(project.as_deref(), names, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            text_result(outcome)
        }
        "delete_relation" => {
            let relation = parse_relation_input(arguments)?;
            let outcome = service
                .delete_relations(project.as_deref(), vec![relation], token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            text_result(outcome)
        }
        "delete_relations" => {
            let relations = arguments
                .get("relations")
                .and_then(|v| v.as_array())
                .ok_or_else(|| JsonRpcError::invalid_params("missing required field 'relations'"))?
                .iter()
                .map(parse_relation_input)
                .collect::<Result<Vec<_>, _>>()?;
            let outcome = service
                .delete_relations(project.as_deref(), relations, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            text_result(outcome)
        }
        "delete_observations" => {
            let args: DeleteObservationsArgs = serde_json::from_value(arguments.clone())
                .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
            let outcome = service
                .delete_observations(project.as_deref(), args, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            text_result(outcome)
        }
        "open_nodes" => {
            let names = required_str_array(arguments, "names")?;
            let include_relations = arguments
                .get("include_relations")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            let outcome = service
                .open_nodes(project.as_deref(), names, include_relations, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            graph_result(outcome.summary, outcome.graph)
        }
        "read_graph" => {
            let limit = optional_usize(arguments, "limit");
            let outcome = service
                .read_graph(project.as_deref(), limit, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            graph_result(outcome.summary, outcome.graph)
        }
        "search_nodes" => {
            let query = arguments
                .get("query")
                .cloned()
                .ok_or_else(|| JsonRpcError::invalid_params("missing required field 'query'"))?;
            let limit = optional_usize(arguments, "limit");
            let offset = optional_usize(arguments, "offset");
            let outcome = service
                .search_nodes(project.as_deref(), query, limit, offset, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            graph_result(outcome.summary, outcome.graph)
        }
        "neighbors" => {
            let args: TraversalArgs = serde_json::from_value(arguments.clone())
                .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
            let outcome = service
                .neighbors(project.as_deref(), args, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            graph_result(outcome.summary, outcome.graph)
        }
        "walk" => {
            let args: TraversalArgs = serde_json::from_value(arguments.clone())
                .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
            let outcome = service
                .walk(project.as_deref(), args, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            graph_result(outcome.summary, outcome.graph)
        }
        "shortest_path" => {
            let from = required_str(arguments, "from")?.to_string();
            let to = required_str(arguments, "to")?.to_string();
            let direction = optional_str(arguments, "direction");
            let outcome = service
                .shortest_path(project.as_deref(), from, to, direction, token.as_deref())
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            graph_result(outcome.summary, outcome.graph)
        }
        "health_check" => {
            let status = service
                .health_check()
                .await
                .map_err(|e| JsonRpcError::from_engine_error(&e))?;
            let text = serde_json::to_string_pretty(&status)
                .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;
            Ok(ToolResult::text(text))
        }
        _ => Err(JsonRpcError::invalid_params(format!("unknown tool: {tool_name}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageMode};
    use crate::manager::ConnectionManager;
    use crate::metrics::NoopRecorder;
    use std::sync::Arc;

    fn service() -> ToolService {
        let mut config = Config::default();
        config.storage = StorageMode::Single {
            url: ":memory:".to_string(),
            auth_token: None,
        };
        config.embedding_dims = 4;
        let manager = ConnectionManager::new(config);
        ToolService::new(manager, None, Arc::new(NoopRecorder))
    }

    #[test]
    fn test_tool_definitions_cover_every_operation() {
        let tools = get_tool_definitions();
        assert_eq!(tools.len(), 17);
        for tool in &tools {
            assert!(!tool.description.is_empty(), "{} has empty description", tool.name);
            assert!(tool.input_schema.is_object(), "{} has invalid schema", tool.name);
        }
    }

    #[tokio::test]
    async fn test_create_entities_then_search_nodes() {
        let service = service();
        let args = json!({
            "entities": [{"name": "alice", "entityType": "person", "observations": ["likes rust"]}]
        });
        let result = handle_tool_call(&service, "create_entities", &args).await.unwrap();
        assert!(result.content[0].text.contains("created"));

        let search_args = json!({"query": "rust"});
        let result = handle_tool_call(&service, "search_nodes", &search_args).await.unwrap();
        assert!(result.content[0].text.contains("alice"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let service = service();
        let err = handle_tool_call(&service, "bogus_tool", &json!({})).await.unwrap_err();
        assert_eq!(err.code, -32602);
    }

    #[tokio::test]
    async fn test_missing_required_field_is_invalid_params() {
        let service = service();
        let err = handle_tool_call(&service, "add_observations", &json!({})).await.unwrap_err();
        assert_eq!(err.code, -32602);
    }

    #[tokio::test]
    async fn test_health_check_tool() {
        let service = service();
        let result = handle_tool_call(&service, "health_check", &json!({})).await.unwrap();
        assert!(result.content[0].text.contains("graphmem"));
    }
}
