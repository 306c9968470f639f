//! Data model types for entities, observations, and relations (§3)

use serde::{Deserialize, Serialize};

/// One fact attached to an entity, in insertion order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub id: i64,
    pub content: String,
    pub created_at: String,
}

/// A node in the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observations: Vec<Observation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: String,
}

/// A directed, typed edge between two entities. Relations are a multiset:
/// duplicate {source, target, relation_type} tuples are permitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub relation_type: String,
    pub created_at: String,
}

/// Input for `create_entities` (§4.4)
#[derive(Debug, Clone, Deserialize)]
pub struct EntityInput {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// How `update_entities` should treat the observation list (§4.4, §8)
#[derive(Debug, Clone)]
pub enum ObservationUpdate {
    /// Clear existing observations, then insert the given ones
    Replace(Vec<String>),
    /// Append the given observations after the existing ones
    Merge(Vec<String>),
}

/// Input for `update_entities` (§4.4)
#[derive(Debug, Clone)]
pub struct EntityUpdate {
    pub name: String,
    pub entity_type: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub observations: Option<ObservationUpdate>,
}

/// Input for `create_relations` / `delete_relations` (§4.4)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Hash)]
pub struct RelationInput {
    pub source: String,
    pub target: String,
    pub relation_type: String,
}

/// Input for `update_relations`: old tuple plus optional new endpoints/type,
/// defaulting to the old value when omitted (§4.4)
#[derive(Debug, Clone)]
pub struct RelationChange {
    pub source: String,
    pub target: String,
    pub relation_type: String,
    pub new_source: Option<String>,
    pub new_target: Option<String>,
    pub new_relation_type: Option<String>,
}

impl RelationChange {
    pub fn resolved(&self) -> RelationInput {
        RelationInput {
            source: self.new_source.clone().unwrap_or_else(|| self.source.clone()),
            target: self.new_target.clone().unwrap_or_else(|| self.target.clone()),
            relation_type: self
                .new_relation_type
                .clone()
                .unwrap_or_else(|| self.relation_type.clone()),
        }
    }
}

/// Maximum identifiers bound in a single `IN (...)` clause, matching libsql's
/// practical parameter-count ceiling (§4.4)
pub const MAX_BOUND_VARIABLES: usize = 500;
