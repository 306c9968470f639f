//! Tool Service (§4.7): named operations over the engine, independent of
//! any particular transport. The MCP layer is a thin adapter around this.

use std::sync::Arc;
use std::time::{Duration, Instant};

use graphmem_providers::EmbeddingProvider;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::manager::{schema, ConnectionManager};
use crate::metrics::SharedRecorder;
use crate::search::{self, Query, SearchContext};
use crate::store::{
    self, embedding, Entity, EntityInput, EntityUpdate, ObservationUpdate, Relation,
    RelationChange, RelationInput,
};
use crate::traversal::{self, Direction};

/// A resolved {entities, relations} payload, the shared result shape for
/// every graph-returning operation (§6).
#[derive(Debug, Clone, Serialize, Default)]
pub struct GraphSlice {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

/// What one tool call produced: a short human summary plus, for operations
/// that return a graph slice, the structured payload behind it.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub summary: String,
    pub graph: Option<GraphSlice>,
}

impl ToolOutcome {
    fn text(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            graph: None,
        }
    }

    fn graph(summary: impl Into<String>, entities: Vec<Entity>, relations: Vec<Relation>) -> Self {
        Self {
            summary: summary.into(),
            graph: Some(GraphSlice { entities, relations }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub name: String,
    pub version: String,
    pub revision: String,
    pub build_date: String,
    pub multi_project: bool,
    pub embedding_dims: usize,
}

/// Input for `add_observations`
#[derive(Debug, Clone, Deserialize)]
pub struct AddObservationsArgs {
    pub entity_name: String,
    pub observations: Vec<String>,
}

/// Input for `delete_observations`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeleteObservationsArgs {
    pub entity_name: String,
    #[serde(default)]
    pub ids: Vec<i64>,
    #[serde(default)]
    pub contents: Vec<String>,
}

/// Input for `neighbors` / `walk`
#[derive(Debug, Clone, Deserialize)]
pub struct TraversalArgs {
    pub names: Vec<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

const DEFAULT_TRAVERSAL_LIMIT: usize = 100;
const DEFAULT_WALK_DEPTH: usize = 2;
const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_READ_GRAPH_LIMIT: usize = 100;

fn parse_direction(direction: &Option<String>) -> Result<Direction> {
    match direction {
        Some(d) => d.parse(),
        None => Ok(Direction::default()),
    }
}

/// Coerce the wire-facing polymorphic `query` value into a typed [`Query`]
/// (§4.5): a JSON string is text, a JSON array is a vector of coerced f32s.
pub fn parse_query(value: &serde_json::Value) -> Result<Query> {
    match value {
        serde_json::Value::String(s) => Ok(Query::Text(s.clone())),
        serde_json::Value::Array(items) => {
            let mut vector = Vec::with_capacity(items.len());
            for item in items {
                let component = embedding::coerce_component(item).ok_or_else(|| {
                    Error::InvalidArgument(format!("non-numeric vector component: {item}"))
                })?;
                vector.push(component);
            }
            Ok(Query::Vector(vector))
        }
        other => Err(Error::InvalidArgument(format!(
            "query must be a string or numeric array, got {other}"
        ))),
    }
}

/// How often the background sampler reports pool gauges (§4.1, §4.9)
const POOL_STATS_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Ties the engine's connection manager, optional embedding provider, and
/// metrics sink into one dispatcher for the named operations in §6.
pub struct ToolService {
    manager: Arc<ConnectionManager>,
    config: Config,
    provider: Option<Box<dyn EmbeddingProvider + Send + Sync>>,
    recorder: SharedRecorder,
}

impl ToolService {
    pub fn new(
        manager: ConnectionManager,
        provider: Option<Box<dyn EmbeddingProvider + Send + Sync>>,
        recorder: SharedRecorder,
    ) -> Self {
        let config = manager.config().clone();
        let manager = Arc::new(manager);
        spawn_pool_stats_sampler(manager.clone(), recorder.clone());
        Self {
            manager,
            config,
            provider,
            recorder,
        }
    }

    async fn record<T>(&self, operation: &str, started: Instant, result: Result<T>) -> Result<T> {
        self.recorder
            .record_operation(operation, started.elapsed(), result.is_ok());
        result
    }

    /// Fill in a missing embedding for each entity input from the configured
    /// provider, one batched call for every input that needs one (§4.4).
    async fn fill_missing_embeddings(&self, batch: &mut [EntityInput]) -> Result<()> {
        let Some(provider) = &self.provider else {
            return Ok(());
        };

        let pending: Vec<usize> = batch
            .iter()
            .enumerate()
            .filter(|(_, e)| e.embedding.is_none())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        if provider.dimensions() != self.config.embedding_dims {
            return Err(Error::EmbeddingDimsMismatch {
                provider: provider.dimensions(),
                store: self.config.embedding_dims,
            });
        }

        let texts: Vec<String> = pending
            .iter()
            .map(|&i| batch[i].observations.join("\n"))
            .collect();
        let vectors = provider
            .embed(&texts)
            .await
            .map_err(|e| Error::EmbeddingsProviderError(e.to_string()))?;
        if vectors.len() != pending.len() {
            return Err(Error::EmbeddingsProviderError(format!(
                "provider returned {} vectors for {} inputs",
                vectors.len(),
                pending.len()
            )));
        }

        for (i, vector) in pending.into_iter().zip(vectors) {
            batch[i].embedding = Some(vector);
        }
        Ok(())
    }

    async fn embed_for_update(&self, spec: &mut EntityUpdate) -> Result<()> {
        if spec.embedding.is_some() {
            return Ok(());
        }
        let Some(provider) = &self.provider else {
            return Ok(());
        };
        let Some(ObservationUpdate::Replace(obs)) = &spec.observations else {
            return Ok(());
        };
        if provider.dimensions() != self.config.embedding_dims {
            return Err(Error::EmbeddingDimsMismatch {
                provider: provider.dimensions(),
                store: self.config.embedding_dims,
            });
        }
        let text = obs.join("\n");
        let mut vectors = provider
            .embed(&[text])
            .await
            .map_err(|e| Error::EmbeddingsProviderError(e.to_string()))?;
        spec.embedding = vectors.pop();
        Ok(())
    }

    pub async fn create_entities(
        &self,
        project: Option<&str>,
        mut batch: Vec<EntityInput>,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "create_entities";
        let result = async {
            self.fill_missing_embeddings(&mut batch).await?;
            let has_embeddings = batch.iter().any(|e| e.embedding.is_some());
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let created = store::create_entities(&conn, &batch)
                .await
                .map_err(|e| e.with_context(op))?;
            if has_embeddings {
                schema::ensure_vector_index(&conn).await.map_err(|e| e.with_context(op))?;
            }
            Ok(ToolOutcome::text(format!("created or updated {created} entities")))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn add_observations(
        &self,
        project: Option<&str>,
        args: AddObservationsArgs,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "add_observations";
        let result = async {
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let added = store::add_observations(&conn, &args.entity_name, &args.observations)
                .await
                .map_err(|e| e.with_context(op))?;
            Ok(ToolOutcome::text(format!(
                "added {added} observations to '{}'",
                args.entity_name
            )))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn update_entities(
        &self,
        project: Option<&str>,
        mut updates: Vec<EntityUpdate>,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "update_entities";
        let result = async {
            for spec in &mut updates {
                self.embed_for_update(spec).await?;
            }
            let has_embeddings = updates.iter().any(|u| u.embedding.is_some());
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let updated = store::update_entities(&conn, &updates)
                .await
                .map_err(|e| e.with_context(op))?;
            if has_embeddings {
                schema::ensure_vector_index(&conn).await.map_err(|e| e.with_context(op))?;
            }
            Ok(ToolOutcome::text(format!("updated {updated} entities")))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn create_relations(
        &self,
        project: Option<&str>,
        relations: Vec<RelationInput>,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "create_relations";
        let result = async {
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let created = store::create_relations(&conn, &relations)
                .await
                .map_err(|e| e.with_context(op))?;
            Ok(ToolOutcome::text(format!("created {created} relations")))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn update_relations(
        &self,
        project: Option<&str>,
        changes: Vec<RelationChange>,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "update_relations";
        let result = async {
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let updated = store::update_relations(&conn, &changes)
                .await
                .map_err(|e| e.with_context(op))?;
            Ok(ToolOutcome::text(format!("updated {updated} relations")))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn delete_entity(
        &self,
        project: Option<&str>,
        name: String,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "delete_entity";
        let result = async {
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            store::delete_entity(&conn, &name).await.map_err(|e| e.with_context(op))?;
            Ok(ToolOutcome::text(format!("deleted entity '{name}'")))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn delete_entities(
        &self,
        project: Option<&str>,
        names: Vec<String>,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "delete_entities";
        let result = async {
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let deleted = store::delete_entities(&conn, &names)
                .await
                .map_err(|e| e.with_context(op))?;
            Ok(ToolOutcome::text(format!("deleted {deleted} entities")))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn delete_relations(
        &self,
        project: Option<&str>,
        relations: Vec<RelationInput>,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "delete_relations";
        let result = async {
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let deleted = store::delete_relations(&conn, &relations)
                .await
                .map_err(|e| e.with_context(op))?;
            Ok(ToolOutcome::text(format!("deleted {deleted} relations")))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn delete_observations(
        &self,
        project: Option<&str>,
        args: DeleteObservationsArgs,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "delete_observations";
        let result = async {
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let deleted = store::delete_observations(&conn, &args.entity_name, &args.ids, &args.contents)
                .await
                .map_err(|e| e.with_context(op))?;
            Ok(ToolOutcome::text(format!("deleted {deleted} observations")))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn open_nodes(
        &self,
        project: Option<&str>,
        names: Vec<String>,
        include_relations: bool,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "open_nodes";
        let result = async {
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let entities = store::get_entities(&conn, &names).await.map_err(|e| e.with_context(op))?;
            let relations = if include_relations {
                store::relations_touching(&conn, &names).await.map_err(|e| e.with_context(op))?
            } else {
                Vec::new()
            };
            let count = entities.len();
            Ok(ToolOutcome::graph(format!("opened {count} entities"), entities, relations))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn read_graph(
        &self,
        project: Option<&str>,
        limit: Option<usize>,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "read_graph";
        let result = async {
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let (entities, relations) = store::read_graph(&conn, limit.unwrap_or(DEFAULT_READ_GRAPH_LIMIT))
                .await
                .map_err(|e| e.with_context(op))?;
            let count = entities.len();
            Ok(ToolOutcome::graph(format!("read {count} entities"), entities, relations))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn search_nodes(
        &self,
        project: Option<&str>,
        query: serde_json::Value,
        limit: Option<usize>,
        offset: Option<usize>,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "search_nodes";
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let offset = offset.unwrap_or(0);
        let result = async {
            let query = parse_query(&query)?;
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let ctx = SearchContext {
                caps: handle.capabilities(),
                bm25: &self.config.bm25,
                hybrid: &self.config.hybrid,
                embedding_dims: self.config.embedding_dims,
                provider: self.provider.as_deref(),
                recorder: self.recorder.as_ref(),
            };
            let (entities, relations) = search::search(&conn, &ctx, &query, limit, offset)
                .await
                .map_err(|e| e.with_context(op))?;
            let count = entities.len();
            let mode = match &query {
                Query::Text(_) if self.config.hybrid.enabled => "hybrid",
                Query::Text(_) => "text",
                Query::Vector(_) => "vector",
            };
            self.recorder.record_search(mode, started.elapsed(), count);
            Ok(ToolOutcome::graph(format!("found {count} entities"), entities, relations))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn neighbors(
        &self,
        project: Option<&str>,
        args: TraversalArgs,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "neighbors";
        let result = async {
            let direction = parse_direction(&args.direction)?;
            let limit = args.limit.unwrap_or(DEFAULT_TRAVERSAL_LIMIT);
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let (entities, relations) = traversal::neighbors(&conn, &args.names, direction, limit)
                .await
                .map_err(|e| e.with_context(op))?;
            let count = entities.len();
            Ok(ToolOutcome::graph(format!("found {count} neighbors"), entities, relations))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn walk(
        &self,
        project: Option<&str>,
        args: TraversalArgs,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "walk";
        let result = async {
            let direction = parse_direction(&args.direction)?;
            let limit = args.limit.unwrap_or(DEFAULT_TRAVERSAL_LIMIT);
            let max_depth = args.max_depth.unwrap_or(DEFAULT_WALK_DEPTH);
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let (entities, relations) = traversal::walk(&conn, &args.names, max_depth, direction, limit)
                .await
                .map_err(|e| e.with_context(op))?;
            let count = entities.len();
            Ok(ToolOutcome::graph(format!("visited {count} entities"), entities, relations))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn shortest_path(
        &self,
        project: Option<&str>,
        from: String,
        to: String,
        direction: Option<String>,
        token: Option<&str>,
    ) -> Result<ToolOutcome> {
        let started = Instant::now();
        let op = "shortest_path";
        let result = async {
            let direction = parse_direction(&direction)?;
            let handle = self.manager.handle_for(project, token).await?;
            let conn = handle.acquire().await?;
            let (entities, relations) = traversal::shortest_path(&conn, &from, &to, direction)
                .await
                .map_err(|e| e.with_context(op))?;
            let summary = if entities.is_empty() {
                format!("no path from '{from}' to '{to}'")
            } else {
                format!("path of {} hops from '{from}' to '{to}'", relations.len())
            };
            Ok(ToolOutcome::graph(summary, entities, relations))
        }
        .await;
        self.record(op, started, result).await
    }

    pub async fn health_check(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            name: "graphmem".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            revision: option_env!("GRAPHMEM_REVISION").unwrap_or("unknown").to_string(),
            build_date: option_env!("GRAPHMEM_BUILD_DATE").unwrap_or("unknown").to_string(),
            multi_project: self.config.is_multi_project(),
            embedding_dims: self.config.embedding_dims,
        })
    }
}

/// Background task sampling every open project's pool gauges on a fixed tick,
/// for callers that never poll `pool_stats()` themselves (§4.1, §4.9)
fn spawn_pool_stats_sampler(manager: Arc<ConnectionManager>, recorder: SharedRecorder) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(POOL_STATS_SAMPLE_INTERVAL);
        loop {
            ticker.tick().await;
            for (project, stats) in manager.all_pool_stats() {
                recorder.record_pool_stats(&project, stats);
            }
        }
    });
}
