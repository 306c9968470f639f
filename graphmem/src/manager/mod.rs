//! Connection Manager (§4.1)
//!
//! Owns one [`Pool`] per project, lazily opened on first use, and the shared
//! [`Capabilities`] probe result for that project's database. In single-tenant
//! mode there is exactly one project, named [`crate::config::DEFAULT_PROJECT`].

pub mod auth;
pub mod capability;
pub mod pool;
pub mod schema;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use libsql::Builder;
use parking_lot::Mutex;

use crate::config::{Config, PoolConfig, StorageMode};
use crate::error::{Error, Result};
use crate::metrics::PoolStats;

pub use capability::Capabilities;
pub use pool::{Pool, PooledConn};

struct Project {
    pool: Pool,
    capabilities: Arc<Capabilities>,
    auth_token: Option<String>,
}

/// Owns every open project database for the process
pub struct ConnectionManager {
    config: Config,
    projects: Mutex<HashMap<String, Arc<Project>>>,
}

/// A resolved handle to one project's pool, ready for a checkout
pub struct ProjectHandle {
    project: Arc<Project>,
}

impl ProjectHandle {
    pub async fn acquire(&self) -> Result<PooledConn<'_>> {
        self.project.pool.acquire().await
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.project.capabilities
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.project.pool.stats()
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.project.auth_token.as_deref()
    }
}

impl ConnectionManager {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            projects: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve (opening if necessary) the handle for a named project.
    ///
    /// In single-tenant mode `project` must be `None` or
    /// [`crate::config::DEFAULT_PROJECT`]; any other name is rejected. In
    /// multi-tenant mode `token` is checked against the project's stored
    /// `.auth_token` per the configured policy (§4.2), including on the call
    /// that first opens (and so may auto-initialize the token for) a project —
    /// a freshly generated token must still be retrieved out-of-band before
    /// it can be presented back.
    pub async fn handle_for(&self, project: Option<&str>, token: Option<&str>) -> Result<ProjectHandle> {
        let key = self.resolve_project_name(project)?;

        let project = if let Some(existing) = self.projects.lock().get(&key).cloned() {
            existing
        } else {
            let opened = self.open_project(&key).await?;
            self.projects.lock().insert(key, opened.clone());
            opened
        };

        self.authorize(&project, token)?;
        Ok(ProjectHandle { project })
    }

    fn authorize(&self, project: &Project, token: Option<&str>) -> Result<()> {
        if !self.config.is_multi_project() {
            return Ok(());
        }
        auth::authorize(project.auth_token.as_deref(), token, self.config.auth.required)
    }

    fn resolve_project_name(&self, project: Option<&str>) -> Result<String> {
        match (&self.config.storage, project) {
            (StorageMode::Single { .. }, None) => Ok(crate::config::DEFAULT_PROJECT.to_string()),
            (StorageMode::Single { .. }, Some(name)) if name == crate::config::DEFAULT_PROJECT => {
                Ok(name.to_string())
            }
            (StorageMode::Single { .. }, Some(name)) => Err(Error::InvalidArgument(format!(
                "project '{name}' is not valid in single-project mode"
            ))),
            (StorageMode::MultiProject { .. }, None) => {
                Err(Error::InvalidArgument("project name is required".into()))
            }
            (StorageMode::MultiProject { .. }, Some(name)) => {
                validate_project_name(name)?;
                Ok(name.to_string())
            }
        }
    }

    async fn open_project(&self, key: &str) -> Result<Arc<Project>> {
        let (db, project_dir, skip_vector) = match &self.config.storage {
            StorageMode::Single { url, auth_token } => {
                let db = if let Some(token) = auth_token {
                    Builder::new_remote(url.clone(), token.clone())
                        .build()
                        .await?
                } else {
                    Builder::new_local(url).build().await?
                };
                (db, None, is_memory_url(url))
            }
            StorageMode::MultiProject { projects_dir } => {
                let dir = projects_dir.join(key);
                std::fs::create_dir_all(&dir)?;
                let db_path = dir.join("libsql.db");
                let db = Builder::new_local(&db_path).build().await?;
                (db, Some(dir), false)
            }
        };

        let conn = db.connect()?;
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        schema::ensure_schema(&conn, self.config.embedding_dims).await?;
        if !skip_vector {
            schema::ensure_vector_index(&conn).await?;
        }

        let auth_token = match &project_dir {
            Some(dir) if self.config.auth.required || self.config.auth.auto_init_token => {
                auth::ensure_token(dir, self.config.auth.auto_init_token)?
            }
            _ => self.config.auth.default_token.clone(),
        };

        let capabilities = if skip_vector {
            Capabilities::new_skip_vector()
        } else {
            Capabilities::new()
        };

        Ok(Arc::new(Project {
            pool: Pool::new(db, clamp_pool_config(&self.config.pool)),
            capabilities: Arc::new(capabilities),
            auth_token,
        }))
    }

    /// Pool stats for every currently open project, for periodic sampling (§4.9)
    pub fn all_pool_stats(&self) -> Vec<(String, PoolStats)> {
        self.projects
            .lock()
            .iter()
            .map(|(name, project)| (name.clone(), project.pool.stats()))
            .collect()
    }

    /// Drop idle connections across every open project
    pub fn close(&self) {
        for project in self.projects.lock().values() {
            project.pool.close_idle();
        }
    }

    /// Project directory roots that currently exist on disk, multi-tenant only
    pub fn projects_dir(&self) -> Option<&PathBuf> {
        match &self.config.storage {
            StorageMode::MultiProject { projects_dir } => Some(projects_dir),
            StorageMode::Single { .. } => None,
        }
    }
}

/// Whether a single-tenant URL names an in-memory (non-persistent) database,
/// for which a vector index would never outlive the probe that created it (§4.3)
fn is_memory_url(url: &str) -> bool {
    url == ":memory:" || url.starts_with("file::memory:")
}

fn clamp_pool_config(config: &PoolConfig) -> PoolConfig {
    let mut config = config.clone();
    if config.max_idle_conns > config.max_open_conns {
        config.max_idle_conns = config.max_open_conns;
    }
    config
}

/// Project names are used as path segments (`<projects_dir>/<name>/libsql.db`),
/// so they're restricted to a safe, portable character set (§4.2)
fn validate_project_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 128 {
        return Err(Error::InvalidArgument(
            "project name must be 1-128 characters".into(),
        ));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(Error::InvalidArgument(
            "project name may only contain alphanumerics, '-' and '_'".into(),
        ));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidArgument("invalid project name".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use tempfile::tempdir;

    fn single_config() -> Config {
        let mut config = Config::default();
        config.storage = StorageMode::Single {
            url: ":memory:".to_string(),
            auth_token: None,
        };
        config
    }

    #[tokio::test]
    async fn test_single_project_default_name() {
        let manager = ConnectionManager::new(single_config());
        let handle = manager.handle_for(None, None).await.unwrap();
        assert!(handle.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_single_project_rejects_other_name() {
        let manager = ConnectionManager::new(single_config());
        assert!(manager.handle_for(Some("other"), None).await.is_err());
    }

    #[tokio::test]
    async fn test_handle_is_cached() {
        let manager = ConnectionManager::new(single_config());
        let first = manager.handle_for(None, None).await.unwrap();
        drop(first.acquire().await.unwrap());
        let second = manager.handle_for(None, None).await.unwrap();
        assert_eq!(second.pool_stats().idle, 1);
    }

    #[tokio::test]
    async fn test_memory_url_skips_vector_probe() {
        let manager = ConnectionManager::new(single_config());
        let handle = manager.handle_for(None, None).await.unwrap();
        let conn = handle.acquire().await.unwrap();
        assert!(!handle.capabilities().vector_search(&conn).await);
    }

    #[tokio::test]
    async fn test_multi_project_isolated_dbs() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.storage = StorageMode::MultiProject {
            projects_dir: dir.path().to_path_buf(),
        };
        config.auth = AuthConfig {
            required: false,
            auto_init_token: false,
            default_token: None,
        };
        let manager = ConnectionManager::new(config);

        let alice = manager.handle_for(Some("alice"), None).await.unwrap();
        let bob = manager.handle_for(Some("bob"), None).await.unwrap();

        alice
            .acquire()
            .await
            .unwrap()
            .execute(
                "INSERT INTO entities (name, entity_type, created_at) VALUES ('a', 't', '1')",
                (),
            )
            .await
            .unwrap();

        let mut rows = bob
            .acquire()
            .await
            .unwrap()
            .query("SELECT COUNT(*) FROM entities", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 0, "bob's database must not see alice's rows");
    }

    #[tokio::test]
    async fn test_multi_project_rejects_invalid_name() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.storage = StorageMode::MultiProject {
            projects_dir: dir.path().to_path_buf(),
        };
        let manager = ConnectionManager::new(config);
        assert!(manager.handle_for(Some("../escape"), None).await.is_err());
        assert!(manager.handle_for(None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_multi_project_auto_init_token() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.storage = StorageMode::MultiProject {
            projects_dir: dir.path().to_path_buf(),
        };
        config.auth = AuthConfig {
            required: true,
            auto_init_token: true,
            default_token: None,
        };
        let manager = ConnectionManager::new(config);

        // The project doesn't exist yet, so nobody could already know its
        // token; this call bootstraps and persists one but still reports
        // unauthorized since none was presented.
        let err = manager.handle_for(Some("alice"), None).await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
        assert!(dir.path().join("alice").join(".auth_token").exists());

        let token = auth::read_token(&dir.path().join("alice")).unwrap().unwrap();
        let handle = manager.handle_for(Some("alice"), Some(&token)).await.unwrap();
        assert!(handle.auth_token().is_some());

        assert!(manager.handle_for(Some("alice"), Some("wrong")).await.is_err());
    }
}
