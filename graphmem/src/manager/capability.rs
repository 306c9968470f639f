//! Capability probing and graceful degradation (§4.3)
//!
//! libsql's native vector functions (`vector_top_k`, `libsql_vector_idx`) and
//! FTS5 are both compile-time features of the underlying SQLite build. Rather
//! than fail outright when either is missing, the store probes once per
//! connection manager, caches the result, and falls back to a slower but
//! correct path for the lifetime of the process. A probe is never retried
//! automatically — a later `downgrade_*` call is what flips the cache after a
//! real call site hits the same failure mid-flight (e.g. the build gained
//! FTS5 at probe time but a specific table was created before the extension
//! was loaded).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use libsql::Connection;

/// Bound on how long a single capability probe may take before it's treated
/// as unsupported (§4.3)
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Cached yes/no answers for engine features that can vary by build
#[derive(Debug, Default)]
pub struct Capabilities {
    vector: AtomicBool,
    vector_probed: AtomicBool,
    fts: AtomicBool,
    fts_probed: AtomicBool,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a handle with vector search pre-declared unsupported, skipping
    /// the probe entirely. Used for `:memory:` databases, whose vector index
    /// never outlives the connection that would benefit from it.
    pub fn new_skip_vector() -> Self {
        Self {
            vector: AtomicBool::new(false),
            vector_probed: AtomicBool::new(true),
            fts: AtomicBool::new(false),
            fts_probed: AtomicBool::new(false),
        }
    }

    /// Probe (once) whether `vector_top_k` is usable on this connection
    pub async fn vector_search(&self, conn: &Connection) -> bool {
        if self.vector_probed.load(Ordering::Acquire) {
            return self.vector.load(Ordering::Acquire);
        }

        let supported = tokio::time::timeout(PROBE_TIMEOUT, probe_vector(conn))
            .await
            .unwrap_or(false);
        self.vector.store(supported, Ordering::Release);
        self.vector_probed.store(true, Ordering::Release);
        supported
    }

    /// Probe (once) whether FTS5 is usable on this connection
    pub async fn fts(&self, conn: &Connection) -> bool {
        if self.fts_probed.load(Ordering::Acquire) {
            return self.fts.load(Ordering::Acquire);
        }

        let supported = tokio::time::timeout(PROBE_TIMEOUT, probe_fts(conn))
            .await
            .unwrap_or(false);
        self.fts.store(supported, Ordering::Release);
        self.fts_probed.store(true, Ordering::Release);
        supported
    }

    /// Force vector search off after a concrete call site failed despite a
    /// positive probe (e.g. the index was dropped out from under us)
    pub fn downgrade_vector(&self) {
        self.vector.store(false, Ordering::Release);
        self.vector_probed.store(true, Ordering::Release);
    }

    /// Force FTS off after a concrete call site failed despite a positive probe
    pub fn downgrade_fts(&self) {
        self.fts.store(false, Ordering::Release);
        self.fts_probed.store(true, Ordering::Release);
    }
}

async fn probe_vector(conn: &Connection) -> bool {
    conn.query(
        "SELECT vector_top_k('idx_entities_vector', vector('[0.0]'), 1)",
        (),
    )
    .await
    .is_ok()
}

async fn probe_fts(conn: &Connection) -> bool {
    conn.query(
        "CREATE VIRTUAL TABLE IF NOT EXISTS __graphmem_fts_probe USING fts5(x)",
        (),
    )
    .await
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    #[tokio::test]
    async fn test_fts_probe_memory_db() {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        let caps = Capabilities::new();
        // fts5 is compiled into the bundled libsql build used in tests
        assert!(caps.fts(&conn).await);
        // second call hits the cache, not the probe
        assert!(caps.fts(&conn).await);
    }

    #[tokio::test]
    async fn test_downgrade_sticks() {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        let caps = Capabilities::new();
        caps.fts(&conn).await;
        caps.downgrade_fts();
        assert!(!caps.fts(&conn).await);
    }
}
