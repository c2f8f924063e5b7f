use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params, params_from_iter};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::errors::StoreError;
use crate::models::{ContentStatus, ContentVersion, LineageNode, StoreStats};
use crate::store::embedding;

/// Async-safe handle to the version store.
///
/// Wraps `VersionStore` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<std::sync::Mutex<VersionStore>>,
}

impl StoreHandle {
    pub fn new(store: VersionStore) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(store)),
        }
    }

    /// Run a closure with access to the store on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&VersionStore) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }

    /// Acquire the store mutex synchronously. Used in contexts where
    /// blocking is acceptable: CLI commands, startup, and tests. Callers
    /// must ensure this is NOT called from a hot async path.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, VersionStore>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

const VERSION_COLUMNS: &str =
    "id, chapter_id, content, status, producer, metadata, created_at, parent_version_id";

/// SQLite-backed record of every content version.
///
/// Similarity threshold and result limit come from configuration at
/// construction time so no policy number is hard-coded at a call site.
pub struct VersionStore {
    conn: Connection,
    similarity_threshold: f32,
    max_search_results: usize,
}

impl VersionStore {
    /// Open (or create) the store at the given path and run migrations.
    pub fn open(path: &Path, config: &PipelineConfig) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            similarity_threshold: config.similarity_threshold,
            max_search_results: config.max_search_results,
        };
        store.init()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn open_in_memory(config: &PipelineConfig) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            similarity_threshold: config.similarity_threshold,
            max_search_results: config.max_search_results,
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS versions (
                id TEXT PRIMARY KEY,
                chapter_id TEXT NOT NULL,
                content TEXT NOT NULL,
                status TEXT NOT NULL,
                producer TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                parent_version_id TEXT,
                content_hash TEXT NOT NULL,
                content_length INTEGER NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_versions_chapter ON versions(chapter_id);
            CREATE INDEX IF NOT EXISTS idx_versions_chapter_status
                ON versions(chapter_id, status);
            ",
        )?;
        Ok(())
    }

    /// Persist a version. Validation failures reject the version without
    /// persisting anything; a duplicate id is a validation failure too.
    pub fn save(&self, version: &ContentVersion) -> Result<(), StoreError> {
        if version.id.trim().is_empty() {
            return Err(StoreError::InvalidVersion("missing version id".into()));
        }
        if version.chapter_id.trim().is_empty() {
            return Err(StoreError::InvalidVersion("missing chapter id".into()));
        }
        if version.content.trim().is_empty() {
            return Err(StoreError::InvalidVersion("empty content".into()));
        }
        let exists: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM versions WHERE id = ?1",
            params![version.id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::DuplicateVersion {
                id: version.id.clone(),
            });
        }

        let metadata = serde_json::to_string(&version.metadata)?;
        let vector = embedding::embed(&version.content);
        self.conn.execute(
            "INSERT INTO versions
             (id, chapter_id, content, status, producer, metadata, created_at,
              parent_version_id, content_hash, content_length, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                version.id,
                version.chapter_id,
                version.content,
                version.status.as_str(),
                version.producer.as_str(),
                metadata,
                timestamp_to_sql(version.created_at),
                version.parent_version_id,
                version.fingerprint(),
                version.content.chars().count() as i64,
                embedding::to_bytes(&vector),
            ],
        )?;
        debug!(
            version_id = %version.id,
            chapter_id = %version.chapter_id,
            status = %version.status,
            "saved content version"
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<ContentVersion, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM versions WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], version_row)?;
        match rows.next() {
            Some(row) => row?.into_version(),
            None => Err(StoreError::VersionNotFound { id: id.to_string() }),
        }
    }

    /// All versions of a chapter, ordered by `created_at` ascending
    /// (id ascending as tie-break).
    pub fn list_for_chapter(&self, chapter_id: &str) -> Result<Vec<ContentVersion>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM versions
             WHERE chapter_id = ?1 ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![chapter_id], version_row)?;
        let mut versions = Vec::new();
        for row in rows {
            versions.push(row?.into_version()?);
        }
        Ok(versions)
    }

    /// Most recent version of a chapter, optionally restricted to one
    /// status. Returns `None` when no version matches.
    pub fn latest(
        &self,
        chapter_id: &str,
        status: Option<ContentStatus>,
    ) -> Result<Option<ContentVersion>, StoreError> {
        let mut stmt = match status {
            Some(_) => self.conn.prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM versions
                 WHERE chapter_id = ?1 AND status = ?2
                 ORDER BY created_at DESC, id DESC LIMIT 1"
            ))?,
            None => self.conn.prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM versions
                 WHERE chapter_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1"
            ))?,
        };
        let mut rows = match status {
            Some(s) => stmt.query_map(params![chapter_id, s.as_str()], version_row)?,
            None => stmt.query_map(params![chapter_id], version_row)?,
        };
        match rows.next() {
            Some(row) => Ok(Some(row?.into_version()?)),
            None => Ok(None),
        }
    }

    /// Semantic similarity search over stored versions.
    ///
    /// Scores below the configured threshold are discarded; results are
    /// sorted by score descending, then `created_at` descending, then id.
    /// `limit` defaults to the configured maximum. An empty store yields an
    /// empty vec, never an error.
    pub fn search_similar(
        &self,
        query: &str,
        chapter_filter: Option<&str>,
        status_filter: Option<ContentStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<(ContentVersion, f32)>, StoreError> {
        let mut sql = format!("SELECT {VERSION_COLUMNS}, embedding FROM versions");
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        if let Some(chapter_id) = chapter_filter {
            args.push(chapter_id.to_string());
            clauses.push(format!("chapter_id = ?{}", args.len()));
        }
        if let Some(status) = status_filter {
            args.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", args.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let query_vector = embedding::embed(query);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            let raw = version_row(row)?;
            let blob: Vec<u8> = row.get(8)?;
            Ok((raw, blob))
        })?;

        let mut scored: Vec<(ContentVersion, f32)> = Vec::new();
        for row in rows {
            let (raw, blob) = row?;
            let score = embedding::cosine_similarity(&query_vector, &embedding::from_bytes(&blob));
            if score >= self.similarity_threshold {
                scored.push((raw.into_version()?, score));
            }
        }
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.created_at.cmp(&a.0.created_at))
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        scored.truncate(limit.unwrap_or(self.max_search_results));
        Ok(scored)
    }

    /// Transition a version's status in place. All other columns,
    /// including the fingerprint, are untouched; the row never disappears.
    pub fn update_status(&self, id: &str, new_status: ContentStatus) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE versions SET status = ?1 WHERE id = ?2",
            params![new_status.as_str(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::VersionNotFound { id: id.to_string() });
        }
        debug!(version_id = %id, status = %new_status, "updated version status");
        Ok(())
    }

    /// Remove a version. An id that was never stored is signaled as
    /// `VersionNotFound`, never silently accepted.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM versions WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(StoreError::VersionNotFound { id: id.to_string() });
        }
        debug!(version_id = %id, "deleted version");
        Ok(())
    }

    /// The stored content fingerprint of a version.
    pub fn stored_fingerprint(&self, id: &str) -> Result<String, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT content_hash FROM versions WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(row) => Ok(row?),
            None => Err(StoreError::VersionNotFound { id: id.to_string() }),
        }
    }

    /// Build the lineage forest for a chapter.
    ///
    /// Two passes: index every version by id, then attach each version
    /// under its parent's node. A parent referenced but absent from the
    /// chapter's set becomes a stub node (`version: None`), which signals a
    /// cross-chapter or missing-parent anomaly and is logged rather than
    /// silently absorbed.
    pub fn lineage_tree(&self, chapter_id: &str) -> Result<Vec<LineageNode>, StoreError> {
        let versions = self.list_for_chapter(chapter_id)?;
        let ids: HashSet<String> = versions.iter().map(|v| v.id.clone()).collect();

        let mut children_of: HashMap<String, Vec<ContentVersion>> = HashMap::new();
        let mut roots: Vec<ContentVersion> = Vec::new();
        let mut stub_order: Vec<String> = Vec::new();

        for version in versions {
            match version.parent_version_id.clone() {
                None => roots.push(version),
                Some(parent_id) => {
                    if !ids.contains(&parent_id) {
                        warn!(
                            chapter_id = %chapter_id,
                            version_id = %version.id,
                            parent_id = %parent_id,
                            "lineage parent is missing from this chapter's version set"
                        );
                        if !stub_order.contains(&parent_id) {
                            stub_order.push(parent_id.clone());
                        }
                    }
                    children_of.entry(parent_id).or_default().push(version);
                }
            }
        }

        let mut forest: Vec<LineageNode> = roots
            .into_iter()
            .map(|v| build_node(v, &mut children_of))
            .collect();
        for parent_id in stub_order {
            let children = children_of
                .remove(&parent_id)
                .unwrap_or_default()
                .into_iter()
                .map(|v| build_node(v, &mut children_of))
                .collect();
            forest.push(LineageNode {
                id: parent_id,
                version: None,
                children,
            });
        }
        Ok(forest)
    }

    /// Aggregate counts over the whole store.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM versions", [], |row| row.get(0))?;
        Ok(StoreStats {
            total_versions: total as usize,
            by_status: self.count_grouped_by("status")?,
            by_producer: self.count_grouped_by("producer")?,
            by_chapter: self.count_grouped_by("chapter_id")?,
        })
    }

    fn count_grouped_by(
        &self,
        column: &str,
    ) -> Result<std::collections::BTreeMap<String, usize>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column}, COUNT(*) FROM versions GROUP BY {column}"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = std::collections::BTreeMap::new();
        for row in rows {
            let (key, count) = row?;
            counts.insert(key, count as usize);
        }
        Ok(counts)
    }
}

fn build_node(
    version: ContentVersion,
    children_of: &mut HashMap<String, Vec<ContentVersion>>,
) -> LineageNode {
    let children = children_of
        .remove(&version.id)
        .unwrap_or_default()
        .into_iter()
        .map(|v| build_node(v, children_of))
        .collect();
    LineageNode {
        id: version.id.clone(),
        version: Some(version),
        children,
    }
}

/// Fixed-width UTC serialization so lexicographic ORDER BY matches
/// chronological order.
fn timestamp_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ── Internal row helpers ──────────────────────────────────────────────

/// Intermediate row struct for reading versions from SQLite before
/// converting status / producer / metadata strings into typed values.
struct VersionRow {
    id: String,
    chapter_id: String,
    content: String,
    status: String,
    producer: String,
    metadata: String,
    created_at: String,
    parent_version_id: Option<String>,
}

fn version_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRow> {
    Ok(VersionRow {
        id: row.get(0)?,
        chapter_id: row.get(1)?,
        content: row.get(2)?,
        status: row.get(3)?,
        producer: row.get(4)?,
        metadata: row.get(5)?,
        created_at: row.get(6)?,
        parent_version_id: row.get(7)?,
    })
}

impl VersionRow {
    fn into_version(self) -> Result<ContentVersion, StoreError> {
        let status = self
            .status
            .parse()
            .map_err(|_| StoreError::CorruptRecord {
                field: "status".into(),
                value: self.status.clone(),
            })?;
        let producer = self
            .producer
            .parse()
            .map_err(|_| StoreError::CorruptRecord {
                field: "producer".into(),
                value: self.producer.clone(),
            })?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|_| StoreError::CorruptRecord {
                field: "created_at".into(),
                value: self.created_at.clone(),
            })?
            .with_timezone(&Utc);
        let metadata = serde_json::from_str(&self.metadata)?;

        Ok(ContentVersion {
            id: self.id,
            chapter_id: self.chapter_id,
            content: self.content,
            status,
            producer,
            metadata,
            created_at,
            parent_version_id: self.parent_version_id,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
