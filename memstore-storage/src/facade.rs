//! Memory service facade (C7): the only component that touches the cache
//! and the pool together. Composes the pool, migrations, row storage, and
//! vector index into the operational API collaborators call.
//!
//! Grounded loosely in the reference's `StorageEngine` shape (`open`/
//! `open_in_memory`, a lifecycle guard in front of every operation) — the
//! engine's own source was not in the retrieval pack, so the state machine
//! below (`Uninitialized -> Ready -> ShutDown`) and the cache-aside policy
//! are implemented directly from the operational contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use memstore_core::{CacheConfig, DatabaseConfig, MemStoreConfig, MemStoreError, MemStoreResult, VectorConfig};

use crate::cache::{CacheStats, LruTtlCache};
use crate::migrations::initialize_schema;
use crate::pool::{Pool, PoolStats};
use crate::rows::{project_docs, refs, rules};
use crate::types::{Page, ProjectDoc, Ref, Rule, SearchOptions, SearchResult, SearchScope, Table};
use crate::vector_index;

fn checkout_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Length-prefixes `bytes` into `hasher` so concatenated variable-length
/// fields can't collide across a field boundary.
fn hash_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes().as_slice());
    hasher.update(bytes);
}

struct Caches {
    rule: LruTtlCache<Rule>,
    project_doc: LruTtlCache<ProjectDoc>,
    ref_by_id: LruTtlCache<Ref>,
    ref_by_name: LruTtlCache<Ref>,
    search: LruTtlCache<Vec<SearchResult>>,
}

impl Caches {
    fn new(cfg: &CacheConfig) -> Self {
        let ttl = Duration::from_millis(cfg.ttl_ms);
        Self {
            rule: LruTtlCache::new(cfg.max_size, ttl, cfg.update_age_on_get),
            project_doc: LruTtlCache::new(cfg.max_size, ttl, cfg.update_age_on_get),
            ref_by_id: LruTtlCache::new(cfg.max_size, ttl, cfg.update_age_on_get),
            ref_by_name: LruTtlCache::new(cfg.max_size, ttl, cfg.update_age_on_get),
            search: LruTtlCache::new(cfg.max_size, ttl, cfg.update_age_on_get),
        }
    }

    fn clear_all(&self) {
        self.rule.clear();
        self.project_doc.clear();
        self.ref_by_id.clear();
        self.ref_by_name.clear();
        self.search.clear();
    }
}

/// Aggregated pool/cache/index stats returned by `stats()`.
#[derive(Debug, Clone)]
pub struct MemStoreStats {
    pub pool: PoolStats,
    pub rule_cache: CacheStats,
    pub project_doc_cache: CacheStats,
    pub ref_id_cache: CacheStats,
    pub ref_name_cache: CacheStats,
    pub search_cache: CacheStats,
    pub index: vector_index::IndexStats,
}

pub struct MemoryService {
    pool: std::sync::OnceLock<std::sync::Arc<Pool>>,
    caches: std::sync::OnceLock<Caches>,
    database: DatabaseConfig,
    cache: CacheConfig,
    vector: VectorConfig,
    ready: AtomicBool,
}

impl MemoryService {
    pub fn new(config: MemStoreConfig) -> Self {
        Self {
            pool: std::sync::OnceLock::new(),
            caches: std::sync::OnceLock::new(),
            database: config.database,
            cache: config.cache,
            vector: config.vector,
            ready: AtomicBool::new(false),
        }
    }

    fn open_pool(&self) -> std::sync::Arc<Pool> {
        let max_connections = self.database.max_connections;
        let idle_timeout = Duration::from_millis(self.database.idle_timeout_ms);
        if self.database.url == ":memory:" {
            Pool::open_in_memory(max_connections, idle_timeout)
        } else {
            let path = self
                .database
                .url
                .strip_prefix("file:")
                .unwrap_or(&self.database.url);
            Pool::open(path, max_connections, idle_timeout)
        }
    }

    /// Idempotent-with-warning: a second call is a no-op that logs and returns `Ok(())`.
    pub fn initialize(&self) -> MemStoreResult<()> {
        if self.ready.load(Ordering::SeqCst) {
            tracing::warn!("initialize() called on an already-ready memory store");
            return Ok(());
        }

        let pool = self.open_pool();
        pool.with_connection(checkout_timeout(), |conn| {
            initialize_schema(conn).map(|_| ())
        })?;

        let _ = self.pool.set(pool);
        let _ = self.caches.set(Caches::new(&self.cache));
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!("memory store initialized");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        if let Some(pool) = self.pool.get() {
            pool.shutdown();
        }
        self.ready.store(false, Ordering::SeqCst);
        tracing::info!("memory store shut down");
    }

    fn ensure_initialized(&self) -> MemStoreResult<(&std::sync::Arc<Pool>, &Caches)> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(MemStoreError::NotInitialized);
        }
        let pool = self.pool.get().ok_or(MemStoreError::NotInitialized)?;
        let caches = self.caches.get().ok_or(MemStoreError::NotInitialized)?;
        Ok((pool, caches))
    }

    pub fn health_check(&self) -> bool {
        let Ok((pool, _)) = self.ensure_initialized() else {
            return false;
        };
        pool.with_connection(checkout_timeout(), |conn| {
            Ok(crate::pragmas::health_probe(conn))
        })
        .unwrap_or(false)
    }

    pub fn clear_cache(&self) -> MemStoreResult<()> {
        let (_, caches) = self.ensure_initialized()?;
        caches.clear_all();
        Ok(())
    }

    pub fn stats(&self) -> MemStoreResult<MemStoreStats> {
        let (pool, caches) = self.ensure_initialized()?;
        let index = pool.with_connection(checkout_timeout(), |conn| vector_index::index_stats(conn))?;
        Ok(MemStoreStats {
            pool: pool.stats(),
            rule_cache: caches.rule.stats(),
            project_doc_cache: caches.project_doc.stats(),
            ref_id_cache: caches.ref_by_id.stats(),
            ref_name_cache: caches.ref_by_name.stats(),
            search_cache: caches.search.stats(),
            index,
        })
    }

    // --- Rules -----------------------------------------------------------

    pub fn create_rule(
        &self,
        id: &str,
        content: &str,
        tags: &[String],
        tier: i64,
        metadata: Option<serde_json::Value>,
    ) -> MemStoreResult<Rule> {
        let (pool, caches) = self.ensure_initialized()?;
        let rule = pool.with_connection(checkout_timeout(), |conn| {
            rules::create(conn, id, content, tags, tier, &metadata)
        })?;
        caches.rule.set(&format!("rule:{id}"), rule.clone());
        caches.search.clear();
        Ok(rule)
    }

    pub fn create_rule_with_embedding(
        &self,
        id: &str,
        content: &str,
        tags: &[String],
        tier: i64,
        metadata: Option<serde_json::Value>,
        embedding: &[f32],
    ) -> MemStoreResult<Rule> {
        let (pool, caches) = self.ensure_initialized()?;
        let dimensions = self.vector.vector_dimensions;
        let mut rule = pool.with_connection(checkout_timeout(), |conn| {
            crate::pool::with_transaction(conn, |conn| {
                let created = rules::create(conn, id, content, tags, tier, &metadata)?;
                vector_index::store_embedding(conn, Table::Rule, id, embedding, dimensions)?;
                Ok(created)
            })
        })?;
        rule.embedding = Some(embedding.to_vec());
        caches.rule.set(&format!("rule:{id}"), rule.clone());
        caches.search.clear();
        Ok(rule)
    }

    pub fn get_rule(&self, id: &str) -> MemStoreResult<Option<Rule>> {
        let (pool, caches) = self.ensure_initialized()?;
        let key = format!("rule:{id}");
        if let Some(cached) = caches.rule.get(&key) {
            return Ok(Some(cached));
        }
        let found = pool.with_connection(checkout_timeout(), |conn| rules::find_by_id(conn, id))?;
        if let Some(rule) = &found {
            caches.rule.set(&key, rule.clone());
        }
        Ok(found)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_rule(
        &self,
        id: &str,
        content: Option<String>,
        tags: Option<Vec<String>>,
        tier: Option<i64>,
        metadata: Option<Option<serde_json::Value>>,
    ) -> MemStoreResult<Option<Rule>> {
        let (pool, caches) = self.ensure_initialized()?;
        let updated = pool.with_connection(checkout_timeout(), |conn| {
            rules::update(conn, id, content.clone(), tags.clone(), tier, metadata.clone())
        })?;
        if let Some(rule) = &updated {
            caches.rule.set(&format!("rule:{id}"), rule.clone());
            caches.search.clear();
        }
        Ok(updated)
    }

    pub fn delete_rule(&self, id: &str) -> MemStoreResult<bool> {
        let (pool, caches) = self.ensure_initialized()?;
        let removed = pool.with_connection(checkout_timeout(), |conn| rules::delete(conn, id))?;
        if removed {
            caches.rule.delete(&format!("rule:{id}"));
            caches.search.clear();
        }
        Ok(removed)
    }

    pub fn list_rules(&self, tier: Option<i64>, page: Page) -> MemStoreResult<Vec<Rule>> {
        let (pool, _) = self.ensure_initialized()?;
        pool.with_connection(checkout_timeout(), |conn| match tier {
            Some(tier) => rules::find_by_tier(conn, tier, page),
            None => rules::list(conn, page),
        })
    }

    // --- Project docs ------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn create_project_doc(
        &self,
        id: &str,
        project_id: &str,
        title: &str,
        content: &str,
        file_path: Option<String>,
        tags: &[String],
        metadata: Option<serde_json::Value>,
    ) -> MemStoreResult<ProjectDoc> {
        let (pool, caches) = self.ensure_initialized()?;
        let doc = pool.with_connection(checkout_timeout(), |conn| {
            project_docs::create(conn, id, project_id, title, content, &file_path, tags, &metadata)
        })?;
        caches.project_doc.set(&format!("project_doc:{id}"), doc.clone());
        caches.search.clear();
        Ok(doc)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_project_doc_with_embedding(
        &self,
        id: &str,
        project_id: &str,
        title: &str,
        content: &str,
        file_path: Option<String>,
        tags: &[String],
        metadata: Option<serde_json::Value>,
        embedding: &[f32],
    ) -> MemStoreResult<ProjectDoc> {
        let (pool, caches) = self.ensure_initialized()?;
        let dimensions = self.vector.vector_dimensions;
        let mut doc = pool.with_connection(checkout_timeout(), |conn| {
            crate::pool::with_transaction(conn, |conn| {
                let created =
                    project_docs::create(conn, id, project_id, title, content, &file_path, tags, &metadata)?;
                vector_index::store_embedding(conn, Table::ProjectDoc, id, embedding, dimensions)?;
                Ok(created)
            })
        })?;
        doc.embedding = Some(embedding.to_vec());
        caches.project_doc.set(&format!("project_doc:{id}"), doc.clone());
        caches.search.clear();
        Ok(doc)
    }

    pub fn get_project_doc(&self, id: &str) -> MemStoreResult<Option<ProjectDoc>> {
        let (pool, caches) = self.ensure_initialized()?;
        let key = format!("project_doc:{id}");
        if let Some(cached) = caches.project_doc.get(&key) {
            return Ok(Some(cached));
        }
        let found = pool.with_connection(checkout_timeout(), |conn| project_docs::find_by_id(conn, id))?;
        if let Some(doc) = &found {
            caches.project_doc.set(&key, doc.clone());
        }
        Ok(found)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_project_doc(
        &self,
        id: &str,
        title: Option<String>,
        content: Option<String>,
        file_path: Option<Option<String>>,
        tags: Option<Vec<String>>,
        metadata: Option<Option<serde_json::Value>>,
    ) -> MemStoreResult<Option<ProjectDoc>> {
        let (pool, caches) = self.ensure_initialized()?;
        let updated = pool.with_connection(checkout_timeout(), |conn| {
            project_docs::update(
                conn,
                id,
                title.clone(),
                content.clone(),
                file_path.clone(),
                tags.clone(),
                metadata.clone(),
            )
        })?;
        if let Some(doc) = &updated {
            caches.project_doc.set(&format!("project_doc:{id}"), doc.clone());
            caches.search.clear();
        }
        Ok(updated)
    }

    pub fn delete_project_doc(&self, id: &str) -> MemStoreResult<bool> {
        let (pool, caches) = self.ensure_initialized()?;
        let removed = pool.with_connection(checkout_timeout(), |conn| project_docs::delete(conn, id))?;
        if removed {
            caches.project_doc.delete(&format!("project_doc:{id}"));
            caches.search.clear();
        }
        Ok(removed)
    }

    pub fn list_project_docs(&self, project_id: Option<&str>, page: Page) -> MemStoreResult<Vec<ProjectDoc>> {
        let (pool, _) = self.ensure_initialized()?;
        pool.with_connection(checkout_timeout(), |conn| match project_id {
            Some(pid) => project_docs::find_by_project_id(conn, pid, page),
            None => project_docs::list(conn, page),
        })
    }

    // --- Refs --------------------------------------------------------------

    pub fn create_ref(
        &self,
        id: &str,
        name: &str,
        content: &str,
        channel_id: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> MemStoreResult<Ref> {
        let (pool, caches) = self.ensure_initialized()?;
        let r = pool.with_connection(checkout_timeout(), |conn| {
            refs::create(conn, id, name, content, &channel_id, &metadata)
        })?;
        caches.ref_by_id.set(&format!("ref:{id}"), r.clone());
        caches.ref_by_name.set(&format!("ref:name:{name}"), r.clone());
        caches.search.clear();
        Ok(r)
    }

    pub fn create_ref_with_embedding(
        &self,
        id: &str,
        name: &str,
        content: &str,
        channel_id: Option<String>,
        metadata: Option<serde_json::Value>,
        embedding: &[f32],
    ) -> MemStoreResult<Ref> {
        let (pool, caches) = self.ensure_initialized()?;
        let dimensions = self.vector.vector_dimensions;
        let mut r = pool.with_connection(checkout_timeout(), |conn| {
            crate::pool::with_transaction(conn, |conn| {
                let created = refs::create(conn, id, name, content, &channel_id, &metadata)?;
                vector_index::store_embedding(conn, Table::Ref, id, embedding, dimensions)?;
                Ok(created)
            })
        })?;
        r.embedding = Some(embedding.to_vec());
        caches.ref_by_id.set(&format!("ref:{id}"), r.clone());
        caches.ref_by_name.set(&format!("ref:name:{name}"), r.clone());
        caches.search.clear();
        Ok(r)
    }

    pub fn get_ref(&self, id: &str) -> MemStoreResult<Option<Ref>> {
        let (pool, caches) = self.ensure_initialized()?;
        let key = format!("ref:{id}");
        if let Some(cached) = caches.ref_by_id.get(&key) {
            return Ok(Some(cached));
        }
        let found = pool.with_connection(checkout_timeout(), |conn| refs::find_by_id(conn, id))?;
        if let Some(r) = &found {
            caches.ref_by_id.set(&key, r.clone());
        }
        Ok(found)
    }

    pub fn get_ref_by_name(&self, name: &str) -> MemStoreResult<Option<Ref>> {
        let (pool, caches) = self.ensure_initialized()?;
        let key = format!("ref:name:{name}");
        if let Some(cached) = caches.ref_by_name.get(&key) {
            return Ok(Some(cached));
        }
        let found = pool.with_connection(checkout_timeout(), |conn| refs::find_by_name(conn, name))?;
        if let Some(r) = &found {
            caches.ref_by_name.set(&key, r.clone());
            caches.ref_by_id.set(&format!("ref:{}", r.id), r.clone());
        }
        Ok(found)
    }

    pub fn update_ref(
        &self,
        id: &str,
        name: Option<String>,
        content: Option<String>,
        channel_id: Option<Option<String>>,
        metadata: Option<Option<serde_json::Value>>,
    ) -> MemStoreResult<Option<Ref>> {
        let (pool, caches) = self.ensure_initialized()?;
        let updated = pool.with_connection(checkout_timeout(), |conn| {
            refs::update(conn, id, name.clone(), content.clone(), channel_id.clone(), metadata.clone())
        })?;
        if let Some(r) = &updated {
            caches.ref_by_id.set(&format!("ref:{id}"), r.clone());
            caches.ref_by_name.set(&format!("ref:name:{}", r.name), r.clone());
            caches.search.clear();
        }
        Ok(updated)
    }

    pub fn delete_ref(&self, id: &str) -> MemStoreResult<bool> {
        let (pool, caches) = self.ensure_initialized()?;
        let existing = pool.with_connection(checkout_timeout(), |conn| refs::find_by_id(conn, id))?;
        let removed = pool.with_connection(checkout_timeout(), |conn| refs::delete(conn, id))?;
        if removed {
            caches.ref_by_id.delete(&format!("ref:{id}"));
            caches.search.clear();
            if let Some(r) = existing {
                caches.ref_by_name.delete(&format!("ref:name:{}", r.name));
            }
        }
        Ok(removed)
    }

    pub fn list_refs(&self, channel_id: Option<&str>, page: Page) -> MemStoreResult<Vec<Ref>> {
        let (pool, _) = self.ensure_initialized()?;
        pool.with_connection(checkout_timeout(), |conn| match channel_id {
            Some(cid) => refs::find_by_channel_id(conn, cid, page),
            None => refs::list(conn, page),
        })
    }

    // --- Vector index / search ----------------------------------------------

    pub fn batch_store_embeddings(&self, items: &[(Table, String, Vec<f32>)]) -> MemStoreResult<()> {
        let (pool, caches) = self.ensure_initialized()?;
        let dimensions = self.vector.vector_dimensions;
        pool.with_connection(checkout_timeout(), |conn| {
            vector_index::batch_store_embeddings(conn, items, dimensions)
        })?;
        for (table, id, _) in items {
            caches_for(table, caches).evict(&format!("{}:{id}", table.kind()));
        }
        caches.search.clear();
        Ok(())
    }

    fn search_cache_key(&self, q: &[f32], opts: &SearchOptions, scope: &SearchScope) -> String {
        // Every variable-length field is length-prefixed and `\0`-separated
        // from its neighbor so distinct inputs can never hash to the same
        // key by concatenating across a field boundary (e.g. tags ["ab",
        // "cd"] vs. ["a", "bcd"]).
        let mut hasher = blake3::Hasher::new();
        for f in q {
            hasher.update(&f.to_le_bytes());
        }
        hasher.update(opts.limit.to_le_bytes().as_slice());
        hasher.update(opts.threshold.to_le_bytes().as_slice());
        hasher.update(&[opts.include_metadata as u8]);
        if let Some(pid) = &scope.project_id {
            hash_field(&mut hasher, pid.as_bytes());
        }
        if let Some(cid) = &scope.channel_id {
            hash_field(&mut hasher, cid.as_bytes());
        }
        if let Some(tags) = &scope.tags {
            for t in tags {
                hash_field(&mut hasher, t.as_bytes());
            }
        }
        if let Some(tier) = scope.tier {
            hasher.update(tier.to_le_bytes().as_slice());
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn semantic_search(
        &self,
        q: &[f32],
        opts: &SearchOptions,
        scope: &SearchScope,
    ) -> MemStoreResult<Vec<SearchResult>> {
        let (pool, caches) = self.ensure_initialized()?;
        let key = self.search_cache_key(q, opts, scope);
        if let Some(cached) = caches.search.get(&key) {
            return Ok(cached);
        }
        let dimensions = self.vector.vector_dimensions;
        let results = pool.with_connection(checkout_timeout(), |conn| {
            vector_index::semantic_search(conn, q, opts, scope, dimensions)
        })?;
        caches.search.set(&key, results.clone());
        Ok(results)
    }

    pub fn find_similar(
        &self,
        table: Table,
        id: &str,
        opts: &SearchOptions,
    ) -> MemStoreResult<Vec<SearchResult>> {
        let (pool, _) = self.ensure_initialized()?;
        let dimensions = self.vector.vector_dimensions;
        pool.with_connection(checkout_timeout(), |conn| {
            vector_index::find_similar(conn, table, id, opts, dimensions)
        })
    }
}

fn caches_for<'a>(table: &Table, caches: &'a Caches) -> &'a dyn CacheEvict {
    match table {
        Table::Rule => &caches.rule,
        Table::ProjectDoc => &caches.project_doc,
        Table::Ref => &caches.ref_by_id,
    }
}

trait CacheEvict {
    fn evict(&self, key: &str) -> bool;
}

impl<V: Clone> CacheEvict for LruTtlCache<V> {
    fn evict(&self, key: &str) -> bool {
        self.delete(key)
    }
}
