//! Vector index (C6): embedding storage plus brute-force cosine search
//! across the three row tables. No ANN structure — O(N·d) per search, the
//! deliberate trade-off the design favors over index staleness.

use rusqlite::{params, Connection, OptionalExtension};

use memstore_core::{MemStoreError, MemStoreResult};
use memstore_vector::{cosine_similarity, validate_dimensions};

use crate::types::{SearchOptions, SearchResult, SearchScope, Table};

fn to_storage_err(e: rusqlite::Error) -> MemStoreError {
    MemStoreError::Storage(e.to_string())
}

fn validate_query_dimensions(query: &[f32], dimensions: usize) -> MemStoreResult<()> {
    validate_dimensions(query, dimensions).map_err(|_| MemStoreError::DimensionMismatch {
        expected: dimensions,
        actual: query.len(),
    })
}

/// Whether `table` carries every column a set `scope` field filters on.
/// A field with no matching column on `table` excludes the whole table
/// rather than being silently ignored for it.
fn scope_applies(table: Table, scope: &SearchScope) -> bool {
    if scope.project_id.is_some() && table != Table::ProjectDoc {
        return false;
    }
    if scope.channel_id.is_some() && table != Table::Ref {
        return false;
    }
    if scope.tier.is_some() && table != Table::Rule {
        return false;
    }
    if scope.tags.is_some() && table == Table::Ref {
        return false;
    }
    true
}

/// Writes a single embedding, dimension-checked against `dimensions`.
pub fn store_embedding(
    conn: &Connection,
    table: Table,
    id: &str,
    v: &[f32],
    dimensions: usize,
) -> MemStoreResult<()> {
    validate_dimensions(v, dimensions).map_err(|_| MemStoreError::DimensionMismatch {
        expected: dimensions,
        actual: v.len(),
    })?;
    let bytes = memstore_vector::serialize(v);
    let sql = format!("UPDATE {} SET embedding = ?1 WHERE id = ?2", table.as_str());
    let rows = conn.execute(&sql, params![bytes, id]).map_err(to_storage_err)?;
    if rows == 0 {
        return Err(MemStoreError::Storage(format!(
            "no row {id} in {}",
            table.as_str()
        )));
    }
    Ok(())
}

pub fn get_embedding(conn: &Connection, table: Table, id: &str) -> MemStoreResult<Option<Vec<f32>>> {
    let sql = format!("SELECT embedding FROM {} WHERE id = ?1", table.as_str());
    let bytes: Option<Option<Vec<u8>>> = conn
        .query_row(&sql, params![id], |row| row.get(0))
        .optional()
        .map_err(to_storage_err)?;
    match bytes.flatten() {
        Some(b) => memstore_vector::deserialize(&b)
            .map(Some)
            .map_err(|e| MemStoreError::Storage(e.to_string())),
        None => Ok(None),
    }
}

/// One update per `(table, id, embedding)` triple, wrapped in a single transaction.
pub fn batch_store_embeddings(
    conn: &Connection,
    items: &[(Table, String, Vec<f32>)],
    dimensions: usize,
) -> MemStoreResult<()> {
    crate::pool::with_transaction(conn, |conn| {
        for (table, id, v) in items {
            store_embedding(conn, *table, id, v, dimensions)?;
        }
        Ok(())
    })
}

/// Nulls the `embedding` column in one table, or all three when `table` is `None`.
pub fn clear_embeddings(conn: &Connection, table: Option<Table>) -> MemStoreResult<()> {
    let tables: &[Table] = match &table {
        Some(t) => std::slice::from_ref(t),
        None => &Table::ALL,
    };
    for t in tables {
        let sql = format!("UPDATE {} SET embedding = NULL", t.as_str());
        conn.execute(&sql, []).map_err(to_storage_err)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TableStats {
    pub total: i64,
    pub embedded: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStats {
    pub rules: TableStats,
    pub project_docs: TableStats,
    pub refs: TableStats,
    pub total: i64,
    pub total_embedded: i64,
}

pub fn index_stats(conn: &Connection) -> MemStoreResult<IndexStats> {
    let mut stats = IndexStats::default();
    for table in Table::ALL {
        let sql = format!(
            "SELECT COUNT(*), COUNT(embedding) FROM {}",
            table.as_str()
        );
        let (total, embedded): (i64, i64) = conn
            .query_row(&sql, [], |r| Ok((r.get(0)?, r.get(1)?)))
            .map_err(to_storage_err)?;
        let entry = TableStats { total, embedded };
        match table {
            Table::Rule => stats.rules = entry,
            Table::ProjectDoc => stats.project_docs = entry,
            Table::Ref => stats.refs = entry,
        }
        stats.total += total;
        stats.total_embedded += embedded;
    }
    Ok(stats)
}

struct Candidate {
    id: String,
    content: String,
    similarity: f32,
    table: Table,
    metadata: Option<serde_json::Value>,
}

fn scan_table(
    conn: &Connection,
    table: Table,
    query: &[f32],
    opts: &SearchOptions,
    scope: &SearchScope,
) -> MemStoreResult<Vec<Candidate>> {
    if !scope_applies(table, scope) {
        return Ok(Vec::new());
    }

    let metadata_col = if opts.include_metadata { ", metadata" } else { "" };
    let mut clauses = vec!["embedding IS NOT NULL".to_string()];
    let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(project_id) = &scope.project_id {
        clauses.push("project_id = ?".to_string());
        bound.push(Box::new(project_id.clone()));
    }
    if let Some(channel_id) = &scope.channel_id {
        clauses.push("channel_id = ?".to_string());
        bound.push(Box::new(channel_id.clone()));
    }
    if let Some(tier) = scope.tier {
        clauses.push("tier = ?".to_string());
        bound.push(Box::new(tier));
    }
    if let Some(tags) = &scope.tags {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let tag_clauses = vec!["tags LIKE ? ESCAPE '\\'"; tags.len()].join(" OR ");
        clauses.push(format!("({tag_clauses})"));
        for tag in tags {
            bound.push(Box::new(format!("%\"{}\"%", crate::rows::like_escape(tag))));
        }
    }

    let where_sql = clauses.join(" AND ");
    let sql = format!(
        "SELECT id, content, embedding{metadata_col} FROM {} WHERE {where_sql}",
        table.as_str()
    );
    let mut stmt = conn.prepare(&sql).map_err(to_storage_err)?;
    let include_metadata = opts.include_metadata;
    let bound_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();

    let rows = stmt
        .query_map(bound_refs.as_slice(), move |row| {
            let id: String = row.get(0)?;
            let content: String = row.get(1)?;
            let embedding: Vec<u8> = row.get(2)?;
            let metadata_json: Option<String> = if include_metadata {
                row.get(3)?
            } else {
                None
            };
            Ok((id, content, embedding, metadata_json))
        })
        .map_err(to_storage_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_storage_err)?;

    let mut candidates = Vec::new();
    for (id, content, embedding_bytes, metadata_json) in rows {
        let embedding = memstore_vector::deserialize(&embedding_bytes)
            .map_err(|e| MemStoreError::Storage(e.to_string()))?;
        if embedding.len() != query.len() {
            continue;
        }
        let similarity = cosine_similarity(query, &embedding)
            .map_err(|e| MemStoreError::Storage(e.to_string()))?;
        if similarity >= opts.threshold {
            let metadata = metadata_json
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(MemStoreError::Serialization)?;
            candidates.push(Candidate {
                id,
                content,
                similarity,
                table,
                metadata,
            });
        }
    }
    Ok(candidates)
}

fn to_results(mut candidates: Vec<Candidate>, limit: usize) -> Vec<SearchResult> {
    candidates.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
    candidates
        .into_iter()
        .take(limit)
        .map(|c| SearchResult {
            id: c.id,
            content: c.content,
            similarity_score: c.similarity,
            r#type: c.table.kind(),
            metadata: c.metadata,
        })
        .collect()
}

/// Scans every table `scope` doesn't rule out; ties break by table order
/// (rules, project_docs, refs), then row order. Rejects `query` up front if
/// its length doesn't match the store's configured `dimensions`, rather than
/// scanning and silently finding nothing.
pub fn semantic_search(
    conn: &Connection,
    query: &[f32],
    opts: &SearchOptions,
    scope: &SearchScope,
    dimensions: usize,
) -> MemStoreResult<Vec<SearchResult>> {
    validate_query_dimensions(query, dimensions)?;
    let mut all = Vec::new();
    for table in Table::ALL {
        all.extend(scan_table(conn, table, query, opts, scope)?);
    }
    Ok(to_results(all, opts.limit))
}

pub fn search_in_table(
    conn: &Connection,
    table: Table,
    query: &[f32],
    opts: &SearchOptions,
    scope: &SearchScope,
    dimensions: usize,
) -> MemStoreResult<Vec<SearchResult>> {
    validate_query_dimensions(query, dimensions)?;
    let candidates = scan_table(conn, table, query, opts, scope)?;
    Ok(to_results(candidates, opts.limit))
}

/// Searches using `id`'s own embedding, excluding `id` from the results.
pub fn find_similar(
    conn: &Connection,
    table: Table,
    id: &str,
    opts: &SearchOptions,
    dimensions: usize,
) -> MemStoreResult<Vec<SearchResult>> {
    let embedding = get_embedding(conn, table, id)?
        .ok_or_else(|| MemStoreError::Storage(format!("no embedding for {id}")))?;
    let results = semantic_search(conn, &embedding, opts, &SearchScope::default(), dimensions)?;
    Ok(results.into_iter().filter(|r| r.id != id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use crate::rows::rules;

    fn fresh_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::pragmas::apply_pragmas(&conn).unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn vi_01_store_and_get_embedding_round_trips() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        store_embedding(&conn, Table::Rule, "r1", &[1.0, 0.0, 0.0], 3).unwrap();
        let got = get_embedding(&conn, Table::Rule, "r1").unwrap().unwrap();
        assert_eq!(got, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn vi_02_missing_embedding_is_absent() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        assert_eq!(get_embedding(&conn, Table::Rule, "r1").unwrap(), None);
    }

    #[test]
    fn vi_03_dimension_mismatch_is_rejected() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        let err = store_embedding(&conn, Table::Rule, "r1", &[1.0, 0.0], 3);
        assert!(matches!(err, Err(MemStoreError::DimensionMismatch { .. })));
    }

    #[test]
    fn vi_04_self_similarity_is_one() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        let e = vec![0.6, 0.8, 0.0];
        store_embedding(&conn, Table::Rule, "r1", &e, 3).unwrap();
        let opts = SearchOptions {
            limit: 1,
            threshold: 0.0,
            include_metadata: true,
        };
        let results = semantic_search(&conn, &e, &opts, &SearchScope::default(), 3).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "r1");
        assert!((results[0].similarity_score - 1.0).abs() < 0.001);
    }

    #[test]
    fn vi_05_find_similar_excludes_self() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        rules::create(&conn, "r2", "c", &[], 1, &None).unwrap();
        store_embedding(&conn, Table::Rule, "r1", &[1.0, 0.0, 0.0], 3).unwrap();
        store_embedding(&conn, Table::Rule, "r2", &[0.9, 0.1, 0.0], 3).unwrap();
        let opts = SearchOptions {
            limit: 10,
            threshold: 0.0,
            include_metadata: true,
        };
        let results = find_similar(&conn, Table::Rule, "r1", &opts, 3).unwrap();
        assert!(results.iter().all(|r| r.id != "r1"));
        assert_eq!(results[0].id, "r2");
    }

    #[test]
    fn vi_06_index_stats_counts_embedded_rows() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        rules::create(&conn, "r2", "c", &[], 1, &None).unwrap();
        store_embedding(&conn, Table::Rule, "r1", &[1.0, 0.0, 0.0], 3).unwrap();
        let stats = index_stats(&conn).unwrap();
        assert_eq!(stats.rules.total, 2);
        assert_eq!(stats.rules.embedded, 1);
    }

    #[test]
    fn vi_07_clear_embeddings_scoped_to_one_table() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        store_embedding(&conn, Table::Rule, "r1", &[1.0, 0.0, 0.0], 3).unwrap();
        clear_embeddings(&conn, Some(Table::Rule)).unwrap();
        assert_eq!(get_embedding(&conn, Table::Rule, "r1").unwrap(), None);
    }

    #[test]
    fn vi_08_threshold_filters_dissimilar_rows() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        store_embedding(&conn, Table::Rule, "r1", &[-1.0, 0.0, 0.0], 3).unwrap();
        let opts = SearchOptions {
            limit: 10,
            threshold: 0.9,
            include_metadata: true,
        };
        let results = semantic_search(&conn, &[1.0, 0.0, 0.0], &opts, &SearchScope::default(), 3).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn vi_09_query_dimension_mismatch_is_rejected() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        store_embedding(&conn, Table::Rule, "r1", &[1.0, 0.0, 0.0], 3).unwrap();
        let opts = SearchOptions {
            limit: 10,
            threshold: 0.0,
            include_metadata: true,
        };
        let err = semantic_search(&conn, &[1.0, 0.0], &opts, &SearchScope::default(), 3);
        assert!(matches!(err, Err(MemStoreError::DimensionMismatch { .. })));
    }

    #[test]
    fn vi_10_tier_scope_excludes_tables_without_a_tier_column() {
        let conn = fresh_conn();
        let e = vec![1.0, 0.0, 0.0];
        rules::create(&conn, "r1", "c", &[], 2, &None).unwrap();
        store_embedding(&conn, Table::Rule, "r1", &e, 3).unwrap();
        crate::rows::refs::create(&conn, "x1", "n", "c", &None, &None).unwrap();
        store_embedding(&conn, Table::Ref, "x1", &e, 3).unwrap();

        let opts = SearchOptions {
            limit: 10,
            threshold: 0.0,
            include_metadata: false,
        };
        let scope = SearchScope {
            tier: Some(2),
            ..SearchScope::default()
        };
        let results = semantic_search(&conn, &e, &opts, &scope, 3).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "r1");
    }

    #[test]
    fn vi_11_project_id_scope_filters_within_project_docs() {
        use crate::rows::project_docs;

        let conn = fresh_conn();
        let e = vec![1.0, 0.0, 0.0];
        project_docs::create(&conn, "d1", "proj-a", "t", "c", &None, &[], &None).unwrap();
        project_docs::create(&conn, "d2", "proj-b", "t", "c", &None, &[], &None).unwrap();
        store_embedding(&conn, Table::ProjectDoc, "d1", &e, 3).unwrap();
        store_embedding(&conn, Table::ProjectDoc, "d2", &e, 3).unwrap();

        let opts = SearchOptions {
            limit: 10,
            threshold: 0.0,
            include_metadata: false,
        };
        let scope = SearchScope {
            project_id: Some("proj-a".to_string()),
            ..SearchScope::default()
        };
        let results = semantic_search(&conn, &e, &opts, &scope, 3).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "d1");
    }
}
