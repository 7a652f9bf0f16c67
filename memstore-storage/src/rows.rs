//! Row storage (C5): CRUD and scoped finders for `rules`, `project_docs`,
//! and `refs`. Grounded in the reference's `queries::memory_crud` module —
//! free functions over `&Connection`, bound params, a row-parser per table —
//! minus the event-sourcing side channel, which has no counterpart here.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use memstore_core::{MemStoreError, MemStoreResult};

use crate::types::{Page, ProjectDoc, Rule};

fn to_storage_err(e: rusqlite::Error) -> MemStoreError {
    MemStoreError::Storage(e.to_string())
}

/// `rusqlite`'s `chrono` feature is not enabled (see `Cargo.toml`), so
/// timestamps round-trip as RFC3339 strings rather than through `FromSql`/
/// `ToSql` impls on `DateTime<Utc>` directly — the same idiom the reference
/// queries module uses for its `transaction_time`/`valid_time` columns.
fn parse_timestamp(s: &str) -> MemStoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MemStoreError::Storage(format!("parse timestamp {s:?}: {e}")))
}

/// Runs `parse` over a single row, if any, flattening the row-parser's own
/// `MemStoreResult` out of the `rusqlite::Result` the closure must return.
fn query_one<P: Params, T>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: fn(&Row<'_>) -> MemStoreResult<T>,
) -> MemStoreResult<Option<T>> {
    conn.query_row(sql, params, |row| Ok(parse(row)))
        .optional()
        .map_err(to_storage_err)?
        .transpose()
}

/// Same flattening as `query_one`, for a whole result set.
fn query_many<P: Params, T>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: fn(&Row<'_>) -> MemStoreResult<T>,
) -> MemStoreResult<Vec<T>> {
    let mut stmt = conn.prepare(sql).map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params, |row| Ok(parse(row)))
        .map_err(to_storage_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_storage_err)?
        .into_iter()
        .collect();
    rows
}

fn encode_tags(tags: &[String]) -> MemStoreResult<String> {
    for tag in tags {
        if tag.contains('"') {
            return Err(MemStoreError::Validation(format!(
                "tag {tag:?} contains a double quote, which breaks substring tag search"
            )));
        }
    }
    serde_json::to_string(tags).map_err(MemStoreError::Serialization)
}

fn decode_tags(s: &str) -> MemStoreResult<Vec<String>> {
    serde_json::from_str(s).map_err(MemStoreError::Serialization)
}

/// Escapes `%`, `_`, and the escape character itself so a tag is matched as
/// literal text by a `LIKE ... ESCAPE '\'` clause instead of as a pattern.
pub(crate) fn like_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn encode_metadata(meta: &Option<serde_json::Value>) -> MemStoreResult<Option<String>> {
    meta.as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(MemStoreError::Serialization)
}

fn decode_metadata(s: Option<String>) -> MemStoreResult<Option<serde_json::Value>> {
    s.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(MemStoreError::Serialization)
}

pub mod rules {
    use super::*;

    fn row_to_rule(row: &Row<'_>) -> MemStoreResult<(Rule, String, Option<String>)> {
        let created_at: String = row.get(5).map_err(to_storage_err)?;
        let updated_at: String = row.get(6).map_err(to_storage_err)?;
        Ok((
            Rule {
                id: row.get(0).map_err(to_storage_err)?,
                content: row.get(1).map_err(to_storage_err)?,
                tags: Vec::new(),
                tier: row.get(3).map_err(to_storage_err)?,
                metadata: None,
                embedding: None,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            },
            row.get(2).map_err(to_storage_err)?,
            row.get(4).map_err(to_storage_err)?,
        ))
    }

    const COLUMNS: &str = "id, content, tags, tier, metadata, created_at, updated_at";

    fn finish(
        (mut rule, tags_json, metadata_json): (Rule, String, Option<String>),
    ) -> MemStoreResult<Rule> {
        rule.tags = decode_tags(&tags_json)?;
        rule.metadata = decode_metadata(metadata_json)?;
        Ok(rule)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create(
        conn: &Connection,
        id: &str,
        content: &str,
        tags: &[String],
        tier: i64,
        metadata: &Option<serde_json::Value>,
    ) -> MemStoreResult<Rule> {
        let now = Utc::now();
        let tags_json = encode_tags(tags)?;
        let metadata_json = encode_metadata(metadata)?;

        conn.execute(
            "INSERT INTO rules (id, content, tags, tier, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, content, tags_json, tier, metadata_json, now.to_rfc3339()],
        )
        .map_err(to_storage_err)?;

        Ok(Rule {
            id: id.to_string(),
            content: content.to_string(),
            tags: tags.to_vec(),
            tier,
            metadata: metadata.clone(),
            embedding: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> MemStoreResult<Option<Rule>> {
        let sql = format!("SELECT {COLUMNS} FROM rules WHERE id = ?1");
        query_one(conn, &sql, params![id], row_to_rule)?.map(finish).transpose()
    }

    /// Read-modify-write: `None` fields leave the existing value untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        conn: &Connection,
        id: &str,
        content: Option<String>,
        tags: Option<Vec<String>>,
        tier: Option<i64>,
        metadata: Option<Option<serde_json::Value>>,
    ) -> MemStoreResult<Option<Rule>> {
        let Some(existing) = find_by_id(conn, id)? else {
            return Ok(None);
        };

        let merged = Rule {
            content: content.unwrap_or(existing.content),
            tags: tags.unwrap_or(existing.tags),
            tier: tier.unwrap_or(existing.tier),
            metadata: metadata.unwrap_or(existing.metadata),
            updated_at: Utc::now(),
            ..existing
        };

        let tags_json = encode_tags(&merged.tags)?;
        let metadata_json = encode_metadata(&merged.metadata)?;

        let rows = conn
            .execute(
                "UPDATE rules SET content = ?2, tags = ?3, tier = ?4, metadata = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![
                    id,
                    merged.content,
                    tags_json,
                    merged.tier,
                    metadata_json,
                    merged.updated_at.to_rfc3339()
                ],
            )
            .map_err(to_storage_err)?;

        if rows == 0 {
            return Ok(None);
        }
        find_by_id(conn, id)
    }

    pub fn delete(conn: &Connection, id: &str) -> MemStoreResult<bool> {
        let rows = conn
            .execute("DELETE FROM rules WHERE id = ?1", params![id])
            .map_err(to_storage_err)?;
        Ok(rows > 0)
    }

    pub fn list(conn: &Connection, page: Page) -> MemStoreResult<Vec<Rule>> {
        let sql = format!("SELECT {COLUMNS} FROM rules ORDER BY updated_at DESC LIMIT ?1 OFFSET ?2");
        query_many(conn, &sql, params![page.limit, page.offset], row_to_rule)?
            .into_iter()
            .map(finish)
            .collect()
    }

    pub fn count(conn: &Connection) -> MemStoreResult<i64> {
        conn.query_row("SELECT COUNT(*) FROM rules", [], |r| r.get(0))
            .map_err(to_storage_err)
    }

    pub fn find_by_tier(conn: &Connection, tier: i64, page: Page) -> MemStoreResult<Vec<Rule>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM rules WHERE tier = ?1 ORDER BY updated_at DESC LIMIT ?2 OFFSET ?3"
        );
        query_many(conn, &sql, params![tier, page.limit, page.offset], row_to_rule)?
            .into_iter()
            .map(finish)
            .collect()
    }

    /// Coarse OR filter: matches any row whose JSON-encoded `tags` column
    /// contains the literal `"tag"` substring for one of the given tags.
    pub fn find_by_tags(conn: &Connection, tags: &[String], page: Page) -> MemStoreResult<Vec<Rule>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let clauses = vec!["tags LIKE ? ESCAPE '\\'"; tags.len()].join(" OR ");
        let sql = format!(
            "SELECT {COLUMNS} FROM rules WHERE ({clauses}) ORDER BY updated_at DESC LIMIT ?{} OFFSET ?{}",
            tags.len() + 1,
            tags.len() + 2
        );
        let mut stmt = conn.prepare(&sql).map_err(to_storage_err)?;
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = tags
            .iter()
            .map(|t| Box::new(format!("%\"{}\"%", like_escape(t))) as Box<dyn rusqlite::ToSql>)
            .collect();
        bound.push(Box::new(page.limit));
        bound.push(Box::new(page.offset));
        let bound_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(bound_refs.as_slice(), |row| Ok(row_to_rule(row)))
            .map_err(to_storage_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(to_storage_err)?
            .into_iter()
            .collect::<MemStoreResult<Vec<_>>>()?
            .into_iter()
            .map(finish)
            .collect();
        rows
    }
}

pub mod project_docs {
    use super::*;

    fn row_to_doc(row: &Row<'_>) -> MemStoreResult<(ProjectDoc, String, Option<String>)> {
        let created_at: String = row.get(7).map_err(to_storage_err)?;
        let updated_at: String = row.get(8).map_err(to_storage_err)?;
        Ok((
            ProjectDoc {
                id: row.get(0).map_err(to_storage_err)?,
                project_id: row.get(1).map_err(to_storage_err)?,
                title: row.get(2).map_err(to_storage_err)?,
                content: row.get(3).map_err(to_storage_err)?,
                file_path: row.get(4).map_err(to_storage_err)?,
                tags: Vec::new(),
                metadata: None,
                embedding: None,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            },
            row.get(5).map_err(to_storage_err)?,
            row.get(6).map_err(to_storage_err)?,
        ))
    }

    const COLUMNS: &str =
        "id, project_id, title, content, file_path, tags, metadata, created_at, updated_at";

    fn finish(
        (mut doc, tags_json, metadata_json): (ProjectDoc, String, Option<String>),
    ) -> MemStoreResult<ProjectDoc> {
        doc.tags = decode_tags(&tags_json)?;
        doc.metadata = decode_metadata(metadata_json)?;
        Ok(doc)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create(
        conn: &Connection,
        id: &str,
        project_id: &str,
        title: &str,
        content: &str,
        file_path: &Option<String>,
        tags: &[String],
        metadata: &Option<serde_json::Value>,
    ) -> MemStoreResult<ProjectDoc> {
        let now = Utc::now();
        let tags_json = encode_tags(tags)?;
        let metadata_json = encode_metadata(metadata)?;

        conn.execute(
            "INSERT INTO project_docs
                (id, project_id, title, content, file_path, tags, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id,
                project_id,
                title,
                content,
                file_path,
                tags_json,
                metadata_json,
                now.to_rfc3339()
            ],
        )
        .map_err(to_storage_err)?;

        Ok(ProjectDoc {
            id: id.to_string(),
            project_id: project_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            file_path: file_path.clone(),
            tags: tags.to_vec(),
            metadata: metadata.clone(),
            embedding: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> MemStoreResult<Option<ProjectDoc>> {
        let sql = format!("SELECT {COLUMNS} FROM project_docs WHERE id = ?1");
        query_one(conn, &sql, params![id], row_to_doc)?.map(finish).transpose()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update(
        conn: &Connection,
        id: &str,
        title: Option<String>,
        content: Option<String>,
        file_path: Option<Option<String>>,
        tags: Option<Vec<String>>,
        metadata: Option<Option<serde_json::Value>>,
    ) -> MemStoreResult<Option<ProjectDoc>> {
        let Some(existing) = find_by_id(conn, id)? else {
            return Ok(None);
        };

        let merged = ProjectDoc {
            title: title.unwrap_or(existing.title),
            content: content.unwrap_or(existing.content),
            file_path: file_path.unwrap_or(existing.file_path),
            tags: tags.unwrap_or(existing.tags),
            metadata: metadata.unwrap_or(existing.metadata),
            updated_at: Utc::now(),
            ..existing
        };

        let tags_json = encode_tags(&merged.tags)?;
        let metadata_json = encode_metadata(&merged.metadata)?;

        let rows = conn
            .execute(
                "UPDATE project_docs SET title = ?2, content = ?3, file_path = ?4,
                    tags = ?5, metadata = ?6, updated_at = ?7 WHERE id = ?1",
                params![
                    id,
                    merged.title,
                    merged.content,
                    merged.file_path,
                    tags_json,
                    metadata_json,
                    merged.updated_at.to_rfc3339()
                ],
            )
            .map_err(to_storage_err)?;

        if rows == 0 {
            return Ok(None);
        }
        find_by_id(conn, id)
    }

    pub fn delete(conn: &Connection, id: &str) -> MemStoreResult<bool> {
        let rows = conn
            .execute("DELETE FROM project_docs WHERE id = ?1", params![id])
            .map_err(to_storage_err)?;
        Ok(rows > 0)
    }

    pub fn list(conn: &Connection, page: Page) -> MemStoreResult<Vec<ProjectDoc>> {
        let sql =
            format!("SELECT {COLUMNS} FROM project_docs ORDER BY updated_at DESC LIMIT ?1 OFFSET ?2");
        query_many(conn, &sql, params![page.limit, page.offset], row_to_doc)?
            .into_iter()
            .map(finish)
            .collect()
    }

    pub fn count(conn: &Connection) -> MemStoreResult<i64> {
        conn.query_row("SELECT COUNT(*) FROM project_docs", [], |r| r.get(0))
            .map_err(to_storage_err)
    }

    pub fn find_by_project_id(
        conn: &Connection,
        project_id: &str,
        page: Page,
    ) -> MemStoreResult<Vec<ProjectDoc>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM project_docs WHERE project_id = ?1
             ORDER BY updated_at DESC LIMIT ?2 OFFSET ?3"
        );
        query_many(conn, &sql, params![project_id, page.limit, page.offset], row_to_doc)?
            .into_iter()
            .map(finish)
            .collect()
    }
}

pub mod refs {
    use super::*;
    use crate::types::Ref;

    fn row_to_ref(row: &Row<'_>) -> MemStoreResult<(Ref, Option<String>)> {
        let created_at: String = row.get(5).map_err(to_storage_err)?;
        let updated_at: String = row.get(6).map_err(to_storage_err)?;
        Ok((
            Ref {
                id: row.get(0).map_err(to_storage_err)?,
                name: row.get(1).map_err(to_storage_err)?,
                content: row.get(2).map_err(to_storage_err)?,
                channel_id: row.get(3).map_err(to_storage_err)?,
                metadata: None,
                embedding: None,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            },
            row.get(4).map_err(to_storage_err)?,
        ))
    }

    const COLUMNS: &str = "id, name, content, channel_id, metadata, created_at, updated_at";

    fn finish((mut r, metadata_json): (Ref, Option<String>)) -> MemStoreResult<Ref> {
        r.metadata = decode_metadata(metadata_json)?;
        Ok(r)
    }

    pub fn create(
        conn: &Connection,
        id: &str,
        name: &str,
        content: &str,
        channel_id: &Option<String>,
        metadata: &Option<serde_json::Value>,
    ) -> MemStoreResult<Ref> {
        let now = Utc::now();
        let metadata_json = encode_metadata(metadata)?;

        conn.execute(
            "INSERT INTO refs (id, name, content, channel_id, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, name, content, channel_id, metadata_json, now.to_rfc3339()],
        )
        .map_err(to_storage_err)?;

        Ok(Ref {
            id: id.to_string(),
            name: name.to_string(),
            content: content.to_string(),
            channel_id: channel_id.clone(),
            metadata: metadata.clone(),
            embedding: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> MemStoreResult<Option<Ref>> {
        let sql = format!("SELECT {COLUMNS} FROM refs WHERE id = ?1");
        query_one(conn, &sql, params![id], row_to_ref)?.map(finish).transpose()
    }

    /// No uniqueness constraint on `name`; returns the most recently updated match.
    pub fn find_by_name(conn: &Connection, name: &str) -> MemStoreResult<Option<Ref>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM refs WHERE name = ?1 ORDER BY updated_at DESC LIMIT 1"
        );
        query_one(conn, &sql, params![name], row_to_ref)?.map(finish).transpose()
    }

    pub fn find_by_channel_id(
        conn: &Connection,
        channel_id: &str,
        page: Page,
    ) -> MemStoreResult<Vec<Ref>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM refs WHERE channel_id = ?1
             ORDER BY updated_at DESC LIMIT ?2 OFFSET ?3"
        );
        query_many(conn, &sql, params![channel_id, page.limit, page.offset], row_to_ref)?
            .into_iter()
            .map(finish)
            .collect()
    }

    pub fn update(
        conn: &Connection,
        id: &str,
        name: Option<String>,
        content: Option<String>,
        channel_id: Option<Option<String>>,
        metadata: Option<Option<serde_json::Value>>,
    ) -> MemStoreResult<Option<Ref>> {
        let Some(existing) = find_by_id(conn, id)? else {
            return Ok(None);
        };

        let merged = Ref {
            name: name.unwrap_or(existing.name),
            content: content.unwrap_or(existing.content),
            channel_id: channel_id.unwrap_or(existing.channel_id),
            metadata: metadata.unwrap_or(existing.metadata),
            updated_at: Utc::now(),
            ..existing
        };

        let metadata_json = encode_metadata(&merged.metadata)?;

        let rows = conn
            .execute(
                "UPDATE refs SET name = ?2, content = ?3, channel_id = ?4, metadata = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![
                    id,
                    merged.name,
                    merged.content,
                    merged.channel_id,
                    metadata_json,
                    merged.updated_at.to_rfc3339()
                ],
            )
            .map_err(to_storage_err)?;

        if rows == 0 {
            return Ok(None);
        }
        find_by_id(conn, id)
    }

    pub fn delete(conn: &Connection, id: &str) -> MemStoreResult<bool> {
        let rows = conn
            .execute("DELETE FROM refs WHERE id = ?1", params![id])
            .map_err(to_storage_err)?;
        Ok(rows > 0)
    }

    pub fn list(conn: &Connection, page: Page) -> MemStoreResult<Vec<Ref>> {
        let sql = format!("SELECT {COLUMNS} FROM refs ORDER BY updated_at DESC LIMIT ?1 OFFSET ?2");
        query_many(conn, &sql, params![page.limit, page.offset], row_to_ref)?
            .into_iter()
            .map(finish)
            .collect()
    }

    pub fn count(conn: &Connection) -> MemStoreResult<i64> {
        conn.query_row("SELECT COUNT(*) FROM refs", [], |r| r.get(0))
            .map_err(to_storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    fn fresh_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::pragmas::apply_pragmas(&conn).unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn rs_01_create_and_find_rule_round_trips() {
        let conn = fresh_conn();
        let r = rules::create(&conn, "r1", "always test", &["style".into()], 2, &None).unwrap();
        let found = rules::find_by_id(&conn, "r1").unwrap().unwrap();
        assert_eq!(found, r);
    }

    #[test]
    fn rs_02_update_merges_and_bumps_updated_at() {
        let conn = fresh_conn();
        let created = rules::create(&conn, "r1", "old", &[], 1, &None).unwrap();
        let updated = rules::update(&conn, "r1", Some("new".into()), None, None, None)
            .unwrap()
            .unwrap();
        assert_eq!(updated.content, "new");
        assert_eq!(updated.tier, 1);
        assert!(
            updated.updated_at > created.updated_at,
            "update must bump updated_at even within the same wall-clock second"
        );
    }

    #[test]
    fn rs_03_update_missing_row_is_absent() {
        let conn = fresh_conn();
        assert_eq!(rules::update(&conn, "missing", Some("x".into()), None, None, None).unwrap(), None);
    }

    #[test]
    fn rs_04_delete_reports_whether_a_row_was_removed() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        assert!(rules::delete(&conn, "r1").unwrap());
        assert!(!rules::delete(&conn, "r1").unwrap());
    }

    #[test]
    fn rs_05_list_orders_by_updated_at_desc() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c1", &[], 1, &None).unwrap();
        rules::create(&conn, "r2", "c2", &[], 1, &None).unwrap();
        let page = rules::list(&conn, Page::default()).unwrap();
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn rs_06_find_by_tier_scopes_correctly() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        rules::create(&conn, "r2", "c", &[], 3, &None).unwrap();
        let tier1 = rules::find_by_tier(&conn, 1, Page::default()).unwrap();
        assert_eq!(tier1.len(), 1);
        assert_eq!(tier1[0].id, "r1");
    }

    #[test]
    fn rs_07_find_by_tags_is_an_or_filter() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &["a".into()], 1, &None).unwrap();
        rules::create(&conn, "r2", "c", &["b".into()], 1, &None).unwrap();
        rules::create(&conn, "r3", "c", &["c".into()], 1, &None).unwrap();
        let hits = rules::find_by_tags(&conn, &["a".into(), "b".into()], Page::default()).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn rs_08_tag_with_quote_is_rejected() {
        let conn = fresh_conn();
        let err = rules::create(&conn, "r1", "c", &["bad\"tag".into()], 1, &None);
        assert!(err.is_err());
    }

    #[test]
    fn rs_09_project_doc_scoped_finder() {
        let conn = fresh_conn();
        project_docs::create(&conn, "d1", "proj-a", "readme", "body", &None, &[], &None).unwrap();
        project_docs::create(&conn, "d2", "proj-b", "readme", "body", &None, &[], &None).unwrap();
        let hits = project_docs::find_by_project_id(&conn, "proj-a", Page::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "d1");
    }

    #[test]
    fn rs_10_ref_find_by_name_returns_most_recent() {
        let conn = fresh_conn();
        refs::create(&conn, "x1", "shared-name", "first", &None, &None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        refs::create(&conn, "x2", "shared-name", "second", &None, &None).unwrap();
        let found = refs::find_by_name(&conn, "shared-name").unwrap().unwrap();
        assert_eq!(found.id, "x2");
    }

    #[test]
    fn rs_11_ref_find_by_channel_id() {
        let conn = fresh_conn();
        refs::create(&conn, "x1", "n", "c", &Some("chan-1".into()), &None).unwrap();
        refs::create(&conn, "x2", "n", "c", &Some("chan-2".into()), &None).unwrap();
        let hits = refs::find_by_channel_id(&conn, "chan-1", Page::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "x1");
    }

    #[test]
    fn rs_12_counts_match_row_totals() {
        let conn = fresh_conn();
        rules::create(&conn, "r1", "c", &[], 1, &None).unwrap();
        rules::create(&conn, "r2", "c", &[], 1, &None).unwrap();
        assert_eq!(rules::count(&conn).unwrap(), 2);
    }
}
