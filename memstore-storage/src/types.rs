//! Row types persisted by the store, plus the cross-table search result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A table tag used by the vector index and search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Rule,
    ProjectDoc,
    Ref,
}

impl Table {
    /// The literal table/column-namespace name, as it appears in SQL and in cache keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Rule => "rules",
            Table::ProjectDoc => "project_docs",
            Table::Ref => "refs",
        }
    }

    /// The type tag used on `SearchResult` and cache-key prefixes.
    pub fn kind(self) -> &'static str {
        match self {
            Table::Rule => "rule",
            Table::ProjectDoc => "project_doc",
            Table::Ref => "ref",
        }
    }

    pub fn parse(name: &str) -> Option<Table> {
        match name {
            "rules" => Some(Table::Rule),
            "project_docs" => Some(Table::ProjectDoc),
            "refs" => Some(Table::Ref),
            _ => None,
        }
    }

    pub const ALL: [Table; 3] = [Table::Rule, Table::ProjectDoc, Table::Ref];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub tier: i64,
    pub metadata: Option<Value>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDoc {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub content: String,
    pub file_path: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Option<Value>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ref {
    pub id: String,
    pub name: String,
    pub content: String,
    pub channel_id: Option<String>,
    pub metadata: Option<Value>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub similarity_score: f32,
    pub r#type: &'static str,
    pub metadata: Option<Value>,
}

/// Default pagination used by `list` and every scoped finder.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Options accepted by `semantic_search`/`search_in_table`/`find_similar`.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: f32,
    pub include_metadata: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.7,
            include_metadata: true,
        }
    }
}

/// Scoping filters accepted by `semantic_search`. Each field only narrows
/// tables that carry the matching column — `project_id` keeps project docs,
/// `channel_id` keeps refs, `tier` keeps rules, and `tags` keeps rules and
/// project docs (refs have no tags column). A table a given filter doesn't
/// apply to is excluded from that search entirely rather than ignoring the
/// filter, so a scoped search never silently widens past what was asked for.
#[derive(Debug, Clone, Default)]
pub struct SearchScope {
    pub project_id: Option<String>,
    pub channel_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub tier: Option<i64>,
}
