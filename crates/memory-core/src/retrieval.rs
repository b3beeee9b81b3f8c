use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::llm::LlmGateway;
use crate::store::{retrieval as store_retrieval, taxonomy as store_taxonomy, Store};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One ranked hit from hybrid search, with neighbour content already
/// stitched in and `expired` precomputed for the caller's stable sort.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    pub content: String,
    pub category_path: String,
    pub rrf_score: f64,
    pub semantic_score: f64,
    pub keyword_score: f64,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expired: bool,
}

const ELLIPSIS: &str = "…";

/// Embeds `query`, runs the RRF-combined hybrid search, stitches one prior
/// and one next chunk onto each hit's content, bumps `last_accessed_at` for
/// everything returned, then stable-sorts non-expired hits before expired
/// ones while preserving RRF order within each group.
pub async fn search_memory(
    store: &Store,
    gateway: &dyn LlmGateway,
    config: &Config,
    query: &str,
    category_path: Option<&str>,
    limit: Option<i64>,
) -> Result<Vec<SearchHit>> {
    let limit = limit.unwrap_or(config.default_search_limit).clamp(1, 100);
    let embedding = gateway.embed(query).await?;

    let mut conn = store.acquire().await?;
    let rows = store_retrieval::hybrid_search(&mut conn, &embedding, query, category_path, limit).await?;

    let now = Utc::now();
    let mut hits = Vec::with_capacity(rows.len());
    for row in rows {
        let prev = store_retrieval::prev_sequence_content(&mut conn, row.id).await?;
        let next = store_retrieval::next_sequence_content(&mut conn, row.id).await?;

        let mut content = row.content.clone();
        if let Some(p) = prev {
            content = format!("{p} {ELLIPSIS} {content}");
        }
        if let Some(n) = next {
            content = format!("{content} {ELLIPSIS} {n}");
        }

        crate::store::memories::bump_last_accessed(&mut conn, row.id, now).await?;

        let expired = row.verify_after.map(|v| v < now).unwrap_or(false);
        hits.push(SearchHit {
            id: row.id,
            content,
            category_path: row.category_path,
            rrf_score: row.rrf_score,
            semantic_score: row.semantic_score,
            keyword_score: row.keyword_score,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expired,
        });
    }

    hits.sort_by_key(|h| h.expired);
    Ok(hits)
}

/// A reconstructed document: every chunk in a `sequence_next` chain
/// concatenated in traversal order with blank-line separators.
pub struct AssembledDocument {
    pub memory_id: Uuid,
    pub chunk_count: usize,
    pub category_path: String,
    pub content: String,
}

pub async fn fetch_document(store: &Store, memory_id: Uuid) -> Result<AssembledDocument> {
    let mut conn = store.acquire().await?;
    let chunks = store_retrieval::document_chunks(&mut conn, memory_id).await?;
    if chunks.is_empty() {
        return Err(EngineError::NotFound(format!("no active document at {memory_id}")));
    }
    let category_path = chunks[0].category_path.clone();
    let content = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(AssembledDocument {
        memory_id,
        chunk_count: chunks.len(),
        category_path,
        content,
    })
}

/// One entry of a supersession chain, exposed with its position
/// (`generation`, 0 = target, increasing with age).
pub struct HistoryEntryOut {
    pub id: Uuid,
    pub content: String,
    pub supersedes_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct HistoryChain {
    pub memory_id: Uuid,
    pub version_count: usize,
    pub chain: Vec<HistoryEntryOut>,
}

pub async fn trace_history(store: &Store, memory_id: Uuid) -> Result<HistoryChain> {
    let mut conn = store.acquire().await?;
    let rows = store_retrieval::trace_history(&mut conn, memory_id).await?;
    if rows.is_empty() {
        return Err(EngineError::NotFound(format!("no memory at {memory_id}")));
    }
    let chain: Vec<HistoryEntryOut> = rows
        .into_iter()
        .map(|r| HistoryEntryOut {
            id: r.id,
            content: r.content,
            supersedes_id: r.supersedes_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
        .collect();
    Ok(HistoryChain {
        memory_id,
        version_count: chain.len(),
        chain,
    })
}

/// One `(category, count)` row, as returned by `list_categories`.
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

pub async fn list_categories(store: &Store) -> Result<Vec<CategoryCount>> {
    let mut conn = store.acquire().await?;
    let rows = store_taxonomy::category_counts(&mut conn).await?;
    Ok(rows
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect())
}

pub struct TaxonomyView {
    pub path: String,
    pub tree: String,
    pub total: i64,
    pub categories: Vec<CategoryCount>,
}

/// Renders the full, uncollapsed subtree under `path` — the counterpart to
/// the primer's collapsed tree, reached via `explore_taxonomy('path')`.
pub async fn explore_taxonomy(store: &Store, path: &str) -> Result<TaxonomyView> {
    let mut conn = store.acquire().await?;
    let lquery = format!("{path}.*{{0,}}");
    let rows = store_taxonomy::fetch_under_lquery(&mut conn, &lquery).await?;

    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for (category_path, _content) in &rows {
        *counts.entry(category_path.clone()).or_insert(0) += 1;
    }
    let counted: Vec<(String, i64)> = counts.into_iter().collect();
    let total = counted.iter().map(|(_, c)| c).sum();
    let (tree, _) = render_taxonomy_tree(&counted, usize::MAX, usize::MAX);

    let categories = counted
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect();

    Ok(TaxonomyView {
        path: path.to_string(),
        tree,
        total,
        categories,
    })
}

#[derive(Default)]
struct TaxNode {
    count: i64,
    children: BTreeMap<String, TaxNode>,
}

fn insert_path(node: &mut TaxNode, segments: &[&str], count: i64) {
    node.count += count;
    if let Some((first, rest)) = segments.split_first() {
        let child = node.children.entry((*first).to_string()).or_default();
        insert_path(child, rest, count);
    }
}

/// Total number of nodes in `node`'s subtree, excluding itself — the "+N
/// more" figure shown on a collapsed branch.
fn count_descendants(node: &TaxNode) -> usize {
    node.children.values().map(|c| 1 + count_descendants(c)).sum()
}

fn render_node(
    name: &str,
    node: &TaxNode,
    path: &str,
    depth: usize,
    max_depth: usize,
    max_branch_nodes: usize,
    indent: usize,
    out: &mut String,
) {
    let pad = "  ".repeat(indent);
    let descendants = count_descendants(node);

    if depth >= max_depth || descendants > max_branch_nodes {
        out.push_str(&format!(
            "{pad}{name}/ ({}) [+{descendants} more \u{2192} explore_taxonomy('{path}')]\n",
            node.count
        ));
        return;
    }

    if node.children.is_empty() {
        out.push_str(&format!("{pad}{name} ({})\n", node.count));
        return;
    }

    if node.children.values().all(|c| c.children.is_empty()) {
        let items: Vec<String> = node
            .children
            .iter()
            .map(|(k, v)| format!("{k} ({})", v.count))
            .collect();
        out.push_str(&format!("{pad}{name}/: {}\n", items.join(", ")));
        return;
    }

    out.push_str(&format!("{pad}{name}/ ({})\n", node.count));
    for (child_name, child) in &node.children {
        let child_path = if path.is_empty() {
            child_name.clone()
        } else {
            format!("{path}.{child_name}")
        };
        render_node(child_name, child, &child_path, depth + 1, max_depth, max_branch_nodes, indent + 1, out);
    }
}

/// Folds flat `(path, count)` rows into a prefix tree and renders it,
/// collapsing subtrees past `max_depth` or with more than `max_branch_nodes`
/// descendants. Returns `(rendered_text, total_count)`.
pub fn render_taxonomy_tree(rows: &[(String, i64)], max_depth: usize, max_branch_nodes: usize) -> (String, i64) {
    let mut root = TaxNode::default();
    let mut total = 0i64;
    for (path, count) in rows {
        total += count;
        let segments: Vec<&str> = path.split('.').collect();
        insert_path(&mut root, &segments, *count);
    }

    let mut out = String::new();
    for (name, child) in &root.children {
        render_node(name, child, name, 0, max_depth, max_branch_nodes, 0, &mut out);
    }
    (out, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_leaf_only_level_as_comma_list() {
        let rows = vec![
            ("projects.alpha".to_string(), 3),
            ("projects.beta".to_string(), 5),
        ];
        let (tree, total) = render_taxonomy_tree(&rows, 10, 50);
        assert_eq!(total, 8);
        assert!(tree.contains("alpha (3)"));
        assert!(tree.contains("beta (5)"));
    }

    #[test]
    fn collapses_wide_branch_past_max_branch_nodes() {
        let rows: Vec<(String, i64)> = (0..60)
            .map(|i| (format!("projects.myapp.item{i}"), 1))
            .collect();
        let (tree, total) = render_taxonomy_tree(&rows, 2, 50);
        assert_eq!(total, 60);
        assert!(tree.contains("myapp/"));
        assert!(tree.contains("more"));
        assert!(tree.contains("explore_taxonomy('projects.myapp')"));
    }
}
