//! Merging of several tables that describe the same kind of entity with
//! inconsistently named columns.
//!
//! Columns are grouped by name similarity (token sort Jaro-Winkler) using
//! average-linkage agglomerative clustering. Every cluster becomes a single
//! output column holding the first non-missing value of its members.

use crate::config::MergeConfig;
use crate::value::{Record, Value};
use rayon::prelude::*;
use strsim::jaro_winkler;
use tracing::{debug, info};

/// Canonical output form of a column name: trimmed, lowercase, spaces
/// replaced by underscores, parentheses removed.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace(['(', ')'], "")
}

/// Lowercased tokens, sorted, joined by single spaces. Underscores, dashes
/// and parentheses count as separators.
fn sorted_tokens(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut tokens: Vec<&str> = lowered
        .split(|c: char| c.is_whitespace() || matches!(c, '_' | '-' | '(' | ')'))
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn similarity_prepared(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }
    jaro_winkler(a, b)
}

/// Similarity of two column names in [0, 1]; 1.0 for names that differ only
/// in case, separators or token order.
pub fn column_similarity(a: &str, b: &str) -> f64 {
    similarity_prepared(&sorted_tokens(a), &sorted_tokens(b))
}

/// Groups column indices so that names within a group are similar.
///
/// Starts from singletons and repeatedly joins the two clusters with the
/// smallest average pairwise distance (1 - similarity) while it is below
/// `threshold`. Members are listed in column order, clusters ordered by
/// their first member.
pub fn cluster_columns(names: &[String], threshold: f64) -> Vec<Vec<usize>> {
    let keys: Vec<String> = names.iter().map(|n| sorted_tokens(n)).collect();
    let distances: Vec<Vec<f64>> = (0..keys.len())
        .into_par_iter()
        .map(|i| {
            keys.iter()
                .map(|other| 1.0 - similarity_prepared(&keys[i], other))
                .collect()
        })
        .collect();

    let mut clusters: Vec<Vec<usize>> = (0..names.len()).map(|i| vec![i]).collect();

    loop {
        let mut closest: Option<(usize, usize, f64)> = None;
        for a in 0..clusters.len() {
            for b in (a + 1)..clusters.len() {
                let d = average_linkage(&distances, &clusters[a], &clusters[b]);
                if closest.is_none_or(|(_, _, best)| d < best) {
                    closest = Some((a, b, d));
                }
            }
        }

        match closest {
            Some((a, b, d)) if d < threshold => {
                let absorbed = clusters.remove(b);
                clusters[a].extend(absorbed);
            }
            _ => break,
        }
    }

    for cluster in &mut clusters {
        cluster.sort_unstable();
    }
    clusters.sort_by_key(|c| c[0]);
    clusters
}

fn average_linkage(distances: &[Vec<f64>], a: &[usize], b: &[usize]) -> f64 {
    let total: f64 = a
        .iter()
        .flat_map(|&i| b.iter().map(move |&j| distances[i][j]))
        .sum();
    total / (a.len() * b.len()) as f64
}

/// Union of column names across all rows, in first-seen order.
fn union_columns<'a>(rows: impl Iterator<Item = &'a Record>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}

/// Stacks all rows of `tables` and collapses similar columns into one.
pub fn merge_tables(tables: &[Vec<Record>], config: &MergeConfig) -> Vec<Record> {
    let columns = union_columns(tables.iter().flatten());
    let clusters = cluster_columns(&columns, config.distance_threshold);

    for cluster in clusters.iter().filter(|c| c.len() > 1) {
        let members: Vec<&str> = cluster.iter().map(|&i| columns[i].as_str()).collect();
        debug!(?members, "merging similar columns");
    }

    let targets: Vec<(String, Vec<&str>)> = clusters
        .iter()
        .map(|cluster| {
            (
                normalize_column_name(&columns[cluster[0]]),
                cluster.iter().map(|&i| columns[i].as_str()).collect(),
            )
        })
        .collect();

    tables
        .iter()
        .flatten()
        .map(|row| {
            let mut merged = Record::new();
            for (name, members) in &targets {
                let value = members
                    .iter()
                    .map(|m| row.get(m))
                    .find(|v| !v.is_missing())
                    .cloned()
                    .unwrap_or(Value::Missing);
                // Distinct clusters may normalize to one name; first value wins.
                if !merged.contains(name) || merged.get(name).is_missing() {
                    merged.insert(name, value);
                }
            }
            merged
        })
        .collect()
}

/// Merges each category's tables independently. Categories are processed in
/// parallel and returned in input order.
pub fn merge_databases(
    categories: &[(String, Vec<Vec<Record>>)],
    config: &MergeConfig,
) -> Vec<(String, Vec<Record>)> {
    categories
        .par_iter()
        .map(|(category, tables)| {
            let merged = merge_tables(tables, config);
            info!(
                category = category.as_str(),
                tables = tables.len(),
                rows = merged.len(),
                "merged category"
            );
            (category.clone(), merged)
        })
        .collect()
}
