//! Reduce per-type match scores into one weighted case ranking.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use caserag_core::error::{Error, Result};
use caserag_core::types::GroupId;

use crate::matcher::MatchResult;

/// Weight applied to chunk types absent from the weight map.
pub const DEFAULT_WEIGHT: f64 = 0.1;

/// Chunk-type label → weight, supplied as a flat JSON object.
pub type WeightMap = BTreeMap<String, f64>;

pub fn load_weights(path: &Path) -> Result<WeightMap> {
    let raw = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read weight file {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        Error::Config(format!(
            "Malformed weight file {}: {}",
            path.display(),
            e
        ))
    })
}

/// One ranked candidate case.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCase {
    pub group_id: GroupId,
    pub score: f64,
    pub folder_path: String,
}

/// Weighted reduction of one query's match results.
///
/// Pure: identical inputs produce the identical ranking. Each candidate
/// accumulates `score * weight(chunk_type)` over every entry of every
/// result naming it. The sort is stable and descending, so equal totals
/// keep first-seen order.
pub fn aggregate_topk(results: &[MatchResult], weights: &WeightMap, k: usize) -> Vec<RankedCase> {
    let mut order: Vec<GroupId> = Vec::new();
    let mut totals: HashMap<GroupId, f64> = HashMap::new();
    let mut paths: HashMap<GroupId, String> = HashMap::new();

    for result in results {
        let group_id = match result.group_id {
            Some(id) => id,
            None => {
                warn!(
                    "Match result for '{}' has no group id, skipping",
                    result.folder_path
                );
                continue;
            }
        };
        if !totals.contains_key(&group_id) {
            order.push(group_id);
            totals.insert(group_id, 0.0);
        }
        if !result.folder_path.is_empty() {
            paths
                .entry(group_id)
                .or_insert_with(|| result.folder_path.clone());
        }

        let mut sum = 0.0;
        for entry in result.all_scores() {
            let weight = weights
                .get(&entry.chunk_type)
                .copied()
                .unwrap_or(DEFAULT_WEIGHT);
            sum += entry.score * weight;
        }
        if let Some(total) = totals.get_mut(&group_id) {
            *total += sum;
        }
    }

    let mut ranked: Vec<RankedCase> = order
        .into_iter()
        .map(|group_id| RankedCase {
            group_id,
            score: totals.get(&group_id).copied().unwrap_or(0.0),
            folder_path: paths.get(&group_id).cloned().unwrap_or_default(),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(k);
    ranked
}

/// Parse every `*.json` under `scores_dir` in sorted file-name order.
///
/// Sorted names pin the first-seen order that ties and path picks depend
/// on; `read_dir` order is not stable across filesystems. Unreadable or
/// malformed files are skipped with a warning.
pub fn collect_match_results(scores_dir: &Path) -> Result<Vec<MatchResult>> {
    if !scores_dir.is_dir() {
        return Err(Error::NotFound(format!(
            "match scores directory {} does not exist",
            scores_dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(scores_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                continue;
            }
        };
        match serde_json::from_str::<MatchResult>(&raw) {
            Ok(result) => results.push(result),
            Err(e) => warn!("Failed to parse {}: {}", path.display(), e),
        }
    }
    Ok(results)
}

/// Aggregate straight from a query's match-scores directory.
pub fn aggregate_topk_from_dir(
    scores_dir: &Path,
    weight_file: &Path,
    k: usize,
) -> Result<Vec<RankedCase>> {
    let weights = load_weights(weight_file)?;
    let results = collect_match_results(scores_dir)?;
    info!(
        "Aggregating {} match results with {} explicit weights",
        results.len(),
        weights.len()
    );
    Ok(aggregate_topk(&results, &weights, k))
}
