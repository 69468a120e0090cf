//! All-pairs case matching over pooled stores.
//!
//! Every distinct case in the pools is compared against every other case
//! of the same family, one ordered pair at a time. Pool data is immutable
//! once loaded and each pair writes its own result file, so the pair
//! fan-out runs on a rayon worker pool with no shared mutable state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use caserag_core::error::{Error, Result};
use caserag_core::types::{Category, Family, GroupId};
use caserag_store::store::{load_store, store_exists, StoreData};

use crate::similarity;

/// Name of the per-query directory holding one result file per candidate.
pub const MATCH_SCORES_DIR: &str = "match_scores";

/// Per-type similarity entry in a MatchResult category map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeScore {
    pub chunk_type: String,
    pub score: f64,
}

/// One ordered (query, candidate) comparison as written to disk.
///
/// The category maps key `query_<idx>` (the query chunk's vector id) to
/// the scores that chunk produced against this candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(default)]
    pub group_id: Option<GroupId>,
    pub folder_path: String,
    #[serde(rename = "CODE", default)]
    pub code: BTreeMap<String, Vec<TypeScore>>,
    #[serde(rename = "TEXT", default)]
    pub text: BTreeMap<String, Vec<TypeScore>>,
}

impl MatchResult {
    pub fn new(group_id: GroupId, folder_path: String) -> MatchResult {
        MatchResult {
            group_id: Some(group_id),
            folder_path,
            code: BTreeMap::new(),
            text: BTreeMap::new(),
        }
    }

    fn category_mut(&mut self, category: Category) -> &mut BTreeMap<String, Vec<TypeScore>> {
        match category {
            Category::Code => &mut self.code,
            Category::Text => &mut self.text,
        }
    }

    /// Every per-type score of both categories, for aggregation.
    pub fn all_scores(&self) -> impl Iterator<Item = &TypeScore> {
        self.code.values().chain(self.text.values()).flatten()
    }
}

/// Read-only pooled stores under one merge root, keyed by chunk-type
/// label per category.
pub struct MergedPools {
    code: BTreeMap<String, StoreData>,
    text: BTreeMap<String, StoreData>,
}

impl MergedPools {
    /// Load every `(category, chunk_type)` pool under `merged_root`.
    ///
    /// A missing category directory leaves that category empty; a pool
    /// that fails to load is skipped with a warning.
    pub fn load(merged_root: &Path) -> Result<MergedPools> {
        if !merged_root.is_dir() {
            return Err(Error::NotFound(format!(
                "merged store {} does not exist",
                merged_root.display()
            )));
        }

        let mut pools = MergedPools {
            code: BTreeMap::new(),
            text: BTreeMap::new(),
        };
        for category in Category::ALL {
            let dir = merged_root.join(category.as_str());
            if !dir.is_dir() {
                debug!("No {} pools under {}", category, merged_root.display());
                continue;
            }
            let mut pool_dirs: Vec<PathBuf> = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.path().is_dir() {
                    pool_dirs.push(entry.path());
                }
            }
            pool_dirs.sort();

            for pool_dir in pool_dirs {
                let label = match pool_dir.file_name() {
                    Some(name) => name.to_string_lossy().into_owned(),
                    None => continue,
                };
                match load_store(&pool_dir) {
                    Ok(data) => {
                        pools.by_category_mut(category).insert(label, data);
                    }
                    Err(e) => warn!("Skipping pool {}: {}", pool_dir.display(), e),
                }
            }
        }
        Ok(pools)
    }

    pub fn category(&self, category: Category) -> &BTreeMap<String, StoreData> {
        match category {
            Category::Code => &self.code,
            Category::Text => &self.text,
        }
    }

    fn by_category_mut(&mut self, category: Category) -> &mut BTreeMap<String, StoreData> {
        match category {
            Category::Code => &mut self.code,
            Category::Text => &mut self.text,
        }
    }
}

/// Per-category view of one case: chunk-type label → vector ids in that
/// type's pool.
pub type CaseView = BTreeMap<String, Vec<usize>>;

/// One distinct case reconstructed from pool metadata.
#[derive(Debug, Clone)]
pub struct PoolCase {
    pub group_id: GroupId,
    pub folder_path: String,
    pub code: CaseView,
    pub text: CaseView,
}

impl PoolCase {
    fn new(group_id: GroupId, folder_path: String) -> PoolCase {
        PoolCase {
            group_id,
            folder_path,
            code: CaseView::new(),
            text: CaseView::new(),
        }
    }

    pub fn view(&self, category: Category) -> &CaseView {
        match category {
            Category::Code => &self.code,
            Category::Text => &self.text,
        }
    }

    fn view_mut(&mut self, category: Category) -> &mut CaseView {
        match category {
            Category::Code => &mut self.code,
            Category::Text => &mut self.text,
        }
    }
}

/// Enumerate the distinct cases of `family` in the pools, sorted by
/// group id. Records of other families are ignored.
pub fn enumerate_cases(pools: &MergedPools, family: Family) -> Vec<PoolCase> {
    let mut cases: BTreeMap<GroupId, PoolCase> = BTreeMap::new();
    for category in Category::ALL {
        for (label, store) in pools.category(category) {
            for (pos, meta) in store.metadata.iter().enumerate() {
                if meta.antipattern_type != family {
                    debug!(
                        "Ignoring '{}' record of foreign family {}",
                        label, meta.antipattern_type
                    );
                    continue;
                }
                let case = cases
                    .entry(meta.group_id)
                    .or_insert_with(|| PoolCase::new(meta.group_id, meta.folder_path()));
                case.view_mut(category)
                    .entry(label.clone())
                    .or_default()
                    .push(pos);
            }
        }
    }
    cases.into_values().collect()
}

/// Compare one ordered (query, candidate) pair across both categories.
///
/// A category absent from either case contributes nothing. Shared chunk
/// types pair their vector ids positionally; a count mismatch pairs up to
/// the shorter list and logs a warning.
pub fn compute_pair(pools: &MergedPools, query: &PoolCase, candidate: &PoolCase) -> MatchResult {
    let mut result = MatchResult::new(candidate.group_id, candidate.folder_path.clone());

    for category in Category::ALL {
        let query_view = query.view(category);
        let candidate_view = candidate.view(category);
        if query_view.is_empty() || candidate_view.is_empty() {
            debug!(
                "Pair {} -> {}: no shared {} data",
                query.group_id, candidate.group_id, category
            );
            continue;
        }

        for (label, query_ids) in query_view {
            let candidate_ids = match candidate_view.get(label) {
                Some(ids) => ids,
                None => continue,
            };
            let pool = match pools.category(category).get(label) {
                Some(pool) => pool,
                None => continue,
            };

            let paired = query_ids.len().min(candidate_ids.len());
            if query_ids.len() != candidate_ids.len() {
                warn!(
                    "Pair {} -> {}: {} '{}' pairs {} of {} query / {} candidate chunks",
                    query.group_id,
                    candidate.group_id,
                    category,
                    label,
                    paired,
                    query_ids.len(),
                    candidate_ids.len()
                );
            }

            for k in 0..paired {
                let query_vec = &pool.vectors[query_ids[k]];
                let candidate_vec = &pool.vectors[candidate_ids[k]];
                let score = similarity::score(category, query_vec, candidate_vec);
                result
                    .category_mut(category)
                    .entry(format!("query_{}", query_ids[k]))
                    .or_default()
                    .push(TypeScore {
                        chunk_type: label.clone(),
                        score,
                    });
            }
        }
    }

    result
}

fn write_result(dir: &Path, candidate_id: GroupId, result: &MatchResult) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("group_{}.json", candidate_id));
    fs::write(&path, serde_json::to_string_pretty(result)?)?;
    Ok(path)
}

fn pair_progress(len: usize, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_message(unit.to_string());
    pb
}

/// Outcome of one matching run.
#[derive(Debug, Default)]
pub struct MatchSummary {
    pub cases: usize,
    pub pairs_written: usize,
    pub pairs_failed: usize,
}

/// Compare every ordered pair of distinct cases in the pools and write one
/// result file per pair under
/// `<match_root>/<query folder_path>/match_scores/group_<candidate>.json`.
///
/// Pair failures are logged and counted, never abort the run.
pub fn match_all(merged_root: &Path, family: Family, match_root: &Path) -> Result<MatchSummary> {
    let pools = MergedPools::load(merged_root)?;
    let cases = enumerate_cases(&pools, family);
    if cases.len() < 2 {
        info!("Only {} case(s) in the pools, nothing to match", cases.len());
        return Ok(MatchSummary {
            cases: cases.len(),
            ..MatchSummary::default()
        });
    }

    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for query in 0..cases.len() {
        for candidate in 0..cases.len() {
            if query != candidate {
                pairs.push((query, candidate));
            }
        }
    }
    info!(
        "Matching {} cases ({} ordered pairs) from {}",
        cases.len(),
        pairs.len(),
        merged_root.display()
    );

    let pb = pair_progress(pairs.len(), "pairs");
    let outcomes: Vec<(GroupId, GroupId, Result<PathBuf>)> = pairs
        .par_iter()
        .map(|&(q, c)| {
            let query = &cases[q];
            let candidate = &cases[c];
            let result = compute_pair(&pools, query, candidate);
            let dir = match_root.join(&query.folder_path).join(MATCH_SCORES_DIR);
            let written = write_result(&dir, candidate.group_id, &result);
            pb.inc(1);
            (query.group_id, candidate.group_id, written)
        })
        .collect();
    pb.finish_with_message("pairs matched");

    let mut summary = MatchSummary {
        cases: cases.len(),
        ..MatchSummary::default()
    };
    for (query_id, candidate_id, outcome) in outcomes {
        match outcome {
            Ok(_) => summary.pairs_written += 1,
            Err(e) => {
                warn!("Pair {} -> {} failed: {}", query_id, candidate_id, e);
                summary.pairs_failed += 1;
            }
        }
    }
    info!(
        "Wrote {} match results, {} failed",
        summary.pairs_written, summary.pairs_failed
    );
    Ok(summary)
}

/// The query's own store and view for one category.
struct QuerySide {
    store: StoreData,
    view: CaseView,
}

fn load_query_side(root: &Path, category: Category) -> Result<Option<QuerySide>> {
    let dir = root.join(category.as_str());
    if !store_exists(&dir) {
        debug!("No {} query store under {}", category, root.display());
        return Ok(None);
    }
    // A present-but-unreadable query store fails the whole run.
    let store = load_store(&dir)?;

    let mut view = CaseView::new();
    for (pos, meta) in store.metadata.iter().enumerate() {
        match meta.resolved_type() {
            Some(ty) => view.entry(ty.as_str().to_string()).or_default().push(pos),
            None => warn!(
                "Query chunk '{}' has no resolvable chunk_type, skipping",
                meta.chunk_id
            ),
        }
    }
    Ok(Some(QuerySide { store, view }))
}

fn score_query_category(
    pools: &MergedPools,
    category: Category,
    side: &QuerySide,
    candidate: &PoolCase,
    result: &mut MatchResult,
) {
    let candidate_view = candidate.view(category);
    if candidate_view.is_empty() {
        return;
    }

    for (label, query_ids) in &side.view {
        let candidate_ids = match candidate_view.get(label) {
            Some(ids) => ids,
            None => continue,
        };
        let pool = match pools.category(category).get(label) {
            Some(pool) => pool,
            None => continue,
        };

        let paired = query_ids.len().min(candidate_ids.len());
        if query_ids.len() != candidate_ids.len() {
            warn!(
                "Query -> {}: {} '{}' pairs {} of {} query / {} candidate chunks",
                candidate.group_id,
                category,
                label,
                paired,
                query_ids.len(),
                candidate_ids.len()
            );
        }

        for k in 0..paired {
            let query_vec = &side.store.vectors[query_ids[k]];
            let candidate_vec = &pool.vectors[candidate_ids[k]];
            if query_vec.len() != candidate_vec.len() {
                warn!(
                    "Query -> {}: {} '{}' dimension mismatch ({} vs {}), skipping",
                    candidate.group_id,
                    category,
                    label,
                    query_vec.len(),
                    candidate_vec.len()
                );
                continue;
            }
            let score = similarity::score(category, query_vec, candidate_vec);
            result
                .category_mut(category)
                .entry(format!("query_{}", query_ids[k]))
                .or_default()
                .push(TypeScore {
                    chunk_type: label.clone(),
                    score,
                });
        }
    }
}

/// Compare one ad-hoc query store against every case in the pools and
/// write per-candidate result files under `<out_dir>/match_scores/`.
///
/// The query side reads from its own store, candidates from the pools. A
/// category the query lacks is skipped for that category only; a query
/// store that exists but cannot be read fails the run.
pub fn match_query(
    query_store_root: &Path,
    merged_root: &Path,
    family: Family,
    out_dir: &Path,
) -> Result<MatchSummary> {
    if !query_store_root.is_dir() {
        return Err(Error::NotFound(format!(
            "query store {} does not exist",
            query_store_root.display()
        )));
    }
    let code_side = load_query_side(query_store_root, Category::Code)?;
    let text_side = load_query_side(query_store_root, Category::Text)?;
    if code_side.is_none() && text_side.is_none() {
        return Err(Error::NotFound(format!(
            "no per-category stores under {}",
            query_store_root.display()
        )));
    }

    let pools = MergedPools::load(merged_root)?;
    let candidates = enumerate_cases(&pools, family);
    info!(
        "Matching query store {} against {} candidate cases",
        query_store_root.display(),
        candidates.len()
    );

    let scores_dir = out_dir.join(MATCH_SCORES_DIR);
    let pb = pair_progress(candidates.len(), "candidates");
    let outcomes: Vec<(GroupId, Result<PathBuf>)> = candidates
        .par_iter()
        .map(|candidate| {
            let mut result = MatchResult::new(candidate.group_id, candidate.folder_path.clone());
            for (category, side) in [(Category::Code, &code_side), (Category::Text, &text_side)] {
                if let Some(side) = side {
                    score_query_category(&pools, category, side, candidate, &mut result);
                }
            }
            let written = write_result(&scores_dir, candidate.group_id, &result);
            pb.inc(1);
            (candidate.group_id, written)
        })
        .collect();
    pb.finish_with_message("candidates matched");

    let mut summary = MatchSummary {
        cases: candidates.len(),
        ..MatchSummary::default()
    };
    for (candidate_id, outcome) in outcomes {
        match outcome {
            Ok(_) => summary.pairs_written += 1,
            Err(e) => {
                warn!("Candidate {} failed: {}", candidate_id, e);
                summary.pairs_failed += 1;
            }
        }
    }
    info!(
        "Wrote {} query match results, {} failed",
        summary.pairs_written, summary.pairs_failed
    );
    Ok(summary)
}
