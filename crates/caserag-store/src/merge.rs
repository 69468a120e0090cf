//! Candidate pool merger: union per-case stores into one pooled store per
//! `(category, chunk_type)`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use caserag_core::error::{Error, Result};
use caserag_core::types::{Category, ChunkMeta};

use crate::store::{load_store, store_exists, write_store};

/// Outcome of one merge run.
#[derive(Debug, Default)]
pub struct MergeSummary {
    pub stores_merged: usize,
    pub stores_skipped: usize,
    pub records_pooled: usize,
    pub records_dropped: usize,
}

/// Find every per-case store directory of `category` under `root`, in
/// sorted path order.
fn discover_stores(root: &Path, category: Category) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir()
            && entry.file_name().to_string_lossy() == category.as_str()
            && store_exists(entry.path())
        {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Rebuild the pooled store under `target_root` from every per-case store
/// under `source_root`.
///
/// The target is cleared first: pools are regenerated in full, never
/// updated in place. Records whose chunk-type label is missing or outside
/// the family vocabulary are dropped with a warning. The per-category
/// dimension is pinned by the first store read; stores that disagree are
/// skipped whole.
pub fn merge(source_root: &Path, target_root: &Path) -> Result<MergeSummary> {
    if !source_root.is_dir() {
        return Err(Error::NotFound(format!(
            "merge source {} does not exist",
            source_root.display()
        )));
    }
    if target_root == source_root {
        return Err(Error::Config(
            "merge target must differ from the source root".to_string(),
        ));
    }

    if target_root.exists() {
        fs::remove_dir_all(target_root)?;
    }
    fs::create_dir_all(target_root)?;

    let mut summary = MergeSummary::default();

    for category in Category::ALL {
        let store_dirs = discover_stores(source_root, category)?;
        info!(
            "Merging {} {} stores from {}",
            store_dirs.len(),
            category,
            source_root.display()
        );

        let mut pinned_dim: Option<usize> = None;
        let mut pools: BTreeMap<String, (Vec<Vec<f32>>, Vec<ChunkMeta>)> = BTreeMap::new();

        for dir in &store_dirs {
            let data = match load_store(dir) {
                Ok(data) => data,
                Err(e) => {
                    warn!("Skipping store {}: {}", dir.display(), e);
                    summary.stores_skipped += 1;
                    continue;
                }
            };
            let dim = match data.dim() {
                Some(dim) => dim,
                None => {
                    debug!("Store {} is empty, nothing to merge", dir.display());
                    continue;
                }
            };
            match pinned_dim {
                None => pinned_dim = Some(dim),
                Some(expected) if expected != dim => {
                    warn!(
                        "Skipping store {}: {} dimension {} does not match pooled dimension {}",
                        dir.display(),
                        category,
                        dim,
                        expected
                    );
                    summary.stores_skipped += 1;
                    continue;
                }
                Some(_) => {}
            }

            for (vector, meta) in data.vectors.into_iter().zip(data.metadata.into_iter()) {
                let resolved = match meta.resolved_type() {
                    Some(ty) => ty,
                    None => {
                        warn!(
                            "Dropping chunk '{}' of case {}: chunk_type {:?} not in the {} vocabulary",
                            meta.chunk_id,
                            meta.folder_path(),
                            meta.chunk_type,
                            meta.antipattern_type
                        );
                        summary.records_dropped += 1;
                        continue;
                    }
                };
                let pool = pools.entry(resolved.as_str().to_string()).or_default();
                pool.0.push(vector);
                pool.1.push(meta);
                summary.records_pooled += 1;
            }
            summary.stores_merged += 1;
        }

        if let Some(dim) = pinned_dim {
            for (label, (vectors, metadata)) in &pools {
                let dest = target_root.join(category.as_str()).join(label);
                write_store(&dest, vectors, metadata, dim)?;
                debug!("Pooled {} {} records under {}", vectors.len(), label, dest.display());
            }
        }
    }

    info!(
        "Merge complete: {} stores pooled, {} skipped, {} records ({} dropped)",
        summary.stores_merged,
        summary.stores_skipped,
        summary.records_pooled,
        summary.records_dropped
    );
    Ok(summary)
}
