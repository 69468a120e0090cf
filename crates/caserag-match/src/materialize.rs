//! Serialize the ranked top-k, optionally with the candidates' files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use caserag_core::config::resolve_with_base;
use caserag_core::error::Result;

use crate::aggregate::RankedCase;

pub const RESULTS_FILE: &str = "aggregated_results.json";

/// One record of the aggregated output document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializedCase {
    pub score: f64,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, String>>,
}

/// Write `aggregated_results.json` under `output_dir`, keyed by group id.
///
/// Each candidate's folder path resolves against `cases_root`. A missing
/// or non-directory candidate folder drops that candidate; with
/// `include_files`, an unreadable single file drops just that file.
pub fn materialize(
    ranked: &[RankedCase],
    cases_root: &Path,
    output_dir: &Path,
    include_files: bool,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;

    let mut document: BTreeMap<String, MaterializedCase> = BTreeMap::new();
    for case in ranked {
        if case.folder_path.is_empty() {
            warn!("Group {} has no folder path, skipping", case.group_id);
            continue;
        }
        let base = resolve_with_base(cases_root, &case.folder_path);
        if !base.is_dir() {
            warn!(
                "Path does not exist or is not a directory, skipping group {}: {}",
                case.group_id,
                base.display()
            );
            continue;
        }

        let files = if include_files {
            Some(read_case_files(&base))
        } else {
            None
        };
        document.insert(
            case.group_id.to_string(),
            MaterializedCase {
                score: case.score,
                path: case.folder_path.clone(),
                files,
            },
        );
    }

    let output_file = output_dir.join(RESULTS_FILE);
    fs::write(&output_file, serde_json::to_string_pretty(&document)?)?;
    info!("Aggregated results saved to {}", output_file.display());
    Ok(output_file)
}

/// Flatten every file under `base` into `relative path → content`.
/// Unreadable entries are skipped with a warning.
fn read_case_files(base: &Path) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(base).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to walk {}: {}", base.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(base) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => continue,
        };
        match fs::read_to_string(entry.path()) {
            Ok(content) => {
                files.insert(rel, content);
            }
            Err(e) => warn!("Failed to read file {}: {}", entry.path().display(), e),
        }
    }
    files
}
