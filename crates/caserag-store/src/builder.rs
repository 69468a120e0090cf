//! Build per-case vector stores from splitter chunk documents.

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use caserag_core::error::{Error, Result};
use caserag_core::types::{CaseDocument, Category, ChunkMeta, Family, GroupId, QUERY_GROUP_ID};
use caserag_embed::EmbeddingService;

use crate::store::write_store;

/// Name of the store root created inside an ad-hoc query case folder.
pub const QUERY_STORE_DIR: &str = "vectorstore";

/// Outcome of one corpus build.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub cases_built: usize,
    pub cases_failed: usize,
    pub chunks_embedded: usize,
}

/// Embed one case document and persist its per-category stores under
/// `dest`. Returns the number of chunks embedded across both categories.
///
/// Chunks enter the CODE store when they carry `ast_subtree` and the TEXT
/// store when they carry `llm_description`; a category with no content is
/// skipped. `chunk_type` is stored as the raw label even when it is
/// missing or unknown, so the merge stage can report exactly what it drops.
pub fn build_case(
    doc: &CaseDocument,
    group_id: GroupId,
    service: &EmbeddingService,
    dest: &Path,
) -> Result<usize> {
    let mut embedded = 0usize;

    for category in Category::ALL {
        let mut texts: Vec<String> = Vec::new();
        let mut metadata: Vec<ChunkMeta> = Vec::new();

        for (idx, chunk) in doc.chunks.iter().enumerate() {
            let content = match chunk.content(category) {
                Some(c) => c,
                None => continue,
            };
            let chunk_id = chunk
                .chunk_id
                .clone()
                .or_else(|| chunk.chunk_type.clone())
                .unwrap_or_else(|| format!("chunk_{}", idx));
            metadata.push(ChunkMeta {
                antipattern_type: doc.antipattern_type,
                project_name: doc.project_name.clone(),
                commit_number: doc.commit_number.clone(),
                id: doc.id.clone(),
                group_id,
                chunk_type: chunk.chunk_type.clone(),
                level: chunk.level,
                chunk_id,
                parent_chunk_id: chunk.parent_chunk_id.clone(),
            });
            texts.push(content.to_string());
        }

        if texts.is_empty() {
            debug!(
                "case {} has no {} content, skipping category",
                doc.case_key().folder_path(),
                category
            );
            continue;
        }

        let embeddings = service.embed_batch(category, &texts).map_err(|e| {
            Error::Operation(format!(
                "{} embedding failed for case {}: {}",
                category,
                doc.case_key().folder_path(),
                e
            ))
        })?;
        write_store(
            &dest.join(category.as_str()),
            &embeddings,
            &metadata,
            service.dim(category),
        )?;
        embedded += texts.len();
    }

    Ok(embedded)
}

/// Walk `<cases_root>/<family>` for `*_chunk.json` documents and build one
/// store per case under `<dest_root>/<folder_path>`.
///
/// Group ids are reassigned sequentially in sorted discovery order each
/// run; ids embedded in the documents are ignored because splitters reuse
/// them across partial corpora. Per-case failures are logged and skipped.
pub fn build_corpus(
    cases_root: &Path,
    family: Family,
    service: &EmbeddingService,
    dest_root: &Path,
) -> Result<BuildSummary> {
    let family_root = cases_root.join(family.as_str());
    if !family_root.is_dir() {
        return Err(Error::NotFound(format!(
            "case directory {} does not exist",
            family_root.display()
        )));
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(&family_root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.file_name().to_string_lossy().ends_with("_chunk.json")
        {
            files.push(entry.into_path());
        }
    }
    info!(
        "Found {} chunk documents under {}",
        files.len(),
        family_root.display()
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} cases {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut summary = BuildSummary::default();
    for (next_id, path) in files.iter().enumerate() {
        pb.inc(1);
        let doc = match CaseDocument::load(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Skipping unreadable case document {}: {}", path.display(), e);
                summary.cases_failed += 1;
                continue;
            }
        };
        if doc.antipattern_type != family {
            warn!(
                "Skipping {}: document family {} does not match requested {}",
                path.display(),
                doc.antipattern_type,
                family
            );
            summary.cases_failed += 1;
            continue;
        }

        let dest = dest_root.join(doc.case_key().folder_path());
        match build_case(&doc, next_id as GroupId, service, &dest) {
            Ok(count) => {
                summary.cases_built += 1;
                summary.chunks_embedded += count;
            }
            Err(e) => {
                warn!("Failed to build store for {}: {}", path.display(), e);
                summary.cases_failed += 1;
            }
        }
    }
    pb.finish_with_message("stores built");

    info!(
        "Built {} case stores ({} chunks embedded), {} failed",
        summary.cases_built, summary.chunks_embedded, summary.cases_failed
    );
    Ok(summary)
}

/// Locate the single `*_chunk.json` document inside a case folder.
pub fn find_chunk_document(case_dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(case_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file()
            && path
                .file_name()
                .map(|n| n.to_string_lossy().ends_with("_chunk.json"))
                .unwrap_or(false)
        {
            candidates.push(path);
        }
    }
    candidates.sort();
    candidates.into_iter().next().ok_or_else(|| {
        Error::NotFound(format!(
            "no *_chunk.json document in {}",
            case_dir.display()
        ))
    })
}

/// Build the store for an ad-hoc query case, under
/// `<case_dir>/vectorstore/<CATEGORY>/`. Unlike the corpus walk, any
/// failure here is fatal: nothing downstream can run without the query's
/// own store. Returns the store root.
pub fn build_query_case(case_dir: &Path, service: &EmbeddingService) -> Result<PathBuf> {
    let doc_path = find_chunk_document(case_dir)?;
    let doc = CaseDocument::load(&doc_path)?;
    let store_root = case_dir.join(QUERY_STORE_DIR);
    let embedded = build_case(&doc, QUERY_GROUP_ID, service, &store_root)?;
    info!(
        "Built query store at {} ({} chunks embedded)",
        store_root.display(),
        embedded
    );
    Ok(store_root)
}
