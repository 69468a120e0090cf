//! On-disk vector store format.
//!
//! A store directory holds exactly two artifacts: `vectors.json`, an ordered
//! list of fixed-dimension f32 vectors, and `metadata.json`, the parallel
//! ordered list of chunk records. Every read re-checks that the two lists
//! still line up.

use std::fs;
use std::path::Path;

use caserag_core::error::{Error, Result};
use caserag_core::types::ChunkMeta;

pub const VECTORS_FILE: &str = "vectors.json";
pub const METADATA_FILE: &str = "metadata.json";

/// In-memory image of one store directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreData {
    pub vectors: Vec<Vec<f32>>,
    pub metadata: Vec<ChunkMeta>,
}

impl StoreData {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Dimension shared by every vector, `None` for an empty store.
    pub fn dim(&self) -> Option<usize> {
        self.vectors.first().map(Vec::len)
    }
}

/// True when `dir` holds both store artifacts.
pub fn store_exists(dir: &Path) -> bool {
    dir.join(VECTORS_FILE).is_file() && dir.join(METADATA_FILE).is_file()
}

/// Write one store, overwriting any previous artifacts at `dest`.
///
/// `dim` is the category's fixed dimensionality; vectors that disagree
/// with it, or a vector/metadata length mismatch, are schema violations.
pub fn write_store(
    dest: &Path,
    vectors: &[Vec<f32>],
    metadata: &[ChunkMeta],
    dim: usize,
) -> Result<()> {
    if vectors.len() != metadata.len() {
        return Err(Error::Schema(format!(
            "store at {} would hold {} vectors but {} metadata records",
            dest.display(),
            vectors.len(),
            metadata.len()
        )));
    }
    for (i, v) in vectors.iter().enumerate() {
        if v.len() != dim {
            return Err(Error::Schema(format!(
                "vector {} at {} has dimension {}, expected {}",
                i,
                dest.display(),
                v.len(),
                dim
            )));
        }
    }

    fs::create_dir_all(dest)?;
    fs::write(dest.join(VECTORS_FILE), serde_json::to_string(vectors)?)?;
    fs::write(
        dest.join(METADATA_FILE),
        serde_json::to_string_pretty(metadata)?,
    )?;
    Ok(())
}

/// Load one store, verifying the two artifacts still describe the same
/// record sequence.
pub fn load_store(dir: &Path) -> Result<StoreData> {
    if !store_exists(dir) {
        return Err(Error::NotFound(format!(
            "no vector store at {}",
            dir.display()
        )));
    }

    let vectors: Vec<Vec<f32>> = serde_json::from_str(&fs::read_to_string(dir.join(VECTORS_FILE))?)?;
    let metadata: Vec<ChunkMeta> =
        serde_json::from_str(&fs::read_to_string(dir.join(METADATA_FILE))?)?;

    if vectors.len() != metadata.len() {
        return Err(Error::Schema(format!(
            "store at {} holds {} vectors but {} metadata records",
            dir.display(),
            vectors.len(),
            metadata.len()
        )));
    }
    if let Some(first) = vectors.first() {
        let dim = first.len();
        if let Some(bad) = vectors.iter().position(|v| v.len() != dim) {
            return Err(Error::Schema(format!(
                "store at {} mixes dimensions: vector {} has {}, expected {}",
                dir.display(),
                bad,
                vectors[bad].len(),
                dim
            )));
        }
    }

    Ok(StoreData { vectors, metadata })
}
