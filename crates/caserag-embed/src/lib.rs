//! Embedding seam: per-category embedder handles plus one offline embedder.
//!
//! Real models stay behind the `Embedder` trait outside this workspace;
//! `HashEmbedder` keeps the pipeline runnable without model files and gives
//! tests stable vectors.

use anyhow::Result;

use caserag_core::traits::Embedder;
use caserag_core::types::Category;

/// Deterministic feature-hashing embedder.
///
/// Whitespace tokens are hashed into `dim` buckets and the vector is
/// L2-normalized. Not a semantic model.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Per-category embedder handles, passed explicitly through the store and
/// match stages. CODE and TEXT may use different models and dimensions.
pub struct EmbeddingService {
    code: Box<dyn Embedder>,
    text: Box<dyn Embedder>,
}

impl EmbeddingService {
    pub fn new(code: Box<dyn Embedder>, text: Box<dyn Embedder>) -> Self {
        Self { code, text }
    }

    pub fn embedder(&self, category: Category) -> &dyn Embedder {
        match category {
            Category::Code => self.code.as_ref(),
            Category::Text => self.text.as_ref(),
        }
    }

    pub fn dim(&self, category: Category) -> usize {
        self.embedder(category).dim()
    }

    pub fn embed_batch(&self, category: Category, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embedder(category).embed_batch(texts)
    }
}

/// Offline hashing service with one dimension per category.
pub fn hashing_service(code_dim: usize, text_dim: usize) -> EmbeddingService {
    EmbeddingService::new(
        Box::new(HashEmbedder::new(code_dim)),
        Box::new(HashEmbedder::new(text_dim)),
    )
}
