/// Opaque embedding function: text in, fixed-dimension vector out.
/// The model behind it is deliberately outside this workspace.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}
