use async_trait::async_trait;
use codegraph_core::Result;

/// The injected embedding capability (§4.4). The wire protocol to an actual embedding
/// provider (OpenAI, a local model server, …) is an external collaborator — this crate
/// only defines the seam [`EmbeddingService`] calls through.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of raw texts against `model` in one backend call, in order.
    async fn embed_texts(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}
