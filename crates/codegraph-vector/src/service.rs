use crate::backend::EmbeddingBackend;
use crate::cache::EmbeddingCache;
use codegraph_core::{retry_with_backoff, BackoffPolicy, CodeGraphError, EmbeddingChannel, EmbeddingConfig, Result};
use std::sync::Arc;

/// Outcome of [`EmbeddingService::embed_batch`]: per-position vectors, `None` where the
/// backend failed that position, with a matching diagnostic (§4.4).
pub struct BatchEmbedResult {
    pub vectors: Vec<Option<Vec<f32>>>,
    pub diagnostics: Vec<String>,
}

/// Four embedding channels sharing one backend model with distinct input-preparation
/// policies; callers are responsible for constructing the right input text per channel
/// (verbatim code for `content`, a narrative string for the other three) — this service
/// only embeds whatever text it is handed (§4.4).
pub struct EmbeddingService {
    backend: Arc<dyn EmbeddingBackend>,
    config: EmbeddingConfig,
    cache: Option<EmbeddingCache>,
    retry_policy: BackoffPolicy,
}

impl EmbeddingService {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, config: EmbeddingConfig) -> Result<Self> {
        config.validate().map_err(|_| {
            CodeGraphError::Configuration("invalid embedding configuration".to_string())
        })?;
        let cache = config.enable_caching.then(EmbeddingCache::new);
        Ok(Self {
            backend,
            config,
            cache,
            retry_policy: BackoffPolicy::new(3, std::time::Duration::from_secs(2), 2.0),
        })
    }

    pub async fn embed(&self, channel: EmbeddingChannel, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(channel, &self.config.model, text) {
                return Ok(hit);
            }
        }

        let texts = vec![text.to_string()];
        let model = self.config.model.clone();
        let backend = self.backend.clone();
        let vectors = retry_with_backoff(
            self.retry_policy,
            CodeGraphError::is_retryable,
            move |_attempt| {
                let backend = backend.clone();
                let model = model.clone();
                let texts = texts.clone();
                async move { backend.embed_texts(&model, &texts).await }
            },
        )
        .await?;

        let vector = normalize(vectors.into_iter().next().unwrap_or_default());
        if let Some(cache) = &self.cache {
            cache.insert(channel, &self.config.model, text, vector.clone());
        }
        Ok(vector)
    }

    /// Splits `texts` into sub-batches of at most `batch_size`, preserves input order, and
    /// on partial failure omits the failed position with a diagnostic rather than failing
    /// the whole call (§4.4).
    pub async fn embed_batch(&self, channel: EmbeddingChannel, texts: &[String]) -> Result<BatchEmbedResult> {
        let mut vectors = vec![None; texts.len()];
        let mut diagnostics = Vec::new();

        for (chunk_index, chunk) in texts.chunks(self.config.batch_size).enumerate() {
            let base = chunk_index * self.config.batch_size;
            for (offset, text) in chunk.iter().enumerate() {
                match self.embed(channel, text).await {
                    Ok(vector) => vectors[base + offset] = Some(vector),
                    Err(e) => diagnostics.push(format!("position {}: {e}", base + offset)),
                }
            }
        }

        Ok(BatchEmbedResult { vectors, diagnostics })
    }

    /// Cosine similarity in `[-1, 1]`.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }
}

fn normalize(vector: Vec<f32>) -> Vec<f32> {
    let magnitude: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude == 0.0 {
        return vector;
    }
    vector.into_iter().map(|v| v / magnitude).collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubBackend {
        dimension: usize,
        calls: AtomicUsize,
        fail_first_n: usize,
    }

    #[async_trait]
    impl EmbeddingBackend for StubBackend {
        async fn embed_texts(&self, _model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first_n {
                return Err(CodeGraphError::EmbeddingRetryable("rate limited".to_string()));
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0; self.dimension];
                    v[0] = t.len() as f32;
                    v
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            model: "test-model".to_string(),
            dimensions: 4,
            batch_size: 2,
            enable_caching: true,
            api_key: Some("key".to_string()),
        }
    }

    #[tokio::test]
    async fn embed_returns_a_unit_vector() {
        let backend = Arc::new(StubBackend {
            dimension: 4,
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
        });
        let service = EmbeddingService::new(backend, config()).unwrap();
        let vector = service.embed(EmbeddingChannel::Content, "hello").await.unwrap();
        let magnitude: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn identical_text_hits_the_cache_on_second_call() {
        let backend = Arc::new(StubBackend {
            dimension: 4,
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
        });
        let service = EmbeddingService::new(backend.clone(), config()).unwrap();
        let first = service.embed(EmbeddingChannel::Semantic, "same text").await.unwrap();
        let second = service.embed(EmbeddingChannel::Semantic, "same text").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_a_retryable_error_then_succeeds() {
        let backend = Arc::new(StubBackend {
            dimension: 4,
            calls: AtomicUsize::new(0),
            fail_first_n: 2,
        });
        let service = EmbeddingService::new(backend, config()).unwrap();
        let result = service.embed(EmbeddingChannel::DataFlow, "text").await;
        assert!(result.is_ok());
    }

    #[test]
    fn orthogonal_vectors_are_near_zero_similarity() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn identical_vectors_have_similarity_near_one() {
        let v = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn invalid_configuration_is_rejected_at_construction() {
        let backend = Arc::new(StubBackend {
            dimension: 4,
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
        });
        let mut bad_config = config();
        bad_config.dimensions = 0;
        assert!(EmbeddingService::new(backend, bad_config).is_err());
    }
}
