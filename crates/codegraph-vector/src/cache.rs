use codegraph_core::EmbeddingChannel;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

fn digest(channel: EmbeddingChannel, model: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{channel:?}").as_bytes());
    hasher.update(b"\0");
    hasher.update(model.as_bytes());
    hasher.update(b"\0");
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Content-addressed cache keyed by `(channel, model, text_digest)` (§4.4): identical texts
/// return byte-identical vectors rather than re-embedding.
#[derive(Default)]
pub struct EmbeddingCache {
    entries: DashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: EmbeddingChannel, model: &str, text: &str) -> Option<Vec<f32>> {
        self.entries.get(&digest(channel, model, text)).map(|v| v.clone())
    }

    pub fn insert(&self, channel: EmbeddingChannel, model: &str, text: &str, vector: Vec<f32>) {
        self.entries.insert(digest(channel, model, text), vector);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_hit_the_same_cache_entry() {
        let cache = EmbeddingCache::new();
        cache.insert(EmbeddingChannel::Content, "model-a", "fn foo() {}", vec![0.1, 0.2]);
        assert_eq!(cache.get(EmbeddingChannel::Content, "model-a", "fn foo() {}"), Some(vec![0.1, 0.2]));
    }

    #[test]
    fn different_channels_are_distinct_cache_keys() {
        let cache = EmbeddingCache::new();
        cache.insert(EmbeddingChannel::Content, "model-a", "text", vec![1.0]);
        assert_eq!(cache.get(EmbeddingChannel::Semantic, "model-a", "text"), None);
    }
}
