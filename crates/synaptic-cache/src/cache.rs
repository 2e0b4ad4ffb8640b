use std::time::Duration;

use async_trait::async_trait;
use synaptic_core::{Generation, LlmCache, SynapticError};

use crate::backend::{CacheBackend, InMemoryBackend};
use crate::codec::GenerationCodec;
use crate::sequence::IndexedSequence;

/// Configuration shared by every [`GenerationCache`] backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Key prefix for all cache entries. Defaults to `"synaptic:cache:"`.
    pub prefix: String,
    /// Optional TTL. When set, every entry is written with this expiration.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "synaptic:cache:".to_string(),
            ttl: None,
        }
    }
}

impl CacheConfig {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Apply a TTL given as text in milliseconds, as entered on the cache node.
    ///
    /// A blank value leaves the TTL unset.
    pub fn with_ttl_ms(mut self, raw: &str) -> Result<Self, SynapticError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(self);
        }
        let ms: u64 = raw
            .parse()
            .map_err(|e| SynapticError::Config(format!("invalid TTL '{raw}': {e}")))?;
        self.ttl = Some(Duration::from_millis(ms));
        Ok(self)
    }
}

/// [`LlmCache`] over any [`CacheBackend`].
///
/// `update` writes one element per generation plus a terminating delete (see
/// [`IndexedSequence::write`]); `lookup` reads until the first missing index.
pub struct GenerationCache<B> {
    backend: B,
    codec: GenerationCodec,
    config: CacheConfig,
}

impl<B: CacheBackend> GenerationCache<B> {
    pub fn with_backend(backend: B, config: CacheConfig) -> Self {
        Self {
            backend,
            codec: GenerationCodec::default(),
            config,
        }
    }

    /// Replace the codec, e.g. to plug in a different message mapper.
    pub fn with_codec(mut self, codec: GenerationCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn sequence<'a>(&'a self, prompt: &'a str, llm_key: &'a str) -> IndexedSequence<'a> {
        IndexedSequence::new(&self.config.prefix, prompt, llm_key)
    }

    /// Drop the cached sequence for `(prompt, llm_key)` so the next lookup misses.
    pub async fn invalidate(&self, prompt: &str, llm_key: &str) -> Result<(), SynapticError> {
        self.sequence(prompt, llm_key)
            .invalidate(&self.backend)
            .await
    }
}

#[async_trait]
impl<B: CacheBackend> LlmCache for GenerationCache<B> {
    async fn lookup(
        &self,
        prompt: &str,
        llm_key: &str,
    ) -> Result<Option<Vec<Generation>>, SynapticError> {
        let raw = self.sequence(prompt, llm_key).read(&self.backend).await?;
        if raw.is_empty() {
            tracing::debug!(llm_key, "GenerationCache: miss");
            return Ok(None);
        }

        let generations = raw
            .iter()
            .enumerate()
            .map(|(index, value)| {
                self.codec.decode(value).map_err(|e| match e {
                    SynapticError::CacheCorruption(detail) => SynapticError::CacheCorruption(
                        format!("element {index} for model '{llm_key}': {detail}"),
                    ),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            llm_key,
            count = generations.len(),
            "GenerationCache: hit"
        );
        Ok(Some(generations))
    }

    async fn update(
        &self,
        prompt: &str,
        llm_key: &str,
        generations: &[Generation],
    ) -> Result<(), SynapticError> {
        let sequence = self.sequence(prompt, llm_key);

        if self.config.ttl.is_some_and(|ttl| ttl.is_zero()) {
            tracing::debug!(llm_key, "GenerationCache: zero TTL, invalidating instead of writing");
            return sequence.invalidate(&self.backend).await;
        }

        // Encode everything up front so an encoding failure writes nothing.
        let encoded = generations
            .iter()
            .map(|generation| self.codec.encode(generation))
            .collect::<Result<Vec<_>, _>>()?;

        sequence.write(&self.backend, &encoded, self.config.ttl).await
    }
}

/// Generation cache kept in process memory.
pub type InMemoryCache = GenerationCache<InMemoryBackend>;

impl GenerationCache<InMemoryBackend> {
    pub fn new() -> Self {
        Self::with_backend(InMemoryBackend::new(), CacheConfig::default())
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_backend(InMemoryBackend::new(), CacheConfig::default().with_ttl(ttl))
    }
}

impl Default for GenerationCache<InMemoryBackend> {
    fn default() -> Self {
        Self::new()
    }
}
