use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager as RedisConnection;
use synaptic_cache::{CacheConfig, GenerationCache, GenerationCodec};
use synaptic_core::{Generation, LlmCache, SynapticError};
use tokio::sync::OnceCell;

use crate::backend::RedisBackend;
use crate::config::{resolve, ConnectionSettings, CredentialRecord, EnvDefaults};
use crate::connection::{shared_manager, ConnectionManager, RedisConnector};

struct LazyConnection {
    manager: Arc<ConnectionManager<RedisConnector>>,
    settings: ConnectionSettings,
}

/// Redis-backed implementation of the [`LlmCache`](synaptic_core::LlmCache) trait.
///
/// Generations for one `(prompt, llm_key)` pair are stored one per key under
/// `{prefix}{digest}`, with optional TTL expiration managed by Redis itself.
///
/// Constructors resolve settings immediately, so configuration errors surface
/// at construction, but no connection is opened until the first lookup,
/// update or invalidate (or an explicit [`connect`](Self::connect)). A
/// connect failure leaves the cache unconnected and the next operation tries
/// again.
///
/// The connection reconnects on its own after the server drops it, so a
/// cache keeps working after a Redis restart or after the shared manager
/// closed it in favour of other settings.
pub struct RedisCache {
    source: Option<LazyConnection>,
    config: CacheConfig,
    codec: Option<GenerationCodec>,
    inner: OnceCell<GenerationCache<RedisBackend>>,
}

impl RedisCache {
    /// Wrap an existing connection.
    pub fn new(connection: RedisConnection, config: CacheConfig) -> Self {
        let inner = GenerationCache::with_backend(RedisBackend::new(connection), config.clone());
        Self {
            source: None,
            config,
            codec: None,
            inner: OnceCell::from(inner),
        }
    }

    /// Resolve `credential` against the process environment; the connection
    /// comes from the process-wide [`shared_manager`].
    pub fn init(credential: &CredentialRecord, config: CacheConfig) -> Result<Self, SynapticError> {
        Self::init_with(credential, &EnvDefaults::from_env(), config, shared_manager())
    }

    /// Like [`init`](Self::init) with explicit environment defaults and manager.
    pub fn init_with(
        credential: &CredentialRecord,
        env: &EnvDefaults,
        config: CacheConfig,
        manager: Arc<ConnectionManager<RedisConnector>>,
    ) -> Result<Self, SynapticError> {
        let settings = resolve(credential, env)?;
        Ok(Self::lazy(manager, settings, config))
    }

    /// Cache for `url`, connected through the process-wide [`shared_manager`].
    pub fn from_url(url: &str, config: CacheConfig) -> Result<Self, SynapticError> {
        let settings = ConnectionSettings::parse_url(url)?;
        Ok(Self::lazy(shared_manager(), settings, config))
    }

    fn lazy(
        manager: Arc<ConnectionManager<RedisConnector>>,
        settings: ConnectionSettings,
        config: CacheConfig,
    ) -> Self {
        Self {
            source: Some(LazyConnection { manager, settings }),
            config,
            codec: None,
            inner: OnceCell::new(),
        }
    }

    pub fn with_codec(mut self, codec: GenerationCodec) -> Self {
        if let Some(inner) = self.inner.take() {
            self.inner = OnceCell::from(inner.with_codec(codec.clone()));
        }
        self.codec = Some(codec);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Settings this cache connects with, or `None` for a wrapped connection.
    pub fn settings(&self) -> Option<&ConnectionSettings> {
        self.source.as_ref().map(|source| &source.settings)
    }

    /// Open the connection now instead of on the first operation.
    pub async fn connect(&self) -> Result<(), SynapticError> {
        self.cache().await.map(|_| ())
    }

    /// Drop the cached sequence for `(prompt, llm_key)`.
    pub async fn invalidate(&self, prompt: &str, llm_key: &str) -> Result<(), SynapticError> {
        self.cache().await?.invalidate(prompt, llm_key).await
    }

    async fn cache(&self) -> Result<&GenerationCache<RedisBackend>, SynapticError> {
        self.inner
            .get_or_try_init(|| async {
                let source = self.source.as_ref().ok_or_else(|| {
                    SynapticError::Store("RedisCache has no connection".to_string())
                })?;
                let connection = source.manager.acquire(&source.settings).await?;
                let cache = GenerationCache::with_backend(
                    RedisBackend::new(connection),
                    self.config.clone(),
                );
                Ok::<_, SynapticError>(match &self.codec {
                    Some(codec) => cache.with_codec(codec.clone()),
                    None => cache,
                })
            })
            .await
    }
}

#[async_trait]
impl LlmCache for RedisCache {
    async fn lookup(
        &self,
        prompt: &str,
        llm_key: &str,
    ) -> Result<Option<Vec<Generation>>, SynapticError> {
        self.cache().await?.lookup(prompt, llm_key).await
    }

    async fn update(
        &self,
        prompt: &str,
        llm_key: &str,
        generations: &[Generation],
    ) -> Result<(), SynapticError> {
        self.cache().await?.update(prompt, llm_key, generations).await
    }
}
