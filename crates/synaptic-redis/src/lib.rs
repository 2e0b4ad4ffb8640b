//! Redis integration for the Synaptic generation cache.
//!
//! - [`RedisCache`] — implements the [`LlmCache`](synaptic_core::LlmCache)
//!   trait on Redis, with optional TTL expiration applied atomically on write.
//!   The connection is opened on the first cache operation and reconnects by
//!   itself after the server drops it.
//! - [`ConnectionManager`] — one live connection per manager, replaced only
//!   when the requested [`ConnectionSettings`] change. [`shared_manager`] is
//!   the process-wide instance.
//! - [`resolve`] — builds [`ConnectionSettings`] from a [`CredentialRecord`]
//!   and [`EnvDefaults`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use synaptic_redis::{CacheConfig, CredentialRecord, Generation, LlmCache, RedisCache};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credential = CredentialRecord {
//!     url: Some("redis://127.0.0.1:6379".to_string()),
//!     ..Default::default()
//! };
//!
//! // Cache with 1-hour TTL
//! let config = CacheConfig::default().with_ttl(Duration::from_secs(3600));
//! let cache = RedisCache::init(&credential, config)?;
//!
//! cache.update("What is 2+2?", "model-a", &[Generation::plain("4")]).await?;
//! let cached = cache.lookup("What is 2+2?", "model-a").await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod cache;
mod config;
mod connection;

pub use backend::RedisBackend;
pub use cache::RedisCache;
pub use config::{
    resolve, ConnectionSettings, CredentialRecord, EnvDefaults, TlsMode, DEFAULT_HOST,
    DEFAULT_PORT,
};
pub use connection::{
    shared_manager, ConnectionManager, Connector, RedisConnector, DEFAULT_CLOSE_TIMEOUT,
};

// Re-export cache configuration and core traits for convenience.
pub use synaptic_cache::CacheConfig;
pub use synaptic_core::{Generation, LlmCache};
