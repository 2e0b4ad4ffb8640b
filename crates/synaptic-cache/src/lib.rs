//! Store-agnostic caching of model generations.
//!
//! A cached entry is an ordered sequence of [`Generation`](synaptic_core::Generation)s
//! for one `(prompt, llm_key)` pair. Each element lives under its own key,
//! derived from the pair plus the element index, and a lookup reads indices
//! `0, 1, 2, …` until the first absent key.
//!
//! - [`derive_key`] — content-derived key for one element.
//! - [`GenerationCodec`] — JSON encoding of a single generation.
//! - [`IndexedSequence`] — dense write / read-until-miss over a [`CacheBackend`].
//! - [`GenerationCache`] — the [`LlmCache`] implementation composing the above.
//! - [`InMemoryBackend`] / [`InMemoryCache`] — in-process backend with TTL support.

mod backend;
mod cache;
mod codec;
mod key;
mod sequence;

pub use backend::{CacheBackend, InMemoryBackend};
pub use cache::{CacheConfig, GenerationCache, InMemoryCache};
pub use codec::GenerationCodec;
pub use key::derive_key;
pub use sequence::IndexedSequence;

// Re-export LlmCache trait from core for convenience
pub use synaptic_core::LlmCache;
