use std::sync::Arc;

use synaptic_core::{
    Generation, MessageMapper, SerdeMessageMapper, StoredGeneration, SynapticError,
};

/// Converts a [`Generation`] to and from the JSON text kept in the store.
///
/// The stored shape is `{"text": ..., "message": {"type": ..., "data": ...}}`
/// where `message` is only written for chat generations. Message payloads are
/// produced and rebuilt by the injected [`MessageMapper`].
#[derive(Clone)]
pub struct GenerationCodec {
    mapper: Arc<dyn MessageMapper>,
}

impl GenerationCodec {
    pub fn new(mapper: Arc<dyn MessageMapper>) -> Self {
        Self { mapper }
    }

    pub fn encode(&self, generation: &Generation) -> Result<String, SynapticError> {
        let stored = StoredGeneration {
            text: generation.text().to_string(),
            message: generation
                .message()
                .map(|message| self.mapper.to_stored(message))
                .transpose()?,
        };
        serde_json::to_string(&stored)
            .map_err(|e| SynapticError::Cache(format!("JSON serialize error: {e}")))
    }

    /// Decode one stored value.
    ///
    /// Anything that cannot be turned back into a generation is reported as
    /// [`SynapticError::CacheCorruption`].
    pub fn decode(&self, raw: &str) -> Result<Generation, SynapticError> {
        let stored: StoredGeneration = serde_json::from_str(raw)
            .map_err(|e| SynapticError::CacheCorruption(format!("JSON deserialize error: {e}")))?;

        match stored.message {
            Some(message) => {
                let message = self.mapper.from_stored(message).map_err(|e| {
                    SynapticError::CacheCorruption(format!("message reconstruction failed: {e}"))
                })?;
                Ok(Generation::chat_with_text(stored.text, message))
            }
            None => Ok(Generation::plain(stored.text)),
        }
    }
}

impl Default for GenerationCodec {
    fn default() -> Self {
        Self::new(Arc::new(SerdeMessageMapper))
    }
}

impl std::fmt::Debug for GenerationCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCodec").finish_non_exhaustive()
    }
}
