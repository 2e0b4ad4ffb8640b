use std::time::Duration;

use synaptic_core::SynapticError;

use crate::backend::CacheBackend;
use crate::key::derive_key;

/// An ordered run of opaque values cached for one `(prompt, llm_key)` pair.
///
/// Element `i` lives under `{prefix}{derive_key(prompt, llm_key, i)}`. The
/// sequence is dense: [`read`](Self::read) stops at the first absent index, so
/// a gap truncates everything after it.
///
/// Writes are not transactional. A failed [`write`](Self::write) leaves the
/// elements written before the failure in place.
#[derive(Debug, Clone, Copy)]
pub struct IndexedSequence<'a> {
    prefix: &'a str,
    prompt: &'a str,
    llm_key: &'a str,
}

impl<'a> IndexedSequence<'a> {
    pub fn new(prefix: &'a str, prompt: &'a str, llm_key: &'a str) -> Self {
        Self {
            prefix,
            prompt,
            llm_key,
        }
    }

    /// Full store key of element `index`.
    pub fn key_at(&self, index: usize) -> String {
        format!(
            "{}{}",
            self.prefix,
            derive_key(self.prompt, self.llm_key, index)
        )
    }

    /// Read elements from index 0 until the first miss.
    pub async fn read<B>(&self, backend: &B) -> Result<Vec<String>, SynapticError>
    where
        B: CacheBackend + ?Sized,
    {
        let mut values = Vec::new();
        while let Some(value) = backend.get(&self.key_at(values.len())).await? {
            values.push(value);
        }
        Ok(values)
    }

    /// Write `values` at indices `0..n`, then delete index `n`.
    ///
    /// Deleting index `n` terminates the sequence: entries left over from an
    /// earlier, longer write sit behind the gap and can no longer be read.
    pub async fn write<B>(
        &self,
        backend: &B,
        values: &[String],
        ttl: Option<Duration>,
    ) -> Result<(), SynapticError>
    where
        B: CacheBackend + ?Sized,
    {
        for (index, value) in values.iter().enumerate() {
            backend
                .set(&self.key_at(index), value, ttl)
                .await
                .map_err(|e| with_index(e, index, values.len()))?;
        }

        let terminator = self.key_at(values.len());
        backend.delete(&terminator).await?;
        tracing::debug!(
            written = values.len(),
            "IndexedSequence: wrote sequence and cleared terminator {terminator}"
        );
        Ok(())
    }

    /// Make the whole sequence read as a miss by deleting index 0.
    pub async fn invalidate<B>(&self, backend: &B) -> Result<(), SynapticError>
    where
        B: CacheBackend + ?Sized,
    {
        backend.delete(&self.key_at(0)).await
    }
}

fn with_index(error: SynapticError, index: usize, total: usize) -> SynapticError {
    let context = format!("write of element {index} of {total} failed ({index} written)");
    match error {
        SynapticError::Store(msg) => SynapticError::Store(format!("{context}: {msg}")),
        SynapticError::Cache(msg) => SynapticError::Cache(format!("{context}: {msg}")),
        other => other,
    }
}
