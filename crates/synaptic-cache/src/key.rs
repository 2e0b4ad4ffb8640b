use sha2::{Digest, Sha256};

/// Derive the key of element `index` in the sequence cached for `(prompt, llm_key)`.
///
/// Each part is hashed with a length prefix, so no choice of separator
/// characters inside the prompt or model identity can make two distinct
/// triples collide on the hash input. The result is a lowercase hex SHA-256
/// digest.
pub fn derive_key(prompt: &str, llm_key: &str, index: usize) -> String {
    let index = index.to_string();
    let mut hasher = Sha256::new();
    for part in [prompt, llm_key, index.as_str()] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
