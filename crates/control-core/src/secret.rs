use sha2::{Digest, Sha256};

/// Hashes an opaque secret (bootstrap token, node token, session token,
/// password) for at-rest storage. Only the hash is ever persisted; the
/// plaintext exists only for the single response that mints it.
pub fn hash(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify(secret: &str, stored_hash: &str) -> bool {
    hash(secret) == stored_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_verifiable() {
        let h = hash("node_abc123");
        assert!(verify("node_abc123", &h));
        assert!(!verify("node_abc124", &h));
    }
}
