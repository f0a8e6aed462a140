use sha2::{Digest, Sha256};

/// SHA-256 of an in-memory receipt image.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex, 64 chars.
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Hex digest of `data`, the identity of a receipt inside a batch.
pub fn content_id(data: &[u8]) -> String {
    to_hex(&sha256_bytes(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_known_vector() {
        assert_eq!(
            content_id(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn identical_images_share_an_id() {
        assert_eq!(content_id(b"receipt"), content_id(b"receipt"));
        assert_ne!(content_id(b"receipt"), content_id(b"receipt2"));
        assert_eq!(content_id(b"x").len(), 64);
    }
}
