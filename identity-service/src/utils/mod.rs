pub mod password;
pub mod validation;

use sha2::{Digest, Sha256};

pub use validation::ValidatedJson;

/// Hex-encoded SHA-256 digest.
///
/// Every opaque token (refresh, invitation, reset) is stored by digest so a
/// leaked table never yields usable tokens.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_hex() {
        let digest = sha256_hex("token_abc");
        assert_eq!(digest, sha256_hex("token_abc"));
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(digest, sha256_hex("token_abd"));
    }
}
