//! Identifier generation for sandboxes and containers.
//!
//! Identifiers are 64-character lowercase hex strings (SHA-256 of random
//! bytes), matching the OCI convention. 256 bits of randomness is what
//! guarantees that an identifier, once assigned, is never reused; releasing
//! one from an index only stops prefix lookups from matching it.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Length of a full identifier (64 hex chars = 256 bits).
pub const FULL_LENGTH: usize = 64;

/// Length of the short display form (12 hex chars).
pub const SHORT_LENGTH: usize = 12;

/// Generate a new random identifier.
pub fn generate_id() -> String {
    let mut random_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut random_bytes);

    let mut hasher = Sha256::new();
    hasher.update(random_bytes);
    hex::encode(hasher.finalize())
}

/// Short display form of an identifier.
pub fn short(id: &str) -> &str {
    &id[..SHORT_LENGTH.min(id.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_format() {
        let id1 = generate_id();
        let id2 = generate_id();

        assert_eq!(id1.len(), FULL_LENGTH);
        assert_eq!(id2.len(), FULL_LENGTH);
        assert_ne!(id1, id2);
        assert!(
            id1.chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_uppercase())
        );
    }

    #[test]
    fn test_short() {
        let id = generate_id();
        assert_eq!(short(&id).len(), SHORT_LENGTH);
        assert!(id.starts_with(short(&id)));

        // Shorter input is returned whole
        assert_eq!(short("abc"), "abc");
    }
}
