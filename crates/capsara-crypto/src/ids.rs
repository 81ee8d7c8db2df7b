//! URL-safe identifier generation
//!
//! Every output byte is a random byte masked with `0x3F`, which indexes a
//! 64-character alphabet uniformly without rejection sampling.

use rand::RngCore;
use rand::rngs::OsRng;

/// The 64-character URL-safe alphabet identifiers are drawn from.
pub const ID_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Default length (in characters) of a package or nested-file identifier body.
pub const DEFAULT_ID_LEN: usize = 22;

/// Default length (in characters) of a short handle.
pub const SHORT_ID_LEN: usize = 16;

/// Generate a random URL-safe identifier body of the given length.
pub fn generate_id(len: usize) -> String {
    let mut raw = vec![0u8; len];
    OsRng.fill_bytes(&mut raw);
    raw.iter()
        .map(|b| ID_ALPHABET[(b & 0x3F) as usize] as char)
        .collect()
}

/// Generate a full package identifier: `capsa_` + 22 alphabet characters.
pub fn generate_package_id() -> String {
    format!("capsa_{}", generate_id(DEFAULT_ID_LEN))
}

/// Generate a full file identifier: `file_` + 22 alphabet characters + `.enc`.
///
/// Section 3 and section 4.2 of the source agree on 22 characters for
/// "nested file IDs"; a stray mention elsewhere of 16 characters is treated
/// as referring to unrelated short handles, not file identifiers (see
/// DESIGN.md).
pub fn generate_file_id() -> String {
    format!("file_{}.enc", generate_id(DEFAULT_ID_LEN))
}

/// Generate a short handle: no prefix, 16 alphabet characters.
pub fn generate_short_handle() -> String {
    generate_id(SHORT_ID_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn package_id_has_expected_shape() {
        let id = generate_package_id();
        assert!(id.starts_with("capsa_"));
        assert_eq!(id.len(), "capsa_".len() + DEFAULT_ID_LEN);
    }

    #[test]
    fn file_id_has_expected_shape() {
        let id = generate_file_id();
        assert!(id.starts_with("file_"));
        assert!(id.ends_with(".enc"));
        assert_eq!(id.len(), "file_".len() + DEFAULT_ID_LEN + ".enc".len());
    }

    #[test]
    fn ids_use_only_the_url_safe_alphabet() {
        let id = generate_id(256);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn ids_are_unique_across_many_draws() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate_id(22)), "id collision detected");
        }
    }
}
