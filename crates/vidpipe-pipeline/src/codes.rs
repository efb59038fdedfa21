//! Video code allocation.

use rand::Rng;

/// Alphabet for public codes: lowercase alphanumerics minus the lookalikes
/// (0/o, 1/l) so codes survive being read aloud.
const CODE_ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyz23456789";

/// Generated code length; within the 8-12 character contract.
pub const CODE_LENGTH: usize = 10;

/// Generate a fresh random code. Uniqueness is enforced by the database's
/// unique index; callers re-roll on collision.
pub fn new_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Check a client-supplied code against the slug contract.
pub fn is_valid_code(code: &str) -> bool {
    (8..=12).contains(&code.len())
        && code.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        for _ in 0..100 {
            let code = new_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(is_valid_code(&code), "bad code: {}", code);
        }
    }

    #[test]
    fn test_codes_are_distinct() {
        let a = new_code();
        let b = new_code();
        assert_ne!(a, b);
    }

    #[test]
    fn test_validation_bounds() {
        assert!(!is_valid_code("short"));
        assert!(!is_valid_code("waytoolongforacode"));
        assert!(!is_valid_code("UPPER123xy"));
        assert!(is_valid_code("abcd1234"));
    }
}
