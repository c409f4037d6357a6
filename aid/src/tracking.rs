//! Tracking-number issuance.
//!
//! A tracking number is the only key an unauthenticated requester holds, so
//! it must be shareable and must not encode anything about the person:
//! `B40-` plus eight uppercase hex characters drawn from a fresh v4 UUID.
//! Uniqueness is enforced by the store claiming the candidate atomically and
//! asking for another on the (negligible-odds) collision.

use uuid::Uuid;

pub const PREFIX: &str = "B40-";
const SUFFIX_LEN: usize = 8;

/// Draw one candidate tracking number.
pub fn candidate() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{PREFIX}{}", hex[..SUFFIX_LEN].to_uppercase())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn candidates_have_the_public_shape() {
        let number = candidate();
        assert!(number.starts_with(PREFIX));
        assert_eq!(number.len(), PREFIX.len() + SUFFIX_LEN);

        let suffix = &number[PREFIX.len()..];
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn candidates_do_not_repeat_in_practice() {
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            assert!(seen.insert(candidate()), "duplicate candidate drawn");
        }
    }
}
