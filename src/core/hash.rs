//! Short, stable identifiers derived from long names.
//!
//! Used wherever a canonical name (a topic ARN, a deep construct path) is too
//! long or too irregular to serve as a template key.

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;

/// Default number of digest bytes kept by [`short_id`]
pub const DEFAULT_SHORT_ID_BYTES: usize = 4;

/// Derive a short identifier from `input`.
///
/// SHAKE256 of the input read out to `length` bytes, rendered as uppercase
/// hexadecimal, so the result has `2 * length` characters. A shorter id is
/// always a prefix of a longer one for the same input.
pub fn short_id(input: &str, length: usize) -> String {
    let mut hasher = Shake256::default();
    hasher.update(input.as_bytes());

    let mut digest = vec![0u8; length];
    hasher.finalize_xof().read(&mut digest);
    hex::encode_upper(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_is_deterministic() {
        let arn = "arn:aws:sns:us-east-1:123456789012:alerts";
        let first = short_id(arn, DEFAULT_SHORT_ID_BYTES);
        let second = short_id(arn, DEFAULT_SHORT_ID_BYTES);

        assert_eq!(first, second);
        assert_eq!(first.len(), 8);
        assert!(first.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_short_id_known_digest() {
        // SHAKE256 of the empty string starts 46b9dd2b0ba88d13
        assert_eq!(short_id("", 4), "46B9DD2B");
        assert_eq!(short_id("", 8), "46B9DD2B0BA88D13");
    }

    #[test]
    fn test_short_id_differs_per_input() {
        assert_ne!(
            short_id("arn:aws:sns:us-east-1:123456789012:alerts", 4),
            short_id("arn:aws:sns:us-east-1:123456789012:alarms", 4)
        );
    }

    #[test]
    fn test_short_id_length() {
        assert_eq!(short_id("x", 0), "");
        assert_eq!(short_id("x", 1).len(), 2);
        assert_eq!(short_id("x", 16).len(), 32);
        assert_eq!(short_id("x", 32).len(), 64);
        assert_eq!(short_id("x", 40).len(), 80);
        assert_eq!(short_id("x", 100).len(), 200);
    }

    #[test]
    fn test_longer_id_extends_shorter() {
        assert!(short_id("x", 40).starts_with(&short_id("x", 4)));
    }
}
