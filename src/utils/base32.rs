//! RFC 4648 Base32 without padding, as used by authenticator apps.

pub const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

const NOPAD: ::base32::Alphabet = ::base32::Alphabet::Rfc4648 { padding: false };

/// Encodes bytes as unpadded Base32.
pub fn encode_base32(bytes: &[u8]) -> String {
    ::base32::encode(NOPAD, bytes)
}

/// Decodes Base32, case-insensitively. Characters outside the alphabet
/// (spaces, dashes, `=` padding) are skipped and a trailing character that
/// cannot complete a byte is dropped, so this never fails.
pub fn decode_base32(input: &str) -> Vec<u8> {
    let mut cleaned: String = input
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| c.is_ascii() && ALPHABET.contains(&(*c as u8)))
        .collect();

    // 1, 3 and 6 leftover characters are not a valid unpadded tail.
    if matches!(cleaned.len() % 8, 1 | 3 | 6) {
        cleaned.pop();
    }

    ::base32::decode(NOPAD, &cleaned).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"", "")]
    #[case(b"f", "MY")]
    #[case(b"fo", "MZXQ")]
    #[case(b"foo", "MZXW6")]
    #[case(b"foob", "MZXW6YQ")]
    #[case(b"fooba", "MZXW6YTB")]
    #[case(b"foobar", "MZXW6YTBOI")]
    fn rfc4648_vectors(#[case] raw: &[u8], #[case] encoded: &str) {
        assert_eq!(encode_base32(raw), encoded);
        assert_eq!(decode_base32(encoded), raw);
    }

    #[test]
    fn round_trips_arbitrary_bytes() {
        let all: Vec<u8> = (0..=255).collect();
        for len in 0..all.len() {
            let slice = &all[..len];
            assert_eq!(decode_base32(&encode_base32(slice)), slice);
        }
    }

    #[test]
    fn decode_ignores_invalid_characters_and_case() {
        assert_eq!(decode_base32("mzxw-6ytb oi=="), b"foobar");
        assert_eq!(decode_base32("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ"), b"12345678901234567890");
        assert!(decode_base32("0189!!").is_empty());
    }

    #[rstest]
    #[case("M", b"")]
    #[case("MYA", b"f")]
    #[case("MZXW6Y", b"foo")]
    fn decode_drops_an_incomplete_tail(#[case] encoded: &str, #[case] raw: &[u8]) {
        assert_eq!(decode_base32(encoded), raw);
    }
}
