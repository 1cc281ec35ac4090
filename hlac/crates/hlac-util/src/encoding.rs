//! Percent (base-16) encoding for URIs crossing the editor boundary.
//!
//! File paths leave the analyzer as URIs; anything outside the unreserved
//! set is escaped as `%XX` with uppercase hex digits. Decoding is strict:
//! a malformed escape or invalid UTF-8 is an error, not a silent
//! pass-through.

use crate::error::EncodingError;

#[inline]
fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
}

/// Percent-encode a URI component.
///
/// # Examples
///
/// ```
/// use hlac_util::encoding::encode_uri_component;
///
/// assert_eq!(encode_uri_component("A B"), "A%20B");
/// assert_eq!(encode_uri_component("file.hlasm"), "file.hlasm");
/// ```
pub fn encode_uri_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(char::from_digit((b >> 4) as u32, 16).unwrap().to_ascii_uppercase());
            out.push(char::from_digit((b & 0xf) as u32, 16).unwrap().to_ascii_uppercase());
        }
    }
    out
}

/// Decode a percent-encoded URI component.
pub fn decode_uri_component(input: &str) -> Result<String, EncodingError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16));
                let lo = bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push(((hi << 4) | lo) as u8);
                        i += 3;
                    }
                    _ => return Err(EncodingError::InvalidEscape(i)),
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| EncodingError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_basic() {
        assert_eq!(encode_uri_component("plain-name_1.txt"), "plain-name_1.txt");
        assert_eq!(encode_uri_component("a/b c"), "a%2Fb%20c");
        assert_eq!(encode_uri_component("100%"), "100%25");
    }

    #[test]
    fn test_decode_basic() {
        assert_eq!(decode_uri_component("a%2Fb%20c").unwrap(), "a/b c");
        assert_eq!(decode_uri_component("plain").unwrap(), "plain");
    }

    #[test]
    fn test_round_trip() {
        for s in [
            "",
            "MEMBER",
            "dir with spaces/file.hlasm",
            "odd%chars&more=yes",
            "útf-8 žluťoučký",
        ] {
            assert_eq!(decode_uri_component(&encode_uri_component(s)).unwrap(), s);
        }
    }

    #[test]
    fn test_decode_rejects_truncated_escape() {
        assert!(matches!(
            decode_uri_component("abc%2"),
            Err(EncodingError::InvalidEscape(3))
        ));
        assert!(matches!(
            decode_uri_component("%GG"),
            Err(EncodingError::InvalidEscape(0))
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        assert!(matches!(
            decode_uri_component("%FF%FE"),
            Err(EncodingError::InvalidUtf8)
        ));
    }
}
