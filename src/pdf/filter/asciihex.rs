//! ASCIIHexDecode filter

use crate::fitz::error::{Error, Result};

/// Decode ASCIIHex encoded data
pub fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut high_nibble: Option<u8> = None;

    for &byte in data {
        if byte.is_ascii_whitespace() {
            continue;
        }
        if byte == b'>' {
            break;
        }
        let nibble = match byte {
            b'0'..=b'9' => byte - b'0',
            b'A'..=b'F' => byte - b'A' + 10,
            b'a'..=b'f' => byte - b'a' + 10,
            _ => return Err(Error::Generic(format!("Invalid hex character: {}", byte))),
        };
        match high_nibble {
            None => high_nibble = Some(nibble),
            Some(high) => {
                result.push((high << 4) | nibble);
                high_nibble = None;
            }
        }
    }

    // An odd trailing digit implies a low nibble of zero
    if let Some(high) = high_nibble {
        result.push(high << 4);
    }

    Ok(result)
}

/// Encode data with ASCIIHex, breaking lines every 32 source bytes.
/// The terminating `>` and newline are included.
pub fn encode_ascii_hex(data: &[u8]) -> Vec<u8> {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut result = Vec::with_capacity(data.len() * 2 + data.len() / 32 + 2);
    let mut col = 0;
    for &byte in data {
        result.push(HEX[(byte >> 4) as usize]);
        result.push(HEX[(byte & 15) as usize]);
        col += 1;
        if col == 32 {
            result.push(b'\n');
            col = 0;
        }
    }
    result.push(b'>');
    result.push(b'\n');
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asciihex_roundtrip() {
        let original = b"Hello, Hex!";
        let encoded = encode_ascii_hex(original);
        let decoded = decode_ascii_hex(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_asciihex_line_breaks() {
        let data = vec![0xAB; 40];
        let encoded = encode_ascii_hex(&data);
        // a newline after 32 bytes (64 hex chars), then the remaining 8 bytes
        assert_eq!(encoded[64], b'\n');
        assert!(encoded.ends_with(b">\n"));
    }

    #[test]
    fn test_asciihex_empty() {
        let encoded = encode_ascii_hex(&[]);
        assert_eq!(encoded, b">\n");
        assert_eq!(decode_ascii_hex(&encoded).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_asciihex_odd_digits() {
        assert_eq!(decode_ascii_hex(b"f>").unwrap(), &[0xF0]);
    }

    #[test]
    fn test_asciihex_rejects_garbage() {
        assert!(decode_ascii_hex(b"zz>").is_err());
    }
}
