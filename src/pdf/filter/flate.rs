//! FlateDecode (zlib/deflate) filter

use crate::fitz::error::{Error, Result};
use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use std::io::Read;

/// Decode FlateDecode compressed data
pub fn decode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::Generic(format!("FlateDecode failed: {}", e)))?;
    Ok(decompressed)
}

/// Decode, salvaging whatever decompressed cleanly from a damaged stream.
/// Returns the partial data and sets `truncated` instead of failing.
pub fn decode_flate_tolerant(data: &[u8], truncated: &mut bool) -> Vec<u8> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match decoder.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(_) => {
                *truncated = true;
                break;
            }
        }
    }
    out
}

/// Encode data with FlateDecode
pub fn encode_flate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let compression = match level {
        0 => Compression::none(),
        1..=3 => Compression::fast(),
        4..=6 => Compression::default(),
        _ => Compression::best(),
    };
    let mut encoder = ZlibEncoder::new(data, compression);
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .map_err(|e| Error::Generic(format!("FlateDecode encode failed: {}", e)))?;
    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flate_encode_decode() {
        let original = b"stream data stream data stream data stream data stream data";
        let compressed = encode_flate(original, 6).unwrap();
        assert!(compressed.len() < original.len());
        let decompressed = decode_flate(&compressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn test_flate_empty() {
        let compressed = encode_flate(&[], 6).unwrap();
        assert_eq!(decode_flate(&compressed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_flate_garbage_fails() {
        assert!(decode_flate(b"not zlib at all").is_err());
    }

    #[test]
    fn test_flate_tolerant_truncated() {
        let compressed = encode_flate(b"some recoverable data 123456789", 6).unwrap();
        let cut = &compressed[..compressed.len() / 2];
        let mut truncated = false;
        let _ = decode_flate_tolerant(cut, &mut truncated);
        assert!(truncated);
    }

    #[test]
    fn test_flate_tolerant_intact() {
        let compressed = encode_flate(b"fine", 6).unwrap();
        let mut truncated = false;
        let out = decode_flate_tolerant(&compressed, &mut truncated);
        assert!(!truncated);
        assert_eq!(out, b"fine");
    }
}
