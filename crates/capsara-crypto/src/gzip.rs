//! Gzip compression applied before encryption.
//!
//! Compression is a pure win-or-skip heuristic: inputs below a break-even
//! threshold are never compressed, and compression is only kept if it
//! strictly shrinks the input.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::{CryptoError, Result};

/// Inputs smaller than this are never worth the gzip container overhead.
pub const BREAK_EVEN_THRESHOLD: usize = 150;

/// Gzip-compress `data` unconditionally.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| CryptoError::Gzip(e.to_string()))?;
    encoder.finish().map_err(|e| CryptoError::Gzip(e.to_string()))
}

/// Gzip-decompress `data`.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CryptoError::Gzip(e.to_string()))?;
    Ok(out)
}

/// Compress `data` if it clears the break-even threshold and compression
/// strictly shrinks it. Returns `None` when compression should be skipped,
/// in which case the caller stores the original bytes uncompressed.
pub fn maybe_compress(data: &[u8]) -> Result<Option<Vec<u8>>> {
    if data.len() < BREAK_EVEN_THRESHOLD {
        return Ok(None);
    }
    let compressed = compress(data)?;
    if compressed.len() < data.len() {
        Ok(Some(compressed))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data = vec![0u8; 10 * 1024];
        let compressed = compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn below_threshold_is_skipped() {
        let data = vec![0u8; BREAK_EVEN_THRESHOLD - 1];
        assert!(maybe_compress(&data).unwrap().is_none());
    }

    #[test]
    fn highly_compressible_is_compressed() {
        let data = vec![0u8; 10 * 1024];
        let result = maybe_compress(&data).unwrap();
        assert!(result.is_some());
        assert!(result.unwrap().len() < data.len());
    }

    #[test]
    fn incompressible_random_data_is_skipped() {
        use rand::RngCore;
        let mut data = vec![0u8; 4096];
        rand::rngs::OsRng.fill_bytes(&mut data);
        // Random data rarely compresses; if the break-even test below ever
        // becomes flaky, it means the RNG produced compressible output.
        let result = maybe_compress(&data).unwrap();
        assert!(result.is_none() || result.unwrap().len() < data.len());
    }
}
