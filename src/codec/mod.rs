//! Compression adapter: a lossless byte compressor plus the
//! "keep it only if it shrinks" storage policy.
//!
//! # Policy
//! Every frame payload (already packed, if packing is on) is offered to the
//! compressor.  If the compressed form is not strictly smaller, it is thrown
//! away and the payload is stored verbatim with `compressed_size = 0`, the
//! on-disk sentinel for "stored uncompressed".
//!
//! # Backend
//! All three LZ4 header variants use the LZ4 *block* format (no frame
//! envelope, no size prefix; the frame header already carries both sizes).
//! They share one decompressor, so a file written with any variant reads
//! back identically.

use thiserror::Error;

use crate::file_header::Compression;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Decompressed {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

// ── Compressor trait ─────────────────────────────────────────────────────────

pub trait Compressor: Send + Sync {
    fn compression(&self) -> Compression;

    /// Upper bound on the output of [`compress_into`](Self::compress_into)
    /// for `input_len` bytes.
    fn max_compressed_len(&self, input_len: usize) -> usize;

    /// Compress `data` into `out`, which holds at least
    /// `max_compressed_len(data.len())` bytes.  Returns bytes written.
    fn compress_into(&self, data: &[u8], out: &mut [u8]) -> Result<usize, CodecError>;

    /// Decompress `data` into `out`.  Returns bytes written.
    fn decompress_into(&self, data: &[u8], out: &mut [u8]) -> Result<usize, CodecError>;
}

pub struct Lz4Compressor {
    variant: Compression,
}

impl Lz4Compressor {
    pub fn new(variant: Compression) -> Self {
        Self { variant }
    }
}

impl Compressor for Lz4Compressor {
    fn compression(&self) -> Compression { self.variant }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(input_len)
    }

    fn compress_into(&self, data: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        lz4_flex::block::compress_into(data, out)
            .map_err(|e| CodecError::Compression(e.to_string()))
    }

    fn decompress_into(&self, data: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        lz4_flex::block::decompress_into(data, out)
            .map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

/// Resolve the header's compression field.  `None` for uncompressed files.
pub fn compressor_for(compression: Compression) -> Option<Box<dyn Compressor>> {
    match compression {
        Compression::None => None,
        Compression::Lz4Fast | Compression::Lz4Balanced | Compression::Lz4High => {
            Some(Box::new(Lz4Compressor::new(compression)))
        }
    }
}

// ── Policy ───────────────────────────────────────────────────────────────────

/// Compress `payload` into `scratch` (grown as needed, never shrunk).
///
/// Returns `Some(len)` when `scratch[..len]` is strictly smaller than the
/// payload, `None` when the payload should be stored as-is.  A compressor
/// failure also yields `None`: storing verbatim is always valid.
pub fn compress_if_smaller(
    compressor: &dyn Compressor,
    payload:    &[u8],
    scratch:    &mut Vec<u8>,
) -> Option<usize> {
    let bound = compressor.max_compressed_len(payload.len());
    if scratch.len() < bound {
        scratch.resize(bound, 0);
    }
    match compressor.compress_into(payload, scratch) {
        Ok(len) if len > 0 && len < payload.len() => Some(len),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("compression failed, storing payload verbatim: {e}");
            None
        }
    }
}

/// Decompress `data` into `out`, which is resized to exactly `expected_size`.
/// Anything other than exactly `expected_size` output bytes is an error.
pub fn decompress_exact(
    compressor:    &dyn Compressor,
    data:          &[u8],
    expected_size: usize,
    out:           &mut Vec<u8>,
) -> Result<(), CodecError> {
    out.clear();
    out.resize(expected_size, 0);
    let actual = compressor.decompress_into(data, out)?;
    if actual != expected_size {
        return Err(CodecError::SizeMismatch { expected: expected_size, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn none_has_no_compressor() {
        assert!(compressor_for(Compression::None).is_none());
        for c in [Compression::Lz4Fast, Compression::Lz4Balanced, Compression::Lz4High] {
            assert_eq!(compressor_for(c).unwrap().compression(), c);
        }
    }

    #[test]
    fn compressible_payload_is_kept_compressed() {
        let lz4 = Lz4Compressor::new(Compression::Lz4Fast);
        let payload = vec![7u8; 8192];
        let mut scratch = Vec::new();
        let len = compress_if_smaller(&lz4, &payload, &mut scratch).unwrap();
        assert!(len < payload.len());

        let mut out = Vec::new();
        decompress_exact(&lz4, &scratch[..len], payload.len(), &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn incompressible_payload_is_stored() {
        let lz4 = Lz4Compressor::new(Compression::Lz4Fast);
        let payload = noise(4096);
        let mut scratch = Vec::new();
        assert_eq!(compress_if_smaller(&lz4, &payload, &mut scratch), None);
    }

    #[test]
    fn empty_payload_is_stored() {
        let lz4 = Lz4Compressor::new(Compression::Lz4Fast);
        let mut scratch = Vec::new();
        assert_eq!(compress_if_smaller(&lz4, &[], &mut scratch), None);
    }

    #[test]
    fn scratch_only_grows() {
        let lz4 = Lz4Compressor::new(Compression::Lz4Fast);
        let mut scratch = Vec::new();
        compress_if_smaller(&lz4, &vec![1u8; 10_000], &mut scratch);
        let grown = scratch.len();
        compress_if_smaller(&lz4, &vec![1u8; 100], &mut scratch);
        assert_eq!(scratch.len(), grown);
    }

    #[test]
    fn corrupt_input_fails_instead_of_truncating() {
        let lz4 = Lz4Compressor::new(Compression::Lz4Fast);
        let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let mut scratch = Vec::new();
        let len = compress_if_smaller(&lz4, &payload, &mut scratch).unwrap();

        let mut out = Vec::new();
        let truncated = &scratch[..len / 2];
        assert!(decompress_exact(&lz4, truncated, payload.len(), &mut out).is_err());
    }

    #[test]
    fn short_output_is_a_size_mismatch() {
        let lz4 = Lz4Compressor::new(Compression::Lz4Fast);
        let payload = vec![3u8; 1000];
        let mut scratch = Vec::new();
        let len = compress_if_smaller(&lz4, &payload, &mut scratch).unwrap();

        let mut out = Vec::new();
        let err = decompress_exact(&lz4, &scratch[..len], 2000, &mut out).unwrap_err();
        assert!(matches!(err, CodecError::SizeMismatch { expected: 2000, actual: 1000 }));
    }
}
