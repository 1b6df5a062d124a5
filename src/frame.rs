//! Per-frame record: the 64-byte [`FrameHeader`] and the payload pipeline.
//!
//! Write path: `samples → [LOG2 curve] → pack | u16 LE → [LZ4 if smaller]`.
//! Read path undoes it in reverse.  There is no explicit "packed" flag on
//! disk: a payload is packed iff its stored uncompressed size is smaller than
//! `pixel_count * 2`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{self, Read, Write};

use crate::codec::{compress_if_smaller, compressor_for, decompress_exact, Compressor};
use crate::encoding::{encode_buffer, BitDepth};
use crate::error::{Result, VrawError};
use crate::file_header::{Encoding, FileHeader};
use crate::packing::{load_u16, pack, packed_len, store_u16, unpack};

pub const FRAME_HEADER_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameHeader {
    pub timestamp_us:        u64,
    pub frame_number:        u32,
    /// 0 means the payload is stored uncompressed.
    pub compressed_size:     u32,
    pub uncompressed_size:   u32,
    pub iso:                 f32,
    pub exposure_time_ms:    f32,
    pub white_balance:       [f32; 3],
    pub focal_length:        f32,
    pub aperture:            f32,
    pub focus_distance:      f32,
    pub dynamic_black_level: [u16; 4],
}

impl FrameHeader {
    /// Bytes of payload following the header on disk.
    pub fn payload_size(&self) -> u32 {
        if self.compressed_size > 0 { self.compressed_size } else { self.uncompressed_size }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        let mut w = &mut buf[..];
        w.write_u64::<LittleEndian>(self.timestamp_us)?;
        w.write_u32::<LittleEndian>(self.frame_number)?;
        w.write_u32::<LittleEndian>(self.compressed_size)?;
        w.write_u32::<LittleEndian>(self.uncompressed_size)?;
        w.write_f32::<LittleEndian>(self.iso)?;
        w.write_f32::<LittleEndian>(self.exposure_time_ms)?;
        for wb in self.white_balance {
            w.write_f32::<LittleEndian>(wb)?;
        }
        w.write_f32::<LittleEndian>(self.focal_length)?;
        w.write_f32::<LittleEndian>(self.aperture)?;
        w.write_f32::<LittleEndian>(self.focus_distance)?;
        for level in self.dynamic_black_level {
            w.write_u16::<LittleEndian>(level)?;
        }
        writer.write_all(&buf)
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        reader.read_exact(&mut buf)?;
        let mut r = &buf[..];

        let timestamp_us      = r.read_u64::<LittleEndian>()?;
        let frame_number      = r.read_u32::<LittleEndian>()?;
        let compressed_size   = r.read_u32::<LittleEndian>()?;
        let uncompressed_size = r.read_u32::<LittleEndian>()?;
        let iso               = r.read_f32::<LittleEndian>()?;
        let exposure_time_ms  = r.read_f32::<LittleEndian>()?;
        let mut white_balance = [0f32; 3];
        r.read_f32_into::<LittleEndian>(&mut white_balance)?;
        let focal_length      = r.read_f32::<LittleEndian>()?;
        let aperture          = r.read_f32::<LittleEndian>()?;
        let focus_distance    = r.read_f32::<LittleEndian>()?;
        let mut dynamic_black_level = [0u16; 4];
        r.read_u16_into::<LittleEndian>(&mut dynamic_black_level)?;

        Ok(Self {
            timestamp_us,
            frame_number,
            compressed_size,
            uncompressed_size,
            iso,
            exposure_time_ms,
            white_balance,
            focal_length,
            aperture,
            focus_distance,
            dynamic_black_level,
        })
    }
}

// ── Caller-facing frame types ────────────────────────────────────────────────

/// Capture metadata supplied with each submitted frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMeta {
    pub timestamp_us:        u64,
    pub iso:                 f32,
    pub exposure_time_ms:    f32,
    pub white_balance:       [f32; 3],
    pub focal_length:        f32,
    pub aperture:            f32,
    pub focus_distance:      f32,
    /// Falls back to the file header's black levels when `None`.
    pub dynamic_black_level: Option<[u16; 4]>,
}

impl FrameMeta {
    pub fn at(timestamp_us: u64) -> Self {
        Self { timestamp_us, ..Self::default() }
    }
}

impl Default for FrameMeta {
    fn default() -> Self {
        Self {
            timestamp_us:        0,
            iso:                 100.0,
            exposure_time_ms:    16.67,
            white_balance:       [1.0; 3],
            focal_length:        0.0,
            aperture:            0.0,
            focus_distance:      0.0,
            dynamic_black_level: None,
        }
    }
}

/// A decoded frame.  `samples` holds stored codes (LOG2 codes for LOG
/// encodings); it is shorter than the frame geometry only when the payload
/// itself was short.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header:  FrameHeader,
    pub samples: Vec<u16>,
    pub packed:  bool,
}

// ── Encode ───────────────────────────────────────────────────────────────────

fn grow<T: Clone + Default>(buf: &mut Vec<T>, len: usize) {
    if buf.len() < len {
        buf.resize(len, T::default());
    }
}

/// Payload ready to be written after its frame header.
pub(crate) struct EncodedPayload<'a> {
    pub bytes:             &'a [u8],
    pub uncompressed_size: u32,
    pub compressed_size:   u32,
}

/// Write-side pipeline.  Owns grow-only scratch buffers reused across frames;
/// nothing carries over from one `encode` to the next.
pub(crate) struct FrameEncoder {
    log_depth:   Option<BitDepth>,
    pack_depth:  Option<BitDepth>,
    black_level: u16,
    white_level: u16,
    compressor:  Option<Box<dyn Compressor>>,
    encoded:     Vec<u16>,
    bytes:       Vec<u8>,
    compressed:  Vec<u8>,
}

impl FrameEncoder {
    pub fn new(header: &FileHeader, packing: bool) -> Result<Self> {
        let depth = header.encoding.bit_depth().ok_or(VrawError::Unsupported(header.encoding))?;
        Ok(Self {
            log_depth:   header.encoding.is_log().then_some(depth),
            pack_depth:  packing.then_some(depth),
            black_level: header.average_black_level(),
            white_level: header.white_level,
            compressor:  compressor_for(header.compression),
            encoded:     Vec::new(),
            bytes:       Vec::new(),
            compressed:  Vec::new(),
        })
    }

    pub fn encode(&mut self, pixels: &[u16]) -> EncodedPayload<'_> {
        let n = pixels.len();

        let source: &[u16] = match self.log_depth {
            Some(depth) => {
                grow(&mut self.encoded, n);
                encode_buffer(depth, pixels, &mut self.encoded[..n], self.black_level, self.white_level);
                &self.encoded[..n]
            }
            None => pixels,
        };

        let len = match self.pack_depth {
            Some(depth) => {
                let need = packed_len(depth, n);
                grow(&mut self.bytes, need);
                pack(depth, source, &mut self.bytes[..need], n)
            }
            None => {
                grow(&mut self.bytes, n * 2);
                store_u16(source, &mut self.bytes[..n * 2])
            }
        };

        let payload = &self.bytes[..len];
        let compressed = self
            .compressor
            .as_deref()
            .and_then(|c| compress_if_smaller(c, payload, &mut self.compressed));

        match compressed {
            Some(c) => EncodedPayload {
                bytes:             &self.compressed[..c],
                uncompressed_size: len as u32,
                compressed_size:   c as u32,
            },
            None => EncodedPayload {
                bytes:             payload,
                uncompressed_size: len as u32,
                compressed_size:   0,
            },
        }
    }
}

// ── Decode ───────────────────────────────────────────────────────────────────

/// Read-side pipeline: decompress, then unpack or deserialize to samples.
pub(crate) struct FrameDecoder {
    encoding:    Encoding,
    pixel_count: usize,
    compressor:  Option<Box<dyn Compressor>>,
    scratch:     Vec<u8>,
}

impl FrameDecoder {
    pub fn new(header: &FileHeader) -> Self {
        Self {
            encoding:    header.encoding,
            pixel_count: header.pixel_count(),
            compressor:  compressor_for(header.compression),
            scratch:     Vec::new(),
        }
    }

    /// Returns the samples and whether the payload was packed.
    ///
    /// A nonzero `compressed_size` in an uncompressed file only sizes the
    /// payload; it never routes the bytes through the decompressor.
    ///
    /// `uncompressed_size` is never trusted beyond the full unpacked frame
    /// size, so a corrupt header cannot drive the scratch allocation.
    pub fn decode(&mut self, index: usize, frame: &FrameHeader, payload: &[u8]) -> Result<(Vec<u16>, bool)> {
        let full_size = self.pixel_count * 2;

        let data: &[u8] = match self.compressor.as_deref() {
            Some(c) if frame.compressed_size > 0 => {
                let expected = frame.uncompressed_size as usize;
                if expected == 0 || expected > full_size {
                    return Err(VrawError::FrameTruncated { index });
                }
                decompress_exact(c, payload, expected, &mut self.scratch)?;
                &self.scratch
            }
            _ => payload,
        };

        let packed    = frame.uncompressed_size > 0 && (frame.uncompressed_size as usize) < full_size;

        let mut samples = vec![0u16; self.pixel_count];
        let produced = if packed {
            let depth = self.encoding.bit_depth().ok_or(VrawError::Unsupported(self.encoding))?;
            unpack(depth, data, &mut samples, self.pixel_count)
        } else {
            load_u16(data, &mut samples)
        };
        samples.truncate(produced);
        Ok((samples, packed))
    }
}
