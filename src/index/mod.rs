//! Random-access frame index.
//!
//! On disk the index is `frame_count` little-endian u64 offsets (one per
//! frame header) followed by a 16-byte trailer:
//!
//! ```text
//! "MIDX" | frame_count: u32 | 8 zero bytes
//! ```
//!
//! The file header's `index_offset` points at the first offset.  Readers never
//! rely on the trailer; it exists for tools walking the file by hand.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::file_header::{FileHeader, FILE_HEADER_SIZE};

pub const INDEX_MAGIC:  &[u8; 4] = b"MIDX";
pub const TRAILER_SIZE: usize    = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameIndex {
    offsets: Vec<u64>,
}

impl FrameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_offsets(offsets: Vec<u64>) -> Self {
        Self { offsets }
    }

    pub fn push(&mut self, offset: u64) {
        self.offsets.push(offset);
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn get(&self, frame: usize) -> Option<u64> {
        self.offsets.get(frame).copied()
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Serialized size including the trailer.
    pub fn encoded_len(&self) -> u64 {
        (self.offsets.len() * 8 + TRAILER_SIZE) as u64
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        for &offset in &self.offsets {
            buf.write_u64::<LittleEndian>(offset)?;
        }
        buf.extend_from_slice(INDEX_MAGIC);
        buf.write_u32::<LittleEndian>(self.offsets.len() as u32)?;
        buf.extend_from_slice(&[0u8; 8]);
        writer.write_all(&buf)
    }

    /// Read the offset table the header points at.
    ///
    /// Returns `Ok(None)` when the header records no index (offset or count
    /// of zero) or when the table would run past `file_len`.  Only genuine
    /// I/O failures are errors.
    pub fn load<R: Read + Seek>(reader: &mut R, header: &FileHeader, file_len: u64) -> io::Result<Option<Self>> {
        if header.index_offset == 0 || header.frame_count == 0 {
            return Ok(None);
        }
        let count     = header.frame_count as u64;
        let table_end = count.checked_mul(8).and_then(|n| n.checked_add(header.index_offset));
        match table_end {
            Some(end) if end <= file_len => {}
            _ => return Ok(None),
        }

        reader.seek(SeekFrom::Start(header.index_offset))?;
        let mut offsets = vec![0u64; count as usize];
        reader.read_u64_into::<LittleEndian>(&mut offsets)?;
        Ok(Some(Self { offsets }))
    }

    /// Every offset must land after the file header and before end of file.
    /// Returns the position of the first offending entry.
    pub fn validate(&self, file_len: u64) -> Result<(), usize> {
        match self
            .offsets
            .iter()
            .position(|&o| o < FILE_HEADER_SIZE as u64 || o >= file_len)
        {
            Some(bad) => Err(bad),
            None => Ok(()),
        }
    }
}
