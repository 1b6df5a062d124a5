//! Optional PCM audio stream.
//!
//! A writer buffers interleaved 16-bit samples in memory for the whole
//! session and emits them as one block after the last frame:
//!
//! ```text
//! "MAUD" | version u32 | sample_rate u32 | channels u16 | bit_depth u16
//!        | sample_count u64 (per channel) | start_time_us u64 | 32 reserved
//! interleaved i16 LE samples ...
//! ```

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Result, UsageError, VrawError};

pub const AUDIO_MAGIC:       &[u8; 4] = b"MAUD";
pub const AUDIO_VERSION:     u32      = 1;
pub const AUDIO_HEADER_SIZE: usize    = 64;
pub const AUDIO_BIT_DEPTH:   u16      = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioHeader {
    pub sample_rate:   u32,
    pub channels:      u16,
    pub bit_depth:     u16,
    /// Samples per channel.
    pub sample_count:  u64,
    pub start_time_us: u64,
}

impl AudioHeader {
    /// Total interleaved samples, `None` on overflow.
    pub fn total_samples(&self) -> Option<u64> {
        self.sample_count.checked_mul(self.channels as u64)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count as f64 / self.sample_rate as f64
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut buf = Vec::with_capacity(AUDIO_HEADER_SIZE);
        buf.extend_from_slice(AUDIO_MAGIC);
        buf.write_u32::<LittleEndian>(AUDIO_VERSION)?;
        buf.write_u32::<LittleEndian>(self.sample_rate)?;
        buf.write_u16::<LittleEndian>(self.channels)?;
        buf.write_u16::<LittleEndian>(self.bit_depth)?;
        buf.write_u64::<LittleEndian>(self.sample_count)?;
        buf.write_u64::<LittleEndian>(self.start_time_us)?;
        buf.resize(AUDIO_HEADER_SIZE, 0);
        writer.write_all(&buf)
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut raw = [0u8; AUDIO_HEADER_SIZE];
        reader.read_exact(&mut raw)?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&raw[..4]);
        if &magic != AUDIO_MAGIC {
            return Err(VrawError::BadAudioTag(magic));
        }

        let mut r = &raw[4..];
        let _version      = r.read_u32::<LittleEndian>()?;
        let sample_rate   = r.read_u32::<LittleEndian>()?;
        let channels      = r.read_u16::<LittleEndian>()?;
        let bit_depth     = r.read_u16::<LittleEndian>()?;
        let sample_count  = r.read_u64::<LittleEndian>()?;
        let start_time_us = r.read_u64::<LittleEndian>()?;
        Ok(Self { sample_rate, channels, bit_depth, sample_count, start_time_us })
    }
}

/// A decoded audio stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub header:  AudioHeader,
    /// Interleaved samples, `header.sample_count * header.channels` long.
    pub samples: Vec<i16>,
}

/// Read the audio block at `offset`.  The block must lie entirely within
/// `file_len`.
pub fn read_track<R: Read + Seek>(reader: &mut R, offset: u64, file_len: u64) -> Result<AudioTrack> {
    if offset.saturating_add(AUDIO_HEADER_SIZE as u64) > file_len {
        return Err(VrawError::AudioTruncated);
    }
    reader.seek(SeekFrom::Start(offset))?;
    let header = AudioHeader::read(&mut *reader)?;

    let data_end = header
        .total_samples()
        .and_then(|n| n.checked_mul(2))
        .and_then(|n| n.checked_add(offset + AUDIO_HEADER_SIZE as u64));
    let total = match data_end {
        Some(end) if end <= file_len => (end - offset - AUDIO_HEADER_SIZE as u64) / 2,
        _ => return Err(VrawError::AudioTruncated),
    };

    let mut samples = vec![0i16; total as usize];
    reader.read_i16_into::<LittleEndian>(&mut samples)?;
    Ok(AudioTrack { header, samples })
}

// ── Writer-side accumulation ─────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct AudioBuffer {
    sample_rate:   u32,
    channels:      u16,
    samples:       Vec<i16>,
    start_time_us: Option<u64>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels, samples: Vec::new(), start_time_us: None }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Append interleaved samples.  The first accepted call fixes the
    /// stream's start timestamp.
    pub fn push(&mut self, samples: &[i16], timestamp_us: u64) -> std::result::Result<(), UsageError> {
        if samples.is_empty() {
            return Err(UsageError::EmptyAudio);
        }
        if samples.len() % self.channels as usize != 0 {
            return Err(UsageError::AudioMisaligned { len: samples.len(), channels: self.channels });
        }
        self.start_time_us.get_or_insert(timestamp_us);
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    /// Samples per channel buffered so far.
    pub fn sample_count(&self) -> u64 {
        (self.samples.len() / self.channels as usize) as u64
    }

    pub fn start_time_us(&self) -> u64 {
        self.start_time_us.unwrap_or(0)
    }

    pub fn header(&self) -> AudioHeader {
        AudioHeader {
            sample_rate:   self.sample_rate,
            channels:      self.channels,
            bit_depth:     AUDIO_BIT_DEPTH,
            sample_count:  self.sample_count(),
            start_time_us: self.start_time_us(),
        }
    }

    /// Emit sub-header and samples.  Returns bytes written.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<u64> {
        self.header().write(&mut writer)?;
        let mut bytes = vec![0u8; self.samples.len() * 2];
        LittleEndian::write_i16_into(&self.samples, &mut bytes);
        writer.write_all(&bytes)?;
        Ok((AUDIO_HEADER_SIZE + bytes.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stereo_ramp(frames: usize) -> Vec<i16> {
        (0..frames).flat_map(|i| [i as i16, -(i as i16)]).collect()
    }

    #[test]
    fn sub_header_layout() {
        let h = AudioHeader {
            sample_rate: 48_000, channels: 2, bit_depth: 16, sample_count: 960, start_time_us: 1234,
        };
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        assert_eq!(buf.len(), AUDIO_HEADER_SIZE);
        assert_eq!(&buf[..4], b"MAUD");
        assert_eq!(u32::from_le_bytes(buf[4..8].try_into().unwrap()), AUDIO_VERSION);
        assert_eq!(u16::from_le_bytes(buf[12..14].try_into().unwrap()), 2);
        assert_eq!(u64::from_le_bytes(buf[16..24].try_into().unwrap()), 960);
        assert_eq!(AudioHeader::read(&buf[..]).unwrap(), h);
    }

    #[test]
    fn buffer_roundtrip() {
        let mut audio = AudioBuffer::new(48_000, 2);
        audio.push(&stereo_ramp(100), 5_000).unwrap();
        audio.push(&stereo_ramp(50), 9_000).unwrap();
        assert_eq!(audio.sample_count(), 150);
        assert_eq!(audio.start_time_us(), 5_000);

        let mut file = vec![0u8; 32];
        let written = audio.write_to(&mut file).unwrap();
        assert_eq!(written, (AUDIO_HEADER_SIZE + 150 * 2 * 2) as u64);

        let len = file.len() as u64;
        let track = read_track(&mut Cursor::new(file), 32, len).unwrap();
        assert_eq!(track.header.sample_count, 150);
        assert_eq!(track.header.bit_depth, 16);
        assert_eq!(track.samples.len(), 300);
        assert_eq!(&track.samples[..200], &stereo_ramp(100)[..]);
    }

    #[test]
    fn push_validates_shape() {
        let mut audio = AudioBuffer::new(44_100, 2);
        assert_eq!(audio.push(&[], 0), Err(UsageError::EmptyAudio));
        assert_eq!(
            audio.push(&[1, 2, 3], 0),
            Err(UsageError::AudioMisaligned { len: 3, channels: 2 })
        );
        // Rejected calls do not fix the start time.
        audio.push(&[1, 2], 777).unwrap();
        assert_eq!(audio.start_time_us(), 777);
    }

    #[test]
    fn bad_tag_is_rejected() {
        let mut buf = vec![0u8; AUDIO_HEADER_SIZE];
        buf[..4].copy_from_slice(b"NOPE");
        let err = read_track(&mut Cursor::new(buf), 0, AUDIO_HEADER_SIZE as u64).unwrap_err();
        assert!(matches!(err, VrawError::BadAudioTag(t) if &t == b"NOPE"));
    }

    #[test]
    fn samples_past_eof_are_rejected() {
        let mut audio = AudioBuffer::new(48_000, 1);
        audio.push(&[7; 100], 0).unwrap();
        let mut file = Vec::new();
        audio.write_to(&mut file).unwrap();
        file.truncate(file.len() - 1);

        let len = file.len() as u64;
        assert!(matches!(read_track(&mut Cursor::new(file), 0, len), Err(VrawError::AudioTruncated)));
        assert!(matches!(read_track(&mut Cursor::new(Vec::new()), 0, 10), Err(VrawError::AudioTruncated)));
    }

    #[test]
    fn duration() {
        let h = AudioHeader { sample_rate: 48_000, channels: 2, bit_depth: 16, sample_count: 24_000, start_time_us: 0 };
        assert_eq!(h.duration_secs(), 0.5);
    }
}
