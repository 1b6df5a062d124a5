//! The fixed 512-byte file header.
//!
//! Two magic tags are accepted: `VRAW` (current) and `MRAW` (legacy).  Both
//! share the V1 field layout; the V2 fields (native geometry, binning, audio,
//! timecode, orientation) are only honoured when `version >= 2`.  Parsing
//! resolves either flavour into one normalized [`FileHeader`], so nothing
//! downstream ever looks at the version again.
//!
//! # Endianness
//! Every multi-byte field is little-endian.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;

use crate::encoding::BitDepth;

pub const MAGIC:        &[u8; 4] = b"VRAW";
pub const LEGACY_MAGIC: &[u8; 4] = b"MRAW";
pub const VERSION:      u32      = 2;

/// Serialized size of every header version.
pub const FILE_HEADER_SIZE: usize = 512;

const V2_FIELDS_SIZE: usize = 104;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Invalid magic tag {0:?}")]
    InvalidMagic([u8; 4]),
    #[error("Unknown {field} value: {value}")]
    UnknownValue { field: &'static str, value: u8 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Enumerations ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BayerPattern {
    Rggb = 0,
    Grbg = 1,
    Gbrg = 2,
    Bggr = 3,
}

impl TryFrom<u8> for BayerPattern {
    type Error = HeaderError;
    fn try_from(v: u8) -> Result<Self, HeaderError> {
        Ok(match v {
            0 => BayerPattern::Rggb,
            1 => BayerPattern::Grbg,
            2 => BayerPattern::Gbrg,
            3 => BayerPattern::Bggr,
            _ => return Err(HeaderError::UnknownValue { field: "bayer pattern", value: v }),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Encoding {
    Linear10 = 0,
    Log2_10  = 1,
    /// Reserved.
    Log8     = 2,
    /// Reserved.
    Cineon10 = 3,
    Log2_12  = 4,
    Linear12 = 5,
}

impl Encoding {
    /// Sample depth of the encoding, `None` for the reserved values.
    pub fn bit_depth(self) -> Option<BitDepth> {
        match self {
            Encoding::Linear10 | Encoding::Log2_10 => Some(BitDepth::Ten),
            Encoding::Linear12 | Encoding::Log2_12 => Some(BitDepth::Twelve),
            Encoding::Log8 | Encoding::Cineon10    => None,
        }
    }

    pub fn is_log(self) -> bool {
        matches!(self, Encoding::Log2_10 | Encoding::Log2_12)
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Linear10 => "LINEAR_10BIT",
            Encoding::Log2_10  => "LOG2_10BIT",
            Encoding::Log8     => "LOG_8BIT",
            Encoding::Cineon10 => "CINEON_10BIT",
            Encoding::Log2_12  => "LOG2_12BIT",
            Encoding::Linear12 => "LINEAR_12BIT",
        }
    }
}

impl TryFrom<u8> for Encoding {
    type Error = HeaderError;
    fn try_from(v: u8) -> Result<Self, HeaderError> {
        Ok(match v {
            0 => Encoding::Linear10,
            1 => Encoding::Log2_10,
            2 => Encoding::Log8,
            3 => Encoding::Cineon10,
            4 => Encoding::Log2_12,
            5 => Encoding::Linear12,
            _ => return Err(HeaderError::UnknownValue { field: "encoding", value: v }),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Compression {
    None        = 0,
    Lz4Fast     = 1,
    Lz4Balanced = 2,
    Lz4High     = 3,
}

impl TryFrom<u8> for Compression {
    type Error = HeaderError;
    fn try_from(v: u8) -> Result<Self, HeaderError> {
        Ok(match v {
            0 => Compression::None,
            1 => Compression::Lz4Fast,
            2 => Compression::Lz4Balanced,
            3 => Compression::Lz4High,
            _ => return Err(HeaderError::UnknownValue { field: "compression", value: v }),
        })
    }
}

// ── Optional V2 blocks ───────────────────────────────────────────────────────

/// SMPTE-style start label of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timecode {
    pub hours:       u8,
    pub minutes:     u8,
    pub seconds:     u8,
    pub frames:      u8,
    pub fps:         u8,
    pub drop_frame:  bool,
    /// 0 = SMPTE, 1 = LTC, 2 = EBU.
    pub format:      u8,
    pub start_frame: u32,
}

impl Timecode {
    /// Stamp the local wall-clock time.
    pub fn now(fps: u8) -> Self {
        let now = chrono::Local::now();
        Self {
            hours:       now.hour() as u8,
            minutes:     now.minute() as u8,
            seconds:     now.second() as u8,
            frames:      0,
            fps,
            drop_frame:  false,
            format:      0,
            start_frame: 0,
        }
    }
}

/// Audio fields mirrored into the file header once the session closes.
/// The authoritative description lives in the audio sub-header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderAudio {
    pub channels:      u8,
    pub bit_depth:     u8,
    pub sample_rate:   u32,
    pub offset:        u64,
    pub start_time_us: u64,
}

// ── FileHeader ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileHeader {
    pub magic:              [u8; 4],
    pub version:            u32,
    pub width:              u32,
    pub height:             u32,
    pub native_width:       u32,
    pub native_height:      u32,
    pub binning_num:        u32,
    pub binning_den:        u32,
    pub bayer_pattern:      BayerPattern,
    pub encoding:           Encoding,
    pub compression:        Compression,
    pub black_level:        [u16; 4],
    pub white_level:        u16,
    pub frame_count:        u32,
    pub index_offset:       u64,
    pub audio:              Option<HeaderAudio>,
    pub timecode:           Option<Timecode>,
    pub sensor_orientation: i32,
}

impl FileHeader {
    /// A current-version header with no frames, no index and no audio.
    pub fn new(width: u32, height: u32, encoding: Encoding, compression: Compression) -> Self {
        Self {
            magic:              *MAGIC,
            version:            VERSION,
            width,
            height,
            native_width:       width,
            native_height:      height,
            binning_num:        1,
            binning_den:        1,
            bayer_pattern:      BayerPattern::Rggb,
            encoding,
            compression,
            black_level:        [64; 4],
            white_level:        4095,
            frame_count:        0,
            index_offset:       0,
            audio:              None,
            timecode:           None,
            sensor_orientation: 0,
        }
    }

    pub fn is_legacy(&self) -> bool {
        &self.magic == LEGACY_MAGIC
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Byte length of one frame stored as plain 16-bit samples.
    pub fn full_frame_size(&self) -> usize {
        self.pixel_count() * 2
    }

    /// Integer mean of the four channel black levels; the LOG curve's floor.
    pub fn average_black_level(&self) -> u16 {
        let sum: u32 = self.black_level.iter().map(|&b| b as u32).sum();
        (sum / 4) as u16
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut buf = Vec::with_capacity(FILE_HEADER_SIZE);
        buf.extend_from_slice(&self.magic);
        buf.write_u32::<LittleEndian>(self.version)?;
        buf.write_u32::<LittleEndian>(self.width)?;
        buf.write_u32::<LittleEndian>(self.height)?;
        buf.write_u8(self.bayer_pattern as u8)?;
        buf.write_u8(self.encoding as u8)?;
        buf.write_u8(self.compression as u8)?;
        buf.write_u8(0)?;
        for level in self.black_level {
            buf.write_u16::<LittleEndian>(level)?;
        }
        buf.write_u16::<LittleEndian>(self.white_level)?;
        buf.write_u16::<LittleEndian>(0)?;
        buf.write_u32::<LittleEndian>(self.frame_count)?;
        buf.write_u64::<LittleEndian>(self.index_offset)?;

        // V2
        buf.write_u32::<LittleEndian>(self.native_width)?;
        buf.write_u32::<LittleEndian>(self.native_height)?;
        buf.write_u32::<LittleEndian>(self.binning_num)?;
        buf.write_u32::<LittleEndian>(self.binning_den)?;

        let audio = self.audio.unwrap_or(HeaderAudio {
            channels: 0, bit_depth: 0, sample_rate: 0, offset: 0, start_time_us: 0,
        });
        buf.write_u8(self.audio.is_some() as u8)?;
        buf.write_u8(audio.channels)?;
        buf.write_u8(audio.bit_depth)?;
        buf.write_u8(0)?;
        buf.write_u32::<LittleEndian>(audio.sample_rate)?;
        buf.write_u64::<LittleEndian>(audio.offset)?;
        buf.write_u64::<LittleEndian>(audio.start_time_us)?;

        match self.timecode {
            Some(tc) => {
                buf.write_u8(1)?;
                buf.write_u8(tc.format)?;
                buf.write_u8(tc.fps)?;
                buf.write_u8(tc.drop_frame as u8)?;
                buf.write_u32::<LittleEndian>(tc.start_frame)?;
                buf.extend_from_slice(&[tc.hours, tc.minutes, tc.seconds, tc.frames]);
            }
            None => buf.extend_from_slice(&[0u8; 12]),
        }
        buf.extend_from_slice(&[0u8; 4]);
        buf.write_i32::<LittleEndian>(self.sensor_orientation)?;

        debug_assert_eq!(buf.len(), V2_FIELDS_SIZE);
        buf.resize(FILE_HEADER_SIZE, 0);
        writer.write_all(&buf)
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, HeaderError> {
        let mut raw = [0u8; FILE_HEADER_SIZE];
        reader.read_exact(&mut raw)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &[u8; FILE_HEADER_SIZE]) -> Result<Self, HeaderError> {
        let mut r = Cursor::new(&raw[..]);

        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC && &magic != LEGACY_MAGIC {
            return Err(HeaderError::InvalidMagic(magic));
        }
        let version       = r.read_u32::<LittleEndian>()?;
        let width         = r.read_u32::<LittleEndian>()?;
        let height        = r.read_u32::<LittleEndian>()?;
        let bayer_pattern = BayerPattern::try_from(r.read_u8()?)?;
        let encoding      = Encoding::try_from(r.read_u8()?)?;
        let compression   = Compression::try_from(r.read_u8()?)?;
        r.read_u8()?;
        let mut black_level = [0u16; 4];
        r.read_u16_into::<LittleEndian>(&mut black_level)?;
        let white_level  = r.read_u16::<LittleEndian>()?;
        r.read_u16::<LittleEndian>()?;
        let frame_count  = r.read_u32::<LittleEndian>()?;
        let index_offset = r.read_u64::<LittleEndian>()?;

        let mut header = FileHeader {
            magic,
            version,
            width,
            height,
            native_width:       width,
            native_height:      height,
            binning_num:        1,
            binning_den:        1,
            bayer_pattern,
            encoding,
            compression,
            black_level,
            white_level,
            frame_count,
            index_offset,
            audio:              None,
            timecode:           None,
            sensor_orientation: 0,
        };
        if version >= 2 {
            header.read_v2_fields(&mut r)?;
        }
        Ok(header)
    }

    fn read_v2_fields(&mut self, r: &mut Cursor<&[u8]>) -> Result<(), HeaderError> {
        let native_width  = r.read_u32::<LittleEndian>()?;
        let native_height = r.read_u32::<LittleEndian>()?;
        let binning_num   = r.read_u32::<LittleEndian>()?;
        let binning_den   = r.read_u32::<LittleEndian>()?;
        if native_width > 0 && native_height > 0 {
            self.native_width  = native_width;
            self.native_height = native_height;
        }
        self.binning_num = binning_num.max(1);
        self.binning_den = binning_den.max(1);

        let has_audio      = r.read_u8()? != 0;
        let channels       = r.read_u8()?;
        let bit_depth      = r.read_u8()?;
        r.read_u8()?;
        let sample_rate    = r.read_u32::<LittleEndian>()?;
        let offset         = r.read_u64::<LittleEndian>()?;
        let start_time_us  = r.read_u64::<LittleEndian>()?;
        if has_audio {
            self.audio = Some(HeaderAudio { channels, bit_depth, sample_rate, offset, start_time_us });
        }

        let has_timecode = r.read_u8()? != 0;
        let format       = r.read_u8()?;
        let fps          = r.read_u8()?;
        let drop_frame   = r.read_u8()? != 0;
        let start_frame  = r.read_u32::<LittleEndian>()?;
        let mut hmsf = [0u8; 4];
        r.read_exact(&mut hmsf)?;
        r.read_u32::<LittleEndian>()?;
        if has_timecode {
            self.timecode = Some(Timecode {
                hours:   hmsf[0],
                minutes: hmsf[1],
                seconds: hmsf[2],
                frames:  hmsf[3],
                fps,
                drop_frame,
                format,
                start_frame,
            });
        }

        self.sensor_orientation = r.read_i32::<LittleEndian>()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> FileHeader {
        let mut h = FileHeader::new(1920, 1080, Encoding::Log2_12, Compression::Lz4Fast);
        h.native_width       = 3840;
        h.native_height      = 2160;
        h.binning_den        = 2;
        h.bayer_pattern      = BayerPattern::Bggr;
        h.black_level        = [60, 61, 62, 63];
        h.white_level        = 4000;
        h.frame_count        = 17;
        h.index_offset       = 0x1_0000_0000;
        h.sensor_orientation = 270;
        h.audio = Some(HeaderAudio {
            channels: 2, bit_depth: 16, sample_rate: 48_000, offset: 1234, start_time_us: 99,
        });
        h.timecode = Some(Timecode {
            hours: 13, minutes: 7, seconds: 59, frames: 3, fps: 24,
            drop_frame: true, format: 1, start_frame: 42,
        });
        h
    }

    #[test]
    fn serialized_size_is_fixed() {
        let mut buf = Vec::new();
        FileHeader::new(4, 4, Encoding::Linear10, Compression::None).write(&mut buf).unwrap();
        assert_eq!(buf.len(), FILE_HEADER_SIZE);

        buf.clear();
        sample_header().write(&mut buf).unwrap();
        assert_eq!(buf.len(), FILE_HEADER_SIZE);
    }

    #[test]
    fn v2_header_roundtrip() {
        let h = sample_header();
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        assert_eq!(FileHeader::read(&buf[..]).unwrap(), h);
    }

    #[test]
    fn field_offsets_match_layout() {
        let mut buf = Vec::new();
        sample_header().write(&mut buf).unwrap();
        assert_eq!(&buf[0..4], b"VRAW");
        assert_eq!(u32::from_le_bytes(buf[32..36].try_into().unwrap()), 17);
        assert_eq!(u64::from_le_bytes(buf[36..44].try_into().unwrap()), 0x1_0000_0000);
        assert_eq!(buf[60], 1);
        assert_eq!(u64::from_le_bytes(buf[68..76].try_into().unwrap()), 1234);
        assert_eq!(buf[84], 1);
        assert_eq!(i32::from_le_bytes(buf[100..104].try_into().unwrap()), 270);
        assert!(buf[104..].iter().all(|&b| b == 0));
    }

    #[test]
    fn legacy_v1_header_defaults_v2_fields() {
        let mut buf = Vec::new();
        sample_header().write(&mut buf).unwrap();
        buf[0..4].copy_from_slice(LEGACY_MAGIC);
        buf[4..8].copy_from_slice(&1u32.to_le_bytes());

        let h = FileHeader::read(&buf[..]).unwrap();
        assert!(h.is_legacy());
        assert_eq!(h.version, 1);
        assert_eq!((h.native_width, h.native_height), (1920, 1080));
        assert_eq!((h.binning_num, h.binning_den), (1, 1));
        assert_eq!(h.audio, None);
        assert_eq!(h.timecode, None);
        assert_eq!(h.sensor_orientation, 0);
        assert_eq!(h.frame_count, 17);
        assert_eq!(h.black_level, [60, 61, 62, 63]);
    }

    #[test]
    fn zero_binning_normalizes_to_one() {
        let mut buf = Vec::new();
        FileHeader::new(8, 8, Encoding::Linear12, Compression::None).write(&mut buf).unwrap();
        buf[52..60].fill(0);
        let h = FileHeader::read(&buf[..]).unwrap();
        assert_eq!((h.binning_num, h.binning_den), (1, 1));
    }

    #[test]
    fn rejects_unknown_magic() {
        let mut buf = Vec::new();
        FileHeader::new(8, 8, Encoding::Linear12, Compression::None).write(&mut buf).unwrap();
        buf[0..4].copy_from_slice(b"RIFF");
        assert!(matches!(FileHeader::read(&buf[..]), Err(HeaderError::InvalidMagic(m)) if &m == b"RIFF"));
    }

    #[test]
    fn rejects_unknown_enum_value() {
        let mut buf = Vec::new();
        FileHeader::new(8, 8, Encoding::Linear12, Compression::None).write(&mut buf).unwrap();
        buf[17] = 9;
        assert!(matches!(
            FileHeader::read(&buf[..]),
            Err(HeaderError::UnknownValue { field: "encoding", value: 9 })
        ));
    }

    #[test]
    fn short_input_is_an_io_error() {
        assert!(matches!(FileHeader::read(&[0u8; 100][..]), Err(HeaderError::Io(_))));
    }

    #[test]
    fn average_black_level_truncates() {
        let mut h = FileHeader::new(2, 2, Encoding::Log2_10, Compression::None);
        h.black_level = [64, 64, 65, 66];
        assert_eq!(h.average_black_level(), 64);
    }

    #[test]
    fn timecode_now_stamps_wall_clock() {
        let tc = Timecode::now(25);
        assert!(tc.hours < 24);
        assert!(tc.minutes < 60);
        assert!(tc.seconds < 61);
        assert_eq!((tc.frames, tc.fps, tc.drop_frame, tc.format, tc.start_frame), (0, 25, false, 0, 0));

        let mut h = FileHeader::new(4, 4, Encoding::Linear12, Compression::None);
        h.timecode = Some(tc);
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        assert_eq!(FileHeader::read(&buf[..]).unwrap().timecode, Some(tc));
    }
}
