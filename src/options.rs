//! Recording configuration.
//!
//! Options are plain serde structs so presets can live in JSON files:
//!
//! ```json
//! { "encoding": "LOG2_12", "packing": true, "black_level": [256, 256, 256, 256] }
//! ```
//!
//! Missing keys take their [`Default`] values.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VrawError};
use crate::file_header::{BayerPattern, Compression, Encoding, FileHeader, Timecode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioOptions {
    pub sample_rate: u32,
    pub channels:    u16,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self { sample_rate: 48_000, channels: 2 }
    }
}

impl AudioOptions {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(VrawError::InvalidConfig(format!(
                "audio needs a nonzero sample rate and channel count (got {} Hz, {} ch)",
                self.sample_rate, self.channels
            )));
        }
        // The file header stores the channel count in one byte.
        if self.channels > u8::MAX as u16 {
            return Err(VrawError::InvalidConfig(format!("{} audio channels is too many", self.channels)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    pub encoding:           Encoding,
    /// Store samples bit-packed at the encoding's depth instead of as u16.
    pub packing:            bool,
    /// Any LZ4 variant enables compression; the file records `LZ4_FAST`.
    pub compression:        Compression,
    pub bayer_pattern:      BayerPattern,
    pub black_level:        [u16; 4],
    pub white_level:        u16,
    pub sensor_orientation: i32,
    /// Full sensor geometry; 0 means "same as the recorded frame".
    pub native_width:       u32,
    pub native_height:      u32,
    pub timecode:           Option<Timecode>,
    /// Enables audio at construction.  `VrawWriter::enable_audio` does the
    /// same before recording starts.
    pub audio:              Option<AudioOptions>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            encoding:           Encoding::Linear12,
            packing:            false,
            compression:        Compression::Lz4Fast,
            bayer_pattern:      BayerPattern::Rggb,
            black_level:        [64; 4],
            white_level:        4095,
            sensor_orientation: 0,
            native_width:       0,
            native_height:      0,
            timecode:           None,
            audio:              None,
        }
    }
}

impl WriterOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(VrawError::InvalidConfig(format!("frame size {width}x{height} is empty")));
        }
        if (width as u64 * height as u64) * 2 > u32::MAX as u64 {
            return Err(VrawError::InvalidConfig(format!(
                "frame size {width}x{height} does not fit the 32-bit payload size field"
            )));
        }
        if self.encoding.bit_depth().is_none() {
            return Err(VrawError::Unsupported(self.encoding));
        }
        let black = self.build_header(width, height).average_black_level();
        if self.encoding.is_log() && self.white_level <= black {
            return Err(VrawError::InvalidConfig(format!(
                "white level {} must be above black level {black}",
                self.white_level
            )));
        }
        if let Some(audio) = &self.audio {
            audio.validate()?;
        }
        Ok(())
    }

    /// The header written at session start: no frames, no index, no audio.
    pub(crate) fn build_header(&self, width: u32, height: u32) -> FileHeader {
        let compression = match self.compression {
            Compression::None => Compression::None,
            _ => Compression::Lz4Fast,
        };
        let mut header = FileHeader::new(width, height, self.encoding, compression);

        let native_width  = if self.native_width > 0 { self.native_width } else { width };
        let native_height = if self.native_height > 0 { self.native_height } else { height };
        header.native_width  = native_width;
        header.native_height = native_height;
        if native_width > width && native_height > height {
            header.binning_num = 1;
            header.binning_den = native_width / width;
        }

        header.bayer_pattern      = self.bayer_pattern;
        header.black_level        = self.black_level;
        header.white_level        = self.white_level;
        header.sensor_orientation = self.sensor_orientation;
        header.timecode           = self.timecode;
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = WriterOptions::default();
        assert_eq!(o.encoding, Encoding::Linear12);
        assert!(!o.packing);
        assert_eq!(o.compression, Compression::Lz4Fast);
        assert_eq!(o.black_level, [64; 4]);
        assert_eq!(o.white_level, 4095);
    }

    #[test]
    fn json_preset_fills_missing_keys() {
        let o = WriterOptions::from_json(
            r#"{ "encoding": "LOG2_10", "packing": true, "white_level": 1023,
                 "audio": { "channels": 1 } }"#,
        )
        .unwrap();
        assert_eq!(o.encoding, Encoding::Log2_10);
        assert!(o.packing);
        assert_eq!(o.white_level, 1023);
        assert_eq!(o.bayer_pattern, BayerPattern::Rggb);
        assert_eq!(o.audio, Some(AudioOptions { sample_rate: 48_000, channels: 1 }));

        let back = WriterOptions::from_json(&o.to_json().unwrap()).unwrap();
        assert_eq!(back, o);
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(matches!(WriterOptions::from_json("{ \"packing\": 3 }"), Err(VrawError::Json(_))));
    }

    #[test]
    fn validation() {
        let o = WriterOptions::default();
        assert!(o.validate(16, 16).is_ok());
        assert!(matches!(o.validate(0, 16), Err(VrawError::InvalidConfig(_))));

        let reserved = WriterOptions { encoding: Encoding::Log8, ..WriterOptions::default() };
        assert!(matches!(reserved.validate(16, 16), Err(VrawError::Unsupported(Encoding::Log8))));

        let inverted = WriterOptions {
            encoding: Encoding::Log2_12,
            black_level: [500; 4],
            white_level: 400,
            ..WriterOptions::default()
        };
        assert!(matches!(inverted.validate(16, 16), Err(VrawError::InvalidConfig(_))));

        // The LOG floor is the header's truncated channel average (64 here).
        let uneven = |white_level| WriterOptions {
            encoding: Encoding::Log2_10,
            black_level: [64, 64, 65, 66],
            white_level,
            ..WriterOptions::default()
        };
        assert!(matches!(uneven(64).validate(16, 16), Err(VrawError::InvalidConfig(_))));
        assert!(uneven(65).validate(16, 16).is_ok());

        let silent = WriterOptions {
            audio: Some(AudioOptions { sample_rate: 48_000, channels: 0 }),
            ..WriterOptions::default()
        };
        assert!(silent.validate(16, 16).is_err());
    }

    #[test]
    fn header_geometry_and_binning() {
        let o = WriterOptions { native_width: 3840, native_height: 2160, ..WriterOptions::default() };
        let h = o.build_header(1920, 1080);
        assert_eq!((h.native_width, h.native_height), (3840, 2160));
        assert_eq!((h.binning_num, h.binning_den), (1, 2));

        // Only one dimension larger: no binning.
        let o = WriterOptions { native_width: 3840, native_height: 1080, ..WriterOptions::default() };
        let h = o.build_header(1920, 1080);
        assert_eq!((h.binning_num, h.binning_den), (1, 1));

        let h = WriterOptions::default().build_header(640, 480);
        assert_eq!((h.native_width, h.native_height), (640, 480));
    }

    #[test]
    fn lz4_variants_record_fast() {
        let o = WriterOptions { compression: Compression::Lz4High, ..WriterOptions::default() };
        assert_eq!(o.build_header(8, 8).compression, Compression::Lz4Fast);
        let o = WriterOptions { compression: Compression::None, ..WriterOptions::default() };
        assert_eq!(o.build_header(8, 8).compression, Compression::None);
    }
}
