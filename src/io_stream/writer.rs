use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::audio::AudioBuffer;
use crate::error::{Result, UsageError, VrawError};
use crate::file_header::{FileHeader, HeaderAudio, FILE_HEADER_SIZE};
use crate::frame::{FrameEncoder, FrameHeader, FrameMeta, FRAME_HEADER_SIZE};
use crate::index::FrameIndex;
use crate::options::{AudioOptions, WriterOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Header written; audio may still be configured.
    Initialized,
    /// Accepting frames and audio.
    Recording,
    /// Index and header patched.  Terminal.
    Finalized,
}

pub struct VrawWriter<W: Write + Seek> {
    writer:        W,
    header:        FileHeader,
    encoder:       FrameEncoder,
    index:         FrameIndex,
    audio:         Option<AudioBuffer>,
    state:         WriterState,
    bytes_written: u64,
}

impl VrawWriter<BufWriter<File>> {
    /// Create (or truncate) `path` and write the initial header.
    pub fn create<P: AsRef<Path>>(path: P, width: u32, height: u32, options: WriterOptions) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "created recording file");
        Self::new(BufWriter::new(file), width, height, options)
    }
}

impl<W: Write + Seek> VrawWriter<W> {
    /// Validate `options`, then write the 512-byte header at offset 0.  The
    /// header carries no frame count or index until the session is stopped.
    pub fn new(mut writer: W, width: u32, height: u32, options: WriterOptions) -> Result<Self> {
        options.validate(width, height)?;
        let header  = options.build_header(width, height);
        let encoder = FrameEncoder::new(&header, options.packing)?;

        writer.seek(SeekFrom::Start(0))?;
        header.write(&mut writer)?;

        tracing::debug!(
            width,
            height,
            encoding = header.encoding.name(),
            compression = ?header.compression,
            packing = options.packing,
            "writer initialized"
        );

        Ok(Self {
            writer,
            header,
            encoder,
            index:         FrameIndex::new(),
            audio:         options.audio.map(|a| AudioBuffer::new(a.sample_rate, a.channels)),
            state:         WriterState::Initialized,
            bytes_written: FILE_HEADER_SIZE as u64,
        })
    }

    // ── Session control ──────────────────────────────────────────────────────

    /// Turn on audio capture.  Only valid before [`start`](Self::start);
    /// calling it again replaces the previous configuration.
    pub fn enable_audio(&mut self, sample_rate: u32, channels: u16) -> Result<()> {
        match self.state {
            WriterState::Initialized => {}
            WriterState::Recording   => return Err(UsageError::AudioAfterStart.into()),
            WriterState::Finalized   => return Err(UsageError::AlreadyFinalized.into()),
        }
        AudioOptions { sample_rate, channels }.validate()?;
        self.audio = Some(AudioBuffer::new(sample_rate, channels));
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            WriterState::Initialized => {
                self.state = WriterState::Recording;
                tracing::debug!("recording started");
                Ok(())
            }
            WriterState::Recording => Err(UsageError::AlreadyStarted.into()),
            WriterState::Finalized => Err(UsageError::AlreadyFinalized.into()),
        }
    }

    /// Finish the session: write the audio block, the index table and its
    /// trailer, then rewrite the header with the final frame count and
    /// index offset.  Not repeatable.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            WriterState::Recording   => self.finalize(),
            WriterState::Initialized => Err(UsageError::NotRecording.into()),
            WriterState::Finalized   => Err(UsageError::AlreadyFinalized.into()),
        }
    }

    fn require_recording(&self) -> Result<()> {
        match self.state {
            WriterState::Recording => Ok(()),
            WriterState::Finalized => Err(UsageError::AlreadyFinalized.into()),
            WriterState::Initialized => Err(UsageError::NotRecording.into()),
        }
    }

    // ── Data ─────────────────────────────────────────────────────────────────

    /// Encode and append one frame.  `pixels` must hold exactly
    /// `width * height` samples.
    pub fn submit_frame(&mut self, pixels: &[u16], meta: &FrameMeta) -> Result<()> {
        self.require_recording()?;
        let expected = self.header.pixel_count();
        if pixels.len() != expected {
            return Err(UsageError::FrameSize { expected, actual: pixels.len() }.into());
        }

        let offset  = self.writer.stream_position()?;
        let payload = self.encoder.encode(pixels);
        let frame = FrameHeader {
            timestamp_us:        meta.timestamp_us,
            frame_number:        self.index.len() as u32,
            compressed_size:     payload.compressed_size,
            uncompressed_size:   payload.uncompressed_size,
            iso:                 meta.iso,
            exposure_time_ms:    meta.exposure_time_ms,
            white_balance:       meta.white_balance,
            focal_length:        meta.focal_length,
            aperture:            meta.aperture,
            focus_distance:      meta.focus_distance,
            dynamic_black_level: meta.dynamic_black_level.unwrap_or(self.header.black_level),
        };

        frame.write(&mut self.writer)?;
        self.writer.write_all(payload.bytes)?;
        self.bytes_written += (FRAME_HEADER_SIZE + payload.bytes.len()) as u64;
        self.index.push(offset);
        Ok(())
    }

    /// Buffer interleaved PCM samples.  The first call fixes the audio start
    /// timestamp.
    pub fn submit_audio(&mut self, samples: &[i16], timestamp_us: u64) -> Result<()> {
        self.require_recording()?;
        let audio = self.audio.as_mut().ok_or(VrawError::Usage(UsageError::AudioDisabled))?;
        audio.push(samples, timestamp_us)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == WriterState::Recording
    }

    pub fn frame_count(&self) -> u32 {
        self.index.len() as u32
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Buffered samples per channel; 0 when audio is disabled.
    pub fn audio_sample_count(&self) -> u64 {
        self.audio.as_ref().map_or(0, AudioBuffer::sample_count)
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio.is_some()
    }

    /// The header as it will be (or was) patched at finalization.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    // ── Finalization ─────────────────────────────────────────────────────────

    fn finalize(&mut self) -> Result<()> {
        // A failure below leaves the file without an index; readers recover
        // it by scanning.  Either way the session is over.
        self.state = WriterState::Finalized;

        if let Some(audio) = self.audio.as_ref().filter(|a| a.sample_count() > 0) {
            let offset = self.writer.stream_position()?;
            self.bytes_written += audio.write_to(&mut self.writer)?;
            self.header.audio = Some(HeaderAudio {
                channels:      audio.channels() as u8,
                bit_depth:     crate::audio::AUDIO_BIT_DEPTH as u8,
                sample_rate:   audio.sample_rate(),
                offset,
                start_time_us: audio.start_time_us(),
            });
        }

        let index_offset = self.writer.stream_position()?;
        self.index.write_to(&mut self.writer)?;
        self.bytes_written += self.index.encoded_len();

        self.header.frame_count  = self.index.len() as u32;
        self.header.index_offset = index_offset;

        let end = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(0))?;
        self.header.write(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        tracing::info!(
            frames = self.header.frame_count,
            audio_samples = self.audio_sample_count(),
            bytes = self.bytes_written,
            "recording finalized"
        );
        Ok(())
    }
}

impl<W: Write + Seek> Drop for VrawWriter<W> {
    fn drop(&mut self) {
        if self.state == WriterState::Recording {
            tracing::warn!(frames = self.index.len(), "writer dropped while recording, finalizing");
            if let Err(e) = self.finalize() {
                tracing::error!("forced finalization failed: {e}");
            }
        }
    }
}
