use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::audio::{self, AudioTrack};
use crate::encoding::decode_in_place;
use crate::error::{Result, VrawError};
use crate::file_header::FileHeader;
use crate::frame::{Frame, FrameDecoder, FrameHeader, FRAME_HEADER_SIZE};
use crate::index::FrameIndex;
use crate::recovery::{scanner, RecoveryReport};

pub struct VrawReader<R: Read + Seek> {
    reader:      R,
    header:      FileHeader,
    index:       FrameIndex,
    file_len:    u64,
    decoder:     FrameDecoder,
    recovery:    Option<RecoveryReport>,
    last_packed: bool,
    payload:     Vec<u8>,
}

impl VrawReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opening recording");
        Self::new(BufReader::new(file))
    }
}

#[cfg(unix)]
impl VrawReader<File> {
    /// Open from a descriptor the caller already owns (e.g. one handed over
    /// by a media picker).  The descriptor must be readable and seekable.
    pub fn from_fd(fd: std::os::fd::OwnedFd) -> Result<Self> {
        Self::new(File::from(fd))
    }
}

impl<R: Read + Seek> VrawReader<R> {
    /// Parse the header and load the frame index, rebuilding it by scanning
    /// when it is missing or points outside the file.
    ///
    /// A bad header is fatal.  A bad index is not: the open fails only when
    /// the scan finds no frames either.
    pub fn new(mut reader: R) -> Result<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let header = FileHeader::read(&mut reader)?;

        let loaded = match FrameIndex::load(&mut reader, &header, file_len)? {
            Some(index) => match index.validate(file_len) {
                Ok(()) => Some(index),
                Err(bad) => {
                    tracing::warn!(
                        entry = bad,
                        offset = ?index.get(bad),
                        file_len,
                        "frame index rejected, scanning for frames"
                    );
                    None
                }
            },
            None => {
                tracing::debug!("no frame index, scanning for frames");
                None
            }
        };

        let (index, recovery) = match loaded {
            Some(index) => (index, None),
            None => {
                let report = scanner::scan(&mut reader, &header, file_len)?;
                if report.index.is_empty() {
                    return Err(VrawError::NoFrames);
                }
                tracing::info!("{}", report.summary());
                (report.index.clone(), Some(report))
            }
        };

        tracing::debug!(
            width = header.width,
            height = header.height,
            encoding = header.encoding.name(),
            frames = index.len(),
            legacy = header.is_legacy(),
            "recording opened"
        );

        Ok(Self {
            decoder:     FrameDecoder::new(&header),
            reader,
            header,
            index,
            file_len,
            recovery,
            last_packed: false,
            payload:     Vec::new(),
        })
    }

    // ── Frames ───────────────────────────────────────────────────────────────

    /// Read only the 64-byte metadata of frame `index`.
    pub fn read_frame_header(&mut self, index: usize) -> Result<FrameHeader> {
        let offset = self.frame_offset(index)?;
        self.reader.seek(SeekFrom::Start(offset))?;
        match FrameHeader::read(&mut self.reader) {
            Ok(header) => Ok(header),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(VrawError::FrameTruncated { index }),
            Err(e) => Err(e.into()),
        }
    }

    /// Decode frame `index` to stored sample codes.  For LOG encodings these
    /// are curve codes; see [`read_frame_linear`](Self::read_frame_linear).
    pub fn read_frame(&mut self, index: usize) -> Result<Frame> {
        let header = self.read_frame_header(index)?;

        let size = header.payload_size() as u64;
        let start = self.frame_offset(index)? + FRAME_HEADER_SIZE as u64;
        if size == 0 || start + size > self.file_len {
            return Err(VrawError::FrameTruncated { index });
        }

        self.payload.clear();
        self.payload.resize(size as usize, 0);
        self.reader.read_exact(&mut self.payload)?;

        let (samples, packed) = self.decoder.decode(index, &header, &self.payload)?;
        self.last_packed = packed;
        Ok(Frame { header, samples, packed })
    }

    /// Like [`read_frame`](Self::read_frame), with the LOG curve inverted so
    /// samples are linear sensor values.  Identity for linear encodings.
    pub fn read_frame_linear(&mut self, index: usize) -> Result<Frame> {
        let mut frame = self.read_frame(index)?;
        if self.header.encoding.is_log() {
            if let Some(depth) = self.header.encoding.bit_depth() {
                decode_in_place(
                    depth,
                    &mut frame.samples,
                    self.header.average_black_level(),
                    self.header.white_level,
                );
            }
        }
        Ok(frame)
    }

    fn frame_offset(&self, index: usize) -> Result<u64> {
        self.index
            .get(index)
            .ok_or(VrawError::FrameOutOfRange { index, count: self.index.len() })
    }

    // ── Audio ────────────────────────────────────────────────────────────────

    pub fn read_audio(&mut self) -> Result<AudioTrack> {
        let offset = match self.header.audio {
            Some(a) if a.offset != 0 => a.offset,
            _ => return Err(VrawError::NoAudio),
        };
        audio::read_track(&mut self.reader, offset, self.file_len)
    }

    // ── Diagnostics ──────────────────────────────────────────────────────────

    /// Scan the file for frames regardless of its index.  Does not change
    /// which index this reader uses.
    pub fn scan(&mut self) -> Result<RecoveryReport> {
        Ok(scanner::scan(&mut self.reader, &self.header, self.file_len)?)
    }

    /// The scan report, if the index had to be rebuilt at open.
    pub fn recovery(&self) -> Option<&RecoveryReport> {
        self.recovery.as_ref()
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn file_header(&self) -> &FileHeader {
        &self.header
    }

    pub fn index(&self) -> &FrameIndex {
        &self.index
    }

    pub fn frame_count(&self) -> usize {
        self.index.len()
    }

    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn native_width(&self) -> u32 {
        self.header.native_width
    }

    pub fn native_height(&self) -> u32 {
        self.header.native_height
    }

    pub fn sensor_orientation(&self) -> i32 {
        self.header.sensor_orientation
    }

    pub fn has_audio(&self) -> bool {
        self.header.audio.is_some_and(|a| a.offset != 0)
    }

    /// Whether the most recently read frame was bit-packed.
    pub fn is_packed(&self) -> bool {
        self.last_packed
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Release the underlying store.
    pub fn close(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_header::{Compression, Encoding, FILE_HEADER_SIZE};
    use crate::frame::FrameMeta;
    use crate::io_stream::VrawWriter;
    use crate::options::WriterOptions;
    use std::io::Cursor;

    fn record(frames: u16, options: WriterOptions) -> Vec<u8> {
        let mut store = Cursor::new(Vec::new());
        let mut w = VrawWriter::new(&mut store, 8, 4, options).unwrap();
        w.start().unwrap();
        for i in 0..frames {
            let px: Vec<u16> = (0..32).map(|p| 200 + i * 10 + p).collect();
            w.submit_frame(&px, &FrameMeta::at(i as u64 * 41_666)).unwrap();
        }
        w.stop().unwrap();
        drop(w);
        store.into_inner()
    }

    #[test]
    fn opens_with_index() {
        let bytes = record(3, WriterOptions::default());
        let mut r = VrawReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(r.frame_count(), 3);
        assert!(r.recovery().is_none());
        let f = r.read_frame(2).unwrap();
        assert_eq!(f.header.frame_number, 2);
        assert_eq!(f.samples[0], 220);
        assert!(!r.is_packed());
    }

    #[test]
    fn out_of_range_frame() {
        let bytes = record(2, WriterOptions::default());
        let mut r = VrawReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(r.read_frame(2), Err(VrawError::FrameOutOfRange { index: 2, count: 2 })));
        assert!(matches!(r.read_frame_header(99), Err(VrawError::FrameOutOfRange { .. })));
    }

    #[test]
    fn random_access_in_any_order() {
        let bytes = record(5, WriterOptions { compression: Compression::None, ..WriterOptions::default() });
        let mut r = VrawReader::new(Cursor::new(bytes)).unwrap();
        for i in [4usize, 0, 3, 3, 1] {
            assert_eq!(r.read_frame(i).unwrap().header.frame_number, i as u32);
        }
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut bytes = record(1, WriterOptions::default());
        bytes[..4].copy_from_slice(b"XXXX");
        assert!(matches!(VrawReader::new(Cursor::new(bytes)), Err(VrawError::Header(_))));
    }

    #[test]
    fn undersized_file_is_fatal() {
        assert!(matches!(VrawReader::new(Cursor::new(vec![0u8; 100])), Err(VrawError::Header(_))));
    }

    #[test]
    fn empty_recording_has_no_frames() {
        let bytes = record(0, WriterOptions::default());
        assert!(matches!(VrawReader::new(Cursor::new(bytes)), Err(VrawError::NoFrames)));
    }

    #[test]
    fn invalid_index_entry_triggers_recovery() {
        let mut bytes = record(3, WriterOptions::default());
        let h = FileHeader::read(&bytes[..]).unwrap();
        let at = h.index_offset as usize + 8;
        bytes[at..at + 8].copy_from_slice(&7u64.to_le_bytes());

        let mut r = VrawReader::new(Cursor::new(bytes)).unwrap();
        let report = r.recovery().unwrap();
        assert_eq!(report.frames_recovered(), 3);
        assert_eq!(r.index().get(0), Some(FILE_HEADER_SIZE as u64));
        assert_eq!(r.read_frame(1).unwrap().header.frame_number, 1);
    }

    #[test]
    fn linear_read_inverts_log_curve() {
        let options = WriterOptions { encoding: Encoding::Log2_12, ..WriterOptions::default() };
        let bytes = record(1, options);
        let mut r = VrawReader::new(Cursor::new(bytes)).unwrap();
        let codes  = r.read_frame(0).unwrap().samples;
        let linear = r.read_frame_linear(0).unwrap().samples;
        assert_ne!(codes, linear);
        for (p, &v) in linear.iter().enumerate() {
            let original = 200 + p as i32;
            assert!((v as i32 - original).abs() <= 8, "pixel {p}: {v} vs {original}");
        }
    }

    #[test]
    fn no_audio() {
        let bytes = record(1, WriterOptions::default());
        let mut r = VrawReader::new(Cursor::new(bytes)).unwrap();
        assert!(!r.has_audio());
        assert!(matches!(r.read_audio(), Err(VrawError::NoAudio)));
    }

    #[test]
    fn close_returns_store() {
        let bytes = record(1, WriterOptions::default());
        let len = bytes.len();
        let r = VrawReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(r.close().into_inner().len(), len);
    }
}
