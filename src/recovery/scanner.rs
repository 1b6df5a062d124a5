//! Sequential frame scanner.
//!
//! # How it works
//!
//! Starting at offset 512, read a 64-byte frame header, derive the payload
//! size (`compressed_size` if nonzero, else `uncompressed_size`) and accept
//! the frame only if header and payload both fit inside the file.  The
//! first frame that does not fit, or does not look like a frame, ends the
//! scan.  The result is always a contiguous prefix of the recording.
//!
//! ## Scan limit
//!
//! The limit is the file length.  The header's index and audio offsets are
//! not consulted: the scan runs because they cannot be trusted.
//!
//! ## Declared count
//!
//! A finalized header carries the frame count; the scan stops once it is
//! reached.  A count of zero (the header of an interrupted write was never
//! patched) leaves the scan unbounded.

use std::io::{self, Read, Seek, SeekFrom};

use super::{RecoveryQuality, RecoveryReport, StopReason};
use crate::file_header::{FileHeader, FILE_HEADER_SIZE};
use crate::frame::{FrameHeader, FRAME_HEADER_SIZE};
use crate::index::FrameIndex;

/// Rebuild the frame index of `reader` without trusting its index table.
///
/// Corrupt or truncated data never produces an error; it ends the scan and
/// is described by [`RecoveryReport::stop`].  Only I/O failures propagate.
pub fn scan<R: Read + Seek>(reader: &mut R, header: &FileHeader, file_len: u64) -> io::Result<RecoveryReport> {
    let start       = FILE_HEADER_SIZE as u64;
    let limit       = file_len;
    let declared    = header.frame_count as usize;
    let max_payload = header.full_frame_size() as u64;

    let mut index          = FrameIndex::new();
    let mut frames_scanned = 0usize;
    let mut pos            = start;

    let stop = loop {
        if declared > 0 && index.len() >= declared {
            break StopReason::ReachedDeclaredCount;
        }
        if pos >= limit {
            break StopReason::EndOfData;
        }
        if pos + FRAME_HEADER_SIZE as u64 > limit {
            break StopReason::TruncatedHeader;
        }

        reader.seek(SeekFrom::Start(pos))?;
        let frame = match FrameHeader::read(&mut *reader) {
            Ok(frame) => frame,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break StopReason::TruncatedHeader,
            Err(e) => return Err(e),
        };
        frames_scanned += 1;

        let payload = frame.payload_size() as u64;
        if payload == 0 || payload > max_payload || frame.uncompressed_size as u64 > max_payload {
            break StopReason::Implausible;
        }
        let end = pos + FRAME_HEADER_SIZE as u64 + payload;
        if end > limit {
            break StopReason::TruncatedPayload;
        }

        index.push(pos);
        pos = end;
    };

    let complete = match stop {
        StopReason::ReachedDeclaredCount => true,
        StopReason::EndOfData            => declared == 0 || index.len() == declared,
        _                                => false,
    };
    let quality = if complete { RecoveryQuality::Full } else { RecoveryQuality::Partial };

    tracing::debug!(
        frames = index.len(),
        frames_scanned,
        limit,
        ?stop,
        "recovery scan finished"
    );

    Ok(RecoveryReport {
        bytes_covered: pos - start,
        index,
        frames_scanned,
        scan_limit: limit,
        stop,
        quality,
    })
}
