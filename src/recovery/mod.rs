//! Index-free frame recovery.
//!
//! When a file has no usable index (interrupted write, corrupt offset table)
//! the reader rebuilds one by walking frame headers from the end of the file
//! header.  See [`scanner::scan`].

pub mod scanner;

use serde::Serialize;

use crate::index::FrameIndex;

pub use scanner::scan;

/// Why the scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Found as many frames as the header declares.
    ReachedDeclaredCount,
    /// The last accepted frame ends exactly at the scan limit.
    EndOfData,
    /// Fewer than 64 bytes remain before the scan limit.
    TruncatedHeader,
    /// A frame header was read but its payload runs past the scan limit.
    TruncatedPayload,
    /// A frame header with an empty or oversized payload.
    Implausible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecoveryQuality {
    /// Every byte up to the limit belongs to an accepted frame and the
    /// declared frame count (if any) was met.
    Full,
    /// A prefix of the recording; the tail was truncated or damaged.
    Partial,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    /// Offsets of the accepted frames, in file order.
    pub index:          FrameIndex,
    /// Frame headers read, including a rejected final one.
    pub frames_scanned: usize,
    /// Bytes from the end of the file header to the end of the last
    /// accepted frame.
    pub bytes_covered:  u64,
    /// Offset the scan was not allowed to cross.
    pub scan_limit:     u64,
    pub stop:           StopReason,
    pub quality:        RecoveryQuality,
}

impl RecoveryReport {
    pub fn frames_recovered(&self) -> usize {
        self.index.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{:?} recovery: {} frame(s) from {} header(s), {:.2} MiB covered, stopped: {:?}",
            self.quality,
            self.frames_recovered(),
            self.frames_scanned,
            self.bytes_covered as f64 / 1024.0 / 1024.0,
            self.stop,
        )
    }
}
