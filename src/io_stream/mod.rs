//! Recording sessions: writer and reader.
//!
//! # Writer
//! [`VrawWriter`] writes the file header at construction, then appends one
//! self-describing frame (64-byte header plus payload) per
//! [`submit_frame`](VrawWriter::submit_frame).  Audio is buffered in memory.
//! [`stop`](VrawWriter::stop) appends the audio block and the frame index and
//! rewrites the header at offset 0 with the final frame count and index
//! offset.  Until then the header says "no frames, no index", which is what
//! readers see after a crash.
//!
//! # Reader (normal path)
//! [`VrawReader`] parses the header, loads the index and serves frames and
//! audio by random access.
//!
//! # Reader (recovery path)
//! If the index is absent or any entry points outside the file, the reader
//! scans frame headers forward from offset 512 and uses the contiguous run
//! of complete frames it finds.  A file cut short mid-frame opens with the
//! frames before the cut.

mod reader;
mod writer;

pub use reader::VrawReader;
pub use writer::{VrawWriter, WriterState};
