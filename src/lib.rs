pub mod file_header;
pub mod encoding;
pub mod packing;
pub mod codec;
pub mod frame;
pub mod index;
pub mod recovery;
pub mod audio;
pub mod options;
pub mod error;
pub mod io_stream;

pub use file_header::{BayerPattern, Compression, Encoding, FileHeader, Timecode};
pub use frame::{Frame, FrameHeader, FrameMeta};
pub use index::FrameIndex;
pub use recovery::{RecoveryQuality, RecoveryReport};
pub use audio::{AudioHeader, AudioTrack};
pub use options::{AudioOptions, WriterOptions};
pub use error::{Result, UsageError, VrawError};
pub use io_stream::{VrawReader, VrawWriter, WriterState};
