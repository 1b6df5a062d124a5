//! Crate-level error type.

use std::io;
use thiserror::Error;

use crate::codec::CodecError;
use crate::file_header::{Encoding, HeaderError};

/// Calls made in the wrong writer state or with the wrong shape of input.
/// A usage error never changes writer state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    #[error("writer is not recording")]
    NotRecording,
    #[error("recording has already started")]
    AlreadyStarted,
    #[error("recording has already been finalized")]
    AlreadyFinalized,
    #[error("audio is not enabled for this recording")]
    AudioDisabled,
    #[error("audio must be enabled before recording starts")]
    AudioAfterStart,
    #[error("audio buffer is empty")]
    EmptyAudio,
    #[error("audio buffer of {len} samples is not a multiple of {channels} channels")]
    AudioMisaligned { len: usize, channels: u16 },
    #[error("frame has {actual} samples, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum VrawError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Header error: {0}")]
    Header(#[from] HeaderError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding {} is reserved and cannot be read or written", .0.name())]
    Unsupported(Encoding),

    #[error("Frame {index} out of range (file has {count} frames)")]
    FrameOutOfRange { index: usize, count: usize },

    #[error("Frame {index} is truncated or declares impossible sizes")]
    FrameTruncated { index: usize },

    #[error("File has no audio stream")]
    NoAudio,

    #[error("Bad audio stream tag {0:?}")]
    BadAudioTag([u8; 4]),

    #[error("Audio stream extends past end of file")]
    AudioTruncated,

    #[error("No readable frames: index unusable and recovery found nothing")]
    NoFrames,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VrawError>;
