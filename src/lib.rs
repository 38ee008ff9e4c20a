//! The LZ4 frame format, encoded and decoded by a pool of worker threads.
//!
//! A frame is self-terminating: header, compressed blocks, an end-of-stream
//! marker and an optional checksum over the whole decompressed payload.
//! Frames can therefore be concatenated back to back, and skippable frames
//! (user-defined opaque sections) may appear wherever a frame may start.
//!
//! Blocks within a frame are independent, which is what makes the pipeline
//! parallel: every block is compressed (or decompressed) on whichever worker
//! picks it up, while emission to the output stream is serialized in block
//! order. The output of a parallel run is byte-identical to a sequential one.
//!
//! ```
//! use std::io::Cursor;
//! use lz4par::{FrameContext, ReaderSource, StreamDescriptor};
//!
//! let data = b"an example payload, compressed and restored";
//!
//! let mut frame = Vec::new();
//! FrameContext::new().compress(
//!     ReaderSource::new(Cursor::new(&data[..])),
//!     &mut frame,
//!     &StreamDescriptor::default(),
//! )?;
//!
//! let mut restored = Vec::new();
//! FrameContext::new().decompress(ReaderSource::new(Cursor::new(&frame[..])), &mut restored)?;
//! assert_eq!(restored, &data[..]);
//! # Ok::<(), lz4par::FrameError>(())
//! ```

#![forbid(unsafe_code)]
#![allow(non_upper_case_globals)]

pub mod codec;
mod compress;
mod context;
mod decompress;
pub mod header;
pub mod io;

use std::io::{Error as IoError, ErrorKind};
use thiserror::Error;

pub use codec::{BlockCodec, Lz4Codec};
pub use context::{FrameContext, Mode};
pub use header::{BlockDescriptor, Flags, StreamDescriptor, MAGIC};
pub use io::{FrameSink, FrameSource, ReaderSource, WriterSink};

/// Everything that can go wrong while encoding or decoding a stream.
///
/// The first specific error observed on any thread wins; later failures do
/// not overwrite it (see [`FrameContext`]).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// A read or write callback came up short, or the block codec refused
    /// input it should have handled. Anything more specific overrides this.
    #[error("unspecified failure")]
    Failed,
    #[error("wrong magic number where a frame header was expected")]
    InvalidMagicNumber,
    #[error("malformed frame header")]
    InvalidHeader,
    #[error("frame version not supported")]
    InvalidVersion,
    #[error("frame header checksum mismatch")]
    InvalidHeaderChecksum,
    #[error("block maximum size id out of range")]
    InvalidBlockMaximumSize,
    #[error("preset dictionaries are not supported yet")]
    PresetDictionaryNotSupported,
    #[error("block-dependent frames are not supported yet")]
    BlockDependenceNotSupported,
    #[error("could not write the frame header")]
    CannotWriteHeader,
    #[error("could not write the end-of-stream marker")]
    CannotWriteEos,
    #[error("could not write the stream checksum")]
    CannotWriteStreamChecksum,
    #[error("could not read a block size")]
    CannotReadBlockSize,
    #[error("could not read block data")]
    CannotReadBlockData,
    #[error("could not read a block checksum")]
    CannotReadBlockChecksum,
    #[error("could not read the stream checksum")]
    CannotReadStreamChecksum,
    #[error("stream checksum mismatch")]
    StreamChecksumMismatch,
    #[error("block checksum mismatch")]
    BlockChecksumMismatch,
}

impl From<FrameError> for IoError {
    fn from(e: FrameError) -> IoError {
        IoError::new(ErrorKind::Other, e)
    }
}
