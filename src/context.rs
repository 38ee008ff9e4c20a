//! The stream context: codec, scheduling mode, worker cap, and the sticky
//! result machinery shared by every thread of one stream.

use std::sync::{Mutex, PoisonError};
use std::thread;

use crate::codec::{BlockCodec, Lz4Codec};
use crate::FrameError;

/// How block work is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every block runs inline on the calling thread.
    Sequential,
    /// One task per block on a capped pool of worker threads; emission is
    /// serialized in block order, so the output matches sequential mode
    /// byte for byte.
    Parallel,
}

/// Entry point for compressing and decompressing LZ4 frame streams.
///
/// A context is configured once and may then be used for any number of
/// streams, one at a time:
///
/// ```
/// use lz4par::{FrameContext, Mode};
///
/// let mut ctx = FrameContext::new();
/// ctx.mode(Mode::Parallel).workers(4);
/// ```
pub struct FrameContext<C = Lz4Codec> {
    pub(crate) codec: C,
    pub(crate) mode: Mode,
    pub(crate) workers: usize,
}

impl FrameContext<Lz4Codec> {
    /// A context with the library-default LZ4 codec, parallel mode, and one
    /// worker per logical CPU.
    pub fn new() -> Self {
        FrameContext::with_codec(Lz4Codec)
    }
}

impl Default for FrameContext<Lz4Codec> {
    fn default() -> Self {
        FrameContext::new()
    }
}

impl<C: BlockCodec> FrameContext<C> {
    /// A context around a caller-supplied block codec.
    pub fn with_codec(codec: C) -> Self {
        FrameContext {
            codec,
            mode: Mode::Parallel,
            workers: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        }
    }

    pub fn mode(&mut self, mode: Mode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Cap on in-flight block tasks in parallel mode. Clamped to at least 1.
    pub fn workers(&mut self, n: usize) -> &mut Self {
        self.workers = n.max(1);
        self
    }
}

/// The sticky per-stream result.
///
/// `Ok` and the generic `Failed` are "not yet final": either may be
/// replaced by a later store. Any other error is final, so the first
/// specific failure observed on any thread is the one the entry point
/// reports. Storing `Ok` over `Failed` is the decoder's downgrade path for
/// a clean end of input in header position.
pub(crate) struct ResultCell(Mutex<Result<(), FrameError>>);

impl ResultCell {
    pub(crate) fn new() -> Self {
        ResultCell(Mutex::new(Ok(())))
    }

    pub(crate) fn set(&self, r: Result<(), FrameError>) {
        let mut cur = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*cur, Ok(()) | Err(FrameError::Failed)) {
            *cur = r;
        }
    }

    pub(crate) fn get(&self) -> Result<(), FrameError> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn fault(&self) -> bool {
        self.get().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_specific_error_wins() {
        let cell = ResultCell::new();
        cell.set(Err(FrameError::InvalidHeaderChecksum));
        cell.set(Err(FrameError::BlockChecksumMismatch));
        cell.set(Ok(()));
        assert_eq!(cell.get(), Err(FrameError::InvalidHeaderChecksum));
    }

    #[test]
    fn generic_failure_is_replaceable() {
        let cell = ResultCell::new();
        cell.set(Err(FrameError::Failed));
        cell.set(Err(FrameError::CannotReadBlockSize));
        assert_eq!(cell.get(), Err(FrameError::CannotReadBlockSize));
    }

    #[test]
    fn generic_failure_downgrades_to_ok() {
        let cell = ResultCell::new();
        cell.set(Err(FrameError::Failed));
        cell.set(Ok(()));
        assert_eq!(cell.get(), Ok(()));
    }

    #[test]
    fn default_context_is_parallel() {
        let ctx = FrameContext::new();
        assert_eq!(ctx.mode, Mode::Parallel);
        assert!(ctx.workers >= 1);
    }
}
