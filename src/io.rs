//! The byte-level I/O capability: traits the pipeline reads and writes
//! through, adapters for the standard [`Read`]/[`Write`]/[`Seek`] world,
//! and the checked wire helpers that feed failures into the sticky result.

use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use byteorder::{ByteOrder, LE};
use fehler::{throw, throws};

use crate::context::ResultCell;
use crate::FrameError;

/// Where the pipeline reads a stream from.
///
/// Short reads are permitted everywhere; a return of 0 means end of input.
pub trait FrameSource {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize>;

    /// The producer-loop termination predicate.
    fn eof(&mut self) -> bool;

    /// Un-read the last `n` bytes. Only ever called with 4, to put back a
    /// word that turned out not to be a frame magic.
    fn rewind(&mut self, n: u32) -> io::Result<()>;

    /// Consume the `size`-byte body of a skippable frame with the given
    /// magic. The default adapter discards it.
    fn skip(&mut self, magic: u32, size: u32) -> io::Result<()>;
}

/// Where the pipeline writes a stream to. Anything other than the full
/// length written is fatal to the stream.
pub trait FrameSink: Send {
    fn write(&mut self, src: &[u8]) -> io::Result<usize>;
}

impl<T: FrameSource + ?Sized> FrameSource for &mut T {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        (**self).read(dst)
    }
    fn eof(&mut self) -> bool {
        (**self).eof()
    }
    fn rewind(&mut self, n: u32) -> io::Result<()> {
        (**self).rewind(n)
    }
    fn skip(&mut self, magic: u32, size: u32) -> io::Result<()> {
        (**self).skip(magic, size)
    }
}

impl<T: FrameSink + ?Sized> FrameSink for &mut T {
    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        (**self).write(src)
    }
}

impl FrameSink for Vec<u8> {
    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(src);
        Ok(src.len())
    }
}

/// [`FrameSource`] over any seekable reader, e.g. a `File` or a `Cursor`.
///
/// Seekability is what makes `eof` and `rewind` cheap: end of input is
/// probed by reading one byte and stepping back.
pub struct ReaderSource<R> {
    inner: R,
}

impl<R> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        ReaderSource { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> FrameSource for ReaderSource<R> {
    #[throws(io::Error)]
    fn read(&mut self, dst: &mut [u8]) -> usize {
        loop {
            match self.inner.read(dst) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                r => break r?,
            }
        }
    }

    fn eof(&mut self) -> bool {
        let mut probe = [0u8; 1];
        match self.read(&mut probe) {
            Ok(0) | Err(_) => true,
            Ok(_) => self.inner.seek(SeekFrom::Current(-1)).is_err(),
        }
    }

    #[throws(io::Error)]
    fn rewind(&mut self, n: u32) {
        self.inner.seek(SeekFrom::Current(-(n as i64)))?;
    }

    #[throws(io::Error)]
    fn skip(&mut self, _magic: u32, size: u32) {
        let copied = io::copy(&mut self.inner.by_ref().take(size as u64), &mut io::sink())?;
        if copied != size as u64 {
            throw!(io::Error::from(ErrorKind::UnexpectedEof));
        }
    }
}

/// [`FrameSink`] over any writer.
pub struct WriterSink<W> {
    inner: W,
}

impl<W> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        WriterSink { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> FrameSink for WriterSink<W> {
    #[throws(io::Error)]
    fn write(&mut self, src: &[u8]) -> usize {
        self.inner.write_all(src)?;
        src.len()
    }
}

/// Fill `dst` completely or report failure. Used where the wire demands an
/// exact count; a short read here is a truncated stream.
fn fill<R: FrameSource + ?Sized>(reader: &mut R, dst: &mut [u8]) -> bool {
    let mut off = 0;
    while off < dst.len() {
        match reader.read(&mut dst[off..]) {
            Ok(0) | Err(_) => return false,
            Ok(n) => off += n,
        }
    }
    true
}

/// Checked wire reads and writes. Each consults the sticky result first (a
/// stream that already failed does no further I/O) and stores the generic
/// failure on a short count, leaving room for the caller to store something
/// more specific.
pub(crate) fn read_u32<R: FrameSource + ?Sized>(reader: &mut R, result: &ResultCell) -> Option<u32> {
    if result.fault() {
        return None;
    }
    let mut d = [0u8; 4];
    if !fill(reader, &mut d) {
        result.set(Err(FrameError::Failed));
        return None;
    }
    Some(LE::read_u32(&d))
}

pub(crate) fn read_bin<R: FrameSource + ?Sized>(
    reader: &mut R,
    dst: &mut [u8],
    result: &ResultCell,
) -> bool {
    if result.fault() {
        return false;
    }
    if !fill(reader, dst) {
        result.set(Err(FrameError::Failed));
        return false;
    }
    true
}

pub(crate) fn write_u32<W: FrameSink + ?Sized>(writer: &mut W, result: &ResultCell, v: u32) -> bool {
    let mut d = [0u8; 4];
    LE::write_u32(&mut d, v);
    write_bin(writer, result, &d)
}

pub(crate) fn write_bin<W: FrameSink + ?Sized>(writer: &mut W, result: &ResultCell, src: &[u8]) -> bool {
    if result.fault() {
        return false;
    }
    match writer.write(src) {
        Ok(n) if n == src.len() => true,
        _ => {
            result.set(Err(FrameError::Failed));
            false
        }
    }
}
