//! The encode pipeline: read fixed-size chunks, compress them on worker
//! threads, emit blocks in input order.
//!
//! Every task has two phases. Compression and the optional block checksum
//! run as soon as a worker is free, in any order across tasks. Emission
//! waits on the predecessor task's completion signal, which serializes the
//! output without serializing the compression work. The stream checksum is
//! fed on the producer thread as chunks are read, before dispatch, so it
//! needs no locking at all.

use std::collections::VecDeque;
use std::hash::Hasher;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Mutex, PoisonError};
use std::thread;
use fehler::throws;
use twox_hash::XxHash32;

use crate::codec::BlockCodec;
use crate::context::{FrameContext, Mode, ResultCell};
use crate::header::{xxh32, StreamDescriptor, EOS, INCOMPRESSIBLE};
use crate::io::{write_bin, write_u32, FrameSink, FrameSource};
use crate::FrameError;

/// State every encode task shares for the duration of one stream.
struct EncodeShared<'a, W, C> {
    writer: &'a Mutex<&'a mut W>,
    result: &'a ResultCell,
    codec: &'a C,
    block_checksums: bool,
}

impl<C: BlockCodec> FrameContext<C> {
    /// Compress one stream from `reader` into `writer`, framed as `sd`
    /// describes. Returns the first meaningful failure, if any.
    #[throws(FrameError)]
    pub fn compress<R, W>(&self, mut reader: R, mut writer: W, sd: &StreamDescriptor)
    where
        R: FrameSource,
        W: FrameSink,
    {
        sd.validate()?;
        let block_max = sd.bd.block_maxsize()?;

        let result = ResultCell::new();
        if !write_bin(&mut writer, &result, &sd.to_bytes()) {
            result.set(Err(FrameError::CannotWriteHeader));
        }
        result.get()?;

        let mut stream_hasher = sd.flags.stream_checksum().then(|| XxHash32::with_seed(0));
        self.encode_blocks(&mut reader, &mut writer, sd, block_max, &mut stream_hasher, &result);

        if write_u32(&mut writer, &result, EOS) {
            if let Some(hasher) = stream_hasher {
                if !write_u32(&mut writer, &result, hasher.finish() as u32) {
                    result.set(Err(FrameError::CannotWriteStreamChecksum));
                }
            }
        } else {
            result.set(Err(FrameError::CannotWriteEos));
        }
        result.get()?
    }

    fn encode_blocks<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        sd: &StreamDescriptor,
        block_max: usize,
        stream_hasher: &mut Option<XxHash32>,
        result: &ResultCell,
    ) where
        R: FrameSource,
        W: FrameSink,
    {
        let single_thread = self.mode == Mode::Sequential;
        let writer = Mutex::new(writer);
        let shared = EncodeShared {
            writer: &writer,
            result,
            codec: &self.codec,
            block_checksums: sd.flags.block_checksums(),
        };

        thread::scope(|scope| {
            let mut handles: VecDeque<thread::ScopedJoinHandle<'_, ()>> = VecDeque::new();
            let mut prev_done: Option<Receiver<()>> = None;

            while !result.fault() && !reader.eof() {
                let mut chunk = vec![0u8; block_max];
                if !read_chunk(reader, &mut chunk, result) {
                    break;
                }
                if chunk.is_empty() {
                    continue;
                }
                if let Some(hasher) = stream_hasher.as_mut() {
                    hasher.write(&chunk);
                }

                let (done_tx, done_rx) = mpsc::channel();
                if single_thread {
                    encode_block(chunk, None, done_tx, &shared);
                } else {
                    let gate = prev_done.replace(done_rx);
                    if handles.len() >= self.workers {
                        if let Some(handle) = handles.pop_front() {
                            let _ = handle.join();
                        }
                    }
                    let sh = &shared;
                    handles.push_back(scope.spawn(move || encode_block(chunk, gate, done_tx, sh)));
                }
            }
            // remaining tasks are joined when the scope closes
        });
    }
}

/// Read up to one block of input. Returns `false` on a read error (which is
/// stored as the generic failure); a short or empty chunk is fine.
fn read_chunk<R: FrameSource + ?Sized>(reader: &mut R, chunk: &mut Vec<u8>, result: &ResultCell) -> bool {
    let mut off = 0;
    while off < chunk.len() {
        match reader.read(&mut chunk[off..]) {
            Ok(0) => break,
            Ok(n) => off += n,
            Err(_) => {
                result.set(Err(FrameError::Failed));
                return false;
            }
        }
    }
    chunk.truncate(off);
    true
}

/// One block, start to finish: compress off-order, then emit in order.
fn encode_block<W: FrameSink, C: BlockCodec>(
    chunk: Vec<u8>,
    gate: Option<Receiver<()>>,
    done: Sender<()>,
    sh: &EncodeShared<'_, W, C>,
) {
    // Dropping `done` without sending still opens the successor's gate.
    if sh.result.fault() {
        return;
    }

    let mut dst = vec![0u8; chunk.len()];
    let (payload, size_word) = match sh.codec.compress(&chunk, &mut dst) {
        Some(n) => (&dst[..n], n as u32),
        None => (&chunk[..], chunk.len() as u32 | INCOMPRESSIBLE),
    };
    let checksum = sh.block_checksums.then(|| xxh32(payload));

    if let Some(gate) = gate {
        let _ = gate.recv();
    }
    if sh.result.fault() {
        return;
    }

    let mut writer = sh.writer.lock().unwrap_or_else(PoisonError::into_inner);
    if write_u32(&mut **writer, sh.result, size_word) && write_bin(&mut **writer, sh.result, payload) {
        if let Some(checksum) = checksum {
            write_u32(&mut **writer, sh.result, checksum);
        }
    }
    drop(writer);

    let _ = done.send(());
}
