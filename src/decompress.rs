//! The decode pipeline: parse frame headers, fan blocks out to workers,
//! emit decompressed payloads in block order.
//!
//! Decoding is the mirror image of encoding with one asymmetry: the bytes
//! feeding the stream checksum only exist after a worker has decompressed
//! its block, so the running hash advances in emission order under a mutex
//! instead of on the producer thread.

use std::collections::VecDeque;
use std::hash::Hasher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Mutex, PoisonError};
use std::thread;
use byteorder::{ByteOrder, LE};
use fehler::throws;
use twox_hash::XxHash32;

use crate::codec::BlockCodec;
use crate::context::{FrameContext, Mode, ResultCell};
use crate::header::{check_bits, is_skippable, xxh32, StreamDescriptor, EOS, INCOMPRESSIBLE, MAGIC};
use crate::io::{read_bin, read_u32, write_bin, FrameSink, FrameSource};
use crate::FrameError;

/// One block as read off the wire, owned until its task emits it.
struct BlockJob {
    payload: Vec<u8>,
    incompressible: bool,
    checksum: Option<u32>,
}

/// State every decode task shares for the duration of one frame.
struct DecodeShared<'a, W, C> {
    writer: &'a Mutex<&'a mut W>,
    result: &'a ResultCell,
    quit: &'a AtomicBool,
    codec: &'a C,
    stream_hasher: Option<&'a Mutex<XxHash32>>,
    block_max: usize,
}

impl<C: BlockCodec> FrameContext<C> {
    /// Decompress every frame in `reader` into `writer`, skipping skippable
    /// frames, until end of input. Returns the first meaningful failure.
    #[throws(FrameError)]
    pub fn decompress<R, W>(&self, mut reader: R, mut writer: W)
    where
        R: FrameSource,
        W: FrameSink,
    {
        let result = ResultCell::new();
        let quit = AtomicBool::new(false);

        while !quit.load(Ordering::Acquire) && !result.fault() && !reader.eof() {
            let magic = match read_u32(&mut reader, &result) {
                Some(magic) => magic,
                None => {
                    // A clean end of input where a header would start is
                    // not an error; a ragged one is.
                    if reader.eof() {
                        result.set(Ok(()));
                    } else {
                        result.set(Err(FrameError::InvalidHeader));
                    }
                    break;
                }
            };

            if is_skippable(magic) {
                let size = match read_u32(&mut reader, &result) {
                    Some(size) => size,
                    None => {
                        result.set(Err(FrameError::InvalidHeader));
                        break;
                    }
                };
                if reader.skip(magic, size).is_err() {
                    result.set(Err(FrameError::InvalidHeader));
                    break;
                }
                continue;
            }

            if magic != MAGIC {
                let _ = reader.rewind(4);
                result.set(Err(FrameError::InvalidMagicNumber));
                break;
            }

            let sd = match read_descriptor(&mut reader, &result) {
                Some(sd) => sd,
                None => break,
            };
            let block_max = match sd.bd.block_maxsize() {
                Ok(n) => n,
                Err(e) => {
                    result.set(Err(e));
                    break;
                }
            };

            self.decode_frame(&mut reader, &mut writer, &sd, block_max, &result, &quit);
        }

        result.get()?
    }

    /// The body of one frame: the block loop, then the stream checksum.
    fn decode_frame<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        sd: &StreamDescriptor,
        block_max: usize,
        result: &ResultCell,
        quit: &AtomicBool,
    ) where
        R: FrameSource,
        W: FrameSink,
    {
        let single_thread = self.mode == Mode::Sequential;
        let stream_hasher = sd.flags.stream_checksum().then(|| Mutex::new(XxHash32::with_seed(0)));

        {
            let writer = Mutex::new(&mut *writer);
            let shared = DecodeShared {
                writer: &writer,
                result,
                quit,
                codec: &self.codec,
                stream_hasher: stream_hasher.as_ref(),
                block_max,
            };

            thread::scope(|scope| {
                let mut handles: VecDeque<thread::ScopedJoinHandle<'_, ()>> = VecDeque::new();
                let mut prev_done: Option<Receiver<()>> = None;

                while !quit.load(Ordering::Acquire) && !result.fault() && !reader.eof() {
                    let size_word = match read_u32(reader, result) {
                        Some(word) => word,
                        None => {
                            quit.store(true, Ordering::Release);
                            result.set(Err(FrameError::CannotReadBlockSize));
                            break;
                        }
                    };
                    if size_word == EOS {
                        break;
                    }

                    let incompressible = size_word & INCOMPRESSIBLE != 0;
                    let src_size = (size_word & !INCOMPRESSIBLE) as usize;
                    let mut payload = vec![0u8; src_size];
                    if !read_bin(reader, &mut payload, result) {
                        quit.store(true, Ordering::Release);
                        result.set(Err(FrameError::CannotReadBlockData));
                        break;
                    }

                    let checksum = if sd.flags.block_checksums() {
                        match read_u32(reader, result) {
                            Some(checksum) => Some(checksum),
                            None => {
                                quit.store(true, Ordering::Release);
                                result.set(Err(FrameError::CannotReadBlockChecksum));
                                break;
                            }
                        }
                    } else {
                        None
                    };

                    let job = BlockJob { payload, incompressible, checksum };
                    let (done_tx, done_rx) = mpsc::channel();
                    if single_thread {
                        decode_block(job, None, done_tx, &shared);
                    } else {
                        let gate = prev_done.replace(done_rx);
                        if handles.len() >= self.workers {
                            if let Some(handle) = handles.pop_front() {
                                let _ = handle.join();
                            }
                        }
                        let sh = &shared;
                        handles.push_back(scope.spawn(move || decode_block(job, gate, done_tx, sh)));
                    }
                }
                // remaining tasks are joined when the scope closes
            });
        }

        if result.fault() {
            return;
        }
        if let Some(hasher) = stream_hasher {
            let declared = match read_u32(reader, result) {
                Some(declared) => declared,
                None => {
                    result.set(Err(FrameError::CannotReadStreamChecksum));
                    return;
                }
            };
            let digest = hasher.into_inner().unwrap_or_else(PoisonError::into_inner).finish() as u32;
            if digest != declared {
                result.set(Err(FrameError::StreamChecksumMismatch));
            }
        }
    }
}

/// Read the descriptor bytes, optional fields and header checksum that
/// follow a frame magic. Failures land in the result cell.
fn read_descriptor<R: FrameSource + ?Sized>(
    reader: &mut R,
    result: &ResultCell,
) -> Option<StreamDescriptor> {
    let mut fb = [0u8; 2];
    if !read_bin(reader, &mut fb, result) {
        result.set(Err(FrameError::InvalidHeader));
        return None;
    }
    let mut sd = StreamDescriptor::from_flg_bd(fb[0], fb[1]);
    if let Err(e) = sd.validate() {
        result.set(Err(e));
        return None;
    }

    let ex_len = if sd.flags.stream_size() { 8 } else { 0 } + 1;
    let mut ex = vec![0u8; ex_len];
    if !read_bin(reader, &mut ex, result) {
        result.set(Err(FrameError::InvalidHeader));
        return None;
    }
    let mut p = 0;
    if sd.flags.stream_size() {
        sd.stream_size = Some(LE::read_u64(&ex[p..p + 8]));
        p += 8;
    }
    let declared = ex[p];

    let mut summed = Vec::with_capacity(2 + p);
    summed.extend_from_slice(&fb);
    summed.extend_from_slice(&ex[..p]);
    if check_bits(xxh32(&summed)) != declared {
        result.set(Err(FrameError::InvalidHeaderChecksum));
        return None;
    }
    Some(sd)
}

/// One block, start to finish: verify and decompress off-order, then emit
/// in order and advance the stream hash with exactly the emitted bytes.
fn decode_block<W: FrameSink, C: BlockCodec>(
    job: BlockJob,
    gate: Option<Receiver<()>>,
    done: Sender<()>,
    sh: &DecodeShared<'_, W, C>,
) {
    // Dropping `done` without sending still opens the successor's gate.
    if sh.result.fault() || sh.quit.load(Ordering::Acquire) {
        return;
    }

    if let Some(expected) = job.checksum {
        if xxh32(&job.payload) != expected {
            sh.quit.store(true, Ordering::Release);
            sh.result.set(Err(FrameError::BlockChecksumMismatch));
            return;
        }
    }

    let data = if job.incompressible {
        job.payload
    } else {
        let mut dst = vec![0u8; sh.block_max];
        match sh.codec.decompress(&job.payload, &mut dst) {
            Some(n) => {
                dst.truncate(n);
                dst
            }
            None => {
                sh.quit.store(true, Ordering::Release);
                sh.result.set(Err(FrameError::Failed));
                return;
            }
        }
    };

    if let Some(gate) = gate {
        let _ = gate.recv();
    }
    if sh.result.fault() || sh.quit.load(Ordering::Acquire) {
        return;
    }

    let mut writer = sh.writer.lock().unwrap_or_else(PoisonError::into_inner);
    write_bin(&mut **writer, sh.result, &data);
    drop(writer);

    if let Some(hasher) = sh.stream_hasher {
        let mut hasher = hasher.lock().unwrap_or_else(PoisonError::into_inner);
        hasher.write(&data);
    }

    let _ = done.send(());
}
