use lz4par::{FrameContext, ReaderSource, StreamDescriptor, WriterSink};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::{env, io};
use fehler::throws;

#[throws(io::Error)]
fn main() {
    let mut args = env::args().skip(1);
    let filename_in = args.next().expect("usage: flz4 <input> <output>");
    let filename_out = args.next().expect("usage: flz4 <input> <output>");
    let file_in = BufReader::new(File::open(filename_in)?);
    let file_out = BufWriter::new(File::create(filename_out)?);

    let mut sd = StreamDescriptor::default();
    sd.block_checksums(false).stream_checksum(true);
    FrameContext::new().compress(ReaderSource::new(file_in), WriterSink::new(file_out), &sd)?;
}
