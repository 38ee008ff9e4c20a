use lz4par::{FrameContext, ReaderSource, WriterSink};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::{env, io};
use fehler::throws;

#[throws(io::Error)]
fn main() {
    let mut args = env::args().skip(1);
    let filename_in = args.next().expect("usage: unflz4 <input> <output>");
    let filename_out = args.next().expect("usage: unflz4 <input> <output>");
    let file_in = BufReader::new(File::open(filename_in)?);
    let file_out = BufWriter::new(File::create(filename_out)?);

    FrameContext::new().decompress(ReaderSource::new(file_in), WriterSink::new(file_out))?;
}
