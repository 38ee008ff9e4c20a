//! The single-block compression capability.
//!
//! The framing pipeline never compresses bytes itself; it hands whole blocks
//! to a [`BlockCodec`]. The default codec is backed by `lz4_flex`, but any
//! implementation with the same contract plugs in via
//! [`FrameContext::with_codec`](crate::FrameContext::with_codec).

use lz4_flex::block;

/// Compress or decompress one block, independent of all others.
pub trait BlockCodec: Sync {
    /// Compress `src` into `dst`, returning the compressed length.
    ///
    /// `None` means the compressed form would not fit in `dst`. The encoder
    /// sizes `dst` to the source length, so `None` doubles as the
    /// incompressible signal: such blocks are emitted raw.
    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Option<usize>;

    /// Decompress `src` into `dst`, returning the decompressed length, or
    /// `None` when `src` is not a valid block or overflows `dst`.
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Option<usize>;

    /// Worst-case compressed size for `len` input bytes.
    fn compress_bound(&self, len: usize) -> usize;
}

/// The library-default LZ4 block codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

impl BlockCodec for Lz4Codec {
    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        block::compress_into(src, dst).ok()
    }

    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        block::decompress_into(src, dst).ok()
    }

    fn compress_bound(&self, len: usize) -> usize {
        block::get_maximum_output_size(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_roundtrip() {
        let data = b"a compressible payload, a compressible payload, a compressible payload";
        let mut compressed = vec![0u8; data.len()];
        let n = Lz4Codec.compress(data, &mut compressed).expect("fits");
        assert!(n < data.len());

        let mut restored = vec![0u8; data.len()];
        let m = Lz4Codec.decompress(&compressed[..n], &mut restored).expect("valid block");
        assert_eq!(&restored[..m], data);
    }

    #[test]
    fn incompressible_signals_none() {
        // 0..=255 has no repeats for LZ4 to exploit, so the compressed form
        // cannot fit into a destination of the source size.
        let data: Vec<u8> = (0u16..256).map(|i| i as u8).collect();
        let mut dst = vec![0u8; data.len()];
        assert_eq!(Lz4Codec.compress(&data, &mut dst), None);
    }

    #[test]
    fn bound_covers_worst_case() {
        for len in [0usize, 1, 255, 4096] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31 + 7) as u8).collect();
            let mut dst = vec![0u8; Lz4Codec.compress_bound(len)];
            let n = Lz4Codec.compress(&data, &mut dst).expect("bound must fit anything");
            assert!(n <= dst.len());
        }
    }

    #[test]
    fn decompress_rejects_garbage() {
        let mut dst = vec![0u8; 16];
        assert_eq!(Lz4Codec.decompress(&[0xF0, 0x01], &mut dst), None);
    }
}
