//! Transparent gzip and zstd decompression of capture files.
//!
//! Compression is recognised from the leading bytes of the stream, never
//! from the file name, so a renamed capture still opens.

use std::fmt;
use std::io::{self, Chain, Cursor, Read};

use flate2::read::MultiGzDecoder;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
#[cfg(feature = "compress-zstd")]
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Compression wrapped around a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    #[cfg(feature = "compress-zstd")]
    Zstd,
}

impl Compression {
    /// Recognise the compression from the first bytes of a stream.
    pub fn detect(head: &[u8]) -> Self {
        if head.starts_with(&GZIP_MAGIC) {
            return Compression::Gzip;
        }
        #[cfg(feature = "compress-zstd")]
        if head.starts_with(&ZSTD_MAGIC) {
            return Compression::Zstd;
        }
        Compression::None
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            #[cfg(feature = "compress-zstd")]
            Compression::Zstd => "zstd",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stream with its already-consumed head put back in front.
pub type Replayed<R> = Chain<Cursor<Vec<u8>>, R>;

/// Read up to `len` bytes from the front of `source` without losing them.
///
/// Returns the bytes seen and a reader that yields the whole stream again.
/// Fewer than `len` bytes come back only at end of stream.
pub fn peek<R: Read>(mut source: R, len: usize) -> io::Result<(Vec<u8>, Replayed<R>)> {
    let mut head = Vec::with_capacity(len);
    (&mut source).take(len as u64).read_to_end(&mut head)?;
    Ok((head.clone(), Cursor::new(head).chain(source)))
}

/// Plain byte stream over a possibly compressed source.
pub enum Decompressor<R: Read> {
    Plain(R),
    Gzip(MultiGzDecoder<R>),
    #[cfg(feature = "compress-zstd")]
    Zstd(zstd::Decoder<'static, io::BufReader<R>>),
}

impl<R: Read> Decompressor<R> {
    pub fn new(source: R, compression: Compression) -> io::Result<Self> {
        Ok(match compression {
            Compression::None => Decompressor::Plain(source),
            // Concatenated members are common in rotated captures
            Compression::Gzip => Decompressor::Gzip(MultiGzDecoder::new(source)),
            #[cfg(feature = "compress-zstd")]
            Compression::Zstd => Decompressor::Zstd(zstd::Decoder::new(source)?),
        })
    }

    pub fn compression(&self) -> Compression {
        match self {
            Decompressor::Plain(_) => Compression::None,
            Decompressor::Gzip(_) => Compression::Gzip,
            #[cfg(feature = "compress-zstd")]
            Decompressor::Zstd(_) => Compression::Zstd,
        }
    }
}

impl<R: Read> Read for Decompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decompressor::Plain(r) => r.read(buf),
            Decompressor::Gzip(r) => r.read(buf),
            #[cfg(feature = "compress-zstd")]
            Decompressor::Zstd(r) => r.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn test_detect() {
        assert_eq!(Compression::detect(&[0x1f, 0x8b, 0x08, 0x00]), Compression::Gzip);
        assert_eq!(Compression::detect(&[0xd4, 0xc3, 0xb2, 0xa1]), Compression::None);
        assert_eq!(Compression::detect(&[0x1f]), Compression::None);
        assert_eq!(Compression::detect(&[]), Compression::None);
        #[cfg(feature = "compress-zstd")]
        assert_eq!(Compression::detect(&[0x28, 0xb5, 0x2f, 0xfd]), Compression::Zstd);
    }

    #[test]
    fn test_peek_replays_head() {
        let (head, mut replayed) = peek(&b"abcdefgh"[..], 4).unwrap();
        assert_eq!(head, b"abcd");

        let mut all = Vec::new();
        replayed.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"abcdefgh");
    }

    #[test]
    fn test_peek_short_stream() {
        let (head, mut replayed) = peek(&b"ab"[..], 4).unwrap();
        assert_eq!(head, b"ab");

        let mut all = Vec::new();
        replayed.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"ab");
    }

    #[test]
    fn test_gzip_after_peek() {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(b"captured bytes").unwrap();
        let compressed = encoder.finish().unwrap();

        let (head, source) = peek(compressed.as_slice(), 4).unwrap();
        let compression = Compression::detect(&head);
        assert_eq!(compression.to_string(), "gzip");

        let mut reader = Decompressor::new(source, compression).unwrap();
        assert_eq!(reader.compression(), Compression::Gzip);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "captured bytes");
    }
}
