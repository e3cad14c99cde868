//! Opening capture files from disk.
//!
//! A file may be a legacy pcap or a pcapng, optionally gzip or zstd
//! compressed. Both are recognised from magic bytes: the first bytes of
//! the file pick the decompressor and the first bytes it yields pick the
//! capture format.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Error, PcapError as OurPcapError};
use crate::io::{peek, Compression, Decompressor, GenericPcapReader, PcapFormat, RawPacket, Replayed};

/// Bytes needed to tell every supported magic apart.
const MAGIC_LEN: usize = 4;

type CaptureStream = Replayed<Decompressor<Replayed<File>>>;

/// Reader for PCAP and PCAPNG files, with optional decompression.
///
/// # Example
///
/// ```ignore
/// use deeppacket_core::pcap::PcapReader;
///
/// let mut reader = PcapReader::open("capture.pcap.gz")?;
/// while let Some(packet) = reader.next_packet()? {
///     println!("Frame {}: {} bytes", packet.frame_number, packet.data.len());
/// }
/// ```
pub struct PcapReader {
    inner: GenericPcapReader<CaptureStream>,
    path: PathBuf,
    compression: Compression,
    format: PcapFormat,
}

impl PcapReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| {
            Error::Pcap(OurPcapError::FileNotFound {
                path: path.display().to_string(),
            })
        })?;

        let (head, file) = peek(file, MAGIC_LEN)?;
        let compression = Compression::detect(&head);
        let plain = Decompressor::new(file, compression).map_err(|e| {
            Error::Pcap(OurPcapError::InvalidFormat {
                reason: format!("cannot start {compression} decoder: {e}"),
            })
        })?;

        let (magic, stream) = peek(plain, MAGIC_LEN)?;
        let format = PcapFormat::detect(&magic)?;
        let inner = GenericPcapReader::with_format(stream, format)?;

        tracing::debug!(path = %path.display(), %compression, ?format, "opened capture file");

        Ok(Self {
            inner,
            path: path.to_path_buf(),
            compression,
            format,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn format(&self) -> PcapFormat {
        self.format
    }

    /// Link type of the first interface (1 = Ethernet).
    #[inline]
    pub fn link_type(&self) -> u16 {
        self.inner.link_type() as u16
    }

    /// Frames read so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.inner.frame_count()
    }

    /// Read the next packet, or `Ok(None)` at end of file.
    #[inline]
    pub fn next_packet(&mut self) -> Result<Option<RawPacket>, Error> {
        self.inner.next_packet()
    }
}

impl Iterator for PcapReader {
    type Item = Result<RawPacket, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}

/// Count the frames in a capture file with a full read.
///
/// Used for exact progress reporting before the processing pass.
pub fn count_packets<P: AsRef<Path>>(path: P) -> Result<u64, Error> {
    let mut reader = PcapReader::open(path)?;
    while reader.next_packet()?.is_some() {}
    Ok(reader.frame_count())
}
