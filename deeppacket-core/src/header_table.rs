//! Per-connection HPACK decompression state.
//!
//! HTTP/2 header blocks reference a dynamic table built from every earlier
//! block on the same connection, so decoding is only correct when one
//! decoder per connection key survives across packets. [`HeaderTableStore`]
//! owns those decoders for the life of a capture session: tables are
//! created on first use, never evicted and never reset.
//!
//! A block that fails to decode must leave its table exactly as it was.
//! The `hpack` decoder inserts entries while it walks a block, so each
//! [`HeaderTable`] keeps a mirror of the committed dynamic table and
//! rebuilds a fresh decoder from it whenever a decode fails part way.
//!
//! ```
//! use deeppacket_core::header_table::{ConnectionKey, HeaderTableStore};
//!
//! let store = HeaderTableStore::new();
//! let key = ConnectionKey::from("10.0.0.2".parse::<std::net::IpAddr>().unwrap());
//!
//! // `:method: GET` from the static table
//! let headers = store.decode(key, &[0x82]).unwrap();
//! assert_eq!(headers, vec![(":method".to_string(), "GET".to_string())]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use hpack::Decoder;
use thiserror::Error;

/// Dynamic table capacity of every decoder, in RFC 7541 size units.
pub const HEADER_TABLE_SIZE: usize = 4096;

/// Entries in the HPACK static table (RFC 7541 Appendix A).
const STATIC_TABLE_LEN: usize = 61;

/// Per-entry overhead added to name and value lengths (RFC 7541 §4.1).
const ENTRY_OVERHEAD: usize = 32;

/// Errors from decoding one header block.
///
/// None of these are fatal: the caller treats the block as having produced
/// no headers and the table is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HpackError {
    #[error("malformed integer at offset {offset}")]
    MalformedInteger { offset: usize },

    #[error("string literal at offset {offset} runs past the block")]
    TruncatedString { offset: usize },

    #[error("table index {index} out of range")]
    InvalidIndex { index: usize },

    #[error("table size update to {size} exceeds capacity {max}")]
    TableSizeTooLarge { size: usize, max: usize },

    #[error("table size update at offset {offset} follows a header field")]
    MisplacedSizeUpdate { offset: usize },

    #[error("decoder rejected block: {0}")]
    Decoder(String),

    #[error("decoder produced {decoded} fields for {expected} representations")]
    FieldCountMismatch { expected: usize, decoded: usize },
}

/// Identity under which decompression state is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey(pub IpAddr);

impl From<IpAddr> for ConnectionKey {
    fn from(addr: IpAddr) -> Self {
        ConnectionKey(addr)
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One representation found by the structural scan of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Representation {
    SizeUpdate(usize),
    Field { indexed_into_table: bool },
}

/// Committed copy of a decoder's dynamic table, newest entry first.
#[derive(Debug, Clone)]
struct DynamicTable {
    entries: VecDeque<(Vec<u8>, Vec<u8>)>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    fn insert(&mut self, name: Vec<u8>, value: Vec<u8>) {
        let entry_size = name.len() + value.len() + ENTRY_OVERHEAD;
        self.evict_to(self.max_size.saturating_sub(entry_size));
        // An entry larger than the whole table empties it and is dropped
        if entry_size <= self.max_size {
            self.size += entry_size;
            self.entries.push_front((name, value));
        }
    }

    fn resize(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict_to(max_size);
    }

    fn evict_to(&mut self, limit: usize) {
        while self.size > limit {
            match self.entries.pop_back() {
                Some((name, value)) => self.size -= name.len() + value.len() + ENTRY_OVERHEAD,
                None => break,
            }
        }
    }

    /// A header block that rebuilds this table in an empty decoder.
    fn replay_block(&self) -> Vec<u8> {
        let mut block = Vec::new();
        encode_integer(self.max_size, 5, 0x20, &mut block);
        for (name, value) in self.entries.iter().rev() {
            // Literal with incremental indexing, new name, no Huffman
            block.push(0x40);
            encode_string(name, &mut block);
            encode_string(value, &mut block);
        }
        block
    }
}

fn encode_integer(value: usize, prefix_bits: u8, flags: u8, out: &mut Vec<u8>) {
    let max_prefix = (1usize << prefix_bits) - 1;
    if value < max_prefix {
        out.push(flags | value as u8);
        return;
    }
    out.push(flags | max_prefix as u8);
    let mut rest = value - max_prefix;
    while rest >= 0x80 {
        out.push((rest & 0x7f) as u8 | 0x80);
        rest >>= 7;
    }
    out.push(rest as u8);
}

fn encode_string(bytes: &[u8], out: &mut Vec<u8>) {
    encode_integer(bytes.len(), 7, 0x00, out);
    out.extend_from_slice(bytes);
}

/// Structural walk over a header block (RFC 7541 §6).
///
/// Strings are skipped, not decoded, so index bounds are checked against
/// the table length without eviction; the decoder applies the exact bound.
struct Scanner<'a> {
    block: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn integer(&mut self, prefix_bits: u8) -> Result<usize, HpackError> {
        let offset = self.pos;
        let malformed = HpackError::MalformedInteger { offset };
        let first = *self.block.get(self.pos).ok_or(malformed.clone())?;
        self.pos += 1;

        let max_prefix = (1usize << prefix_bits) - 1;
        let mut value = first as usize & max_prefix;
        if value < max_prefix {
            return Ok(value);
        }

        for shift in (0..=21).step_by(7) {
            let byte = *self.block.get(self.pos).ok_or(malformed.clone())?;
            self.pos += 1;
            value += (byte as usize & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(malformed)
    }

    fn skip_string(&mut self) -> Result<(), HpackError> {
        let offset = self.pos;
        let len = self.integer(7)?;
        if self.block.len() - self.pos < len {
            return Err(HpackError::TruncatedString { offset });
        }
        self.pos += len;
        Ok(())
    }

    fn scan(mut self, table_len: usize) -> Result<Vec<Representation>, HpackError> {
        let mut reps = Vec::new();
        let mut inserted = 0usize;
        let mut seen_field = false;

        while self.pos < self.block.len() {
            let offset = self.pos;
            let first = self.block[self.pos];
            let bound = STATIC_TABLE_LEN + table_len + inserted;
            let check_index = |index: usize| {
                if index == 0 || index > bound {
                    Err(HpackError::InvalidIndex { index })
                } else {
                    Ok(())
                }
            };

            if first & 0x80 != 0 {
                check_index(self.integer(7)?)?;
                reps.push(Representation::Field {
                    indexed_into_table: false,
                });
                seen_field = true;
            } else if first & 0x40 != 0 {
                match self.integer(6)? {
                    0 => self.skip_string()?,
                    index => check_index(index)?,
                }
                self.skip_string()?;
                inserted += 1;
                reps.push(Representation::Field {
                    indexed_into_table: true,
                });
                seen_field = true;
            } else if first & 0x20 != 0 {
                if seen_field {
                    return Err(HpackError::MisplacedSizeUpdate { offset });
                }
                let size = self.integer(5)?;
                if size > HEADER_TABLE_SIZE {
                    return Err(HpackError::TableSizeTooLarge {
                        size,
                        max: HEADER_TABLE_SIZE,
                    });
                }
                reps.push(Representation::SizeUpdate(size));
            } else {
                // Literal without indexing or never indexed
                match self.integer(4)? {
                    0 => self.skip_string()?,
                    index => check_index(index)?,
                }
                self.skip_string()?;
                reps.push(Representation::Field {
                    indexed_into_table: false,
                });
                seen_field = true;
            }
        }
        Ok(reps)
    }
}

/// One connection's HPACK decoder.
pub struct HeaderTable {
    decoder: Decoder<'static>,
    committed: DynamicTable,
}

impl HeaderTable {
    pub fn new() -> Self {
        Self {
            decoder: Decoder::new(),
            committed: DynamicTable::new(HEADER_TABLE_SIZE),
        }
    }

    /// Number of entries in the dynamic table.
    pub fn len(&self) -> usize {
        self.committed.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.entries.is_empty()
    }

    /// Dynamic table size in RFC 7541 units.
    pub fn size(&self) -> usize {
        self.committed.size
    }

    /// Decode one complete header block.
    ///
    /// On error the dynamic table is unchanged.
    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<(String, String)>, HpackError> {
        let reps = Scanner { block, pos: 0 }.scan(self.committed.entries.len())?;

        let fields = match self.decoder.decode(block) {
            Ok(fields) => fields,
            Err(e) => {
                self.restore();
                return Err(HpackError::Decoder(format!("{e:?}")));
            }
        };

        let expected = reps
            .iter()
            .filter(|r| matches!(r, Representation::Field { .. }))
            .count();
        if expected != fields.len() {
            self.restore();
            return Err(HpackError::FieldCountMismatch {
                expected,
                decoded: fields.len(),
            });
        }

        let mut decoded = fields.iter();
        for rep in reps {
            match rep {
                Representation::SizeUpdate(size) => self.committed.resize(size),
                Representation::Field { indexed_into_table } => {
                    let Some((name, value)) = decoded.next() else {
                        break;
                    };
                    if indexed_into_table {
                        self.committed.insert(name.clone(), value.clone());
                    }
                }
            }
        }

        Ok(fields
            .into_iter()
            .map(|(name, value)| {
                (
                    String::from_utf8_lossy(&name).into_owned(),
                    String::from_utf8_lossy(&value).into_owned(),
                )
            })
            .collect())
    }

    /// Replace the decoder with one holding only the committed entries.
    fn restore(&mut self) {
        let mut decoder = Decoder::new();
        if let Err(e) = decoder.decode(&self.committed.replay_block()) {
            tracing::warn!(error = ?e, "failed to rebuild header table");
        }
        self.decoder = decoder;
    }
}

impl Default for HeaderTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HeaderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderTable")
            .field("entries", &self.committed.entries.len())
            .field("size", &self.committed.size)
            .field("max_size", &self.committed.max_size)
            .finish()
    }
}

/// Counters reported by [`HeaderTableStore::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Connection keys with a table
    pub tables: usize,
    pub decoded_blocks: u64,
    pub failed_blocks: u64,
}

/// All decompression state of one capture session.
///
/// The key map has its own lock and every table has another, so access is
/// serialized per key while different keys stay independent.
#[derive(Debug, Default)]
pub struct HeaderTableStore {
    tables: Mutex<HashMap<ConnectionKey, Arc<Mutex<HeaderTable>>>>,
    decoded_blocks: AtomicU64,
    failed_blocks: AtomicU64,
}

impl HeaderTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table for `key`, created on first use.
    ///
    /// Every call with the same key returns a handle to the same table.
    pub fn get_or_create(&self, key: ConnectionKey) -> Arc<Mutex<HeaderTable>> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(tables.entry(key).or_insert_with(|| {
            tracing::trace!(%key, "new header table");
            Arc::new(Mutex::new(HeaderTable::new()))
        }))
    }

    /// Decode `block` with the table for `key`.
    pub fn decode(
        &self,
        key: ConnectionKey,
        block: &[u8],
    ) -> Result<Vec<(String, String)>, HpackError> {
        let table = self.get_or_create(key);
        let result = table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .decode(block);

        match &result {
            Ok(_) => self.decoded_blocks.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed_blocks.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    pub fn len(&self) -> usize {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            tables: self.len(),
            decoded_blocks: self.decoded_blocks.load(Ordering::Relaxed),
            failed_blocks: self.failed_blocks.load(Ordering::Relaxed),
        }
    }
}
