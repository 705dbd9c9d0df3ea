//! Indexed/Huffman header-block codec (HPACK-lite).
//!
//! Byte-at-a-time decode loop over the four representation kinds, a
//! 61-entry static table, and a per-session bounded dynamic table with
//! FIFO eviction. The encoder half exists only to build test fixtures.

use crate::error::{H2Error, H2ErrorKind};
use crate::header::{validate_name, HeaderBlock};
use std::collections::VecDeque;
use std::sync::OnceLock;

mod table;

use table::{HUFFMAN_CODES, STATIC_TABLE};

/// Fixed per-entry overhead added to name + value lengths.
const ENTRY_OVERHEAD: usize = 32;

const STATIC_TABLE_SIZE: usize = STATIC_TABLE.len();

/// Bounded FIFO cache of recently inserted fields. Index 0 is the most
/// recently inserted entry; wire indexes address it after the static table.
#[derive(Debug, Default)]
pub struct DynamicTable {
    entries: VecDeque<(String, String)>,
    size: usize,
    max_size: usize,
}

pub(crate) fn entry_size(name: &str, value: &str) -> usize {
    ENTRY_OVERHEAD + name.len() + value.len()
}

impl DynamicTable {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<(&str, &str)> {
        self.entries
            .get(index)
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Insert at the front, evicting from the back only until the size bound
    /// holds again. An entry larger than the whole table empties it and is
    /// itself not stored.
    pub fn insert(&mut self, name: String, value: String) {
        let field_size = entry_size(&name, &value);
        if field_size > self.max_size {
            self.entries.clear();
            self.size = 0;
            return;
        }
        while self.size + field_size > self.max_size {
            match self.entries.pop_back() {
                Some((n, v)) => self.size -= entry_size(&n, &v),
                None => break,
            }
        }
        self.entries.push_front((name, value));
        self.size += field_size;
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        while self.size > self.max_size {
            match self.entries.pop_back() {
                Some((n, v)) => self.size -= entry_size(&n, &v),
                None => break,
            }
        }
    }
}

/// Stateful decoder: one per session direction, owning that direction's
/// dynamic table.
#[derive(Debug)]
pub struct HpackDecoder {
    table: DynamicTable,
    /// Ceiling for size updates carried in the block itself.
    max_table_size: usize,
    /// Largest single field accepted for incremental indexing.
    max_field_size: usize,
    /// Cumulative decoded size allowed per block.
    max_header_list_size: usize,
}

impl HpackDecoder {
    pub fn new(max_header_list_size: usize, max_table_size: usize) -> Self {
        Self {
            table: DynamicTable::new(max_table_size),
            max_table_size,
            max_field_size: max_table_size,
            max_header_list_size,
        }
    }

    pub fn with_max_field_size(mut self, max_field_size: usize) -> Self {
        self.max_field_size = max_field_size;
        self
    }

    pub fn table(&self) -> &DynamicTable {
        &self.table
    }

    /// Apply a SETTINGS-driven table-size change: both the ceiling for
    /// in-block updates and the current capacity move together.
    pub fn resize(&mut self, max_header_list_size: usize, max_table_size: usize) {
        self.max_header_list_size = max_header_list_size;
        self.max_table_size = max_table_size;
        self.table.set_max_size(max_table_size);
    }

    /// Decode one complete header block into an owned ordered map.
    pub fn decode(&mut self, block: &[u8]) -> Result<HeaderBlock, H2Error> {
        let mut out = HeaderBlock::new();
        let mut pos = 0;
        let mut list_size = 0usize;

        while pos < block.len() {
            let b = block[pos];
            if b & 0x80 != 0 {
                // Indexed field
                let (index, consumed) = decode_integer(&block[pos..], 7)?;
                pos += consumed;
                let (name, value) = self.lookup(index)?;
                list_size += entry_size(&name, &value);
                out.push(name, value);
            } else if b & 0x40 != 0 {
                // Literal with incremental indexing
                let (index, consumed) = decode_integer(&block[pos..], 6)?;
                pos += consumed;
                let name = if index == 0 {
                    let (name, n) = decode_string(&block[pos..])?;
                    pos += n;
                    name
                } else {
                    self.lookup(index)?.0
                };
                let (value, n) = decode_string(&block[pos..])?;
                pos += n;
                validate_name(&name)?;
                let field_size = entry_size(&name, &value);
                if field_size > self.max_field_size {
                    return Err(H2ErrorKind::FieldTooLarge(field_size).into());
                }
                self.table.insert(name.clone(), value.clone());
                list_size += field_size;
                out.push(name, value);
            } else if b & 0x20 != 0 {
                // Dynamic table size update, no field emitted
                let (size, consumed) = decode_integer(&block[pos..], 5)?;
                pos += consumed;
                if size > self.max_table_size {
                    return Err(H2ErrorKind::TableSizeExceeded(size).into());
                }
                self.table.set_max_size(size);
            } else {
                // Literal without indexing / never indexed (0x10 bit ignored:
                // a passive decoder stores nothing either way)
                let (index, consumed) = decode_integer(&block[pos..], 4)?;
                pos += consumed;
                let name = if index == 0 {
                    let (name, n) = decode_string(&block[pos..])?;
                    pos += n;
                    name
                } else {
                    self.lookup(index)?.0
                };
                let (value, n) = decode_string(&block[pos..])?;
                pos += n;
                validate_name(&name)?;
                list_size += entry_size(&name, &value);
                out.push(name, value);
            }

            if list_size > self.max_header_list_size {
                return Err(H2ErrorKind::HeaderListTooLarge.into());
            }
        }

        Ok(out)
    }

    fn lookup(&self, index: usize) -> Result<(String, String), H2Error> {
        if index == 0 {
            return Err(H2ErrorKind::InvalidIndex(0).into());
        }
        if index <= STATIC_TABLE_SIZE {
            let (name, value) = STATIC_TABLE[index - 1];
            return Ok((name.to_string(), value.to_string()));
        }
        self.table
            .get(index - STATIC_TABLE_SIZE - 1)
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .ok_or_else(|| H2ErrorKind::InvalidIndex(index).into())
    }
}

/// Decode an N-bit-prefix integer at the start of `data`.
/// Returns (value, bytes consumed).
pub(crate) fn decode_integer(data: &[u8], prefix_bits: u8) -> Result<(usize, usize), H2Error> {
    if data.is_empty() {
        return Err(H2ErrorKind::TruncatedHeaderBlock.into());
    }
    let max_prefix = (1usize << prefix_bits) - 1;
    let mut value = (data[0] as usize) & max_prefix;
    if value < max_prefix {
        return Ok((value, 1));
    }

    let mut shift = 0u32;
    let mut i = 1;
    loop {
        if i >= data.len() {
            return Err(H2ErrorKind::TruncatedHeaderBlock.into());
        }
        if shift > 56 {
            return Err(H2ErrorKind::IntegerOverflow.into());
        }
        let b = data[i];
        value = value
            .checked_add(((b & 0x7F) as usize) << shift)
            .ok_or(H2ErrorKind::IntegerOverflow)?;
        shift += 7;
        i += 1;
        if b & 0x80 == 0 {
            return Ok((value, i));
        }
    }
}

pub(crate) fn encode_integer(value: usize, prefix_bits: u8, prefix: u8, out: &mut Vec<u8>) {
    let max_prefix = (1usize << prefix_bits) - 1;
    if value < max_prefix {
        out.push(prefix | value as u8);
        return;
    }
    out.push(prefix | max_prefix as u8);
    let mut remaining = value - max_prefix;
    while remaining >= 128 {
        out.push((remaining % 128 + 128) as u8);
        remaining /= 128;
    }
    out.push(remaining as u8);
}

/// Decode a length-prefixed, optionally Huffman-coded string.
fn decode_string(data: &[u8]) -> Result<(String, usize), H2Error> {
    if data.is_empty() {
        return Err(H2ErrorKind::TruncatedHeaderBlock.into());
    }
    let huffman = data[0] & 0x80 != 0;
    let (length, consumed) = decode_integer(data, 7)?;
    let end = consumed
        .checked_add(length)
        .ok_or(H2ErrorKind::IntegerOverflow)?;
    if data.len() < end {
        return Err(H2ErrorKind::TruncatedHeaderBlock.into());
    }
    let raw = &data[consumed..end];
    let bytes = if huffman {
        huffman_decode(raw)?
    } else {
        raw.to_vec()
    };
    let s = String::from_utf8(bytes).map_err(|_| H2ErrorKind::InvalidUtf8)?;
    Ok((s, end))
}

// --- Huffman coding ---

/// Flat binary decode tree over the code table; built once on first use.
/// `symbol` is set at leaves; interior nodes hold child slot indexes.
struct HuffmanNode {
    children: [u16; 2],
    symbol: Option<u16>,
}

fn huffman_tree() -> &'static Vec<HuffmanNode> {
    static TREE: OnceLock<Vec<HuffmanNode>> = OnceLock::new();
    TREE.get_or_init(|| {
        let mut nodes = vec![HuffmanNode {
            children: [0, 0],
            symbol: None,
        }];
        for (symbol, &(code, bits)) in HUFFMAN_CODES.iter().enumerate() {
            let mut node = 0usize;
            for depth in (0..bits).rev() {
                let bit = ((code >> depth) & 1) as usize;
                if nodes[node].children[bit] == 0 {
                    nodes.push(HuffmanNode {
                        children: [0, 0],
                        symbol: None,
                    });
                    let next = (nodes.len() - 1) as u16;
                    nodes[node].children[bit] = next;
                }
                node = nodes[node].children[bit] as usize;
            }
            nodes[node].symbol = Some(symbol as u16);
        }
        nodes
    })
}

pub(crate) fn huffman_decode(data: &[u8]) -> Result<Vec<u8>, H2Error> {
    let tree = huffman_tree();
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut node = 0usize;
    let mut path_bits = 0u8;
    let mut path_all_ones = true;

    for &byte in data {
        for shift in (0..8).rev() {
            let bit = ((byte >> shift) & 1) as usize;
            node = tree[node].children[bit] as usize;
            if node == 0 {
                return Err(H2ErrorKind::HuffmanDecode.into());
            }
            path_bits += 1;
            path_all_ones &= bit == 1;
            if let Some(symbol) = tree[node].symbol {
                if symbol == 256 {
                    // EOS inside the data is a coding error
                    return Err(H2ErrorKind::HuffmanDecode.into());
                }
                out.push(symbol as u8);
                node = 0;
                path_bits = 0;
                path_all_ones = true;
            }
        }
    }

    // Trailing bits must be a short all-ones EOS prefix
    if path_bits >= 8 || !path_all_ones {
        return Err(H2ErrorKind::HuffmanDecode.into());
    }
    Ok(out)
}

pub(crate) fn huffman_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut acc: u64 = 0;
    let mut bits: u8 = 0;
    for &byte in data {
        let (code, len) = HUFFMAN_CODES[byte as usize];
        acc = (acc << len) | code as u64;
        bits += len;
        while bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
    }
    if bits > 0 {
        acc = (acc << (8 - bits)) | ((1u64 << (8 - bits)) - 1);
        out.push(acc as u8);
    }
    out
}

/// Fixture-only encoder. Emits indexed forms for exact static-table matches
/// and literal-with-incremental-indexing otherwise, mirroring its decoder's
/// table so indexed references stay resolvable across blocks.
#[derive(Debug)]
pub struct HpackEncoder {
    table: DynamicTable,
    use_huffman: bool,
}

impl HpackEncoder {
    pub fn new(max_table_size: usize) -> Self {
        Self {
            table: DynamicTable::new(max_table_size),
            use_huffman: true,
        }
    }

    pub fn set_huffman(&mut self, enabled: bool) {
        self.use_huffman = enabled;
    }

    pub fn encode(&mut self, fields: &[(String, String)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in fields {
            self.encode_field(name, value, &mut out);
        }
        out
    }

    fn encode_field(&mut self, name: &str, value: &str, out: &mut Vec<u8>) {
        if let Some(index) = static_full_match(name, value) {
            encode_integer(index, 7, 0x80, out);
            return;
        }
        if let Some(pos) = (0..self.table.len())
            .find(|&i| self.table.get(i) == Some((name, value)))
        {
            encode_integer(STATIC_TABLE_SIZE + 1 + pos, 7, 0x80, out);
            return;
        }
        match static_name_match(name) {
            Some(index) => encode_integer(index, 6, 0x40, out),
            None => out.push(0x40),
        }
        if static_name_match(name).is_none() {
            self.encode_string(name.as_bytes(), out);
        }
        self.encode_string(value.as_bytes(), out);
        self.table.insert(name.to_string(), value.to_string());
    }

    fn encode_string(&self, s: &[u8], out: &mut Vec<u8>) {
        if self.use_huffman {
            let encoded = huffman_encode(s);
            if encoded.len() < s.len() {
                encode_integer(encoded.len(), 7, 0x80, out);
                out.extend_from_slice(&encoded);
                return;
            }
        }
        encode_integer(s.len(), 7, 0x00, out);
        out.extend_from_slice(s);
    }
}

fn static_full_match(name: &str, value: &str) -> Option<usize> {
    STATIC_TABLE
        .iter()
        .position(|&(n, v)| n == name && v == value && !value.is_empty())
        .map(|i| i + 1)
}

fn static_name_match(name: &str) -> Option<usize> {
    STATIC_TABLE
        .iter()
        .position(|&(n, _)| n == name)
        .map(|i| i + 1)
}
