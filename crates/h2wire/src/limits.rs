/// Decode-side resource limits.
///
/// The SETTINGS defaults (header table size 0x10000, max header list size
/// 0x40000) apply until a SETTINGS frame on the session overrides them.
#[derive(Debug, Clone)]
pub struct H2Limits {
    /// Cumulative decoded header size per block (name + value + 32 each).
    pub max_header_list_size: usize,
    /// Dynamic table capacity in bytes.
    pub max_table_size: usize,
    /// Largest single field accepted for incremental indexing.
    pub max_field_size: usize,
    /// Largest reassembled body kept per stream.
    pub max_body_size: usize,
}

impl Default for H2Limits {
    fn default() -> Self {
        Self {
            max_header_list_size: 0x40000,
            max_table_size: 0x10000,
            max_field_size: 8192,
            max_body_size: 10 * 1024 * 1024,
        }
    }
}
