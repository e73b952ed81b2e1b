//! Fixed-width on-disk record describing one row of the source file.

/// Bytes of the string part cached directly in the record.
pub const CACHED_PREFIX_LEN: usize = 16;

/// Encoded record width: four little-endian i64 fields plus the prefix.
pub const RECORD_SIZE: usize = 8 * 4 + CACHED_PREFIX_LEN;

/// One row of the source file, addressed by byte spans.
///
/// The number part is stored one of two ways. When its digits fit an `i64`,
/// `number_end` is zero and `number_start` holds the parsed value directly.
/// Otherwise both fields delimit the digit span in the source file; the
/// grammar guarantees at least one digit before the delimiter, so a span
/// can never legitimately end at byte zero and the sentinel is unambiguous.
///
/// `prefix` caches the first [`CACHED_PREFIX_LEN`] bytes of the string part
/// verbatim (possibly cutting a multibyte character), padded with NUL. NUL
/// sorts below every byte a legal row can contain, and bytewise UTF-8
/// comparison matches code-point order, so comparing prefixes is exactly
/// comparing the leading bytes of the string parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub number_start: i64,
    pub number_end: i64,
    pub string_start: i64,
    pub string_end: i64,
    pub prefix: [u8; CACHED_PREFIX_LEN],
}

impl IndexRecord {
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[0..8].copy_from_slice(&self.number_start.to_le_bytes());
        out[8..16].copy_from_slice(&self.number_end.to_le_bytes());
        out[16..24].copy_from_slice(&self.string_start.to_le_bytes());
        out[24..32].copy_from_slice(&self.string_end.to_le_bytes());
        out[32..RECORD_SIZE].copy_from_slice(&self.prefix);
        out
    }

    pub fn decode(bytes: &[u8; RECORD_SIZE]) -> Self {
        let field = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[at..at + 8]);
            i64::from_le_bytes(raw)
        };
        let mut prefix = [0u8; CACHED_PREFIX_LEN];
        prefix.copy_from_slice(&bytes[32..RECORD_SIZE]);
        IndexRecord {
            number_start: field(0),
            number_end: field(8),
            string_start: field(16),
            string_end: field(24),
            prefix,
        }
    }

    /// True when the number part is stored as a parsed value rather than a
    /// byte span.
    pub fn number_is_inline(&self) -> bool {
        self.number_end == 0
    }

    /// Digit count of a span-encoded number part.
    pub fn number_span_len(&self) -> u64 {
        (self.number_end - self.number_start) as u64
    }

    pub fn string_span_len(&self) -> u64 {
        (self.string_end - self.string_start) as u64
    }
}
