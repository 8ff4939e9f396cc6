//! HTTP byte-range parsing.
//!
//! A small, strict parser for single byte ranges. Malformed headers,
//! multipart ranges, and unsatisfiable ranges are rejected explicitly
//! rather than silently served as full bodies.

/// An inclusive byte range within an asset of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// Inclusive end offset.
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Cap the range to at most `max_len` bytes from its start.
    pub fn clamp_len(self, max_len: u64) -> ByteRange {
        if self.len() <= max_len {
            self
        } else {
            ByteRange {
                start: self.start,
                end: self.start + max_len - 1,
            }
        }
    }

    /// `Content-Range` header value for an asset of `total` bytes.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Parse a `Range` header against an asset of `size` bytes.
///
/// Accepts `bytes=a-b`, `bytes=a-`, and the suffix form `bytes=-n`.
/// Returns None for anything malformed, multipart, or unsatisfiable.
pub fn parse_range(header: &str, size: u64) -> Option<ByteRange> {
    if size == 0 {
        return None;
    }

    let spec = header.trim().strip_prefix("bytes=")?;

    // Single ranges only
    if spec.contains(',') {
        return None;
    }

    let (start_str, end_str) = spec.split_once('-')?;
    let start_str = start_str.trim();
    let end_str = end_str.trim();

    match (start_str.is_empty(), end_str.is_empty()) {
        // bytes=a-b
        (false, false) => {
            let start: u64 = start_str.parse().ok()?;
            let end: u64 = end_str.parse().ok()?;
            if start > end || start >= size {
                return None;
            }
            Some(ByteRange {
                start,
                end: end.min(size - 1),
            })
        }
        // bytes=a-
        (false, true) => {
            let start: u64 = start_str.parse().ok()?;
            if start >= size {
                return None;
            }
            Some(ByteRange {
                start,
                end: size - 1,
            })
        }
        // bytes=-n (last n bytes)
        (true, false) => {
            let suffix: u64 = end_str.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            let len = suffix.min(size);
            Some(ByteRange {
                start: size - len,
                end: size - 1,
            })
        }
        // bytes=-
        (true, true) => None,
    }
}
