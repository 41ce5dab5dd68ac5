//! Chunked writes.
//!
//! Backends cap how many rows one write call may carry, so large batches
//! are split. The first chunk holds up to [`FIRST_CHUNK_LEN`] rows and every
//! later chunk up to [`CHUNK_LEN`]; chunks are contiguous and cover every
//! row exactly once.
//!
//! Writes stop at the first failing chunk. Chunks already written stay
//! written, later chunks are never attempted.

use crate::error::StoreError;

/// Maximum rows in the first write call.
pub const FIRST_CHUNK_LEN: usize = 99;

/// Maximum rows in every write call after the first.
pub const CHUNK_LEN: usize = 100;

/// Iterator over `(start, end)` offsets of the chunks covering `len` rows.
#[derive(Debug, Clone)]
pub struct ChunkBounds {
    next: usize,
    len: usize,
}

/// Returns the chunk offsets for a batch of `len` rows. Empty for `len == 0`.
pub fn chunk_bounds(len: usize) -> ChunkBounds {
    ChunkBounds { next: 0, len }
}

impl Iterator for ChunkBounds {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let size = if self.next == 0 {
            FIRST_CHUNK_LEN
        } else {
            CHUNK_LEN
        };
        let start = self.next;
        let end = (start + size).min(self.len);
        self.next = end;
        Some((start, end))
    }
}

/// Writes `rows` to `table` through `put`, one call per chunk.
///
/// `put` is the backend's single write call; it is invoked synchronously
/// and never retried.
///
/// # Errors
///
/// Returns the error of the first chunk that fails.
pub fn write_chunks<R, F>(table: &str, rows: &[R], mut put: F) -> Result<(), StoreError>
where
    F: FnMut(&str, &[R]) -> Result<(), StoreError>,
{
    for (start, end) in chunk_bounds(rows.len()) {
        if let Err(e) = put(table, &rows[start..end]) {
            tracing::error!(table, start, end, error = %e, "failed to persist chunk");
            return Err(e);
        }
        tracing::debug!(table, start, end, "inserted chunk");
    }
    Ok(())
}
