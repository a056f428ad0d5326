//! Growable in-memory byte buffer used to collect entry content.

use crate::error::Result;

/// Collects bytes from successive appends.
///
/// An accumulator that never received any bytes has no buffer at all, which lets callers tell
/// "nothing was read" apart from "an empty buffer was read".
#[derive(Debug, Default)]
pub struct ByteAccumulator {
    buf: Option<Vec<u8>>,
}

impl ByteAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a copy of `bytes`.
    ///
    /// Fails with [`crate::error::Error::Allocation`] if the buffer can't grow, in which case the
    /// bytes accumulated so far are left untouched.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let buf = self.buf.get_or_insert_with(Vec::new);
        buf.try_reserve(bytes.len())?;
        buf.extend_from_slice(bytes);

        Ok(())
    }

    /// Number of bytes accumulated so far
    pub fn len(&self) -> usize {
        self.buf.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand over the accumulated bytes, `None` if nothing was ever appended.
    pub fn dump(self) -> Option<Vec<u8>> {
        self.buf
    }
}
