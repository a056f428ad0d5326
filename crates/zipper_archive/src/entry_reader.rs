//! Walking the entries of an archive reader and draining their content.

use std::io::{self, Read, Write};

use tracing::{instrument, trace};

use crate::archive::{Advance, ArchiveRead, EntryKind};
use crate::buffer::ByteAccumulator;
use crate::error::Result;

/// Size of the chunks handed to a sink
pub const CHUNK_SIZE: usize = 8192;

/// Consumer of the successive content chunks of an entry
///
/// Returning an error stops the drain; the sink isn't called again for that entry.
pub trait ChunkSink {
    fn consume(&mut self, chunk: &[u8]) -> Result<()>;
}

impl ChunkSink for ByteAccumulator {
    fn consume(&mut self, chunk: &[u8]) -> Result<()> {
        self.append(chunk)
    }
}

impl<F: FnMut(&[u8]) -> Result<()>> ChunkSink for F {
    fn consume(&mut self, chunk: &[u8]) -> Result<()> {
        self(chunk)
    }
}

/// Sink forwarding every chunk to a writer
#[derive(Debug)]
pub struct WriteSink<W: Write>(pub W);

impl<W: Write> ChunkSink for WriteSink<W> {
    fn consume(&mut self, chunk: &[u8]) -> Result<()> {
        self.0.write_all(chunk)?;
        Ok(())
    }
}

/// Content of an entry collected in memory, and where the cursor went afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drained {
    /// `None` when the entry had no content
    pub content: Option<Vec<u8>>,
    pub advance: Advance,
}

/// Reads entries off an archive reader, one at a time.
///
/// Only [`EntryReader::drain`], [`EntryReader::drain_to_memory`] and [`EntryReader::skip`] move
/// the cursor, and only past the current entry.
pub struct EntryReader<'a, A: ArchiveRead + ?Sized> {
    archive: &'a mut A,
    chunk_size: usize,
}

impl<'a, A: ArchiveRead + ?Sized> EntryReader<'a, A> {
    pub fn new(archive: &'a mut A) -> Self {
        Self {
            archive,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Use chunks of at most `chunk_size` bytes when draining
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Move the cursor back to the first entry
    pub fn rewind(&mut self) -> Result<Advance> {
        self.archive.go_to_first()
    }

    pub fn classify(&self) -> Result<EntryKind> {
        Ok(self.archive.current_entry()?.kind())
    }

    /// Name of the current entry and whether it is flagged as UTF-8
    pub fn filename(&self) -> Result<(String, bool)> {
        let entry = self.archive.current_entry()?;
        Ok((entry.name.to_string(), entry.is_utf8()))
    }

    /// Uncompressed size of the current entry
    pub fn size(&self) -> Result<u64> {
        Ok(self.archive.current_entry()?.uncompressed_size)
    }

    /// Move past the current entry without reading it
    pub fn skip(&mut self) -> Result<Advance> {
        self.archive.go_to_next()
    }

    /// Feed the content of the current entry to `sink`, then move past it.
    ///
    /// On failure the cursor stays on the entry.
    #[instrument(skip_all, err)]
    pub fn drain<S: ChunkSink + ?Sized>(&mut self, sink: &mut S) -> Result<Advance> {
        let mut chunk = vec![0u8; self.chunk_size];

        {
            let mut content = self.archive.open_current_entry()?;
            loop {
                let count = match content.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(count) => count,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };
                trace!(count, "chunk");
                sink.consume(&chunk[..count])?;
            }
        }

        self.archive.go_to_next()
    }

    /// Collect the content of the current entry in memory, then move past it.
    pub fn drain_to_memory(&mut self) -> Result<Drained> {
        let mut accumulator = ByteAccumulator::new();
        let advance = self.drain(&mut accumulator)?;
        Ok(Drained {
            content: accumulator.dump(),
            advance,
        })
    }
}
