//! Streaming files, buffers and directory markers into an archive, one entry per call.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, MAIN_SEPARATOR};

use tracing::{debug, instrument, warn};

use crate::archive::{ArchiveWrite, EntryOptions, SizeClass};
use crate::compression::CompressionMethod;
use crate::error::{Error, Result};

/// Size of the chunks streamed into an entry
pub const CHUNK_SIZE: usize = 8192;

/// An entry open on an archive writer.
///
/// The entry is closed when the guard goes away, whichever way the caller leaves.
struct OpenEntry<'w, W: ArchiveWrite + ?Sized> {
    archive: Option<&'w mut W>,
}

impl<'w, W: ArchiveWrite + ?Sized> OpenEntry<'w, W> {
    fn open(archive: &'w mut W, name: &str, options: EntryOptions) -> Result<Self> {
        archive.open_entry(name, options)?;
        Ok(Self {
            archive: Some(archive),
        })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        match self.archive.as_deref_mut() {
            Some(archive) => archive.write_entry(bytes),
            None => Err(Error::NoEntryOpen),
        }
    }

    fn close(mut self) -> Result<()> {
        match self.archive.take() {
            Some(archive) => archive.close_entry(),
            None => Err(Error::NoEntryOpen),
        }
    }
}

impl<W: ArchiveWrite + ?Sized> Drop for OpenEntry<'_, W> {
    fn drop(&mut self) {
        if let Some(archive) = self.archive.take() {
            if let Err(e) = archive.close_entry() {
                warn!("failed to close entry after an error: {e}");
            }
        }
    }
}

/// Entry name for a filesystem path: platform separators become `/`, leading ones are dropped.
pub fn entry_name_for(path: &Path) -> String {
    let name = path.to_string_lossy();
    let name = if MAIN_SEPARATOR == '/' {
        name.into_owned()
    } else {
        name.replace(MAIN_SEPARATOR, "/")
    };
    name.trim_start_matches('/').to_owned()
}

/// Adds entries to an archive writer that has no entry open.
pub struct EntryWriter<'a, W: ArchiveWrite + ?Sized> {
    archive: &'a mut W,
    compression: CompressionMethod,
}

impl<'a, W: ArchiveWrite + ?Sized> EntryWriter<'a, W> {
    pub fn new(archive: &'a mut W) -> Self {
        Self {
            archive,
            compression: CompressionMethod::default(),
        }
    }

    /// Compression used for file and buffer content. Directory markers are always stored.
    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    /// Add the file at `path`, named after the path itself
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let name = entry_name_for(path);
        self.add_file_as(path, &name)
    }

    /// Add the file at `path` under the entry name `name`
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()), err)]
    pub fn add_file_as(&mut self, path: impl AsRef<Path>, name: &str) -> Result<()> {
        let mut file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        self.add_reader(name, &mut file, len)
    }

    /// Add `len` bytes read from `reader` under the entry name `name`.
    ///
    /// `len` picks the size class before the entry is opened.
    pub fn add_reader<R: Read + ?Sized>(
        &mut self,
        name: &str,
        reader: &mut R,
        len: u64,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }

        let options = EntryOptions::builder()
            .compression(self.compression)
            .size_class(SizeClass::for_len(len))
            .build();
        debug!(name, len, ?options, "streaming entry");

        let mut entry = OpenEntry::open(&mut *self.archive, name, options)?;
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let count = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(count) => count,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            entry.write(&chunk[..count])?;
        }
        entry.close()
    }

    /// Add an in-memory buffer under the entry name `name`
    #[instrument(skip(self, bytes), fields(len = bytes.len()), err)]
    pub fn add_buffer(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        if bytes.is_empty() {
            return Err(Error::EmptyBuffer);
        }

        let options = EntryOptions::builder()
            .compression(self.compression)
            .size_class(SizeClass::for_len(bytes.len() as u64))
            .build();

        let mut entry = OpenEntry::open(&mut *self.archive, name, options)?;
        entry.write(bytes)?;
        entry.close()
    }

    /// Add a directory marker. The name ends up with exactly one trailing `/`.
    #[instrument(skip(self), err)]
    pub fn add_directory(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        let trimmed = name.trim_end_matches('/');

        let options = EntryOptions::builder()
            .compression(CompressionMethod::Stored)
            .build();

        OpenEntry::open(&mut *self.archive, &format!("{trimmed}/"), options)?.close()
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, Read};

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    use crate::archive::{ArchiveWrite, EntryOptions, SizeClass};
    use crate::compression::CompressionMethod;
    use crate::entry_writer::{entry_name_for, EntryWriter, CHUNK_SIZE};
    use crate::error::{Error, Result};

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Open(String, EntryOptions),
        Write(usize),
        Close,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        content: Vec<u8>,
        fail_writes: bool,
    }

    impl ArchiveWrite for Recorder {
        fn open_entry(&mut self, name: &str, options: EntryOptions) -> Result<()> {
            self.events.push(Event::Open(name.to_owned(), options));
            Ok(())
        }

        fn write_entry(&mut self, bytes: &[u8]) -> Result<()> {
            if self.fail_writes {
                return Err(Error::CustomError("disk full".into()));
            }
            self.events.push(Event::Write(bytes.len()));
            self.content.extend_from_slice(bytes);
            Ok(())
        }

        fn close_entry(&mut self) -> Result<()> {
            self.events.push(Event::Close);
            Ok(())
        }
    }

    fn stored() -> EntryOptions {
        EntryOptions::builder()
            .compression(CompressionMethod::Stored)
            .build()
    }

    #[test]
    fn directory_names_get_one_trailing_separator() -> Result<()> {
        let mut recorder = Recorder::default();
        let mut writer = EntryWriter::new(&mut recorder);

        writer.add_directory("Up")?;
        writer.add_directory("Up/")?;
        writer.add_directory("Bound/A/B//")?;
        writer.add_directory("/")?;

        assert_eq!(
            recorder.events,
            vec![
                Event::Open("Up/".into(), stored()),
                Event::Close,
                Event::Open("Up/".into(), stored()),
                Event::Close,
                Event::Open("Bound/A/B/".into(), stored()),
                Event::Close,
                Event::Open("/".into(), stored()),
                Event::Close,
            ]
        );

        Ok(())
    }

    #[test]
    fn argument_errors_happen_before_any_io() {
        let mut recorder = Recorder::default();
        let mut writer = EntryWriter::new(&mut recorder);

        assert!(matches!(
            writer.add_buffer("Bond.txt", b""),
            Err(Error::EmptyBuffer)
        ));
        assert!(matches!(
            writer.add_buffer("", b"secret agent\n"),
            Err(Error::EmptyName)
        ));
        assert!(matches!(writer.add_directory(""), Err(Error::EmptyName)));

        assert!(recorder.events.is_empty());
    }

    #[traced_test]
    #[test]
    fn failed_write_still_closes_the_entry() {
        let mut recorder = Recorder {
            fail_writes: true,
            ..Default::default()
        };

        let result = EntryWriter::new(&mut recorder).add_buffer("Bond.txt", b"secret agent\n");
        assert!(matches!(result, Err(Error::CustomError(_))));

        assert_eq!(
            recorder.events,
            vec![
                Event::Open("Bond.txt".into(), EntryOptions::default()),
                Event::Close
            ]
        );
    }

    #[test]
    fn size_class_is_decided_from_the_declared_length() {
        let mut recorder = Recorder {
            fail_writes: true,
            ..Default::default()
        };
        let mut source = io::repeat(0).take(0x1_0000_0000);

        let result =
            EntryWriter::new(&mut recorder).add_reader("huge.bin", &mut source, 0x1_0000_0000);
        assert!(result.is_err());

        let large = EntryOptions::builder().size_class(SizeClass::Large).build();
        assert_eq!(
            recorder.events,
            vec![Event::Open("huge.bin".into(), large), Event::Close]
        );
    }

    #[test]
    fn files_are_streamed_in_chunks() -> Result<()> {
        let root = TempDir::new()?;
        let path = root.path().join("chunks.bin");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 100)).map(|i| i as u8).collect();
        std::fs::write(&path, &data)?;

        let mut recorder = Recorder::default();
        EntryWriter::new(&mut recorder)
            .with_compression(CompressionMethod::Stored)
            .add_file_as(&path, "Down/chunks.bin")?;

        assert_eq!(
            recorder.events.first(),
            Some(&Event::Open("Down/chunks.bin".into(), stored()))
        );
        assert_eq!(recorder.events.last(), Some(&Event::Close));
        assert!(recorder
            .events
            .iter()
            .all(|e| !matches!(e, Event::Write(n) if *n > CHUNK_SIZE)));
        assert_eq!(recorder.content, data);

        Ok(())
    }

    #[test]
    fn missing_source_opens_nothing() {
        let mut recorder = Recorder::default();
        let result = EntryWriter::new(&mut recorder).add_file("does/not/exist.txt");

        assert!(matches!(result, Err(Error::IOError(_))));
        assert!(recorder.events.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn entry_names_from_paths() {
        use std::path::Path;

        assert_eq!(entry_name_for(Path::new("Up/M.txt")), "Up/M.txt");
        assert_eq!(entry_name_for(Path::new("/Down/Q.tt")), "Down/Q.tt");
    }
}
