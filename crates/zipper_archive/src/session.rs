//! Whole-archive workflows: building an archive from files and buffers, and extracting one onto
//! a directory tree.

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use bon::Builder;
use tracing::{info, instrument};

use crate::archive::{Advance, ArchiveRead, EntryKind};
use crate::compression::CompressionMethod;
use crate::entry_reader::EntryReader;
use crate::entry_writer::EntryWriter;
use crate::error::{Error, Result};
use crate::fs::{write_file, WriteMode};
use crate::materialize::{DirectoryMaterializer, PathSeparator};
use crate::read::ZipArchive;
use crate::write::{ZipWriter, ZipWriterOptions};

/// Builds an archive, one entry per call, in call order
pub struct ArchiveBuildSession<W: Write + Seek> {
    writer: ZipWriter<W>,
    compression: CompressionMethod,
}

impl ArchiveBuildSession<BufWriter<File>> {
    /// Start building the archive at `path`, replacing any existing file
    pub fn create(
        path: impl AsRef<Path>,
        options: ZipWriterOptions,
    ) -> Result<ArchiveBuildSession<BufWriter<File>>> {
        Ok(ArchiveBuildSession::new(ZipWriter::create(path, options)?))
    }
}

impl<W: Write + Seek> ArchiveBuildSession<W> {
    pub fn new(writer: ZipWriter<W>) -> Self {
        Self {
            writer,
            compression: CompressionMethod::default(),
        }
    }

    /// Compression for the content of files and buffers added from now on
    pub fn set_compression(&mut self, compression: CompressionMethod) {
        self.compression = compression;
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.writer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    fn entries(&mut self) -> EntryWriter<'_, ZipWriter<W>> {
        EntryWriter::new(&mut self.writer).with_compression(self.compression)
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        info!("adding file: {}", path.as_ref().display());
        self.entries().add_file(path)
    }

    pub fn add_file_as(&mut self, path: impl AsRef<Path>, name: &str) -> Result<()> {
        info!("adding file: {name}");
        self.entries().add_file_as(path, name)
    }

    pub fn add_buffer(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        info!("adding buffer: {name}");
        self.entries().add_buffer(name, bytes)
    }

    pub fn add_directory(&mut self, name: &str) -> Result<()> {
        info!("adding dir: {name}");
        self.entries().add_directory(name)
    }

    /// Write the central directory and return the underlying writer
    pub fn finish(self) -> Result<W> {
        self.writer.finish()
    }
}

/// Options for extracting an archive onto disk
#[derive(Debug, Clone, Builder)]
pub struct ExtractOptions {
    /// Refuse to replace files that already exist in the destination
    #[builder(default)]
    pub no_clobber: bool,

    /// Separator handed to the directory materializer
    #[builder(default)]
    pub separator: PathSeparator,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Observer of an extraction
pub trait ExtractProgress {
    /// A directory entry has been materialized at `target`
    fn on_directory(&mut self, _name: &str, _target: &Path) {}

    /// A file entry of `size` bytes has been written to `target`
    fn on_file(&mut self, _name: &str, _size: u64, _target: &Path) {}
}

impl ExtractProgress for () {}

/// What an extraction produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

/// Extracts every entry of an archive reader onto a directory tree
pub struct ArchiveExtractSession<A: ArchiveRead> {
    archive: A,
    options: ExtractOptions,
}

impl ArchiveExtractSession<ZipArchive<BufReader<File>>> {
    /// Open the archive at `path` for extraction
    pub fn open(
        path: impl AsRef<Path>,
        options: ExtractOptions,
    ) -> Result<ArchiveExtractSession<ZipArchive<BufReader<File>>>> {
        Ok(ArchiveExtractSession::new(ZipArchive::open(path)?, options))
    }
}

impl<A: ArchiveRead> ArchiveExtractSession<A> {
    pub fn new(archive: A, options: ExtractOptions) -> Self {
        Self { archive, options }
    }

    pub fn into_inner(self) -> A {
        self.archive
    }

    /// Extract every entry below `destination`, creating it if needed.
    ///
    /// Directories are created before the files they hold, even without an explicit directory
    /// entry. Stops at the first failure; whatever was written before it stays on disk.
    #[instrument(skip(self, destination, progress), fields(destination = %destination.as_ref().display()), err)]
    pub fn extract_to<P: ExtractProgress + ?Sized>(
        &mut self,
        destination: impl AsRef<Path>,
        progress: &mut P,
    ) -> Result<ExtractSummary> {
        let destination = destination.as_ref();
        std::fs::create_dir_all(destination)?;

        let separator = self.options.separator;
        let materializer = DirectoryMaterializer::new(separator).with_root(destination);
        let mode = if self.options.no_clobber {
            WriteMode::CreateNew
        } else {
            WriteMode::Truncate
        };

        let mut summary = ExtractSummary::default();
        let mut reader = EntryReader::new(&mut self.archive);
        let mut advance = reader.rewind()?;

        while advance == Advance::Entry {
            let (name, _) = reader.filename()?;
            let target = target_path(destination, &name)?;
            let local = local_name(&name, separator);

            match reader.classify()? {
                EntryKind::Directory => {
                    info!("reading dir: {name}");
                    materializer.ensure_path(&local)?;
                    progress.on_directory(&name, &target);
                    summary.directories += 1;
                    advance = reader.skip()?;
                }
                EntryKind::File => {
                    // Content under a directory name would have nowhere to go.
                    if name.ends_with('/') {
                        return Err(Error::UnsafeEntryName(name));
                    }
                    let size = reader.size()?;
                    info!("reading file ({size} bytes): {name}");
                    let drained = reader.drain_to_memory()?;

                    materializer.ensure_path(&local)?;
                    let data = drained.content.unwrap_or_default();
                    write_file(&target, &data, mode)?;

                    progress.on_file(&name, size, &target);
                    summary.files += 1;
                    summary.bytes += data.len() as u64;
                    advance = drained.advance;
                }
            }
        }

        Ok(summary)
    }
}

/// Rejects names that would land outside the destination directory
fn check_entry_name(name: &str) -> Result<()> {
    let unsafe_name = name.is_empty()
        || name.starts_with('/')
        || name.starts_with('\\')
        || name.contains('\0')
        || name.as_bytes().get(1) == Some(&b':')
        || name.split(['/', '\\']).any(|segment| segment == "..");

    if unsafe_name {
        return Err(Error::UnsafeEntryName(name.to_owned()));
    }
    Ok(())
}

fn target_path(destination: &Path, name: &str) -> Result<PathBuf> {
    check_entry_name(name)?;

    let mut target = destination.to_path_buf();
    name.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .for_each(|segment| target.push(segment));
    Ok(target)
}

/// Entry name spelled with the materializer's separator
fn local_name(name: &str, separator: PathSeparator) -> String {
    match separator.as_char() {
        '/' => name.to_owned(),
        other => name.replace('/', other.encode_utf8(&mut [0; 4])),
    }
}
