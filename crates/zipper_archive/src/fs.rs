//! Whole-file helpers used around the archive sessions.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use tracing::instrument;

use crate::buffer::ByteAccumulator;
use crate::error::{Error, Result};

const CHUNK_SIZE: usize = 8192;

/// How [`write_file`] treats an existing file
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the file content
    #[default]
    Truncate,

    /// Add to the end of the file
    Append,

    /// Fail with [`Error::AlreadyExists`] if the file exists
    CreateNew,
}

/// Write `data` to `path`, returning the number of bytes written.
#[instrument(skip(path, data), fields(path = %path.as_ref().display(), len = data.len()), err)]
pub fn write_file(path: impl AsRef<Path>, data: &[u8], mode: WriteMode) -> Result<usize> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(Error::EmptyName);
    }

    let mut options = OpenOptions::new();
    match mode {
        WriteMode::Truncate => options.write(true).create(true).truncate(true),
        WriteMode::Append => options.append(true).create(true),
        WriteMode::CreateNew => options.write(true).create_new(true),
    };

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(Error::AlreadyExists(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    file.write_all(data)?;
    file.flush()?;

    Ok(data.len())
}

/// Read the whole file at `path`.
///
/// Returns `None` for an empty file.
#[instrument(skip(path), fields(path = %path.as_ref().display()), err)]
pub fn read_file(path: impl AsRef<Path>) -> Result<Option<Vec<u8>>> {
    let mut file = File::open(path.as_ref())?;
    let mut accumulator = ByteAccumulator::new();
    let mut chunk = [0u8; CHUNK_SIZE];

    loop {
        let count = match file.read(&mut chunk) {
            Ok(0) => break,
            Ok(count) => count,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        accumulator.append(&chunk[..count])?;
    }

    Ok(accumulator.dump())
}

#[cfg(test)]
mod test {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::error::{Error, Result};
    use crate::fs::{read_file, write_file, WriteMode};

    #[test]
    fn write_modes() -> Result<()> {
        let root = TempDir::new()?;
        let path = root.path().join("Moneypenny.txt");

        assert_eq!(write_file(&path, b"secre", WriteMode::CreateNew)?, 5);
        assert_eq!(write_file(&path, b"tary\n", WriteMode::Append)?, 5);
        assert_eq!(fs::read(&path)?, b"secretary\n");

        assert!(matches!(
            write_file(&path, b"again", WriteMode::CreateNew),
            Err(Error::AlreadyExists(p)) if p == path
        ));

        write_file(&path, b"boss\n", WriteMode::Truncate)?;
        assert_eq!(fs::read(&path)?, b"boss\n");

        Ok(())
    }

    #[test]
    fn read_back_large_and_empty_files() -> Result<()> {
        let root = TempDir::new()?;

        let big: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let big_path = root.path().join("big.bin");
        fs::write(&big_path, &big)?;
        assert_eq!(read_file(&big_path)?, Some(big));

        let empty_path = root.path().join("empty.txt");
        fs::write(&empty_path, b"")?;
        assert_eq!(read_file(&empty_path)?, None);

        assert!(read_file(root.path().join("missing")).is_err());

        Ok(())
    }
}
