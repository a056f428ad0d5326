//! Recreating directory chains on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

use tracing::{instrument, trace};

use crate::error::Result;

/// Separator used to split paths handed to a [`DirectoryMaterializer`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PathSeparator(char);

impl PathSeparator {
    pub const fn new(separator: char) -> Self {
        Self(separator)
    }

    /// The separator of the platform this was built for
    pub const fn platform() -> Self {
        Self(MAIN_SEPARATOR)
    }

    pub const fn as_char(self) -> char {
        self.0
    }

    /// Whether paths may start with a drive prefix such as `C:`
    const fn has_drive_prefix(self) -> bool {
        self.0 == '\\'
    }
}

impl Default for PathSeparator {
    fn default() -> Self {
        Self::platform()
    }
}

/// Creates every missing directory along a path.
///
/// Paths are split on the configured separator and each prefix is created in turn, relative to
/// the materializer's root. Prefixes that already exist are left alone.
#[derive(Debug, Clone, Default)]
pub struct DirectoryMaterializer {
    separator: PathSeparator,
    root: PathBuf,
}

impl DirectoryMaterializer {
    /// Materializer resolving relative paths against the working directory
    pub fn new(separator: PathSeparator) -> Self {
        Self {
            separator,
            root: PathBuf::new(),
        }
    }

    /// Resolve relative paths against `root` instead of the working directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn separator(&self) -> PathSeparator {
        self.separator
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory chain leading to `path`.
    ///
    /// The last segment is only created when `path` ends with the separator, so a file path
    /// yields its parent chain. Empty segments are skipped. The first failure other than an
    /// already existing directory is returned; directories created before it stay in place.
    #[instrument(skip(self), err)]
    pub fn ensure_path(&self, path: &str) -> Result<()> {
        for prefix in self.prefixes(path) {
            self.create_one(prefix)?;
        }
        Ok(())
    }

    /// Every directory prefix of `path` that needs to exist, shortest first
    fn prefixes<'p>(&self, path: &'p str) -> Vec<&'p str> {
        let separator = self.separator.as_char();

        let skip_until = match path.find(':') {
            Some(index) if self.separator.has_drive_prefix() => Some(index + 1),
            _ => None,
        };

        let mut prefixes = Vec::new();
        let mut segment_start = 0;
        for (index, _) in path.match_indices(separator) {
            let empty = index == segment_start;
            segment_start = index + separator.len_utf8();

            if empty || skip_until.is_some_and(|end| index <= end) {
                continue;
            }
            prefixes.push(&path[..index]);
        }

        prefixes
    }

    fn create_one(&self, prefix: &str) -> io::Result<()> {
        let separator = self.separator.as_char();
        let relative = if self.root.as_os_str().is_empty() {
            prefix
        } else {
            prefix.trim_start_matches(separator)
        };

        let target = if separator == MAIN_SEPARATOR {
            self.root.join(relative)
        } else {
            self.root
                .join(relative.replace(separator, MAIN_SEPARATOR_STR))
        };

        match fs::create_dir(&target) {
            Ok(()) => {
                trace!(path = %target.display(), "created directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        }
    }
}
