use clap::Args;
use miette::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zipper_archive::session::{ArchiveExtractSession, ExtractOptions, ExtractProgress};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input ZIP file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Keep files that already exist in the target instead of replacing them
    #[arg(long, default_value_t = false)]
    no_clobber: bool,
}

struct LogProgress;

impl ExtractProgress for LogProgress {
    fn on_directory(&mut self, _name: &str, target: &Path) {
        debug!("created {}", target.display());
    }

    fn on_file(&mut self, _name: &str, size: u64, target: &Path) {
        debug!("wrote {} ({size} bytes)", target.display());
    }
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let mut session = ArchiveExtractSession::open(
            &self.file,
            ExtractOptions::builder().no_clobber(self.no_clobber).build(),
        )
        .context(format!("path: {}", &self.file.display()))?;

        let summary = session
            .extract_to(&self.directory, &mut LogProgress)
            .context(format!("extracting into {}", &self.directory.display()))?;

        info!(
            "extracted {} files ({} bytes) and {} directories",
            summary.files, summary.bytes, summary.directories
        );
        Ok(())
    }
}
