use clap::Args;
use miette::miette;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, io::BufWriter, path::PathBuf};
use tracing::info;
use walkdir::WalkDir;
use zipper_archive::{
    session::ArchiveBuildSession, write::ZipWriterOptions, CompressionMethod, ZipWriter,
};

#[derive(Args)]
pub struct CreateArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target ZIP file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Store file content without compressing it
    #[arg(long, default_value_t = false)]
    store: bool,

    /// Archive comment
    #[arg(long, default_value = "")]
    comment: String,
}

impl CreateArgs {
    pub fn handle(&self) -> Result<()> {
        info!("creating {}", &self.file.display());

        let entries = WalkDir::new(&self.directory)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .into_diagnostic()
            .context(format!("walking {}", &self.directory.display()))?;

        if entries.is_empty() {
            return Err(miette!("directory is empty"));
        }

        let out = if !self.overwrite {
            File::create_new(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        } else {
            File::create(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        };

        let mut session = ArchiveBuildSession::new(ZipWriter::new(
            BufWriter::new(out),
            ZipWriterOptions::builder()
                .comment(self.comment.clone())
                .build(),
        ));
        if self.store {
            session.set_compression(CompressionMethod::Stored);
        }

        for entry in entries {
            let relative = entry
                .path()
                .strip_prefix(&self.directory)
                .into_diagnostic()?;
            let name = relative
                .to_str()
                .ok_or(miette!("unable to convert {} to a string", relative.display()))?
                .replace(std::path::MAIN_SEPARATOR, "/");

            if entry.file_type().is_dir() {
                session
                    .add_directory(&name)
                    .context(format!("adding directory {name}"))?;
            } else {
                session
                    .add_file_as(entry.path(), &name)
                    .context(format!("adding {}", entry.path().display()))?;
            }
        }

        let count = session.len();
        session.finish().context("finalizing zip file")?;
        info!("wrote {count} entries");

        Ok(())
    }
}
