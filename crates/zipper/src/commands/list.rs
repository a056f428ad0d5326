use clap::Args;
use miette::{Context, Result};
use owo_colors::{OwoColorize, Stream::Stdout};
use std::path::PathBuf;
use zipper_archive::{EntryKind, ZipArchive};

#[derive(Args)]
pub struct ListArgs {
    /// An input ZIP file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let zip = ZipArchive::open(&self.file).context(format!("path: {}", &self.file.display()))?;

        for entry in zip.entries() {
            match entry.kind() {
                EntryKind::Directory => println!(
                    "{:>12}  {}",
                    "-",
                    entry.name.if_supports_color(Stdout, |n| n.blue())
                ),
                EntryKind::File => println!(
                    "{:>12}  {}",
                    entry.uncompressed_size, entry.name
                ),
            }
        }

        if !zip.comment().is_empty() {
            println!("{}", String::from_utf8_lossy(zip.comment()).dimmed());
        }

        Ok(())
    }
}
