pub mod create;
pub mod extract;
pub mod list;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Archive a directory into a ZIP file
    Create(create::CreateArgs),
    /// Extract a ZIP file into a directory
    Extract(extract::ExtractArgs),
    /// List the entries of a ZIP file
    List(list::ListArgs),
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Create(create) => create.handle(),
            Commands::Extract(extract) => extract.handle(),
            Commands::List(list) => list.handle(),
        }
    }
}
