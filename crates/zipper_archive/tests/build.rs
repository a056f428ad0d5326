use miette::{IntoDiagnostic, Result};
use std::fs;
use std::io::{Read, Seek, Write};
use std::path::Path;
use tempfile::TempDir;
use tracing::{info, instrument};
use tracing_test::traced_test;
use walkdir::WalkDir;
use zipper_archive::{
    archive::{EntryKind, EntryOptions, SizeClass},
    compression::CompressionMethod,
    read::ZipArchive,
    session::ArchiveBuildSession,
    write::{ZipWriter, ZipWriterOptions},
};

fn populate(root: &Path) -> Result<()> {
    fs::create_dir_all(root.join("Up")).into_diagnostic()?;
    fs::create_dir_all(root.join("Down/Deeper")).into_diagnostic()?;
    fs::write(root.join("Bond.txt"), b"secret agent\n").into_diagnostic()?;
    fs::write(root.join("Up/M.txt"), b"top guy\n").into_diagnostic()?;
    fs::write(root.join("Down/Deeper/Q.tt"), vec![b'Q'; 50_000]).into_diagnostic()?;
    Ok(())
}

#[instrument(skip_all, fields(root = %root.display()))]
fn archive_tree(root: &Path, compression: CompressionMethod) -> Result<Vec<u8>> {
    let mut session = ArchiveBuildSession::new(ZipWriter::new(
        std::io::Cursor::new(Vec::new()),
        ZipWriterOptions::default(),
    ));
    session.set_compression(compression);

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.into_diagnostic()?;
        let name = entry
            .path()
            .strip_prefix(root)
            .into_diagnostic()?
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");
        info!("inserting {name}");

        if entry.file_type().is_dir() {
            session.add_directory(&name)?;
        } else {
            session.add_file_as(entry.path(), &name)?;
        }
    }

    Ok(session.finish()?.into_inner())
}

fn validate(root: &Path, data: Vec<u8>) -> Result<()> {
    let mut archive = ZipArchive::new(std::io::Cursor::new(data))?;

    let expected = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .collect::<Vec<_>>();
    assert_eq!(archive.len(), expected.len());

    for (index, entry) in expected.iter().enumerate() {
        let info = archive.entries().nth(index).cloned().ok_or(
            zipper_archive::error::Error::CustomError("missing entry".into()),
        )?;

        if entry.file_type().is_dir() {
            assert_eq!(info.kind(), EntryKind::Directory);
            assert!(info.name.ends_with('/'));
            continue;
        }

        let mut actual = Vec::new();
        archive
            .by_index(index)?
            .read_to_end(&mut actual)
            .into_diagnostic()?;
        assert_eq!(actual, fs::read(entry.path()).into_diagnostic()?);
    }

    Ok(())
}

#[traced_test]
#[test]
fn tree_round_trips_deflated() -> Result<()> {
    let root = TempDir::new().into_diagnostic()?;
    populate(root.path())?;

    let data = archive_tree(root.path(), CompressionMethod::Deflated)?;
    validate(root.path(), data)
}

#[traced_test]
#[test]
fn tree_round_trips_stored() -> Result<()> {
    let root = TempDir::new().into_diagnostic()?;
    populate(root.path())?;

    let data = archive_tree(root.path(), CompressionMethod::Stored)?;
    validate(root.path(), data)
}

#[test]
fn large_framing_reads_back() -> Result<()> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()), ZipWriterOptions::default());
    writer.start_entry(
        "Up/M.txt",
        EntryOptions::builder().size_class(SizeClass::Large).build(),
    )?;
    writer.write_all(b"top guy\n").into_diagnostic()?;
    writer.finish_entry()?;
    writer.start_entry("Bond.txt", EntryOptions::default())?;
    writer.write_all(b"secret agent\n").into_diagnostic()?;

    let mut cursor = writer.finish()?;
    cursor.rewind().into_diagnostic()?;

    let mut archive = ZipArchive::new(cursor)?;
    let mut content = String::new();
    archive
        .by_name("Up/M.txt")?
        .read_to_string(&mut content)
        .into_diagnostic()?;
    assert_eq!(content, "top guy\n");

    content.clear();
    archive
        .by_name("Bond.txt")?
        .read_to_string(&mut content)
        .into_diagnostic()?;
    assert_eq!(content, "secret agent\n");

    Ok(())
}

#[test]
fn many_entries_use_zip64_end_records() -> Result<()> {
    const COUNT: usize = 70_000;

    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()), ZipWriterOptions::default());
    for i in 0..COUNT {
        writer.start_entry(
            &format!("d{i}/"),
            EntryOptions::builder()
                .compression(CompressionMethod::Stored)
                .build(),
        )?;
        writer.finish_entry()?;
    }
    let data = writer.finish()?.into_inner();

    // ZIP64 end record and locator precede the saturated end record.
    let end = data.len() - 22;
    assert_eq!(&data[end..end + 4], b"PK\x05\x06");
    assert_eq!(&data[end + 8..end + 10], &[0xFFu8, 0xFF][..]);
    assert_eq!(&data[end - 20..end - 16], b"PK\x06\x07");

    let archive = ZipArchive::new(std::io::Cursor::new(data))?;
    assert_eq!(archive.len(), COUNT);
    assert_eq!(archive.file_names().last(), Some("d69999/"));

    Ok(())
}
