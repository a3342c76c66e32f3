//! Archive fixtures.
//!
//! Each writer takes `(path inside archive, contents)` pairs and creates the
//! archive at `path`. Names ending in `/` become directory entries.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    let with_modes: Vec<_> = entries.iter().map(|(name, data)| (*name, *data, 0o644)).collect();
    write_zip_with_modes(path, &with_modes)
}

/// Zip with explicit Unix permission bits per entry.
pub fn write_zip_with_modes(path: &Path, entries: &[(&str, &[u8], u32)]) -> anyhow::Result<()> {
    let mut writer = zip::ZipWriter::new(File::create(path)?);
    for (name, data, mode) in entries {
        let options = SimpleFileOptions::default().unix_permissions(*mode);
        if name.ends_with('/') {
            writer.add_directory(*name, options)?;
        } else {
            writer.start_file(*name, options)?;
            writer.write_all(data)?;
        }
    }
    writer.finish()?;
    Ok(())
}

pub fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    let encoder = flate2::write::GzEncoder::new(File::create(path)?, flate2::Compression::default());
    let encoder = append_tar(encoder, entries)?;
    encoder.finish()?;
    Ok(())
}

pub fn write_tar_bz2(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    let encoder = bzip2::write::BzEncoder::new(File::create(path)?, bzip2::Compression::default());
    let encoder = append_tar(encoder, entries)?;
    encoder.finish()?;
    Ok(())
}

pub fn write_tar_xz(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    let encoder = xz2::write::XzEncoder::new(File::create(path)?, 6);
    let encoder = append_tar(encoder, entries)?;
    encoder.finish()?;
    Ok(())
}

fn append_tar<W: Write>(inner: W, entries: &[(&str, &[u8])]) -> anyhow::Result<W> {
    let mut builder = tar::Builder::new(inner);
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        if name.ends_with('/') {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
        } else {
            header.set_size(data.len() as u64);
            header.set_mode(if name.ends_with(".sh") { 0o755 } else { 0o644 });
        }
        header.set_cksum();
        builder.append_data(&mut header, name, *data)?;
    }
    Ok(builder.into_inner()?)
}
