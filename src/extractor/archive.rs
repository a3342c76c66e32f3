//! Archive detection and unpacking (zip, tar, tar.gz, tar.bz2, tar.xz).

use crate::core::ExtractionError;
use crate::utils::fs::safe_join;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How an artifact is unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    /// Not an archive: the artifact itself is the file to place.
    Direct,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const RAR_MAGIC: &[u8] = b"Rar!";
const SEVEN_ZIP_MAGIC: &[u8] = &[b'7', b'z', 0xbc, 0xaf, 0x27, 0x1c];
const TAR_MAGIC_OFFSET: usize = 257;
const TAR_MAGIC: &[u8] = b"ustar";

/// Extensions that are always placed as-is, even when they are zip files
/// underneath (`.jar`).
const DIRECT_EXTENSIONS: &[&str] = &[".exe", ".jar", ".bat", ".sh", ".appimage"];
const UNSUPPORTED_EXTENSIONS: &[&str] = &[".rar", ".7z", ".7zip", ".dmg"];

impl ArchiveKind {
    /// Decide from the file name first, then from the leading bytes.
    pub fn detect(path: &Path) -> Result<Self, ExtractionError> {
        let name = path.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
        let unsupported = || ExtractionError::UnsupportedFormat {
            file: name.clone(),
        };

        if UNSUPPORTED_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            return Err(unsupported());
        }
        if DIRECT_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            return Ok(Self::Direct);
        }

        let mut head = Vec::with_capacity(TAR_MAGIC_OFFSET + TAR_MAGIC.len());
        File::open(path)
            .and_then(|f| f.take((TAR_MAGIC_OFFSET + TAR_MAGIC.len()) as u64).read_to_end(&mut head))
            .map_err(|e| ExtractionError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let kind = if head.starts_with(ZIP_MAGIC) || head.starts_with(ZIP_EMPTY_MAGIC) {
            Self::Zip
        } else if head.starts_with(GZIP_MAGIC) {
            Self::TarGz
        } else if head.starts_with(BZIP2_MAGIC) {
            Self::TarBz2
        } else if head.starts_with(XZ_MAGIC) {
            Self::TarXz
        } else if head.starts_with(RAR_MAGIC) || head.starts_with(SEVEN_ZIP_MAGIC) {
            return Err(unsupported());
        } else if head.get(TAR_MAGIC_OFFSET..).is_some_and(|m| m.starts_with(TAR_MAGIC)) {
            Self::Tar
        } else if Self::from_extension(&name).is_some() {
            return Err(ExtractionError::Corrupt {
                file: name,
                reason: "file content does not match its archive extension".to_string(),
            });
        } else {
            Self::Direct
        };
        Ok(kind)
    }

    fn from_extension(name: &str) -> Option<Self> {
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Unpack `archive` into `dest`, restoring Unix permission bits.
///
/// Entries that would land outside `dest` fail the whole unpack.
pub fn unpack(archive: &Path, kind: ArchiveKind, dest: &Path) -> Result<(), ExtractionError> {
    let file = File::open(archive).map_err(|e| io_error(archive, &e))?;
    let reader = BufReader::new(file);
    let file_name = archive.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    debug!("Unpacking {} ({:?})", file_name, kind);

    match kind {
        ArchiveKind::Zip => unpack_zip(reader, &file_name, dest),
        ArchiveKind::Tar => unpack_tar(reader, &file_name, dest),
        ArchiveKind::TarGz => unpack_tar(GzDecoder::new(reader), &file_name, dest),
        ArchiveKind::TarBz2 => unpack_tar(bzip2::read::BzDecoder::new(reader), &file_name, dest),
        ArchiveKind::TarXz => unpack_tar(xz2::read::XzDecoder::new(reader), &file_name, dest),
        ArchiveKind::Direct => {
            let target = dest.join(&file_name);
            std::fs::copy(archive, &target).map_err(|e| io_error(&target, &e))?;
            Ok(())
        }
    }
}

fn unpack_zip(reader: BufReader<File>, file_name: &str, dest: &Path) -> Result<(), ExtractionError> {
    let corrupt = |e: &dyn std::fmt::Display| ExtractionError::Corrupt {
        file: file_name.to_string(),
        reason: e.to_string(),
    };
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| corrupt(&e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| corrupt(&e))?;
        let target = entry_target(dest, entry.name())?;

        if entry.is_dir() {
            create_dir(&target)?;
            continue;
        }
        let mode = entry.unix_mode();
        write_entry(&mut entry, &target, mode)?;
    }
    Ok(())
}

fn unpack_tar<R: Read>(reader: R, file_name: &str, dest: &Path) -> Result<(), ExtractionError> {
    let corrupt = |e: &std::io::Error| ExtractionError::Corrupt {
        file: file_name.to_string(),
        reason: e.to_string(),
    };
    let mut archive = tar::Archive::new(reader);

    for entry in archive.entries().map_err(|e| corrupt(&e))? {
        let mut entry = entry.map_err(|e| corrupt(&e))?;
        let name = entry.path().map_err(|e| corrupt(&e))?.to_string_lossy().to_string();
        let target = entry_target(dest, &name)?;
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            create_dir(&target)?;
        } else if entry_type.is_file() {
            let mode = entry.header().mode().ok();
            write_entry(&mut entry, &target, mode)?;
        } else {
            debug!("Skipping non-regular entry '{}' in {}", name, file_name);
        }
    }
    Ok(())
}

fn entry_target(dest: &Path, name: &str) -> Result<PathBuf, ExtractionError> {
    safe_join(dest, Path::new(name)).ok_or_else(|| ExtractionError::UnsafePath {
        path: name.to_string(),
    })
}

fn create_dir(path: &Path) -> Result<(), ExtractionError> {
    std::fs::create_dir_all(path).map_err(|e| io_error(path, &e))
}

fn write_entry<R: Read>(
    reader: &mut R,
    target: &Path,
    mode: Option<u32>,
) -> Result<(), ExtractionError> {
    if let Some(parent) = target.parent() {
        create_dir(parent)?;
    }
    let mut out = File::create(target).map_err(|e| io_error(target, &e))?;
    std::io::copy(reader, &mut out).map_err(|e| io_error(target, &e))?;

    #[cfg(unix)]
    if let Some(mode) = mode.map(|m| m & 0o7777).filter(|m| *m != 0) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(target, std::fs::Permissions::from_mode(mode))
            .map_err(|e| io_error(target, &e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

fn io_error(path: &Path, error: &std::io::Error) -> ExtractionError {
    ExtractionError::Io {
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}

/// The directory holding the least-nested contents of an unpacked tree.
///
/// When every file sits under the same chain of directories (the usual
/// `tool-1.2/…` wrapper), that chain is skipped. A tree with a single file is
/// left as is.
#[must_use]
pub fn least_nested_root(dir: &Path) -> PathBuf {
    let files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(dir).ok().map(Path::to_path_buf))
        .collect();
    if files.len() < 2 {
        return dir.to_path_buf();
    }

    let mut prefix: Vec<_> = files[0].parent().map(|p| p.components().collect()).unwrap_or_default();
    for file in &files[1..] {
        let parent: Vec<_> = file.parent().map(|p| p.components().collect()).unwrap_or_default();
        let common = prefix.iter().zip(&parent).take_while(|(a, b)| a == b).count();
        prefix.truncate(common);
        if prefix.is_empty() {
            break;
        }
    }

    let mut root = dir.to_path_buf();
    root.extend(prefix);
    root
}
