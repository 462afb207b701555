//! Archive extraction module
//!
//! Handles tar.gz, tar and zip module packages.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path};

use thiserror::Error;
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Invalid path in archive: {0}")]
    UnsafePath(String),
}

/// Package archive formats understood by the fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Gzip-compressed tar archive (`.tar.gz` / `.tgz`).
    TarGz,
    /// Uncompressed tar archive (`.tar`).
    Tar,
    /// Zip archive (`.zip`).
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a file name or URL, ignoring any query string
    /// or fragment. Returns `None` for unknown extensions.
    pub fn detect(addr: &str) -> Option<Self> {
        let path = addr
            .split(['?', '#'])
            .next()
            .unwrap_or(addr)
            .to_lowercase();

        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if path.ends_with(".tar") {
            Some(Self::Tar)
        } else if path.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Extract `archive_path` into `dest_dir`, returning the number of files written.
///
/// # Errors
///
/// Returns an error if the archive cannot be read, is malformed, or contains
/// an entry that would land outside `dest_dir`.
pub fn extract(
    format: ArchiveFormat,
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<usize, ExtractError> {
    let file = File::open(archive_path)?;
    match format {
        ArchiveFormat::TarGz => {
            let gz_decoder = flate2::read::GzDecoder::new(BufReader::new(file));
            extract_tar(gz_decoder, dest_dir)
        }
        ArchiveFormat::Tar => extract_tar(BufReader::new(file), dest_dir),
        ArchiveFormat::Zip => extract_zip(file, dest_dir),
    }
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<usize, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    let mut count = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();

        // Reject Zip Slip style entries outright instead of silently skipping them
        if !is_contained(&entry_path) {
            return Err(ExtractError::UnsafePath(
                entry_path.display().to_string(),
            ));
        }

        if entry.header().entry_type().is_dir() {
            fs::create_dir_all(dest_dir.join(&entry_path))?;
            continue;
        }

        if entry.unpack_in(dest_dir)? {
            count += 1;
        }
    }

    Ok(count)
}

/// Extract a zip archive
fn extract_zip(file: File, dest_dir: &Path) -> Result<usize, ExtractError> {
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut count = 0;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            return Err(ExtractError::UnsafePath(file.name().to_string()));
        };

        let absolute_path = dest_dir.join(&relative_path);
        if file.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }

        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }

        count += 1;
    }

    Ok(count)
}

/// Whether `path` stays inside the directory it is joined onto.
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_detect_format() {
        assert_eq!(ArchiveFormat::detect("foo.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("foo.tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("archive.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(
            ArchiveFormat::detect("https://example.com/BAZ.ZIP?token=abc"),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(ArchiveFormat::detect("git::https://example.com/repo.git"), None);
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.tar.gz");

        let encoder = flate2::write::GzEncoder::new(
            File::create(&archive).unwrap(),
            flate2::Compression::default(),
        );
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in [("module.toml", ""), ("nested/main.conf", "x = 1")] {
            let body = body.as_bytes();
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();

        let dest = dir.path().join("out");
        let count = extract(ArchiveFormat::TarGz, &archive, &dest).unwrap();

        assert_eq!(count, 2);
        assert!(dest.join("module.toml").is_file());
        assert_eq!(fs::read_to_string(dest.join("nested/main.conf")).unwrap(), "x = 1");
    }

    #[test]
    fn test_extract_zip() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");

        let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("module.toml", options).unwrap();
        writer.write_all(b"").unwrap();
        writer.start_file("files/readme.txt", options).unwrap();
        writer.write_all(b"hello").unwrap();
        writer.finish().unwrap();

        let dest = dir.path().join("out");
        assert_eq!(extract(ArchiveFormat::Zip, &archive, &dest).unwrap(), 2);
        assert_eq!(fs::read_to_string(dest.join("files/readme.txt")).unwrap(), "hello");
    }

    #[test]
    fn test_tar_path_traversal_is_rejected() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("evil.tar");

        let mut builder = tar::Builder::new(File::create(&archive).unwrap());
        let mut header = tar::Header::new_old();
        let name = b"../evil.txt";
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_size(4);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, "evil".as_bytes()).unwrap();
        builder.into_inner().unwrap();

        let dest = dir.path().join("out");
        let err = extract(ArchiveFormat::Tar, &archive, &dest).unwrap_err();
        assert!(matches!(err, ExtractError::UnsafePath(_)));
        assert!(!dir.path().join("evil.txt").exists());
    }
}
