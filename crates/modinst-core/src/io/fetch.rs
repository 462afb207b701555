//! Package fetching: materialize a module package into its install directory.
//!
//! Packages are archives, either downloaded over HTTP(S) or read from a
//! local path. Extraction happens in a staging directory next to the
//! destination, which is renamed into place only once the whole archive has
//! been unpacked, so a failed fetch never leaves a partial module behind.

use std::fs;
use std::path::{Path, PathBuf};

use semver::Version;
use thiserror::Error;

use super::extract::{ArchiveFormat, ExtractError, extract};

#[derive(Error, Debug)]
pub enum FetchError {
    #[cfg(feature = "network")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(
        "Unsupported package address {0:?}: expected an http(s) URL or a path to a .tar.gz, .tgz, .tar or .zip archive"
    )]
    UnsupportedAddress(String),

    #[error("Network support is disabled; cannot download {0}")]
    NetworkDisabled(String),
}

/// Materializes packages on disk.
pub trait PackageFetcher {
    /// Fetch `package_addr` and place its content at `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the package cannot be obtained or unpacked. On
    /// error `dest` is left untouched.
    fn fetch(
        &self,
        package_addr: &str,
        version: Option<&Version>,
        dest: &Path,
    ) -> Result<(), FetchError>;
}

impl<T: PackageFetcher + ?Sized> PackageFetcher for Box<T> {
    fn fetch(
        &self,
        package_addr: &str,
        version: Option<&Version>,
        dest: &Path,
    ) -> Result<(), FetchError> {
        (**self).fetch(package_addr, version, dest)
    }
}

/// Fetches `.tar.gz`, `.tgz`, `.tar` and `.zip` packages from HTTP(S) URLs
/// or local paths.
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    #[cfg(feature = "network")]
    client: reqwest::blocking::Client,
}

impl Default for ArchiveFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveFetcher {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "network")]
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Build a fetcher that identifies itself with `user_agent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    #[cfg(feature = "network")]
    pub fn with_user_agent(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    #[cfg(feature = "network")]
    fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let mut response = self.client.get(url).send()?.error_for_status()?;
        let mut file = fs::File::create(dest)?;
        let bytes = response.copy_to(&mut file)?;
        tracing::debug!(url, bytes, "downloaded package");
        Ok(())
    }

    #[cfg(not(feature = "network"))]
    fn download(&self, url: &str, _dest: &Path) -> Result<(), FetchError> {
        Err(FetchError::NetworkDisabled(url.to_string()))
    }
}

enum Location<'a> {
    Http(&'a str),
    File(PathBuf),
}

fn locate(package_addr: &str) -> Option<Location<'_>> {
    if package_addr.starts_with("http://") || package_addr.starts_with("https://") {
        return Some(Location::Http(package_addr));
    }
    if let Some(path) = package_addr.strip_prefix("file://") {
        return Some(Location::File(PathBuf::from(path)));
    }
    if package_addr.contains("://") || package_addr.contains("::") {
        return None;
    }
    Some(Location::File(PathBuf::from(package_addr)))
}

impl PackageFetcher for ArchiveFetcher {
    fn fetch(
        &self,
        package_addr: &str,
        _version: Option<&Version>,
        dest: &Path,
    ) -> Result<(), FetchError> {
        let unsupported = || FetchError::UnsupportedAddress(package_addr.to_string());
        let location = locate(package_addr).ok_or_else(unsupported)?;
        let format = ArchiveFormat::detect(package_addr).ok_or_else(unsupported)?;

        let staging_root = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(staging_root)?;
        let staging = tempfile::Builder::new()
            .prefix(".fetch-")
            .tempdir_in(staging_root)?;

        let archive_path = match location {
            Location::Http(url) => {
                let path = staging.path().join("package");
                self.download(url, &path)?;
                path
            }
            Location::File(path) => path,
        };

        let content = staging.path().join("content");
        let files = extract(format, &archive_path, &content)?;

        if dest.exists() {
            fs::remove_dir_all(dest)?;
        }
        fs::rename(&content, dest)?;

        tracing::debug!(package = package_addr, files, dest = %dest.display(), "unpacked package");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_fetch_local_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("vpc.tgz");
        fs::write(&archive, tar_gz(&[("module.toml", "")])).unwrap();

        let dest = dir.path().join("modules/vpc");
        ArchiveFetcher::new()
            .fetch(archive.to_str().unwrap(), None, &dest)
            .unwrap();

        assert!(dest.join("module.toml").is_file());
        // Staging directories are cleaned up
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("modules"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("vpc")]);
    }

    #[test]
    fn test_fetch_replaces_existing_dest() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("vpc.tar.gz");
        fs::write(&archive, tar_gz(&[("new.txt", "new")])).unwrap();

        let dest = dir.path().join("vpc");
        fs::create_dir_all(&dest).unwrap();
        File::create(dest.join("old.txt")).unwrap();

        ArchiveFetcher::new()
            .fetch(&format!("file://{}", archive.display()), None, &dest)
            .unwrap();

        assert!(dest.join("new.txt").exists());
        assert!(!dest.join("old.txt").exists());
    }

    #[cfg(feature = "network")]
    #[test]
    fn test_fetch_over_http() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/vpc-1.2.0.tar.gz")
            .with_status(200)
            .with_body(tar_gz(&[("module.toml", "")]))
            .create();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("vpc");
        let url = format!("{}/vpc-1.2.0.tar.gz", server.url());

        ArchiveFetcher::new()
            .fetch(&url, Some(&Version::new(1, 2, 0)), &dest)
            .unwrap();

        mock.assert();
        assert!(dest.join("module.toml").is_file());
    }

    #[cfg(feature = "network")]
    #[test]
    fn test_http_error_leaves_no_dest() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/missing.tar.gz")
            .with_status(404)
            .create();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("vpc");
        let err = ArchiveFetcher::new()
            .fetch(&format!("{}/missing.tar.gz", server.url()), None, &dest)
            .unwrap_err();

        assert!(matches!(err, FetchError::Http(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_unsupported_addresses() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("x");
        for addr in ["git::https://example.com/x.git", "s3://bucket/x.tgz", "./x.rar"] {
            let err = ArchiveFetcher::new().fetch(addr, None, &dest).unwrap_err();
            assert!(
                matches!(err, FetchError::UnsupportedAddress(_)),
                "{addr}: {err}"
            );
        }
    }
}
