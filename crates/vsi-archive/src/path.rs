//! GDAL-style virtual archive paths.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ArchiveError, Result};

/// Prefix selecting "read a file inside a ZIP archive".
pub const VSIZIP_PREFIX: &str = "/vsizip/";

/// Prefix selecting "fetch over HTTP with range requests".
pub const VSICURL_PREFIX: &str = "/vsicurl/";

const ZIP_SEPARATOR: &str = ".zip/";

/// Where an archive lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArchiveLocation {
    /// Archive served over HTTP(S).
    Remote(String),
    /// Archive on the local filesystem.
    Local(PathBuf),
}

impl ArchiveLocation {
    /// Key identifying the archive for index caching.
    pub fn cache_key(&self) -> String {
        match self {
            ArchiveLocation::Remote(url) => url.clone(),
            ArchiveLocation::Local(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for ArchiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveLocation::Remote(url) => write!(f, "{VSICURL_PREFIX}{url}"),
            ArchiveLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Reference to one file inside an archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualPath {
    archive: ArchiveLocation,
    entry: String,
}

impl VirtualPath {
    pub fn new(archive: ArchiveLocation, entry: impl Into<String>) -> Result<Self> {
        let entry = entry.into().trim_start_matches('/').to_string();
        if entry.is_empty() {
            return Err(ArchiveError::invalid_path(
                archive.to_string(),
                "entry name is empty",
            ));
        }
        Ok(Self { archive, entry })
    }

    /// Entry inside an archive fetched over HTTP.
    pub fn remote(url: impl Into<String>, entry: impl Into<String>) -> Result<Self> {
        Self::new(ArchiveLocation::Remote(url.into()), entry)
    }

    /// Entry inside a local archive.
    pub fn local(path: impl Into<PathBuf>, entry: impl Into<String>) -> Result<Self> {
        Self::new(ArchiveLocation::Local(path.into()), entry)
    }

    pub fn archive(&self) -> &ArchiveLocation {
        &self.archive
    }

    /// Entry name relative to the archive root.
    pub fn entry(&self) -> &str {
        &self.entry
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{VSIZIP_PREFIX}{}/{}", self.archive, self.entry)
    }
}

impl FromStr for VirtualPath {
    type Err = ArchiveError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(VSIZIP_PREFIX)
            .ok_or_else(|| ArchiveError::invalid_path(s, "missing /vsizip/ prefix"))?;

        let (remote, rest) = match rest.strip_prefix(VSICURL_PREFIX) {
            Some(url) => (true, url),
            None => (false, rest),
        };

        let split = rest
            .to_ascii_lowercase()
            .find(ZIP_SEPARATOR)
            .ok_or_else(|| ArchiveError::invalid_path(s, "no .zip archive component"))?;
        let archive = &rest[..split + ZIP_SEPARATOR.len() - 1];
        let entry = &rest[split + ZIP_SEPARATOR.len()..];

        let location = if remote {
            ArchiveLocation::Remote(archive.to_string())
        } else {
            ArchiveLocation::Local(PathBuf::from(archive))
        };
        VirtualPath::new(location, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_display() {
        let path = VirtualPath::remote(
            "https://example.com/13100_tokyo.zip",
            "udx/bldg/53394611_bldg_6697_op.gml",
        )
        .unwrap();
        assert_eq!(
            path.to_string(),
            "/vsizip//vsicurl/https://example.com/13100_tokyo.zip/udx/bldg/53394611_bldg_6697_op.gml"
        );
    }

    #[test]
    fn test_parse_remote() {
        let path: VirtualPath =
            "/vsizip//vsicurl/https://example.com/a.zip/udx/bldg/53394611_bldg_6697_op.gml"
                .parse()
                .unwrap();
        assert_eq!(
            path.archive(),
            &ArchiveLocation::Remote("https://example.com/a.zip".into())
        );
        assert_eq!(path.entry(), "udx/bldg/53394611_bldg_6697_op.gml");
    }

    #[test]
    fn test_parse_local_round_trip() {
        let text = "/vsizip//tmp/data/a.zip/udx/bldg/x.gml";
        let path: VirtualPath = text.parse().unwrap();
        assert_eq!(path.archive(), &ArchiveLocation::Local("/tmp/data/a.zip".into()));
        assert_eq!(path.to_string(), text);
    }

    #[test]
    fn test_parse_errors() {
        assert!("/vsicurl/https://x/a.zip/b".parse::<VirtualPath>().is_err());
        assert!("/vsizip//tmp/a.tar/b".parse::<VirtualPath>().is_err());
        assert!("/vsizip//tmp/a.zip/".parse::<VirtualPath>().is_err());
    }
}
