//! Central directory of one ZIP archive, opened over a range source.

use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;
use zip::ZipArchive;

use crate::error::{ArchiveError, Result};
use crate::range_reader::RangeReader;
use crate::source::RangeSource;

/// Parsed directory of an archive. Cloning is cheap; clones share the
/// parsed metadata.
#[derive(Clone)]
pub struct ZipIndex {
    name: String,
    archive: ZipArchive<RangeReader>,
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ArchiveError::Io(std::io::Error::other(e)))?
}

impl ZipIndex {
    /// Read the end-of-central-directory record and the central directory.
    pub async fn load(source: Arc<dyn RangeSource>) -> Result<Self> {
        let size = source.size().await?;
        let name = source.name().to_string();
        let reader = RangeReader::new(source, Handle::current(), size);

        run_blocking(move || {
            let archive =
                ZipArchive::new(reader).map_err(|e| ArchiveError::from_zip(&name, e))?;
            Ok(Self { name, archive })
        })
        .await
    }

    pub fn archive(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.archive.file_names()
    }

    /// Exact name lookup, falling back to the unique entry nested under a
    /// single top-level folder (`<folder>/<name>`).
    pub fn find(&self, name: &str) -> Option<&str> {
        if let Some(index) = self.archive.index_for_name(name) {
            return self.archive.name_for_index(index);
        }

        let suffix = format!("/{name}");
        let mut matches = self
            .names()
            .filter(|n| !n.ends_with('/') && n.ends_with(&suffix));
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    /// Inflate one entry by its exact name. The CRC is verified on read.
    pub async fn read(&self, entry: &str) -> Result<Bytes> {
        let mut archive = self.archive.clone();
        let entry = entry.to_string();
        let name = self.name.clone();

        run_blocking(move || {
            let mut file = archive
                .by_name(&entry)
                .map_err(|e| ArchiveError::from_zip(&name, e))?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| ArchiveError::from_io(&name, e))?;
            Ok(Bytes::from(data))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryRangeSource;
    use test_utils::zip_archive;

    async fn index(entries: &[(&str, &[u8])]) -> ZipIndex {
        let source = MemoryRangeSource::new("mem.zip", zip_archive(entries));
        ZipIndex::load(Arc::new(source)).await.unwrap()
    }

    #[tokio::test]
    async fn test_find_under_top_level_folder() {
        let index = index(&[("13101_chiyoda-ku/udx/bldg/a.gml", b"a")]).await;

        assert_eq!(index.find("udx/bldg/a.gml"), Some("13101_chiyoda-ku/udx/bldg/a.gml"));
        assert_eq!(index.find("13101_chiyoda-ku/udx/bldg/a.gml"), Some("13101_chiyoda-ku/udx/bldg/a.gml"));
        assert_eq!(index.find("udx/bldg/b.gml"), None);
    }

    #[tokio::test]
    async fn test_find_ambiguous_suffix() {
        let index = index(&[("x/udx/bldg/a.gml", b"1"), ("y/udx/bldg/a.gml", b"2")]).await;
        assert_eq!(index.len(), 2);
        assert_eq!(index.find("udx/bldg/a.gml"), None);
    }
}
