//! Cached access to entries of virtual archive paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::archive::ZipIndex;
use crate::error::{ArchiveError, Result};
use crate::path::{ArchiveLocation, VirtualPath};
use crate::source::{FileRangeSource, HttpRangeSource, RangeSource};

type IndexCell = Arc<OnceCell<Arc<ZipIndex>>>;

/// Reads single entries out of local or remote ZIP archives.
///
/// The central directory of each archive is fetched once and shared by all
/// later reads through this reader, including concurrent ones. Drop the
/// reader to forget those directories.
pub struct ArchiveReader {
    client: Client,
    indexes: Mutex<HashMap<String, IndexCell>>,
}

impl ArchiveReader {
    /// Create a reader sharing an existing HTTP client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            indexes: Mutex::new(HashMap::new()),
        }
    }

    fn source(&self, location: &ArchiveLocation) -> Arc<dyn RangeSource> {
        match location {
            ArchiveLocation::Remote(url) => {
                Arc::new(HttpRangeSource::new(self.client.clone(), url.clone()))
            }
            ArchiveLocation::Local(path) => Arc::new(FileRangeSource::new(path.clone())),
        }
    }

    fn index_cell(&self, key: &str) -> IndexCell {
        let mut indexes = self
            .indexes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        indexes
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn index(&self, location: &ArchiveLocation) -> Result<Arc<ZipIndex>> {
        let cell = self.index_cell(&location.cache_key());
        let index = cell
            .get_or_try_init(|| async {
                let index = ZipIndex::load(self.source(location)).await?;
                info!(archive = %location, entries = index.len(), "Loaded archive index");
                Ok::<_, ArchiveError>(Arc::new(index))
            })
            .await?;
        Ok(index.clone())
    }

    /// Read one entry. `Ok(None)` when the archive has no such entry.
    #[instrument(skip(self, path), fields(path = %path))]
    pub async fn read_entry(&self, path: &VirtualPath) -> Result<Option<Bytes>> {
        let index = self.index(path.archive()).await?;

        let Some(entry) = index.find(path.entry()) else {
            debug!("Entry not present in archive");
            return Ok(None);
        };

        let data = index.read(entry).await?;
        debug!(entry = %entry, bytes = data.len(), "Read archive entry");
        Ok(Some(data))
    }

    /// Number of archives with a loaded index.
    pub fn cached_archives(&self) -> usize {
        let indexes = self
            .indexes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        indexes.values().filter(|cell| cell.initialized()).count()
    }
}
