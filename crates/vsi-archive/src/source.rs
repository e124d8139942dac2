//! Byte-range sources backing archive reads.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::error::{ArchiveError, Result};

/// Random access to the bytes of one archive.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Human-readable name used in errors and logs.
    fn name(&self) -> &str;

    /// Total size in bytes.
    async fn size(&self) -> Result<u64>;

    /// Read exactly `len` bytes starting at `offset`.
    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes>;
}

fn check_range(name: &str, offset: u64, len: u64, size: u64) -> Result<()> {
    if offset.checked_add(len).map_or(true, |end| end > size) {
        return Err(ArchiveError::OutOfRange {
            archive: name.to_string(),
            offset,
            len,
            size,
        });
    }
    Ok(())
}

/// Archive served over HTTP, read with `Range` requests.
pub struct HttpRangeSource {
    client: Client,
    url: String,
    size: OnceCell<u64>,
}

impl HttpRangeSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            size: OnceCell::new(),
        }
    }

    async fn probe_size(&self) -> Result<u64> {
        let response = self
            .client
            .get(&self.url)
            .header(RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| ArchiveError::from_reqwest(&self.url, e))?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                let header = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        ArchiveError::malformed(&self.url, "206 response without Content-Range")
                    })?;
                parse_content_range_total(header).ok_or_else(|| {
                    ArchiveError::malformed(&self.url, format!("bad Content-Range '{header}'"))
                })
            }
            StatusCode::OK => response.content_length().ok_or_else(|| {
                ArchiveError::malformed(&self.url, "server reported no content length")
            }),
            status => Err(ArchiveError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl RangeSource for HttpRangeSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn size(&self) -> Result<u64> {
        self.size.get_or_try_init(|| self.probe_size()).await.copied()
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }

        let range = format!("bytes={}-{}", offset, offset + len - 1);
        debug!(range = %range, "Fetching byte range");

        let response = self
            .client
            .get(&self.url)
            .header(RANGE, range)
            .send()
            .await
            .map_err(|e| ArchiveError::from_reqwest(&self.url, e))?;

        let status = response.status();
        if status != StatusCode::PARTIAL_CONTENT && status != StatusCode::OK {
            return Err(ArchiveError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ArchiveError::from_reqwest(&self.url, e))?;

        if status == StatusCode::OK {
            // Server ignored the range and sent the whole object
            check_range(&self.url, offset, len, body.len() as u64)?;
            return Ok(body.slice(offset as usize..(offset + len) as usize));
        }

        if body.len() as u64 != len {
            return Err(ArchiveError::malformed(
                &self.url,
                format!("expected {} bytes, received {}", len, body.len()),
            ));
        }
        Ok(body)
    }
}

/// `bytes 0-0/12345` -> 12345
fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse().ok()
}

/// Archive on the local filesystem.
pub struct FileRangeSource {
    path: PathBuf,
    name: String,
}

impl FileRangeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }
}

#[async_trait]
impl RangeSource for FileRangeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn size(&self) -> Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes> {
        let size = self.size().await?;
        check_range(&self.name, offset, len, size)?;

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

/// In-memory archive bytes.
pub struct MemoryRangeSource {
    name: String,
    data: Bytes,
}

impl MemoryRangeSource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl RangeSource for MemoryRangeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes> {
        check_range(&self.name, offset, len, self.data.len() as u64)?;
        Ok(self.data.slice(offset as usize..(offset + len) as usize))
    }
}
