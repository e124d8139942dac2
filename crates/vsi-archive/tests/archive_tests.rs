//! Integration tests for reading entries out of ZIP archives.

use std::sync::Arc;

use reqwest::Client;
use test_utils::{bldg_entry_name, temp_test_dir, zip_archive, zip_archive_stored, TestServer};
use vsi_archive::{ArchiveError, ArchiveReader, MemoryRangeSource, VirtualPath, ZipIndex};

fn reader() -> ArchiveReader {
    ArchiveReader::with_client(Client::new())
}

async fn load(name: &str, data: Vec<u8>) -> vsi_archive::Result<ZipIndex> {
    ZipIndex::load(Arc::new(MemoryRangeSource::new(name, data))).await
}

// ============================================================================
// Index + extraction over in-memory archives
// ============================================================================

#[tokio::test]
async fn test_index_and_read_deflated_entry() {
    let body = "<core:CityModel/>".repeat(200);
    let data = zip_archive(&[
        ("udx/bldg/53394611_bldg_6697_op.gml", body.as_bytes()),
        ("udx/bldg/53394612_bldg_6697_op.gml", b"second"),
    ]);
    assert!(data.len() < body.len());

    let index = load("mem.zip", data).await.unwrap();
    assert_eq!(index.len(), 2);

    let entry = index.find("udx/bldg/53394611_bldg_6697_op.gml").unwrap();
    let bytes = index.read(entry).await.unwrap();
    assert_eq!(&bytes[..], body.as_bytes());
}

#[tokio::test]
async fn test_read_stored_entry() {
    let index = load("stored.zip", zip_archive_stored(&[("a.txt", b"plain bytes")]))
        .await
        .unwrap();
    assert_eq!(&index.read("a.txt").await.unwrap()[..], b"plain bytes");
}

#[tokio::test]
async fn test_corrupted_entry_fails_checksum() {
    let mut data = zip_archive_stored(&[("a.txt", b"plain bytes")]);
    let pos = data
        .windows(11)
        .position(|w| w == b"plain bytes")
        .unwrap();
    data[pos] ^= 0xff;

    let index = load("bad.zip", data).await.unwrap();
    let err = index.read("a.txt").await.unwrap_err();
    assert!(matches!(err, ArchiveError::Malformed { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_not_a_zip() {
    let err = load("junk.zip", vec![0u8; 100]).await.err().unwrap();
    assert!(matches!(err, ArchiveError::Malformed { .. }), "got {err:?}");
}

// ============================================================================
// ArchiveReader over local files
// ============================================================================

#[tokio::test]
async fn test_local_archive_missing_entry_is_none() {
    let dir = temp_test_dir();
    let path = dir.path().join("13101_chiyoda-ku_2023_citygml.zip");
    let entry = bldg_entry_name("53394611");
    std::fs::write(&path, zip_archive(&[(entry.as_str(), b"<x/>")])).unwrap();

    let reader = reader();
    let present = VirtualPath::local(&path, &entry).unwrap();
    let absent = VirtualPath::local(&path, bldg_entry_name("53394612")).unwrap();

    assert_eq!(&reader.read_entry(&present).await.unwrap().unwrap()[..], b"<x/>");
    assert!(reader.read_entry(&absent).await.unwrap().is_none());
    assert_eq!(reader.cached_archives(), 1);
}

#[tokio::test]
async fn test_local_archive_with_top_level_folder() {
    let dir = temp_test_dir();
    let path = dir.path().join("wrapped.zip");
    let nested = format!("13101_chiyoda-ku/{}", bldg_entry_name("53394611"));
    std::fs::write(&path, zip_archive(&[(nested.as_str(), b"nested")])).unwrap();

    let vpath = VirtualPath::local(&path, bldg_entry_name("53394611")).unwrap();
    let data = reader().read_entry(&vpath).await.unwrap().unwrap();
    assert_eq!(&data[..], b"nested");
}

#[tokio::test]
async fn test_missing_local_archive_is_error() {
    let vpath = VirtualPath::local("/nonexistent/archive.zip", "a.gml").unwrap();
    assert!(matches!(
        reader().read_entry(&vpath).await,
        Err(ArchiveError::Io(_))
    ));
}

// ============================================================================
// ArchiveReader over HTTP range requests
// ============================================================================

#[tokio::test]
async fn test_remote_archive_reads_by_range() {
    let server = TestServer::start().await;
    let entry = bldg_entry_name("53394611");
    let filler = vec![b'x'; 256 * 1024];
    server.add_archive(
        "city.zip",
        zip_archive_stored(&[(entry.as_str(), &b"<gml/>"[..]), ("udx/big.bin", &filler[..])]),
    );

    let path: VirtualPath = format!("/vsizip//vsicurl/{}/{}", server.archive_url("city.zip"), entry)
        .parse()
        .unwrap();

    let reader = reader();
    let data = reader.read_entry(&path).await.unwrap().unwrap();
    assert_eq!(&data[..], b"<gml/>");

    // Size probe, directory tail and entry; the filler is never fetched
    assert!(server.range_requests() <= 4, "{} requests", server.range_requests());

    // A second read reuses the cached directory
    let before = server.range_requests();
    reader.read_entry(&path).await.unwrap();
    assert!(server.range_requests() - before <= 1);
    assert_eq!(reader.cached_archives(), 1);
}

#[tokio::test]
async fn test_remote_archive_not_found() {
    let server = TestServer::start().await;
    let path = VirtualPath::remote(server.archive_url("missing.zip"), "a.gml").unwrap();

    let err = reader().read_entry(&path).await.unwrap_err();
    assert!(matches!(err, ArchiveError::Status { status: 404, .. }), "got {err:?}");
}
