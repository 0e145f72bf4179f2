// Integration tests for the pre-download hook and the S3 transport.

mod common;

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use common::{offline_downloader, Behaviour, Probe};
use s3fetch::{
    DownloadHook, NullIo, S3Plugin, Transport, TransportError, TransportErrorKind,
    TransportOptions,
};

/// Stand-in for the host's own HTTP transport.
struct HostTransport {
    options: TransportOptions,
}

impl HostTransport {
    fn new() -> Self {
        let mut options = TransportOptions::new();
        options.insert("http.timeout".to_string(), "30".to_string());
        options.insert("ssl.verify_peer".to_string(), "true".to_string());
        Self { options }
    }
}

impl Transport for HostTransport {
    fn options(&self) -> &TransportOptions {
        &self.options
    }

    fn get_contents(&self, _origin: &str, _url: &str, _progress: bool) -> Result<Bytes, TransportError> {
        Ok(Bytes::from_static(b"from the host"))
    }

    fn copy(&self, _origin: &str, _url: &str, _destination: &Path, _progress: bool) -> Result<(), TransportError> {
        Ok(())
    }
}

fn plugin(behaviour: Behaviour) -> (S3Plugin, Probe) {
    let (downloader, probe) = offline_downloader(behaviour, Arc::new(NullIo));
    (S3Plugin::new(Arc::new(downloader)), probe)
}

#[test]
fn test_non_s3_urls_keep_current_transport() {
    let (plugin, probe) = plugin(Behaviour::ClaimSuccess);
    let host = HostTransport::new();

    for url in [
        "https://repo.example.com/packages.json",
        "http://example.com/s3://bucket/key",
        "file:///tmp/archive.zip",
        "git@github.com:acme/pkg.git",
        "",
    ] {
        assert!(plugin.on_before_download(url, &host).is_none(), "{url}");
    }
    assert_eq!(probe.build_count(), 0);
}

#[test]
fn test_s3_urls_get_replacement_transport() {
    let (plugin, _probe) = plugin(Behaviour::ClaimSuccess);
    let host = HostTransport::new();

    for url in [
        "s3://example.com",
        "s3://example.com/packages.json",
        "s3://example",
        "S3://example/pkg.zip",
    ] {
        let replacement = plugin.on_before_download(url, &host);
        let replacement = replacement.unwrap_or_else(|| panic!("no transport for {url}"));
        assert_eq!(replacement.options(), host.options());
    }
}

#[test]
fn test_replacement_serves_contents_from_s3() {
    let (plugin, probe) = plugin(Behaviour::Serve(Bytes::from_static(b"{\"packages\":[]}")));
    let host = HostTransport::new();
    let url = "s3://acme-repo/packages.json";

    let transport = plugin.on_before_download(url, &host).unwrap();
    let body = transport.get_contents("acme-repo", url, false).unwrap();

    assert_eq!(body, Bytes::from_static(b"{\"packages\":[]}"));
    assert_eq!(probe.client().requests()[0].key, "packages.json");
}

#[test]
fn test_replacement_copies_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("pkg.zip");
    let (plugin, _probe) = plugin(Behaviour::Serve(Bytes::from_static(b"zipdata")));
    let host = HostTransport::new();
    let url = "s3://acme-repo/dist/pkg.zip";

    let transport = plugin.on_before_download(url, &host).unwrap();
    transport.copy("acme-repo", url, &dest, false).unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"zipdata");
}

#[test]
fn test_copy_surfaces_incomplete_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("pkg.zip");
    let (plugin, _probe) = plugin(Behaviour::ClaimSuccess);
    let url = "s3://acme-repo/dist/pkg.zip";

    let transport = plugin.on_before_download(url, &HostTransport::new()).unwrap();
    let err = transport.copy("acme-repo", url, &dest, false).unwrap_err();
    assert_eq!(err.kind(), TransportErrorKind::IncompleteTransfer);
}

#[test]
fn test_transports_share_one_client() {
    let (plugin, probe) = plugin(Behaviour::Serve(Bytes::from_static(b"x")));
    let host = HostTransport::new();

    for url in ["s3://a/one.json", "s3://b/two.json"] {
        let transport = plugin.on_before_download(url, &host).unwrap();
        transport.get_contents("origin", url, false).unwrap();
    }
    assert_eq!(probe.build_count(), 1);
    assert_eq!(probe.client().requests().len(), 2);
}
