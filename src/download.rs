// src/download.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Single-object download: parse the URL, fetch through the cached client,
//! verify the result.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::client_factory::StorageClientFactory;
use crate::config::Overrides;
use crate::constants::{PROGRESS_CONNECTING, PROGRESS_DONE};
use crate::error::TransportError;
use crate::object_client::{GetObjectRequest, ObjectBody, Target};
use crate::progress::IoSink;
use crate::uri_utils::parse_storage_address;

/// What a successful download produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Body held in memory (no destination was given).
    Body(Bytes),
    /// Object written to `path`, `size` bytes on disk.
    Saved { path: PathBuf, size: u64 },
}

impl DownloadOutcome {
    pub fn into_body(self) -> Option<Bytes> {
        match self {
            DownloadOutcome::Body(body) => Some(body),
            DownloadOutcome::Saved { .. } => None,
        }
    }
}

/// Performs downloads with the host's storage settings.
pub struct Downloader {
    factory: Arc<StorageClientFactory>,
    overrides: Overrides,
    io: Arc<dyn IoSink>,
}

impl Downloader {
    pub fn new(factory: Arc<StorageClientFactory>, overrides: Overrides, io: Arc<dyn IoSink>) -> Self {
        Self { factory, overrides, io }
    }

    pub fn factory(&self) -> &Arc<StorageClientFactory> {
        &self.factory
    }

    /// Fetch `url` into `destination`, or into memory when `destination` is `None`.
    ///
    /// One blocking GET; no retries. A transfer the SDK reports as successful
    /// but which leaves `destination` missing or empty is an
    /// [`IncompleteTransfer`](crate::error::TransportErrorKind::IncompleteTransfer).
    pub fn download(
        &self,
        url: &str,
        progress: bool,
        destination: Option<&Path>,
    ) -> Result<DownloadOutcome, TransportError> {
        let address = parse_storage_address(url);
        debug!("GET {} -> bucket={} key={}", url, address.bucket, address.key);

        if progress {
            self.io.write(PROGRESS_CONNECTING, false);
        }

        let target = match destination {
            Some(path) => Target::File(path.to_path_buf()),
            None => Target::Memory,
        };
        let client = self.factory.get_client(&self.overrides)?;
        let body = client.get_object(GetObjectRequest::new(&address.bucket, &address.key, target))?;

        if progress {
            self.io.overwrite(PROGRESS_DONE);
        }

        match (destination, body) {
            (Some(path), _) => {
                let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                if size == 0 {
                    return Err(TransportError::incomplete_transfer(&address.key, url));
                }
                info!("downloaded {} ({} bytes) to {}", url, size, path.display());
                Ok(DownloadOutcome::Saved {
                    path: path.to_path_buf(),
                    size,
                })
            }
            (None, ObjectBody::Bytes(data)) => {
                info!("downloaded {} ({} bytes) into memory", url, data.len());
                Ok(DownloadOutcome::Body(data))
            }
            (None, ObjectBody::Saved { path, .. }) => {
                // Client ignored the memory target; read back what it wrote
                let data = fs::read(&path).map_err(TransportError::unclassified)?;
                Ok(DownloadOutcome::Body(Bytes::from(data)))
            }
        }
    }
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("factory", &self.factory)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}
