// src/plugin.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Host integration: a pre-download hook that swaps in an S3 transport.
//!
//! The host asks every registered [`DownloadHook`] before fetching a remote
//! file. [`S3Plugin`] answers only for `s3://` URLs; anything else is left to
//! the host's current transport.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::client_factory::StorageClientFactory;
use crate::config::Overrides;
use crate::download::{DownloadOutcome, Downloader};
use crate::error::TransportError;
use crate::progress::IoSink;
use crate::uri_utils::is_storage_url;

/// Host-specific transport options, carried over when a transport is replaced.
pub type TransportOptions = BTreeMap<String, String>;

/// How the host fetches remote files.
pub trait Transport: Send + Sync {
    fn options(&self) -> &TransportOptions;

    /// Fetch `url` into memory.
    fn get_contents(&self, origin: &str, url: &str, progress: bool) -> Result<Bytes, TransportError>;

    /// Fetch `url` into `destination`.
    fn copy(&self, origin: &str, url: &str, destination: &Path, progress: bool) -> Result<(), TransportError>;
}

/// Callback fired before any remote download.
pub trait DownloadHook {
    /// A replacement transport for `url`, or `None` to leave `current` in place.
    fn on_before_download(&self, url: &str, current: &dyn Transport) -> Option<Box<dyn Transport>>;
}

/// Transport that serves every request from S3.
pub struct S3Transport {
    options: TransportOptions,
    downloader: Arc<Downloader>,
}

impl S3Transport {
    pub fn new(options: TransportOptions, downloader: Arc<Downloader>) -> Self {
        Self { options, downloader }
    }
}

impl Transport for S3Transport {
    fn options(&self) -> &TransportOptions {
        &self.options
    }

    fn get_contents(&self, _origin: &str, url: &str, progress: bool) -> Result<Bytes, TransportError> {
        match self.downloader.download(url, progress, None)? {
            DownloadOutcome::Body(body) => Ok(body),
            DownloadOutcome::Saved { path, .. } => Err(TransportError::unclassified(format!(
                "in-memory download of {url} was written to {} instead",
                path.display()
            ))),
        }
    }

    fn copy(&self, _origin: &str, url: &str, destination: &Path, progress: bool) -> Result<(), TransportError> {
        self.downloader.download(url, progress, Some(destination))?;
        Ok(())
    }
}

/// Pre-download hook for `s3://` URLs.
///
/// All transports it hands out share one [`Downloader`], so the storage
/// client is built once per plugin.
pub struct S3Plugin {
    downloader: Arc<Downloader>,
}

impl S3Plugin {
    pub fn new(downloader: Arc<Downloader>) -> Self {
        Self { downloader }
    }

    /// Plugin using the process environment, `~/.aws/config` and the AWS SDK.
    pub fn activate(overrides: Overrides, io: Arc<dyn IoSink>) -> Self {
        let factory = Arc::new(StorageClientFactory::from_environment(Arc::clone(&io)));
        Self::new(Arc::new(Downloader::new(factory, overrides, io)))
    }
}

impl DownloadHook for S3Plugin {
    fn on_before_download(&self, url: &str, current: &dyn Transport) -> Option<Box<dyn Transport>> {
        if !is_storage_url(url) {
            return None;
        }
        debug!("routing {} through the S3 transport", url);
        Some(Box::new(S3Transport::new(
            current.options().clone(),
            Arc::clone(&self.downloader),
        )))
    }
}
