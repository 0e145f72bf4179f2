// src/lib.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Crate root and public re-exports.

//! Fetch `s3://` package archives on behalf of a dependency-manager host.
//!
//! ```no_run
//! use std::sync::Arc;
//! use s3fetch::{ConsoleIo, Overrides, S3Plugin};
//!
//! let overrides = Overrides::new().with("profile", "ci");
//! let plugin = S3Plugin::activate(overrides, Arc::new(ConsoleIo::new()));
//! # let _ = plugin;
//! ```

pub mod constants;
pub mod error;
pub mod env;
pub mod config;
pub mod profile;
pub mod region;
pub mod uri_utils;
pub mod progress;
pub mod object_client;
pub mod s3_client;
pub mod client_factory;
pub mod download;
pub mod plugin;

pub use crate::client_factory::{ClientBuilder, StorageClientFactory};
pub use crate::config::{ConfigError, Overrides, StaticCredentials};
pub use crate::download::{DownloadOutcome, Downloader};
pub use crate::env::{EnvLookup, MapEnv, ProcessEnv};
pub use crate::error::{ClientError, TransportError, TransportErrorKind};
pub use crate::object_client::{
    GetObjectRequest, ObjectBody, ObjectClient, StorageClientHandle, Target,
};
pub use crate::plugin::{DownloadHook, S3Plugin, S3Transport, Transport, TransportOptions};
pub use crate::profile::{
    HomeProfileLoader, LocalProfileFile, PathProfileLoader, ProfileFileLoader,
};
pub use crate::progress::{ConsoleIo, IoEvent, IoSink, NullIo, RecordingIo};
pub use crate::region::{
    resolve, MissingRegionPolicy, RegionResolver, RegionSource, ResolvedRegionConfig,
};
pub use crate::s3_client::AwsClientBuilder;
pub use crate::uri_utils::{is_storage_url, parse_storage_address, StorageAddress};
