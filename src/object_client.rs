// src/object_client.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Narrow interface to the object-storage SDK: one GET, to memory or to a file.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::ClientError;

/// Where a GET should deliver the object body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Hand the body back in memory
    Memory,
    /// Stream the body into this file (created or truncated)
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetObjectRequest {
    pub bucket: String,
    pub key: String,
    pub target: Target,
}

impl GetObjectRequest {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, target: Target) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            target,
        }
    }
}

/// Result of a successful GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBody {
    Bytes(Bytes),
    /// Body was written to `path`; `bytes_written` is what the SDK reported.
    Saved { path: PathBuf, bytes_written: u64 },
}

/// A configured storage client.
///
/// Implementations block the calling thread for the duration of the request.
pub trait ObjectClient: Send + Sync + Debug {
    fn get_object(&self, request: GetObjectRequest) -> Result<ObjectBody, ClientError>;

    /// Region the client is bound to; `None` when it discovers regions per bucket.
    fn region(&self) -> Option<&str>;
}

/// Shared handle owned by the client factory.
pub type StorageClientHandle = Arc<dyn ObjectClient>;
