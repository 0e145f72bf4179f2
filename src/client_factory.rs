// src/client_factory.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Build-once storage client per factory instance.
//!
//! The first `get_client` call resolves region/credentials and builds the
//! client; every later call returns that same handle and ignores the
//! overrides it is given. Construction is guarded by a `OnceCell`, so
//! concurrent first callers still build at most one client, and a failed
//! build leaves the factory empty for the next caller to retry.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::Overrides;
use crate::constants::MISSING_REGION_ADVISORY;
use crate::env::{EnvLookup, ProcessEnv};
use crate::error::ClientError;
use crate::object_client::StorageClientHandle;
use crate::profile::{HomeProfileLoader, ProfileFileLoader};
use crate::progress::IoSink;
use crate::region::{MissingRegionPolicy, RegionResolver, ResolvedRegionConfig};
use crate::s3_client::AwsClientBuilder;

/// Turns resolved settings into a client. Implemented by the SDK backend and by test doubles.
pub trait ClientBuilder: Send + Sync {
    fn build(&self, resolved: &ResolvedRegionConfig) -> Result<StorageClientHandle, ClientError>;
}

struct Built {
    handle: StorageClientHandle,
    overrides: Overrides,
    resolved: ResolvedRegionConfig,
}

pub struct StorageClientFactory {
    resolver: RegionResolver,
    builder: Box<dyn ClientBuilder>,
    io: Arc<dyn IoSink>,
    built: OnceCell<Built>,
}

impl StorageClientFactory {
    pub fn new(resolver: RegionResolver, builder: Box<dyn ClientBuilder>, io: Arc<dyn IoSink>) -> Self {
        Self {
            resolver,
            builder,
            io,
            built: OnceCell::new(),
        }
    }

    /// Factory wired to the process environment, `~/.aws/config` and the AWS
    /// SDK. The missing-region policy comes from the environment.
    pub fn from_environment(io: Arc<dyn IoSink>) -> Self {
        let env: Arc<dyn EnvLookup> = Arc::new(ProcessEnv);
        let profiles: Arc<dyn ProfileFileLoader> = Arc::new(HomeProfileLoader);
        let policy = MissingRegionPolicy::from_env(env.as_ref());
        Self::new(
            RegionResolver::new(env, profiles, policy),
            Box::new(AwsClientBuilder),
            io,
        )
    }

    /// Cached client, building it on first use from `overrides`.
    ///
    /// Overrides passed after the first successful call have no effect.
    pub fn get_client(&self, overrides: &Overrides) -> Result<StorageClientHandle, ClientError> {
        let built = self.built.get_or_try_init(|| self.build(overrides))?;
        if &built.overrides != overrides {
            debug!("storage client already built; ignoring changed overrides");
        }
        Ok(Arc::clone(&built.handle))
    }

    /// Resolution used for the cached client, once it exists.
    pub fn resolved(&self) -> Option<&ResolvedRegionConfig> {
        self.built.get().map(|built| &built.resolved)
    }

    pub fn resolver(&self) -> &RegionResolver {
        &self.resolver
    }

    fn build(&self, overrides: &Overrides) -> Result<Built, ClientError> {
        let resolved = self.resolver.resolve(overrides);

        if resolved.region.is_none() {
            warn!("no S3 region configured; bucket regions will be discovered per request");
            self.io.write(MISSING_REGION_ADVISORY, true);
        }

        let handle = self.builder.build(&resolved)?;
        Ok(Built {
            handle,
            overrides: overrides.clone(),
            resolved,
        })
    }
}

impl fmt::Debug for StorageClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageClientFactory")
            .field("resolver", &self.resolver)
            .field("built", &self.built.get().is_some())
            .finish_non_exhaustive()
    }
}
