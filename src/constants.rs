// src/constants.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Centralized constants for s3fetch to avoid hardcoded values throughout the codebase

/// URL scheme handled by the download hook
pub const STORAGE_SCHEME: &str = "s3";

/// Canonical S3 service host used for path-style addressing
pub const S3_SERVICE_HOST: &str = "s3.amazonaws.com";

/// Suffix removed from virtual-hosted style hostnames (`bucket.s3.amazonaws.com`)
pub const S3_VIRTUAL_HOST_SUFFIX: &str = ".s3.amazonaws.com";

/// Key used when a URL names a bucket but no object (S3 keys cannot be empty)
pub const BUCKET_ROOT_KEY: &str = "/";

// ============================================================================
// Region resolution
// ============================================================================

/// Region used by the fixed fallback policy and as the bootstrap region for discovery
pub const DEFAULT_REGION: &str = "us-east-1";

/// Environment variable naming the default region
pub const ENV_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";

/// Environment variable naming the default profile
pub const ENV_DEFAULT_PROFILE: &str = "AWS_DEFAULT_PROFILE";

/// `fixed` (default) or `discover`
pub const ENV_MISSING_REGION_POLICY: &str = "S3FETCH_MISSING_REGION";

/// Overrides [`DEFAULT_REGION`] for the fixed fallback policy
pub const ENV_FALLBACK_REGION: &str = "S3FETCH_FALLBACK_REGION";

/// Location of the shared profile file, relative to the home directory
pub const PROFILE_FILE_RELATIVE_PATH: &str = ".aws/config";

/// Modern profile section prefix (`[profile name]`)
pub const PROFILE_SECTION_PREFIX: &str = "profile ";

/// Header S3 attaches to redirect responses naming the bucket's real region
pub const BUCKET_REGION_HEADER: &str = "x-amz-bucket-region";

// ============================================================================
// Configuration keys of the host bundle
// ============================================================================

/// Section of the host configuration file holding our settings
pub const HOST_CONFIG_SECTION: &str = "amazon-aws";

pub const KEY_REGION: &str = "region";
pub const KEY_PROFILE: &str = "profile";
pub const KEY_ACCESS_KEY: &str = "key";
pub const KEY_SECRET: &str = "secret";
pub const KEY_TOKEN: &str = "token";
pub const KEY_CREDENTIALS: &str = "credentials";
pub const KEY_ENDPOINT: &str = "endpoint";
pub const KEY_FORCE_PATH_STYLE: &str = "force_path_style";
/// Alias accepted for [`KEY_FORCE_PATH_STYLE`]
pub const KEY_USE_PATH_STYLE_ENDPOINT: &str = "use_path_style_endpoint";
pub const KEY_CA_BUNDLE: &str = "ca_bundle";
pub const KEY_CONNECT_TIMEOUT: &str = "connect_timeout";
pub const KEY_OPERATION_TIMEOUT: &str = "operation_timeout";

// ============================================================================
// Transport defaults
// ============================================================================

/// Default connect timeout (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default per-operation timeout (seconds); large archives need headroom
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 120;

/// Env override for [`DEFAULT_OPERATION_TIMEOUT_SECS`]
pub const ENV_OPERATION_TIMEOUT_SECS: &str = "S3FETCH_OPERATION_TIMEOUT_SECS";

/// Env override for the worker count of the background runtime
pub const ENV_RT_THREADS: &str = "S3FETCH_RT_THREADS";

/// Upper bound on background runtime workers; downloads are one call at a time
pub const MAX_RT_THREADS: usize = 8;

// ============================================================================
// Progress and advisory messages
// ============================================================================

pub const PROGRESS_CONNECTING: &str = "    Downloading: connection...";
pub const PROGRESS_DONE: &str = "    Downloading: 100%";

pub const MISSING_REGION_ADVISORY: &str = "WARN: no region configured for S3; \
    resolving bucket regions will take a couple of extra HTTP round-trips.";
