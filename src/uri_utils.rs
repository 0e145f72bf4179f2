// src/uri_utils.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Storage URL helpers: scheme detection and bucket/key extraction.
//!
//! Three addressing styles are accepted and no validation is performed:
//!
//! - `s3://bucket/path/to/key`
//! - `https://bucket.s3.amazonaws.com/path/to/key` (virtual-hosted)
//! - `https://s3.amazonaws.com/bucket/path/to/key` (path-style)
//!
//! Malformed input degrades to an odd address (e.g. an empty bucket) instead of an error.

use std::fmt;

use crate::constants::{BUCKET_ROOT_KEY, S3_SERVICE_HOST, S3_VIRTUAL_HOST_SUFFIX, STORAGE_SCHEME};

/// Bucket/key pair addressed by a storage URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageAddress {
    pub bucket: String,
    /// Never empty; `"/"` denotes the bucket root.
    pub key: String,
}

impl StorageAddress {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key == BUCKET_ROOT_KEY {
            write!(f, "s3://{}/", self.bucket)
        } else {
            write!(f, "s3://{}/{}", self.bucket, self.key)
        }
    }
}

/// Raw pieces of a URL, borrowed from the input.
#[derive(Debug, PartialEq, Eq)]
struct UrlParts<'a> {
    host: Option<&'a str>,
    path: &'a str,
}

/// Split `url` into host and path. Query, fragment, userinfo and port are dropped.
fn split_url(url: &str) -> UrlParts<'_> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let url = &url[..end];

    let Some(pos) = url.find("://") else {
        return UrlParts { host: None, path: url };
    };
    let rest = &url[pos + 3..];

    let (authority, path) = match rest.find('/') {
        Some(slash) => (&rest[..slash], &rest[slash..]),
        None => (rest, ""),
    };
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    UrlParts {
        host: Some(strip_port(host)),
        path,
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal, keep the brackets
        return host.find(']').map_or(host, |close| &host[..=close]);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Split a storage URL into its bucket and key.
///
/// # Examples
///
/// ```
/// use s3fetch::uri_utils::parse_storage_address;
///
/// let addr = parse_storage_address("s3://my-bucket/dist/pkg-1.0.zip");
/// assert_eq!(addr.bucket, "my-bucket");
/// assert_eq!(addr.key, "dist/pkg-1.0.zip");
///
/// let root = parse_storage_address("s3://my-bucket/");
/// assert_eq!(root.key, "/");
/// ```
pub fn parse_storage_address(url: &str) -> StorageAddress {
    let parts = split_url(url);
    let host = parts.host.unwrap_or("");

    // Drop the leading slash
    let mut path = parts.path.chars();
    path.next();
    let path = path.as_str();

    let mut segments: Vec<String> = if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').map(str::to_string).collect()
    };

    if host != S3_SERVICE_HOST {
        segments.insert(0, host.replace(S3_VIRTUAL_HOST_SUFFIX, ""));
    }

    let mut segments = segments.into_iter();
    let bucket = segments.next().unwrap_or_default();
    let mut key = segments.collect::<Vec<_>>().join("/");
    if key.is_empty() {
        key = BUCKET_ROOT_KEY.to_string();
    }

    StorageAddress { bucket, key }
}

/// Lower-cased scheme of `uri`, if it has one.
pub fn uri_scheme(uri: &str) -> Option<String> {
    uri.find("://").map(|pos| uri[..pos].to_lowercase())
}

/// True when `uri` uses the `s3://` scheme handled by this crate.
pub fn is_storage_url(uri: &str) -> bool {
    // Case-insensitive on purpose: `S3://bucket/key` is routed here too
    uri_scheme(uri).as_deref() == Some(STORAGE_SCHEME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(url: &str) -> (String, String) {
        let addr = parse_storage_address(url);
        (addr.bucket, addr.key)
    }

    #[test]
    fn test_bucket_root() {
        assert_eq!(pair("s3://my-bucket/"), ("my-bucket".into(), "/".into()));
        assert_eq!(pair("s3://my-bucket"), ("my-bucket".into(), "/".into()));
    }

    #[test]
    fn test_nested_key() {
        assert_eq!(
            pair("s3://my-bucket/vendor/acme/pkg-1.2.0.zip"),
            ("my-bucket".into(), "vendor/acme/pkg-1.2.0.zip".into())
        );
    }

    #[test]
    fn test_virtual_hosted_style() {
        assert_eq!(
            pair("https://my-bucket.s3.amazonaws.com/packages.json"),
            ("my-bucket".into(), "packages.json".into())
        );
        assert_eq!(
            pair("s3://my-bucket.s3.amazonaws.com/a/b"),
            ("my-bucket".into(), "a/b".into())
        );
    }

    #[test]
    fn test_path_style_on_service_host() {
        assert_eq!(
            pair("https://s3.amazonaws.com/my-bucket/a/b.zip"),
            ("my-bucket".into(), "a/b.zip".into())
        );
        // Service host alone names no bucket
        assert_eq!(pair("https://s3.amazonaws.com/"), ("".into(), "/".into()));
    }

    #[test]
    fn test_host_with_dots_is_the_bucket() {
        assert_eq!(pair("s3://example.com"), ("example.com".into(), "/".into()));
        assert_eq!(
            pair("s3://example.com/packages.json"),
            ("example.com".into(), "packages.json".into())
        );
    }

    #[test]
    fn test_port_userinfo_query_dropped() {
        assert_eq!(
            pair("https://user:pw@my-bucket.s3.amazonaws.com:443/k.zip?versionId=3#frag"),
            ("my-bucket".into(), "k.zip".into())
        );
    }

    #[test]
    fn test_empty_segments_preserved() {
        assert_eq!(pair("s3://b/a//c"), ("b".into(), "a//c".into()));
        assert_eq!(pair("s3://b/dir/"), ("b".into(), "dir/".into()));
    }

    #[test]
    fn test_malformed_input_degrades() {
        // No scheme: no host, path loses its first character
        assert_eq!(pair("not-a-url"), ("".into(), "ot-a-url".into()));
        assert_eq!(pair(""), ("".into(), "/".into()));
        assert_eq!(pair("s3://"), ("".into(), "/".into()));
    }

    #[test]
    fn test_ipv6_host() {
        assert_eq!(pair("s3://[::1]:9000/k"), ("[::1]".into(), "k".into()));
    }

    #[test]
    fn test_display() {
        assert_eq!(StorageAddress::new("b", "/").to_string(), "s3://b/");
        assert_eq!(StorageAddress::new("b", "x/y").to_string(), "s3://b/x/y");
    }

    #[test]
    fn test_scheme_detection() {
        assert_eq!(uri_scheme("s3://bucket/").as_deref(), Some("s3"));
        assert_eq!(uri_scheme("S3://bucket/").as_deref(), Some("s3"));
        assert_eq!(uri_scheme("https://example.com").as_deref(), Some("https"));
        assert_eq!(uri_scheme("example.com"), None);

        assert!(is_storage_url("s3://example"));
        assert!(is_storage_url("S3://example/pkg.zip"));
        assert!(!is_storage_url("https://example.com/packages.json"));
        assert!(!is_storage_url("s3:/missing-slash"));
    }
}
