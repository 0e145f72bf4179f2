// src/region.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Region and credential resolution.
//!
//! Sources are consulted in a fixed order and the first that yields a region
//! wins:
//!
//! 1. `region` in the host configuration
//! 2. `AWS_DEFAULT_REGION`
//! 3. the active profile's `region` in `~/.aws/config`, trying the
//!    `[profile <name>]` section before the legacy `[<name>]` one
//! 4. the [`MissingRegionPolicy`]
//!
//! The profile name comes from the configuration, else `AWS_DEFAULT_PROFILE`.
//! Neither environment variable ever overrides explicit configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{Overrides, RedactedSettings, StaticCredentials};
use crate::constants::{
    DEFAULT_REGION, ENV_DEFAULT_PROFILE, ENV_DEFAULT_REGION, ENV_FALLBACK_REGION,
    ENV_MISSING_REGION_POLICY, KEY_ACCESS_KEY, KEY_PROFILE, KEY_REGION, KEY_SECRET, KEY_TOKEN,
    PROFILE_SECTION_PREFIX,
};
use crate::env::EnvLookup;
use crate::profile::ProfileFileLoader;

/// What to do when no source names a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingRegionPolicy {
    /// Use this region.
    Fixed(String),
    /// Leave the region unset; the client discovers each bucket's region itself.
    Discover,
}

impl Default for MissingRegionPolicy {
    fn default() -> Self {
        MissingRegionPolicy::Fixed(DEFAULT_REGION.to_string())
    }
}

impl MissingRegionPolicy {
    /// Deployment-level choice from `S3FETCH_MISSING_REGION` (`fixed` | `discover`)
    /// and `S3FETCH_FALLBACK_REGION`.
    pub fn from_env(env: &dyn EnvLookup) -> Self {
        match env.non_empty(ENV_MISSING_REGION_POLICY).map(|v| v.to_lowercase()) {
            Some(ref v) if v == "discover" => MissingRegionPolicy::Discover,
            other => {
                if let Some(v) = other.filter(|v| v != "fixed") {
                    warn!("unknown {} value '{}', using fixed fallback", ENV_MISSING_REGION_POLICY, v);
                }
                let region = env
                    .non_empty(ENV_FALLBACK_REGION)
                    .unwrap_or_else(|| DEFAULT_REGION.to_string());
                MissingRegionPolicy::Fixed(region)
            }
        }
    }
}

/// Which step produced the region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSource {
    Configuration,
    Environment,
    /// Found in the named section of the profile file.
    ProfileFile(String),
    Fallback,
    /// No region; the client has to discover it.
    Unresolved,
}

impl fmt::Display for RegionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionSource::Configuration => f.write_str("configuration"),
            RegionSource::Environment => write!(f, "environment ({ENV_DEFAULT_REGION})"),
            RegionSource::ProfileFile(section) => write!(f, "profile file [{section}]"),
            RegionSource::Fallback => f.write_str("fallback"),
            RegionSource::Unresolved => f.write_str("unresolved"),
        }
    }
}

/// Outcome of resolution, fixed for the lifetime of the client built from it.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedRegionConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
    /// `None` defers to the SDK's ambient chain (env, profile, instance role).
    pub credentials: Option<StaticCredentials>,
    /// Every setting handed to the client builder, defaults included.
    pub raw_overrides: BTreeMap<String, String>,
    pub region_source: RegionSource,
}

impl fmt::Debug for ResolvedRegionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedRegionConfig")
            .field("region", &self.region)
            .field("profile", &self.profile)
            .field("credentials", &self.credentials)
            .field("raw_overrides", &RedactedSettings(&self.raw_overrides))
            .field("region_source", &self.region_source)
            .finish()
    }
}

/// Resolve region, profile and credentials from the layered sources.
///
/// `profiles` is only consulted when a profile is named and no earlier step
/// produced a region.
pub fn resolve(
    overrides: &Overrides,
    env: &dyn EnvLookup,
    profiles: &dyn ProfileFileLoader,
    policy: &MissingRegionPolicy,
) -> ResolvedRegionConfig {
    let mut raw_overrides = overrides.merged_with_defaults(env);

    let profile = overrides
        .get(KEY_PROFILE)
        .map(str::to_string)
        .or_else(|| env.non_empty(ENV_DEFAULT_PROFILE));
    if let Some(name) = &profile {
        raw_overrides
            .entry(KEY_PROFILE.to_string())
            .or_insert_with(|| name.clone());
    }

    let (region, region_source) = if let Some(region) = overrides.get(KEY_REGION) {
        (Some(region.to_string()), RegionSource::Configuration)
    } else if let Some(region) = env.non_empty(ENV_DEFAULT_REGION) {
        (Some(region), RegionSource::Environment)
    } else if let Some((section, region)) = profile
        .as_deref()
        .and_then(|name| region_from_profile_file(name, profiles))
    {
        (Some(region), RegionSource::ProfileFile(section))
    } else {
        match policy {
            MissingRegionPolicy::Fixed(region) => (Some(region.clone()), RegionSource::Fallback),
            MissingRegionPolicy::Discover => (None, RegionSource::Unresolved),
        }
    };

    if let Some(region) = &region {
        raw_overrides.insert(KEY_REGION.to_string(), region.clone());
    }
    debug!("resolved region {:?} from {}", region, region_source);

    ResolvedRegionConfig {
        region,
        profile,
        credentials: resolve_credentials(overrides),
        raw_overrides,
        region_source,
    }
}

fn region_from_profile_file(
    profile: &str,
    profiles: &dyn ProfileFileLoader,
) -> Option<(String, String)> {
    let file = profiles.load();
    let modern = format!("{PROFILE_SECTION_PREFIX}{profile}");

    [modern, profile.to_string()].into_iter().find_map(|section| {
        let region = file.get(&section, KEY_REGION).filter(|r| !r.is_empty())?;
        let region = region.to_string();
        Some((section, region))
    })
}

fn resolve_credentials(overrides: &Overrides) -> Option<StaticCredentials> {
    if let Some(credentials) = overrides.credentials() {
        return Some(credentials.clone());
    }
    match (overrides.get(KEY_ACCESS_KEY), overrides.get(KEY_SECRET)) {
        (Some(key), Some(secret)) => {
            let credentials = StaticCredentials::new(key, secret);
            Some(match overrides.get(KEY_TOKEN) {
                Some(token) => credentials.with_token(token),
                None => credentials,
            })
        }
        (None, Some(_)) => {
            warn!("`secret` configured without `key`; falling back to ambient credentials");
            None
        }
        _ => None,
    }
}

/// [`resolve`] with its collaborators bound once.
#[derive(Clone)]
pub struct RegionResolver {
    env: Arc<dyn EnvLookup>,
    profiles: Arc<dyn ProfileFileLoader>,
    policy: MissingRegionPolicy,
}

impl RegionResolver {
    pub fn new(
        env: Arc<dyn EnvLookup>,
        profiles: Arc<dyn ProfileFileLoader>,
        policy: MissingRegionPolicy,
    ) -> Self {
        Self { env, profiles, policy }
    }

    pub fn resolve(&self, overrides: &Overrides) -> ResolvedRegionConfig {
        resolve(overrides, self.env.as_ref(), self.profiles.as_ref(), &self.policy)
    }

    pub fn env(&self) -> &dyn EnvLookup {
        self.env.as_ref()
    }

    pub fn policy(&self) -> &MissingRegionPolicy {
        &self.policy
    }
}

impl fmt::Debug for RegionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionResolver")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;
    use crate::profile::LocalProfileFile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often the profile file is requested.
    struct CountingLoader {
        file: Arc<LocalProfileFile>,
        loads: AtomicUsize,
    }

    impl ProfileFileLoader for CountingLoader {
        fn load(&self) -> Arc<LocalProfileFile> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Arc::clone(&self.file)
        }
    }

    fn counting(file: LocalProfileFile) -> CountingLoader {
        CountingLoader {
            file: Arc::new(file),
            loads: AtomicUsize::new(0),
        }
    }

    fn fixed() -> MissingRegionPolicy {
        MissingRegionPolicy::default()
    }

    #[test]
    fn test_profile_file_untouched_without_profile() {
        let loader = counting(LocalProfileFile::new());
        let resolved = resolve(&Overrides::new(), &MapEnv::new(), &loader, &fixed());
        assert_eq!(resolved.region.as_deref(), Some("us-east-1"));
        assert_eq!(resolved.region_source, RegionSource::Fallback);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_profile_file_untouched_when_region_known() {
        let loader = counting(LocalProfileFile::new());
        let env = MapEnv::new().with(ENV_DEFAULT_REGION, "eu-west-3");
        let overrides = Overrides::new().with("profile", "p");
        let resolved = resolve(&overrides, &env, &loader, &fixed());
        assert_eq!(resolved.region.as_deref(), Some("eu-west-3"));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_env_profile_fills_raw_overrides() {
        let file = LocalProfileFile::new().with_section("profile ci", [("region", "ca-central-1")]);
        let env = MapEnv::new().with(ENV_DEFAULT_PROFILE, "ci");
        let resolved = resolve(&Overrides::new(), &env, &file, &fixed());
        assert_eq!(resolved.profile.as_deref(), Some("ci"));
        assert_eq!(resolved.raw_overrides.get("profile").map(String::as_str), Some("ci"));
        assert_eq!(resolved.raw_overrides.get("region").map(String::as_str), Some("ca-central-1"));
    }

    #[test]
    fn test_empty_profile_region_falls_through() {
        let file = LocalProfileFile::new()
            .with_section("profile p", [("output", "json")])
            .with_section("p", [("region", "us-west-2")]);
        let overrides = Overrides::new().with("profile", "p");
        let resolved = resolve(&overrides, &MapEnv::new(), &file, &fixed());
        assert_eq!(resolved.region.as_deref(), Some("us-west-2"));
        assert_eq!(resolved.region_source, RegionSource::ProfileFile("p".into()));
    }

    #[test]
    fn test_credentials_synthesis() {
        let overrides = Overrides::new().with("key", "AKIA").with("secret", "shh");
        let resolved = resolve(&overrides, &MapEnv::new(), &LocalProfileFile::new(), &fixed());
        assert_eq!(resolved.credentials, Some(StaticCredentials::new("AKIA", "shh")));

        let lone_secret = Overrides::new().with("secret", "shh");
        let resolved = resolve(&lone_secret, &MapEnv::new(), &LocalProfileFile::new(), &fixed());
        assert_eq!(resolved.credentials, None);
    }

    #[test]
    fn test_structured_credentials_win() {
        let explicit = StaticCredentials::new("STRUCT", "s").with_token("t");
        let overrides = Overrides::new()
            .with("key", "FLAT")
            .with("secret", "f")
            .with_credentials(explicit.clone());
        let resolved = resolve(&overrides, &MapEnv::new(), &LocalProfileFile::new(), &fixed());
        assert_eq!(resolved.credentials, Some(explicit));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let overrides = Overrides::new()
            .with("key", "AKIA")
            .with("secret", "TOPSECRET")
            .with("token", "SESSIONTOKEN");
        let resolved = resolve(&overrides, &MapEnv::new(), &LocalProfileFile::new(), &fixed());
        assert!(resolved.credentials.is_some());

        let shown = format!("{resolved:?}");
        assert!(!shown.contains("TOPSECRET"));
        assert!(!shown.contains("SESSIONTOKEN"));
        assert!(shown.contains("AKIA"));
    }

    #[test]
    fn test_policy_from_env() {
        assert_eq!(MissingRegionPolicy::from_env(&MapEnv::new()), fixed());
        let discover = MapEnv::new().with(ENV_MISSING_REGION_POLICY, "Discover");
        assert_eq!(MissingRegionPolicy::from_env(&discover), MissingRegionPolicy::Discover);
        let custom = MapEnv::new()
            .with(ENV_MISSING_REGION_POLICY, "fixed")
            .with(ENV_FALLBACK_REGION, "eu-north-1");
        assert_eq!(
            MissingRegionPolicy::from_env(&custom),
            MissingRegionPolicy::Fixed("eu-north-1".into())
        );
        let bogus = MapEnv::new().with(ENV_MISSING_REGION_POLICY, "guess");
        assert_eq!(MissingRegionPolicy::from_env(&bogus), fixed());
    }
}
