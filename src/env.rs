// src/env.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Environment lookup seam so resolution never reads process state directly.

use std::collections::HashMap;
use std::time::Duration;

use crate::constants::{
    DEFAULT_OPERATION_TIMEOUT_SECS, ENV_OPERATION_TIMEOUT_SECS, ENV_RT_THREADS, MAX_RT_THREADS,
};

/// Read-only view of environment variables.
pub trait EnvLookup: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;

    /// Like [`EnvLookup::var`] but treats an empty value as unset.
    fn non_empty(&self, name: &str) -> Option<String> {
        self.var(name).filter(|v| !v.is_empty())
    }
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of variables, for tests and embedding hosts.
#[derive(Debug, Default, Clone)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MapEnv(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl EnvLookup for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

/// Operation timeout for a single GET, with environment override
pub fn operation_timeout(env: &dyn EnvLookup) -> Duration {
    env.non_empty(ENV_OPERATION_TIMEOUT_SECS)
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS))
}

/// Worker count for the background runtime, with environment override
pub fn runtime_threads(env: &dyn EnvLookup) -> usize {
    env.non_empty(ENV_RT_THREADS)
        .and_then(|s| s.parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or_else(|| num_cpus::get().clamp(2, MAX_RT_THREADS))
}
