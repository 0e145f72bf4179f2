// src/config.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Host configuration bundle (`amazon-aws` settings) and its JSON loading.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, HOST_CONFIG_SECTION, KEY_ACCESS_KEY, KEY_CONNECT_TIMEOUT,
    KEY_CREDENTIALS, KEY_FORCE_PATH_STYLE, KEY_OPERATION_TIMEOUT, KEY_SECRET, KEY_TOKEN,
};
use crate::env::{operation_timeout, EnvLookup};

/// Explicit key/secret pair, optionally with a session token.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub key: String,
    pub secret: String,
    pub token: Option<String>,
}

impl StaticCredentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

const REDACTED: &str = "** redacted **";

// Keep secrets out of logs
impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("key", &self.key)
            .field("secret", &REDACTED)
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration must be a JSON object")]
    NotAnObject,

    #[error("`credentials` must be an object with string `key` and `secret`")]
    BadCredentials,

    #[error("setting `{0}` must be a string, number or boolean")]
    NotScalar(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// User-supplied storage settings, as found in the host configuration.
///
/// Plain settings are strings; `credentials` is the only structured entry.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    settings: BTreeMap<String, String>,
    credentials: Option<StaticCredentials>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn with_credentials(mut self, credentials: StaticCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    /// Setting value; empty strings count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.settings
    }

    pub fn credentials(&self) -> Option<&StaticCredentials> {
        self.credentials.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty() && self.credentials.is_none()
    }

    /// Settings layered over the transport defaults; explicit values win.
    pub fn merged_with_defaults(&self, env: &dyn EnvLookup) -> BTreeMap<String, String> {
        let mut merged = default_settings(env);
        merged.extend(self.settings.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Build from a JSON object of settings.
    pub fn from_json_value(value: &Value) -> Result<Self, ConfigError> {
        let object = value.as_object().ok_or(ConfigError::NotAnObject)?;
        let mut overrides = Self::new();

        for (name, value) in object {
            if name == KEY_CREDENTIALS {
                overrides.credentials = Some(parse_credentials(value)?);
                continue;
            }
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => continue,
                _ => return Err(ConfigError::NotScalar(name.clone())),
            };
            overrides.settings.insert(name.clone(), text);
        }
        Ok(overrides)
    }

    /// Parse a JSON document. The bundle is taken from `config.amazon-aws`,
    /// then `amazon-aws`, then the document root.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(text)?;
        Self::from_json_value(select_section(&root))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overrides")
            .field("settings", &RedactedSettings(&self.settings))
            .field("credentials", &self.credentials)
            .finish()
    }
}

/// Debug view of a settings map with `secret` and `token` values masked.
pub(crate) struct RedactedSettings<'a>(pub(crate) &'a BTreeMap<String, String>);

impl fmt::Debug for RedactedSettings<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(key, value)| {
                let shown = match key.as_str() {
                    KEY_SECRET | KEY_TOKEN => REDACTED,
                    _ => value.as_str(),
                };
                (key, shown)
            }))
            .finish()
    }
}

fn select_section(root: &Value) -> &Value {
    root.get("config")
        .and_then(|config| config.get(HOST_CONFIG_SECTION))
        .or_else(|| root.get(HOST_CONFIG_SECTION))
        .unwrap_or(root)
}

fn parse_credentials(value: &Value) -> Result<StaticCredentials, ConfigError> {
    let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
    let (Some(key), Some(secret)) = (field(KEY_ACCESS_KEY), field(KEY_SECRET)) else {
        return Err(ConfigError::BadCredentials);
    };
    Ok(StaticCredentials {
        key,
        secret,
        token: field(KEY_TOKEN),
    })
}

/// Transport defaults every client starts from.
pub fn default_settings(env: &dyn EnvLookup) -> BTreeMap<String, String> {
    BTreeMap::from([
        (KEY_FORCE_PATH_STYLE.to_string(), "false".to_string()),
        (
            KEY_CONNECT_TIMEOUT.to_string(),
            DEFAULT_CONNECT_TIMEOUT_SECS.to_string(),
        ),
        (
            KEY_OPERATION_TIMEOUT.to_string(),
            operation_timeout(env).as_secs().to_string(),
        ),
    ])
}

/// Interpret common truthy spellings.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enable"
    )
}
