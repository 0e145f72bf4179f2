// src/profile.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Shared AWS profile file (`~/.aws/config`) support.
//!
//! Only what region resolution needs: sections and their flat `key = value`
//! settings. Nested sub-sections (indented lines under an empty value, as in
//! `s3 =\n  addressing_style = path`) are skipped. A missing file is an empty
//! mapping.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use tracing::{debug, warn};

use crate::constants::PROFILE_FILE_RELATIVE_PATH;

/// Parsed profile file: section name → settings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LocalProfileFile {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl LocalProfileFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by hosts and tests that already hold the settings in memory.
    pub fn with_section<K, V>(mut self, name: &str, settings: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let section = self.sections.entry(name.to_string()).or_default();
        section.extend(settings.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn section(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(name)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Parse INI text. Never fails; lines that don't parse are skipped.
    pub fn parse(text: &str) -> Self {
        let mut file = Self::new();
        let mut current: Option<String> = None;
        let mut in_nested = false;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            let indented = raw.starts_with([' ', '\t']);
            if in_nested && indented {
                continue;
            }
            in_nested = false;

            if let Some(inner) = line.strip_prefix('[') {
                match inner.strip_suffix(']') {
                    Some(name) => {
                        let name = name.trim().to_string();
                        file.sections.entry(name.clone()).or_default();
                        current = Some(name);
                    }
                    None => {
                        debug!("profile file line {}: unterminated section header", lineno + 1);
                        current = None;
                    }
                }
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                debug!("profile file line {}: not a key = value pair", lineno + 1);
                continue;
            };
            let Some(section) = current.as_ref() else {
                debug!("profile file line {}: setting outside any section", lineno + 1);
                continue;
            };

            let value = clean_value(value);
            if value.is_empty() {
                in_nested = true;
                continue;
            }
            file.sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_string(), value.to_string());
        }

        file
    }

    /// Read and parse `path`. Missing or unreadable files yield an empty mapping.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => {
                debug!("loaded profile file {}", path.display());
                Self::parse(&text)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no profile file at {}", path.display());
                Self::new()
            }
            Err(e) => {
                warn!("ignoring unreadable profile file {}: {}", path.display(), e);
                Self::new()
            }
        }
    }
}

/// Strip inline comments and surrounding quotes from a value.
fn clean_value(value: &str) -> &str {
    let mut value = value.trim();
    for marker in [" ;", " #", "\t;", "\t#"] {
        if let Some(pos) = value.find(marker) {
            value = value[..pos].trim_end();
        }
    }
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

// -----------------------------------------------------------------------------
// Loaders
// -----------------------------------------------------------------------------

/// Source of the profile file, consulted lazily by the region resolver.
pub trait ProfileFileLoader: Send + Sync {
    fn load(&self) -> Arc<LocalProfileFile>;
}

impl ProfileFileLoader for Arc<LocalProfileFile> {
    fn load(&self) -> Arc<LocalProfileFile> {
        Arc::clone(self)
    }
}

impl ProfileFileLoader for LocalProfileFile {
    fn load(&self) -> Arc<LocalProfileFile> {
        Arc::new(self.clone())
    }
}

/// `<home>/.aws/config`, or `None` if the home directory is unknown.
pub fn home_profile_path() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(PROFILE_FILE_RELATIVE_PATH))
}

static HOME_PROFILE_FILE: Lazy<Arc<LocalProfileFile>> = Lazy::new(|| match home_profile_path() {
    Some(path) => Arc::new(LocalProfileFile::load(&path)),
    None => {
        debug!("home directory unknown; no profile file");
        Arc::new(LocalProfileFile::new())
    }
});

/// The user's `~/.aws/config`, read at most once per process.
#[derive(Debug, Default, Clone, Copy)]
pub struct HomeProfileLoader;

impl ProfileFileLoader for HomeProfileLoader {
    fn load(&self) -> Arc<LocalProfileFile> {
        Arc::clone(&HOME_PROFILE_FILE)
    }
}

/// A profile file at an explicit path, read at most once per loader.
#[derive(Debug)]
pub struct PathProfileLoader {
    path: PathBuf,
    cache: OnceCell<Arc<LocalProfileFile>>,
}

impl PathProfileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }
}

impl ProfileFileLoader for PathProfileLoader {
    fn load(&self) -> Arc<LocalProfileFile> {
        Arc::clone(
            self.cache
                .get_or_init(|| Arc::new(LocalProfileFile::load(&self.path))),
        )
    }
}
