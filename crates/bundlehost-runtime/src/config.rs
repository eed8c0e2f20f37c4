// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::Result;

/// Default key the process-wide registry is published under
pub const DEFAULT_NAMESPACE: &str = "__bundlehost_modules__";

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "BUNDLEHOST_";

/// Default configuration file name
pub const CONFIG_FILE: &str = "bundlehost.conf";

/// Level at which a replaced factory is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateLog {
    /// Not reported
    Off,
    /// `tracing::debug!`
    #[default]
    Debug,
    /// `tracing::warn!`
    Warn,
}

impl DuplicateLog {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "off" | "none" | "false" => Some(Self::Off),
            "debug" => Some(Self::Debug),
            "warn" | "warning" => Some(Self::Warn),
            _ => None,
        }
    }
}

impl fmt::Display for DuplicateLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Debug => write!(f, "debug"),
            Self::Warn => write!(f, "warn"),
        }
    }
}

/// Configuration for a module host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Key the registry is published under
    pub namespace: String,

    /// How last-writer-wins overwrites are logged
    pub duplicate_log: DuplicateLog,

    /// Trace every cache hit
    pub trace_resolution: bool,

    /// Unrecognized keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            duplicate_log: DuplicateLog::default(),
            trace_resolution: false,
            extra: BTreeMap::new(),
        }
    }
}

impl HostConfig {
    /// Defaults overlaid with `bundlehost.conf` (if present in the working
    /// directory) and `BUNDLEHOST_*` environment variables.
    pub fn load() -> Result<Self> {
        let mut config = HostConfig::default();

        let local = Path::new(CONFIG_FILE);
        if local.exists() {
            config.merge_from_file(local)?;
        }

        config.load_from_env();
        Ok(config)
    }

    /// Defaults overlaid with an explicit file, then the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = HostConfig::default();
        config.merge_from_file(path)?;
        config.load_from_env();
        Ok(config)
    }

    /// Defaults overlaid with the environment only.
    pub fn from_env() -> Self {
        let mut config = HostConfig::default();
        config.load_from_env();
        config
    }

    /// Merge `key=value` lines from a file.
    pub fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.merge_from_str(&content);
        Ok(())
    }

    fn merge_from_str(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                self.set(key.trim(), value.trim());
            }
        }
    }

    fn load_from_env(&mut self) {
        self.merge_env(std::env::vars());
    }

    /// Merge `BUNDLEHOST_*` variables; `BUNDLEHOST_DUPLICATE_LOG` sets `duplicate-log`.
    pub fn merge_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                let config_key = config_key.to_lowercase().replace('_', "-");
                self.set(&config_key, &value);
            }
        }
    }

    /// Set a configuration value. Invalid values for known keys are ignored.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "namespace" => {
                if !value.is_empty() {
                    self.namespace = value.to_string();
                }
            }
            "duplicate-log" => match DuplicateLog::parse(value) {
                Some(level) => self.duplicate_log = level,
                None => tracing::warn!("Ignoring invalid duplicate-log value '{}'", value),
            },
            "trace-resolution" => self.trace_resolution = value == "true",
            _ => {
                self.extra
                    .insert(key.to_string(), serde_json::Value::String(value.to_string()));
            }
        }
    }

    /// Get a configuration value.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "namespace" => Some(self.namespace.clone()),
            "duplicate-log" => Some(self.duplicate_log.to_string()),
            "trace-resolution" => Some(self.trace_resolution.to_string()),
            _ => self.extra.get(key).and_then(|v| v.as_str().map(String::from)),
        }
    }
}
