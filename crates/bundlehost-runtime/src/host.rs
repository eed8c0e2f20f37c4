// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module host
//!
//! A [`Host`] is the namespace independently loaded bundles register into.
//! Construct one explicitly where isolation matters (tests, embedders), or
//! use [`Host::global`] for the process-wide instance.

use crate::config::HostConfig;
use crate::error::Result;
use crate::manifest::BundleManifest;
use crate::module_system::{Bundle, BundleLoader, LazyModule, ModuleRegistry};
use crate::value::Value;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::OnceLock;

static GLOBAL: OnceLock<Host> = OnceLock::new();

/// A registry plus the bundles loaded into it
#[derive(Debug)]
pub struct Host {
    config: HostConfig,
    registry: ModuleRegistry,
    bundles: RwLock<Vec<String>>,
}

impl Host {
    /// Create a host with its own empty registry
    pub fn new(config: HostConfig) -> Self {
        let registry = ModuleRegistry::with_config(&config);
        Self {
            config,
            registry,
            bundles: RwLock::new(Vec::new()),
        }
    }

    /// The process-wide host, created on first use from the environment
    pub fn global() -> &'static Host {
        GLOBAL.get_or_init(|| {
            let config = HostConfig::from_env();
            tracing::debug!("Creating process-wide registry '{}'", config.namespace);
            Host::new(config)
        })
    }

    /// Install `host` as the process-wide host.
    ///
    /// Returns the host back if one was already installed.
    pub fn install_global(host: Host) -> std::result::Result<&'static Host, Host> {
        GLOBAL.set(host)?;
        Ok(Host::global())
    }

    /// Host configuration
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The shared registry
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Register a bundle's factories
    pub fn load_bundle(&self, bundle: Bundle) -> Result<BundleLoader> {
        let loader = BundleLoader::load(&self.registry, bundle)?;
        self.bundles.write().push(loader.name().to_string());
        Ok(loader)
    }

    /// Read a manifest file and register the bundle it describes
    pub fn load_manifest(&self, path: &Path) -> Result<BundleLoader> {
        let manifest = BundleManifest::from_path(path)?;
        tracing::debug!("Loading bundle manifest {}", path.display());
        self.load_bundle(manifest.into_bundle())
    }

    /// Resolve a module from application code
    pub fn require(&self, id: &str) -> Result<Value> {
        self.registry.resolve(id)
    }

    /// Deferred handle from application code
    pub fn dynamic_require(&self, id: &str) -> LazyModule {
        self.registry.resolve_lazy(id)
    }

    /// Names of loaded bundles, in load order
    pub fn bundles(&self) -> Vec<String> {
        self.bundles.read().clone()
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}
