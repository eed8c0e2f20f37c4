// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bundle loader - registers a bundle's factories with a registry

use crate::error::Result;
use crate::module_system::id::ModuleId;
use crate::module_system::lazy::LazyModule;
use crate::module_system::registry::{Factory, ModuleRegistry};
use crate::module_system::require::ModuleScope;
use crate::value::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// A named table of module factories, supplied to the loader in one piece
#[derive(Clone)]
pub struct Bundle {
    name: String,
    modules: Vec<(String, Factory)>,
}

impl Bundle {
    /// Create an empty bundle
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
        }
    }

    /// Add a module from a closure
    pub fn module<F>(self, id: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut ModuleScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.with_factory(id, Arc::new(body))
    }

    /// Add a module from an existing factory
    pub fn with_factory(mut self, id: impl Into<String>, factory: Factory) -> Self {
        self.push(id, factory);
        self
    }

    /// Append a module entry
    pub fn push(&mut self, id: impl Into<String>, factory: Factory) {
        self.modules.push((id.into(), factory));
    }

    /// Bundle name (diagnostics only)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entries, duplicates included
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the bundle declares no modules
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.modules.iter().map(|(id, _)| id.as_str()).collect();
        f.debug_struct("Bundle")
            .field("name", &self.name)
            .field("modules", &ids)
            .finish()
    }
}

/// A loaded bundle and its bundle-local resolvers
#[derive(Debug, Clone)]
pub struct BundleLoader {
    registry: ModuleRegistry,
    name: Arc<str>,
    modules: Vec<ModuleId>,
}

impl BundleLoader {
    /// Register every factory in `bundle` with `registry`.
    ///
    /// All ids are validated before anything is registered. Factories do not
    /// run here. Within one bundle a repeated id keeps its later entry.
    pub fn load(registry: &ModuleRegistry, bundle: Bundle) -> Result<Self> {
        let Bundle { name, modules } = bundle;

        let entries = modules
            .into_iter()
            .map(|(id, factory)| ModuleId::new(id).map(|id| (id, factory)))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for (id, factory) in entries {
            if seen.insert(id.clone()) {
                ids.push(id.clone());
            }
            registry.register(id, factory, &name);
        }

        tracing::debug!(
            "Loaded bundle '{}' ({} modules) into '{}'",
            name,
            ids.len(),
            registry.namespace()
        );

        Ok(Self {
            registry: registry.clone(),
            name: Arc::from(name),
            modules: ids,
        })
    }

    /// Bundle name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ids this bundle registered, in declaration order
    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    /// Registry the bundle was loaded into
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Resolve a module on behalf of this bundle
    pub fn require(&self, id: &str) -> Result<Value> {
        self.registry.resolve_from(id, Some(self.name()))
    }

    /// Deferred handle on behalf of this bundle
    pub fn dynamic_require(&self, id: &str) -> LazyModule {
        LazyModule::new(&self.registry, id, Some(self.name.clone()))
    }
}
