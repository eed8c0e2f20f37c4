// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Capabilities handed to a running factory

use crate::error::{BoxError, ModuleError, Result};
use crate::exports::Exports;
use crate::module_system::id::ModuleId;
use crate::module_system::lazy::LazyModule;
use crate::module_system::registry::ModuleRegistry;
use crate::value::Value;
use std::sync::Arc;

/// The scope a factory runs in.
///
/// Bundles the export table, the getter-defining helper, and the two
/// resolvers (`require` and `dynamic_require`) scoped to the bundle that
/// registered the factory.
pub struct ModuleScope<'a> {
    registry: &'a ModuleRegistry,
    id: ModuleId,
    bundle: Arc<str>,
    exports: Exports,
    replaced: Option<Value>,
}

impl<'a> ModuleScope<'a> {
    pub(crate) fn new(
        registry: &'a ModuleRegistry,
        id: ModuleId,
        bundle: Arc<str>,
        exports: Exports,
    ) -> Self {
        Self {
            registry,
            id,
            bundle,
            exports,
            replaced: None,
        }
    }

    /// Id of the module being produced
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Bundle that registered this factory
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    /// The export table other modules see, including during a cycle
    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    /// Export a getter unless `name` is already exported
    pub fn define<F>(&self, name: impl Into<String>, getter: F) -> bool
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        self.exports.define(name, getter)
    }

    /// Replace the module's whole export value
    pub fn set_exports(&mut self, value: Value) {
        self.registry.update_partial(&self.id, value.clone());
        self.replaced = Some(value);
    }

    /// Resolve another module synchronously
    pub fn require(&self, id: &str) -> Result<Value> {
        self.registry.resolve_from(id, Some(self.bundle()))
    }

    /// Deferred handle to another module, resolved when invoked
    pub fn dynamic_require(&self, id: &str) -> LazyModule {
        LazyModule::new(self.registry, id, Some(self.bundle.clone()))
    }

    /// Build the error a failing factory returns
    pub fn fail(&self, source: impl Into<BoxError>) -> ModuleError {
        ModuleError::FactoryExecution {
            module: self.id.clone(),
            bundle: self.bundle.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn into_exports(self) -> Value {
        self.replaced.unwrap_or(Value::Object(self.exports))
    }
}
