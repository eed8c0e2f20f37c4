// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Deferred module handles (dynamic require)

use crate::error::{ModuleError, Result};
use crate::module_system::registry::{ModuleRegistry, RegistryInner};
use crate::value::Value;
use std::fmt;
use std::sync::{Arc, Weak};

/// A module reference resolved only when invoked.
///
/// The target may belong to a bundle that has not loaded yet; nothing is
/// checked until [`LazyModule::resolve`]. Handles hold a weak reference so
/// exports that keep one do not keep their registry alive.
#[derive(Clone)]
pub struct LazyModule {
    id: String,
    from: Option<Arc<str>>,
    registry: Weak<RegistryInner>,
}

impl LazyModule {
    pub(crate) fn new(registry: &ModuleRegistry, id: &str, from: Option<Arc<str>>) -> Self {
        Self {
            id: id.to_string(),
            from,
            registry: registry.downgrade(),
        }
    }

    /// Target module id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the target is registered right now
    pub fn is_ready(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|inner| ModuleRegistry::from_inner(inner).contains(&self.id))
    }

    /// Resolve the target
    pub fn resolve(&self) -> Result<Value> {
        let inner = self
            .registry
            .upgrade()
            .ok_or_else(|| ModuleError::RegistryDropped { id: self.id.clone() })?;
        ModuleRegistry::from_inner(inner).resolve_from(&self.id, self.from.as_deref())
    }
}

impl fmt::Debug for LazyModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyModule")
            .field("id", &self.id)
            .field("from", &self.from)
            .finish()
    }
}
