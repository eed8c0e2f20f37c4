// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! JSON bundle manifests
//!
//! Describes a bundle declaratively so it can be loaded without compiled
//! factories:
//!
//! ```json
//! {
//!   "name": "dashboard",
//!   "modules": {
//!     "8f2c": {
//!       "exports": { "title": "Dashboard" },
//!       "requires": { "utils": "a1b2" },
//!       "lazy": { "chart": "c9d0" }
//!     }
//!   }
//! }
//! ```

use crate::error::{ModuleError, Result};
use crate::module_system::{Bundle, Factory, factory};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// A bundle file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Bundle name
    pub name: String,
    /// Module id -> module body, in file order
    #[serde(default)]
    pub modules: IndexMap<String, ModuleManifest>,
}

/// Declarative module body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleManifest {
    /// Literal exports
    pub exports: IndexMap<String, serde_json::Value>,
    /// Export name -> module id, required while the factory runs
    pub requires: IndexMap<String, String>,
    /// Export name -> module id, resolved when the export is first read
    pub lazy: IndexMap<String, String>,
    /// Replace the whole export value with this module's exports
    pub reexport: Option<String>,
    /// Fail with this message after writing exports
    pub throws: Option<String>,
}

impl BundleManifest {
    /// Read and validate a manifest file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parse and validate manifest text; `path` is used in errors
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let manifest: BundleManifest = serde_json::from_str(content)?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |reason: &str| ModuleError::InvalidManifest {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("bundle name is empty"));
        }
        if self.modules.keys().any(|id| id.is_empty()) {
            return Err(invalid("module id is empty"));
        }
        for module in self.modules.values() {
            let targets = module
                .requires
                .values()
                .chain(module.lazy.values())
                .chain(module.reexport.iter());
            for target in targets {
                if target.is_empty() {
                    return Err(invalid("module reference is empty"));
                }
            }
        }
        Ok(())
    }

    /// Build the bundle this manifest describes
    pub fn into_bundle(self) -> Bundle {
        let mut bundle = Bundle::new(self.name);
        for (id, module) in self.modules {
            bundle.push(id, module.into_factory());
        }
        bundle
    }
}

impl ModuleManifest {
    /// Compile into a factory
    pub fn into_factory(self) -> Factory {
        let body = Arc::new(self);
        factory(move |m| {
            for (name, value) in &body.exports {
                m.exports().set(name.clone(), Value::from_json(value));
            }

            for (name, id) in &body.requires {
                let value = m.require(id)?;
                m.exports().set(name.clone(), value);
            }

            for (name, id) in &body.lazy {
                let handle = m.dynamic_require(id);
                m.define(name.clone(), move || handle.resolve());
            }

            if let Some(id) = &body.reexport {
                let value = m.require(id)?;
                m.set_exports(value);
            }

            if let Some(message) = &body.throws {
                return Err(m.fail(message.clone()));
            }

            Ok(())
        })
    }
}
