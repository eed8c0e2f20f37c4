// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module runtime

use crate::module_system::ModuleId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for module runtime operations
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Boxed error carried by a failing factory
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while registering or resolving modules
#[derive(Debug, Error)]
pub enum ModuleError {
    /// No factory registered for the id at call time
    #[error("Cannot find module '{id}'{}", origin_suffix(.from))]
    UnknownModule {
        /// Requested module id
        id: String,
        /// Bundle whose code issued the request, if known
        from: Option<String>,
    },

    /// A factory body failed while producing its exports
    #[error("Module '{module}' from bundle '{bundle}' threw: {source}")]
    FactoryExecution {
        /// Module whose factory failed
        module: ModuleId,
        /// Bundle that registered the factory
        bundle: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// Registration attempted with an empty identifier
    #[error("Module identifier must not be empty")]
    EmptyModuleId,

    /// A deferred handle outlived its registry
    #[error("Registry for deferred module '{id}' has been dropped")]
    RegistryDropped {
        /// Module the handle pointed at
        id: String,
    },

    /// Type error (calling a non-function, bad arguments)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Bundle manifest is structurally invalid
    #[error("Invalid bundle manifest {}: {reason}", .path.display())]
    InvalidManifest {
        /// Manifest file
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModuleError {
    /// Create an unknown module error
    pub fn unknown_module(id: impl Into<String>, from: Option<&str>) -> Self {
        Self::UnknownModule {
            id: id.into(),
            from: from.map(str::to_string),
        }
    }

    /// Create a new TypeError
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Returns true if this is an [`ModuleError::UnknownModule`]
    pub fn is_unknown_module(&self) -> bool {
        matches!(self, Self::UnknownModule { .. })
    }

    /// Returns true if this is a [`ModuleError::FactoryExecution`]
    pub fn is_factory_failure(&self) -> bool {
        matches!(self, Self::FactoryExecution { .. })
    }
}

fn origin_suffix(from: &Option<String>) -> String {
    match from {
        Some(bundle) => format!(" (required from bundle '{}')", bundle),
        None => String::new(),
    }
}
