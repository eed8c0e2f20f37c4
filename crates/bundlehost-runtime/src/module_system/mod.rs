// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module registration and resolution
//!
//! - [`ModuleRegistry`] - identity, laziness and memoization
//! - [`BundleLoader`] - bulk registration of a [`Bundle`]
//! - [`ModuleScope`] - what a running factory can reach (`exports`,
//!   `define`, `require`, `dynamic_require`)
//! - [`LazyModule`] - deferred handles for dynamic requires
//!
//! Circular requires return the in-progress module's export table as it is
//! at that moment, like CommonJS.

mod id;
mod lazy;
mod loader;
mod registry;
mod require;

pub use id::ModuleId;
pub use lazy::LazyModule;
pub use loader::{Bundle, BundleLoader};
pub use registry::{Factory, ModuleInfo, ModuleRegistry, ModuleStatus, factory};
pub use require::ModuleScope;
