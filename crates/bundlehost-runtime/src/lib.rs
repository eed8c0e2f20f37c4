// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # bundlehost-runtime
//!
//! The module registration and resolution runtime that ships inside
//! self-registering bundles.
//!
//! Each bundle registers its module factories under opaque ids into one
//! shared registry. Modules are instantiated lazily on first `require`,
//! memoized, and may depend on modules from bundles loaded earlier or, through
//! `dynamic_require`, later.
//!
//! - Lazy, at-most-once factory execution
//! - Circular requires observe partially populated exports
//! - Last-writer-wins registration until first resolution
//! - Failed factories stay unresolved and can be retried
//! - JSON bundle manifests for loading bundles without compiled factories
//!
//! ## Quick Start
//!
//! ```rust
//! use bundlehost_runtime::{Bundle, Host, Value};
//!
//! let host = Host::default();
//!
//! host.load_bundle(Bundle::new("vendor").module("a1b2", |m| {
//!     m.exports().set("clamp", Value::function("clamp", |args| {
//!         let n = args.first().and_then(Value::as_number).unwrap_or(0.0);
//!         Ok(Value::Number(n.clamp(0.0, 1.0)))
//!     }));
//!     Ok(())
//! }))?;
//!
//! host.load_bundle(Bundle::new("dashboard").module("page", |m| {
//!     let utils = m.require("a1b2")?;
//!     m.exports().set("opacity", utils.get("clamp")?.call(&[Value::Number(3.0)])?);
//!     Ok(())
//! }))?;
//!
//! let page = host.require("page")?;
//! assert_eq!(page.get("opacity")?, Value::Number(1.0));
//! # Ok::<(), bundlehost_runtime::ModuleError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod exports;
pub mod host;
pub mod manifest;
pub mod module_system;
pub mod value;

// Re-exports
pub use config::{DuplicateLog, HostConfig};
pub use error::{ModuleError, Result};
pub use exports::Exports;
pub use host::Host;
pub use manifest::{BundleManifest, ModuleManifest};
pub use module_system::{
    Bundle, BundleLoader, Factory, LazyModule, ModuleId, ModuleInfo, ModuleRegistry, ModuleScope,
    ModuleStatus, factory,
};
pub use value::{NativeFunction, Value};

/// Version of the runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
