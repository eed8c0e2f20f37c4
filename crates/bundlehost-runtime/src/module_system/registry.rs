// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Process-wide module registry
//!
//! Maps a [`ModuleId`] to either a pending factory or the exports that
//! factory produced. Factories run lazily, at most once per successful
//! resolution, and a failed factory leaves its record unresolved so a later
//! call can retry.

use crate::config::{DuplicateLog, HostConfig};
use crate::error::{ModuleError, Result};
use crate::exports::Exports;
use crate::module_system::id::ModuleId;
use crate::module_system::lazy::LazyModule;
use crate::module_system::require::ModuleScope;
use crate::value::Value;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::ReentrantMutex;
use std::fmt;
use std::sync::Arc;

/// A compiled module body.
///
/// The factory writes its public surface into the scope's export table and
/// may pull in other modules through the scope's `require`.
pub type Factory = Arc<dyn Fn(&mut ModuleScope<'_>) -> Result<()> + Send + Sync>;

/// Wrap a closure as a [`Factory`]
pub fn factory<F>(body: F) -> Factory
where
    F: Fn(&mut ModuleScope<'_>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(body)
}

/// A factory together with the bundle that registered it
#[derive(Clone)]
struct PendingModule {
    factory: Factory,
    bundle: Arc<str>,
}

impl PendingModule {
    fn same_factory(&self, other: &PendingModule) -> bool {
        Arc::ptr_eq(&self.factory, &other.factory)
    }
}

/// Module record
enum ModuleState {
    /// Registered, factory not yet run
    Unresolved(PendingModule),
    /// Factory running; `partial` is what a circular require observes
    Resolving {
        pending: PendingModule,
        partial: Value,
        replacement: Option<PendingModule>,
    },
    /// Factory finished; exports are fixed for the registry's lifetime
    Resolved { exports: Value, bundle: Arc<str> },
}

impl ModuleState {
    fn bundle(&self) -> &str {
        match self {
            ModuleState::Unresolved(pending) => &pending.bundle,
            ModuleState::Resolving { pending, .. } => &pending.bundle,
            ModuleState::Resolved { bundle, .. } => bundle,
        }
    }

    fn status(&self) -> ModuleStatus {
        match self {
            ModuleState::Unresolved(_) => ModuleStatus::Unresolved,
            ModuleState::Resolving { .. } => ModuleStatus::Resolving,
            ModuleState::Resolved { .. } => ModuleStatus::Resolved,
        }
    }
}

/// Observable state of a module record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Registered but never (successfully) resolved
    Unresolved,
    /// Factory currently running
    Resolving,
    /// Exports cached
    Resolved,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Unresolved => write!(f, "unresolved"),
            ModuleStatus::Resolving => write!(f, "resolving"),
            ModuleStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// Snapshot of one registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Module id
    pub id: ModuleId,
    /// Bundle that registered the current factory
    pub bundle: String,
    /// Record state
    pub status: ModuleStatus,
}

pub(crate) struct RegistryInner {
    records: DashMap<ModuleId, ModuleState>,
    /// Serializes Unresolved -> Resolved transitions; re-entrant so a running
    /// factory can resolve further modules on the same thread.
    gate: ReentrantMutex<()>,
    namespace: String,
    duplicate_log: DuplicateLog,
    trace_resolution: bool,
}

/// Shared handle to a module registry
///
/// Cloning is cheap; every clone addresses the same records.
#[derive(Clone)]
pub struct ModuleRegistry {
    inner: Arc<RegistryInner>,
}

impl ModuleRegistry {
    /// Create an empty registry with default settings
    pub fn new() -> Self {
        Self::with_config(&HostConfig::default())
    }

    /// Create an empty registry using the diagnostics settings of `config`
    pub fn with_config(config: &HostConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                records: DashMap::new(),
                gate: ReentrantMutex::new(()),
                namespace: config.namespace.clone(),
                duplicate_log: config.duplicate_log,
                trace_resolution: config.trace_resolution,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RegistryInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<RegistryInner> {
        Arc::downgrade(&self.inner)
    }

    /// Name under which this registry is published to bundles
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Register a factory for `id` on behalf of `bundle`.
    ///
    /// Before the first successful resolution the last registration wins.
    /// Once resolved, further registrations are ignored. Registering while
    /// the factory runs stores a replacement that is used only if that run
    /// fails.
    pub fn register(&self, id: ModuleId, factory: Factory, bundle: &str) {
        let incoming = PendingModule {
            factory,
            bundle: Arc::from(bundle),
        };

        match self.inner.records.entry(id) {
            Entry::Vacant(vacant) => {
                tracing::debug!("Registered module '{}' from bundle '{}'", vacant.key(), bundle);
                vacant.insert(ModuleState::Unresolved(incoming));
            }
            Entry::Occupied(mut occupied) => {
                let id = occupied.key().clone();
                match occupied.get_mut() {
                    ModuleState::Unresolved(existing) => {
                        if !existing.same_factory(&incoming) {
                            self.log_duplicate(&id, &existing.bundle, bundle);
                            *existing = incoming;
                        }
                    }
                    ModuleState::Resolving {
                        pending,
                        replacement,
                        ..
                    } => {
                        if pending.same_factory(&incoming) {
                            // Re-registering the running factory drops any queued replacement
                            if let Some(previous) = replacement.take() {
                                self.log_duplicate(&id, &previous.bundle, bundle);
                            }
                        } else if !replacement
                            .as_ref()
                            .is_some_and(|queued| queued.same_factory(&incoming))
                        {
                            let previous = replacement.as_ref().unwrap_or(&*pending);
                            self.log_duplicate(&id, &previous.bundle, bundle);
                            *replacement = Some(incoming);
                        }
                    }
                    ModuleState::Resolved { .. } => {
                        tracing::debug!(
                            "Ignoring registration of '{}' from bundle '{}': already resolved",
                            id,
                            bundle
                        );
                    }
                }
            }
        }
    }

    /// Resolve a module, running its factory on first use
    pub fn resolve(&self, id: &str) -> Result<Value> {
        self.resolve_from(id, None)
    }

    /// Deferred resolution; never fails until the handle is invoked
    pub fn resolve_lazy(&self, id: &str) -> LazyModule {
        LazyModule::new(self, id, None)
    }

    /// Resolve on behalf of code in bundle `from` (used in error messages)
    pub(crate) fn resolve_from(&self, id: &str, from: Option<&str>) -> Result<Value> {
        if let Some(record) = self.inner.records.get(id) {
            if let ModuleState::Resolved { exports, .. } = record.value() {
                if self.inner.trace_resolution {
                    tracing::trace!("Module '{}' served from cache", id);
                }
                return Ok(exports.clone());
            }
        }

        let _gate = self.inner.gate.lock();

        let (module_id, pending, exports) = {
            let Some(mut record) = self.inner.records.get_mut(id) else {
                return Err(ModuleError::unknown_module(id, from));
            };
            let module_id = record.key().clone();
            let state = record.value_mut();
            let pending = match &*state {
                ModuleState::Resolved { exports, .. } => return Ok(exports.clone()),
                ModuleState::Resolving { partial, .. } => {
                    tracing::trace!("Circular require of '{}', returning partial exports", id);
                    return Ok(partial.clone());
                }
                ModuleState::Unresolved(pending) => pending.clone(),
            };
            let exports = Exports::new();
            *state = ModuleState::Resolving {
                pending: pending.clone(),
                partial: Value::Object(exports.clone()),
                replacement: None,
            };
            (module_id, pending, exports)
        };

        tracing::debug!("Resolving module '{}' from bundle '{}'", module_id, pending.bundle);

        let mut unwind = UnwindGuard {
            registry: self,
            id: module_id.clone(),
            pending: Some(pending.clone()),
        };
        let mut scope = ModuleScope::new(self, module_id.clone(), pending.bundle.clone(), exports);
        let outcome = (pending.factory)(&mut scope);
        let exports = scope.into_exports();
        unwind.pending = None;

        let mut record = self
            .inner
            .records
            .entry(module_id.clone())
            .or_insert_with(|| ModuleState::Unresolved(pending.clone()));

        let replacement = match record.value_mut() {
            ModuleState::Resolving { replacement, .. } => replacement.take(),
            _ => None,
        };

        match outcome {
            Ok(()) => {
                if let Some(discarded) = replacement {
                    tracing::debug!(
                        "Discarding factory for '{}' from bundle '{}': module resolved first",
                        module_id,
                        discarded.bundle
                    );
                }
                *record.value_mut() = ModuleState::Resolved {
                    exports: exports.clone(),
                    bundle: pending.bundle,
                };
                Ok(exports)
            }
            Err(err) => {
                tracing::debug!("Module '{}' failed and stays unresolved: {}", module_id, err);
                *record.value_mut() = ModuleState::Unresolved(replacement.unwrap_or(pending));
                Err(err)
            }
        }
    }

    /// Replace what a circular require of a resolving module observes
    pub(crate) fn update_partial(&self, id: &ModuleId, value: Value) {
        if let Some(mut record) = self.inner.records.get_mut(id) {
            if let ModuleState::Resolving { partial, .. } = record.value_mut() {
                *partial = value;
            }
        }
    }

    /// Check if a module id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.inner.records.contains_key(id)
    }

    /// State of a module record
    pub fn status(&self, id: &str) -> Option<ModuleStatus> {
        self.inner.records.get(id).map(|record| record.status())
    }

    /// Bundle that registered the module's current factory
    pub fn owner(&self, id: &str) -> Option<String> {
        self.inner
            .records
            .get(id)
            .map(|record| record.bundle().to_string())
    }

    /// All registered ids, sorted
    pub fn ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self
            .inner
            .records
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Every record, sorted by id
    pub fn snapshot(&self) -> Vec<ModuleInfo> {
        let mut infos: Vec<ModuleInfo> = self
            .inner
            .records
            .iter()
            .map(|entry| ModuleInfo {
                id: entry.key().clone(),
                bundle: entry.value().bundle().to_string(),
                status: entry.value().status(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    fn log_duplicate(&self, id: &ModuleId, previous: &str, incoming: &str) {
        match self.inner.duplicate_log {
            DuplicateLog::Off => {}
            DuplicateLog::Debug => tracing::debug!(
                "Module '{}' from bundle '{}' replaces the factory from bundle '{}'",
                id,
                incoming,
                previous
            ),
            DuplicateLog::Warn => tracing::warn!(
                "Module '{}' from bundle '{}' replaces the factory from bundle '{}'",
                id,
                incoming,
                previous
            ),
        }
    }
}

/// Puts a record back to unresolved if its factory panics
struct UnwindGuard<'r> {
    registry: &'r ModuleRegistry,
    id: ModuleId,
    pending: Option<PendingModule>,
}

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if let Some(mut record) = self.registry.inner.records.get_mut(&self.id) {
            let replacement = match record.value_mut() {
                ModuleState::Resolving { replacement, .. } => replacement.take(),
                _ => None,
            };
            *record.value_mut() = ModuleState::Unresolved(replacement.unwrap_or(pending));
        }
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("namespace", &self.inner.namespace)
            .field("modules", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(s: &str) -> ModuleId {
        ModuleId::new(s).unwrap()
    }

    fn constant(name: &'static str, value: f64) -> Factory {
        factory(move |m| {
            m.exports().set(name, value);
            Ok(())
        })
    }

    #[test]
    fn test_register_does_not_run_factory() {
        let registry = ModuleRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        registry.register(
            id("m1"),
            factory(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            "vendor",
        );

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(registry.status("m1"), Some(ModuleStatus::Unresolved));
        assert_eq!(registry.owner("m1").as_deref(), Some("vendor"));
    }

    #[test]
    fn test_unknown_module() {
        let registry = ModuleRegistry::new();
        let err = registry.resolve("missing").unwrap_err();
        assert!(matches!(
            err,
            ModuleError::UnknownModule { id: ref missing, from: None } if missing == "missing"
        ));
    }

    #[test]
    fn test_same_factory_registration_is_idempotent() {
        let registry = ModuleRegistry::new();
        let body = constant("answer", 42.0);
        registry.register(id("m1"), body.clone(), "a");
        registry.register(id("m1"), body, "a");
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.resolve("m1").unwrap().get("answer").unwrap(),
            Value::Number(42.0)
        );
    }

    #[test]
    fn test_owner_follows_last_registration() {
        let registry = ModuleRegistry::new();
        registry.register(id("m1"), constant("v", 1.0), "first");
        registry.register(id("m1"), constant("v", 2.0), "second");
        assert_eq!(registry.owner("m1").as_deref(), Some("second"));
    }

    #[test]
    fn test_replacement_registered_during_resolution() {
        let registry = ModuleRegistry::new();
        let handle = registry.clone();
        registry.register(
            id("flaky"),
            factory(move |m| {
                handle.register(ModuleId::new("flaky")?, constant("v", 2.0), "hotfix");
                Err(m.fail("first attempt fails"))
            }),
            "app",
        );

        assert!(registry.resolve("flaky").unwrap_err().is_factory_failure());
        assert_eq!(registry.owner("flaky").as_deref(), Some("hotfix"));
        assert_eq!(
            registry.resolve("flaky").unwrap().get("v").unwrap(),
            Value::Number(2.0)
        );
    }

    #[test]
    fn test_reregistering_running_factory_drops_replacement() {
        let registry = ModuleRegistry::new();
        let handle = registry.clone();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let slot: Arc<std::sync::OnceLock<Factory>> = Arc::new(std::sync::OnceLock::new());
        let own = slot.clone();

        let original = factory(move |m| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                handle.register(ModuleId::new("flaky")?, constant("which", 2.0), "hotfix");
                if let Some(me) = own.get() {
                    handle.register(ModuleId::new("flaky")?, me.clone(), "app");
                }
                return Err(m.fail("first attempt fails"));
            }
            m.exports().set("which", 1.0);
            Ok(())
        });
        assert!(slot.set(original.clone()).is_ok());
        registry.register(id("flaky"), original, "app");

        assert!(registry.resolve("flaky").unwrap_err().is_factory_failure());
        assert_eq!(registry.owner("flaky").as_deref(), Some("app"));
        assert_eq!(
            registry.resolve("flaky").unwrap().get("which").unwrap(),
            Value::Number(1.0)
        );
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_latest_replacement_wins_during_resolution() {
        let registry = ModuleRegistry::new();
        let handle = registry.clone();
        registry.register(
            id("flaky"),
            factory(move |m| {
                handle.register(ModuleId::new("flaky")?, constant("which", 2.0), "b");
                handle.register(ModuleId::new("flaky")?, constant("which", 3.0), "c");
                Err(m.fail("first attempt fails"))
            }),
            "a",
        );

        assert!(registry.resolve("flaky").is_err());
        assert_eq!(registry.owner("flaky").as_deref(), Some("c"));
        assert_eq!(
            registry.resolve("flaky").unwrap().get("which").unwrap(),
            Value::Number(3.0)
        );
    }

    #[test]
    fn test_panicking_factory_stays_unresolved() {
        let registry = ModuleRegistry::new();
        registry.register(id("panics"), factory(|_| panic!("factory bug")), "app");

        let handle = registry.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            handle.resolve("panics")
        }));
        assert!(result.is_err());
        assert_eq!(registry.status("panics"), Some(ModuleStatus::Unresolved));
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = ModuleRegistry::new();
        registry.register(id("b"), constant("v", 1.0), "x");
        registry.register(id("a"), constant("v", 1.0), "y");
        registry.resolve("b").unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id.as_str(), "a");
        assert_eq!(snapshot[0].status, ModuleStatus::Unresolved);
        assert_eq!(snapshot[1].bundle, "x");
        assert_eq!(snapshot[1].status, ModuleStatus::Resolved);
        assert_eq!(registry.ids(), vec![id("a"), id("b")]);
    }
}
