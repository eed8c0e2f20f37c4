// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Shared export tables
//!
//! An [`Exports`] is handed to a factory before it runs. Every clone points at
//! the same table, so a module that captured it during a circular require
//! observes whatever the factory writes afterwards.

use crate::error::Result;
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Lazily evaluated export (live binding)
pub type Getter = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

#[derive(Clone)]
enum Slot {
    Value(Value),
    Getter(Getter),
}

/// Insertion-ordered, shared, interior-mutable export table
#[derive(Clone, Default)]
pub struct Exports {
    slots: Arc<RwLock<IndexMap<String, Slot>>>,
}

impl Exports {
    /// Create an empty export table
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign an export, replacing any existing slot
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.slots.write().insert(name.into(), Slot::Value(value.into()));
    }

    /// Install a getter for `name` unless the name is already exported.
    ///
    /// Returns whether the getter was installed.
    pub fn define<F>(&self, name: impl Into<String>, getter: F) -> bool
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        let mut slots = self.slots.write();
        let name = name.into();
        if slots.contains_key(&name) {
            return false;
        }
        slots.insert(name, Slot::Getter(Arc::new(getter)));
        true
    }

    /// Read an export, running its getter if it has one
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        // Clone the slot out so a getter can touch this table.
        let slot = self.slots.read().get(name).cloned();
        match slot {
            None => Ok(None),
            Some(Slot::Value(value)) => Ok(Some(value)),
            Some(Slot::Getter(getter)) => getter().map(Some),
        }
    }

    /// All exports in insertion order, with getters evaluated
    pub fn entries(&self) -> Result<Vec<(String, Value)>> {
        let slots: Vec<(String, Slot)> = self
            .slots
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        slots
            .into_iter()
            .map(|(name, slot)| match slot {
                Slot::Value(value) => Ok((name, value)),
                Slot::Getter(getter) => Ok((name, getter()?)),
            })
            .collect()
    }

    /// Check if a name is exported
    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Check if `name` is backed by a getter
    pub fn is_getter(&self, name: &str) -> bool {
        matches!(self.slots.read().get(name), Some(Slot::Getter(_)))
    }

    /// Exported names in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    /// Number of exports
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Check if nothing has been exported yet
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Returns true if both handles share one table
    pub fn ptr_eq(&self, other: &Exports) -> bool {
        Arc::ptr_eq(&self.slots, &other.slots)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.slots) as *const () as usize
    }
}

impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exports").field("keys", &self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_clones_share_table() {
        let exports = Exports::new();
        let alias = exports.clone();
        assert!(alias.is_empty());

        exports.set("version", "1.2.0");
        assert_eq!(alias.get("version").unwrap(), Some(Value::from("1.2.0")));
        assert!(alias.ptr_eq(&exports));
    }

    #[test]
    fn test_define_does_not_overwrite() {
        let exports = Exports::new();
        exports.set("clamp", 1.0);
        assert!(!exports.define("clamp", || Ok(Value::Number(2.0))));
        assert_eq!(exports.get("clamp").unwrap(), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_getter_runs_on_each_read() {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = reads.clone();
        let exports = Exports::new();
        exports.define("live", move || {
            Ok(Value::Number(counter.fetch_add(1, Ordering::SeqCst) as f64))
        });

        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert!(exports.is_getter("live"));
        assert_eq!(exports.get("live").unwrap(), Some(Value::Number(0.0)));
        assert_eq!(exports.get("live").unwrap(), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_getter_may_write_its_own_table() {
        let exports = Exports::new();
        let table = exports.clone();
        exports.define("init", move || {
            table.set("initialized", true);
            Ok(Value::Null)
        });

        exports.get("init").unwrap();
        assert_eq!(exports.get("initialized").unwrap(), Some(Value::Boolean(true)));
        assert_eq!(exports.keys(), vec!["init", "initialized"]);
    }
}
