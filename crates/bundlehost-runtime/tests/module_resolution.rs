//! Module resolution integration tests
//!
//! Exercises the registry through bundles the way compiled bundle code does.

use bundlehost_runtime::{
    Bundle, Host, ModuleError, ModuleId, ModuleStatus, Value, factory,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Factory that counts its invocations and exports `runs`
fn counting(counter: &Arc<AtomicUsize>) -> bundlehost_runtime::Factory {
    let counter = counter.clone();
    factory(move |m| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        m.exports().set("runs", n as f64);
        Ok(())
    })
}

#[test]
fn test_factory_runs_at_most_once() {
    let host = Host::default();
    let runs = Arc::new(AtomicUsize::new(0));
    host.load_bundle(Bundle::new("vendor").with_factory("m1", counting(&runs)))
        .unwrap();

    let first = host.require("m1").unwrap();
    for _ in 0..5 {
        assert_eq!(host.require("m1").unwrap(), first);
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(host.registry().status("m1"), Some(ModuleStatus::Resolved));
}

#[test]
fn test_registration_is_lazy() {
    let host = Host::default();
    let runs = Arc::new(AtomicUsize::new(0));
    host.load_bundle(Bundle::new("vendor").with_factory("m1", counting(&runs)))
        .unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    let handle = host.dynamic_require("m1");
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    handle.resolve().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_last_registration_before_resolve_wins() {
    let host = Host::default();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    host.load_bundle(Bundle::new("a").with_factory("x", counting(&first)))
        .unwrap();
    host.load_bundle(Bundle::new("b").with_factory("x", counting(&second)))
        .unwrap();
    host.require("x").unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert_eq!(host.registry().owner("x").as_deref(), Some("b"));
}

#[test]
fn test_registration_after_resolve_is_ignored() {
    let host = Host::default();
    host.load_bundle(Bundle::new("a").module("x", |m| {
        m.exports().set("version", 1.0);
        Ok(())
    }))
    .unwrap();
    let before = host.require("x").unwrap();

    host.load_bundle(Bundle::new("b").module("x", |m| {
        m.exports().set("version", 2.0);
        Ok(())
    }))
    .unwrap();
    let after = host.require("x").unwrap();

    assert_eq!(before, after);
    assert_eq!(after.get("version").unwrap(), Value::Number(1.0));
    assert_eq!(host.registry().owner("x").as_deref(), Some("a"));
}

#[test]
fn test_circular_requires_see_partial_exports() {
    let host = Host::default();
    host.load_bundle(
        Bundle::new("app")
            .module("a", |m| {
                m.exports().set("early", "a-early");
                let b = m.require("b")?;
                m.exports().set("b", b);
                m.exports().set("late", "a-late");
                Ok(())
            })
            .module("b", |m| {
                let a = m.require("a")?;
                let seen_late = a.get("late")?;
                m.exports().set("a", a.clone());
                m.exports().set("a_early", a.get("early")?);
                m.exports().set("a_late_at_load", seen_late);
                Ok(())
            }),
    )
    .unwrap();

    let a = host.require("a").unwrap();
    let b = host.require("b").unwrap();

    assert_eq!(b.get("a_early").unwrap(), Value::from("a-early"));
    assert_eq!(b.get("a_late_at_load").unwrap(), Value::Undefined);
    // b holds the same table a finished populating
    assert_eq!(b.get("a").unwrap(), a);
    assert_eq!(b.get("a").unwrap().get("late").unwrap(), Value::from("a-late"));
    assert_eq!(a.get("b").unwrap(), b);
}

#[test]
fn test_self_require_returns_own_table() {
    let host = Host::default();
    host.load_bundle(Bundle::new("app").module("self", |m| {
        m.exports().set("before", true);
        let me = m.require("self")?;
        assert!(me.as_exports().unwrap().ptr_eq(m.exports()));
        Ok(())
    }))
    .unwrap();

    assert_eq!(
        host.require("self").unwrap().get("before").unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn test_cycle_observes_replaced_exports() {
    let host = Host::default();
    host.load_bundle(
        Bundle::new("app")
            .module("fn", |m| {
                m.set_exports(Value::function("greet", |_| Ok(Value::from("hi"))));
                m.require("caller")?;
                Ok(())
            })
            .module("caller", |m| {
                let f = m.require("fn")?;
                m.exports().set("greeting", f.call(&[])?);
                Ok(())
            }),
    )
    .unwrap();

    assert!(host.require("fn").unwrap().is_function());
    assert_eq!(
        host.require("caller").unwrap().get("greeting").unwrap(),
        Value::from("hi")
    );
}

#[test]
fn test_unknown_module_fails_synchronously() {
    let host = Host::default();
    let err = host.require("nonexistent").unwrap_err();
    assert!(matches!(err, ModuleError::UnknownModule { .. }));

    let handle = host.dynamic_require("nonexistent");
    assert_eq!(handle.id(), "nonexistent");
    assert!(handle.resolve().unwrap_err().is_unknown_module());
}

#[test]
fn test_cross_bundle_require_before_dependency_loads() {
    let host = Host::default();

    host.load_bundle(Bundle::new("B").module("m2", |m| {
        let m1 = m.require("m1")?;
        m.exports().set("m1", m1);
        Ok(())
    }))
    .unwrap();

    let err = host.require("m2").unwrap_err();
    assert!(matches!(
        err,
        ModuleError::UnknownModule { ref id, from: Some(ref bundle) } if id == "m1" && bundle == "B"
    ));
    assert_eq!(host.registry().status("m2"), Some(ModuleStatus::Unresolved));

    host.load_bundle(Bundle::new("A").module("m1", |m| {
        m.exports().set("name", "m1");
        Ok(())
    }))
    .unwrap();

    // m2 stayed unresolved, so a retry now succeeds
    let m2 = host.require("m2").unwrap();
    assert_eq!(m2.get("m1").unwrap().get("name").unwrap(), Value::from("m1"));
}

#[test]
fn test_dynamic_require_across_bundles() {
    let host = Host::default();

    host.load_bundle(Bundle::new("B").module("m2", |m| {
        let handle = m.dynamic_require("m1");
        m.define("m1", move || handle.resolve());
        Ok(())
    }))
    .unwrap();

    let m2 = host.require("m2").unwrap();
    assert!(m2.get("m1").unwrap_err().is_unknown_module());

    let runs = Arc::new(AtomicUsize::new(0));
    host.load_bundle(Bundle::new("A").with_factory("m1", counting(&runs)))
        .unwrap();

    let m1 = m2.get("m1").unwrap();
    assert_eq!(m1, host.require("m1").unwrap());
    assert_eq!(m1.get("runs").unwrap(), Value::Number(1.0));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_factory_can_retry() {
    let host = Host::default();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();

    host.load_bundle(Bundle::new("app").module("flaky", move |m| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(m.fail("network unavailable"));
        }
        m.exports().set("ok", true);
        Ok(())
    }))
    .unwrap();

    let err = host.require("flaky").unwrap_err();
    assert!(matches!(
        err,
        ModuleError::FactoryExecution { ref module, ref bundle, .. }
            if module.as_str() == "flaky" && bundle == "app"
    ));
    assert_eq!(host.registry().status("flaky"), Some(ModuleStatus::Unresolved));

    assert_eq!(
        host.require("flaky").unwrap().get("ok").unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failed_factory_can_be_replaced() {
    let host = Host::default();
    host.load_bundle(Bundle::new("v1").module("page", |m| Err(m.fail("render error"))))
        .unwrap();
    assert!(host.require("page").unwrap_err().is_factory_failure());

    host.load_bundle(Bundle::new("v2").module("page", |m| {
        m.exports().set("fixed", true);
        Ok(())
    }))
    .unwrap();
    assert_eq!(
        host.require("page").unwrap().get("fixed").unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn test_nested_errors_propagate_unchanged() {
    let host = Host::default();
    host.load_bundle(
        Bundle::new("app")
            .module("top", |m| m.require("middle").map(|_| ()))
            .module("middle", |m| m.require("leaf").map(|_| ()))
            .module("leaf", |m| Err(m.fail("leaf broke"))),
    )
    .unwrap();

    let err = host.require("top").unwrap_err();
    assert!(matches!(
        err,
        ModuleError::FactoryExecution { ref module, .. } if module.as_str() == "leaf"
    ));
    for id in ["top", "middle", "leaf"] {
        assert_eq!(host.registry().status(id), Some(ModuleStatus::Unresolved));
    }
}

#[test]
fn test_concurrent_resolve_runs_factory_once() {
    let host = Arc::new(Host::default());
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();

    host.load_bundle(Bundle::new("vendor").module("slow", move |m| {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(std::time::Duration::from_millis(20));
        m.exports().set("ready", true);
        Ok(())
    }))
    .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let host = host.clone();
            thread::spawn(move || host.require("slow").unwrap())
        })
        .collect();

    let results: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_concurrent_cycles_do_not_deadlock() {
    let host = Arc::new(Host::default());
    host.load_bundle(
        Bundle::new("app")
            .module("a", |m| {
                let b = m.require("b")?;
                m.exports().set("b", b);
                Ok(())
            })
            .module("b", |m| {
                let a = m.require("a")?;
                m.exports().set("a", a);
                Ok(())
            }),
    )
    .unwrap();

    let left = {
        let host = host.clone();
        thread::spawn(move || host.require("a").unwrap())
    };
    let right = {
        let host = host.clone();
        thread::spawn(move || host.require("b").unwrap())
    };

    let a = left.join().unwrap();
    let b = right.join().unwrap();
    assert_eq!(a.get("b").unwrap(), b);
    assert_eq!(b.get("a").unwrap(), a);
}

#[test]
fn test_empty_id_rejected() {
    assert!(matches!(ModuleId::new(""), Err(ModuleError::EmptyModuleId)));

    let host = Host::default();
    assert!(host.load_bundle(Bundle::new("x").module("", |_| Ok(()))).is_err());
    assert!(host.registry().is_empty());
}

#[test]
fn test_scope_reports_module_and_bundle() {
    let host = Host::default();
    host.load_bundle(Bundle::new("icons").module("e4f5", |m| {
        let label = format!("{}@{}", m.id(), m.bundle());
        m.exports().set("label", label);
        Ok(())
    }))
    .unwrap();

    let icons = host.require("e4f5").unwrap();
    assert_eq!(icons.get("label").unwrap(), Value::from("e4f5@icons"));
}
