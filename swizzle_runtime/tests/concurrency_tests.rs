//! Concurrent mutation tests.
//!
//! With `serialize_mutations` on (the default), multi-step mutations run
//! one at a time, so racing callers see exactly one winner.
//!
//! Coverage:
//! - Racing adders of different kinds for one property name
//! - Racing overrides and aliases onto one selector
//! - Racing isolation of one object

mod common;

use common::{new_person, person_class, widget_class};
use std::sync::{Arc, Barrier};
use std::thread;
use swizzle_runtime::{
    DispatchKind, MethodLogic, MethodMutator, PseudoPropertyKind, Runtime, Selector, Signature,
    SwizzleError, Value, ValueKind, generate_adder, isolate,
};

const THREADS: usize = 8;

/// Run `work` on `THREADS` threads released together; collect results.
fn race<T, F>(work: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let barrier = Barrier::new(THREADS);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|index| {
                let barrier = &barrier;
                let work = &work;
                scope.spawn(move || {
                    barrier.wait();
                    work(index)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    })
}

// =============================================================================
// Pseudo-Properties
// =============================================================================

#[test]
fn test_racing_adders_one_kind_wins() {
    let rt = Runtime::default();
    let widget = widget_class(&rt);

    let results = race(|index| {
        let kind = PseudoPropertyKind::ALL[index % PseudoPropertyKind::ALL.len()];
        generate_adder(&rt, &widget, kind).add("level").map(|_| kind)
    });

    let winners: Vec<PseudoPropertyKind> = results.iter().filter_map(|r| r.clone().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results.iter().all(|r| match r {
        Ok(_) => true,
        Err(err) => matches!(err, SwizzleError::PropertyKindConflict { .. }),
    }));

    let winner = winners[0];
    assert_eq!(
        rt.property_kind(&widget, &swizzle_runtime::intern("level")),
        Some(winner)
    );
    let getter = widget
        .own_method(DispatchKind::Instance, Selector::unary("level"))
        .unwrap();
    assert_eq!(getter.signature().returns(), winner.value_kind());
}

// =============================================================================
// Method Mutation
// =============================================================================

#[test]
fn test_racing_overrides_one_succeeds() {
    let rt = Runtime::default();
    let person = person_class(&rt);
    let p = new_person(&rt, &person, "Alice", "Smith", 30);
    let full_name = Selector::unary("fullName");
    let old = Selector::unary("oldFullName");
    let original = person.own_method(DispatchKind::Instance, full_name).unwrap();

    let results = race(|index| {
        let logic = MethodLogic::constant(
            Signature::getter(ValueKind::Str),
            Value::from(format!("override {}", index)),
        );
        MethodMutator::new(&rt).override_instance_method(&person, full_name, old, &logic)
    });

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| matches!(err, SwizzleError::NameCollision { .. })));

    let aliased = person.own_method(DispatchKind::Instance, old).unwrap();
    assert!(Arc::ptr_eq(&aliased, &original));
    assert_eq!(rt.send(&p, old, &[]), Ok(Value::str("Alice Smith")));
}

#[test]
fn test_racing_aliases_one_succeeds() {
    let rt = Runtime::default();
    let person = person_class(&rt);
    let sources = ["firstName", "lastName", "fullName"];

    let results = race(|index| {
        MethodMutator::new(&rt).alias_instance_method(
            &person,
            Selector::unary(sources[index % sources.len()]),
            Selector::unary("handle"),
        )
    });

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let installed = person
        .own_method(DispatchKind::Instance, Selector::unary("handle"))
        .unwrap();
    assert!(Arc::ptr_eq(winners[0], &installed));
}

// =============================================================================
// Isolation
// =============================================================================

#[test]
fn test_racing_isolation_creates_one_class() {
    let rt = Runtime::default();
    let person = person_class(&rt);
    let p = new_person(&rt, &person, "Alice", "Smith", 30);
    let classes_before = rt.registry().len();

    let results = race(|_| isolate(&rt, &p).map(|obj| obj.class()));

    let first = results[0].as_ref().unwrap();
    assert!(first.is_isolated());
    assert!(results
        .iter()
        .all(|r| r.as_ref().is_ok_and(|class| Arc::ptr_eq(class, first))));
    assert_eq!(rt.registry().len(), classes_before + 1);
}
