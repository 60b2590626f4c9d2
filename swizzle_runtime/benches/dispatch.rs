//! Message Dispatch Benchmarks
//!
//! Measures the cost of message send through the resolution cache and the
//! cost of the mutations that invalidate it.
//!
//! # Benchmark Categories
//!
//! 1. **Send**: cached vs uncached resolution at increasing hierarchy depth
//! 2. **Pseudo-Properties**: generated getter/setter round trip
//! 3. **Mutation**: replace (with cache invalidation) and isolation

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use swizzle_runtime::{
    ClassRef, DispatchKind, MethodLogic, MethodMutator, PseudoPropertyKind, Runtime,
    RuntimeConfig, Selector, Signature, Value, ValueKind, generate_adder, isolate,
};

// =============================================================================
// Benchmark Helpers
// =============================================================================

/// A chain of `depth` classes below the root; the method lives on the top.
fn class_chain(rt: &Runtime, depth: usize, selector: Selector) -> ClassRef {
    let top = rt.define_class("Level0", None).unwrap();
    rt.add_method(
        &top,
        DispatchKind::Instance,
        selector,
        &MethodLogic::constant(Signature::getter(ValueKind::Int), Value::Int(1)),
    )
    .unwrap();

    let mut class = top;
    for level in 1..depth {
        class = rt
            .define_class(&format!("Level{}", level), Some(&class))
            .unwrap();
    }
    class
}

// =============================================================================
// Send Benchmarks
// =============================================================================

fn bench_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("send");
    let selector = Selector::unary("answer");

    for depth in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::new("cached", depth), &depth, |b, &depth| {
            let rt = Runtime::default();
            let leaf = class_chain(&rt, depth, selector);
            let obj = Value::Object(rt.instantiate(&leaf));
            b.iter(|| black_box(rt.send(black_box(&obj), selector, &[])))
        });

        group.bench_with_input(BenchmarkId::new("uncached", depth), &depth, |b, &depth| {
            let rt = Runtime::new(RuntimeConfig::uncached()).unwrap();
            let leaf = class_chain(&rt, depth, selector);
            let obj = Value::Object(rt.instantiate(&leaf));
            b.iter(|| black_box(rt.send(black_box(&obj), selector, &[])))
        });
    }

    group.finish();
}

// =============================================================================
// Pseudo-Property Benchmarks
// =============================================================================

fn bench_pseudo_property(c: &mut Criterion) {
    let mut group = c.benchmark_group("pseudo_property");

    group.bench_function("integer_set_get", |b| {
        let rt = Runtime::default();
        let widget = rt.define_class("Widget", None).unwrap();
        let accessors = generate_adder(&rt, &widget, PseudoPropertyKind::Integer)
            .add("priority")
            .unwrap();
        let w = Value::Object(rt.instantiate(&widget));

        let mut n = 0i64;
        b.iter(|| {
            n += 1;
            rt.send(&w, accessors.setter, &[Value::Int(n)]).unwrap();
            black_box(rt.send(&w, accessors.getter, &[]).unwrap())
        })
    });

    group.finish();
}

// =============================================================================
// Mutation Benchmarks
// =============================================================================

fn bench_mutation(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutation");
    let selector = Selector::unary("answer");

    group.bench_function("replace_then_send", |b| {
        let rt = Runtime::default();
        let leaf = class_chain(&rt, 4, selector);
        let obj = Value::Object(rt.instantiate(&leaf));
        let logic = MethodLogic::constant(Signature::getter(ValueKind::Int), Value::Int(2));
        let mutator = MethodMutator::new(&rt);

        b.iter(|| {
            mutator.replace_instance_method(&leaf, selector, &logic).unwrap();
            black_box(rt.send(&obj, selector, &[]).unwrap())
        })
    });

    group.bench_function("isolate", |b| {
        let rt = Runtime::default();
        let person = rt.define_class("Person", None).unwrap();
        b.iter(|| {
            let p = Value::Object(rt.instantiate(&person));
            black_box(isolate(&rt, &p).unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_send, bench_pseudo_property, bench_mutation);
criterion_main!(benches);
