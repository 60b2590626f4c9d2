//! Fixture classes shared by the integration tests.

#![allow(dead_code)]

use swizzle_runtime::{
    ClassRef, DispatchKind, MessageError, MethodLogic, ObjectRef, Runtime, Selector, Signature,
    Value, ValueKind,
};

/// Install an ivar-backed getter/setter pair.
fn ivar_accessors(rt: &Runtime, class: &ClassRef, name: &str, setter: &str, kind: ValueKind) {
    let ivar = name.to_string();
    rt.add_method(
        class,
        DispatchKind::Instance,
        Selector::unary(name),
        &MethodLogic::new(Signature::getter(kind), move |_, receiver, _| {
            Ok(receiver.as_object().map(|o| o.ivar(&ivar)).unwrap_or_default())
        }),
    )
    .unwrap();

    let ivar = name.to_string();
    rt.add_method(
        class,
        DispatchKind::Instance,
        Selector::with_one_arg(setter),
        &MethodLogic::new(Signature::setter(kind), move |_, receiver, args| {
            if let Some(obj) = receiver.as_object() {
                obj.set_ivar(&ivar, args[0].clone());
            }
            Ok(Value::Nil)
        }),
    )
    .unwrap();
}

fn string_of(rt: &Runtime, receiver: &Value, name: &str) -> Result<String, MessageError> {
    Ok(rt
        .send(receiver, Selector::unary(name), &[])?
        .as_str()
        .unwrap_or_default()
        .to_string())
}

/// `Person`: firstName, lastName, age, fullName, fullNameWithTitle:,
/// canLegallyDrink; class-level `species`.
pub fn person_class(rt: &Runtime) -> ClassRef {
    let person = rt.define_class("Person", None).unwrap();
    ivar_accessors(rt, &person, "firstName", "setFirstName", ValueKind::Str);
    ivar_accessors(rt, &person, "lastName", "setLastName", ValueKind::Str);
    ivar_accessors(rt, &person, "age", "setAge", ValueKind::UInt);

    rt.add_method(
        &person,
        DispatchKind::Instance,
        Selector::unary("fullName"),
        &MethodLogic::new(Signature::getter(ValueKind::Str), |rt, receiver, _| {
            let first = string_of(rt, receiver, "firstName")?;
            let last = string_of(rt, receiver, "lastName")?;
            Ok(Value::from(format!("{} {}", first, last)))
        }),
    )
    .unwrap();

    rt.add_method(
        &person,
        DispatchKind::Instance,
        Selector::with_one_arg("fullNameWithTitle"),
        &MethodLogic::new(
            Signature::new(ValueKind::Str).param(ValueKind::Str),
            |rt, receiver, args| {
                let full = string_of(rt, receiver, "fullName")?;
                let title = args[0].as_str().unwrap_or_default();
                Ok(Value::from(format!("{} {}", title, full)))
            },
        ),
    )
    .unwrap();

    rt.add_method(
        &person,
        DispatchKind::Instance,
        Selector::unary("canLegallyDrink"),
        &MethodLogic::new(Signature::getter(ValueKind::Bool), |rt, receiver, _| {
            let age = rt
                .send(receiver, Selector::unary("age"), &[])?
                .as_uint()
                .unwrap_or_default();
            Ok(Value::Bool(age >= 21))
        }),
    )
    .unwrap();

    rt.add_method(
        &person,
        DispatchKind::Class,
        Selector::unary("species"),
        &MethodLogic::constant(Signature::getter(ValueKind::Str), Value::str("human")),
    )
    .unwrap();

    person
}

pub fn new_person(rt: &Runtime, class: &ClassRef, first: &str, last: &str, age: u64) -> Value {
    let p = Value::Object(rt.instantiate(class));
    rt.send(&p, Selector::with_one_arg("setFirstName"), &[Value::str(first)])
        .unwrap();
    rt.send(&p, Selector::with_one_arg("setLastName"), &[Value::str(last)])
        .unwrap();
    rt.send(&p, Selector::with_one_arg("setAge"), &[Value::UInt(age)])
        .unwrap();
    p
}

/// `Widget`: an empty class for pseudo-properties.
pub fn widget_class(rt: &Runtime) -> ClassRef {
    rt.define_class("Widget", None).unwrap()
}

/// `MonitorableObject`: `copy` marks the copy, `value` is ivar-backed.
pub fn monitorable_class(rt: &Runtime) -> ClassRef {
    let class = rt.define_class("MonitorableObject", None).unwrap();
    ivar_accessors(rt, &class, "value", "setValue", ValueKind::Int);

    // Own `copy` shadows the root's member-wise copy.
    rt.add_method(
        &class,
        DispatchKind::Instance,
        Selector::unary("copy"),
        &MethodLogic::new(Signature::getter(ValueKind::Object), |_, receiver, _| {
            Ok(receiver
                .as_object()
                .map(|obj| {
                    let copy = obj.shallow_copy();
                    copy.set_ivar("isCopy", Value::Bool(true));
                    Value::Object(copy)
                })
                .unwrap_or_default())
        }),
    )
    .unwrap();
    class
}

pub fn is_copy(obj: &ObjectRef) -> bool {
    obj.ivar("isCopy") == Value::Bool(true)
}
