use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::*;
use crate::introspect::{IntrospectionError, MemberRecord, Registry};
use crate::runtime::{ROOT_SCOPE, register_builtins};
use crate::types::HostTypeId;
use crate::types::TypeDescriptor as T;
use crate::values::HostObject;

type NativeResult = Result<Value, RuntimeError>;

fn tag(label: &'static str) -> impl Fn(Vec<Value>, &mut Interpreter) -> NativeResult + Send + Sync {
    move |_, _| Ok(Value::text(label))
}

fn interpreter(build: impl FnOnce(&mut Registry, TypeDescriptor)) -> Interpreter {
    let mut registry = Registry::default();
    let root = register_builtins(&mut registry, ROOT_SCOPE);
    build(&mut registry, TypeDescriptor::Host(root));
    Interpreter::new(Arc::new(DispatchEngine::new(
        Arc::new(registry),
        EngineConfig::default(),
    )))
}

fn call(interp: &mut Interpreter, name: &str, args: Vec<Value>) -> NativeResult {
    let callee = interp.get(Symbol::intern(name))?;
    interp.apply(&callee, args)
}

fn host(interp: &Interpreter, type_name: &str) -> Value {
    let id = interp
        .engine()
        .provider()
        .find_type(type_name)
        .expect("type registered");
    Value::Host(HostObject::new(id, Symbol::intern(type_name), ()))
}

#[test]
fn single_candidate_is_called_directly() {
    let mut interp = interpreter(|registry, root| {
        registry.add(root, MemberRecord::function("only", &[T::Int], T::Text, tag("only")));
    });
    let value = interp.get(Symbol::intern("only")).expect("resolves");
    assert!(matches!(value.as_procedure(), Some(Callable::Direct(_))));
    assert_eq!(
        call(&mut interp, "only", vec![Value::Int(1)]).expect("call"),
        Value::text("only")
    );
}

#[test]
fn guards_skip_positions_every_candidate_agrees_on() {
    let mut interp = interpreter(|registry, root| {
        registry.add_all(
            root,
            [
                MemberRecord::function("pair", &[T::Int, T::Text], T::Text, tag("int")),
                MemberRecord::function("pair", &[T::Double, T::Text], T::Text, tag("double")),
            ],
        );
    });
    let args = vec![Value::Int(1), Value::text("x")];
    assert_eq!(call(&mut interp, "pair", args).expect("call"), Value::text("int"));

    // The untested second position is still checked before the native call.
    let err = call(&mut interp, "pair", vec![Value::Int(1), Value::symbol("x")])
        .expect_err("second position mismatches");
    assert!(matches!(
        err,
        RuntimeError::Dispatch(DispatchError::NoApplicableOverload { arity: 2, .. })
    ));
}

#[test]
fn large_sets_fall_back_to_a_scan_in_specificity_order() {
    const NAMES: [&str; 8] = ["K0", "K1", "K2", "K3", "K4", "K5", "K6", "K7"];
    let mut interp = interpreter(|registry, root| {
        for name in NAMES {
            let ty = TypeDescriptor::Host(registry.define_type(name, &[]));
            registry.add(root, MemberRecord::function("kind", &[ty], T::Text, tag(name)));
        }
        registry.add(root, MemberRecord::function("kind", &[T::Any], T::Text, tag("any")));
    });
    for name in NAMES {
        let arg = host(&interp, name);
        assert_eq!(
            call(&mut interp, "kind", vec![arg]).expect("call"),
            Value::text(name)
        );
    }
    assert_eq!(
        call(&mut interp, "kind", vec![Value::Int(3)]).expect("call"),
        Value::text("any")
    );
}

#[test]
fn variadic_groups_serve_arities_past_the_lookahead() {
    let mut interp = interpreter(|registry, root| {
        registry.add_all(
            root,
            [
                MemberRecord::function("v", &[T::Int, T::Rest], T::Text, tag("one+")).variadic(),
                MemberRecord::function("v", &[T::Int, T::Int, T::Int, T::Rest], T::Text, tag("three+"))
                    .variadic(),
                MemberRecord::function("v", &[T::Int, T::Int], T::Text, tag("two")),
            ],
        );
    });
    let ints = |n: i32| (0..n).map(Value::Int).collect::<Vec<_>>();
    assert_eq!(call(&mut interp, "v", ints(1)).expect("1"), Value::text("one+"));
    assert_eq!(call(&mut interp, "v", ints(2)).expect("2"), Value::text("two"));
    assert_eq!(call(&mut interp, "v", ints(3)).expect("3"), Value::text("three+"));
    assert_eq!(call(&mut interp, "v", ints(40)).expect("40"), Value::text("three+"));
    assert!(call(&mut interp, "v", ints(0)).is_err());

    // Slots reach the lookahead past the smallest variadic arity (1 + 8).
    let Ok(Value::Procedure(Callable::Table(table))) = interp.get(Symbol::intern("v")) else {
        panic!("expected a dispatch table");
    };
    assert_eq!(table.last_slot(), 9);
    for argc in [9, 10] {
        assert_eq!(
            call(&mut interp, "v", ints(argc as i32)).expect("adapted"),
            Value::text("three+")
        );
    }
}

#[test]
fn arity_pin_restricts_candidates() {
    let mut interp = interpreter(|_, _| {});
    let two = vec![Value::Int(1), Value::Int(2)];
    let three = vec![Value::Int(1), Value::Int(2), Value::Int(3)];

    let pinned = call(&mut interp, "list:2", two.clone()).expect("fixed list");
    assert_eq!(pinned, Value::list(two.clone()));
    assert!(call(&mut interp, "list:2", three.clone()).is_err());

    // Only the variadic candidate can take three arguments.
    let pinned = call(&mut interp, "list:3", three.clone()).expect("variadic list");
    assert_eq!(pinned, Value::list(three));
    assert!(call(&mut interp, "list:3", two).is_err());
}

fn inconsistent(name: &str) -> MemberRecord {
    MemberRecord {
        is_variadic: true,
        ..MemberRecord::function(name, &[T::Int], T::Text, tag("bad"))
    }
}

#[test]
fn inconsistent_variadic_candidate_is_dropped_when_its_arity_survives() {
    let mut interp = interpreter(|registry, root| {
        registry.add_all(
            root,
            [
                inconsistent("mixed"),
                MemberRecord::function("mixed", &[T::Double], T::Text, tag("good")),
            ],
        );
    });
    assert_eq!(
        call(&mut interp, "mixed", vec![Value::Int(1)]).expect("call"),
        Value::text("good")
    );
}

#[test]
fn inconsistent_variadic_candidate_alone_fails_loudly() {
    let interp = interpreter(|registry, root| {
        registry.add(root, inconsistent("broken"));
    });
    let err = interp.get(Symbol::intern("broken")).expect_err("must fail");
    assert!(matches!(
        err,
        RuntimeError::Dispatch(DispatchError::InconsistentVariadicEncoding { arity: 1, .. })
    ));
}

#[test]
fn arity_pin_ignores_inconsistent_members_of_other_arities() {
    let mut interp = interpreter(|registry, root| {
        registry.add_all(
            root,
            [
                MemberRecord::function("mix", &[T::Int], T::Text, tag("one")),
                MemberRecord {
                    is_variadic: true,
                    ..MemberRecord::function("mix", &[T::Int, T::Int], T::Text, tag("bad"))
                },
            ],
        );
    });
    assert_eq!(
        call(&mut interp, "mix:1", vec![Value::Int(1)]).expect("pinned call"),
        Value::text("one")
    );
    let err = interp.get(Symbol::intern("mix")).expect_err("unpinned lookup");
    assert!(matches!(
        err,
        RuntimeError::Dispatch(DispatchError::InconsistentVariadicEncoding { arity: 2, .. })
    ));
    let err = interp.get(Symbol::intern("mix:2")).expect_err("pinned to the broken arity");
    assert!(matches!(
        err,
        RuntimeError::Dispatch(DispatchError::InconsistentVariadicEncoding { arity: 2, .. })
    ));
}

struct Point {
    x: Mutex<i32>,
}

#[test]
fn qualified_members_selectors_and_inheritance() {
    let mut interp = interpreter(|registry, _| {
        let shape = TypeDescriptor::Host(registry.define_type("Shape", &[]));
        let circle = TypeDescriptor::Host(registry.define_type("Circle", &[shape]));
        registry.define_type("Square", &[shape]);
        registry.add(shape, MemberRecord::function("area", &[], T::Text, tag("shape")).instance());
        registry.add(circle, MemberRecord::function("area", &[], T::Text, tag("circle")).instance());
        registry.add(shape, MemberRecord::constant("sides", Value::Int(0)));
    });
    let circle = host(&interp, "Circle");
    let square = host(&interp, "Square");

    assert_eq!(
        call(&mut interp, ".area", vec![circle.clone()]).expect("circle"),
        Value::text("circle")
    );
    assert_eq!(
        call(&mut interp, ".area", vec![square.clone()]).expect("square"),
        Value::text("shape")
    );
    assert_eq!(
        call(&mut interp, "Shape/area", vec![circle]).expect("qualified"),
        Value::text("shape")
    );
    // Constants are inherited and returned as plain values.
    assert_eq!(
        interp.get(Symbol::intern("Square/sides")).expect("constant"),
        Value::Int(0)
    );
    let err = call(&mut interp, ".perimeter", vec![square]).expect_err("no such member");
    assert!(matches!(
        err,
        RuntimeError::Dispatch(DispatchError::UnboundName { .. })
    ));
}

#[test]
fn field_markers_and_constructors() {
    let mut interp = interpreter(|registry, _| {
        let id = registry.define_type("Point", &[]);
        let point = TypeDescriptor::Host(id);
        registry.add_all(
            point,
            [
                MemberRecord::constructor(&[T::Int], point, move |args, _| match args.as_slice() {
                    [Value::Int(x)] => Ok(Value::Host(HostObject::new(
                        id,
                        Symbol::intern("Point"),
                        Point { x: Mutex::new(*x) },
                    ))),
                    _ => Ok(Value::Null),
                }),
                MemberRecord::getter("x", T::Int, |args, _| {
                    let x = args
                        .first()
                        .and_then(|value| match value {
                            Value::Host(obj) => obj.downcast_ref::<Point>().map(|p| *p.x.lock()),
                            _ => None,
                        })
                        .unwrap_or_default();
                    Ok(Value::Int(x))
                }),
                MemberRecord::setter("x", T::Int, |args, _| {
                    if let [Value::Host(obj), Value::Int(x)] = args.as_slice() {
                        if let Some(point) = obj.downcast_ref::<Point>() {
                            *point.x.lock() = *x;
                        }
                    }
                    Ok(Value::Null)
                }),
                MemberRecord::function("x", &[], T::Text, tag("method")).instance(),
            ],
        );
    });
    let p = call(&mut interp, "Point/new", vec![Value::Int(3)]).expect("construct");
    assert_eq!(call(&mut interp, ".-x", vec![p.clone()]).expect("get"), Value::Int(3));
    call(&mut interp, "Point/=x", vec![p.clone(), Value::Int(9)]).expect("set");
    assert_eq!(call(&mut interp, "Point/-x", vec![p.clone()]).expect("get"), Value::Int(9));
    // The plain form names the method, not the field.
    assert_eq!(call(&mut interp, ".x", vec![p]).expect("method"), Value::text("method"));
}

#[test]
fn resolution_is_cached_per_type_and_key() {
    let interp = interpreter(|_, _| {});
    let engine = interp.engine();
    let first = engine.resolve(Symbol::intern("+"), None).expect("resolve");
    let second = engine.resolve(Symbol::intern("+"), None).expect("resolve");
    match (first, second) {
        (Some(Value::Procedure(a)), Some(Value::Procedure(b))) => assert!(a.ptr_eq(&b)),
        other => panic!("expected procedures, got {other:?}"),
    }
    let root = engine.root_scope().expect("root registered");
    let a = engine.metaobject(root).expect("record");
    let b = engine.metaobject(root).expect("record");
    assert!(Arc::ptr_eq(&a, &b));
}

/// Fails the first `failures` introspections, then defers to a registry.
struct FlakyProvider {
    inner: Registry,
    failures: AtomicUsize,
}

impl IntrospectionProvider for FlakyProvider {
    fn type_name(&self, ty: HostTypeId) -> Option<Symbol> {
        self.inner.type_name(ty)
    }

    fn find_type(&self, name: &str) -> Option<HostTypeId> {
        self.inner.find_type(name)
    }

    fn members(&self, ty: TypeDescriptor) -> Result<Vec<MemberRecord>, IntrospectionError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(IntrospectionError::new("temporarily unavailable"));
        }
        self.inner.members(ty)
    }

    fn supertypes(&self, ty: HostTypeId) -> Vec<TypeDescriptor> {
        self.inner.supertypes(ty)
    }
}

#[test]
fn provider_failures_are_not_cached() {
    let mut inner = Registry::default();
    let scope = TypeDescriptor::Host(inner.define_type("Flaky", &[]));
    inner.add(scope, MemberRecord::constant("answer", Value::Int(42)));
    let provider = FlakyProvider {
        inner,
        failures: AtomicUsize::new(1),
    };
    let engine = DispatchEngine::new(Arc::new(provider), EngineConfig::default());
    let name = Symbol::intern("answer");

    let err = engine.resolve(name, Some(scope)).expect_err("first attempt fails");
    assert!(matches!(err, DispatchError::Introspection { .. }));
    assert_eq!(
        engine.resolve(name, Some(scope)).expect("retry succeeds"),
        Some(Value::Int(42))
    );
}

#[test]
fn prefixed_imports_strip_their_prefix() {
    let mut interp = interpreter(|registry, _| {
        let math = TypeDescriptor::Host(registry.define_type("Math", &[]));
        registry.add(math, MemberRecord::function("twice", &[T::Int], T::Int, |args, _| {
            match args.as_slice() {
                [Value::Int(v)] => Ok(Value::Int(v * 2)),
                _ => Ok(Value::Null),
            }
        }));
    });
    let math = interp.engine().find_type("Math").expect("registered");
    interp.engine().import(math, Some("m:"));
    assert_eq!(
        call(&mut interp, "m:twice", vec![Value::Int(4)]).expect("prefixed"),
        Value::Int(8)
    );
    assert!(interp.get(Symbol::intern("twice")).is_err());
}
