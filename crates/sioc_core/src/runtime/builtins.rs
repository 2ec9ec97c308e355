use std::path::Path;

use crate::intern::Symbol;
use crate::introspect::{MemberRecord, Registry};
use crate::printer::{display_string, write_string};
use crate::reader::Reader;
use crate::types::{HostTypeId, TypeDescriptor as T};
use crate::values::Value;

use super::{Interpreter, RuntimeError};

/// Name of the default root scope.
pub const ROOT_SCOPE: &str = "sioc";

/// Split `args` into exactly `N` values.
fn take<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], RuntimeError> {
    let count = args.len();
    args.try_into().map_err(|_| {
        RuntimeError::Message(format!("{name}: expected {N} argument(s), got {count}"))
    })
}

fn expected(name: &str, what: &str, got: &Value) -> RuntimeError {
    RuntimeError::Message(format!("{name}: expected {what}, got {}", write_string(got)))
}

/// Register the root scope type `scope_name` and its members.
pub fn register_builtins(registry: &mut Registry, scope_name: &str) -> HostTypeId {
    let root = registry.define_type(scope_name, &[]);
    let scope = T::Host(root);
    registry.add_all(scope, list_members());
    registry.add_all(scope, symbol_members());
    registry.add_all(scope, arithmetic_members());
    registry.add_all(scope, io_members());
    registry.add_all(scope, evaluator_members());
    registry.add(scope, MemberRecord::constant("null", Value::Null));
    root
}

fn list_members() -> Vec<MemberRecord> {
    vec![
        MemberRecord::function("list", &[T::Any, T::Any], T::List, |args, _| {
            Ok(Value::list(args))
        }),
        MemberRecord::function("list", &[T::Rest], T::List, |args, _| {
            let [rest] = take("list", args)?;
            Ok(rest)
        })
        .variadic(),
        MemberRecord::function("null?", &[T::Any], T::Bool, |args, _| {
            let [value] = take("null?", args)?;
            Ok(Value::Bool(matches!(value, Value::Null)))
        }),
        MemberRecord::function("procedure?", &[T::Any], T::Bool, |args, _| {
            let [value] = take("procedure?", args)?;
            Ok(Value::Bool(value.as_procedure().is_some()))
        }),
    ]
}

fn symbol_members() -> Vec<MemberRecord> {
    vec![
        MemberRecord::function("symbol->string", &[T::Symbol], T::Text, |args, _| {
            match take("symbol->string", args)? {
                [Value::Symbol(sym)] => Ok(Value::text(sym.as_str())),
                [other] => Err(expected("symbol->string", "a symbol", &other)),
            }
        }),
        MemberRecord::function("string->symbol", &[T::Text], T::Symbol, |args, _| {
            match take("string->symbol", args)? {
                [Value::Text(text)] => Ok(Value::Symbol(Symbol::intern(&text))),
                [other] => Err(expected("string->symbol", "a string", &other)),
            }
        }),
        MemberRecord::function("symbol?", &[T::Any], T::Bool, |args, _| {
            let [value] = take("symbol?", args)?;
            Ok(Value::Bool(matches!(value, Value::Symbol(_))))
        }),
    ]
}

fn int_op(name: &'static str, op: fn(i32, i32) -> Option<i32>) -> MemberRecord {
    MemberRecord::function(name, &[T::Int, T::Int], T::Int, move |args, _| {
        match take(name, args)? {
            [Value::Int(a), Value::Int(b)] => op(a, b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::Message(format!("{name}: division by zero"))),
            [a, _] => Err(expected(name, "integers", &a)),
        }
    })
}

fn long_op(name: &'static str, op: fn(i64, i64) -> Option<i64>) -> MemberRecord {
    MemberRecord::function(name, &[T::Long, T::Long], T::Long, move |args, _| {
        match take(name, args)? {
            [Value::Long(a), Value::Long(b)] => op(a, b)
                .map(Value::Long)
                .ok_or_else(|| RuntimeError::Message(format!("{name}: division by zero"))),
            [a, _] => Err(expected(name, "longs", &a)),
        }
    })
}

fn double_op(name: &'static str, op: fn(f64, f64) -> f64) -> MemberRecord {
    MemberRecord::function(name, &[T::Double, T::Double], T::Double, move |args, _| {
        match take(name, args)? {
            [Value::Double(a), Value::Double(b)] => Ok(Value::Double(op(a, b))),
            [a, _] => Err(expected(name, "doubles", &a)),
        }
    })
}

fn arithmetic_members() -> Vec<MemberRecord> {
    fn int_div(a: i32, b: i32) -> Option<i32> {
        (b != 0).then(|| a.wrapping_div(b))
    }
    fn long_div(a: i64, b: i64) -> Option<i64> {
        (b != 0).then(|| a.wrapping_div(b))
    }
    vec![
        int_op("+", |a, b| Some(a.wrapping_add(b))),
        long_op("+", |a, b| Some(a.wrapping_add(b))),
        double_op("+", |a, b| a + b),
        int_op("-", |a, b| Some(a.wrapping_sub(b))),
        long_op("-", |a, b| Some(a.wrapping_sub(b))),
        double_op("-", |a, b| a - b),
        int_op("*", |a, b| Some(a.wrapping_mul(b))),
        long_op("*", |a, b| Some(a.wrapping_mul(b))),
        double_op("*", |a, b| a * b),
        int_op("/", int_div),
        long_op("/", long_div),
        double_op("/", |a, b| a / b),
        MemberRecord::function("-", &[T::Int], T::Int, |args, _| match take("-", args)? {
            [Value::Int(v)] => Ok(Value::Int(v.wrapping_neg())),
            [other] => Err(expected("-", "an integer", &other)),
        }),
        MemberRecord::function("-", &[T::Long], T::Long, |args, _| match take("-", args)? {
            [Value::Long(v)] => Ok(Value::Long(v.wrapping_neg())),
            [other] => Err(expected("-", "a long", &other)),
        }),
        MemberRecord::function("-", &[T::Double], T::Double, |args, _| {
            match take("-", args)? {
                [Value::Double(v)] => Ok(Value::Double(-v)),
                [other] => Err(expected("-", "a double", &other)),
            }
        }),
    ]
}

fn io_members() -> Vec<MemberRecord> {
    let print = |name: &'static str| {
        MemberRecord::function(name, &[T::Any], T::Null, move |args, interp| {
            let [value] = take(name, args)?;
            interp.write_output(&write_string(&value))?;
            Ok(Value::Null)
        })
        .instance()
    };
    vec![
        MemberRecord::function("display", &[T::Any], T::Null, |args, interp| {
            let [value] = take("display", args)?;
            interp.write_output(&display_string(&value))?;
            Ok(Value::Null)
        })
        .instance(),
        print("write"),
        print("print"),
        MemberRecord::function("newline", &[], T::Null, |_, interp| {
            interp.write_output("\n")?;
            Ok(Value::Null)
        })
        .instance(),
        MemberRecord::function("display-to-string", &[T::Any], T::Text, |args, _| {
            let [value] = take("display-to-string", args)?;
            Ok(Value::text(&display_string(&value)))
        }),
        MemberRecord::function("print-to-string", &[T::Any], T::Text, |args, _| {
            let [value] = take("print-to-string", args)?;
            Ok(Value::text(&write_string(&value)))
        }),
    ]
}

fn evaluator_members() -> Vec<MemberRecord> {
    vec![
        MemberRecord::function("eval", &[T::Any], T::Any, |args, interp| {
            let [expr] = take("eval", args)?;
            interp.eval(&expr)
        })
        .instance(),
        MemberRecord::function("read-from-string", &[T::Text], T::Any, |args, _| {
            match take("read-from-string", args)? {
                [Value::Text(src)] => Ok(Reader::new(&src).read()?.unwrap_or(Value::Null)),
                [other] => Err(expected("read-from-string", "a string", &other)),
            }
        }),
        MemberRecord::function("load", &[T::Text], T::Any, |args, interp| {
            match take("load", args)? {
                [Value::Text(path)] => interp.load_file(Path::new(&*path)),
                [other] => Err(expected("load", "a path", &other)),
            }
        })
        .instance(),
        MemberRecord::function("load-from-string", &[T::Text], T::Any, |args, interp| {
            match take("load-from-string", args)? {
                [Value::Text(src)] => interp.eval_source(&src),
                [other] => Err(expected("load-from-string", "a string", &other)),
            }
        })
        .instance(),
        MemberRecord::function("import", &[T::Text], T::Null, |args, interp| {
            match take("import", args)? {
                [Value::Text(scope)] => import(interp, &scope, None),
                [other] => Err(expected("import", "a type name", &other)),
            }
        })
        .instance(),
        MemberRecord::function("import", &[T::Text, T::Text], T::Null, |args, interp| {
            match take("import", args)? {
                [Value::Text(scope), Value::Text(prefix)] => import(interp, &scope, Some(&prefix)),
                [other, _] => Err(expected("import", "a type name and a prefix", &other)),
            }
        })
        .instance(),
    ]
}

fn import(interp: &mut Interpreter, scope: &str, prefix: Option<&str>) -> Result<Value, RuntimeError> {
    let engine = interp.engine();
    let ty = engine
        .find_type(scope)
        .ok_or_else(|| RuntimeError::Message(format!("import: unknown type {scope}")))?;
    engine.import(ty, prefix);
    Ok(Value::Null)
}
