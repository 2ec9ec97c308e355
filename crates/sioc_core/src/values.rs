use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::dispatch::Callable;
use crate::intern::Symbol;
use crate::types::{HostTypeId, TypeDescriptor};

/// Runtime values: a closed set of builtin kinds plus opaque host objects.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Int(i32),
    Long(i64),
    Double(f64),
    Text(Arc<str>),
    Symbol(Symbol),
    List(Arc<Vec<Value>>),
    Procedure(Callable),
    Host(HostObject),
}

/// An instance of a registered host type.
#[derive(Clone)]
pub struct HostObject {
    ty: HostTypeId,
    type_name: Symbol,
    data: Arc<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new(ty: HostTypeId, type_name: Symbol, data: impl Any + Send + Sync) -> Self {
        Self {
            ty,
            type_name,
            data: Arc::new(data),
        }
    }

    pub fn host_type(&self) -> HostTypeId {
        self.ty
    }

    pub fn type_name(&self) -> Symbol {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Value {
    pub fn text(text: &str) -> Self {
        Value::Text(Arc::from(text))
    }

    pub fn symbol(name: &str) -> Self {
        Value::Symbol(Symbol::intern(name))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    /// Runtime type used to test dispatch guards.
    pub fn type_descriptor(&self) -> TypeDescriptor {
        match self {
            Value::Null => TypeDescriptor::Null,
            Value::Bool(_) => TypeDescriptor::Bool,
            Value::Char(_) => TypeDescriptor::Char,
            Value::Int(_) => TypeDescriptor::Int,
            Value::Long(_) => TypeDescriptor::Long,
            Value::Double(_) => TypeDescriptor::Double,
            Value::Text(_) => TypeDescriptor::Text,
            Value::Symbol(_) => TypeDescriptor::Symbol,
            Value::List(_) => TypeDescriptor::List,
            Value::Procedure(_) => TypeDescriptor::Procedure,
            Value::Host(obj) => TypeDescriptor::Host(obj.ty),
        }
    }

    /// Convert to the representation of a primitive parameter kind.
    ///
    /// Assumes assignability was already checked; non-primitive targets and
    /// non-numeric values pass through untouched.
    pub(crate) fn widen_to(self, ty: TypeDescriptor) -> Value {
        match (ty, self) {
            (TypeDescriptor::Int, Value::Char(c)) => Value::Int(c as i32),
            (TypeDescriptor::Long, Value::Char(c)) => Value::Long(c as i64),
            (TypeDescriptor::Long, Value::Int(v)) => Value::Long(v as i64),
            (TypeDescriptor::Double, Value::Char(c)) => Value::Double(c as u32 as f64),
            (TypeDescriptor::Double, Value::Int(v)) => Value::Double(v as f64),
            (TypeDescriptor::Double, Value::Long(v)) => Value::Double(v as f64),
            (_, value) => value,
        }
    }

    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn as_procedure(&self) -> Option<&Callable> {
        match self {
            Value::Procedure(callable) => Some(callable),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Procedure(a), Value::Procedure(b)) => a.same_dispatch(b),
            (Value::Host(a), Value::Host(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::Char(v) => f.debug_tuple("Char").field(v).finish(),
            Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Value::Long(v) => f.debug_tuple("Long").field(v).finish(),
            Value::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Value::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Value::Symbol(v) => f.debug_tuple("Symbol").field(&v.as_str()).finish(),
            Value::List(v) => f.debug_tuple("List").field(v).finish(),
            Value::Procedure(callable) => write!(f, "Procedure({})", callable.name()),
            Value::Host(obj) => write!(f, "Host({})", obj.type_name),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::text(value)
    }
}
