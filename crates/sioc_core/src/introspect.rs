//! The boundary through which the engine learns about host-backed members.
//!
//! The engine never mutates what a provider reports and treats it as the only
//! source of candidates. [`Registry`] is the explicit registration table used
//! by the builtin library and by embedders.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::intern::Symbol;
use crate::mangle::mangle_symbol;
use crate::runtime::{Interpreter, RuntimeError};
use crate::types::{HostTypeId, TypeDescriptor};
use crate::values::Value;

pub type NativeFn =
    dyn Fn(Vec<Value>, &mut Interpreter) -> Result<Value, RuntimeError> + Send + Sync;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MemberKind {
    FieldGet,
    FieldSet,
    Method,
    Constructor,
}

#[derive(Clone)]
pub enum MemberImpl {
    Native(Arc<NativeFn>),
    Constant(Value),
}

/// One member as reported by a provider.
///
/// `params` lists the declared parameters only; the receiver of an instance
/// member is implicit. A variadic member ends its parameter list with
/// [`TypeDescriptor::Rest`].
#[derive(Clone)]
pub struct MemberRecord {
    pub name: Symbol,
    pub kind: MemberKind,
    pub params: Vec<TypeDescriptor>,
    pub ret: TypeDescriptor,
    pub is_variadic: bool,
    pub is_static: bool,
    pub imp: MemberImpl,
}

impl MemberRecord {
    /// A static method; `name` is the surface name and is mangled here.
    pub fn function(
        name: &str,
        params: &[TypeDescriptor],
        ret: TypeDescriptor,
        func: impl Fn(Vec<Value>, &mut Interpreter) -> Result<Value, RuntimeError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            name: mangle_symbol(name),
            kind: MemberKind::Method,
            params: params.to_vec(),
            ret,
            is_variadic: false,
            is_static: true,
            imp: MemberImpl::Native(Arc::new(func)),
        }
    }

    /// A static field holding a fixed value.
    pub fn constant(name: &str, value: Value) -> Self {
        Self {
            name: mangle_symbol(name),
            kind: MemberKind::FieldGet,
            ret: value.type_descriptor(),
            params: Vec::new(),
            is_variadic: false,
            is_static: true,
            imp: MemberImpl::Constant(value),
        }
    }

    /// Field reader; the native function receives the receiver as its only argument.
    pub fn getter(
        name: &str,
        ret: TypeDescriptor,
        func: impl Fn(Vec<Value>, &mut Interpreter) -> Result<Value, RuntimeError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            kind: MemberKind::FieldGet,
            is_static: false,
            ..Self::function(name, &[], ret, func)
        }
    }

    /// Field writer; the native function receives the receiver and the new value.
    pub fn setter(
        name: &str,
        ty: TypeDescriptor,
        func: impl Fn(Vec<Value>, &mut Interpreter) -> Result<Value, RuntimeError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            kind: MemberKind::FieldSet,
            is_static: false,
            ..Self::function(name, &[ty], TypeDescriptor::Null, func)
        }
    }

    pub fn constructor(
        params: &[TypeDescriptor],
        ret: TypeDescriptor,
        func: impl Fn(Vec<Value>, &mut Interpreter) -> Result<Value, RuntimeError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            kind: MemberKind::Constructor,
            ..Self::function("new", params, ret, func)
        }
    }

    /// Mark the member variadic and append the rest marker when missing.
    pub fn variadic(mut self) -> Self {
        if self.params.last() != Some(&TypeDescriptor::Rest) {
            self.params.push(TypeDescriptor::Rest);
        }
        self.is_variadic = true;
        self
    }

    /// Turn a static member into an instance member with an implicit receiver.
    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }
}

impl fmt::Debug for MemberRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberRecord")
            .field("name", &self.name.as_str())
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .field("is_variadic", &self.is_variadic)
            .field("is_static", &self.is_static)
            .finish()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct IntrospectionError {
    pub message: String,
}

impl IntrospectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Lists the members and supertypes of host types.
pub trait IntrospectionProvider: Send + Sync {
    fn type_name(&self, ty: HostTypeId) -> Option<Symbol>;

    fn find_type(&self, name: &str) -> Option<HostTypeId>;

    /// Members declared directly on `ty`, in declaration order.
    fn members(&self, ty: TypeDescriptor) -> Result<Vec<MemberRecord>, IntrospectionError>;

    /// Direct supertypes of a host type, in declaration order.
    fn supertypes(&self, ty: HostTypeId) -> Vec<TypeDescriptor>;
}

struct HostTypeEntry {
    name: Symbol,
    supertypes: Vec<TypeDescriptor>,
}

/// Registration-table provider.
#[derive(Default)]
pub struct Registry {
    types: Vec<HostTypeEntry>,
    by_name: FxHashMap<Symbol, HostTypeId>,
    members: FxHashMap<TypeDescriptor, Vec<MemberRecord>>,
}

impl Registry {
    /// Declare a host type. Re-declaring a name returns the existing id.
    pub fn define_type(&mut self, name: &str, supertypes: &[TypeDescriptor]) -> HostTypeId {
        let name = Symbol::intern(name);
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }
        let id = HostTypeId(self.types.len() as u32);
        self.types.push(HostTypeEntry {
            name,
            supertypes: supertypes.to_vec(),
        });
        self.by_name.insert(name, id);
        id
    }

    pub fn add(&mut self, ty: TypeDescriptor, member: MemberRecord) -> &mut Self {
        self.members.entry(ty).or_default().push(member);
        self
    }

    pub fn add_all(
        &mut self,
        ty: TypeDescriptor,
        members: impl IntoIterator<Item = MemberRecord>,
    ) -> &mut Self {
        self.members.entry(ty).or_default().extend(members);
        self
    }
}

impl IntrospectionProvider for Registry {
    fn type_name(&self, ty: HostTypeId) -> Option<Symbol> {
        self.types.get(ty.0 as usize).map(|entry| entry.name)
    }

    fn find_type(&self, name: &str) -> Option<HostTypeId> {
        self.by_name.get(&Symbol::intern(name)).copied()
    }

    fn members(&self, ty: TypeDescriptor) -> Result<Vec<MemberRecord>, IntrospectionError> {
        if let TypeDescriptor::Host(id) = ty {
            if self.types.get(id.0 as usize).is_none() {
                return Err(IntrospectionError::new(format!(
                    "unknown host type #{}",
                    id.0
                )));
            }
        }
        Ok(self.members.get(&ty).cloned().unwrap_or_default())
    }

    fn supertypes(&self, ty: HostTypeId) -> Vec<TypeDescriptor> {
        self.types
            .get(ty.0 as usize)
            .map(|entry| entry.supertypes.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redefining_a_type_returns_the_first_id() {
        let mut registry = Registry::default();
        let base = registry.define_type("Base", &[]);
        let derived = registry.define_type("Derived", &[TypeDescriptor::Host(base)]);
        assert_eq!(registry.define_type("Base", &[TypeDescriptor::Any]), base);
        assert_eq!(registry.find_type("Derived"), Some(derived));
        assert_eq!(registry.supertypes(derived), vec![TypeDescriptor::Host(base)]);
        assert!(registry.supertypes(base).is_empty());
        assert_eq!(registry.type_name(base).map(|s| s.as_str()), Some("Base"));
    }

    #[test]
    fn members_of_unknown_host_types_are_errors() {
        let registry = Registry::default();
        assert!(registry.members(TypeDescriptor::Host(HostTypeId(9))).is_err());
        assert!(
            registry
                .members(TypeDescriptor::Text)
                .expect("builtin type")
                .is_empty()
        );
    }

    #[test]
    fn builders_mangle_names_and_mark_variadics() {
        let noop = |_: Vec<Value>, _: &mut Interpreter| Ok::<_, RuntimeError>(Value::Null);
        let member =
            MemberRecord::function("list->vector", &[TypeDescriptor::Any], TypeDescriptor::Any, noop)
                .variadic()
                .variadic();
        assert_eq!(member.name.as_str(), "list_Gvector");
        assert_eq!(member.params, vec![TypeDescriptor::Any, TypeDescriptor::Rest]);
        assert!(member.is_variadic && member.is_static);

        let getter = MemberRecord::getter("x", TypeDescriptor::Int, noop);
        assert_eq!((getter.kind, getter.is_static), (MemberKind::FieldGet, false));
        let ctor = MemberRecord::constructor(&[], TypeDescriptor::Any, noop);
        assert_eq!(ctor.kind, MemberKind::Constructor);
    }

    #[test]
    fn signatures_serialize_for_embedders() {
        let member = MemberRecord::constant("limit", Value::Int(10));
        let json = serde_json::to_value((member.name, member.kind, &member.params, member.ret))
            .expect("serialize");
        assert_eq!(json, serde_json::json!(["limit", "FieldGet", [], "Int"]));
        assert_eq!(
            serde_json::to_value(TypeDescriptor::Host(HostTypeId(3))).expect("serialize"),
            serde_json::json!({ "Host": 3 })
        );
    }
}
