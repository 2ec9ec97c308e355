use std::fmt;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::intern::Symbol;
use crate::introspect::{MemberImpl, MemberKind, MemberRecord};
use crate::mangle::demangle;
use crate::runtime::{Interpreter, RuntimeError};
use crate::types::{TypeDescriptor, TypeLattice};
use crate::values::Value;

/// Where the receiver of a candidate comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    Static,
    /// Instance member; `bound` means the receiver is the interpreter itself
    /// rather than the first argument.
    Instance { bound: bool },
}

/// One concrete implementation considered for a dispatched call.
///
/// `params` holds the fixed parameters only, so its length is the arity. A
/// variadic candidate collects every argument past the arity into one list.
pub struct Candidate {
    name: Symbol,
    key: Symbol,
    owner: TypeDescriptor,
    kind: MemberKind,
    origin: Origin,
    params: Vec<TypeDescriptor>,
    ret: TypeDescriptor,
    variadic: bool,
    imp: MemberImpl,
}

/// A member whose rest marker disagrees with its declared variadic flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InconsistentVariadic {
    pub(crate) arity: usize,
}

impl Candidate {
    pub(crate) fn from_member(
        member: &MemberRecord,
        owner: TypeDescriptor,
        bind_receiver: bool,
    ) -> Result<Self, InconsistentVariadic> {
        let explicit_receiver = !member.is_static && !bind_receiver;
        let rest_markers = member
            .params
            .iter()
            .filter(|ty| **ty == TypeDescriptor::Rest)
            .count();
        let trailing_rest = member.params.last() == Some(&TypeDescriptor::Rest);
        if trailing_rest != member.is_variadic || rest_markers > usize::from(trailing_rest) {
            return Err(InconsistentVariadic {
                arity: member.params.len() - rest_markers + usize::from(explicit_receiver),
            });
        }

        let mut params = member.params.clone();
        if member.is_variadic {
            params.pop();
        }
        if explicit_receiver {
            params.insert(0, owner);
        }
        let name = demangle(member.name.as_str())
            .map(|text| Symbol::intern(&text))
            .unwrap_or(member.name);
        Ok(Self {
            name,
            key: member.name,
            owner,
            kind: member.kind,
            origin: if member.is_static {
                Origin::Static
            } else {
                Origin::Instance {
                    bound: bind_receiver,
                }
            },
            params,
            ret: member.ret,
            variadic: member.is_variadic,
            imp: member.imp.clone(),
        })
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn key(&self) -> Symbol {
        self.key
    }

    pub fn owner(&self) -> TypeDescriptor {
        self.owner
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn params(&self) -> &[TypeDescriptor] {
        &self.params
    }

    pub fn ret(&self) -> TypeDescriptor {
        self.ret
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Byte-identical parameter signature, the dedup criterion within a set.
    pub fn same_signature(&self, other: &Candidate) -> bool {
        self.variadic == other.variadic && self.params == other.params
    }

    /// Do the fixed positions of `args` fit the declared parameter types?
    pub fn matches_prefix(&self, lattice: &TypeLattice<'_>, args: &[Value]) -> bool {
        args.len() >= self.params.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| lattice.is_assignable(arg.type_descriptor(), *param))
    }

    /// Full applicability: argument count plus every fixed position.
    pub fn accepts(&self, lattice: &TypeLattice<'_>, args: &[Value]) -> bool {
        let count_ok = if self.variadic {
            args.len() >= self.params.len()
        } else {
            args.len() == self.params.len()
        };
        count_ok && self.matches_prefix(lattice, args)
    }

    pub fn invoke(
        &self,
        mut args: Vec<Value>,
        interp: &mut Interpreter,
    ) -> Result<Value, RuntimeError> {
        let engine = interp.engine().clone();
        if !self.accepts(&engine.lattice(), &args) {
            return Err(no_applicable_overload(self.name.as_str(), &args).into());
        }
        let rest = if self.variadic {
            Some(args.split_off(self.params.len()))
        } else {
            None
        };
        let mut call_args: Vec<Value> = args
            .into_iter()
            .zip(&self.params)
            .map(|(arg, param)| arg.widen_to(*param))
            .collect();
        if let Some(rest) = rest {
            call_args.push(Value::list(rest));
        }
        match &self.imp {
            MemberImpl::Native(func) => func(call_args, interp),
            MemberImpl::Constant(value) => Ok(value.clone()),
        }
    }

    /// `name(T0, T1, ...)` using host type names from `lattice`.
    pub fn signature(&self, lattice: &TypeLattice<'_>) -> String {
        let mut parts: Vec<String> = self
            .params
            .iter()
            .map(|param| lattice.type_name(*param))
            .collect();
        if self.variadic {
            parts.push("...".to_string());
        }
        format!("{}({})", self.name, parts.join(", "))
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("name", &self.name.as_str())
            .field("owner", &self.owner)
            .field("kind", &self.kind)
            .field("origin", &self.origin)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .field("variadic", &self.variadic)
            .finish()
    }
}

pub(crate) fn no_applicable_overload(name: &str, args: &[Value]) -> DispatchError {
    DispatchError::NoApplicableOverload {
        name: name.to_string(),
        arity: args.len(),
        arg_types: args.iter().map(Value::type_descriptor).collect(),
    }
}

/// Candidates found for one lookup key, deduplicated by signature.
#[derive(Debug, Default)]
pub struct CandidateSet {
    candidates: Vec<Arc<Candidate>>,
}

impl CandidateSet {
    /// Add `candidate` unless one with an identical signature is already present.
    pub(crate) fn insert(&mut self, candidate: Arc<Candidate>) -> bool {
        if self
            .candidates
            .iter()
            .any(|existing| existing.same_signature(&candidate))
        {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Candidate>> {
        self.candidates.iter()
    }

    pub fn to_vec(&self) -> Vec<Arc<Candidate>> {
        self.candidates.clone()
    }
}
