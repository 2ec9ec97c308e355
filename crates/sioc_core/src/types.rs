//! Type descriptors and the lattice used to compare them during dispatch.

use std::cmp::{Ordering, Reverse};
use std::collections::VecDeque;
use std::fmt;

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::introspect::IntrospectionProvider;

/// Index of a host type in an [`IntrospectionProvider`]'s registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HostTypeId(pub u32);

/// The dispatch-relevant type of a value or a declared parameter.
///
/// `Bool`, `Char`, `Int`, `Long` and `Double` are primitive-like: they carry a
/// widening rank and never accept null. Every other descriptor is structured
/// and sits under `Any` through a supertype chain. `Rest` only ever appears as
/// the trailing parameter of a variadic member record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TypeDescriptor {
    Any,
    Null,
    Bool,
    Char,
    Int,
    Long,
    Double,
    Number,
    Text,
    Symbol,
    List,
    Procedure,
    Rest,
    Host(HostTypeId),
}

impl TypeDescriptor {
    /// Builtin descriptors addressable by name in qualified member calls.
    pub const BUILTINS: &'static [TypeDescriptor] = &[
        TypeDescriptor::Any,
        TypeDescriptor::Null,
        TypeDescriptor::Bool,
        TypeDescriptor::Char,
        TypeDescriptor::Int,
        TypeDescriptor::Long,
        TypeDescriptor::Double,
        TypeDescriptor::Number,
        TypeDescriptor::Text,
        TypeDescriptor::Symbol,
        TypeDescriptor::List,
        TypeDescriptor::Procedure,
    ];

    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            TypeDescriptor::Bool
                | TypeDescriptor::Char
                | TypeDescriptor::Int
                | TypeDescriptor::Long
                | TypeDescriptor::Double
        )
    }

    /// Position in the primitive ordering; numeric kinds widen upward.
    fn primitive_rank(self) -> Option<u8> {
        match self {
            TypeDescriptor::Bool => Some(0),
            TypeDescriptor::Char => Some(1),
            TypeDescriptor::Int => Some(2),
            TypeDescriptor::Long => Some(3),
            TypeDescriptor::Double => Some(4),
            _ => None,
        }
    }

    fn is_numeric(self) -> bool {
        matches!(
            self,
            TypeDescriptor::Int | TypeDescriptor::Long | TypeDescriptor::Double
        )
    }

    /// Name of a builtin descriptor, `None` for host types.
    pub fn builtin_name(self) -> Option<&'static str> {
        Some(match self {
            TypeDescriptor::Any => "Any",
            TypeDescriptor::Null => "Null",
            TypeDescriptor::Bool => "Bool",
            TypeDescriptor::Char => "Char",
            TypeDescriptor::Int => "Int",
            TypeDescriptor::Long => "Long",
            TypeDescriptor::Double => "Double",
            TypeDescriptor::Number => "Number",
            TypeDescriptor::Text => "String",
            TypeDescriptor::Symbol => "Symbol",
            TypeDescriptor::List => "List",
            TypeDescriptor::Procedure => "Procedure",
            TypeDescriptor::Rest => "Rest",
            TypeDescriptor::Host(_) => return None,
        })
    }

    pub fn builtin_named(name: &str) -> Option<Self> {
        Self::BUILTINS
            .iter()
            .copied()
            .find(|ty| ty.builtin_name() == Some(name))
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Host(id) => write!(f, "Host#{}", id.0),
            other => f.write_str(other.builtin_name().unwrap_or("?")),
        }
    }
}

/// Sort key realising [`TypeLattice::specificity_order`].
///
/// Primitives come first in rank order. Structured kinds follow, deepest
/// first, so a subtype always precedes its supertypes; equal depths fall back
/// to the type name and finally the descriptor itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SpecificityKey {
    Primitive(u8),
    Structured(Reverse<usize>, String, StructuredTiebreak),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum StructuredTiebreak {
    Builtin,
    Host(HostTypeId),
}

/// Depth assigned to `Null`, below every structured descriptor.
const NULL_DEPTH: usize = usize::MAX;
/// Bound on supertype walks so a cyclic host registry cannot hang dispatch.
const MAX_DEPTH: usize = 64;

/// Assignability, joins and specificity over [`TypeDescriptor`]s.
///
/// Host supertypes come from the introspection provider; builtin kinds have a
/// fixed shape: numeric primitives box to `Number`, everything else hangs
/// directly under `Any`.
#[derive(Clone, Copy)]
pub struct TypeLattice<'a> {
    provider: &'a dyn IntrospectionProvider,
}

impl<'a> TypeLattice<'a> {
    pub fn new(provider: &'a dyn IntrospectionProvider) -> Self {
        Self { provider }
    }

    /// Direct supertypes, in declaration order.
    pub fn direct_supertypes(&self, ty: TypeDescriptor) -> Vec<TypeDescriptor> {
        match ty {
            TypeDescriptor::Any | TypeDescriptor::Rest => Vec::new(),
            TypeDescriptor::Int | TypeDescriptor::Long | TypeDescriptor::Double => {
                vec![TypeDescriptor::Number]
            }
            TypeDescriptor::Host(id) => {
                let supers = self.provider.supertypes(id);
                if supers.is_empty() {
                    vec![TypeDescriptor::Any]
                } else {
                    supers
                }
            }
            _ => vec![TypeDescriptor::Any],
        }
    }

    pub fn type_name(&self, ty: TypeDescriptor) -> String {
        match ty {
            TypeDescriptor::Host(id) => self
                .provider
                .type_name(id)
                .map(|name| name.as_str().to_string())
                .unwrap_or_else(|| ty.to_string()),
            other => other.to_string(),
        }
    }

    /// Can a value of type `from` be passed where `to` is declared?
    pub fn is_assignable(&self, from: TypeDescriptor, to: TypeDescriptor) -> bool {
        if from == to || to == TypeDescriptor::Any {
            return true;
        }
        if from == TypeDescriptor::Null {
            return !to.is_primitive();
        }
        match (from.primitive_rank(), to.primitive_rank()) {
            (Some(_), Some(_)) => {
                if from == TypeDescriptor::Bool || to == TypeDescriptor::Bool {
                    return false;
                }
                from.primitive_rank() <= to.primitive_rank()
            }
            (Some(_), None) => to == TypeDescriptor::Number && from.is_numeric(),
            (None, Some(_)) => false,
            (None, None) => self.is_structural_subtype(from, to),
        }
    }

    fn is_structural_subtype(&self, from: TypeDescriptor, to: TypeDescriptor) -> bool {
        let mut seen = FxHashSet::default();
        let mut queue = VecDeque::from([from]);
        while let Some(ty) = queue.pop_front() {
            if ty == to {
                return true;
            }
            if !seen.insert(ty) || seen.len() > MAX_DEPTH * 4 {
                continue;
            }
            queue.extend(self.direct_supertypes(ty));
        }
        false
    }

    /// Candidates for a join of `ty` with something else, nearest first.
    fn ancestors(&self, ty: TypeDescriptor) -> Vec<TypeDescriptor> {
        let mut out = vec![ty];
        if let Some(rank) = ty.primitive_rank() {
            if ty != TypeDescriptor::Bool {
                out.extend(
                    [TypeDescriptor::Int, TypeDescriptor::Long, TypeDescriptor::Double]
                        .into_iter()
                        .filter(|wider| wider.primitive_rank() > Some(rank)),
                );
            }
            if ty.is_numeric() {
                out.push(TypeDescriptor::Number);
            }
            out.push(TypeDescriptor::Any);
            return out;
        }
        let mut seen: FxHashSet<TypeDescriptor> = out.iter().copied().collect();
        let mut queue = VecDeque::from([ty]);
        while let Some(next) = queue.pop_front() {
            for sup in self.direct_supertypes(next) {
                if seen.insert(sup) {
                    out.push(sup);
                    queue.push_back(sup);
                }
            }
        }
        if !seen.contains(&TypeDescriptor::Any) {
            out.push(TypeDescriptor::Any);
        }
        out
    }

    /// Smallest descriptor both `t0` and `t1` are assignable to.
    pub fn join(&self, t0: TypeDescriptor, t1: TypeDescriptor) -> TypeDescriptor {
        if t0 == t1 {
            return t0;
        }
        if self.is_assignable(t0, t1) {
            return t1;
        }
        if self.is_assignable(t1, t0) {
            return t0;
        }
        self.ancestors(t0)
            .into_iter()
            .find(|candidate| self.is_assignable(t1, *candidate))
            .unwrap_or(TypeDescriptor::Any)
    }

    /// Longest supertype path from `ty` up to `Any`.
    fn depth(&self, ty: TypeDescriptor, budget: usize) -> usize {
        if ty == TypeDescriptor::Any || budget == 0 {
            return 0;
        }
        self.direct_supertypes(ty)
            .into_iter()
            .map(|sup| 1 + self.depth(sup, budget - 1))
            .max()
            .unwrap_or(0)
    }

    fn specificity_key(&self, ty: TypeDescriptor) -> SpecificityKey {
        if let Some(rank) = ty.primitive_rank() {
            return SpecificityKey::Primitive(rank);
        }
        let depth = if ty == TypeDescriptor::Null {
            NULL_DEPTH
        } else {
            self.depth(ty, MAX_DEPTH)
        };
        let tiebreak = match ty {
            TypeDescriptor::Host(id) => StructuredTiebreak::Host(id),
            _ => StructuredTiebreak::Builtin,
        };
        SpecificityKey::Structured(Reverse(depth), self.type_name(ty), tiebreak)
    }

    /// Strict total order placing more specific descriptors first.
    pub fn specificity_order(&self, t0: TypeDescriptor, t1: TypeDescriptor) -> Ordering {
        if t0 == t1 {
            return Ordering::Equal;
        }
        self.specificity_key(t0).cmp(&self.specificity_key(t1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::Registry;

    fn registry() -> (Registry, HostTypeId, HostTypeId, HostTypeId) {
        let mut registry = Registry::default();
        let shape = registry.define_type("Shape", &[]);
        let circle = registry.define_type("Circle", &[TypeDescriptor::Host(shape)]);
        let ratio = registry.define_type("Ratio", &[TypeDescriptor::Number]);
        (registry, shape, circle, ratio)
    }

    #[test]
    fn primitives_widen_but_never_accept_null() {
        let (registry, ..) = registry();
        let lattice = TypeLattice::new(&registry);
        assert!(lattice.is_assignable(TypeDescriptor::Int, TypeDescriptor::Long));
        assert!(lattice.is_assignable(TypeDescriptor::Int, TypeDescriptor::Double));
        assert!(lattice.is_assignable(TypeDescriptor::Char, TypeDescriptor::Int));
        assert!(!lattice.is_assignable(TypeDescriptor::Double, TypeDescriptor::Int));
        assert!(!lattice.is_assignable(TypeDescriptor::Bool, TypeDescriptor::Int));
        assert!(!lattice.is_assignable(TypeDescriptor::Null, TypeDescriptor::Int));
        assert!(lattice.is_assignable(TypeDescriptor::Null, TypeDescriptor::Text));
        assert!(lattice.is_assignable(TypeDescriptor::Int, TypeDescriptor::Number));
        assert!(!lattice.is_assignable(TypeDescriptor::Number, TypeDescriptor::Int));
        assert!(!lattice.is_assignable(TypeDescriptor::Char, TypeDescriptor::Number));
    }

    #[test]
    fn host_types_follow_registered_supertypes() {
        let (registry, shape, circle, ratio) = registry();
        let lattice = TypeLattice::new(&registry);
        let shape = TypeDescriptor::Host(shape);
        let circle = TypeDescriptor::Host(circle);
        let ratio = TypeDescriptor::Host(ratio);
        assert!(lattice.is_assignable(circle, shape));
        assert!(!lattice.is_assignable(shape, circle));
        assert!(lattice.is_assignable(ratio, TypeDescriptor::Number));
        assert!(lattice.is_assignable(circle, TypeDescriptor::Any));
        assert!(!lattice.is_assignable(circle, TypeDescriptor::Number));
    }

    #[test]
    fn join_finds_the_nearest_common_descriptor() {
        let (registry, shape, circle, ratio) = registry();
        let lattice = TypeLattice::new(&registry);
        assert_eq!(
            lattice.join(TypeDescriptor::Int, TypeDescriptor::Double),
            TypeDescriptor::Double
        );
        assert_eq!(
            lattice.join(TypeDescriptor::Int, TypeDescriptor::Host(ratio)),
            TypeDescriptor::Number
        );
        assert_eq!(
            lattice.join(TypeDescriptor::Host(circle), TypeDescriptor::Host(shape)),
            TypeDescriptor::Host(shape)
        );
        assert_eq!(
            lattice.join(TypeDescriptor::Text, TypeDescriptor::Symbol),
            TypeDescriptor::Any
        );
        assert_eq!(
            lattice.join(TypeDescriptor::Null, TypeDescriptor::Text),
            TypeDescriptor::Text
        );
    }

    #[test]
    fn specificity_puts_primitives_then_subtypes_first() {
        let (registry, shape, circle, _) = registry();
        let lattice = TypeLattice::new(&registry);
        let shape = TypeDescriptor::Host(shape);
        let circle = TypeDescriptor::Host(circle);
        assert_eq!(
            lattice.specificity_order(TypeDescriptor::Int, TypeDescriptor::Number),
            Ordering::Less
        );
        assert_eq!(
            lattice.specificity_order(TypeDescriptor::Int, TypeDescriptor::Double),
            Ordering::Less
        );
        assert_eq!(lattice.specificity_order(circle, shape), Ordering::Less);
        assert_eq!(lattice.specificity_order(shape, circle), Ordering::Greater);
        assert_eq!(
            lattice.specificity_order(TypeDescriptor::Any, TypeDescriptor::Text),
            Ordering::Greater
        );
        // Unrelated kinds at the same depth order by name.
        assert_eq!(
            lattice.specificity_order(TypeDescriptor::Number, TypeDescriptor::Text),
            Ordering::Less
        );
    }
}
