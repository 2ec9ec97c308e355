//! Per-type cache of introspected members and resolved lookups.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::intern::Symbol;
use crate::introspect::{MemberImpl, MemberKind, MemberRecord};
use crate::types::TypeDescriptor;
use crate::values::Value;

use super::candidate::CandidateSet;

/// Which members a lookup may see, by static-ness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OriginFilter {
    Static,
    Instance,
    Any,
}

impl OriginFilter {
    fn admits(self, member: &MemberRecord) -> bool {
        match self {
            OriginFilter::Static => member.is_static,
            OriginFilter::Instance => !member.is_static,
            OriginFilter::Any => true,
        }
    }
}

/// Everything that distinguishes one cached lookup from another on a type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LookupKey {
    pub(crate) key: Symbol,
    pub(crate) kind: MemberKind,
    pub(crate) origin: OriginFilter,
    /// Instance members take the interpreter as receiver instead of an argument.
    pub(crate) bind_receiver: bool,
    pub(crate) pin: Option<usize>,
}

impl LookupKey {
    /// Does `member` answer this lookup? Plain calls also see static
    /// constants of the same name.
    pub(crate) fn admits(&self, member: &MemberRecord) -> bool {
        if member.name != self.key || !self.origin.admits(member) {
            return false;
        }
        member.kind == self.kind
            || (self.kind == MemberKind::Method
                && member.kind == MemberKind::FieldGet
                && member.is_static
                && matches!(member.imp, MemberImpl::Constant(_)))
    }
}

/// Outcome of candidate discovery for one key.
#[derive(Debug, Clone)]
pub(crate) enum Lookup {
    Found(Arc<CandidateSet>),
    Constant(Value),
    NotFound,
}

/// Cached view of one type: its members, supertypes and past lookups.
///
/// Records are created once per type and shared. Both caches only ever gain
/// entries; a racing insert keeps whichever value arrived first.
pub struct MetaobjectRecord {
    ty: TypeDescriptor,
    members: Vec<MemberRecord>,
    supertypes: Vec<TypeDescriptor>,
    lookups: RwLock<FxHashMap<LookupKey, Lookup>>,
    resolved: RwLock<FxHashMap<LookupKey, Option<Value>>>,
}

impl MetaobjectRecord {
    pub(crate) fn new(
        ty: TypeDescriptor,
        members: Vec<MemberRecord>,
        supertypes: Vec<TypeDescriptor>,
    ) -> Self {
        Self {
            ty,
            members,
            supertypes,
            lookups: RwLock::new(FxHashMap::default()),
            resolved: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn ty(&self) -> TypeDescriptor {
        self.ty
    }

    pub fn members(&self) -> &[MemberRecord] {
        &self.members
    }

    pub fn supertypes(&self) -> &[TypeDescriptor] {
        &self.supertypes
    }

    pub(crate) fn cached_lookup(&self, key: &LookupKey) -> Option<Lookup> {
        self.lookups.read().get(key).cloned()
    }

    pub(crate) fn store_lookup(&self, key: LookupKey, lookup: Lookup) -> Lookup {
        self.lookups.write().entry(key).or_insert(lookup).clone()
    }

    pub(crate) fn cached_resolution(&self, key: &LookupKey) -> Option<Option<Value>> {
        self.resolved.read().get(key).cloned()
    }

    pub(crate) fn store_resolution(&self, key: LookupKey, value: Option<Value>) -> Option<Value> {
        self.resolved.write().entry(key).or_insert(value).clone()
    }
}

impl std::fmt::Debug for MetaobjectRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaobjectRecord")
            .field("ty", &self.ty)
            .field("members", &self.members.len())
            .field("supertypes", &self.supertypes)
            .finish()
    }
}
