//! Multiple dispatch over host-backed members.
//!
//! A name is classified into a [`NameForm`], its candidates are discovered
//! through the [`IntrospectionProvider`] and cached per type, and the result is
//! merged into a [`Callable`] that selects by argument count and then by
//! argument type on every call.

mod arity;
mod candidate;
mod metaobject;
mod overload;
mod selector;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::DispatchError;
use crate::intern::Symbol;
use crate::introspect::{IntrospectionProvider, MemberImpl, MemberKind};
use crate::runtime::{Interpreter, RuntimeError};
use crate::types::{TypeDescriptor, TypeLattice};
use crate::values::Value;

pub use arity::{DispatchTable, VariadicDispatch};
pub use candidate::{Candidate, CandidateSet, Origin};
pub use metaobject::{MetaobjectRecord, OriginFilter};
pub use overload::Overload;
pub use selector::{MemberName, NameForm, Selector};

use candidate::InconsistentVariadic;
use metaobject::{Lookup, LookupKey};

/// Supertype recursion bound during candidate discovery.
const MAX_DISCOVERY_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Candidates tested by guards before falling back to a linear scan.
    pub guard_chain_limit: usize,
    /// Extra argument counts served directly by the latest variadic group.
    pub variadic_lookahead: usize,
    /// Host type whose members are visible without qualification.
    pub root_scope_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            guard_chain_limit: 4,
            variadic_lookahead: 8,
            root_scope_name: "sioc".to_string(),
        }
    }
}

/// A procedure value produced by dispatch.
#[derive(Clone, Debug)]
pub enum Callable {
    Direct(Arc<Candidate>),
    Table(Arc<DispatchTable>),
    Selector(Arc<Selector>),
}

impl Callable {
    pub fn name(&self) -> Symbol {
        match self {
            Callable::Direct(candidate) => candidate.name(),
            Callable::Table(table) => table.name(),
            Callable::Selector(selector) => selector.name(),
        }
    }

    pub fn invoke(&self, args: Vec<Value>, interp: &mut Interpreter) -> Result<Value, RuntimeError> {
        match self {
            Callable::Direct(candidate) => candidate.invoke(args, interp),
            Callable::Table(table) => table.invoke(args, interp),
            Callable::Selector(selector) => selector.invoke(args, interp),
        }
    }

    pub fn ptr_eq(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Direct(a), Callable::Direct(b)) => Arc::ptr_eq(a, b),
            (Callable::Table(a), Callable::Table(b)) => Arc::ptr_eq(a, b),
            (Callable::Selector(a), Callable::Selector(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Same object, or built from exactly the same candidates in the same order.
    pub fn same_dispatch(&self, other: &Callable) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if let (Callable::Selector(a), Callable::Selector(b)) = (self, other) {
            return a.member() == b.member();
        }
        let mine = self.candidates();
        let theirs = other.candidates();
        !mine.is_empty()
            && mine.len() == theirs.len()
            && mine.iter().zip(&theirs).all(|(a, b)| Arc::ptr_eq(a, b))
    }

    /// Candidates reachable through this callable; empty for selectors.
    pub fn candidates(&self) -> Vec<Arc<Candidate>> {
        match self {
            Callable::Direct(candidate) => vec![candidate.clone()],
            Callable::Table(table) => table.candidates(),
            Callable::Selector(_) => Vec::new(),
        }
    }

    /// Human-readable layout of the dispatch structure.
    pub fn describe(&self, lattice: &TypeLattice<'_>) -> String {
        match self {
            Callable::Direct(candidate) => format!("direct: {}\n", candidate.signature(lattice)),
            Callable::Table(table) => table.describe(lattice),
            Callable::Selector(selector) => {
                format!("selector: {:?} {}\n", selector.member().kind, selector.member().key)
            }
        }
    }
}

/// A scope whose members are visible to bare names, optionally behind a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub scope: TypeDescriptor,
    pub prefix: Option<String>,
}

impl Import {
    fn local_name<'n>(&self, name: &'n str) -> Option<&'n str> {
        match &self.prefix {
            Some(prefix) => name.strip_prefix(prefix.as_str()).filter(|rest| !rest.is_empty()),
            None => Some(name),
        }
    }
}

/// Resolves names to callables and owns every dispatch cache.
///
/// Shared behind an `Arc`; all caches are append-only and safe to populate
/// from several threads.
pub struct DispatchEngine {
    provider: Arc<dyn IntrospectionProvider>,
    config: EngineConfig,
    root: Option<TypeDescriptor>,
    records: RwLock<FxHashMap<TypeDescriptor, Arc<MetaobjectRecord>>>,
    forms: RwLock<FxHashMap<Symbol, NameForm>>,
    selectors: RwLock<FxHashMap<Symbol, Callable>>,
    imports: RwLock<Vec<Import>>,
}

impl DispatchEngine {
    pub fn new(provider: Arc<dyn IntrospectionProvider>, config: EngineConfig) -> Self {
        let root = provider
            .find_type(&config.root_scope_name)
            .map(TypeDescriptor::Host);
        if root.is_none() {
            tracing::warn!(
                target: "sioc::dispatch",
                scope = %config.root_scope_name,
                "root scope is not registered; only imports resolve bare names"
            );
        }
        Self {
            provider,
            config,
            root,
            records: RwLock::new(FxHashMap::default()),
            forms: RwLock::new(FxHashMap::default()),
            selectors: RwLock::new(FxHashMap::default()),
            imports: RwLock::new(Vec::new()),
        }
    }

    pub fn lattice(&self) -> TypeLattice<'_> {
        TypeLattice::new(self.provider.as_ref())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn IntrospectionProvider> {
        &self.provider
    }

    pub fn root_scope(&self) -> Option<TypeDescriptor> {
        self.root
    }

    /// Builtin descriptor or registered host type called `name`.
    pub fn find_type(&self, name: &str) -> Option<TypeDescriptor> {
        TypeDescriptor::builtin_named(name)
            .or_else(|| self.provider.find_type(name).map(TypeDescriptor::Host))
    }

    /// Make the members of `scope` visible to bare names. Re-importing the
    /// same scope with the same prefix is a no-op.
    pub fn import(&self, scope: TypeDescriptor, prefix: Option<&str>) {
        let import = Import {
            scope,
            prefix: prefix.map(str::to_string),
        };
        let mut imports = self.imports.write();
        if !imports.contains(&import) {
            tracing::debug!(
                target: "sioc::dispatch",
                scope = %self.lattice().type_name(scope),
                prefix = ?import.prefix,
                "import"
            );
            imports.push(import);
        }
    }

    pub fn imports(&self) -> Vec<Import> {
        self.imports.read().clone()
    }

    pub fn classify(&self, name: Symbol) -> NameForm {
        if let Some(form) = self.forms.read().get(&name) {
            return *form;
        }
        let form = NameForm::classify(name.as_str());
        *self.forms.write().entry(name).or_insert(form)
    }

    /// Resolve `name` to a value, or `None` when nothing binds it.
    ///
    /// With `scope`, plain names are looked up among that type's members only.
    /// Without it, the root scope's instance members come first, then its
    /// static members, then the imports in the order they were added.
    pub fn resolve(
        &self,
        name: Symbol,
        scope: Option<TypeDescriptor>,
    ) -> Result<Option<Value>, DispatchError> {
        match self.classify(name) {
            NameForm::Selector(member) => Ok(Some(Value::Procedure(self.selector(name, member)))),
            NameForm::Qualified {
                scope: type_name,
                member,
                plain,
            } => match self.find_type(type_name.as_str()) {
                Some(ty) => self.resolve_member(ty, &member, OriginFilter::Any, false),
                None => self.resolve_plain(name, &plain, scope),
            },
            NameForm::Plain(member) => self.resolve_plain(name, &member, scope),
        }
    }

    fn resolve_plain(
        &self,
        name: Symbol,
        member: &MemberName,
        scope: Option<TypeDescriptor>,
    ) -> Result<Option<Value>, DispatchError> {
        if let Some(ty) = scope {
            return self.resolve_member(ty, member, OriginFilter::Any, false);
        }
        if let Some(root) = self.root {
            if let Some(value) = self.resolve_member(root, member, OriginFilter::Instance, true)? {
                return Ok(Some(value));
            }
            if let Some(value) = self.resolve_member(root, member, OriginFilter::Static, false)? {
                return Ok(Some(value));
            }
        }
        self.resolve_imported(name)
    }

    fn resolve_imported(&self, name: Symbol) -> Result<Option<Value>, DispatchError> {
        let imports = self.imports();
        let mut found: Option<(Value, TypeDescriptor)> = None;
        for import in &imports {
            let Some(local) = import.local_name(name.as_str()) else {
                continue;
            };
            let NameForm::Plain(member) = self.classify(Symbol::intern(local)) else {
                continue;
            };
            let Some(value) = self.resolve_member(import.scope, &member, OriginFilter::Any, false)?
            else {
                continue;
            };
            match &found {
                None => found = Some((value, import.scope)),
                Some((first, first_scope)) => {
                    if *first_scope != import.scope && *first != value {
                        let lattice = self.lattice();
                        return Err(DispatchError::AmbiguousImport {
                            name,
                            first: lattice.type_name(*first_scope),
                            second: lattice.type_name(import.scope),
                        });
                    }
                }
            }
        }
        Ok(found.map(|(value, _)| value))
    }

    /// Resolve one member reference on `ty`, caching the outcome on its record.
    pub fn resolve_member(
        &self,
        ty: TypeDescriptor,
        member: &MemberName,
        origin: OriginFilter,
        bind_receiver: bool,
    ) -> Result<Option<Value>, DispatchError> {
        let key = LookupKey {
            key: member.key,
            kind: member.kind,
            origin,
            bind_receiver,
            pin: member.pin,
        };
        let record = self.metaobject(ty)?;
        if let Some(hit) = record.cached_resolution(&key) {
            return Ok(hit);
        }
        let lattice = self.lattice();
        let value = match self.discover(ty, key, 0)? {
            Lookup::NotFound => None,
            Lookup::Constant(value) => Some(value),
            Lookup::Found(set) => arity::merge_arities(
                member.surface,
                ty,
                &lattice,
                set.to_vec(),
                self.config.guard_chain_limit,
                self.config.variadic_lookahead,
                member.pin,
            )
            .map(Value::Procedure),
        };
        Ok(record.store_resolution(key, value))
    }

    /// The cached record for `ty`, introspecting it on first use.
    ///
    /// Provider failures are returned and not cached, so a later call retries.
    pub fn metaobject(&self, ty: TypeDescriptor) -> Result<Arc<MetaobjectRecord>, DispatchError> {
        if let Some(record) = self.records.read().get(&ty) {
            return Ok(record.clone());
        }
        let lattice = self.lattice();
        let members = self
            .provider
            .members(ty)
            .map_err(|source| DispatchError::Introspection {
                ty: lattice.type_name(ty),
                source,
            })?;
        let supertypes = lattice.direct_supertypes(ty);
        let record = Arc::new(MetaobjectRecord::new(ty, members, supertypes));
        let mut records = self.records.write();
        let record = records.entry(ty).or_insert(record).clone();
        tracing::debug!(
            target: "sioc::dispatch",
            ty = %lattice.type_name(ty),
            members = record.members().len(),
            "created metaobject record"
        );
        Ok(record)
    }

    fn discover(
        &self,
        ty: TypeDescriptor,
        key: LookupKey,
        depth: usize,
    ) -> Result<Lookup, DispatchError> {
        let record = self.metaobject(ty)?;
        if let Some(hit) = record.cached_lookup(&key) {
            return Ok(hit);
        }
        let lookup = self.discover_uncached(&record, key, depth)?;
        Ok(record.store_lookup(key, lookup))
    }

    fn discover_uncached(
        &self,
        record: &MetaobjectRecord,
        key: LookupKey,
        depth: usize,
    ) -> Result<Lookup, DispatchError> {
        let mut set = CandidateSet::default();
        let mut dropped: Vec<InconsistentVariadic> = Vec::new();
        for member in record.members().iter().filter(|member| key.admits(member)) {
            // A constant declared on the type itself shadows everything else.
            if let (MemberKind::FieldGet, true, MemberImpl::Constant(value)) =
                (member.kind, member.is_static, &member.imp)
            {
                return Ok(Lookup::Constant(value.clone()));
            }
            match Candidate::from_member(member, record.ty(), key.bind_receiver) {
                Ok(candidate) if pin_admits(key.pin, &candidate) => {
                    set.insert(Arc::new(candidate));
                }
                Ok(_) => {}
                Err(bad) if pin_admits_arity(key.pin, bad.arity) => {
                    tracing::warn!(
                        target: "sioc::dispatch",
                        member = %member.name,
                        owner = %self.lattice().type_name(record.ty()),
                        arity = bad.arity,
                        "dropping member with inconsistent variadic encoding"
                    );
                    dropped.push(bad);
                }
                Err(_) => {}
            }
        }

        let mut inherited_constant = None;
        if depth < MAX_DISCOVERY_DEPTH {
            for sup in record.supertypes() {
                match self.discover(*sup, key, depth + 1)? {
                    Lookup::Found(inherited) => {
                        for candidate in inherited.iter() {
                            set.insert(candidate.clone());
                        }
                    }
                    Lookup::Constant(value) => {
                        inherited_constant.get_or_insert(value);
                    }
                    Lookup::NotFound => {}
                }
            }
        }

        if let Some(bad) = dropped
            .iter()
            .find(|bad| !set.iter().any(|candidate| candidate.arity() == bad.arity))
        {
            return Err(DispatchError::InconsistentVariadicEncoding {
                name: key.key.as_str().to_string(),
                owner: self.lattice().type_name(record.ty()),
                arity: bad.arity,
            });
        }
        if !set.is_empty() {
            return Ok(Lookup::Found(Arc::new(set)));
        }
        Ok(inherited_constant.map_or(Lookup::NotFound, Lookup::Constant))
    }

    fn selector(&self, name: Symbol, member: MemberName) -> Callable {
        if let Some(callable) = self.selectors.read().get(&name) {
            return callable.clone();
        }
        let callable = Callable::Selector(Arc::new(Selector::new(name, member)));
        self.selectors.write().entry(name).or_insert(callable).clone()
    }
}

/// Under an arity pin only candidates that can take exactly `pin` arguments stay.
fn pin_admits(pin: Option<usize>, candidate: &Candidate) -> bool {
    match pin {
        None => true,
        Some(pin) if candidate.is_variadic() => candidate.arity() <= pin,
        Some(pin) => candidate.arity() == pin,
    }
}

/// Pin filter for a malformed member, judged by its fixed arity alone.
fn pin_admits_arity(pin: Option<usize>, arity: usize) -> bool {
    pin.is_none_or(|pin| pin == arity)
}
