//! Merging candidates of different arities into one dispatch table.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::intern::Symbol;
use crate::runtime::{Interpreter, RuntimeError};
use crate::types::{TypeDescriptor, TypeLattice};
use crate::values::Value;

use super::Callable;
use super::candidate::{Candidate, no_applicable_overload};
use super::overload::{Overload, type_overload};

#[derive(Debug)]
enum Slot {
    Fixed(Overload),
    /// Index into [`VariadicDispatch::groups`].
    Adapted(usize),
}

/// Variadic candidates grouped by minimum arity, ascending.
///
/// A call with `n` arguments goes to the group with the greatest minimum
/// arity not above `n`.
#[derive(Debug, Default)]
pub struct VariadicDispatch {
    groups: Vec<Overload>,
}

impl VariadicDispatch {
    fn push(&mut self, overload: Overload) {
        self.groups.push(overload);
    }

    fn latest(&self) -> Option<usize> {
        self.groups.len().checked_sub(1)
    }

    pub fn group_for(&self, argc: usize) -> Option<&Overload> {
        self.groups.iter().rev().find(|group| group.arity() <= argc)
    }

    pub fn groups(&self) -> &[Overload] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Dispatch by argument count, then by type.
///
/// Slot `i` serves calls with `min_arity + i` arguments. A fixed-arity
/// overload in a slot always wins over variadic candidates of a lower
/// minimum arity; slots with no fixed overload adapt the nearest variadic
/// group. Calls past the last slot fall through to the latest group.
#[derive(Debug)]
pub struct DispatchTable {
    name: Symbol,
    scope: TypeDescriptor,
    min_arity: usize,
    slots: Vec<Option<Slot>>,
    variadic: VariadicDispatch,
    pin: Option<usize>,
}

/// Combine `candidates` into a callable.
///
/// A single candidate is called directly unless an arity pin has to be
/// enforced on a variadic one.
pub(crate) fn merge_arities(
    name: Symbol,
    scope: TypeDescriptor,
    lattice: &TypeLattice<'_>,
    candidates: Vec<Arc<Candidate>>,
    guard_limit: usize,
    lookahead: usize,
    pin: Option<usize>,
) -> Option<Callable> {
    if let [only] = candidates.as_slice() {
        if pin.is_none() || !only.is_variadic() {
            return Some(Callable::Direct(only.clone()));
        }
    }
    let min_arity = candidates.iter().map(|c| c.arity()).min()?;
    let max_arity = candidates.iter().map(|c| c.arity()).max()?;
    // Slots run to `lookahead` past the smallest variadic arity, and never
    // stop short of the largest fixed arity.
    let last_slot = candidates
        .iter()
        .filter(|c| c.is_variadic())
        .map(|c| c.arity() + lookahead)
        .min()
        .map_or(max_arity, |reach| reach.max(max_arity));

    let mut by_arity: BTreeMap<usize, (Vec<Arc<Candidate>>, Vec<Arc<Candidate>>)> =
        BTreeMap::new();
    for candidate in candidates {
        let entry = by_arity.entry(candidate.arity()).or_default();
        if candidate.is_variadic() {
            entry.1.push(candidate);
        } else {
            entry.0.push(candidate);
        }
    }

    let mut variadic = VariadicDispatch::default();
    let mut slots = Vec::with_capacity(last_slot - min_arity + 1);
    for arity in min_arity..=max_arity {
        let (fixed, rest) = by_arity.remove(&arity).unwrap_or_default();
        if let Some(group) = type_overload(lattice, rest, guard_limit) {
            variadic.push(group);
        }
        let slot = match type_overload(lattice, fixed, guard_limit) {
            Some(overload) => Some(Slot::Fixed(overload)),
            None => variadic.latest().map(Slot::Adapted),
        };
        slots.push(slot);
    }
    if let Some(latest) = variadic.latest() {
        slots.extend((max_arity..last_slot).map(|_| Some(Slot::Adapted(latest))));
    }

    tracing::debug!(
        target: "sioc::dispatch",
        name = %name,
        scope = %lattice.type_name(scope),
        min_arity,
        max_arity,
        variadic_groups = variadic.groups.len(),
        "built dispatch table"
    );
    Some(Callable::Table(Arc::new(DispatchTable {
        name,
        scope,
        min_arity,
        slots,
        variadic,
        pin,
    })))
}

impl DispatchTable {
    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn scope(&self) -> TypeDescriptor {
        self.scope
    }

    pub fn min_arity(&self) -> usize {
        self.min_arity
    }

    pub fn pin(&self) -> Option<usize> {
        self.pin
    }

    pub fn variadic(&self) -> &VariadicDispatch {
        &self.variadic
    }

    /// Highest argument count with a materialized slot.
    pub fn last_slot(&self) -> usize {
        self.min_arity + self.slots.len().saturating_sub(1)
    }

    /// The overload serving a call with `argc` arguments.
    pub fn overload_for(&self, argc: usize) -> Option<&Overload> {
        if self.pin.is_some_and(|pin| pin != argc) {
            return None;
        }
        let slot = argc
            .checked_sub(self.min_arity)
            .and_then(|index| self.slots.get(index));
        match slot {
            Some(Some(Slot::Fixed(overload))) => Some(overload),
            Some(Some(Slot::Adapted(group))) => self.variadic.groups.get(*group),
            Some(None) => None,
            None if argc < self.min_arity => None,
            None => self.variadic.group_for(argc),
        }
    }

    pub fn invoke(&self, args: Vec<Value>, interp: &mut Interpreter) -> Result<Value, RuntimeError> {
        let engine = interp.engine().clone();
        let lattice = engine.lattice();
        let candidate = self
            .overload_for(args.len())
            .and_then(|overload| overload.select(&lattice, &args))
            .cloned()
            .ok_or_else(|| no_applicable_overload(self.name.as_str(), &args))?;
        candidate.invoke(args, interp)
    }

    /// Every candidate reachable through the table, fixed slots first.
    pub fn candidates(&self) -> Vec<Arc<Candidate>> {
        let mut out: Vec<Arc<Candidate>> = Vec::new();
        for slot in &self.slots {
            if let Some(Slot::Fixed(overload)) = slot {
                out.extend(overload.candidates());
            }
        }
        for group in &self.variadic.groups {
            out.extend(group.candidates());
        }
        out
    }

    /// One line per fixed arity and per variadic group.
    pub fn describe(&self, lattice: &TypeLattice<'_>) -> String {
        let mut out = String::new();
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(Slot::Fixed(overload)) = slot {
                let _ = writeln!(
                    out,
                    "arity {}: {}",
                    self.min_arity + index,
                    signatures(lattice, overload)
                );
            }
        }
        for group in &self.variadic.groups {
            let _ = writeln!(
                out,
                "arity {}+: {}",
                group.arity(),
                signatures(lattice, group)
            );
        }
        if let Some(pin) = self.pin {
            let _ = writeln!(out, "pinned to {pin}");
        }
        out
    }
}

fn signatures(lattice: &TypeLattice<'_>, overload: &Overload) -> String {
    overload
        .candidates()
        .iter()
        .map(|candidate| candidate.signature(lattice))
        .collect::<Vec<_>>()
        .join(" | ")
}
