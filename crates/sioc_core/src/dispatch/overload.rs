//! Type-overload resolution among candidates that share one arity.
//!
//! Candidates are ordered most specific first. The first `limit` of them
//! become guarded arms that test only the positions where candidate types
//! actually differ; the remainder is either a single unconditional default or,
//! for large sets, a linear scan in the same order.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::types::{TypeDescriptor, TypeLattice};
use crate::values::Value;

use super::candidate::Candidate;

/// Lexicographic comparison over arity, then parameters, then return type.
pub(crate) fn compare_candidates(
    lattice: &TypeLattice<'_>,
    left: &Candidate,
    right: &Candidate,
) -> Ordering {
    left.arity()
        .cmp(&right.arity())
        .then_with(|| {
            left.params()
                .iter()
                .zip(right.params())
                .map(|(l, r)| lattice.specificity_order(*l, *r))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| lattice.specificity_order(left.ret(), right.ret()))
}

pub(crate) fn sort_by_specificity(lattice: &TypeLattice<'_>, candidates: &mut [Arc<Candidate>]) {
    candidates.sort_by(|left, right| compare_candidates(lattice, left, right));
}

/// One guarded arm: `None` in a slot means that position is not tested.
#[derive(Debug)]
struct GuardArm {
    tests: Vec<Option<TypeDescriptor>>,
    candidate: Arc<Candidate>,
}

#[derive(Debug)]
enum ChainTail {
    /// Taken whenever no arm matched and the candidate still fits.
    Default(Arc<Candidate>),
    Scan(Vec<Arc<Candidate>>),
}

#[derive(Debug)]
pub struct GuardChain {
    arms: Vec<GuardArm>,
    tail: ChainTail,
    /// Per-position join over every candidate in the chain.
    joined: Vec<TypeDescriptor>,
    joined_ret: TypeDescriptor,
}

/// Selection among candidates of a single arity.
#[derive(Debug)]
pub enum Overload {
    Single(Arc<Candidate>),
    Chain(GuardChain),
}

/// Build an [`Overload`] for `candidates`, all of one arity and one variadic
/// flag. Returns `None` for an empty set.
pub(crate) fn type_overload(
    lattice: &TypeLattice<'_>,
    mut candidates: Vec<Arc<Candidate>>,
    limit: usize,
) -> Option<Overload> {
    if candidates.len() <= 1 {
        return candidates.pop().map(Overload::Single);
    }
    sort_by_specificity(lattice, &mut candidates);

    let arity = candidates[0].arity();
    let mut joined = candidates[0].params().to_vec();
    let mut varying = vec![false; arity];
    let mut joined_ret = candidates[0].ret();
    for candidate in &candidates[1..] {
        for (pos, param) in candidate.params().iter().enumerate() {
            if *param != joined[pos] {
                varying[pos] = true;
                joined[pos] = lattice.join(joined[pos], *param);
            }
        }
        joined_ret = lattice.join(joined_ret, candidate.ret());
    }

    let scan_from = if candidates.len() > limit * 3 / 2 {
        limit
    } else {
        candidates.len() - 1
    };
    let rest = candidates.split_off(scan_from);
    let tail = if rest.len() == 1 {
        ChainTail::Default(rest.into_iter().next()?)
    } else {
        ChainTail::Scan(rest)
    };
    let arms = candidates
        .into_iter()
        .map(|candidate| GuardArm {
            tests: candidate
                .params()
                .iter()
                .zip(&varying)
                .map(|(param, varies)| varies.then_some(*param))
                .collect(),
            candidate,
        })
        .collect();

    tracing::debug!(
        target: "sioc::dispatch",
        arity,
        joined = ?joined,
        "built guard chain"
    );
    Some(Overload::Chain(GuardChain {
        arms,
        tail,
        joined,
        joined_ret,
    }))
}

impl Overload {
    pub fn arity(&self) -> usize {
        match self {
            Overload::Single(candidate) => candidate.arity(),
            Overload::Chain(chain) => chain.joined.len(),
        }
    }

    /// Candidates in the order they are tried.
    pub fn candidates(&self) -> Vec<Arc<Candidate>> {
        match self {
            Overload::Single(candidate) => vec![candidate.clone()],
            Overload::Chain(chain) => {
                let mut out: Vec<_> = chain.arms.iter().map(|arm| arm.candidate.clone()).collect();
                match &chain.tail {
                    ChainTail::Default(candidate) => out.push(candidate.clone()),
                    ChainTail::Scan(rest) => out.extend(rest.iter().cloned()),
                }
                out
            }
        }
    }

    /// Parameter types that every candidate in this overload accepts.
    pub fn joined_params(&self) -> Vec<TypeDescriptor> {
        match self {
            Overload::Single(candidate) => candidate.params().to_vec(),
            Overload::Chain(chain) => chain.joined.clone(),
        }
    }

    pub fn joined_ret(&self) -> TypeDescriptor {
        match self {
            Overload::Single(candidate) => candidate.ret(),
            Overload::Chain(chain) => chain.joined_ret,
        }
    }

    /// First candidate whose fixed positions accept `args`.
    ///
    /// `args` may be longer than the arity; extra values belong to a rest list.
    pub fn select(&self, lattice: &TypeLattice<'_>, args: &[Value]) -> Option<&Arc<Candidate>> {
        let selected = match self {
            Overload::Single(candidate) => candidate
                .matches_prefix(lattice, args)
                .then_some(candidate),
            Overload::Chain(chain) => chain.select(lattice, args),
        };
        if let Some(candidate) = selected {
            tracing::trace!(
                target: "sioc::dispatch",
                candidate = %candidate.signature(lattice),
                "selected overload"
            );
        }
        selected
    }
}

impl GuardChain {
    fn select(&self, lattice: &TypeLattice<'_>, args: &[Value]) -> Option<&Arc<Candidate>> {
        if args.len() < self.joined.len() {
            return None;
        }
        let arm = self.arms.iter().find(|arm| {
            arm.tests.iter().zip(args).all(|(test, arg)| {
                test.is_none_or(|ty| lattice.is_assignable(arg.type_descriptor(), ty))
            })
        });
        if let Some(arm) = arm {
            return Some(&arm.candidate);
        }
        match &self.tail {
            ChainTail::Default(candidate) => candidate
                .matches_prefix(lattice, args)
                .then_some(candidate),
            ChainTail::Scan(rest) => rest
                .iter()
                .find(|candidate| candidate.matches_prefix(lattice, args)),
        }
    }
}
