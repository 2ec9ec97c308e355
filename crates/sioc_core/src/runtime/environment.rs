use rustc_hash::FxHashMap;

use crate::intern::Symbol;
use crate::values::Value;

#[derive(Debug, Clone)]
enum Slot {
    Bound(Value),
    /// Explicitly removed; lookups fail without consulting dispatch.
    Unbound,
}

/// Result of looking a symbol up in the [`Environment`].
#[derive(Debug, Clone, Copy)]
pub enum Binding<'a> {
    Bound(&'a Value),
    Removed,
    Absent,
}

/// Global symbol bindings.
#[derive(Debug, Default)]
pub struct Environment {
    slots: FxHashMap<Symbol, Slot>,
}

impl Environment {
    pub fn set(&mut self, name: Symbol, value: Value) {
        self.slots.insert(name, Slot::Bound(value));
    }

    /// Bind `name` only when it has never been bound or removed.
    pub fn set_default(&mut self, name: Symbol, value: Value) {
        self.slots.entry(name).or_insert(Slot::Bound(value));
    }

    /// Mark `name` unbound so it no longer falls through to dispatch.
    pub fn unset(&mut self, name: Symbol) {
        self.slots.insert(name, Slot::Unbound);
    }

    pub fn lookup(&self, name: Symbol) -> Binding<'_> {
        match self.slots.get(&name) {
            Some(Slot::Bound(value)) => Binding::Bound(value),
            Some(Slot::Unbound) => Binding::Removed,
            None => Binding::Absent,
        }
    }

    pub fn is_bound(&self, name: Symbol) -> bool {
        matches!(self.lookup(name), Binding::Bound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_shadows_and_set_default_respects_it() {
        let mut env = Environment::default();
        let x = Symbol::intern("x");
        assert!(matches!(env.lookup(x), Binding::Absent));

        env.set_default(x, Value::Int(1));
        env.set_default(x, Value::Int(2));
        assert!(matches!(env.lookup(x), Binding::Bound(Value::Int(1))));

        env.unset(x);
        assert!(matches!(env.lookup(x), Binding::Removed));
        env.set_default(x, Value::Int(3));
        assert!(!env.is_bound(x));

        env.set(x, Value::Int(4));
        assert!(matches!(env.lookup(x), Binding::Bound(Value::Int(4))));
    }
}
