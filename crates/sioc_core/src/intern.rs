//! Symbols of the expression language.
//!
//! Every distinct name is stored once, in a leaked entry that lives for the
//! rest of the process, so a [`Symbol`] is just a reference to its entry.
//! The entry also carries the mangled member key of the name, computed the
//! first time dispatch asks for it.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr;
use std::sync::OnceLock;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use rustc_hash::FxHashMap;

use crate::mangle::mangle;

struct SymbolEntry {
    text: Box<str>,
    key: OnceLock<Symbol>,
}

type SymbolTable = RwLock<FxHashMap<&'static str, Symbol>>;

fn symbol_table() -> &'static SymbolTable {
    static TABLE: OnceLock<SymbolTable> = OnceLock::new();
    TABLE.get_or_init(SymbolTable::default)
}

/// An interned name. Equality and hashing are by identity of the entry.
#[derive(Clone, Copy)]
pub struct Symbol(&'static SymbolEntry);

impl Symbol {
    pub fn intern(text: &str) -> Self {
        let table = symbol_table().upgradable_read();
        if let Some(sym) = table.get(text) {
            return *sym;
        }
        let mut table = RwLockUpgradableReadGuard::upgrade(table);
        let entry: &'static SymbolEntry = Box::leak(Box::new(SymbolEntry {
            text: text.into(),
            key: OnceLock::new(),
        }));
        let sym = Symbol(entry);
        table.insert(&entry.text, sym);
        sym
    }

    pub fn as_str(self) -> &'static str {
        let entry: &'static SymbolEntry = self.0;
        &entry.text
    }

    /// The member key this name is looked up under in host member tables.
    pub fn mangled(self) -> Symbol {
        *self
            .0
            .key
            .get_or_init(|| Symbol::intern(&mangle(self.as_str())))
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.0, other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        ptr::hash(self.0, state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
