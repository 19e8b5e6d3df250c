//! Global symbol resolver: a name → definition map accumulated across
//! every object fed into one link (§4.4).
//!
//! Binding precedence follows the table in §4.4: a `LOCAL` symbol never
//! leaves its owning object's sub-namespace; `WEAK` loses to anything
//! stronger and is silently kept otherwise; two `GLOBAL` definitions of
//! the same name are an error; `EXPORT` always wins except against
//! another `EXPORT`, which is also an error.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::obj::{SymbolBinding, SymbolType};

/// A resolved definition for one global symbol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSymbol {
    pub defining_object_id: u32,
    pub section_index: u16,
    pub value: u32,
    pub size: u32,
    pub binding: SymbolBinding,
    pub symbol_type: SymbolType,
}

/// Key for a `LOCAL` symbol, scoped to the object that defines it so it
/// never collides with another object's symbol of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LocalKey {
    object_id: u32,
    name: String,
}

/// Accumulates symbol definitions across every object in one link and
/// answers lookups by name, per §4.4.
#[derive(Default)]
pub struct Resolver {
    globals: HashMap<String, ResolvedSymbol>,
    /// Insertion order of global (non-LOCAL) names, for deterministic
    /// diagnostics and iteration.
    order: Vec<String>,
    locals: HashMap<LocalKey, ResolvedSymbol>,
    /// Names referenced as undefined (`section_index == SECTION_UNDEF`)
    /// anywhere, pending resolution at finalize().
    pending: Vec<String>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a definition for `name` with the given binding, applying
    /// the §4.4 precedence table. `LOCAL` definitions are filed in a
    /// per-object namespace and can never conflict across objects.
    pub fn define(&mut self, name: &str, object_id: u32, new: ResolvedSymbol) -> Result<()> {
        if new.binding == SymbolBinding::Local {
            self.locals.insert(
                LocalKey {
                    object_id,
                    name: name.to_string(),
                },
                new,
            );
            return Ok(());
        }

        match self.globals.get(name) {
            None => {
                self.globals.insert(name.to_string(), new);
                self.order.push(name.to_string());
                Ok(())
            }
            Some(existing) => {
                let replace = match (existing.binding, new.binding) {
                    (SymbolBinding::Weak, SymbolBinding::Weak) => false,
                    (SymbolBinding::Weak, _) => true,
                    (SymbolBinding::Global, SymbolBinding::Weak) => false,
                    (SymbolBinding::Global, SymbolBinding::Global) => {
                        return Err(Error::MultiplyDefined {
                            name: name.to_string(),
                            first: existing.defining_object_id,
                            second: object_id,
                        });
                    }
                    (SymbolBinding::Global, SymbolBinding::Export) => true,
                    (SymbolBinding::Export, SymbolBinding::Weak)
                    | (SymbolBinding::Export, SymbolBinding::Global) => false,
                    (SymbolBinding::Export, SymbolBinding::Export) => {
                        return Err(Error::MultiplyDefined {
                            name: name.to_string(),
                            first: existing.defining_object_id,
                            second: object_id,
                        });
                    }
                    (SymbolBinding::Local, _) => unreachable!("LOCAL never stored in globals"),
                    (_, SymbolBinding::Local) => unreachable!("LOCAL handled above"),
                };
                if replace {
                    self.globals.insert(name.to_string(), new);
                }
                Ok(())
            }
        }
    }

    /// Records that `name` was referenced but undefined at the point of
    /// reference; checked against `self.globals` at [`Resolver::finalize`].
    pub fn reference_undefined(&mut self, name: &str) {
        self.pending.push(name.to_string());
    }

    pub fn lookup(&self, name: &str) -> Option<&ResolvedSymbol> {
        self.globals.get(name)
    }

    pub fn lookup_local(&self, object_id: u32, name: &str) -> Option<&ResolvedSymbol> {
        self.locals.get(&LocalKey {
            object_id,
            name: name.to_string(),
        })
    }

    /// Names of every defined global symbol, in insertion order.
    pub fn iter_order(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Verifies every pending undefined reference was eventually
    /// defined; returns `UNRESOLVED_SYMBOL` naming all that weren't.
    pub fn finalize(&self) -> Result<()> {
        let mut unresolved: Vec<String> = self
            .pending
            .iter()
            .filter(|name| !self.globals.contains_key(name.as_str()))
            .cloned()
            .collect();
        if unresolved.is_empty() {
            return Ok(());
        }
        unresolved.sort();
        unresolved.dedup();
        Err(Error::UnresolvedSymbol { names: unresolved })
    }
}
