//! Kind-tagged scope stack.
//!
//! Variables are looked up from innermost scope outward. `define` always
//! creates in the current scope; `store` updates the nearest scope that
//! already has the name, defining in the current one otherwise. Each frame
//! also records the operand-stack height at entry so scope exit can
//! restore it.

use std::collections::BTreeMap;

use zed_codegen::isa::ScopeKind;

use crate::value::Value;

/// A single scope frame.
#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    bindings: BTreeMap<String, Value>,
    /// Operand-stack height when the scope was entered.
    stack_base: usize,
}

/// Scoped variable environment with push/pop semantics.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    /// Create a stack with the persistent base scope. Variables defined at
    /// event top level land here and survive across event invocations.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                kind: ScopeKind::Block,
                bindings: BTreeMap::new(),
                stack_base: 0,
            }],
        }
    }

    pub fn push(&mut self, kind: ScopeKind, stack_base: usize) {
        self.scopes.push(Scope {
            kind,
            bindings: BTreeMap::new(),
            stack_base,
        });
    }

    /// Pop scopes until a frame of `kind` has been popped; returns that
    /// frame's stack base. The base scope is never popped — exhausting the
    /// stack returns `None` (corrupt bytecode).
    pub fn unwind(&mut self, kind: ScopeKind) -> Option<usize> {
        while self.scopes.len() > 1 {
            let scope = self.scopes.pop().expect("len checked");
            if scope.kind == kind {
                return Some(scope.stack_base);
            }
        }
        None
    }

    /// Define a variable in the current (innermost) scope.
    pub fn define(&mut self, name: &str, value: Value) {
        let scope = self.scopes.last_mut().expect("base scope always present");
        scope.bindings.insert(name.to_string(), value);
    }

    /// Look up a variable, searching from innermost to outermost scope.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    /// Update a variable in the nearest scope where it exists; defines in
    /// the current scope when absent (variables spring into being on first
    /// store, the AWK way).
    pub fn store(&mut self, name: &str, value: Value) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.bindings.get_mut(name) {
                *slot = value;
                return;
            }
        }
        self.define(name, value);
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_shadowing() {
        let mut scopes = ScopeStack::new();
        scopes.define("x", Value::Int(1));
        scopes.push(ScopeKind::Block, 0);
        scopes.define("x", Value::Int(2));
        assert_eq!(scopes.get("x"), Some(&Value::Int(2)));
        scopes.unwind(ScopeKind::Block);
        assert_eq!(scopes.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn store_updates_outer_scope() {
        let mut scopes = ScopeStack::new();
        scopes.define("x", Value::Int(1));
        scopes.push(ScopeKind::Loop, 3);
        scopes.store("x", Value::Int(9));
        scopes.unwind(ScopeKind::Loop);
        assert_eq!(scopes.get("x"), Some(&Value::Int(9)));
    }

    #[test]
    fn store_defines_when_missing() {
        let mut scopes = ScopeStack::new();
        scopes.store("fresh", Value::Int(1));
        assert_eq!(scopes.get("fresh"), Some(&Value::Int(1)));
    }

    #[test]
    fn loop_unwind_pops_through_blocks() {
        let mut scopes = ScopeStack::new();
        scopes.push(ScopeKind::Loop, 2);
        scopes.push(ScopeKind::Block, 5);
        scopes.push(ScopeKind::Block, 7);
        assert_eq!(scopes.unwind(ScopeKind::Loop), Some(2));
    }

    #[test]
    fn unwind_never_pops_the_base_scope() {
        let mut scopes = ScopeStack::new();
        scopes.define("x", Value::Int(1));
        assert_eq!(scopes.unwind(ScopeKind::Function), None);
        assert_eq!(scopes.get("x"), Some(&Value::Int(1)));
    }
}
