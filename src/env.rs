//! Scoped symbol bindings and recorded function definitions.
//!
//! Function bodies are the only binding construct, and closing over an
//! enclosing function is unsupported, so name lookup stays within the
//! innermost scope. Each function-body emission pushes a fresh scope and
//! pops it on return; parameter names never leak into the surrounding
//! compile.

use cranelift_codegen::ir::Value;
use rustc_hash::FxHashMap;

use crate::syntax::Node;

/// How a name maps onto storage.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Stack storage; `addr` is the slot's address value.
    Slot { addr: Value, ty: String },
    /// The bound value itself; pointer parameters are not copied.
    Direct { value: Value, ty: String },
}

impl Binding {
    pub fn ty(&self) -> &str {
        match self {
            Binding::Slot { ty, .. } | Binding::Direct { ty, .. } => ty,
        }
    }
}

/// A recorded `defn`, lowered lazily on its first call.
#[derive(Debug, Clone)]
pub struct FnDef {
    pub ret: String,
    pub params: Vec<(String, String)>,
    pub body: Vec<Node>,
}

pub struct Env {
    scopes: Vec<FxHashMap<String, Binding>>,
    defs: FxHashMap<String, FnDef>,
}

impl Env {
    pub fn new() -> Self {
        Env {
            scopes: vec![FxHashMap::default()],
            defs: FxHashMap::default(),
        }
    }

    /// Reset for a fresh compile.
    pub fn clear(&mut self) {
        self.scopes.clear();
        self.scopes.push(FxHashMap::default());
        self.defs.clear();
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty());
    }

    pub fn bind(&mut self, name: impl Into<String>, binding: Binding) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), binding);
        }
    }

    /// Look `name` up in the innermost scope.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.last().and_then(|scope| scope.get(name))
    }

    pub fn define_fn(&mut self, name: impl Into<String>, def: FnDef) {
        self.defs.insert(name.into(), def);
    }

    pub fn fn_def(&self, name: &str) -> Option<&FnDef> {
        self.defs.get(name)
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: u32) -> Binding {
        Binding::Slot {
            addr: Value::from_u32(n),
            ty: "int32".to_string(),
        }
    }

    #[test]
    fn lookup_stays_in_the_innermost_scope() {
        let mut env = Env::new();
        env.bind("x", slot(0));
        env.push_scope();
        assert!(env.lookup("x").is_none());
        env.bind("x", slot(1));
        assert!(matches!(
            env.lookup("x"),
            Some(Binding::Slot { addr, .. }) if *addr == Value::from_u32(1)
        ));
        env.pop_scope();
        assert!(matches!(
            env.lookup("x"),
            Some(Binding::Slot { addr, .. }) if *addr == Value::from_u32(0)
        ));
    }

    #[test]
    fn clear_drops_bindings_and_definitions() {
        let mut env = Env::new();
        env.bind("x", slot(0));
        env.define_fn(
            "f",
            FnDef {
                ret: "int32".to_string(),
                params: vec![],
                body: vec![],
            },
        );
        env.clear();
        assert!(env.lookup("x").is_none());
        assert!(env.fn_def("f").is_none());
    }
}
