//! Lexical scopes.
//!
//! Each function call, class body, and module owns one table. Lookups walk
//! the parent chain and fall back to the builtins table at the root.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::runtime::value::{Value, release};

/// Similarity a candidate needs before it is offered as a suggestion.
const SUGGESTION_CUTOFF: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// `=`: binds in the current scope.
    Assign,
    /// `+=` and friends: rebinds wherever the name already lives.
    Augmented,
}

#[derive(Default)]
pub struct SymbolTable {
    symbols: RefCell<FxHashMap<String, Value>>,
    parent: Option<Rc<SymbolTable>>,
    builtins: Option<Rc<SymbolTable>>,
    globals: RefCell<FxHashSet<String>>,
}

impl SymbolTable {
    /// A module-level table backed by `builtins`.
    pub fn root(builtins: Rc<SymbolTable>) -> Rc<Self> {
        Self::linked(None, Some(builtins))
    }

    pub fn child(parent: &Rc<SymbolTable>) -> Rc<Self> {
        Self::linked(Some(parent.clone()), None)
    }

    fn linked(parent: Option<Rc<SymbolTable>>, builtins: Option<Rc<SymbolTable>>) -> Rc<Self> {
        Rc::new(Self {
            symbols: RefCell::default(),
            parent,
            builtins,
            globals: RefCell::default(),
        })
    }

    /// A table with no parent and no builtins, used for the builtins
    /// namespace itself.
    pub fn detached() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn parent(&self) -> Option<&Rc<SymbolTable>> {
        self.parent.as_ref()
    }

    /// The module-level table this scope belongs to.
    pub fn outermost(self: &Rc<Self>) -> Rc<SymbolTable> {
        let mut table = self.clone();
        while let Some(parent) = table.parent.clone() {
            table = parent;
        }
        table
    }

    pub fn get(self: &Rc<Self>, name: &str) -> Value {
        if self.is_global(name) && self.parent.is_some() {
            return self.outermost().get(name);
        }
        if let Some(value) = self.symbols.borrow().get(name) {
            return value.clone();
        }
        match (&self.parent, &self.builtins) {
            (Some(parent), _) => parent.get(name),
            (None, Some(builtins)) => builtins.get(name),
            (None, None) => Value::Undefined,
        }
    }

    /// Binds `name`. Augmented writes fail when the name resolves nowhere.
    pub fn set(self: &Rc<Self>, name: &str, value: Value, operand: Operand) -> bool {
        if self.is_global(name) && self.parent.is_some() {
            return self.outermost().set(name, value, operand);
        }
        match operand {
            Operand::Assign => {
                let previous = self.symbols.borrow_mut().insert(name.to_string(), value);
                if let Some(previous) = previous {
                    release(previous);
                }
                true
            }
            Operand::Augmented => {
                let mut table = Some(self.clone());
                while let Some(current) = table {
                    if current.include(name) {
                        let previous = current.symbols.borrow_mut().insert(name.to_string(), value);
                        if let Some(previous) = previous {
                            release(previous);
                        }
                        return true;
                    }
                    table = current.parent.clone();
                }
                false
            }
        }
    }

    /// Deletes a local binding.
    pub fn remove(self: &Rc<Self>, name: &str) -> bool {
        if self.is_global(name) && self.parent.is_some() {
            return self.outermost().remove(name);
        }
        let previous = self.symbols.borrow_mut().remove(name);
        let removed = previous.is_some();
        if let Some(previous) = previous {
            release(previous);
        }
        removed
    }

    pub fn include(&self, name: &str) -> bool {
        self.symbols.borrow().contains_key(name)
    }

    pub fn declare_global(&self, name: &str) {
        self.globals.borrow_mut().insert(name.to_string());
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.globals.borrow().contains(name)
    }

    /// Local bindings in insertion-independent, sorted order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        let mut entries: Vec<(String, Value)> = self
            .symbols
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }

    /// Every name visible from this scope, builtins included.
    fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.symbols.borrow().keys().cloned().collect();
        match (&self.parent, &self.builtins) {
            (Some(parent), _) => names.extend(parent.visible_names()),
            (None, Some(builtins)) => names.extend(builtins.visible_names()),
            (None, None) => {}
        }
        names
    }

    /// Best visible name for a misspelled `name`.
    pub fn find_closest(&self, name: &str) -> Option<String> {
        let mut names = self.visible_names();
        names.sort();
        names.dedup();

        let mut best: Option<(f64, String)> = None;
        for candidate in names {
            if candidate == name {
                continue;
            }
            let score = similarity(name, &candidate);
            if score >= SUGGESTION_CUTOFF && best.as_ref().is_none_or(|(top, _)| score > *top) {
                best = Some((score, candidate));
            }
        }
        best.map(|(_, candidate)| candidate)
    }
}

impl Drop for SymbolTable {
    fn drop(&mut self) {
        for (_, value) in self.symbols.get_mut().drain() {
            release(value);
        }
    }
}

/// Shared character bigrams over the larger bigram count, case-insensitive.
pub fn similarity(left: &str, right: &str) -> f64 {
    fn bigrams(text: &str) -> FxHashSet<(char, char)> {
        let chars: Vec<char> = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        chars.windows(2).map(|pair| (pair[0], pair[1])).collect()
    }

    let left = bigrams(left);
    let right = bigrams(right);
    let largest = left.len().max(right.len());
    if largest == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / largest as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scopes() -> (Rc<SymbolTable>, Rc<SymbolTable>) {
        let builtins = SymbolTable::detached();
        builtins.set("print", Value::None, Operand::Assign);
        let module = SymbolTable::root(builtins);
        let local = SymbolTable::child(&module);
        (module, local)
    }

    #[test]
    fn lookup_walks_parents_then_builtins() {
        let (module, local) = scopes();
        module.set("x", Value::Int(1), Operand::Assign);
        assert_eq!(local.get("x"), Value::Int(1));
        assert_eq!(local.get("print"), Value::None);
        assert!(local.get("missing").is_undefined());
    }

    #[test]
    fn plain_assignment_shadows_and_augmented_rebinds() {
        let (module, local) = scopes();
        module.set("count", Value::Int(0), Operand::Assign);

        assert!(local.set("count", Value::Int(5), Operand::Augmented));
        assert_eq!(module.get("count"), Value::Int(5));
        assert!(!local.include("count"));

        local.set("count", Value::Int(9), Operand::Assign);
        assert_eq!(module.get("count"), Value::Int(5));
        assert!(!local.set("unknown", Value::Int(1), Operand::Augmented));
    }

    #[test]
    fn global_declarations_target_the_module() {
        let (module, local) = scopes();
        local.declare_global("g");
        local.set("g", Value::Int(3), Operand::Assign);
        assert_eq!(module.get("g"), Value::Int(3));
        assert!(!local.include("g"));
        assert!(local.remove("g"));
        assert!(module.get("g").is_undefined());
    }

    #[test]
    fn suggests_close_names() {
        let (module, local) = scopes();
        module.set("counter", Value::Int(0), Operand::Assign);
        assert_eq!(local.find_closest("countr"), Some("counter".to_string()));
        assert_eq!(local.find_closest("prin"), Some("print".to_string()));
        assert_eq!(local.find_closest("zzz"), None);
    }

    #[test]
    fn similarity_is_bigram_overlap() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("ab", "cd"), 0.0);
        assert_eq!(similarity("a", "a"), 0.0);
    }
}
