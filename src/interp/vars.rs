//! Scoped variable store.
//!
//! Names are uppercased. Each entry carries a scope kind and the level it
//! was declared at; `push_scope`/`pop_scope` bracket procedure calls, and
//! popping releases private/local entries of the departing level. Public
//! entries always live at level 0.

use std::collections::HashMap;

use crate::lang::ast::VarKind;
use crate::value::Value;

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    kind: VarKind,
    level: u32,
}

#[derive(Debug, Default)]
pub struct VarStore {
    map: HashMap<String, Slot>,
    level: u32,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn push_scope(&mut self) {
        self.level += 1;
    }

    /// Leave the current level, releasing its private and local entries.
    pub fn pop_scope(&mut self) {
        let departing = self.level;
        self.map
            .retain(|_, slot| slot.kind == VarKind::Public || slot.level < departing);
        self.level = self.level.saturating_sub(1);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.map.get(&name.to_ascii_uppercase()).map(|s| &s.value)
    }

    /// Assign, creating implicitly as private at the current level.
    pub fn set(&mut self, name: &str, value: Value) {
        let key = name.to_ascii_uppercase();
        match self.map.get_mut(&key) {
            Some(slot) => slot.value = value,
            None => {
                self.map.insert(
                    key,
                    Slot {
                        value,
                        kind: VarKind::Private,
                        level: self.level,
                    },
                );
            }
        }
    }

    /// Declare with an explicit kind; public forces level 0. Existing
    /// entries are re-tagged, keeping their value.
    pub fn declare(&mut self, name: &str, kind: VarKind, value: Value) {
        let key = name.to_ascii_uppercase();
        let level = if kind == VarKind::Public { 0 } else { self.level };
        match self.map.get_mut(&key) {
            Some(slot) => {
                slot.kind = kind;
                slot.level = level;
            }
            None => {
                self.map.insert(key, Slot { value, kind, level });
            }
        }
    }

    /// Remove one name. Returns whether it existed.
    pub fn release(&mut self, name: &str) -> bool {
        self.map.remove(&name.to_ascii_uppercase()).is_some()
    }

    /// Remove every non-public entry declared at level 1 or above, plus
    /// private entries at level 0 (RELEASE ALL semantics).
    pub fn release_all(&mut self) {
        self.map.retain(|_, slot| slot.kind == VarKind::Public);
    }

    /// Drop everything, public included (CLEAR ALL).
    pub fn clear(&mut self) {
        self.map.clear();
        self.level = 0;
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_uppercased() {
        let mut vars = VarStore::new();
        vars.set("counter", Value::Number(1.0));
        assert_eq!(vars.get("COUNTER"), Some(&Value::Number(1.0)));
        assert_eq!(vars.get("Counter"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_implicit_declaration_is_private_at_level() {
        let mut vars = VarStore::new();
        vars.push_scope();
        vars.set("x", Value::Number(5.0));
        assert!(vars.get("x").is_some());
        vars.pop_scope();
        assert!(vars.get("x").is_none());
    }

    #[test]
    fn test_public_survives_pop() {
        let mut vars = VarStore::new();
        vars.push_scope();
        vars.declare("g", VarKind::Public, Value::Str("kept".into()));
        vars.pop_scope();
        assert_eq!(vars.get("g"), Some(&Value::Str("kept".into())));
    }

    #[test]
    fn test_locals_released_per_level() {
        let mut vars = VarStore::new();
        vars.set("outer", Value::Number(1.0));
        vars.push_scope();
        vars.declare("inner", VarKind::Local, Value::Number(2.0));
        assert!(vars.get("outer").is_some());
        vars.pop_scope();
        assert!(vars.get("inner").is_none());
        assert!(vars.get("outer").is_some());
    }

    #[test]
    fn test_release_and_release_all() {
        let mut vars = VarStore::new();
        vars.declare("keep", VarKind::Public, Value::Number(1.0));
        vars.set("drop1", Value::Number(2.0));
        vars.set("drop2", Value::Number(3.0));
        assert!(vars.release("drop1"));
        assert!(!vars.release("drop1"));
        vars.release_all();
        assert!(vars.get("keep").is_some());
        assert!(vars.get("drop2").is_none());
        vars.clear();
        assert!(vars.is_empty());
    }
}
