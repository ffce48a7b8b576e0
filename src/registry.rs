use std::collections::HashMap;

use crate::ast::Prototype;

/// Signatures of every function seen so far in a session.
///
/// This is the only piece of state that outlives a compilation unit: when a
/// later unit calls a function whose code lives elsewhere, the registry
/// supplies the prototype needed to re-declare it locally.
#[derive(Debug, Default, Clone)]
pub struct PrototypeRegistry {
    prototypes: HashMap<String, Prototype>,
}

impl PrototypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// record `prototype`, shadowing any previous entry of the same name
    pub fn insert(&mut self, prototype: Prototype) -> Option<Prototype> {
        self.prototypes.insert(prototype.name.clone(), prototype)
    }

    pub fn get(&self, name: &str) -> Option<&Prototype> {
        self.prototypes.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Prototype> {
        self.prototypes.remove(name)
    }

    /// put back the entry `name` had before a failed insert
    pub fn restore(&mut self, name: &str, previous: Option<Prototype>) {
        match previous {
            Some(prototype) => {
                self.insert(prototype);
            }
            None => {
                self.remove(name);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.prototypes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}
