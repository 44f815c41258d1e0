//! The variable environment.
//!
//! There is exactly one name → [`Value`] map per engine.  Macro calls shadow
//! names by binding staged values and recording what they replaced; the undo
//! records are replayed in reverse when the call returns.

use std::collections::HashMap;

use crate::script::Value;

/// What a binding replaced, so it can be put back.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoRecord {
    pub name: String,
    pub previous: Option<Value>,
}

/// Global name → value store.
#[derive(Debug, Default)]
pub struct Environment {
    vars: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Remove a variable, returning its value if it existed.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Apply staged bindings in order.  `None` hides the name for the
    /// duration of the call.  Returns one undo record per binding.
    pub fn bind(&mut self, staged: Vec<(String, Option<Value>)>) -> Vec<UndoRecord> {
        let mut undo = Vec::with_capacity(staged.len());
        for (name, value) in staged {
            let previous = match value {
                Some(v) => self.vars.insert(name.clone(), v),
                None => self.vars.remove(&name),
            };
            undo.push(UndoRecord { name, previous });
        }
        undo
    }

    /// Replay undo records in reverse order.
    pub fn restore(&mut self, undo: Vec<UndoRecord>) {
        for rec in undo.into_iter().rev() {
            match rec.previous {
                Some(v) => {
                    self.vars.insert(rec.name, v);
                }
                None => {
                    self.vars.remove(&rec.name);
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
