use std::sync::Arc;

use indexmap::{map::Entry, IndexMap};

use crate::Expr;

/// Compiled fields of a selection, keyed case-insensitively.
///
/// Inserting an existing key replaces its expression but keeps the spelling and
/// position of the first insertion.
#[derive(Debug, Clone, Default)]
pub struct SelectionMap {
    fields: IndexMap<String, CompiledField>,
}

#[derive(Debug, Clone)]
pub struct CompiledField {
    pub name: Arc<str>,
    pub expression: Expr,
}

impl SelectionMap {
    pub fn insert(&mut self, name: &Arc<str>, expression: Expr) {
        match self.fields.entry(name.to_ascii_lowercase()) {
            Entry::Occupied(mut entry) => entry.get_mut().expression = expression,
            Entry::Vacant(entry) => {
                entry.insert(CompiledField {
                    name: name.clone(),
                    expression,
                });
            }
        }
    }

    /// Inserts only if no field answers to `name` yet. Returns whether it did.
    pub fn insert_if_absent(&mut self, name: &Arc<str>, expression: Expr) -> bool {
        let key = name.to_ascii_lowercase();
        if self.fields.contains_key(&key) {
            return false;
        }
        self.fields.insert(
            key,
            CompiledField {
                name: name.clone(),
                expression,
            },
        );
        true
    }

    /// Adds a field fetched on behalf of another field and returns the key it ended up
    /// under. A field already holding the same expression is shared. If `name` is taken
    /// by something else the field goes under a `__dep_` key instead.
    pub fn insert_fetched(&mut self, name: &Arc<str>, expression: Expr) -> Arc<str> {
        let mut key = name.clone();
        let mut attempt = 1;
        loop {
            match self.fields.get(&key.to_ascii_lowercase()) {
                None => {
                    self.insert(&key, expression);
                    return key;
                }
                Some(field) if field.expression == expression => return field.name.clone(),
                Some(_) => {
                    key = match attempt {
                        1 => format!("__dep_{name}").into(),
                        n => format!("__dep_{name}_{n}").into(),
                    };
                    attempt += 1;
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(|field| &field.expression)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &CompiledField> + '_ {
        self.fields.values()
    }
}
