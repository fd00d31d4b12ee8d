use indexmap::IndexMap;

use crate::{Environment, Parameter, Value};

/// Values that must be bound to their parameters before a compiled expression
/// can be evaluated, such as the arguments of every field in the selection.
#[derive(Debug, Clone, Default)]
pub struct ConstantParameters(IndexMap<Parameter, Value>);

impl ConstantParameters {
    pub fn insert(&mut self, parameter: Parameter, value: Value) {
        self.0.insert(parameter, value);
    }

    /// Merges `other` into `self`, its values replacing existing ones.
    pub fn extend(&mut self, other: ConstantParameters) {
        self.0.extend(other.0);
    }

    pub fn get(&self, parameter: &Parameter) -> Option<&Value> {
        self.0.get(parameter)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Parameter, &Value)> + '_ {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluation environment binding every constant.
    pub fn environment(&self) -> Environment {
        self.0
            .iter()
            .map(|(parameter, value)| (parameter.id(), value.clone()))
            .collect()
    }
}
