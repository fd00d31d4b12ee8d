//! Operations bound against a [`Schema`](crate::Schema): every field selection
//! already knows its definition.

mod bind;

use std::sync::Arc;

use indexmap::IndexMap;

pub use bind::*;

use crate::{FieldDefinition, Value};

#[derive(Debug, Clone, Default)]
pub struct QueryDocument {
    pub name: Option<String>,
    pub variables: Vec<VariableDefinition>,
    pub selection_set: Vec<Selection>,
    pub fragments: IndexMap<Arc<str>, FragmentDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: Arc<str>,
    pub default: Option<Value>,
    pub nullable: bool,
}

#[derive(Debug, Clone)]
pub enum Selection {
    Field(FieldSelection),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

#[derive(Debug, Clone)]
pub struct FieldSelection {
    /// Alias if any, field name otherwise.
    pub response_key: Arc<str>,
    pub definition: Arc<FieldDefinition>,
    pub arguments: IndexMap<Arc<str>, ArgumentValue>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
}

impl FieldSelection {
    pub fn new(definition: &Arc<FieldDefinition>) -> Self {
        FieldSelection {
            response_key: definition.name().into(),
            definition: definition.clone(),
            arguments: IndexMap::new(),
            directives: Vec::new(),
            selection_set: Vec::new(),
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: &str) -> Self {
        self.response_key = alias.into();
        self
    }

    #[must_use]
    pub fn argument(mut self, name: &str, value: ArgumentValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    #[must_use]
    pub fn select(mut self, selection: impl Into<Selection>) -> Self {
        self.selection_set.push(selection.into());
        self
    }
}

impl From<FieldSelection> for Selection {
    fn from(field: FieldSelection) -> Self {
        Selection::Field(field)
    }
}

#[derive(Debug, Clone)]
pub struct FragmentSpread {
    pub fragment_name: Arc<str>,
    pub directives: Vec<Directive>,
}

impl From<FragmentSpread> for Selection {
    fn from(spread: FragmentSpread) -> Self {
        Selection::FragmentSpread(spread)
    }
}

#[derive(Debug, Clone)]
pub struct InlineFragment {
    pub type_condition: Option<Arc<str>>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
}

impl From<InlineFragment> for Selection {
    fn from(fragment: InlineFragment) -> Self {
        Selection::InlineFragment(fragment)
    }
}

#[derive(Debug, Clone)]
pub struct FragmentDefinition {
    pub name: Arc<str>,
    pub type_condition: Arc<str>,
    pub selection_set: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: Arc<str>,
    pub arguments: IndexMap<Arc<str>, ArgumentValue>,
}

impl Directive {
    pub fn new(name: &str) -> Self {
        Directive {
            name: name.into(),
            arguments: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn argument(mut self, name: &str, value: ArgumentValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    Literal(Value),
    Variable(Arc<str>),
    List(Vec<ArgumentValue>),
    Object(IndexMap<Arc<str>, ArgumentValue>),
}

impl ArgumentValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        ArgumentValue::Literal(value.into())
    }

    pub fn variable(name: &str) -> Self {
        ArgumentValue::Variable(name.into())
    }
}

/// Values supplied for an operation's variables.
#[derive(Debug, Clone, Default)]
pub struct Variables(IndexMap<Arc<str>, Value>);

impl Variables {
    /// Reads variables from a JSON object, anything else yields no variables.
    pub fn from_json(json: serde_json::Value) -> Self {
        match Value::from(json) {
            Value::Object(object) => Variables(object.as_ref().clone()),
            _ => Variables::default(),
        }
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}
