mod builder;

use std::sync::Arc;

use indexmap::IndexMap;

pub use builder::*;

use crate::{Expr, FieldExtension, Parameter, Ty, Value};

/// Object types exposed to queries. Every field resolves through an expression
/// template built against its type's declared context parameter.
#[derive(Debug)]
pub struct Schema {
    query_type: Arc<str>,
    context: Parameter,
    types: IndexMap<Arc<str>, ObjectType>,
}

impl Schema {
    pub fn builder(query_type: &str) -> SchemaBuilder {
        SchemaBuilder::new(query_type)
    }

    /// Context parameter of the query type, bound to the root data at evaluation.
    pub fn context(&self) -> &Parameter {
        &self.context
    }

    pub fn query_type(&self) -> Option<&ObjectType> {
        self.types.get(&self.query_type)
    }

    pub fn object_type(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }

    pub fn object_types(&self) -> impl Iterator<Item = &ObjectType> + '_ {
        self.types.values()
    }
}

#[derive(Debug)]
pub struct ObjectType {
    name: Arc<str>,
    description: Option<String>,
    context: Parameter,
    fields: IndexMap<Arc<str>, Arc<FieldDefinition>>,
}

impl ObjectType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn context(&self) -> &Parameter {
        &self.context
    }

    pub fn field(&self, name: &str) -> Option<&Arc<FieldDefinition>> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Arc<FieldDefinition>> + '_ {
        self.fields.values()
    }
}

/// What a field resolves to, which decides how its selection is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum FieldShape {
    Leaf,
    Object,
    List,
}

#[derive(Debug)]
pub struct FieldDefinition {
    name: Arc<str>,
    description: Option<String>,
    context: Parameter,
    resolve: Expr,
    arguments: FieldArguments,
    services: Vec<Arc<str>>,
    extensions: Vec<Arc<dyn FieldExtension>>,
}

impl FieldDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The parameter `resolve` reads the enclosing object from.
    pub fn context(&self) -> &Parameter {
        &self.context
    }

    pub fn resolve(&self) -> &Expr {
        &self.resolve
    }

    pub fn arguments(&self) -> &FieldArguments {
        &self.arguments
    }

    pub fn services(&self) -> &[Arc<str>] {
        &self.services
    }

    pub fn requires_service(&self) -> bool {
        !self.services.is_empty()
    }

    pub fn extensions(&self) -> &[Arc<dyn FieldExtension>] {
        &self.extensions
    }

    pub fn shape(&self) -> FieldShape {
        match self.resolve.ty() {
            Ty::Object(_) | Ty::Record(_) => FieldShape::Object,
            Ty::List(inner) | Ty::Map(inner) if inner.is_composite() => FieldShape::List,
            _ => FieldShape::Leaf,
        }
    }

    /// Name of the object type a sub-selection of this field is bound against.
    pub fn output_object_type(&self) -> Option<&str> {
        match self.resolve.ty() {
            Ty::Object(name) => Some(name),
            Ty::List(inner) | Ty::Map(inner) => inner.object_name(),
            _ => None,
        }
    }
}

/// Declared arguments of a field, read by its template through a record-typed parameter.
#[derive(Debug)]
pub struct FieldArguments {
    parameter: Parameter,
    definitions: IndexMap<Arc<str>, ArgumentDefinition>,
}

impl FieldArguments {
    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    pub fn get(&self, name: &str) -> Option<&ArgumentDefinition> {
        self.definitions.get(name)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ArgumentDefinition> + '_ {
        self.definitions.values()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDefinition {
    pub name: Arc<str>,
    pub ty: Ty,
    pub default: Option<Value>,
    pub required: bool,
}

impl ArgumentDefinition {
    /// An optional argument, null when not provided.
    pub fn new(name: impl Into<Arc<str>>, ty: Ty) -> Self {
        ArgumentDefinition {
            name: name.into(),
            ty,
            default: None,
            required: false,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}
