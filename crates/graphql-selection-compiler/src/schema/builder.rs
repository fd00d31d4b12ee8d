use std::sync::Arc;

use indexmap::IndexMap;

use crate::{ArgumentDefinition, Expr, FieldExtension, Parameter, RecordShape, Ty};

use super::{FieldArguments, FieldDefinition, ObjectType, Schema};

type ResolveFn = Box<dyn FnOnce(&Parameter, &Parameter) -> Expr>;

pub struct SchemaBuilder {
    query_type: Arc<str>,
    types: IndexMap<Arc<str>, ObjectTypeBuilder>,
}

impl SchemaBuilder {
    pub fn new(query_type: &str) -> Self {
        let mut builder = SchemaBuilder {
            query_type: query_type.into(),
            types: IndexMap::new(),
        };
        builder.object(query_type);
        builder
    }

    /// The object type named `name`, created on first use.
    pub fn object(&mut self, name: &str) -> &mut ObjectTypeBuilder {
        let is_query = *self.query_type == *name;
        self.types
            .entry(name.into())
            .or_insert_with(|| ObjectTypeBuilder::new(name, is_query))
    }

    pub fn build(self) -> Schema {
        let types = self
            .types
            .into_iter()
            .map(|(name, builder)| (name, builder.build()))
            .collect::<IndexMap<_, _>>();

        let context = match types.get(&self.query_type) {
            Some(query) => query.context.clone(),
            None => Parameter::new("ctx", Ty::Object(self.query_type.clone())),
        };

        tracing::debug!(types = types.len(), query = %self.query_type, "built schema");

        Schema {
            query_type: self.query_type,
            context,
            types,
        }
    }
}

pub struct ObjectTypeBuilder {
    name: Arc<str>,
    is_query: bool,
    description: Option<String>,
    fields: Vec<FieldDefinitionBuilder>,
}

impl ObjectTypeBuilder {
    fn new(name: &str, is_query: bool) -> Self {
        ObjectTypeBuilder {
            name: name.into(),
            is_query,
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// A field reading the member of the same name on the context.
    pub fn member(&mut self, name: &str, ty: Ty) -> &mut FieldDefinitionBuilder {
        let member: Arc<str> = name.into();
        self.field(name, move |context, _| context.member(member, ty))
    }

    /// A field resolved by an expression built from the type's context parameter
    /// and the field's arguments parameter. The closure runs when the schema is
    /// built, once every argument has been declared.
    pub fn field(
        &mut self,
        name: &str,
        resolve: impl FnOnce(&Parameter, &Parameter) -> Expr + 'static,
    ) -> &mut FieldDefinitionBuilder {
        self.fields.push(FieldDefinitionBuilder {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
            services: Vec::new(),
            extensions: Vec::new(),
            resolve: Box::new(resolve),
        });
        let index = self.fields.len() - 1;
        &mut self.fields[index]
    }

    fn build(self) -> ObjectType {
        let context = if self.is_query {
            Parameter::new("ctx", Ty::Object(self.name.clone()))
        } else {
            Parameter::new(lower_first(&self.name), Ty::Object(self.name.clone()))
        };

        let mut fields = IndexMap::new();
        for field in self.fields {
            let field = field.build(&context);
            fields.insert(field.name.clone(), Arc::new(field));
        }

        let typename = FieldDefinitionBuilder {
            name: "__typename".into(),
            description: None,
            arguments: Vec::new(),
            services: Vec::new(),
            extensions: Vec::new(),
            resolve: {
                let name = self.name.clone();
                Box::new(move |_: &Parameter, _: &Parameter| Expr::constant(name.as_ref(), Ty::STRING))
            },
        };
        fields.insert("__typename".into(), Arc::new(typename.build(&context)));

        ObjectType {
            name: self.name,
            description: self.description,
            context,
            fields,
        }
    }
}

pub struct FieldDefinitionBuilder {
    name: Arc<str>,
    description: Option<String>,
    arguments: Vec<ArgumentDefinition>,
    services: Vec<Arc<str>>,
    extensions: Vec<Arc<dyn FieldExtension>>,
    resolve: ResolveFn,
}

impl FieldDefinitionBuilder {
    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn argument(&mut self, argument: ArgumentDefinition) -> &mut Self {
        self.arguments.push(argument);
        self
    }

    /// Marks the field as calling `service`, which defers it to the full pass.
    pub fn requires_service(&mut self, service: impl Into<Arc<str>>) -> &mut Self {
        self.services.push(service.into());
        self
    }

    /// Attaches an extension and declares the arguments it reads.
    pub fn extension(&mut self, extension: impl FieldExtension + 'static) -> &mut Self {
        self.arguments.extend(extension.arguments());
        self.extensions.push(Arc::new(extension));
        self
    }

    fn build(self, context: &Parameter) -> FieldDefinition {
        let definitions = self
            .arguments
            .into_iter()
            .map(|argument| (argument.name.clone(), argument))
            .collect::<IndexMap<_, _>>();
        let shape = RecordShape::new(
            definitions
                .values()
                .map(|argument| (argument.name.clone(), argument.ty.clone())),
        );
        let parameter = Parameter::new(format!("args_{}", self.name), Ty::Record(Arc::new(shape)));
        let resolve = (self.resolve)(context, &parameter);

        FieldDefinition {
            name: self.name,
            description: self.description,
            context: context.clone(),
            resolve,
            arguments: FieldArguments { parameter, definitions },
            services: self.services,
            extensions: self.extensions,
        }
    }
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
