use std::sync::Arc;

use async_graphql_parser::{
    types::{self as ast, OperationType},
    Pos, Positioned,
};
use indexmap::IndexMap;

use crate::{ObjectType, Schema, Value};

use super::{
    ArgumentValue, Directive, FieldSelection, FragmentDefinition, FragmentSpread, InlineFragment, QueryDocument,
    Selection, VariableDefinition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl From<Pos> for Location {
    fn from(pos: Pos) -> Self {
        Location {
            line: pos.line,
            column: pos.column,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BindError {
    #[error("{message}")]
    Parse { message: String, location: Option<Location> },
    #[error("Unknown operation named '{name}'")]
    UnknownOperation { name: String },
    #[error("The document contains multiple operations, an operation name is required")]
    MissingOperationName,
    #[error("The document does not contain any operation")]
    NoOperation,
    #[error("Only queries are supported, found a {ty}")]
    UnsupportedOperation { ty: &'static str, location: Location },
    #[error("Unknown type named '{name}'")]
    UnknownType { name: String, location: Location },
    #[error("{container} does not have a field named '{name}'")]
    UnknownField {
        container: String,
        name: String,
        location: Location,
    },
    #[error("Field '{name}' cannot have a selection set, it's a leaf")]
    CannotHaveSelectionSet { name: String, location: Location },
    #[error("Binary values are not supported, found one for '{name}'")]
    UnsupportedValue { name: String, location: Location },
}

impl BindError {
    pub fn location(&self) -> Option<Location> {
        match self {
            BindError::Parse { location, .. } => *location,
            BindError::UnknownOperation { .. } | BindError::MissingOperationName | BindError::NoOperation => None,
            BindError::UnsupportedOperation { location, .. }
            | BindError::UnknownType { location, .. }
            | BindError::UnknownField { location, .. }
            | BindError::CannotHaveSelectionSet { location, .. }
            | BindError::UnsupportedValue { location, .. } => Some(*location),
        }
    }
}

type BindResult<T> = Result<T, BindError>;

impl QueryDocument {
    /// Parses `query` and binds the selected operation and every fragment against `schema`.
    pub fn parse(schema: &Schema, query: &str, operation_name: Option<&str>) -> BindResult<Self> {
        let document = async_graphql_parser::parse_query(query).map_err(|err| BindError::Parse {
            location: err.positions().next().map(Location::from),
            message: err.to_string(),
        })?;

        Binder { schema }.bind(document, operation_name)
    }
}

struct Binder<'a> {
    schema: &'a Schema,
}

impl<'a> Binder<'a> {
    fn bind(&self, document: ast::ExecutableDocument, operation_name: Option<&str>) -> BindResult<QueryDocument> {
        let mut operations = document.operations.iter();
        let (name, operation) = match operation_name {
            Some(expected) => operations
                .find(|(name, _)| name.is_some_and(|name| name.as_str() == expected))
                .ok_or_else(|| BindError::UnknownOperation {
                    name: expected.to_string(),
                })?,
            None => match (operations.next(), operations.next()) {
                (Some(operation), None) => operation,
                (None, _) => return Err(BindError::NoOperation),
                (Some(_), Some(_)) => return Err(BindError::MissingOperationName),
            },
        };

        let ty = match operation.node.ty {
            OperationType::Query => None,
            OperationType::Mutation => Some("mutation"),
            OperationType::Subscription => Some("subscription"),
        };
        if let Some(ty) = ty {
            return Err(BindError::UnsupportedOperation {
                ty,
                location: operation.pos.into(),
            });
        }

        let root = self.object_type(self.schema.query_type().map(|ty| ty.name()).unwrap_or("Query"), operation.pos)?;

        let variables = operation
            .node
            .variable_definitions
            .iter()
            .map(|definition| -> BindResult<VariableDefinition> {
                let definition = &definition.node;
                Ok(VariableDefinition {
                    name: definition.name.node.as_str().into(),
                    nullable: definition.var_type.node.nullable,
                    default: definition
                        .default_value
                        .as_ref()
                        .map(|value| const_value(definition.name.node.as_str(), value))
                        .transpose()?,
                })
            })
            .collect::<BindResult<Vec<_>>>()?;

        let selection_set = self.bind_selection_set(root, &operation.node.selection_set.node)?;

        let mut fragments = IndexMap::with_capacity(document.fragments.len());
        for (name, fragment) in &document.fragments {
            let type_condition = &fragment.node.type_condition.node.on;
            let ty = self.object_type(type_condition.node.as_str(), type_condition.pos)?;
            fragments.insert(
                Arc::<str>::from(name.as_str()),
                FragmentDefinition {
                    name: name.as_str().into(),
                    type_condition: ty.name().into(),
                    selection_set: self.bind_selection_set(ty, &fragment.node.selection_set.node)?,
                },
            );
        }

        tracing::debug!(
            operation = name.map(|name| name.as_str()).unwrap_or("<anonymous>"),
            fragments = fragments.len(),
            "bound operation"
        );

        Ok(QueryDocument {
            name: name.map(|name| name.to_string()),
            variables,
            selection_set,
            fragments,
        })
    }

    fn object_type(&self, name: &str, pos: Pos) -> BindResult<&'a ObjectType> {
        self.schema.object_type(name).ok_or_else(|| BindError::UnknownType {
            name: name.to_string(),
            location: pos.into(),
        })
    }

    fn bind_selection_set(&self, parent: &'a ObjectType, selection_set: &ast::SelectionSet) -> BindResult<Vec<Selection>> {
        selection_set
            .items
            .iter()
            .map(|item| -> BindResult<Selection> {
                match &item.node {
                    ast::Selection::Field(field) => self.bind_field(parent, field).map(Selection::Field),
                    ast::Selection::FragmentSpread(spread) => Ok(Selection::FragmentSpread(FragmentSpread {
                        fragment_name: spread.node.fragment_name.node.as_str().into(),
                        directives: bind_directives(&spread.node.directives)?,
                    })),
                    ast::Selection::InlineFragment(fragment) => {
                        let (ty, type_condition) = match &fragment.node.type_condition {
                            Some(condition) => {
                                let ty = self.object_type(condition.node.on.node.as_str(), condition.pos)?;
                                (ty, Some(ty.name().into()))
                            }
                            None => (parent, None),
                        };
                        Ok(Selection::InlineFragment(InlineFragment {
                            type_condition,
                            directives: bind_directives(&fragment.node.directives)?,
                            selection_set: self.bind_selection_set(ty, &fragment.node.selection_set.node)?,
                        }))
                    }
                }
            })
            .collect()
    }

    fn bind_field(&self, parent: &'a ObjectType, field: &Positioned<ast::Field>) -> BindResult<FieldSelection> {
        let name = field.node.name.node.as_str();
        let definition = parent.field(name).ok_or_else(|| BindError::UnknownField {
            container: parent.name().to_string(),
            name: name.to_string(),
            location: field.pos.into(),
        })?;

        let selection_set = if field.node.selection_set.node.items.is_empty() {
            Vec::new()
        } else {
            let Some(output) = definition.output_object_type() else {
                return Err(BindError::CannotHaveSelectionSet {
                    name: name.to_string(),
                    location: field.pos.into(),
                });
            };
            let ty = self.object_type(output, field.pos)?;
            self.bind_selection_set(ty, &field.node.selection_set.node)?
        };

        Ok(FieldSelection {
            response_key: field
                .node
                .alias
                .as_ref()
                .map(|alias| alias.node.as_str())
                .unwrap_or(name)
                .into(),
            definition: definition.clone(),
            arguments: bind_arguments(&field.node.arguments)?,
            directives: bind_directives(&field.node.directives)?,
            selection_set,
        })
    }
}

fn bind_directives(directives: &[Positioned<ast::Directive>]) -> BindResult<Vec<Directive>> {
    directives
        .iter()
        .map(|directive| -> BindResult<Directive> {
            Ok(Directive {
                name: directive.node.name.node.as_str().into(),
                arguments: bind_arguments(&directive.node.arguments)?,
            })
        })
        .collect()
}

fn bind_arguments(
    arguments: &[(Positioned<async_graphql_value::Name>, Positioned<async_graphql_value::Value>)],
) -> BindResult<IndexMap<Arc<str>, ArgumentValue>> {
    arguments
        .iter()
        .map(|(name, value)| -> BindResult<(Arc<str>, ArgumentValue)> {
            let bound = bind_value(name.node.as_str(), value.pos, &value.node)?;
            Ok((Arc::<str>::from(name.node.as_str()), bound))
        })
        .collect()
}

fn bind_value(name: &str, pos: Pos, value: &async_graphql_value::Value) -> BindResult<ArgumentValue> {
    use async_graphql_value::Value as Ast;

    Ok(match value {
        Ast::Variable(variable) => ArgumentValue::Variable(variable.as_str().into()),
        Ast::Null => ArgumentValue::Literal(Value::Null),
        Ast::Number(number) => ArgumentValue::Literal(Value::from(serde_json::Value::Number(number.clone()))),
        Ast::String(s) => ArgumentValue::Literal(Value::from(s.as_str())),
        Ast::Boolean(b) => ArgumentValue::Literal(Value::Boolean(*b)),
        Ast::Enum(variant) => ArgumentValue::Literal(Value::from(variant.as_str())),
        Ast::List(items) => ArgumentValue::List(
            items
                .iter()
                .map(|item| bind_value(name, pos, item))
                .collect::<BindResult<_>>()?,
        ),
        Ast::Object(fields) => ArgumentValue::Object(
            fields
                .iter()
                .map(|(key, item)| -> BindResult<(Arc<str>, ArgumentValue)> {
                    Ok((Arc::<str>::from(key.as_str()), bind_value(name, pos, item)?))
                })
                .collect::<BindResult<_>>()?,
        ),
        Ast::Binary(_) => {
            return Err(BindError::UnsupportedValue {
                name: name.to_string(),
                location: pos.into(),
            })
        }
    })
}

fn const_value(name: &str, value: &Positioned<async_graphql_value::ConstValue>) -> BindResult<Value> {
    value
        .node
        .clone()
        .into_json()
        .map(Value::from)
        .map_err(|_| BindError::UnsupportedValue {
            name: name.to_string(),
            location: value.pos.into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ty;

    fn schema() -> Schema {
        let mut builder = Schema::builder("Query");
        builder.object("Query").member("people", Ty::list(Ty::object("Person")));
        let person = builder.object("Person");
        person.member("name", Ty::STRING);
        person.member("age", Ty::INT);
        builder.build()
    }

    #[test]
    fn binds_fields_fragments_and_variables() {
        let schema = schema();
        let document = QueryDocument::parse(
            &schema,
            r#"
            query People($min: Int = 18, $skipName: Boolean!) {
                everyone: people(minAge: $min) {
                    ...Details
                    name @skip(if: $skipName)
                }
            }

            fragment Details on Person { age __typename }
            "#,
            None,
        )
        .unwrap();

        assert_eq!(document.name.as_deref(), Some("People"));
        assert_eq!(
            document.variables,
            vec![
                VariableDefinition {
                    name: "min".into(),
                    default: Some(Value::Int(18)),
                    nullable: true,
                },
                VariableDefinition {
                    name: "skipName".into(),
                    default: None,
                    nullable: false,
                },
            ]
        );

        let Selection::Field(everyone) = &document.selection_set[0] else {
            unreachable!()
        };
        assert_eq!(everyone.response_key.as_ref(), "everyone");
        assert_eq!(everyone.definition.name(), "people");
        assert_eq!(everyone.arguments["minAge"], ArgumentValue::variable("min"));
        assert_eq!(everyone.selection_set.len(), 2);
        assert_eq!(document.fragments["Details"].type_condition.as_ref(), "Person");
    }

    #[test]
    fn unknown_field() {
        let error = QueryDocument::parse(&schema(), "{ people { height } }", None).unwrap_err();
        insta::assert_snapshot!(error, @"Person does not have a field named 'height'");
        assert!(error.location().is_some());
    }

    #[test]
    fn leaf_with_selection_set() {
        let error = QueryDocument::parse(&schema(), "{ people { name { x } } }", None).unwrap_err();
        insta::assert_snapshot!(error, @"Field 'name' cannot have a selection set, it's a leaf");
    }

    #[test]
    fn operation_selection() {
        let query = "query A { people { name } } query B { people { age } }";
        assert!(matches!(
            QueryDocument::parse(&schema(), query, None),
            Err(BindError::MissingOperationName)
        ));
        assert_eq!(
            QueryDocument::parse(&schema(), query, Some("B")).unwrap().name.as_deref(),
            Some("B")
        );
        assert!(matches!(
            QueryDocument::parse(&schema(), "mutation { people { name } }", None),
            Err(BindError::UnsupportedOperation { ty: "mutation", .. })
        ));
    }

    #[test]
    fn document_without_operations() {
        let schema = schema();
        let document = ast::ExecutableDocument {
            operations: ast::DocumentOperations::Multiple(Default::default()),
            fragments: Default::default(),
        };
        let error = Binder { schema: &schema }.bind(document, None).unwrap_err();
        assert!(matches!(error, BindError::NoOperation), "{error}");
        assert_eq!(error.location(), None);
        insta::assert_snapshot!(error, @"The document does not contain any operation");
    }
}
