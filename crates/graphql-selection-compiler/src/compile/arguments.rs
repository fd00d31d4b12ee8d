use std::sync::Arc;

use crate::{
    error::{CompileError, CompileResult},
    value::Object,
    ArgumentValue, FieldPath, FieldSelection, Parameter, QueryDocument, Value, VariableDefinition, Variables,
};

/// Variables of an operation, falling back to the declared defaults.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VariableValues<'a> {
    definitions: &'a [VariableDefinition],
    supplied: &'a Variables,
}

impl<'a> VariableValues<'a> {
    pub(crate) fn new(document: &'a QueryDocument, supplied: &'a Variables) -> Self {
        VariableValues {
            definitions: &document.variables,
            supplied,
        }
    }

    fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.supplied.get(name) {
            return Some(value.clone());
        }
        let definition = self.definitions.iter().find(|definition| definition.name.as_ref() == name)?;
        definition
            .default
            .clone()
            .or_else(|| definition.nullable.then_some(Value::Null))
    }

    pub(crate) fn resolve(&self, value: &ArgumentValue, path: &FieldPath) -> CompileResult<Value> {
        match value {
            ArgumentValue::Literal(value) => Ok(value.clone()),
            ArgumentValue::Variable(name) => self.get(name).ok_or_else(|| CompileError::MissingVariable {
                path: path.clone(),
                name: name.to_string(),
            }),
            ArgumentValue::List(items) => Ok(Value::list(
                items
                    .iter()
                    .map(|item| self.resolve(item, path))
                    .collect::<CompileResult<Vec<_>>>()?,
            )),
            ArgumentValue::Object(fields) => Ok(Value::Object(Arc::new(
                fields
                    .iter()
                    .map(|(key, item)| -> CompileResult<(Arc<str>, Value)> {
                        Ok((key.clone(), self.resolve(item, path)?))
                    })
                    .collect::<CompileResult<Object>>()?,
            ))),
        }
    }
}

/// Resolves the arguments of `field` and binds them to a parameter of its own, so
/// that two selections of the same field never share argument values.
pub(crate) fn bind_arguments(
    field: &FieldSelection,
    variables: &VariableValues<'_>,
    path: &FieldPath,
) -> CompileResult<Option<(Parameter, Value)>> {
    let declared = field.definition.arguments();
    if let Some(name) = field.arguments.keys().find(|name| declared.get(name).is_none()) {
        return Err(CompileError::UnknownArgument {
            path: path.clone(),
            name: name.to_string(),
        });
    }
    if declared.is_empty() {
        return Ok(None);
    }

    let mut values = Object::with_capacity(declared.iter().len());
    for definition in declared.iter() {
        let provided = field
            .arguments
            .get(&definition.name)
            .map(|value| variables.resolve(value, path))
            .transpose()?;
        let value = provided.or_else(|| definition.default.clone()).unwrap_or_default();
        if definition.required && value.is_null() {
            return Err(CompileError::MissingArgument {
                path: path.clone(),
                name: definition.name.to_string(),
            });
        }
        values.insert(definition.name.clone(), value);
    }

    let template = declared.parameter();
    let parameter = Parameter::new(template.name(), template.ty().clone());
    tracing::trace!(%path, parameter = parameter.name(), "bound field arguments");

    Ok(Some((parameter, Value::Object(Arc::new(values)))))
}
