//! Two-pass execution of a bound operation over in-memory data.

use std::sync::Arc;

use crate::{
    value::Object, CompileError, CompileMode, CompilerConfig, Environment, EvaluationError, Evaluator, Expr,
    FieldPath, Parameter, QueryDocument, RootField, RootSource, Schema, SelectionCompiler, ServiceProvider, Value,
    Variables,
};

pub struct QueryExecutor<'a> {
    schema: &'a Schema,
    config: CompilerConfig,
    evaluator: Evaluator,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct QueryResponse {
    #[serde(serialize_with = "serialize_data")]
    pub data: Object,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl QueryResponse {
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

fn serialize_data<S: serde::Serializer>(data: &Object, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(data.iter().map(|(key, value)| (key.as_ref(), value)))
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FieldError {
    pub message: String,
    pub path: FieldPath,
}

impl From<CompileError> for FieldError {
    fn from(err: CompileError) -> Self {
        FieldError {
            path: err.path().clone(),
            message: err.to_string(),
        }
    }
}

impl FieldError {
    fn evaluation(path: &FieldPath, err: EvaluationError) -> Self {
        FieldError {
            path: path.clone(),
            message: err.to_string(),
        }
    }
}

impl<'a> QueryExecutor<'a> {
    pub fn new(schema: &'a Schema, services: Arc<dyn ServiceProvider>) -> Self {
        QueryExecutor {
            schema,
            config: CompilerConfig::default(),
            evaluator: Evaluator::new(services),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs every root field of `document` against `data`, the value of the query
    /// type. A failing root field is reported in `errors` and set to null, the
    /// others are unaffected.
    pub fn execute(&self, document: &QueryDocument, variables: &Variables, data: &Value) -> QueryResponse {
        let mut compiler = SelectionCompiler::new(self.schema, document, variables, &self.config);
        let mut response = QueryResponse::default();

        let root_fields = match compiler.root_fields() {
            Ok(root_fields) => root_fields,
            Err(err) => {
                tracing::debug!(%err, "failed to expand the operation");
                response.errors.push(err.into());
                return response;
            }
        };

        for root in &root_fields {
            let value = match self.execute_root_field(&mut compiler, root, data) {
                Ok(value) => value,
                Err(error) => {
                    tracing::debug!(path = %error.path, message = %error.message, "root field failed");
                    response.errors.push(error);
                    Value::Null
                }
            };
            response.data.insert(root.response_key.clone(), value);
        }
        response
    }

    fn execute_root_field<'d>(
        &self,
        compiler: &mut SelectionCompiler<'d>,
        root: &RootField<'d>,
        data: &Value,
    ) -> Result<Value, FieldError> {
        let path = FieldPath::root(&root.response_key);
        let context = self.schema.context();

        let fetch = compiler.compile_root_field(root, CompileMode::DataOnly, &RootSource::Schema)?;
        let (compiled, env) = match fetch {
            Some(fetch) if fetch.deferred_services => {
                tracing::debug!(%path, "running the data pass");
                let env = fetch.constants.environment().update(context.id(), data.clone());
                let fetched = self.evaluate(&fetch.expression, &env, &path)?;

                let parameter = Parameter::new("data", fetch.expression.ty().clone());
                let source = RootSource::Materialized(parameter.clone());
                let Some(compiled) = compiler.compile_root_field(root, CompileMode::Full, &source)? else {
                    return Ok(Value::Null);
                };
                let env = compiled.constants.environment().update(parameter.id(), fetched);
                (compiled, env)
            }
            _ => {
                let Some(compiled) = compiler.compile_root_field(root, CompileMode::Full, &RootSource::Schema)? else {
                    return Ok(Value::Null);
                };
                let env = compiled.constants.environment().update(context.id(), data.clone());
                (compiled, env)
            }
        };

        self.evaluate(&compiled.expression, &env, &path)
    }

    /// Evaluates and forces the result, so that service failures surface here.
    fn evaluate(&self, expression: &Expr, env: &Environment, path: &FieldPath) -> Result<Value, FieldError> {
        self.evaluator
            .evaluate(expression, env)
            .and_then(|value| value.materialize())
            .map_err(|err| FieldError::evaluation(path, err))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Services;

    #[test]
    fn response_serializes_without_empty_errors() {
        let mut response = QueryResponse::default();
        response.data.insert("count".into(), Value::Int(2));
        assert_eq!(response.to_json().unwrap(), json!({"data": {"count": 2}}));

        response.errors.push(FieldError {
            message: "boom".into(),
            path: FieldPath::root(&"count".into()),
        });
        assert_eq!(
            response.to_json().unwrap(),
            json!({"data": {"count": 2}, "errors": [{"message": "boom", "path": ["count"]}]})
        );
    }

    #[test]
    fn empty_operation_yields_empty_response() {
        let schema = Schema::builder("Query").build();
        let executor = QueryExecutor::new(&schema, Arc::new(Services::new()));
        let response = executor.execute(&QueryDocument::default(), &Variables::default(), &Value::Null);
        assert!(response.data.is_empty());
        assert!(response.errors.is_empty());
    }
}
