use std::{collections::HashMap, fmt, sync::Arc};

use crate::Value;

use super::EvaluationError;

/// Resolves the service calls of compiled expressions.
pub trait ServiceProvider: Send + Sync {
    fn call(&self, service: &str, method: &str, arguments: &[Value]) -> Result<Value, EvaluationError>;
}

type ServiceMethod = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// In-memory registry of service methods.
#[derive(Clone, Default)]
pub struct Services {
    methods: HashMap<String, ServiceMethod>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        service: &str,
        method: &str,
        call: impl Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    ) -> &mut Self {
        self.methods.insert(format!("{service}::{method}"), Arc::new(call));
        self
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.methods.keys()).finish()
    }
}

impl ServiceProvider for Services {
    fn call(&self, service: &str, method: &str, arguments: &[Value]) -> Result<Value, EvaluationError> {
        let call = self
            .methods
            .get(&format!("{service}::{method}"))
            .ok_or_else(|| EvaluationError::UnknownService {
                service: service.to_string(),
                method: method.to_string(),
            })?;
        call(arguments).map_err(|message| EvaluationError::Service {
            service: service.to_string(),
            method: method.to_string(),
            message,
        })
    }
}
