use async_trait::async_trait;
use intake_models::{CloudEvent, IntakeError};
use std::collections::HashMap;
use std::sync::Arc;

/// A handler the HTTP front end can dispatch CloudEvents to.
#[async_trait]
pub trait CloudEventFunction: Send + Sync + 'static {
    /// Name matched against `FUNCTION_TARGET`.
    fn name(&self) -> &str;

    async fn call(&self, event: CloudEvent) -> Result<(), IntakeError>;
}

/// Functions this binary knows how to serve, keyed by target name.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn CloudEventFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function; a later registration under the same name wins.
    pub fn register(&mut self, function: Arc<dyn CloudEventFunction>) -> &mut Self {
        self.functions.insert(function.name().to_string(), function);
        self
    }

    pub fn resolve(&self, target: &str) -> Result<Arc<dyn CloudEventFunction>, IntakeError> {
        self.functions
            .get(target)
            .cloned()
            .ok_or_else(|| IntakeError::FunctionNotFound {
                target: target.to_string(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}
