use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure inside a tool. Never crosses [`Registry::invoke`]; it is rendered
/// into the text the agent receives instead.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Response(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),
    #[error("tool '{0}' is not registered")]
    Unknown(String),
}

/// A named single-string-in, single-string-out capability an agent may call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Shown to the model so it can decide when to call the tool.
    fn description(&self) -> &str;

    async fn call(&self, input: &str) -> Result<String, ToolError>;
}

/// What the model is told about a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRecord {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// An ordered set of tools, addressable by name.
///
/// Agents hold a [`Registry`] too: the subset returned by [`Registry::select`].
#[derive(Clone, Default)]
pub struct Registry {
    tools: Vec<Arc<dyn Tool>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&mut self, tool: T) -> Result<(), RegistryError>
    where
        T: Tool + 'static,
    {
        self.register_shared(Arc::new(tool))
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        if self.get(tool.name()).is_some() {
            return Err(RegistryError::Duplicate(tool.name().to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Builds the subset bound to one agent, in the order given.
    pub fn select(&self, names: &[&str]) -> Result<Registry, RegistryError> {
        let mut subset = Registry::new();
        for name in names {
            let tool = self
                .get(name)
                .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
            subset.register_shared(Arc::clone(tool))?;
        }
        Ok(subset)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn records(&self) -> Vec<ToolRecord> {
        self.tools
            .iter()
            .map(|t| ToolRecord {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: single_input_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs a tool and always hands back text.
    ///
    /// Unknown names, tool errors and panics all come back as a diagnostic
    /// string the agent can reason over.
    pub async fn invoke(&self, name: &str, input: &str) -> String {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "agent asked for a tool that is not bound");
            return format!(
                "Error: tool '{}' is not available. Available tools: {}",
                name,
                self.names().join(", ")
            );
        };

        debug!(tool = name, input_len = input.len(), "invoking tool");
        match AssertUnwindSafe(tool.call(input)).catch_unwind().await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "tool failed");
                format!("Error: tool '{}' failed: {}", name, e)
            }
            Err(_) => {
                warn!(tool = name, "tool panicked");
                format!("Error: tool '{}' failed unexpectedly", name)
            }
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// JSON schema for the one `input` string every tool takes.
pub fn single_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "input": {
                "type": "string",
                "description": "The text to pass to the tool."
            }
        },
        "required": ["input"]
    })
}
