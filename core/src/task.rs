use std::sync::Arc;

use crate::agent::AgentSpec;
use crate::template::{PromptTemplate, RunVariables, TemplateError};

/// Header placed between a task's own description and its upstream outputs.
pub const CONTEXT_HEADER: &str = "\n\nContext:\n";

/// Separator between two upstream outputs inside the context block.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// One pipeline step.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub description: PromptTemplate,
    pub expected_output: PromptTemplate,
    pub agent: Arc<AgentSpec>,
    /// Earlier tasks whose outputs are appended to this task's prompt.
    pub context: Vec<String>,
}

impl TaskSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<PromptTemplate>,
        expected_output: impl Into<PromptTemplate>,
        agent: Arc<AgentSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent,
            context: Vec::new(),
        }
    }

    pub fn with_context<I, S>(mut self, upstream: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context = upstream.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn resolve_texts(
        &self,
        vars: &RunVariables,
    ) -> Result<(String, String), TemplateError> {
        Ok((
            self.description.resolve(vars)?,
            self.expected_output.resolve(vars)?,
        ))
    }
}

/// Builds the prompt an agent actually sees.
///
/// Upstream outputs are appended verbatim; they never go through placeholder
/// substitution.
pub fn effective_prompt(description: &str, upstream: &[&str]) -> String {
    if upstream.is_empty() {
        return description.to_string();
    }
    format!(
        "{}{}{}",
        description,
        CONTEXT_HEADER,
        upstream.join(CONTEXT_DELIMITER)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    ResolvingTemplate,
    Executing,
    Done,
    Failed,
}

impl TaskState {
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, ResolvingTemplate)
                | (ResolvingTemplate, Executing)
                | (ResolvingTemplate, Failed)
                | (Executing, Done)
                | (Executing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }
}
