use async_trait::async_trait;
use thiserror::Error;

use crate::llm::LlmConfig;
use crate::registry::Registry;
use crate::template::{PromptTemplate, RunVariables, TemplateError};

/// Failure reported by whatever actually runs an agent's reasoning step.
#[derive(Debug, Error)]
pub enum AgentRuntimeError {
    #[error("LLM provider error: {0}")]
    Provider(String),
    #[error("model returned an empty answer")]
    EmptyResponse,
    #[error("agent did not produce a final answer within {limit} steps")]
    IterationLimit { limit: usize },
}

impl From<async_openai::error::OpenAIError> for AgentRuntimeError {
    fn from(e: async_openai::error::OpenAIError) -> Self {
        AgentRuntimeError::Provider(e.to_string())
    }
}

/// Static definition of an agent. Building one performs no I/O.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub role: String,
    pub goal: PromptTemplate,
    pub backstory: PromptTemplate,
    pub tools: Registry,
    pub llm: LlmConfig,
}

impl AgentSpec {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<PromptTemplate>,
        backstory: impl Into<PromptTemplate>,
        llm: LlmConfig,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            tools: Registry::new(),
            llm,
        }
    }

    pub fn with_tools(mut self, tools: Registry) -> Self {
        self.tools = tools;
        self
    }

    pub fn resolve(&self, vars: &RunVariables) -> Result<ResolvedAgent, TemplateError> {
        Ok(ResolvedAgent {
            role: self.role.clone(),
            goal: self.goal.resolve(vars)?,
            backstory: self.backstory.resolve(vars)?,
            tools: self.tools.clone(),
            llm: self.llm.clone(),
        })
    }
}

/// An agent with every template filled in for one run.
#[derive(Debug, Clone)]
pub struct ResolvedAgent {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: Registry,
    pub llm: LlmConfig,
}

/// One unit of work handed to an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub task: String,
    /// Resolved description plus any upstream context.
    pub prompt: String,
    pub expected_output: String,
}

/// The agent reasoning loop: prompt and tools in, final text out.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn execute(
        &self,
        agent: &ResolvedAgent,
        assignment: &Assignment,
    ) -> Result<String, AgentRuntimeError>;
}
