//! Building blocks for running a crew of LLM agents as a strictly sequential
//! pipeline.
//!
//! - [`template`]: run variables and `{placeholder}` prompt templates.
//! - [`registry`]: tools agents can call, and the bound subsets they get.
//! - [`agent`] / [`task`] / [`pipeline`]: static definitions and the runner.
//! - [`llm`]: the [`llm::Brain`] agent runtime over OpenAI-compatible APIs.
//! - [`runtime`]: launching one isolated pipeline process per run.
//! - [`config`]: provider credentials and endpoints.

pub mod agent;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod registry;
pub mod runtime;
pub mod task;
pub mod template;

pub use agent::{AgentRuntime, AgentRuntimeError, AgentSpec, Assignment, ResolvedAgent};
pub use config::{ConfigError, Settings};
pub use llm::{Brain, ChatModel, LlmConfig, OpenAiCompatible, Provider};
pub use pipeline::{DefinitionError, PipelineError, PipelineSpec, TaskError};
pub use registry::{Registry, RegistryError, Tool, ToolError, ToolRecord};
pub use runtime::{ChildProcessLauncher, LaunchError, Launcher, ProcessOutcome};
pub use task::{TaskSpec, TaskState, CONTEXT_DELIMITER, CONTEXT_HEADER};
pub use template::{PromptTemplate, RunVariables, TemplateError};
