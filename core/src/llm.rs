use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::agent::{AgentRuntime, AgentRuntimeError, Assignment, ResolvedAgent};
use crate::config::Settings;
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Groq,
    Gemini,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Groq => f.write_str("groq"),
            Provider::Gemini => f.write_str("gemini"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("temperature must be within 0.0..=1.0, got {0}")]
pub struct InvalidTemperature(pub f32);

/// Which model an agent talks to, and how deterministic it should be.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    temperature: f32,
}

impl LlmConfig {
    pub fn new(
        provider: Provider,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, InvalidTemperature> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(InvalidTemperature(temperature));
        }
        Ok(Self {
            provider,
            model: model.into(),
            temperature,
        })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

/// One chat-completion round trip against a provider.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        provider: Provider,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, OpenAIError>;
}

/// Groq and Gemini both expose an OpenAI-compatible endpoint, so one client
/// type serves both.
pub struct OpenAiCompatible {
    groq: Client<OpenAIConfig>,
    gemini: Client<OpenAIConfig>,
}

impl OpenAiCompatible {
    pub fn new(settings: &Settings) -> Self {
        let groq = OpenAIConfig::new()
            .with_api_base(&settings.groq_api_base)
            .with_api_key(settings.groq_api_key.expose_secret());
        let gemini = OpenAIConfig::new()
            .with_api_base(&settings.gemini_api_base)
            .with_api_key(settings.gemini_api_key.expose_secret());

        info!(
            groq = %settings.groq_api_base,
            gemini = %settings.gemini_api_base,
            "Brain connected"
        );
        Self {
            groq: Client::with_config(groq),
            gemini: Client::with_config(gemini),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatible {
    async fn complete(
        &self,
        provider: Provider,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, OpenAIError> {
        let client = match provider {
            Provider::Groq => &self.groq,
            Provider::Gemini => &self.gemini,
        };
        client.chat().create(request).await
    }
}

/// Agent runtime that loops over chat completions, running the tools the
/// model asks for, until the model answers in plain text. The agent's
/// [`LlmConfig`] picks provider and model.
pub struct Brain {
    model: Box<dyn ChatModel>,
    max_iterations: usize,
}

impl Brain {
    pub fn new(settings: &Settings) -> Self {
        Self::with_model(OpenAiCompatible::new(settings), settings.max_iterations)
    }

    pub fn with_model(model: impl ChatModel + 'static, max_iterations: usize) -> Self {
        Self {
            model: Box::new(model),
            max_iterations,
        }
    }
}

#[async_trait]
impl AgentRuntime for Brain {
    async fn execute(
        &self,
        agent: &ResolvedAgent,
        assignment: &Assignment,
    ) -> Result<String, AgentRuntimeError> {
        let tools = function_tools(&agent.tools)?;
        let mut messages = opening_messages(agent, assignment)?;

        for step in 0..self.max_iterations {
            let mut args = CreateChatCompletionRequestArgs::default();
            args.model(&agent.llm.model)
                .temperature(agent.llm.temperature())
                .messages(messages.clone());
            if !tools.is_empty() {
                args.tools(tools.clone());
            }
            let request = args.build()?;

            debug!(task = %assignment.task, step, provider = %agent.llm.provider, "asking model");
            let response = self.model.complete(agent.llm.provider, request).await?;
            let Some(choice) = response.choices.into_iter().next() else {
                return Err(AgentRuntimeError::Provider(
                    "response contained no choices".to_string(),
                ));
            };

            let calls = choice.message.tool_calls.unwrap_or_default();
            if calls.is_empty() {
                return match choice.message.content {
                    Some(text) if !text.trim().is_empty() => Ok(text),
                    _ => Err(AgentRuntimeError::EmptyResponse),
                };
            }

            messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(calls.clone())
                    .build()?
                    .into(),
            );
            for call in &calls {
                let input = tool_input(&call.function.arguments);
                info!(task = %assignment.task, tool = %call.function.name, "agent called tool");
                let output = agent.tools.invoke(&call.function.name, &input).await;
                messages.push(tool_reply(call, output)?);
            }
        }

        warn!(task = %assignment.task, limit = self.max_iterations, "agent hit the step limit");
        Err(AgentRuntimeError::IterationLimit {
            limit: self.max_iterations,
        })
    }
}

/// Role, goal and backstory become the system message; the task becomes the
/// user message.
pub fn system_prompt(agent: &ResolvedAgent) -> String {
    format!(
        "You are {}. {}\n\nYour personal goal is: {}",
        agent.role, agent.backstory, agent.goal
    )
}

pub fn user_prompt(assignment: &Assignment) -> String {
    format!(
        "Current Task: {}\n\nThis is the expected criteria for your final answer: {}\n\n\
         You MUST return the actual complete content as the final answer, not a summary.",
        assignment.prompt, assignment.expected_output
    )
}

fn opening_messages(
    agent: &ResolvedAgent,
    assignment: &Assignment,
) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    Ok(vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt(agent))
            .build()?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(user_prompt(assignment))
            .build()?
            .into(),
    ])
}

fn function_tools(tools: &Registry) -> Result<Vec<ChatCompletionTool>, OpenAIError> {
    tools
        .records()
        .into_iter()
        .map(|t| {
            ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(
                    FunctionObjectArgs::default()
                        .name(t.name)
                        .description(t.description)
                        .parameters(t.parameters)
                        .build()?,
                )
                .build()
        })
        .collect()
}

fn tool_reply(
    call: &ChatCompletionMessageToolCall,
    output: String,
) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    Ok(ChatCompletionRequestToolMessageArgs::default()
        .tool_call_id(call.id.clone())
        .content(output)
        .build()?
        .into())
}

/// Pulls the `input` string out of a tool call's JSON arguments.
///
/// Models do not always respect the schema, so a bare string, some other
/// single string field, or non-JSON text are accepted too.
pub fn tool_input(arguments: &str) -> String {
    match serde_json::from_str::<Value>(arguments) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => {
            if let Some(Value::String(s)) = map.get("input") {
                return s.clone();
            }
            let mut strings = map.values().filter_map(Value::as_str);
            match (strings.next(), strings.next()) {
                (Some(only), None) => only.to_string(),
                _ => arguments.to_string(),
            }
        }
        _ => arguments.to_string(),
    }
}
