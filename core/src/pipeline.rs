use thiserror::Error;
use tracing::{debug, error, info};

use crate::agent::{AgentRuntime, AgentRuntimeError, Assignment, ResolvedAgent};
use crate::task::{effective_prompt, TaskSpec, TaskState};
use crate::template::{RunVariables, TemplateError};

/// A pipeline that cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("a pipeline needs at least one task")]
    Empty,
    #[error("task name '{0}' is used more than once")]
    DuplicateTask(String),
    #[error("task '{task}' takes context from '{upstream}', which is not an earlier task")]
    UnknownContext { task: String, upstream: String },
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Agent(#[from] AgentRuntimeError),
}

#[derive(Debug, Error)]
#[error("task {task_index} ('{task}') failed: {cause}")]
pub struct PipelineError {
    pub task_index: usize,
    pub task: String,
    #[source]
    pub cause: TaskError,
}

/// An ordered list of tasks executed strictly one after another.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    tasks: Vec<TaskSpec>,
    /// For each task, the positions of its context tasks.
    upstream: Vec<Vec<usize>>,
}

struct Prepared {
    agent: ResolvedAgent,
    description: String,
    expected_output: String,
}

impl PipelineSpec {
    pub fn new(tasks: Vec<TaskSpec>) -> Result<Self, DefinitionError> {
        if tasks.is_empty() {
            return Err(DefinitionError::Empty);
        }

        let mut upstream = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.iter().enumerate() {
            if tasks[..index].iter().any(|t| t.name == task.name) {
                return Err(DefinitionError::DuplicateTask(task.name.clone()));
            }
            let mut positions = Vec::with_capacity(task.context.len());
            for name in &task.context {
                let position = tasks[..index]
                    .iter()
                    .position(|t| &t.name == name)
                    .ok_or_else(|| DefinitionError::UnknownContext {
                        task: task.name.clone(),
                        upstream: name.clone(),
                    })?;
                positions.push(position);
            }
            upstream.push(positions);
        }

        Ok(Self { tasks, upstream })
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// Runs every task in order and returns the last task's output.
    ///
    /// All templates are resolved before the first agent call, so a missing
    /// variable fails the run without touching any provider. The first task
    /// failure aborts the remaining tasks.
    pub async fn run(
        &self,
        vars: &RunVariables,
        runtime: &dyn AgentRuntime,
    ) -> Result<String, PipelineError> {
        let mut progress = Progress::new(&self.tasks);

        let mut prepared = Vec::with_capacity(self.tasks.len());
        for (index, task) in self.tasks.iter().enumerate() {
            progress.advance(index, TaskState::ResolvingTemplate);
            match prepare(task, vars) {
                Ok(p) => prepared.push(p),
                Err(e) => {
                    progress.advance(index, TaskState::Failed);
                    return Err(self.fail(index, e.into()));
                }
            }
        }

        let mut outputs: Vec<String> = Vec::with_capacity(self.tasks.len());
        for (index, (task, p)) in self.tasks.iter().zip(&prepared).enumerate() {
            let context: Vec<&str> = self.upstream[index]
                .iter()
                .map(|&i| outputs[i].as_str())
                .collect();
            let assignment = Assignment {
                task: task.name.clone(),
                prompt: effective_prompt(&p.description, &context),
                expected_output: p.expected_output.clone(),
            };

            progress.advance(index, TaskState::Executing);
            info!(task = %task.name, agent = %p.agent.role, "task started");
            match runtime.execute(&p.agent, &assignment).await {
                Ok(output) => {
                    progress.advance(index, TaskState::Done);
                    info!(task = %task.name, output_len = output.len(), "task finished");
                    outputs.push(output);
                }
                Err(e) => {
                    progress.advance(index, TaskState::Failed);
                    return Err(self.fail(index, e.into()));
                }
            }
        }

        Ok(outputs.pop().unwrap_or_default())
    }

    fn fail(&self, index: usize, cause: TaskError) -> PipelineError {
        let task = self.tasks[index].name.clone();
        error!(task = %task, task_index = index, error = %cause, "task failed, aborting pipeline");
        PipelineError {
            task_index: index,
            task,
            cause,
        }
    }
}

fn prepare(task: &TaskSpec, vars: &RunVariables) -> Result<Prepared, TemplateError> {
    let (description, expected_output) = task.resolve_texts(vars)?;
    let agent = task.agent.resolve(vars)?;
    Ok(Prepared {
        agent,
        description,
        expected_output,
    })
}

struct Progress<'a> {
    tasks: &'a [TaskSpec],
    states: Vec<TaskState>,
}

impl<'a> Progress<'a> {
    fn new(tasks: &'a [TaskSpec]) -> Self {
        Self {
            tasks,
            states: vec![TaskState::Pending; tasks.len()],
        }
    }

    fn advance(&mut self, index: usize, next: TaskState) {
        let current = self.states[index];
        debug_assert!(
            current.can_transition_to(next),
            "illegal task transition {:?} -> {:?}",
            current,
            next
        );
        debug!(task = %self.tasks[index].name, from = ?current, to = ?next, "task state");
        self.states[index] = next;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::agent::AgentSpec;
    use crate::llm::{LlmConfig, Provider};
    use crate::task::{CONTEXT_DELIMITER, CONTEXT_HEADER};

    /// Records every assignment and answers from a script.
    struct ScriptedRuntime {
        seen: Mutex<Vec<Assignment>>,
        answers: Vec<Result<String, String>>,
    }

    impl ScriptedRuntime {
        fn new(answers: Vec<Result<&str, &str>>) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                answers: answers
                    .into_iter()
                    .map(|a| a.map(str::to_string).map_err(str::to_string))
                    .collect(),
            }
        }

        fn seen(&self) -> Vec<Assignment> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AgentRuntime for ScriptedRuntime {
        async fn execute(
            &self,
            _agent: &ResolvedAgent,
            assignment: &Assignment,
        ) -> Result<String, AgentRuntimeError> {
            let mut seen = self.seen.lock().unwrap();
            let answer = self.answers[seen.len()].clone();
            seen.push(assignment.clone());
            answer.map_err(AgentRuntimeError::Provider)
        }
    }

    fn agent(goal: &str) -> Arc<AgentSpec> {
        Arc::new(AgentSpec::new(
            "Analyst",
            goal,
            "Careful.",
            LlmConfig::new(Provider::Groq, "llama-3.3-70b-versatile", 0.2).unwrap(),
        ))
    }

    fn vars() -> RunVariables {
        RunVariables::new()
            .with("org_type", "NGO")
            .with("mission", "clean water access")
    }

    fn three_tasks() -> PipelineSpec {
        let a = agent("Help a {org_type}.");
        PipelineSpec::new(vec![
            TaskSpec::new("research", "Research {mission}.", "Three grants.", a.clone()),
            TaskSpec::new("validate", "Validate for {org_type}.", "Ranking.", a.clone())
                .with_context(["research"]),
            TaskSpec::new("write", "Write the report.", "Markdown.", a).with_context(["validate"]),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_runs_in_order_and_returns_last_output() {
        let runtime = ScriptedRuntime::new(vec![Ok("R"), Ok("V"), Ok("REPORT")]);
        let out = three_tasks().run(&vars(), &runtime).await.unwrap();
        assert_eq!(out, "REPORT");

        let seen = runtime.seen();
        let names: Vec<&str> = seen.iter().map(|a| a.task.as_str()).collect();
        assert_eq!(names, vec!["research", "validate", "write"]);
        assert_eq!(seen[0].prompt, "Research clean water access.");
        assert_eq!(seen[1].prompt, "Validate for NGO.\n\nContext:\nR");
        assert_eq!(seen[2].prompt, "Write the report.\n\nContext:\nV");
    }

    #[tokio::test]
    async fn test_upstream_output_lands_after_context_header() {
        let a = agent("Goal.");
        let pipeline = PipelineSpec::new(vec![
            TaskSpec::new("first", "One.", "Anything.", a.clone()),
            TaskSpec::new("second", "Two.", "Anything.", a).with_context(["first"]),
        ])
        .unwrap();
        let runtime = ScriptedRuntime::new(vec![Ok("X"), Ok("done")]);
        pipeline.run(&vars(), &runtime).await.unwrap();

        let prompt = &runtime.seen()[1].prompt;
        let (_, context) = prompt.split_once(CONTEXT_HEADER).unwrap();
        assert!(context.contains("X"));
    }

    #[tokio::test]
    async fn test_task_sees_only_declared_upstreams() {
        let a = agent("Goal.");
        let pipeline = PipelineSpec::new(vec![
            TaskSpec::new("a", "A.", "-", a.clone()),
            TaskSpec::new("b", "B.", "-", a.clone()),
            TaskSpec::new("c", "C.", "-", a).with_context(["b", "a"]),
        ])
        .unwrap();
        let runtime = ScriptedRuntime::new(vec![Ok("out-a"), Ok("out-b"), Ok("out-c")]);
        pipeline.run(&vars(), &runtime).await.unwrap();

        let seen = runtime.seen();
        assert_eq!(seen[1].prompt, "B.");
        assert_eq!(
            seen[2].prompt,
            format!("C.{}out-b{}out-a", CONTEXT_HEADER, CONTEXT_DELIMITER)
        );
    }

    #[tokio::test]
    async fn test_template_error_fails_before_any_agent_call() {
        let a = agent("Goal.");
        let pipeline = PipelineSpec::new(vec![
            TaskSpec::new("research", "Research {mission}.", "-", a.clone()),
            TaskSpec::new("write", "Write for {region}.", "-", a).with_context(["research"]),
        ])
        .unwrap();
        let runtime = ScriptedRuntime::new(vec![Ok("never")]);
        let err = pipeline.run(&vars(), &runtime).await.unwrap_err();

        assert_eq!(err.task_index, 1);
        assert_eq!(err.task, "write");
        assert!(matches!(
            err.cause,
            TaskError::Template(TemplateError::MissingVariable { ref name }) if name == "region"
        ));
        assert!(runtime.seen().is_empty());
    }

    #[tokio::test]
    async fn test_agent_goal_placeholder_is_checked_up_front() {
        let pipeline = PipelineSpec::new(vec![
            TaskSpec::new("only", "Plain.", "-", agent("Serve {audience}.")),
        ])
        .unwrap();
        let runtime = ScriptedRuntime::new(vec![]);
        let err = pipeline.run(&vars(), &runtime).await.unwrap_err();
        assert_eq!(err.task_index, 0);
        assert!(runtime.seen().is_empty());
    }

    #[tokio::test]
    async fn test_agent_failure_aborts_remaining_tasks() {
        let runtime = ScriptedRuntime::new(vec![Ok("R"), Err("ProviderAuthError")]);
        let err = three_tasks().run(&vars(), &runtime).await.unwrap_err();

        assert_eq!(err.task_index, 1);
        assert!(matches!(err.cause, TaskError::Agent(_)));
        assert!(err.to_string().contains("ProviderAuthError"));
        assert_eq!(runtime.seen().len(), 2);
    }

    #[test]
    fn test_empty_pipeline_is_rejected() {
        assert_eq!(PipelineSpec::new(vec![]).unwrap_err(), DefinitionError::Empty);
    }

    #[test]
    fn test_duplicate_task_names_are_rejected() {
        let a = agent("Goal.");
        let err = PipelineSpec::new(vec![
            TaskSpec::new("same", "1", "-", a.clone()),
            TaskSpec::new("same", "2", "-", a),
        ])
        .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateTask("same".to_string()));
    }

    #[test]
    fn test_context_must_name_an_earlier_task() {
        let a = agent("Goal.");
        let err = PipelineSpec::new(vec![
            TaskSpec::new("first", "1", "-", a.clone()).with_context(["second"]),
            TaskSpec::new("second", "2", "-", a),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::UnknownContext {
                task: "first".to_string(),
                upstream: "second".to_string()
            }
        );
    }
}
