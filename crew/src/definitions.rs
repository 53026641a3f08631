//! The grant crew: three agents, three tasks, one sequential pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use crew_core::{AgentSpec, LlmConfig, PipelineSpec, Provider, Registry, RunVariables, TaskSpec};
use grant_tools::{eligibility, search, structuring};

use crate::report::REPORT_SECTIONS;

pub const ORG_TYPE: &str = "org_type";
pub const MISSION: &str = "mission";
pub const YEAR: &str = "year";

const GROQ_MODEL: &str = "llama-3.3-70b-versatile";
const GEMINI_MODEL: &str = "gemini-2.5-flash";

pub fn run_variables(org_type: &str, mission: &str, year: i32) -> RunVariables {
    RunVariables::new()
        .with(ORG_TYPE, org_type)
        .with(MISSION, mission)
        .with(YEAR, year.to_string())
}

/// Factual retrieval; low temperature.
pub fn research_llm() -> Result<LlmConfig> {
    Ok(LlmConfig::new(Provider::Groq, GROQ_MODEL, 0.2)?)
}

/// Strict gatekeeping; the lowest temperature of the three.
pub fn validation_llm() -> Result<LlmConfig> {
    Ok(LlmConfig::new(Provider::Gemini, GEMINI_MODEL, 0.1)?)
}

pub fn writing_llm() -> Result<LlmConfig> {
    Ok(LlmConfig::new(Provider::Groq, GROQ_MODEL, 0.2)?)
}

pub fn researcher(tools: &Registry) -> Result<AgentSpec> {
    Ok(AgentSpec::new(
        "Startup & NGO Funding Intelligence Lead",
        "Locate 3 high-probability, active {year} grant opportunities specifically for \
         a {org_type} working on {mission}.",
        "You specialize in the global funding landscape. For startups, you identify \
         equity-free innovation grants, government programs, and accelerators. \
         For NGOs, you prioritize philanthropic foundations, capacity-building grants, \
         and government social-impact funding. You focus strictly on {year} deadlines.",
        research_llm()?,
    )
    .with_tools(tools.select(&[search::NAME])?))
}

pub fn validator(tools: &Registry) -> Result<AgentSpec> {
    Ok(AgentSpec::new(
        "Grant Eligibility Validator",
        "Verify that the {org_type} meets all stated {year} eligibility requirements \
         for each proposed grant, and eliminate unsuitable opportunities.",
        "You act as a strict gatekeeper. You scrutinize eligibility clauses such as \
         entity type, geography, funding stage, indirect cost rules, and matching fund \
         requirements. If critical information is missing, you explicitly state \
         assumptions and flag risks. Grants with high uncertainty must be downgraded \
         or rejected. You never invent facts that are not in the material you were given.",
        validation_llm()?,
    )
    .with_tools(tools.select(&[eligibility::NAME])?))
}

pub fn writer(tools: &Registry) -> Result<AgentSpec> {
    Ok(AgentSpec::new(
        "Lead Proposal Architect",
        "Produce a funder-ready Grant Strategy Report based strictly on validated inputs.",
        "You write with a grant reviewer mindset. Every claim must connect to \
         measurable impact, feasibility, sustainability, and alignment with funder priorities. \
         You avoid marketing language and focus on clarity, outcomes, and credibility. \
         Your output is suitable for direct submission or minimal editing.",
        writing_llm()?,
    )
    .with_tools(tools.select(&[structuring::NAME])?))
}

fn write_description() -> String {
    let outline: Vec<String> = REPORT_SECTIONS.iter().map(|s| format!("## {s}")).collect();
    format!(
        "Generate a professional Grant Strategy Report for the {{mission}} project.\n\
         Use STRICT Markdown format with ONLY the following sections:\n\n\
         {}\n\n\
         Do NOT add extra sections. Use concise, reviewer-friendly language.",
        outline.join("\n")
    )
}

/// research -> validate -> write, each fed by the one before.
pub fn grant_pipeline(tools: &Registry) -> Result<PipelineSpec> {
    let researcher = Arc::new(researcher(tools)?);
    let validator = Arc::new(validator(tools)?);
    let writer = Arc::new(writer(tools)?);

    let research = TaskSpec::new(
        "research",
        "1. Identify the core funding needs of a {org_type} working on {mission}.\n\
         2. Find exactly 3 active {year} grant opportunities with official links.\n\
         3. Prioritize equity-free funding for startups or capacity-building grants for NGOs.",
        "A structured list of exactly 3 grants including:\n\
         - Funder Name\n\
         - Grant Program Name\n\
         - Award Amount Range\n\
         - Application Deadline ({year})\n\
         - Official Link\n\
         - Short explanation of why the grant fits the {org_type}",
        researcher,
    );

    let validate = TaskSpec::new(
        "validate",
        "Perform a strict eligibility and risk audit on the 3 identified grants:\n\
         - Confirm the {org_type} is an eligible entity type.\n\
         - Verify the {year} deadline is still active.\n\
         - Check geographic, financial, and legal constraints.\n\
         - Identify indirect cost rules or matching fund requirements.\n\
         - Explicitly state assumptions if data is missing; do not invent data.\n\
         - Reject or downgrade grants with high uncertainty.",
        "A Validation Summary ranking grants as:\n\
         - Highest Match\n\
         - Medium Match\n\
         - Rejected\n\n\
         Each entry must include eligibility status, key risks, and assumptions.",
        validator,
    )
    .with_context([research.name.clone()]);

    let write = TaskSpec::new(
        "write",
        write_description(),
        "A strictly structured, funder-ready Markdown Grant Strategy Report \
         based only on validated grant opportunities.",
        writer,
    )
    .with_context([validate.name.clone()]);

    PipelineSpec::new(vec![research, validate, write]).context("invalid grant pipeline")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use crew_core::{AgentRuntime, AgentRuntimeError, Assignment, ResolvedAgent, CONTEXT_HEADER};

    use super::*;
    use crate::report::outline_deviations;

    fn pipeline() -> PipelineSpec {
        grant_pipeline(&grant_tools::default_registry().unwrap()).unwrap()
    }

    fn sample_report() -> String {
        REPORT_SECTIONS
            .iter()
            .map(|s| format!("## {s}\n\nBody.\n"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plays each agent: echoes a marker per task and records what it saw.
    struct PlayActing {
        seen: Mutex<Vec<(String, Assignment)>>,
    }

    #[async_trait]
    impl AgentRuntime for PlayActing {
        async fn execute(
            &self,
            agent: &ResolvedAgent,
            assignment: &Assignment,
        ) -> Result<String, AgentRuntimeError> {
            self.seen
                .lock()
                .unwrap()
                .push((agent.goal.clone(), assignment.clone()));
            Ok(match assignment.task.as_str() {
                "research" => "GRANTS: A, B, C".to_string(),
                "validate" => "Highest Match: A; Medium Match: B; Rejected: C".to_string(),
                _ => sample_report(),
            })
        }
    }

    #[test]
    fn test_task_order_and_context() {
        let pipeline = pipeline();
        let names: Vec<&str> = pipeline.tasks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["research", "validate", "write"]);
        assert!(pipeline.tasks()[0].context.is_empty());
        assert_eq!(pipeline.tasks()[1].context, vec!["research"]);
        assert_eq!(pipeline.tasks()[2].context, vec!["validate"]);
    }

    #[test]
    fn test_agents_bind_their_own_tool_and_model() {
        let tasks = pipeline();
        let tasks = tasks.tasks();
        assert_eq!(tasks[0].agent.tools.names(), vec![search::NAME]);
        assert_eq!(tasks[1].agent.tools.names(), vec![eligibility::NAME]);
        assert_eq!(tasks[2].agent.tools.names(), vec![structuring::NAME]);

        assert_eq!(tasks[1].agent.llm.provider, Provider::Gemini);
        assert!(tasks[1].agent.llm.temperature() < tasks[0].agent.llm.temperature());
        assert_eq!(tasks[0].agent.llm, tasks[2].agent.llm);
    }

    #[test]
    fn test_writer_goal_needs_no_variables() {
        let tools = grant_tools::default_registry().unwrap();
        assert!(writer(&tools).unwrap().goal.placeholders().is_empty());
        assert_eq!(
            researcher(&tools).unwrap().goal.placeholders(),
            vec!["year", "org_type", "mission"]
        );
    }

    #[test]
    fn test_write_description_lists_every_section_in_order() {
        let description = write_description();
        let mut cursor = 0;
        for section in REPORT_SECTIONS {
            let heading = format!("## {section}");
            let at = description[cursor..].find(&heading).unwrap();
            cursor += at + heading.len();
        }
        assert_eq!(
            crew_core::PromptTemplate::new(description).placeholders(),
            vec!["mission"]
        );
    }

    #[tokio::test]
    async fn test_full_run_threads_outputs() {
        let runtime = PlayActing {
            seen: Mutex::new(Vec::new()),
        };
        let report = pipeline()
            .run(&run_variables("NGO", "clean water access", 2026), &runtime)
            .await
            .unwrap();

        assert!(outline_deviations(&report).is_empty());

        let seen = runtime.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].0.contains("a NGO working on clean water access"));
        assert!(seen[0].1.prompt.contains("Find exactly 3 active 2026 grant opportunities"));
        let (_, context) = seen[1].1.prompt.split_once(CONTEXT_HEADER).unwrap();
        assert_eq!(context, "GRANTS: A, B, C");
        assert!(seen[2]
            .1
            .prompt
            .ends_with("Highest Match: A; Medium Match: B; Rejected: C"));
        assert!(seen[2].1.prompt.contains("for the clean water access project"));
    }
}
