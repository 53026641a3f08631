//! `grant-crew`: one grant-strategy run per process.
//!
//! Reads the organization type and the mission (one line each, in that order)
//! from stdin, runs the crew, prints the final report to stdout and saves it
//! to `--output-dir` (the working directory by default). Logs and errors go to
//! stderr.

mod definitions;
mod report;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Datelike;
use clap::Parser;
use crew_core::{Brain, Settings};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "grant-crew", about = "Generate a grant strategy report")]
struct Args {
    /// Organization type; read from stdin when omitted.
    #[arg(long)]
    org_type: Option<String>,

    /// Project mission; read from stdin when omitted.
    #[arg(long)]
    mission: Option<String>,

    /// Where the report file is written.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries only the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    // Credentials are checked before any input is read.
    let settings = Settings::from_env().context("provider configuration")?;
    let tools = grant_tools::default_registry().context("tool registry")?;
    let pipeline = definitions::grant_pipeline(&tools)?;
    let brain = Brain::new(&settings);
    info!(tools = tools.len(), tasks = pipeline.tasks().len(), "AI Grant Writer Assistant ready");

    let stdin = BufReader::new(tokio::io::stdin());
    let (org_type, mission) = read_inputs(stdin, args.org_type, args.mission).await?;

    info!(org_type = %org_type, "agents are working");
    let vars = definitions::run_variables(&org_type, &mission, chrono::Local::now().year());
    let report = pipeline.run(&vars, &brain).await?;

    for deviation in report::outline_deviations(&report) {
        warn!(%deviation, "report does not follow the required outline");
    }

    println!("{report}");

    report::persist(&args.output_dir, &org_type, &report);
    Ok(())
}

/// Fills in whichever of the two inputs was not given as a flag, reading
/// organization type first, then mission.
async fn read_inputs<R>(
    reader: R,
    org_type: Option<String>,
    mission: Option<String>,
) -> Result<(String, String)>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let org_type = match org_type {
        Some(v) => v,
        None => next_field(&mut lines, definitions::ORG_TYPE).await?,
    };
    let mission = match mission {
        Some(v) => v,
        None => next_field(&mut lines, definitions::MISSION).await?,
    };

    let org_type = org_type.trim().to_string();
    let mission = mission.trim().to_string();
    if org_type.is_empty() {
        bail!("organization type must not be empty");
    }
    if mission.is_empty() {
        bail!("mission must not be empty");
    }
    Ok((org_type, mission))
}

async fn next_field<R>(lines: &mut Lines<R>, field: &str) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    match lines
        .next_line()
        .await
        .with_context(|| format!("reading {field} from stdin"))?
    {
        Some(value) => Ok(value),
        None => bail!("stdin closed before {field} was provided"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_two_lines_in_order() {
        let input: &[u8] = b"NGO\nclean water access\n";
        let (org_type, mission) = read_inputs(input, None, None).await.unwrap();
        assert_eq!(org_type, "NGO");
        assert_eq!(mission, "clean water access");
    }

    #[tokio::test]
    async fn test_crlf_and_padding_are_trimmed() {
        let input: &[u8] = b"  social startup \r\nAI tutoring\r\n";
        let (org_type, mission) = read_inputs(input, None, None).await.unwrap();
        assert_eq!(org_type, "social startup");
        assert_eq!(mission, "AI tutoring");
    }

    #[tokio::test]
    async fn test_flag_skips_its_stdin_line() {
        let input: &[u8] = b"clean water access\n";
        let (org_type, mission) = read_inputs(input, Some("NGO".into()), None)
            .await
            .unwrap();
        assert_eq!(org_type, "NGO");
        assert_eq!(mission, "clean water access");
    }

    #[tokio::test]
    async fn test_truncated_stdin_fails() {
        let input: &[u8] = b"NGO\n";
        let err = read_inputs(input, None, None).await.unwrap_err();
        assert!(err.to_string().contains("mission"));
    }

    #[tokio::test]
    async fn test_blank_input_fails() {
        let input: &[u8] = b"   \nclean water\n";
        let err = read_inputs(input, None, None).await.unwrap_err();
        assert!(err.to_string().contains("organization type"));
    }
}
