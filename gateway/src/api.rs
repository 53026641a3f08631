use serde::{Deserialize, Serialize};
use thiserror::Error;

// Input: what the form sends us. Missing fields read as empty.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub org_type: String,
    #[serde(default)]
    pub mission: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Please fill in all fields ('{field}' is empty).")]
pub struct ValidationError {
    pub field: &'static str,
}

/// The two values exactly as they will be written to the child's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInputs {
    pub org_type: String,
    pub mission: String,
}

impl RunRequest {
    /// Trims both fields and rejects empty ones.
    ///
    /// Line breaks inside a value become spaces: the child reads exactly one
    /// line per field.
    pub fn validate(&self) -> Result<RunInputs, ValidationError> {
        let org_type = single_line(&self.org_type);
        if org_type.is_empty() {
            return Err(ValidationError { field: "org_type" });
        }
        let mission = single_line(&self.mission);
        if mission.is_empty() {
            return Err(ValidationError { field: "mission" });
        }
        Ok(RunInputs { org_type, mission })
    }
}

fn single_line(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| if matches!(c, '\n' | '\r') { ' ' } else { c })
        .collect()
}

// Output: the report on success
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub report_markdown: String,
}

// Output: any failure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
