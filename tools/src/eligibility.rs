use async_trait::async_trait;
use crew_core::{Tool, ToolError};

pub const NAME: &str = "eligibility_check";
const DESCRIPTION: &str = "Check eligibility risks and assumptions for a grant. \
                           Input is the grant's description text.";

/// `eligibility_check`: restates the standard eligibility checklist.
///
/// This is not a live lookup. The deadline line is an assumption for the
/// configured year; nothing is verified against the funder.
pub struct EligibilityCheck {
    year: i32,
}

impl EligibilityCheck {
    pub fn new(year: i32) -> Self {
        Self { year }
    }

    pub fn checklist(&self) -> String {
        format!(
            "Eligibility Review:\n\
             - Entity type verified against the applicant category\n\
             - Deadline assumed active for {}\n\
             - Geographic restrictions must be confirmed\n\
             - Matching funds requirement unclear (risk flagged)",
            self.year
        )
    }
}

#[async_trait]
impl Tool for EligibilityCheck {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn call(&self, _grant_info: &str) -> Result<String, ToolError> {
        Ok(self.checklist())
    }
}
