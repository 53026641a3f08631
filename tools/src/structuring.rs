use async_trait::async_trait;
use crew_core::{Tool, ToolError};

pub const NAME: &str = "report_structuring";
const DESCRIPTION: &str = "Ensure a drafted report has a professional, funder-ready structure. \
                           Input is the drafted content.";

pub const ACKNOWLEDGEMENT: &str =
    "Content refined for clarity, compliance, and reviewer expectations.\n\
     Language simplified, outcomes emphasized, risks addressed.";

/// The Grant Strategy Report outline, in order.
pub const REPORT_SECTIONS: [&str; 10] = [
    "1. Executive Summary",
    "2. Organizational Overview",
    "3. Problem Statement",
    "4. Proposed Solution & Innovation",
    "5. Funder Value Proposition",
    "6. 1-Page Proposal Skeleton (Headings + Bullet Points)",
    "7. Budget Logic Overview (Structure only, no numbers)",
    "8. Impact Metrics & KPIs",
    "9. Risk & Mitigation",
    "10. 5-Step Submission Roadmap",
];

/// `report_structuring`: acknowledges a structure review. Does not rewrite.
pub struct ReportStructuring;

#[async_trait]
impl Tool for ReportStructuring {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn call(&self, _content: &str) -> Result<String, ToolError> {
        Ok(ACKNOWLEDGEMENT.to_string())
    }
}
