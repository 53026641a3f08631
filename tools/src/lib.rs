//! The three tools the grant crew's agents can call.

pub mod eligibility;
pub mod search;
pub mod structuring;

use chrono::Datelike;
use crew_core::{Registry, RegistryError};

pub use eligibility::EligibilityCheck;
pub use search::{DuckDuckGo, GrantSearch, SearchEngine};
pub use structuring::{ReportStructuring, REPORT_SECTIONS};

/// Registry holding every grant tool, using live web search.
pub fn default_registry() -> Result<Registry, RegistryError> {
    let year = chrono::Local::now().year();
    let mut registry = Registry::new();
    registry.register(GrantSearch::new(DuckDuckGo::new(), year))?;
    registry.register(EligibilityCheck::new(year))?;
    registry.register(ReportStructuring)?;
    Ok(registry)
}
