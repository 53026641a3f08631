use secrecy::SecretString;
use thiserror::Error;

pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set (in the environment or .env)")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Provider credentials and endpoints shared by every binary.
#[derive(Debug, Clone)]
pub struct Settings {
    pub groq_api_key: SecretString,
    pub gemini_api_key: SecretString,
    pub groq_api_base: String,
    pub gemini_api_base: String,
    pub max_iterations: usize,
}

impl Settings {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<SecretString, ConfigError> {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
                .ok_or(ConfigError::Missing(name))
        };

        let groq_api_key = required("GROQ_API_KEY")?;
        let gemini_api_key = required("GEMINI_API_KEY")?;

        let max_iterations = match lookup("GRANT_MAX_ITERATIONS") {
            None => DEFAULT_MAX_ITERATIONS,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "GRANT_MAX_ITERATIONS",
                        reason: format!("expected a positive integer, got '{}'", raw),
                    })
                }
            },
        };

        Ok(Self {
            groq_api_key,
            gemini_api_key,
            groq_api_base: lookup("GROQ_API_BASE").unwrap_or_else(|| GROQ_API_BASE.to_string()),
            gemini_api_base: lookup("GEMINI_API_BASE")
                .unwrap_or_else(|| GEMINI_API_BASE.to_string()),
            max_iterations,
        })
    }
}
