use std::net::SocketAddr;
use std::path::PathBuf;

use crew_core::ConfigError;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const CREW_BINARY: &str = "grant-crew";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    /// The pipeline executable launched once per request.
    pub crew_bin: PathBuf,
    /// Working directory of each run; reports are saved here.
    pub workdir: PathBuf,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(PathBuf::from))
            .unwrap_or_default();
        let default_crew_bin =
            exe_dir.join(format!("{}{}", CREW_BINARY, std::env::consts::EXE_SUFFIX));
        let default_workdir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(
            |name| std::env::var(name).ok(),
            default_crew_bin,
            default_workdir,
        )
    }

    pub fn from_lookup<F>(
        lookup: F,
        default_crew_bin: PathBuf,
        default_workdir: PathBuf,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup("GRANT_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr.parse().map_err(|e| ConfigError::Invalid {
            name: "GRANT_BIND_ADDR",
            reason: format!("'{}': {}", raw_addr, e),
        })?;

        Ok(Self {
            bind_addr,
            crew_bin: lookup("GRANT_CREW_BIN")
                .map(PathBuf::from)
                .unwrap_or(default_crew_bin),
            workdir: lookup("GRANT_WORKDIR")
                .map(PathBuf::from)
                .unwrap_or(default_workdir),
        })
    }
}
