use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::rbac::EnforcerConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    pub enforcer: EnforcerConfig,
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Outside development the policy file is re-read before every role
/// request, so several instances sharing one file stay current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)
            .into_diagnostic()?
            .set_default("server.port", Server::default().port)
            .into_diagnostic()?
            .set_default(
                "enforcer.model_path",
                EnforcerConfig::default()
                    .model_path
                    .to_string_lossy()
                    .to_string(),
            )
            .into_diagnostic()?
            .set_default(
                "enforcer.policy_path",
                EnforcerConfig::default()
                    .policy_path
                    .to_string_lossy()
                    .to_string(),
            )
            .into_diagnostic()?
            .set_default("enforcer.reload", "merge")
            .into_diagnostic()?
            .set_default("environment", "production")
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: WARDEN__SERVER__PORT=9090, WARDEN__ENVIRONMENT=development, etc.
        builder = builder.add_source(config::Environment::with_prefix("WARDEN").separator("__"));

        let cfg = builder.build().into_diagnostic()?;
        let mut s: Settings = cfg.try_deserialize().into_diagnostic()?;

        s.enforcer.model_path = absolute(&s.enforcer.model_path)?;
        s.enforcer.policy_path = absolute(&s.enforcer.policy_path)?;

        Ok(s)
    }

    pub fn refresh_per_request(&self) -> bool {
        self.environment != Environment::Development
    }
}

/// Relative paths are taken from the current directory.
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_relative() {
        Ok(std::env::current_dir().into_diagnostic()?.join(path))
    } else {
        Ok(path.to_path_buf())
    }
}
