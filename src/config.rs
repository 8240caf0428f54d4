use anyhow::{Context, Result};
use std::env;

use crate::errors::problem::{ResponseFormat, DEFAULT_NAMESPACE};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub errors: ErrorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorConfig {
    /// Namespace segment of problem `type` URNs (`urn:<ns>:errors:<code>`)
    pub urn_namespace: String,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            urn_namespace: DEFAULT_NAMESPACE.to_string(),
            response_format: ResponseFormat::Problem,
        }
    }
}

impl ErrorConfig {
    /// Lenient variant used by the process-wide dispatcher: invalid values
    /// fall back to defaults instead of failing error handling.
    pub fn from_env() -> Self {
        Self::try_from_env().unwrap_or_default()
    }

    pub fn try_from_env() -> Result<Self> {
        let urn_namespace = env::var("ERROR_URN_NAMESPACE")
            .ok()
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let response_format = env::var("ERROR_RESPONSE_FORMAT")
            .unwrap_or_else(|_| "problem".to_string())
            .parse()
            .context("ERROR_RESPONSE_FORMAT must be 'problem' or 'legacy'")?;

        Ok(Self {
            urn_namespace,
            response_format,
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("API_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .context("API_PORT must be a valid port number")?,
                // Used only for debugging/observability. If unset, fall back to HOSTNAME if
                // present (e.g. Docker/Kubernetes), otherwise "unknown".
                instance_id: env::var("INSTANCE_ID")
                    .or_else(|_| env::var("HOSTNAME"))
                    .unwrap_or_else(|_| "unknown".to_string()),
            },
            errors: ErrorConfig::try_from_env()?,
            logging: LoggingConfig {
                json: env::var("LOG_FORMAT")
                    .map(|f| f.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
