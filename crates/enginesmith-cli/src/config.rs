//! CLI configuration via environment variables

use std::env;

/// CLI switches read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Print command results as JSON by default (ENGINESMITH_JSON=1)
    pub default_json: bool,
    /// Disable colored output (NO_COLOR)
    pub no_color: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            default_json: env::var("ENGINESMITH_JSON")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            no_color: env::var("NO_COLOR").is_ok(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "json"
    )
}
