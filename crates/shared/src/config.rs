use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::completion::LlmPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    /// Tier A event search; absent means Tier B only
    pub xai_api_key: Option<String>,
    pub anthropic_model: Option<String>,
    pub xai_model: Option<String>,
    pub database_path: Option<PathBuf>,
    pub llm_policy: LlmPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let anthropic_api_key = env::var("ANTHROPIC_API_KEY").context(
            "ANTHROPIC_API_KEY not found.\n\n\
            To fix this, create ~/.config/sunday-edition/.env with:\n  \
            ANTHROPIC_API_KEY=your_key_here\n  \
            XAI_API_KEY=your_key_here   (optional, enables X/web event search)\n\n\
            Get your Anthropic API key from: https://console.anthropic.com/settings/keys",
        )?;

        let defaults = LlmPolicy::default();
        let timeout_secs = parse_var("LLM_TIMEOUT_SECS", defaults.timeout.as_secs())?;
        let max_concurrent_calls =
            parse_var("LLM_MAX_CONCURRENCY_PER_LOCALE", defaults.max_concurrent_calls)?.max(1);
        let max_attempts = parse_var("LLM_MAX_ATTEMPTS", defaults.max_attempts)?.max(1);

        Ok(Self {
            anthropic_api_key,
            xai_api_key: non_empty_var("XAI_API_KEY"),
            anthropic_model: non_empty_var("ANTHROPIC_MODEL"),
            xai_model: non_empty_var("XAI_MODEL"),
            database_path: non_empty_var("SUNDAY_EDITION_DB").map(PathBuf::from),
            llm_policy: LlmPolicy {
                max_concurrent_calls,
                timeout: Duration::from_secs(timeout_secs),
                max_attempts,
            },
        })
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/sunday-edition/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("sunday-edition").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{} must be a number, got \"{}\"", name, raw)),
        None => Ok(default),
    }
}
