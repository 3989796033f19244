use crate::app_config::{AppConfig, Environment, LlmConfig};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files; useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup, no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("STORELENS_ENV", "development"))?;
    let bind_addr = parse_addr("STORELENS_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("STORELENS_LOG_LEVEL", "info");

    let fetch_timeout_secs = parse_u64("STORELENS_FETCH_TIMEOUT_SECS", "15")?;
    let user_agent = or_default("STORELENS_USER_AGENT", DEFAULT_USER_AGENT);
    let fetch_max_retries = parse_u32("STORELENS_FETCH_MAX_RETRIES", "2")?;
    let fetch_backoff_base_ms = parse_u64("STORELENS_FETCH_BACKOFF_BASE_MS", "500")?;
    let politeness_delay_ms = parse_u64("STORELENS_POLITENESS_DELAY_MS", "100")?;
    let request_deadline_secs = parse_u64("STORELENS_REQUEST_DEADLINE_SECS", "45")?;
    if request_deadline_secs == 0 {
        return Err(invalid(
            "STORELENS_REQUEST_DEADLINE_SECS",
            "must be greater than zero".to_string(),
        ));
    }

    let catalog_page_limit = parse_u32("STORELENS_CATALOG_PAGE_LIMIT", "250")?;
    let catalog_max_pages = parse_usize("STORELENS_CATALOG_MAX_PAGES", "4")?;
    let policy_min_chars = parse_usize("STORELENS_POLICY_MIN_CHARS", "200")?;
    let faq_min_answer_chars = parse_usize("STORELENS_FAQ_MIN_ANSWER_CHARS", "10")?;
    let faq_max_entries = parse_usize("STORELENS_FAQ_MAX_ENTRIES", "50")?;
    let hero_max_products = parse_usize("STORELENS_HERO_MAX_PRODUCTS", "20")?;
    let brand_context_min_chars = parse_usize("STORELENS_BRAND_CONTEXT_MIN_CHARS", "50")?;

    let llm = match lookup("STORELENS_LLM_API_KEY").or_else(|_| lookup("OPENAI_API_KEY")) {
        Ok(api_key) if !api_key.trim().is_empty() => Some(LlmConfig {
            api_key,
            base_url: or_default("STORELENS_LLM_BASE_URL", "https://api.openai.com/v1"),
            model: or_default("STORELENS_LLM_MODEL", "gpt-4o-mini"),
            timeout_secs: parse_u64("STORELENS_ENHANCE_TIMEOUT_SECS", "20")?,
        }),
        _ => None,
    };

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        fetch_timeout_secs,
        user_agent,
        fetch_max_retries,
        fetch_backoff_base_ms,
        politeness_delay_ms,
        request_deadline_secs,
        catalog_page_limit,
        catalog_max_pages,
        policy_min_chars,
        faq_min_answer_chars,
        faq_max_entries,
        hero_max_products,
        brand_context_min_chars,
        llm,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "STORELENS_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
