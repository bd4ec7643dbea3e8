use crate::config::types::{Config, FetcherConfig, PlanConfig, RulesConfig, SiteConfig};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_rules_config(&config.rules)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_plan_config(&config.plan)?;
    Ok(())
}

/// Validates site configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url(&config.base_url, "base-url")?;

    if config.manifest_file.is_empty() || config.journal_file.is_empty() {
        return Err(ConfigError::Validation(
            "manifest-file and journal-file cannot be empty".to_string(),
        ));
    }

    if config.manifest_file == config.journal_file {
        return Err(ConfigError::Validation(format!(
            "manifest-file and journal-file must differ, both are '{}'",
            config.manifest_file
        )));
    }

    Ok(())
}

/// Validates that every rule pattern compiles
fn validate_rules_config(config: &RulesConfig) -> Result<(), ConfigError> {
    for (section, patterns) in [
        ("exclude", &config.exclude),
        ("stable", &config.stable),
        ("cache", &config.cache),
    ] {
        for pattern in patterns {
            validate_pattern(section, pattern)?;
        }
    }

    for rule in &config.rewrite {
        validate_pattern("rewrite", &rule.pattern)?;
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be >= 1, got {}",
            config.concurrency
        )));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-ms must be > 0".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.throttle_divisor < 2 {
        return Err(ConfigError::Validation(format!(
            "throttle-divisor must be >= 2, got {}",
            config.throttle_divisor
        )));
    }

    for mirror in &config.mirrors {
        let prefix = Url::parse(&mirror.prefix).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid mirror prefix '{}': {}", mirror.prefix, e))
        })?;
        validate_http_url(&prefix, "mirror prefix")?;

        if mirror.ladder.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Mirror '{}' must have at least one ladder entry",
                mirror.prefix
            )));
        }

        for step in &mirror.ladder {
            let url = Url::parse(step).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid mirror URL '{}': {}", step, e))
            })?;
            validate_http_url(&url, "mirror")?;
        }
    }

    Ok(())
}

/// Validates plan configuration
fn validate_plan_config(config: &PlanConfig) -> Result<(), ConfigError> {
    if config.byte_budget == 0 {
        return Err(ConfigError::Validation(
            "byte-budget must be > 0".to_string(),
        ));
    }

    if config.merge_prefixes.iter().any(String::is_empty) {
        return Err(ConfigError::Validation(
            "merge-prefixes cannot contain an empty prefix".to_string(),
        ));
    }

    Ok(())
}

fn validate_pattern(section: &str, pattern: &str) -> Result<(), ConfigError> {
    Regex::new(pattern).map(|_| ()).map_err(|e| {
        ConfigError::InvalidPattern(format!("Invalid {} pattern '{}': {}", section, pattern, e))
    })
}

fn validate_http_url(url: &Url, what: &str) -> Result<(), ConfigError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use HTTP or HTTPS, got '{}'",
            what, url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!("{} has no host: '{}'", what, url)));
    }

    Ok(())
}
