use crate::config::types::{
    Config, HttpConfig, PersistenceConfig, SiteConfig, StoreConfig, SupervisorConfig,
    ThresholdConfig, ThrottleConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_http_config(&config.http)?;
    validate_persistence_config(&config.persistence)?;
    if let Some(throttle) = &config.throttle {
        validate_throttle_config(throttle)?;
    }
    validate_thresholds(&config.thresholds)?;
    validate_store_config(&config.store)?;
    validate_supervisor_config(&config.supervisor)?;
    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.entrypoint.trim().is_empty() {
        return Err(ConfigError::Validation(
            "entrypoint cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "http timeout must be >= 1s, got {}s",
            config.timeout
        )));
    }

    if let Some(agent) = &config.user_agent {
        if agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user-agent cannot be empty when set".to_string(),
            ));
        }
    }

    if let Some(proxy) = &config.proxy {
        if proxy.scheme != "http" && proxy.scheme != "https" {
            return Err(ConfigError::Validation(format!(
                "proxy scheme must be 'http' or 'https', got '{}'",
                proxy.scheme
            )));
        }

        if proxy.host.is_empty() {
            return Err(ConfigError::Validation(
                "proxy host cannot be empty".to_string(),
            ));
        }

        Url::parse(&proxy.url())
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy: {}", e)))?;
    }

    Ok(())
}

fn validate_persistence_config(config: &PersistenceConfig) -> Result<(), ConfigError> {
    if config.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.output.as_os_str().is_empty() {
        return Err(ConfigError::Validation("output cannot be empty".to_string()));
    }

    Ok(())
}

fn validate_throttle_config(config: &ThrottleConfig) -> Result<(), ConfigError> {
    if config.min > config.max {
        return Err(ConfigError::Validation(format!(
            "throttle min ({}ms) must not exceed max ({}ms)",
            config.min, config.max
        )));
    }

    Ok(())
}

fn validate_thresholds(config: &ThresholdConfig) -> Result<(), ConfigError> {
    if config.pages < 1 {
        return Err(ConfigError::Validation(format!(
            "pages threshold must be >= 1, got {}",
            config.pages
        )));
    }

    if config.images < 1 {
        return Err(ConfigError::Validation(format!(
            "images threshold must be >= 1, got {}",
            config.images
        )));
    }

    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.lock_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "lock-attempts must be >= 1, got {}",
            config.lock_attempts
        )));
    }

    Ok(())
}

fn validate_supervisor_config(config: &SupervisorConfig) -> Result<(), ConfigError> {
    if config.max_backoff < config.initial_backoff {
        return Err(ConfigError::Validation(format!(
            "supervisor max-backoff ({}ms) must be >= initial-backoff ({}ms)",
            config.max_backoff, config.initial_backoff
        )));
    }

    Ok(())
}
