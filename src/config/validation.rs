use crate::config::types::{Config, QueueConfig, SchedulerConfig, ScraperConfig, UserAgentConfig};
use crate::ConfigError;

/// Validates the entire configuration
///
/// The queue connection string is deliberately not required here; commands
/// that never publish (stats, source management) run without it.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_queue_config(&config.queue)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_user_agent_config(&config.user_agent)?;

    if config.storage.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.host.trim().is_empty() {
        return Err(ConfigError::Validation(
            "scraper host cannot be empty".to_string(),
        ));
    }

    config.base_url()?;
    Ok(())
}

fn validate_queue_config(config: &QueueConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "queue name cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "poll_interval_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    // robots.txt product tokens are limited to letters, '-' and '_'
    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only letters, hyphens and underscores, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact) = &config.contact_url {
        url::Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}
