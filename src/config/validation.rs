use crate::config::types::{Config, CredentialEntry, DiscoveryConfig, OutputConfig, ServerEntry};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_discovery_config(&config.discovery)?;
    validate_output_config(&config.output)?;
    validate_credentials(&config.credentials)?;
    validate_servers(&config.servers, &config.credentials)?;
    Ok(())
}

/// Validates crawl and client settings
fn validate_discovery_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    // The listing is parsed from the `jobs` array, so the projection must select it
    if !config.tree_projection.starts_with("jobs[") || !config.tree_projection.ends_with(']') {
        return Err(ConfigError::Validation(format!(
            "tree-projection must have the form 'jobs[...]', got '{}'",
            config.tree_projection
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_credentials(credentials: &[CredentialEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for entry in credentials {
        if entry.name.is_empty() {
            return Err(ConfigError::Validation(
                "credential name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(entry.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate credential name '{}'",
                entry.name
            )));
        }

        if entry.username.is_empty() {
            return Err(ConfigError::Validation(format!(
                "credential '{}' has an empty username",
                entry.name
            )));
        }

        if entry.secret.is_some() && entry.secret_env.is_some() {
            return Err(ConfigError::Validation(format!(
                "credential '{}' sets both secret and secret-env",
                entry.name
            )));
        }
    }

    Ok(())
}

fn validate_servers(
    servers: &[ServerEntry],
    credentials: &[CredentialEntry],
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for server in servers {
        if server.name.is_empty() {
            return Err(ConfigError::Validation(
                "server name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(server.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate server name '{}'",
                server.name
            )));
        }

        let url = Url::parse(&server.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid url for server '{}': {}", server.name, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "server '{}' must use http or https, got '{}'",
                server.name,
                url.scheme()
            )));
        }

        // A server without a credential is allowed; requests against it fail later
        if let Some(reference) = &server.credential {
            if !credentials.iter().any(|c| &c.name == reference) {
                return Err(ConfigError::Validation(format!(
                    "server '{}' references unknown credential '{}'",
                    server.name, reference
                )));
            }
        }
    }

    Ok(())
}
