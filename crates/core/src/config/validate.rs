use super::{types::Config, ConfigError};

/// Smallest accepted total cache budget (1 MiB per store).
pub const MIN_CACHE_BYTES: u64 = 4 * 1024 * 1024;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Public URL is an http(s) URL
/// - Cache budget and timeouts are usable
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let public_url = &config.server.public_url;
    if !(public_url.starts_with("http://") || public_url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "server.public_url must start with http:// or https://, got {:?}",
            public_url
        )));
    }

    if config.cache.max_bytes < MIN_CACHE_BYTES {
        return Err(ConfigError::ValidationError(format!(
            "cache.max_bytes must be at least {} bytes",
            MIN_CACHE_BYTES
        )));
    }

    if config.search.timeout_secs == 0 || config.search.indexer_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "search timeouts cannot be 0".to_string(),
        ));
    }

    if config.search.indexer_timeout_secs > config.search.timeout_secs {
        return Err(ConfigError::ValidationError(
            "search.indexer_timeout_secs cannot exceed search.timeout_secs".to_string(),
        ));
    }

    if config.debrid.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "debrid.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.debrid.availability_batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "debrid.availability_batch_size cannot be 0".to_string(),
        ));
    }

    if config.debrid.rate_limit_rpm == 0 {
        return Err(ConfigError::ValidationError(
            "debrid.rate_limit_rpm cannot be 0".to_string(),
        ));
    }

    if let Some(jackett) = &config.search.jackett {
        if jackett.indexers.is_empty() {
            return Err(ConfigError::ValidationError(
                "search.jackett.indexers cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
