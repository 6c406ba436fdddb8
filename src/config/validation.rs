use super::models::{Config, FetcherConfig, PacingConfig, StorageConfig};
use thiserror::Error;

/// S3 multipart uploads reject non-final parts below 5 MiB
const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("fetcher.max_retries must be at least 1")]
    NoFetchAttempts,

    #[error("Timeout must be positive: {field}")]
    ZeroTimeout { field: &'static str },

    #[error("Retry window is invalid: min {min}s, max {max}s")]
    InvalidRetryWindow { min: f64, max: f64 },

    #[error("Rate limit backoff must not be negative: {0}s")]
    NegativeBackoff(f64),

    #[error("fetcher.sleep_interval ({min}) exceeds fetcher.max_sleep_interval ({max})")]
    InvalidSleepInterval { min: u32, max: u32 },

    #[error("storage.part_size ({actual}) is below the multipart minimum of {limit} bytes")]
    PartSizeTooSmall { actual: usize, limit: usize },

    #[error("fetcher.binary must not be empty")]
    EmptyBinary,

    #[error("storage.content_type is not a valid media type: {0}")]
    InvalidContentType(String),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_fetcher(&config.fetcher)?;
    validate_pacing(&config.pacing)?;
    validate_storage(&config.storage)?;
    Ok(())
}

fn validate_fetcher(fetcher: &FetcherConfig) -> Result<(), ValidationError> {
    if fetcher.binary.trim().is_empty() {
        return Err(ValidationError::EmptyBinary);
    }

    if fetcher.max_retries == 0 {
        return Err(ValidationError::NoFetchAttempts);
    }

    if fetcher.attempt_timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "fetcher.attempt_timeout_secs",
        });
    }

    if fetcher.sleep_interval > fetcher.max_sleep_interval {
        return Err(ValidationError::InvalidSleepInterval {
            min: fetcher.sleep_interval,
            max: fetcher.max_sleep_interval,
        });
    }

    Ok(())
}

fn validate_pacing(pacing: &PacingConfig) -> Result<(), ValidationError> {
    let (min, max) = (pacing.retry_delay_min_secs, pacing.retry_delay_max_secs);

    // NaN fails every comparison, so it is rejected here too
    if !(min >= 0.0 && max >= min && max.is_finite()) {
        return Err(ValidationError::InvalidRetryWindow { min, max });
    }

    if !(pacing.rate_limit_backoff_secs >= 0.0 && pacing.rate_limit_backoff_secs.is_finite()) {
        return Err(ValidationError::NegativeBackoff(pacing.rate_limit_backoff_secs));
    }

    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ValidationError> {
    if storage.upload_timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "storage.upload_timeout_secs",
        });
    }

    if storage.part_size < MIN_PART_SIZE {
        return Err(ValidationError::PartSizeTooSmall {
            actual: storage.part_size,
            limit: MIN_PART_SIZE,
        });
    }

    if storage.content_type.parse::<mime::Mime>().is_err() {
        return Err(ValidationError::InvalidContentType(
            storage.content_type.clone(),
        ));
    }

    Ok(())
}
