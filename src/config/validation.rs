use super::models::{Config, DispatchTarget};
use crate::dispatch::DispatchMode;
use crate::fetchers::KNOWN_KINDS;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("runner.budget must be greater than zero")]
    ZeroBudget,

    #[error("runner.max_links must be at least 1 when set")]
    ZeroMaxLinks,

    #[error("dispatch.worker_name must not be empty")]
    EmptyWorkerName,

    #[error("dispatch.target is 'http' but dispatch.endpoint is not set")]
    MissingEndpoint,

    #[error("Invalid dispatch endpoint '{endpoint}', expected 'http://' or 'https://'")]
    InvalidEndpointScheme { endpoint: String },

    #[error("dispatch.local_workers must be at least 1")]
    NoLocalWorkers,

    #[error("Harvest type '{harvest_type}' uses unknown fetcher kind '{kind}'")]
    UnknownFetcherKind { harvest_type: String, kind: String },

    #[error("No fetchers configured (at least one harvest type is required)")]
    NoFetchersConfigured,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_runner(config)?;
    validate_dispatch(config)?;
    validate_fetchers(config)?;
    Ok(())
}

fn validate_runner(config: &Config) -> Result<(), ValidationError> {
    if config.runner.budget.is_zero() {
        return Err(ValidationError::ZeroBudget);
    }
    if config.runner.max_links == Some(0) {
        return Err(ValidationError::ZeroMaxLinks);
    }
    Ok(())
}

/// The target only matters in dispatch mode; in-process chains never leave the process
fn validate_dispatch(config: &Config) -> Result<(), ValidationError> {
    let dispatch = &config.dispatch;

    if dispatch.worker_name.trim().is_empty() {
        return Err(ValidationError::EmptyWorkerName);
    }

    if dispatch.mode == DispatchMode::InProcess {
        return Ok(());
    }

    match dispatch.target {
        DispatchTarget::Http => {
            let endpoint = dispatch
                .endpoint
                .as_deref()
                .ok_or(ValidationError::MissingEndpoint)?;
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ValidationError::InvalidEndpointScheme {
                    endpoint: endpoint.to_string(),
                });
            }
        }
        DispatchTarget::Local => {
            if dispatch.local_workers == 0 {
                return Err(ValidationError::NoLocalWorkers);
            }
        }
    }

    Ok(())
}

fn validate_fetchers(config: &Config) -> Result<(), ValidationError> {
    if config.fetchers.is_empty() {
        return Err(ValidationError::NoFetchersConfigured);
    }

    for (harvest_type, fetcher) in &config.fetchers {
        if !KNOWN_KINDS.contains(&fetcher.kind.as_str()) {
            return Err(ValidationError::UnknownFetcherKind {
                harvest_type: harvest_type.clone(),
                kind: fetcher.kind.clone(),
            });
        }
    }

    Ok(())
}
