//! Layered configuration loading
//!
//! Component configs are plain serde structs handed to constructors. This
//! module only knows how to populate one from a file overlaid with
//! environment variables.

use crate::errors::{QuantError, QuantResult};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Load `T` from `path` (any format the `config` crate recognises by
/// extension), then overlay `{env_prefix}_*` environment variables.
///
/// # Errors
///
/// Returns [`QuantError::InvalidParameter`] when the file cannot be read or
/// the merged settings do not deserialize into `T`.
pub fn load_config<T: DeserializeOwned>(path: &str, env_prefix: &str) -> QuantResult<T> {
    debug!("Loading configuration from {} (env prefix {})", path, env_prefix);

    let settings = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix(env_prefix).separator("__"))
        .build()
        .map_err(|e| QuantError::invalid("config", e.to_string()))?;

    settings
        .try_deserialize()
        .map_err(|e| QuantError::invalid("config", e.to_string()))
}
