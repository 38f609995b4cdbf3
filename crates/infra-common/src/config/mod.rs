//! Settings loading and hot-reloadable configuration snapshots

mod reloadable;

pub use reloadable::Reloadable;

use crate::errors::types::Result;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load settings of type `T`, layering an optional file under environment variables.
///
/// Environment variables are read as `<PREFIX>__<FIELD>`, with `__` separating
/// nested sections (e.g. `CREDGATE__IDENTITY__FAILED_LOGINS_TO_LOCK=3`). Missing
/// fields fall back to `T`'s serde defaults.
pub fn load_settings<T: DeserializeOwned>(prefix: &str, file: Option<&Path>) -> Result<T> {
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let value = settings.try_deserialize::<T>()?;
    tracing::debug!(prefix, file = ?file, "Loaded settings");
    Ok(value)
}
