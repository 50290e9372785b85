use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the cadence home directory with a default `config.json` and an empty database.
///
/// # Errors
/// - Returns an `ErrorType::Config` error if the home directory already holds a config, or if
///   any file operation fails.
pub async fn init(cadence_home: &Path) -> Result<Out<()>> {
    let config = Config::create(cadence_home).await?;
    Ok(format!(
        "Successfully created the cadence home at {}",
        config.root().display()
    )
    .into())
}
