use anyhow::{bail, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::IndexConfig;

/// Opens the pre-built index read-only.
///
/// The index is produced by a separate indexer and never written here, so a
/// missing file is a startup error rather than something to create.
pub async fn connect_read_only(config: &IndexConfig) -> Result<SqlitePool> {
    let db_path = &config.path;

    if !db_path.is_file() {
        bail!("index not found at {}", db_path.display());
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .read_only(true)
        .create_if_missing(false);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
