//! CLI command implementations

pub mod check;
pub mod export;
pub mod import;
pub mod organism;
pub mod query;

use std::path::PathBuf;

use chado_engine::db::DbConfig;
use chado_engine::PgPool;

use crate::error::Result;

/// Resolve connection configuration and open the pool.
///
/// A YAML connection file takes precedence; otherwise the environment
/// (`CHADO_DATABASE_URL` and friends) is used.
pub async fn connect(config: &Option<PathBuf>) -> Result<(PgPool, DbConfig)> {
    let db_config = match config {
        Some(path) => DbConfig::from_yaml_file(path)?,
        None => DbConfig::from_env()?,
    };
    let pool = chado_engine::create_pool(&db_config).await?;
    Ok((pool, db_config))
}
