//! `chado check` - validate the database schema

use std::path::PathBuf;

use chado_engine::SchemaRegistry;
use tracing::info;

use crate::commands::connect;
use crate::error::Result;

/// Run the check command
pub async fn run(config: &Option<PathBuf>) -> Result<()> {
    let (pool, _) = connect(config).await?;
    let mut conn = chado_engine::acquire(&pool).await?;

    let version = SchemaRegistry::builtin().validate(&mut conn).await?;
    info!(version = %version, "Schema check passed");
    println!("Database matches CHADO schema revision {}", version);
    Ok(())
}
