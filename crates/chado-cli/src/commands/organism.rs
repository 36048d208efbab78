//! `chado insert organism` / `chado delete organism`

use std::path::PathBuf;

use chado_engine::admin::{delete_organism, insert_organism, NewOrganism};
use tracing::info;

use crate::commands::connect;
use crate::error::Result;

/// Insert a new organism
pub async fn insert(config: &Option<PathBuf>, organism: NewOrganism) -> Result<()> {
    let (pool, db_config) = connect(config).await?;
    let mut conn = chado_engine::acquire(&pool).await?;

    let genus = organism.genus.clone();
    let species = organism.species.clone();
    let id = insert_organism(&mut conn, db_config.transaction_timeout(), organism).await?;
    info!(organism_id = id, "Organism inserted");
    println!("Inserted organism '{} {}' (organism_id {})", genus, species, id);
    Ok(())
}

/// Delete an organism by abbreviation or "Genus species"
pub async fn delete(config: &Option<PathBuf>, organism: &str) -> Result<()> {
    let (pool, db_config) = connect(config).await?;
    let mut conn = chado_engine::acquire(&pool).await?;

    delete_organism(&mut conn, db_config.transaction_timeout(), organism).await?;
    println!("Deleted organism '{}'", organism);
    Ok(())
}
