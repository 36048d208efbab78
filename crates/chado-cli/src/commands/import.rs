//! `chado import` - bulk-load a delimited file into a table

use std::path::{Path, PathBuf};

use chado_engine::import::{import_batch, ResolverSet};
use chado_engine::record::{DelimitedMapper, Record};
use chado_engine::{EngineResult, SchemaRegistry};
use tracing::{info, warn};

use crate::commands::connect;
use crate::error::Result;

/// Run the import command
pub async fn run(
    config: &Option<PathBuf>,
    table_name: &str,
    input: &Path,
    delimiter: char,
) -> Result<()> {
    let (pool, db_config) = connect(config).await?;
    let mut conn = chado_engine::acquire(&pool).await?;

    let registry = SchemaRegistry::builtin();
    let version = registry.validate(&mut conn).await?;
    let Some(descriptor) = registry.descriptor(&version) else {
        unreachable!("validate only returns registered versions");
    };
    let table = descriptor.describe(table_name)?;

    let text = std::fs::read_to_string(input)?;
    let mapper = DelimitedMapper::new(delimiter);
    let records: Vec<Record> = mapper
        .to_records(table, &text)?
        .collect::<EngineResult<_>>()?;
    info!(table = %table_name, records = records.len(), "Mapped input file");

    let result = import_batch(
        table,
        records,
        &mut conn,
        &ResolverSet::builtin(),
        db_config.transaction_timeout(),
    )
    .await?;

    println!(
        "Imported {} of {} records into '{}'",
        result.succeeded,
        result.total(),
        table_name
    );
    for failure in &result.failures {
        warn!(index = failure.index, error = %failure.error, "Record skipped");
        println!("  record {}: {}", failure.index, failure.error);
    }
    Ok(())
}
