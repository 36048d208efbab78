//! `chado query` - run a pre-compiled query and display the result

use std::path::PathBuf;

use chado_common::Pagination;
use chado_engine::{QueryEngine, SchemaRegistry};
use comfy_table::{presets, Table};
use tracing::info;

use crate::commands::connect;
use crate::error::Result;
use crate::params::parse_params;

/// Run the query command
pub async fn run(
    config: &Option<PathBuf>,
    template_name: &str,
    param_pairs: &[String],
    limit: i64,
    offset: i64,
) -> Result<()> {
    let (pool, _) = connect(config).await?;
    let mut conn = chado_engine::acquire(&pool).await?;

    let registry = SchemaRegistry::builtin();
    let version = registry.validate(&mut conn).await?;
    let Some(descriptor) = registry.descriptor(&version) else {
        unreachable!("validate only returns registered versions");
    };

    let engine = QueryEngine::with_builtins(descriptor)?;
    let template = engine.template(template_name)?;
    let params = parse_params(template, param_pairs)?;
    let columns: Vec<String> = template
        .result_shape()
        .columns
        .iter()
        .map(|c| c.name.clone())
        .collect();

    let records = engine
        .run(
            template_name,
            &params,
            &mut conn,
            Pagination::new(limit, offset),
        )
        .await?;
    info!(template = %template_name, rows = records.len(), "Query finished");

    let mut table = Table::new();
    table.load_preset(presets::UTF8_BORDERS_ONLY);
    table.set_header(&columns);
    for record in &records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| {
                record
                    .get(column)
                    .map(|value| value.to_string())
                    .unwrap_or_default()
            })
            .collect();
        table.add_row(row);
    }
    println!("{}", table);
    println!("{} rows", records.len());
    Ok(())
}
