//! `chado export` - stream a pre-compiled query to delimited text

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use chado_engine::export::{export, write_delimited};
use chado_engine::{QueryEngine, SchemaRegistry};
use tracing::info;

use crate::commands::connect;
use crate::error::Result;
use crate::params::parse_params;

/// Run the export command
pub async fn run(
    config: &Option<PathBuf>,
    template_name: &str,
    param_pairs: &[String],
    output: &Option<PathBuf>,
    delimiter: char,
    no_header: bool,
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

    let mut stream = export(template, &params, &mut conn).await?;
    let rows = match output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_delimited(&mut stream, &mut writer, delimiter, !no_header).await?
        },
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            write_delimited(&mut stream, &mut writer, delimiter, !no_header).await?
        },
    };

    info!(template = %template_name, rows, "Export finished");
    if let Some(path) = output {
        println!("Exported {} rows to {}", rows, path.display());
    }
    Ok(())
}
