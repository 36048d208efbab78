//! Direct administration of single entities
//!
//! Small, transactional insert/delete operations for entities that are
//! managed one at a time rather than in bulk, currently organisms.

use std::time::Duration;

use crate::db::{self, ConnectionHandle};
use crate::error::{EngineError, EngineResult};
use crate::import::{OrganismResolver, Resolver};

/// Input for inserting one organism.
#[derive(Debug, Clone, Default)]
pub struct NewOrganism {
    pub genus: String,
    pub species: String,
    pub abbreviation: Option<String>,
    pub common_name: Option<String>,
    pub infraspecific_name: Option<String>,
    pub comment: Option<String>,
}

/// Insert an organism, returning its generated primary key.
///
/// A duplicate genus/species pair violates the organism uniqueness
/// constraint and surfaces as [`EngineError::IntegrityViolation`].
pub async fn insert_organism(
    conn: &mut ConnectionHandle,
    timeout: Duration,
    organism: NewOrganism,
) -> EngineResult<i32> {
    let id = db::with_transaction(conn, timeout, move |tx| {
        Box::pin(async move {
            let mut columns = vec!["genus", "species"];
            for (column, value) in [
                ("abbreviation", &organism.abbreviation),
                ("common_name", &organism.common_name),
                ("infraspecific_name", &organism.infraspecific_name),
                ("comment", &organism.comment),
            ] {
                if value.is_some() {
                    columns.push(column);
                }
            }
            let placeholders: Vec<String> =
                (1..=columns.len()).map(|i| format!("${}", i)).collect();
            let sql = format!(
                "INSERT INTO organism ({}) VALUES ({}) RETURNING organism_id",
                columns.join(", "),
                placeholders.join(", ")
            );

            let mut query = sqlx::query_scalar::<_, i32>(&sql)
                .bind(organism.genus.clone())
                .bind(organism.species.clone());
            for value in [
                &organism.abbreviation,
                &organism.common_name,
                &organism.infraspecific_name,
                &organism.comment,
            ]
            .into_iter()
            .flatten()
            {
                query = query.bind(value.clone());
            }

            let id = query.fetch_one(&mut *tx).await.map_err(|err| {
                match constraint_name(&err) {
                    Some(constraint) => EngineError::IntegrityViolation {
                        table: "organism".to_string(),
                        record_index: 0,
                        constraint,
                    },
                    None => EngineError::Sqlx(err),
                }
            })?;
            Ok(id)
        })
    })
    .await?;

    tracing::info!(organism_id = id, "Inserted organism");
    Ok(id)
}

/// Delete an organism by natural key (abbreviation or "Genus species").
///
/// Fails with [`EngineError::UnresolvedReference`] when no such organism
/// exists. Dependent rows are removed by the schema's cascading foreign
/// keys.
pub async fn delete_organism(
    conn: &mut ConnectionHandle,
    timeout: Duration,
    natural_key: &str,
) -> EngineResult<()> {
    let id = OrganismResolver
        .lookup(&mut *conn, natural_key)
        .await?
        .ok_or_else(|| EngineError::UnresolvedReference {
            column: "abbreviation".to_string(),
            referenced_table: "organism".to_string(),
            natural_key: natural_key.to_string(),
        })?;

    db::with_transaction(conn, timeout, move |tx| {
        Box::pin(async move {
            sqlx::query("DELETE FROM organism WHERE organism_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            Ok(())
        })
    })
    .await?;

    tracing::info!(organism_id = id, organism = %natural_key, "Deleted organism");
    Ok(())
}

fn constraint_name(err: &sqlx::Error) -> Option<String> {
    let db_err = err.as_database_error()?;
    let code = db_err.code()?;
    if code.starts_with("23") {
        Some(
            db_err
                .constraint()
                .map(|c| c.to_string())
                .unwrap_or_else(|| db_err.message().to_string()),
        )
    } else {
        None
    }
}
