//! Importer
//!
//! Bulk-loads mapped records into the database transactionally. Foreign-key
//! columns holding natural keys (e.g. an organism name instead of an
//! `organism_id`) are resolved against the referenced table first; records
//! whose references do not resolve are skipped and reported without
//! aborting the batch. The surviving records are inserted in one
//! transaction: a database-level constraint violation rolls back the whole
//! insert, so partial success across constraint violations cannot happen.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgConnection;

use crate::db::{self, ConnectionHandle};
use crate::error::{EngineError, EngineResult};
use crate::record::{bind_value, Record, Value};
use crate::schema::TableDescriptor;

/// Outcome of one batch import.
#[derive(Debug)]
pub struct BatchResult {
    /// Number of records inserted and committed.
    pub succeeded: usize,
    /// Skipped records, in input order, with the reason for each.
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug)]
pub struct BatchFailure {
    /// Index of the record in the input batch.
    pub index: usize,
    pub error: EngineError,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.succeeded + self.failures.len()
    }
}

/// Looks up the primary key of a referenced row by its natural key.
///
/// Implemented once per referenced table; the importer selects the
/// implementation through a table-name map, so adding a resolvable table
/// means adding one entry, not touching the import algorithm.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn lookup(
        &self,
        conn: &mut PgConnection,
        natural_key: &str,
    ) -> EngineResult<Option<i32>>;
}

/// Single-column natural-key lookup, the common case.
pub struct LookupResolver {
    table: String,
    id_column: String,
    key_column: String,
}

impl LookupResolver {
    pub fn new(table: &str, id_column: &str, key_column: &str) -> Self {
        Self {
            table: table.to_string(),
            id_column: id_column.to_string(),
            key_column: key_column.to_string(),
        }
    }
}

#[async_trait]
impl Resolver for LookupResolver {
    async fn lookup(
        &self,
        conn: &mut PgConnection,
        natural_key: &str,
    ) -> EngineResult<Option<i32>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 LIMIT 1",
            self.id_column, self.table, self.key_column
        );
        let id = sqlx::query_scalar::<_, i32>(&sql)
            .bind(natural_key)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(id)
    }
}

/// Organism lookup: by abbreviation first, then by "Genus species".
pub struct OrganismResolver;

#[async_trait]
impl Resolver for OrganismResolver {
    async fn lookup(
        &self,
        conn: &mut PgConnection,
        natural_key: &str,
    ) -> EngineResult<Option<i32>> {
        let by_abbreviation = sqlx::query_scalar::<_, i32>(
            "SELECT organism_id FROM organism WHERE abbreviation = $1 LIMIT 1",
        )
        .bind(natural_key)
        .fetch_optional(&mut *conn)
        .await?;
        if by_abbreviation.is_some() {
            return Ok(by_abbreviation);
        }

        let Some((genus, species)) = natural_key.split_once(' ') else {
            return Ok(None);
        };
        let id = sqlx::query_scalar::<_, i32>(
            "SELECT organism_id FROM organism WHERE genus = $1 AND species = $2 LIMIT 1",
        )
        .bind(genus)
        .bind(species)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(id)
    }
}

/// Table-name map of resolvers used during import.
pub struct ResolverSet {
    resolvers: HashMap<String, Box<dyn Resolver>>,
}

impl ResolverSet {
    pub fn empty() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Resolvers for every referenced table of the built-in schema catalog.
    pub fn builtin() -> Self {
        let mut set = Self::empty();
        set.insert("organism", Box::new(OrganismResolver));
        set.insert("cv", Box::new(LookupResolver::new("cv", "cv_id", "name")));
        set.insert(
            "cvterm",
            Box::new(LookupResolver::new("cvterm", "cvterm_id", "name")),
        );
        set.insert("db", Box::new(LookupResolver::new("db", "db_id", "name")));
        set.insert(
            "dbxref",
            Box::new(LookupResolver::new("dbxref", "dbxref_id", "accession")),
        );
        set.insert(
            "pub",
            Box::new(LookupResolver::new("pub", "pub_id", "uniquename")),
        );
        set.insert(
            "feature",
            Box::new(LookupResolver::new("feature", "feature_id", "uniquename")),
        );
        set.insert(
            "synonym",
            Box::new(LookupResolver::new("synonym", "synonym_id", "name")),
        );
        set
    }

    pub fn insert(&mut self, table: &str, resolver: Box<dyn Resolver>) {
        self.resolvers.insert(table.to_string(), resolver);
    }

    pub fn get(&self, table: &str) -> Option<&dyn Resolver> {
        self.resolvers.get(table).map(|r| r.as_ref())
    }
}

/// Import a batch of records into one table.
///
/// Records are processed strictly in input order. Natural-key foreign-key
/// values are resolved first; a record whose reference does not resolve is
/// reported as failed with [`EngineError::UnresolvedReference`] and the
/// batch continues. The remaining records are inserted in a single
/// transaction bounded by `timeout`; a uniqueness or NOT-NULL violation
/// rolls the whole transaction back and fails with
/// [`EngineError::IntegrityViolation`] naming the offending record.
pub async fn import_batch(
    table: &TableDescriptor,
    records: Vec<Record>,
    conn: &mut ConnectionHandle,
    resolvers: &ResolverSet,
    timeout: Duration,
) -> EngineResult<BatchResult> {
    let mut failures = Vec::new();
    let mut resolved = Vec::new();

    for (index, mut record) in records.into_iter().enumerate() {
        if record.table() != table.name {
            return Err(EngineError::config(format!(
                "record {} belongs to table '{}', not '{}'",
                index,
                record.table(),
                table.name
            )));
        }
        match resolve_references(table, &mut record, &mut *conn, resolvers).await? {
            Some(error) => failures.push(BatchFailure { index, error }),
            None => resolved.push((index, record)),
        }
    }

    let skipped = failures.len();
    let succeeded = if resolved.is_empty() {
        0
    } else {
        let table = table.clone();
        db::with_transaction(conn, timeout, move |tx| {
            Box::pin(async move {
                let count = resolved.len();
                for (index, record) in &resolved {
                    insert_record(&table, record, tx)
                        .await
                        .map_err(|err| attach_record_context(err, &table.name, *index))?;
                }
                Ok(count)
            })
        })
        .await?
    };

    tracing::info!(
        table = %table.name,
        succeeded,
        skipped,
        "Batch import finished"
    );
    Ok(BatchResult {
        succeeded,
        failures,
    })
}

/// Substitute natural keys in foreign-key columns with primary keys.
///
/// Returns `Ok(Some(error))` when a reference does not resolve; that is a
/// record-level failure, not a batch failure.
async fn resolve_references(
    table: &TableDescriptor,
    record: &mut Record,
    conn: &mut PgConnection,
    resolvers: &ResolverSet,
) -> EngineResult<Option<EngineError>> {
    for fk in &table.foreign_keys {
        let Some(Value::Text(natural_key)) = record.get(&fk.column) else {
            continue;
        };
        let natural_key = natural_key.clone();

        // A registered resolver wins; otherwise the foreign key's declared
        // natural-key column drives a plain lookup.
        let resolved = match resolvers.get(&fk.referenced_table) {
            Some(resolver) => resolver.lookup(conn, &natural_key).await?,
            None => match &fk.natural_key {
                Some(key_column) => {
                    LookupResolver::new(&fk.referenced_table, &fk.referenced_column, key_column)
                        .lookup(conn, &natural_key)
                        .await?
                },
                None => None,
            },
        };
        match resolved {
            Some(id) => record.set(fk.column.clone(), Value::Integer(id)),
            None => {
                return Ok(Some(EngineError::UnresolvedReference {
                    column: fk.column.clone(),
                    referenced_table: fk.referenced_table.clone(),
                    natural_key,
                }))
            },
        }
    }
    Ok(None)
}

async fn insert_record(
    table: &TableDescriptor,
    record: &Record,
    conn: &mut PgConnection,
) -> EngineResult<()> {
    let (sql, columns) = insert_sql(table, record);
    let mut query = sqlx::query(&sql);
    for column in &columns {
        // Columns come from the record, so the value is always present.
        if let (Some(value), Some(descriptor)) = (record.get(column), table.column(column)) {
            query = bind_value(query, value, descriptor.ty);
        }
    }
    query.execute(&mut *conn).await?;
    Ok(())
}

/// Build the INSERT statement for a record, listing only the columns the
/// record carries, in the table's declared column order.
pub(crate) fn insert_sql(table: &TableDescriptor, record: &Record) -> (String, Vec<String>) {
    let columns: Vec<String> = table
        .columns
        .iter()
        .filter(|c| record.contains(&c.name))
        .map(|c| c.name.clone())
        .collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name,
        columns.join(", "),
        placeholders.join(", ")
    );
    (sql, columns)
}

/// Rewrite a constraint violation into an integrity error carrying the
/// table name and the offending record's index.
fn attach_record_context(err: EngineError, table: &str, record_index: usize) -> EngineError {
    let EngineError::Sqlx(sqlx_err) = err else {
        return err;
    };
    if let Some(db_err) = sqlx_err.as_database_error() {
        let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
        // 23502 NOT NULL, 23503 foreign key, 23505 unique, 23514 check.
        if code.starts_with("23") {
            let constraint = db_err
                .constraint()
                .map(|c| c.to_string())
                .unwrap_or_else(|| db_err.message().to_string());
            return EngineError::IntegrityViolation {
                table: table.to_string(),
                record_index,
                constraint,
            };
        }
    }
    EngineError::Sqlx(sqlx_err)
}
