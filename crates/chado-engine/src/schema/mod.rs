//! Schema registry
//!
//! In-memory description of the tables, columns, types and foreign-key
//! relationships of each supported CHADO revision, plus validation of a
//! live database against those descriptions.
//!
//! Descriptors are constructed once at startup and never mutated, so they
//! are shared by reference across concurrent callers without locking.

mod catalog;

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chado_common::SchemaVersion;
use sqlx::{PgConnection, Row};

use crate::error::{EngineError, EngineResult};

/// Semantic type of a column, independent of the backend's exact SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInt,
    Text,
    Boolean,
    Double,
    Timestamp,
}

impl ColumnType {
    /// Whether a live column with this `data_type` (as reported by
    /// `information_schema`) satisfies the declared semantic type.
    pub fn accepts(self, data_type: &str) -> bool {
        match self {
            ColumnType::Integer => matches!(data_type, "integer" | "smallint"),
            ColumnType::BigInt => matches!(data_type, "bigint"),
            ColumnType::Text => {
                matches!(data_type, "text" | "character varying" | "character")
            },
            ColumnType::Boolean => matches!(data_type, "boolean"),
            ColumnType::Double => {
                matches!(data_type, "double precision" | "real" | "numeric")
            },
            ColumnType::Timestamp => matches!(
                data_type,
                "timestamp without time zone" | "timestamp with time zone" | "date"
            ),
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::BigInt => "bigint",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Double => "double",
            ColumnType::Timestamp => "timestamp",
        };
        write!(f, "{}", name)
    }
}

/// One column of a table.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    /// The backend fills this column when it is absent from an insert
    /// (serial keys, defaulted flags, timestamps).
    pub has_default: bool,
}

impl ColumnDescriptor {
    /// A column that external input must supply a value for.
    pub fn required(&self) -> bool {
        !self.nullable && !self.has_default
    }
}

/// A foreign-key relationship from one local column to a referenced
/// table's primary-key column.
#[derive(Debug, Clone)]
pub struct ForeignKeyDescriptor {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    /// Human-meaningful column on the referenced table used to resolve
    /// natural keys in external input (e.g. `organism.abbreviation`).
    pub natural_key: Option<String>,
}

/// One table: ordered columns, primary key, outgoing foreign keys.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKeyDescriptor> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|c| c == column)
    }

    /// Columns external input must supply (non-nullable, not defaulted).
    pub fn required_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.required())
    }
}

/// Builder for a [`TableDescriptor`]; used by the version catalog.
pub(crate) struct TableBuilder {
    table: TableDescriptor,
}

impl TableBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            table: TableDescriptor {
                name: name.to_string(),
                columns: Vec::new(),
                primary_key: Vec::new(),
                foreign_keys: Vec::new(),
            },
        }
    }

    pub fn column(mut self, name: &str, ty: ColumnType, nullable: bool) -> Self {
        self.table.columns.push(ColumnDescriptor {
            name: name.to_string(),
            ty,
            nullable,
            has_default: false,
        });
        self
    }

    pub fn defaulted(mut self, name: &str, ty: ColumnType, nullable: bool) -> Self {
        self.table.columns.push(ColumnDescriptor {
            name: name.to_string(),
            ty,
            nullable,
            has_default: true,
        });
        self
    }

    /// Serial primary-key column; always defaulted by the backend.
    pub fn serial_pk(mut self, name: &str) -> Self {
        self.table.columns.push(ColumnDescriptor {
            name: name.to_string(),
            ty: ColumnType::Integer,
            nullable: false,
            has_default: true,
        });
        self.table.primary_key.push(name.to_string());
        self
    }

    pub fn foreign_key(mut self, column: &str, table: &str, referenced: &str) -> Self {
        self.table.foreign_keys.push(ForeignKeyDescriptor {
            column: column.to_string(),
            referenced_table: table.to_string(),
            referenced_column: referenced.to_string(),
            natural_key: None,
        });
        self
    }

    pub fn resolvable_foreign_key(
        mut self,
        column: &str,
        table: &str,
        referenced: &str,
        natural_key: &str,
    ) -> Self {
        self.table.foreign_keys.push(ForeignKeyDescriptor {
            column: column.to_string(),
            referenced_table: table.to_string(),
            referenced_column: referenced.to_string(),
            natural_key: Some(natural_key.to_string()),
        });
        self
    }

    pub fn build(self) -> TableDescriptor {
        self.table
    }
}

/// Immutable, versioned description of one supported schema revision.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    pub version: SchemaVersion,
    pub tables: BTreeMap<String, TableDescriptor>,
}

impl SchemaDescriptor {
    pub(crate) fn new(version: &str, tables: Vec<TableDescriptor>) -> Self {
        Self {
            version: SchemaVersion::new(version),
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Look up a table description; fails with [`EngineError::UnknownTable`].
    pub fn describe(&self, table: &str) -> EngineResult<&TableDescriptor> {
        self.tables
            .get(table)
            .ok_or_else(|| EngineError::UnknownTable(table.to_string()))
    }

    /// Check internal consistency: every foreign-key reference, primary-key
    /// column and natural-key column resolves within this descriptor.
    pub fn verify(&self) -> Result<(), String> {
        for table in self.tables.values() {
            for pk in &table.primary_key {
                if table.column(pk).is_none() {
                    return Err(format!(
                        "{}: primary-key column '{}' does not exist",
                        table.name, pk
                    ));
                }
            }
            for fk in &table.foreign_keys {
                if table.column(&fk.column).is_none() {
                    return Err(format!(
                        "{}: foreign-key column '{}' does not exist",
                        table.name, fk.column
                    ));
                }
                let Some(referenced) = self.tables.get(&fk.referenced_table) else {
                    return Err(format!(
                        "{}.{}: referenced table '{}' does not exist",
                        table.name, fk.column, fk.referenced_table
                    ));
                };
                if referenced.column(&fk.referenced_column).is_none() {
                    return Err(format!(
                        "{}.{}: referenced column '{}.{}' does not exist",
                        table.name, fk.column, fk.referenced_table, fk.referenced_column
                    ));
                }
                if let Some(natural) = &fk.natural_key {
                    if referenced.column(natural).is_none() {
                        return Err(format!(
                            "{}.{}: natural-key column '{}.{}' does not exist",
                            table.name, fk.column, fk.referenced_table, natural
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Discrepancies between a schema descriptor and the live database.
#[derive(Debug, Clone, Default)]
pub struct SchemaDiff {
    pub missing_tables: Vec<String>,
    pub missing_columns: Vec<String>,
    pub type_mismatches: Vec<TypeMismatch>,
}

#[derive(Debug, Clone)]
pub struct TypeMismatch {
    pub column: String,
    pub expected: ColumnType,
    pub actual: String,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.missing_tables.is_empty()
            && self.missing_columns.is_empty()
            && self.type_mismatches.is_empty()
    }

    fn issue_count(&self) -> usize {
        self.missing_tables.len() + self.missing_columns.len() + self.type_mismatches.len()
    }
}

impl std::fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.missing_tables.is_empty() {
            parts.push(format!("missing tables [{}]", self.missing_tables.join(", ")));
        }
        if !self.missing_columns.is_empty() {
            parts.push(format!(
                "missing columns [{}]",
                self.missing_columns.join(", ")
            ));
        }
        if !self.type_mismatches.is_empty() {
            let mismatches: Vec<String> = self
                .type_mismatches
                .iter()
                .map(|m| format!("{} expected {} got {}", m.column, m.expected, m.actual))
                .collect();
            parts.push(format!("type mismatches [{}]", mismatches.join(", ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// Registry of all supported schema revisions, oldest first.
#[derive(Debug)]
pub struct SchemaRegistry {
    versions: Vec<SchemaDescriptor>,
}

impl SchemaRegistry {
    /// The built-in catalog of supported CHADO revisions.
    ///
    /// Constructed once per process and shared by reference; descriptors
    /// are immutable after this point.
    pub fn builtin() -> &'static SchemaRegistry {
        static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| SchemaRegistry {
            versions: catalog::supported_versions(),
        })
    }

    pub fn versions(&self) -> impl Iterator<Item = &SchemaVersion> {
        self.versions.iter().map(|d| &d.version)
    }

    pub fn descriptor(&self, version: &SchemaVersion) -> Option<&SchemaDescriptor> {
        self.versions.iter().find(|d| &d.version == version)
    }

    /// The newest supported revision.
    pub fn latest(&self) -> &SchemaDescriptor {
        // The catalog is never empty; guarded by a test.
        &self.versions[self.versions.len() - 1]
    }

    /// Look up a table in the newest revision.
    pub fn describe(&self, table: &str) -> EngineResult<&TableDescriptor> {
        self.latest().describe(table)
    }

    /// Inspect the live database and select the best-matching revision.
    ///
    /// Compares `information_schema` metadata against every known
    /// descriptor. Extra tables or columns in the database are ignored;
    /// a revision matches when everything it expects is present with a
    /// compatible type. The newest matching revision wins. When nothing
    /// matches, fails with [`EngineError::SchemaMismatch`] describing every
    /// discrepancy against the closest revision. Read-only.
    pub async fn validate(&self, conn: &mut PgConnection) -> EngineResult<SchemaVersion> {
        let live = inspect_live_schema(conn).await?;

        let mut closest: Option<(&SchemaDescriptor, SchemaDiff)> = None;
        for descriptor in self.versions.iter().rev() {
            let diff = diff_against_live(descriptor, &live);
            if diff.is_empty() {
                tracing::info!(version = %descriptor.version, "Schema validated");
                return Ok(descriptor.version.clone());
            }
            match &closest {
                Some((_, best)) if best.issue_count() <= diff.issue_count() => {},
                _ => closest = Some((descriptor, diff)),
            }
        }

        // The registry always holds at least one version.
        let (descriptor, diff) = match closest {
            Some(found) => found,
            None => return Err(EngineError::config("schema registry is empty")),
        };
        Err(EngineError::SchemaMismatch {
            closest: descriptor.version.to_string(),
            diff,
        })
    }
}

/// Live column metadata keyed by table, then column name.
type LiveSchema = BTreeMap<String, BTreeMap<String, String>>;

async fn inspect_live_schema(conn: &mut PgConnection) -> EngineResult<LiveSchema> {
    let rows = sqlx::query(
        "SELECT table_name::text AS table_name, \
                column_name::text AS column_name, \
                data_type::text AS data_type \
         FROM information_schema.columns \
         WHERE table_schema = 'public' \
         ORDER BY table_name, ordinal_position",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut live: LiveSchema = BTreeMap::new();
    for row in rows {
        let table: String = row.try_get("table_name")?;
        let column: String = row.try_get("column_name")?;
        let data_type: String = row.try_get("data_type")?;
        live.entry(table).or_default().insert(column, data_type);
    }
    Ok(live)
}

fn diff_against_live(descriptor: &SchemaDescriptor, live: &LiveSchema) -> SchemaDiff {
    let mut diff = SchemaDiff::default();
    for table in descriptor.tables.values() {
        let Some(live_columns) = live.get(&table.name) else {
            diff.missing_tables.push(table.name.clone());
            continue;
        };
        for column in &table.columns {
            match live_columns.get(&column.name) {
                None => diff
                    .missing_columns
                    .push(format!("{}.{}", table.name, column.name)),
                Some(data_type) if !column.ty.accepts(data_type) => {
                    diff.type_mismatches.push(TypeMismatch {
                        column: format!("{}.{}", table.name, column.name),
                        expected: column.ty,
                        actual: data_type.clone(),
                    });
                },
                Some(_) => {},
            }
        }
    }
    diff
}
