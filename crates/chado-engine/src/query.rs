//! Query engine
//!
//! Named, parameterized, schema-validated join templates with stable
//! pagination. A template declares an anchor table, joins ordered outward
//! from the anchor by foreign-key distance, typed filter parameters and a
//! projection; once registered it is immutable.
//!
//! Pagination orders by the anchor table's primary key, so fixed-size
//! pages never duplicate or skip rows even under concurrent writes to
//! unrelated rows.

use std::collections::{BTreeMap, BTreeSet};

use chado_common::Pagination;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgConnection, Postgres};

use crate::error::{EngineError, EngineResult};
use crate::record::{self, Record};
use crate::schema::{ColumnDescriptor, ColumnType, SchemaDescriptor, TableDescriptor};

/// Largest page size `run` will serve in one call.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Declared type of a template parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Text,
    Integer,
    Boolean,
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamType::Text => "text",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        };
        write!(f, "{}", name)
    }
}

/// A parameter value supplied at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl ParamValue {
    fn matches(&self, ty: ParamType) -> bool {
        matches!(
            (self, ty),
            (ParamValue::Text(_), ParamType::Text)
                | (ParamValue::Integer(_), ParamType::Integer)
                | (ParamValue::Boolean(_), ParamType::Boolean)
        )
    }
}

/// One join edge: `from` must reference an already-joined table, `to` the
/// newly joined one (or the reverse); both are `table.column` qualified.
#[derive(Debug, Clone)]
pub struct Join {
    pub table: String,
    pub from: String,
    pub to: String,
}

/// One equality filter: SQL expression on the left, named typed parameter
/// on the right.
#[derive(Debug, Clone)]
pub struct Filter {
    pub expr: String,
    pub param: String,
    pub ty: ParamType,
}

/// One projected output column.
#[derive(Debug, Clone)]
pub struct ProjectedColumn {
    pub expr: String,
    pub alias: String,
    pub ty: ColumnType,
}

/// A named, parameterized join specification; immutable once registered.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    name: String,
    anchor: String,
    joins: Vec<Join>,
    filters: Vec<Filter>,
    projection: Vec<ProjectedColumn>,
    order_by: Vec<String>,
}

impl QueryTemplate {
    pub fn builder(name: &str, anchor: &str) -> QueryTemplateBuilder {
        QueryTemplateBuilder {
            template: QueryTemplate {
                name: name.to_string(),
                anchor: anchor.to_string(),
                joins: Vec::new(),
                filters: Vec::new(),
                projection: Vec::new(),
                order_by: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    /// Declared parameters, in placeholder order.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, ParamType)> {
        self.filters.iter().map(|f| (f.param.as_str(), f.ty))
    }

    /// Check parameters against the declared filters, returning the values
    /// in placeholder order. Fails fast with
    /// [`EngineError::InvalidParameter`] on a missing parameter, an unknown
    /// name, or a type mismatch.
    pub fn validate_params(
        &self,
        params: &BTreeMap<String, ParamValue>,
    ) -> EngineResult<Vec<ParamValue>> {
        for name in params.keys() {
            if !self.filters.iter().any(|f| &f.param == name) {
                return Err(EngineError::invalid_parameter(
                    name.clone(),
                    format!("template '{}' declares no such parameter", self.name),
                ));
            }
        }

        let mut ordered = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            let value = params.get(&filter.param).ok_or_else(|| {
                EngineError::invalid_parameter(filter.param.clone(), "parameter is required")
            })?;
            if !value.matches(filter.ty) {
                return Err(EngineError::invalid_parameter(
                    filter.param.clone(),
                    format!("expected {}", filter.ty),
                ));
            }
            ordered.push(value.clone());
        }
        Ok(ordered)
    }

    /// Render the template to SQL with numbered placeholders in filter
    /// order, optionally paginated.
    pub fn to_sql(&self, page: Option<Pagination>) -> String {
        let projection: Vec<String> = self
            .projection
            .iter()
            .map(|p| format!("{} AS {}", p.expr, p.alias))
            .collect();

        let mut sql = format!("SELECT {} FROM {}", projection.join(", "), self.anchor);
        for join in &self.joins {
            sql.push_str(&format!(
                " JOIN {} ON {} = {}",
                join.table, join.from, join.to
            ));
        }
        for (i, filter) in self.filters.iter().enumerate() {
            let keyword = if i == 0 { "WHERE" } else { "AND" };
            sql.push_str(&format!(" {} {} = ${}", keyword, filter.expr, i + 1));
        }
        sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
        if let Some(page) = page {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit, page.offset));
        }
        sql
    }

    /// Shape of the result rows, for mapping backend rows to [`Record`]s.
    pub fn result_shape(&self) -> TableDescriptor {
        TableDescriptor {
            name: self.name.clone(),
            columns: self
                .projection
                .iter()
                .map(|p| ColumnDescriptor {
                    name: p.alias.clone(),
                    ty: p.ty,
                    nullable: true,
                    has_default: false,
                })
                .collect(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Validate the template against a schema descriptor and resolve the
    /// pagination ordering key from the anchor's primary key.
    fn resolve(&mut self, descriptor: &SchemaDescriptor) -> EngineResult<()> {
        let anchor = descriptor.describe(&self.anchor)?;

        let mut joined: BTreeSet<&str> = BTreeSet::new();
        joined.insert(self.anchor.as_str());
        for join in &self.joins {
            descriptor.describe(&join.table)?;
            let (from_table, from_column) = split_qualified(&self.name, &join.from)?;
            let (to_table, to_column) = split_qualified(&self.name, &join.to)?;

            // One side is already joined, the other is the new table; the
            // declared order therefore walks outward from the anchor.
            let connects = (joined.contains(from_table) && to_table == join.table)
                || (joined.contains(to_table) && from_table == join.table);
            if !connects {
                return Err(EngineError::config(format!(
                    "template '{}': join on '{}' does not connect to the tables joined so far",
                    self.name, join.table
                )));
            }
            for (table, column) in [(from_table, from_column), (to_table, to_column)] {
                if descriptor.describe(table)?.column(column).is_none() {
                    return Err(EngineError::config(format!(
                        "template '{}': no column '{}.{}'",
                        self.name, table, column
                    )));
                }
            }
            joined.insert(join.table.as_str());
        }

        let mut params = BTreeSet::new();
        for filter in &self.filters {
            if !params.insert(filter.param.as_str()) {
                return Err(EngineError::config(format!(
                    "template '{}': duplicate parameter '{}'",
                    self.name, filter.param
                )));
            }
        }

        self.order_by = anchor
            .primary_key
            .iter()
            .map(|pk| format!("{}.{}", self.anchor, pk))
            .collect();
        if self.order_by.is_empty() {
            return Err(EngineError::config(format!(
                "template '{}': anchor table '{}' has no primary key to order by",
                self.name, self.anchor
            )));
        }
        Ok(())
    }
}

fn split_qualified<'a>(template: &str, qualified: &'a str) -> EngineResult<(&'a str, &'a str)> {
    qualified.split_once('.').ok_or_else(|| {
        EngineError::config(format!(
            "template '{}': '{}' is not table.column qualified",
            template, qualified
        ))
    })
}

/// Builder for [`QueryTemplate`].
pub struct QueryTemplateBuilder {
    template: QueryTemplate,
}

impl QueryTemplateBuilder {
    pub fn join(mut self, table: &str, from: &str, to: &str) -> Self {
        self.template.joins.push(Join {
            table: table.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    pub fn filter(mut self, expr: &str, param: &str, ty: ParamType) -> Self {
        self.template.filters.push(Filter {
            expr: expr.to_string(),
            param: param.to_string(),
            ty,
        });
        self
    }

    pub fn project(mut self, expr: &str, alias: &str, ty: ColumnType) -> Self {
        self.template.projection.push(ProjectedColumn {
            expr: expr.to_string(),
            alias: alias.to_string(),
            ty,
        });
        self
    }

    pub fn build(self) -> QueryTemplate {
        self.template
    }
}

/// Bind a parameter value as the next placeholder.
pub(crate) fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &ParamValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        ParamValue::Text(s) => query.bind(s.clone()),
        ParamValue::Integer(v) => query.bind(*v),
        ParamValue::Boolean(v) => query.bind(*v),
    }
}

/// Registry and executor for query templates.
pub struct QueryEngine {
    descriptor: SchemaDescriptor,
    templates: BTreeMap<String, QueryTemplate>,
}

impl QueryEngine {
    /// An engine with no registered templates.
    pub fn new(descriptor: &SchemaDescriptor) -> Self {
        Self {
            descriptor: descriptor.clone(),
            templates: BTreeMap::new(),
        }
    }

    /// An engine preloaded with the built-in template catalog.
    pub fn with_builtins(descriptor: &SchemaDescriptor) -> EngineResult<Self> {
        let mut engine = Self::new(descriptor);
        for template in builtin_templates() {
            engine.register(template)?;
        }
        Ok(engine)
    }

    /// Register a template; fails with [`EngineError::DuplicateTemplate`]
    /// if the name is taken, and validates joins and ordering against the
    /// schema descriptor.
    pub fn register(&mut self, mut template: QueryTemplate) -> EngineResult<()> {
        if self.templates.contains_key(template.name()) {
            return Err(EngineError::DuplicateTemplate(template.name().to_string()));
        }
        template.resolve(&self.descriptor)?;
        tracing::debug!(template = %template.name(), "Registered query template");
        self.templates.insert(template.name().to_string(), template);
        Ok(())
    }

    pub fn template(&self, name: &str) -> EngineResult<&QueryTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| EngineError::UnknownTemplate(name.to_string()))
    }

    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(|k| k.as_str())
    }

    /// Run a registered template with the given parameters and page.
    ///
    /// Joins are applied in the template's declared order, parameters are
    /// validated before execution, and rows are ordered by the anchor
    /// table's primary key.
    pub async fn run(
        &self,
        name: &str,
        params: &BTreeMap<String, ParamValue>,
        conn: &mut PgConnection,
        page: Pagination,
    ) -> EngineResult<Vec<Record>> {
        let template = self.template(name)?;
        let binds = template.validate_params(params)?;
        let sql = template.to_sql(Some(page.clamped(MAX_PAGE_SIZE)));

        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = bind_param(query, value);
        }
        let rows = query.fetch_all(&mut *conn).await?;

        let shape = template.result_shape();
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(record::from_row(&shape, row)?);
        }
        tracing::debug!(template = %name, rows = records.len(), "Query executed");
        Ok(records)
    }
}

/// The pre-compiled query catalog shipped with the tool.
pub fn builtin_templates() -> Vec<QueryTemplate> {
    vec![
        QueryTemplate::builder("organisms", "organism")
            .project("organism.genus", "genus", ColumnType::Text)
            .project("organism.species", "species", ColumnType::Text)
            .project("organism.abbreviation", "abbreviation", ColumnType::Text)
            .project("organism.common_name", "common_name", ColumnType::Text)
            .build(),
        QueryTemplate::builder("features_by_organism", "feature")
            .join("organism", "feature.organism_id", "organism.organism_id")
            .join("cvterm", "feature.type_id", "cvterm.cvterm_id")
            .filter(
                "organism.genus || ' ' || organism.species",
                "organism",
                ParamType::Text,
            )
            .project("feature.uniquename", "uniquename", ColumnType::Text)
            .project("feature.name", "name", ColumnType::Text)
            .project("cvterm.name", "feature_type", ColumnType::Text)
            .project("feature.seqlen", "seqlen", ColumnType::Integer)
            .build(),
        QueryTemplate::builder("cvterms_by_vocabulary", "cvterm")
            .join("cv", "cvterm.cv_id", "cv.cv_id")
            .join("dbxref", "cvterm.dbxref_id", "dbxref.dbxref_id")
            .join("db", "dbxref.db_id", "db.db_id")
            .filter("cv.name", "vocabulary", ParamType::Text)
            .project("cvterm.name", "term", ColumnType::Text)
            .project("cv.name", "vocabulary", ColumnType::Text)
            .project(
                "db.name || ':' || dbxref.accession",
                "accession",
                ColumnType::Text,
            )
            .project("cvterm.is_obsolete", "is_obsolete", ColumnType::Integer)
            .build(),
    ]
}
