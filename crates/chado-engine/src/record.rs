//! Record mapping
//!
//! Translates between external tabular representations (delimited text with
//! a header row) and typed row representations bound to schema tables, in
//! both directions.
//!
//! Mapping is lazy: [`DelimitedMapper::to_records`] validates the header
//! eagerly but coerces data rows one at a time, stopping at the first row
//! whose required columns are missing or whose values fail coercion.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row};

use crate::error::{EngineError, EngineResult};
use crate::schema::{ColumnDescriptor, ColumnType, TableDescriptor};

/// Marker for SQL NULL in delimited input, alongside the empty string.
const NULL_TOKEN: &str = "\\N";

/// A typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i32),
    BigInt(i64),
    Double(f64),
    Boolean(bool),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    /// Delimited-text rendering; the inverse of input coercion for every
    /// non-lossy type.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Boolean(true) => write!(f, "t"),
            Value::Boolean(false) => write!(f, "f"),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// A mapping from column name to typed value, bound to one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    table: String,
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Maps delimited tabular text with a header row to [`Record`]s.
#[derive(Debug, Clone, Copy)]
pub struct DelimitedMapper {
    delimiter: char,
}

impl Default for DelimitedMapper {
    fn default() -> Self {
        Self { delimiter: '\t' }
    }
}

impl DelimitedMapper {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Produce a lazy, finite, restartable sequence of records for `table`
    /// from delimited `input`.
    ///
    /// The header row is validated eagerly: every header name must be a
    /// column of `table`, and every required column of `table` (non-nullable
    /// without a backend default) must appear. Data rows are coerced on
    /// iteration; the first bad row ends the sequence with
    /// [`EngineError::MalformedInput`] naming the offending row and column.
    ///
    /// Foreign-key columns accept either a surrogate key (integer) or a
    /// natural key (text), which the importer later resolves against the
    /// referenced table.
    pub fn to_records<'a>(
        &self,
        table: &'a TableDescriptor,
        input: &'a str,
    ) -> EngineResult<RecordIter<'a>> {
        let mut lines = input.lines();
        let header_line = lines
            .next()
            .ok_or_else(|| EngineError::malformed(1, table.name.clone(), "input is empty"))?;

        let mut header = Vec::new();
        for name in header_line.split(self.delimiter).map(str::trim) {
            let column = table.column(name).ok_or_else(|| {
                EngineError::malformed(
                    1,
                    name,
                    format!("not a column of table '{}'", table.name),
                )
            })?;
            header.push(column);
        }

        for required in table.required_columns() {
            if !header.iter().any(|c| c.name == required.name) {
                return Err(EngineError::malformed(
                    1,
                    required.name.clone(),
                    "required column missing from header",
                ));
            }
        }

        let mut body = &input[header_line.len()..];
        body = body.strip_prefix('\r').unwrap_or(body);
        body = body.strip_prefix('\n').unwrap_or(body);
        Ok(RecordIter {
            table,
            header,
            delimiter: self.delimiter,
            body,
            lines: body.lines().enumerate(),
            failed: false,
        })
    }
}

/// Lazy iterator over mapped records; see [`DelimitedMapper::to_records`].
///
/// Restartable: [`RecordIter::restart`] rewinds to the first data row, and
/// the iterator is `Clone` at any position.
#[derive(Clone)]
pub struct RecordIter<'a> {
    table: &'a TableDescriptor,
    header: Vec<&'a ColumnDescriptor>,
    delimiter: char,
    body: &'a str,
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    failed: bool,
}

impl<'a> RecordIter<'a> {
    /// Rewind to the first data row.
    pub fn restart(&mut self) {
        self.lines = self.body.lines().enumerate();
        self.failed = false;
    }

    fn map_line(&self, line_index: usize, line: &str) -> EngineResult<Record> {
        // Line numbers are 1-based over the whole input; the header is
        // line 1 and the first data row is line 2.
        let row = line_index + 2;
        let fields: Vec<&str> = line.split(self.delimiter).map(str::trim).collect();

        if fields.len() != self.header.len() {
            let column = if fields.len() < self.header.len() {
                self.header[fields.len()].name.clone()
            } else {
                // Excess fields have no header name; blame the last column.
                self.header[self.header.len() - 1].name.clone()
            };
            return Err(EngineError::malformed(
                row,
                column,
                format!(
                    "expected {} fields, got {}",
                    self.header.len(),
                    fields.len()
                ),
            ));
        }

        let mut record = Record::new(self.table.name.clone());
        for (column, raw) in self.header.iter().zip(fields) {
            if raw.is_empty() || raw == NULL_TOKEN {
                if column.required() {
                    return Err(EngineError::malformed(
                        row,
                        column.name.clone(),
                        "required column is empty",
                    ));
                }
                // Absent value: the backend default or NULL applies.
                continue;
            }

            let is_fk = self.table.foreign_key_for(&column.name).is_some();
            let value = coerce(raw, column.ty, is_fk)
                .map_err(|reason| EngineError::malformed(row, column.name.clone(), reason))?;
            record.set(column.name.clone(), value);
        }
        Ok(record)
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = EngineResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let (index, line) = self.lines.next()?;
            if line.trim().is_empty() {
                continue;
            }
            let result = self.map_line(index, line);
            if result.is_err() {
                self.failed = true;
            }
            return Some(result);
        }
    }
}

/// Coerce one raw field to the column's semantic type.
///
/// A foreign-key column whose value does not parse as a key is kept as
/// text: it is a natural key for the importer to resolve.
fn coerce(raw: &str, ty: ColumnType, is_fk: bool) -> Result<Value, String> {
    match ty {
        ColumnType::Integer => match raw.parse::<i32>() {
            Ok(v) => Ok(Value::Integer(v)),
            Err(_) if is_fk => Ok(Value::Text(raw.to_string())),
            Err(_) => Err(format!("'{}' is not an integer", raw)),
        },
        ColumnType::BigInt => match raw.parse::<i64>() {
            Ok(v) => Ok(Value::BigInt(v)),
            Err(_) if is_fk => Ok(Value::Text(raw.to_string())),
            Err(_) => Err(format!("'{}' is not a bigint", raw)),
        },
        ColumnType::Double => raw
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| format!("'{}' is not a number", raw)),
        ColumnType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "t" | "true" | "1" => Ok(Value::Boolean(true)),
            "f" | "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err(format!("'{}' is not a boolean", raw)),
        },
        ColumnType::Text => Ok(Value::Text(raw.to_string())),
        ColumnType::Timestamp => parse_timestamp(raw)
            .map(Value::Timestamp)
            .ok_or_else(|| format!("'{}' is not a timestamp", raw)),
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Map a backend row to a [`Record`] for the given table shape.
///
/// Columns of `table` absent from the row are skipped, so the same shape
/// serves both full-table rows and projections. Fails with
/// [`EngineError::TypeCoercionError`] for backend values that do not
/// convert to the declared column type.
pub fn from_row(table: &TableDescriptor, row: &PgRow) -> EngineResult<Record> {
    let mut record = Record::new(table.name.clone());
    for column in &table.columns {
        let name = column.name.as_str();
        if !row.columns().iter().any(|c| c.name() == name) {
            continue;
        }
        let value = decode_column(row, name, column.ty)?;
        record.set(name, value);
    }
    Ok(record)
}

fn decode_column(row: &PgRow, name: &str, ty: ColumnType) -> EngineResult<Value> {
    let coercion = |err: sqlx::Error| EngineError::coercion(name, ty.to_string(), err.to_string());
    let value = match ty {
        ColumnType::Integer => match row.try_get::<Option<i32>, _>(name) {
            Ok(v) => v.map(Value::Integer),
            // Fall back for int2 columns (e.g. featureloc.strand).
            Err(_) => row
                .try_get::<Option<i16>, _>(name)
                .map_err(coercion)?
                .map(|v| Value::Integer(v.into())),
        },
        ColumnType::BigInt => row
            .try_get::<Option<i64>, _>(name)
            .map_err(coercion)?
            .map(Value::BigInt),
        ColumnType::Double => row
            .try_get::<Option<f64>, _>(name)
            .map_err(coercion)?
            .map(Value::Double),
        ColumnType::Boolean => row
            .try_get::<Option<bool>, _>(name)
            .map_err(coercion)?
            .map(Value::Boolean),
        ColumnType::Text => row
            .try_get::<Option<String>, _>(name)
            .map_err(coercion)?
            .map(Value::Text),
        ColumnType::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(name)
            .map_err(coercion)?
            .map(Value::Timestamp),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Bind a [`Value`] as the next placeholder of a query, typing SQL NULLs
/// by the column's declared type so the backend can infer placeholders.
pub fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
    ty: ColumnType,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => match ty {
            ColumnType::Integer => query.bind(None::<i32>),
            ColumnType::BigInt => query.bind(None::<i64>),
            ColumnType::Double => query.bind(None::<f64>),
            ColumnType::Boolean => query.bind(None::<bool>),
            ColumnType::Text => query.bind(None::<String>),
            ColumnType::Timestamp => query.bind(None::<NaiveDateTime>),
        },
        Value::Integer(v) => query.bind(*v),
        Value::BigInt(v) => query.bind(*v),
        Value::Double(v) => query.bind(*v),
        Value::Boolean(v) => query.bind(*v),
        Value::Text(s) => query.bind(s.clone()),
        Value::Timestamp(t) => query.bind(*t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;

    fn organism() -> &'static TableDescriptor {
        SchemaRegistry::builtin().describe("organism").unwrap()
    }

    fn feature() -> &'static TableDescriptor {
        SchemaRegistry::builtin().describe("feature").unwrap()
    }

    #[test]
    fn test_to_records_maps_rows() {
        let input = "genus\tspecies\tabbreviation\n\
                     Homo\tsapiens\tHsapiens\n\
                     Drosophila\tmelanogaster\tDmel\n";
        let mapper = DelimitedMapper::default();
        let records: Vec<Record> = mapper
            .to_records(organism(), input)
            .unwrap()
            .collect::<EngineResult<_>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("genus"),
            Some(&Value::Text("Homo".to_string()))
        );
        assert_eq!(
            records[1].get("abbreviation"),
            Some(&Value::Text("Dmel".to_string()))
        );
    }

    #[test]
    fn test_header_rejects_unknown_column() {
        let input = "genus\tspecies\tnonsense\n";
        let result = DelimitedMapper::default().to_records(organism(), input);
        match result {
            Err(EngineError::MalformedInput { row, column, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "nonsense");
            },
            other => panic!("expected MalformedInput, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_header_requires_mandatory_columns() {
        // feature requires organism_id, uniquename and type_id.
        let input = "uniquename\ttype_id\n";
        let result = DelimitedMapper::default().to_records(feature(), input);
        match result {
            Err(EngineError::MalformedInput { column, .. }) => {
                assert_eq!(column, "organism_id");
            },
            other => panic!("expected MalformedInput, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_first_bad_row_stops_iteration() {
        let input = "uniquename\torganism_id\ttype_id\tseqlen\n\
                     gene1\t1\t2\t100\n\
                     gene2\t1\t2\tnot-a-number\n\
                     gene3\t1\t2\t300\n";
        let mut iter = DelimitedMapper::default().to_records(feature(), input).unwrap();

        assert!(iter.next().unwrap().is_ok());
        match iter.next().unwrap() {
            Err(EngineError::MalformedInput { row, column, .. }) => {
                assert_eq!(row, 3);
                assert_eq!(column, "seqlen");
            },
            other => panic!("expected MalformedInput, got {:?}", other.map(|_| ())),
        }
        // The sequence ends after the first failure.
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_fk_column_keeps_natural_key_as_text() {
        let input = "uniquename\torganism_id\ttype_id\n\
                     gene1\tDrosophila melanogaster\tgene\n";
        let records: Vec<Record> = DelimitedMapper::default()
            .to_records(feature(), input)
            .unwrap()
            .collect::<EngineResult<_>>()
            .unwrap();

        assert_eq!(
            records[0].get("organism_id"),
            Some(&Value::Text("Drosophila melanogaster".to_string()))
        );
        assert_eq!(records[0].get("type_id"), Some(&Value::Text("gene".to_string())));
    }

    #[test]
    fn test_fk_column_accepts_surrogate_key() {
        let input = "uniquename\torganism_id\ttype_id\ngene1\t7\t12\n";
        let records: Vec<Record> = DelimitedMapper::default()
            .to_records(feature(), input)
            .unwrap()
            .collect::<EngineResult<_>>()
            .unwrap();

        assert_eq!(records[0].get("organism_id"), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_empty_value_in_required_column() {
        let input = "genus\tspecies\nHomo\t\n";
        let mut iter = DelimitedMapper::default().to_records(organism(), input).unwrap();
        match iter.next().unwrap() {
            Err(EngineError::MalformedInput { row, column, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(column, "species");
            },
            other => panic!("expected MalformedInput, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_value_in_nullable_column_is_omitted() {
        let input = "genus\tspecies\tcommon_name\nHomo\tsapiens\t\n";
        let records: Vec<Record> = DelimitedMapper::default()
            .to_records(organism(), input)
            .unwrap()
            .collect::<EngineResult<_>>()
            .unwrap();
        assert!(!records[0].contains("common_name"));
    }

    #[test]
    fn test_restart_reproduces_the_sequence() {
        let input = "genus\tspecies\nHomo\tsapiens\nMus\tmusculus\n";
        let mut iter = DelimitedMapper::default().to_records(organism(), input).unwrap();

        let first: Vec<Record> = iter.by_ref().collect::<EngineResult<_>>().unwrap();
        iter.restart();
        let second: Vec<Record> = iter.collect::<EngineResult<_>>().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_value_display_round_trip() {
        let cases = [
            (Value::Integer(42), ColumnType::Integer),
            (Value::Boolean(true), ColumnType::Boolean),
            (Value::Text("AE014296".to_string()), ColumnType::Text),
            (
                Value::Timestamp(
                    NaiveDate::from_ymd_opt(2024, 3, 1)
                        .unwrap()
                        .and_hms_opt(12, 30, 0)
                        .unwrap(),
                ),
                ColumnType::Timestamp,
            ),
        ];
        for (value, ty) in cases {
            let rendered = value.to_string();
            let reparsed = coerce(&rendered, ty, false).unwrap();
            assert_eq!(reparsed, value);
        }
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_timestamp("2024-03-01 12:30:00").is_some());
        assert!(parse_timestamp("2024-03-01T12:30:00").is_some());
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
