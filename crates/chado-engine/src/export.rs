//! Exporter
//!
//! Runs schema-aware queries and streams results into an external
//! representation. Exports can be arbitrarily large, so rows are fetched
//! incrementally from a server-side cursor inside one transaction rather
//! than materialized; the produced sequence is finite, not restartable,
//! and releases the cursor when dropped or closed early.

use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use sqlx::postgres::PgRow;
use sqlx::{Acquire, PgConnection, Postgres, Transaction};

use crate::error::{EngineError, EngineResult};
use crate::query::{bind_param, ParamValue, QueryTemplate};
use crate::record::{self, Record};
use crate::schema::TableDescriptor;

const CURSOR_NAME: &str = "chado_export_cursor";
const FETCH_SIZE: usize = 500;

/// Open a streaming export for a query template.
///
/// Parameters are validated against the template's declared types before
/// anything touches the connection, failing fast with
/// [`EngineError::InvalidParameter`]. The returned stream is bound to one
/// cursor in one transaction on `conn`; dropping it (or calling
/// [`RecordStream::close`]) releases the cursor without completing the
/// remaining rows.
pub async fn export<'c>(
    template: &QueryTemplate,
    params: &BTreeMap<String, ParamValue>,
    conn: &'c mut PgConnection,
) -> EngineResult<RecordStream<'c>> {
    let binds = template.validate_params(params)?;
    let sql = template.to_sql(None);
    let shape = template.result_shape();

    let mut tx = conn.begin().await?;
    let declare = format!("DECLARE {} NO SCROLL CURSOR FOR {}", CURSOR_NAME, sql);
    let mut query = sqlx::query(&declare);
    for value in &binds {
        query = bind_param(query, value);
    }
    query.execute(&mut *tx).await?;

    tracing::debug!(template = %template.name(), "Export cursor opened");

    let state = CursorState {
        tx: Some(tx),
        buffer: VecDeque::new(),
        done: false,
    };
    let inner = futures::stream::try_unfold(state, |state| fetch_next(state)).boxed();
    Ok(RecordStream {
        inner: Some(inner),
        shape,
    })
}

struct CursorState<'c> {
    tx: Option<Transaction<'c, Postgres>>,
    buffer: VecDeque<PgRow>,
    done: bool,
}

async fn fetch_next(
    mut state: CursorState<'_>,
) -> Result<Option<(PgRow, CursorState<'_>)>, sqlx::Error> {
    loop {
        if let Some(row) = state.buffer.pop_front() {
            return Ok(Some((row, state)));
        }
        if state.done {
            // Exhausted: the transaction was read-only, committing simply
            // releases the cursor and the connection's transaction state.
            if let Some(tx) = state.tx.take() {
                tx.commit().await?;
            }
            return Ok(None);
        }
        let Some(tx) = state.tx.as_mut() else {
            return Ok(None);
        };
        let fetch = format!("FETCH FORWARD {} FROM {}", FETCH_SIZE, CURSOR_NAME);
        let rows = sqlx::query(&fetch).fetch_all(&mut **tx).await?;
        if rows.len() < FETCH_SIZE {
            state.done = true;
        }
        state.buffer.extend(rows);
    }
}

/// A finite, non-restartable sequence of exported records bound to one
/// cursor; see [`export`].
pub struct RecordStream<'c> {
    inner: Option<BoxStream<'c, Result<PgRow, sqlx::Error>>>,
    shape: TableDescriptor,
}

impl RecordStream<'_> {
    /// Output column names, in projection order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.shape.columns.iter().map(|c| c.name.as_str())
    }

    /// Abandon the export early, releasing the cursor and transaction.
    pub fn close(&mut self) {
        self.inner = None;
    }
}

impl Stream for RecordStream<'_> {
    type Item = EngineResult<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => {
                Poll::Ready(Some(record::from_row(&this.shape, &row)))
            },
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(EngineError::Sqlx(err)))),
            Poll::Ready(None) => {
                this.inner = None;
                Poll::Ready(None)
            },
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Drain a record stream into delimited text, returning the row count.
///
/// Writes an optional header row naming the columns, then one line per
/// record in the stream's column order.
pub async fn write_delimited<W: Write>(
    stream: &mut RecordStream<'_>,
    writer: &mut W,
    delimiter: char,
    include_header: bool,
) -> EngineResult<u64> {
    let columns: Vec<String> = stream.columns().map(str::to_string).collect();
    let separator = delimiter.to_string();

    if include_header {
        writeln!(writer, "{}", columns.join(&separator))?;
    }

    let mut count = 0u64;
    while let Some(record) = stream.next().await {
        let record = record?;
        writeln!(writer, "{}", render_line(&record, &columns, &separator))?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

fn render_line(record: &Record, columns: &[String], separator: &str) -> String {
    let fields: Vec<String> = columns
        .iter()
        .map(|column| {
            record
                .get(column)
                .map(|value| value.to_string())
                .unwrap_or_default()
        })
        .collect();
    fields.join(separator)
}
