//! LanceDB connection helpers and Arrow column accessors.

use anyhow::Result;
use arrow_array::{Array, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::{connect, Connection};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
	if table_exists(conn, name).await? {
		return Ok(());
	}
	// create empty table with 0 rows
	let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
	conn.create_table(name, Box::new(iter)).execute().await?;
	Ok(())
}

/// Escape a value for a single-quoted SQL string literal in `only_if` filters.
pub fn sql_quote(value: &str) -> String {
	format!("'{}'", value.replace('\'', "''"))
}

pub fn str_at(batch: &RecordBatch, column: &str, row: usize) -> Option<String> {
	let col = batch.column_by_name(column)?.as_any().downcast_ref::<StringArray>()?;
	(!col.is_null(row)).then(|| col.value(row).to_string())
}

pub fn i64_at(batch: &RecordBatch, column: &str, row: usize) -> Option<i64> {
	let col = batch.column_by_name(column)?.as_any().downcast_ref::<Int64Array>()?;
	(!col.is_null(row)).then(|| col.value(row))
}

pub fn f32_at(batch: &RecordBatch, column: &str, row: usize) -> Option<f32> {
	let col = batch.column_by_name(column)?.as_any().downcast_ref::<Float32Array>()?;
	(!col.is_null(row)).then(|| col.value(row))
}
