// ABOUTME: Range copier - moves rows whose cursor column falls past the watermark
// ABOUTME: Fetches the full source result set and re-inserts it row by row on the target

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use crate::config::Settings;
use crate::postgres;
use crate::relation::{quote_ident, validate_identifier, Relation};

/// Outcome of one table copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyStats {
    /// Rows the range select returned.
    pub fetched: u64,
    /// Rows actually written to the target.
    pub inserted: u64,
    /// Rows suppressed by ON CONFLICT because the key already existed.
    pub skipped: u64,
}

/// Copy every source row whose `cursor_column` falls on or after `since` into
/// `target`, suppressing rows whose `key_column` value already exists there.
///
/// A `None` watermark leaves the range unbounded below, so the whole table is
/// copied. The full result set is held in memory before inserting; that
/// bounds this copier to modest table sizes.
pub async fn copy_rows(
    settings: &Settings,
    source: &Relation,
    target: &Relation,
    key_column: &str,
    cursor_column: &str,
    since: Option<DateTime<Utc>>,
) -> Result<CopyStats> {
    validate_identifier(key_column)?;
    validate_identifier(cursor_column)?;

    let source_client = postgres::connect(settings, &source.db).await?;
    let select = build_range_select(source, cursor_column);
    let lower: Option<NaiveDate> = since.map(|t| t.date_naive());
    let rows = source_client
        .query(&select, &[&lower])
        .await
        .with_context(|| format!("Failed to read rows from {}", source))?;
    drop(source_client);

    let mut stats = CopyStats {
        fetched: rows.len() as u64,
        ..Default::default()
    };
    if rows.is_empty() {
        return Ok(stats);
    }

    // The insert uses the exact column list the select returned, order
    // preserved; the target is assumed to have been provisioned from the
    // same catalog.
    let column_names: Vec<&str> = rows[0].columns().iter().map(|c| c.name()).collect();
    for name in &column_names {
        validate_identifier(name)?;
    }
    let insert = build_insert(target, &column_names, key_column);

    let target_client = postgres::connect(settings, &target.db).await?;
    let statement = target_client
        .prepare(&insert)
        .await
        .with_context(|| format!("Failed to prepare insert into {}", target))?;
    for row in &rows {
        let values = row_values(row)?;
        let params: Vec<&(dyn ToSql + Sync)> = values
            .iter()
            .map(|v| v.as_ref() as &(dyn ToSql + Sync))
            .collect();
        let affected = target_client
            .execute(&statement, &params)
            .await
            .with_context(|| format!("Failed to insert row into {}", target))?;
        if affected == 0 {
            stats.skipped += 1;
        } else {
            stats.inserted += 1;
        }
    }

    Ok(stats)
}

/// The watermark can be null; DATERANGE treats a NULL bound as "no limit",
/// which turns an absent watermark into "copy everything".
fn build_range_select(source: &Relation, cursor_column: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} <@ DATERANGE($1::DATE, NULL, '[)')",
        source.qualified(),
        quote_ident(cursor_column)
    )
}

fn build_insert(target: &Relation, columns: &[&str], key_column: &str) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
        target.qualified(),
        column_list,
        placeholders,
        quote_ident(key_column)
    )
}

/// Pull every value out of a fetched row as a boxed `ToSql`, dispatching on
/// the wire type of each result column. Nullability is preserved by reading
/// everything through `Option`.
fn row_values(row: &Row) -> Result<Vec<Box<dyn ToSql + Sync + Send>>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| -> Result<Box<dyn ToSql + Sync + Send>> {
            Ok(match col.type_().name() {
                "int2" => Box::new(row.get::<_, Option<i16>>(idx)),
                "int4" => Box::new(row.get::<_, Option<i32>>(idx)),
                "int8" => Box::new(row.get::<_, Option<i64>>(idx)),
                "float4" => Box::new(row.get::<_, Option<f32>>(idx)),
                "float8" => Box::new(row.get::<_, Option<f64>>(idx)),
                "bool" => Box::new(row.get::<_, Option<bool>>(idx)),
                "text" | "varchar" | "bpchar" | "name" => {
                    Box::new(row.get::<_, Option<String>>(idx))
                }
                "uuid" => Box::new(row.get::<_, Option<uuid::Uuid>>(idx)),
                "date" => Box::new(row.get::<_, Option<NaiveDate>>(idx)),
                "timestamp" => Box::new(row.get::<_, Option<NaiveDateTime>>(idx)),
                "timestamptz" => Box::new(row.get::<_, Option<DateTime<Utc>>>(idx)),
                "json" | "jsonb" => Box::new(row.get::<_, Option<serde_json::Value>>(idx)),
                "bytea" => Box::new(row.get::<_, Option<Vec<u8>>>(idx)),
                "numeric" => Box::new(row.get::<_, Option<rust_decimal::Decimal>>(idx)),
                other => bail!(
                    "Unsupported column type {} for column \"{}\"",
                    other,
                    col.name()
                ),
            })
        })
        .collect()
}
