// ABOUTME: Schema introspection and idempotent provisioning
// ABOUTME: Reads column metadata from the catalog and mirrors it with CREATE TABLE IF NOT EXISTS

use anyhow::{bail, Context, Result};
use tokio_postgres::Client;

use crate::relation::{quote_ident, validate_identifier, Column, Relation};

/// Read the column list for a table from `information_schema.columns`.
///
/// Columns come back in ordinal order, exactly as the catalog reports them.
/// No filtering; a table with no columns (or no table at all) yields an
/// empty list, which the provisioner rejects.
pub async fn table_columns(client: &Client, rel: &Relation) -> Result<Vec<Column>> {
    let rows = client
        .query(
            "SELECT column_name, data_type
             FROM information_schema.columns
             WHERE table_schema = $1 AND table_name = $2
             ORDER BY ordinal_position",
            &[&rel.schema, &rel.name],
        )
        .await
        .with_context(|| format!("Failed to get columns for {}", rel))?;

    Ok(rows
        .iter()
        .map(|row| {
            let name: String = row.get(0);
            let data_type: String = row.get(1);
            Column { name, data_type }
        })
        .collect())
}

/// Create `rel` if it does not exist, one definition per column, with a
/// UNIQUE constraint on the column named by `key` (at most one; none when
/// `key` is `None`).
///
/// Safe to call every run. An existing table is left untouched, so later
/// schema changes on the source are not mirrored here.
pub async fn ensure_table_exists(
    client: &Client,
    rel: &Relation,
    columns: &[Column],
    key: Option<&str>,
) -> Result<()> {
    let ddl = build_create_table(rel, columns, key)?;
    client
        .batch_execute(&ddl)
        .await
        .with_context(|| format!("Failed to provision {}", rel))?;
    Ok(())
}

fn build_create_table(rel: &Relation, columns: &[Column], key: Option<&str>) -> Result<String> {
    if columns.is_empty() {
        bail!("No columns found for {}; does the source table exist?", rel);
    }

    let mut defs = Vec::with_capacity(columns.len());
    for col in columns {
        validate_identifier(&col.name)?;
        validate_type_name(&col.data_type)?;
        let unique = if key == Some(col.name.as_str()) {
            " UNIQUE"
        } else {
            ""
        };
        defs.push(format!(
            "{} {}{}",
            quote_ident(&col.name),
            col.data_type,
            unique
        ));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        rel.qualified(),
        defs.join(", ")
    ))
}

/// Declared types are interpolated verbatim into DDL. They only ever come
/// from catalog introspection or our own log-table definition, but they still
/// must stay inside the shape of a SQL type name.
fn validate_type_name(data_type: &str) -> Result<()> {
    if data_type.is_empty() {
        bail!("Column type cannot be empty");
    }
    for c in data_type.chars() {
        if !c.is_ascii_alphanumeric() && !" _(),[]".contains(c) {
            bail!("Column type '{}' contains invalid character '{}'", data_type, c);
        }
    }
    Ok(())
}
