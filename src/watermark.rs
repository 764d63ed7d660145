// ABOUTME: Watermark store - a log table tracking the last successful copy per relation
// ABOUTME: Replace-not-update semantics: one row per relation, DELETE then INSERT

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio_postgres::Client;

use crate::relation::{Column, Relation};

/// Column set for the watermark log table. The log is provisioned through
/// the ordinary provisioner with no key column, so it carries no uniqueness
/// constraint of its own; [`record_load`] keeps it at one row per relation.
pub fn log_table_columns() -> Vec<Column> {
    vec![
        Column::new("schema_name", "TEXT"),
        Column::new("relation_name", "TEXT"),
        Column::new("loaded", "TIMESTAMPTZ"),
    ]
}

/// The instant `rel` was last successfully copied, or `None` if it has never
/// been copied (meaning: copy everything).
pub async fn last_loaded_at(
    client: &Client,
    rel: &Relation,
    log: &Relation,
) -> Result<Option<DateTime<Utc>>> {
    let row = client
        .query_opt(&select_sql(log), &[&rel.schema, &rel.name])
        .await
        .with_context(|| format!("Failed to read watermark for {}", rel))?;
    Ok(row.map(|r| r.get(0)))
}

/// Record `loaded_at` as the new watermark for `rel`, replacing any prior
/// record.
///
/// Two autocommitted statements, not one transaction: a crash between them
/// loses the watermark and the next run copies from the epoch again. That is
/// tolerable only because the copy path suppresses duplicate keys.
pub async fn record_load(
    client: &Client,
    rel: &Relation,
    log: &Relation,
    loaded_at: DateTime<Utc>,
) -> Result<()> {
    client
        .execute(&delete_sql(log), &[&rel.schema, &rel.name])
        .await
        .with_context(|| format!("Failed to clear watermark for {}", rel))?;

    client
        .execute(&insert_sql(log), &[&rel.schema, &rel.name, &loaded_at])
        .await
        .with_context(|| format!("Failed to record watermark for {}", rel))?;

    Ok(())
}

fn select_sql(log: &Relation) -> String {
    format!(
        "SELECT loaded FROM {} WHERE schema_name = $1 AND relation_name = $2",
        log.qualified()
    )
}

fn delete_sql(log: &Relation) -> String {
    format!(
        "DELETE FROM {} WHERE schema_name = $1 AND relation_name = $2",
        log.qualified()
    )
}

fn insert_sql(log: &Relation) -> String {
    format!(
        "INSERT INTO {} (schema_name, relation_name, loaded) VALUES ($1, $2, $3)",
        log.qualified()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> Relation {
        Relation::new("target", "public", "etl_runs").unwrap()
    }

    #[test]
    fn test_log_table_columns() {
        let columns = log_table_columns();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0], Column::new("schema_name", "TEXT"));
        assert_eq!(columns[1], Column::new("relation_name", "TEXT"));
        assert_eq!(columns[2], Column::new("loaded", "TIMESTAMPTZ"));
    }

    #[test]
    fn test_select_sql() {
        assert_eq!(
            select_sql(&log()),
            "SELECT loaded FROM \"public\".\"etl_runs\" \
             WHERE schema_name = $1 AND relation_name = $2"
        );
    }

    #[test]
    fn test_delete_sql() {
        assert_eq!(
            delete_sql(&log()),
            "DELETE FROM \"public\".\"etl_runs\" \
             WHERE schema_name = $1 AND relation_name = $2"
        );
    }

    #[test]
    fn test_insert_sql() {
        assert_eq!(
            insert_sql(&log()),
            "INSERT INTO \"public\".\"etl_runs\" \
             (schema_name, relation_name, loaded) VALUES ($1, $2, $3)"
        );
    }
}
