// ABOUTME: Status command - prints the stored watermark for each tracked relation

use anyhow::Result;

use super::run::{log_relation, tracked_pairs};
use crate::config::Settings;
use crate::postgres;
use crate::schema;
use crate::watermark;

/// Show the recorded watermark for every tracked relation.
pub async fn status(settings: &Settings) -> Result<()> {
    let log = log_relation()?;
    let client = postgres::connect(settings, &log.db).await?;
    schema::ensure_table_exists(&client, &log, &watermark::log_table_columns(), None).await?;

    for pair in tracked_pairs()? {
        match watermark::last_loaded_at(&client, &pair.target, &log).await? {
            Some(ts) => println!("{}: last copied {}", pair.target, ts),
            None => println!("{}: never copied", pair.target),
        }
    }

    Ok(())
}
