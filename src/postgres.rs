// ABOUTME: Per-operation PostgreSQL connections
// ABOUTME: Each logical step opens its own client and drops it when done

use anyhow::{Context, Result};
use tokio_postgres::{Client, NoTls};

use crate::config::Settings;

/// Open a connection to the named logical database.
///
/// Every logical operation (introspect, provision, watermark read, copy,
/// watermark write) opens its own connection and drops it at the end of the
/// operation. Dropping the client tears down the spawned connection task, so
/// the connection is released on every exit path, error or not. Statements
/// are autocommitted; there is no cross-operation transaction.
pub async fn connect(settings: &Settings, dbname: &str) -> Result<Client> {
    let config = settings.pg_config(dbname);
    let (client, connection) = config
        .connect(NoTls)
        .await
        .with_context(|| format!("Failed to connect to database \"{}\"", dbname))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Database connection error: {}", e);
        }
    });

    Ok(client)
}
