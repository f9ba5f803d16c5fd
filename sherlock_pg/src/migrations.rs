use anyhow::Context;
use diesel::prelude::*;
use diesel_async::{async_connection_wrapper::AsyncConnectionWrapper, AsyncPgConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use itertools::Itertools;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

/// The migration harness only drives synchronous connections
type SyncConnection = AsyncConnectionWrapper<AsyncPgConnection>;

/// Held while migrating so that two bots sharing a database don't both migrate it
const MIGRATION_LOCK_KEY: i64 = 0x536865726c6f636b;

fn advisory_lock(conn: &mut SyncConnection, function: &str) -> QueryResult<usize> {
    diesel::sql_query(format!("SELECT {function}({MIGRATION_LOCK_KEY})")).execute(conn)
}

/// Apply every pending migration, returning the versions applied
fn migrate(conn: &mut SyncConnection) -> anyhow::Result<Vec<String>> {
    advisory_lock(conn, "pg_advisory_lock").context("Couldn't take the migration lock")?;

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map(|versions| versions.iter().map(ToString::to_string).collect())
        .map_err(|error| anyhow::anyhow!("Database migrations failed: {error}"));

    advisory_lock(conn, "pg_advisory_unlock").context("Couldn't release the migration lock")?;
    applied
}

/// Bring the database at `url` up to date, on the blocking pool
pub async fn run_migrations(url: String) -> anyhow::Result<()> {
    let applied = tokio::task::spawn_blocking(move || {
        let mut conn = SyncConnection::establish(&url).context("Couldn't connect to database")?;
        migrate(&mut conn)
    })
    .await
    .context("Migration task failed")??;

    if applied.is_empty() {
        tracing::info!("Database schema is up to date");
    } else {
        tracing::info!(migrations = %applied.iter().join(", "), "Applied database migrations");
    }
    Ok(())
}
