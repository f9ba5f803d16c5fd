//! PostgreSQL storage for observations

mod models;
mod schema;

mod pg_store;
pub use pg_store::PgObservationStore;

mod migrations;
pub use migrations::{run_migrations, MIGRATIONS};
