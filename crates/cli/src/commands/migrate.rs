//! Database migration command.
//!
//! Runs the migrations embedded in `partsmith-server` against the database
//! named by `DATABASE_URL`. The server binary does not migrate on startup,
//! so deploys run this first.

use sqlx::PgPool;

/// Migration failures.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// `DATABASE_URL` is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Could not connect to the database.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
pub async fn run() -> Result<(), MigrateError> {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| MigrateError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running migrations...");
    partsmith_server::db::migrator().run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
