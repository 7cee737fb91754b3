//! Product retirement.
//!
//! Soft-deletes a product: the row keeps its order history but the slug is
//! replaced with a random token so the catalog sweep cannot resurrect it
//! and the storefront stops listing it.

use partsmith_core::ProductId;
use partsmith_server::db::{ProductRepository, RepositoryError};
use sqlx::PgPool;

/// Retire command failures.
#[derive(Debug, thiserror::Error)]
pub enum RetireError {
    /// `DATABASE_URL` is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Could not connect to the database.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No product row matched the id.
    #[error("No product with id {0}")]
    NotFound(i32),

    /// The update itself failed.
    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

/// Soft-delete the product with the given id.
pub async fn run(id: i32) -> Result<(), RetireError> {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| RetireError::MissingEnvVar("DATABASE_URL"))?;
    let pool = PgPool::connect(&database_url).await?;

    match ProductRepository::new(&pool).soft_delete(ProductId::new(id)).await {
        Ok(()) => {
            tracing::info!(id, "Product retired");
            Ok(())
        }
        Err(RepositoryError::NotFound) => Err(RetireError::NotFound(id)),
        Err(other) => Err(RetireError::Repository(other)),
    }
}
