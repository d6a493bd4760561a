//! MongoDB connection bootstrap.

use mongodb::{Client, Database};

use crate::error::AppError;

/// Connect and resolve the default database named by the connection
/// string path (e.g. `mongodb://localhost:27017/tours`).
pub async fn connect(uri: &str) -> Result<Database, AppError> {
    let client = Client::with_uri_str(uri).await?;
    client.default_database().ok_or_else(|| {
        AppError::Config("DATABASE connection string must name a database".to_string())
    })
}
