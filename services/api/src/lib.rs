mod cli;
mod infra;
mod routes;
mod server;

use housing_listings::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
