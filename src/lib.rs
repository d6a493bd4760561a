// Library root — exposes internal modules for integration tests in `tests/`.
// Production entry point remains `src/main.rs`.

pub mod api;
pub mod db;
pub mod error;
pub mod features;
pub mod model;
pub mod repository;

// These modules are only needed by the binary.
// Declared pub so integration tests can reach them if needed, but they
// contain no logic of interest to tests.
pub mod cli;
pub mod config;
pub mod logging;

use axum::Router;

pub use api::tours::ToursState;

/// Assemble the full application router over any [`repository::TourStore`].
pub fn app(store: ToursState) -> Router {
    Router::new()
        .merge(api::health::router())
        .nest("/api/v1/tours/", api::tours::router(store))
}
