//! Tour endpoints, mounted under `/api/v1/tours`.
//!
//! Routes:
//! - `GET    /`                       — list with filter/sort/fields/pagination
//! - `POST   /`                       — validate and insert
//! - `GET    /:id`                    — fetch one
//! - `PATCH  /:id`                    — partial update (returns the pre-update doc)
//! - `DELETE /:id`                    — delete
//! - `GET    /top5cheap`              — preset listing: five cheapest top-rated
//! - `GET    /tour-stats`             — per-difficulty aggregation
//! - `GET    /get-monthly-plan/:year` — per-month plan for one year

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::features::ListQuery;
use crate::model::{TourInput, TourUpdate};
use crate::repository::TourStore;

/// Shared state for the tour routes.
pub type ToursState = Arc<dyn TourStore>;

pub fn router(store: ToursState) -> Router {
    Router::new()
        .route("/top5cheap", get(top_five_cheap))
        .route("/tour-stats", get(tour_stats))
        .route("/get-monthly-plan/:year", get(monthly_plan))
        .route("/", get(list_tours).post(create_tour))
        .route(
            "/:id",
            get(get_tour).patch(update_tour).delete(delete_tour),
        )
        .with_state(store)
}

async fn list_tours(
    State(store): State<ToursState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    let query = ListQuery::from_params(&params)?;
    render_listing(&store, &query).await
}

/// Preset listing: the five cheapest among the best-rated tours.
/// Caller-supplied filters still apply; `limit`, `sort` and `fields`
/// are pinned.
async fn top_five_cheap(
    State(store): State<ToursState>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    params.insert("limit".to_string(), "5".to_string());
    params.insert("sort".to_string(), "-ratingsAverage,price".to_string());
    params.insert(
        "fields".to_string(),
        "name,price,ratingsAverage,summary,difficulty".to_string(),
    );

    let query = ListQuery::from_params(&params)?;
    render_listing(&store, &query).await
}

async fn render_listing(store: &ToursState, query: &ListQuery) -> Result<Json<Value>, AppError> {
    let tours = store.list(query).await?;
    Ok(Json(json!({
        "status": "Success",
        "result": tours.len(),
        "data": { "tours": tours },
    })))
}

async fn get_tour(
    State(store): State<ToursState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let tour = store.get(&id).await?.ok_or(AppError::TourNotFound)?;
    Ok(Json(json!({
        "status": "Success",
        "data": { "tour": tour },
    })))
}

async fn create_tour(
    State(store): State<ToursState>,
    payload: Result<Json<TourInput>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(input) = payload.map_err(bad_body)?;
    let document = input.into_document()?;
    let tour = store.create(document).await?;
    Ok(Json(json!({
        "status": "Success",
        "data": { "newTour": tour },
    })))
}

async fn update_tour(
    State(store): State<ToursState>,
    Path(id): Path<String>,
    payload: Result<Json<TourUpdate>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(patch) = payload.map_err(bad_body)?;
    let set = patch.into_set_document()?;
    let tour = store.update(&id, set).await?.ok_or(AppError::TourNotFound)?;
    Ok(Json(json!({
        "status": "Success",
        "data": { "updatedTour": tour },
    })))
}

async fn delete_tour(
    State(store): State<ToursState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    store.delete(&id).await?.ok_or(AppError::TourNotFound)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn tour_stats(State(store): State<ToursState>) -> Result<Json<Value>, AppError> {
    let stats = store.stats().await?;
    Ok(Json(json!({
        "status": "Success",
        "data": { "stats": stats },
    })))
}

async fn monthly_plan(
    State(store): State<ToursState>,
    Path(year): Path<String>,
) -> Result<Json<Value>, AppError> {
    let year: i32 = year
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid year: {}", year)))?;
    let plan = store.monthly_plan(year).await?;
    Ok(Json(json!({
        "status": "Success",
        "data": { "plan": plan },
    })))
}

/// Body extractor failures (bad JSON, wrong content type) get the same
/// error envelope as everything else.
fn bad_body(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}
