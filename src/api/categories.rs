//! Category API endpoints
//!
//! - GET /api/v1/categories - All categories by name
//! - POST /api/v1/categories - Create a category (requires add_category)
//! - GET /api/v1/categories/{id} - Posts of one category with subscription state
//! - POST /api/v1/categories/{id}/subscribe - Subscribe the current user

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ensure_permission, ApiError, AppState, AuthenticatedUser};
use crate::api::news::page_from_query;
use crate::models::{Category, Permission};
use crate::services::{CategoryListing, SUBSCRIBED_MESSAGE};

/// Request body for creating a category
#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

/// Response for the category catalogue
#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
}

/// Response after subscribing
#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub message: &'static str,
    pub category: Category,
}

/// Build public category routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/{id}", get(get_category))
}

/// Build protected category routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_category))
        .route("/{id}/subscribe", post(subscribe))
}

/// GET /api/v1/categories
async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoryListResponse>, ApiError> {
    let categories = state.category_service.list().await?;
    Ok(Json(CategoryListResponse { categories }))
}

/// POST /api/v1/categories
async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    ensure_permission(&state, &user, Permission::AddCategory).await?;
    let Json(body) = payload.map_err(|e| ApiError::validation_error(e.body_text()))?;

    let category = state.category_service.create(&body.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/v1/categories/{id}?page=
///
/// Anonymous callers are allowed; they are simply never subscribers.
async fn get_category(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<CategoryListing>, ApiError> {
    let page = page_from_query(&query)?;

    let listing = state
        .category_service
        .listing(id, viewer.as_ref().map(|v| &v.0), page)
        .await?;

    Ok(Json(listing))
}

/// POST /api/v1/categories/{id}/subscribe
async fn subscribe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let category = state.category_service.subscribe(id, &user).await?;
    Ok(Json(SubscribeResponse {
        message: SUBSCRIBED_MESSAGE,
        category,
    }))
}
