//! News API endpoints
//!
//! - GET /api/v1/news - Filtered, paginated post list
//! - GET /api/v1/news/search - Same list, echoing the applied filter
//! - GET /api/v1/news/{id} - Post detail (served through the cache)
//! - POST /api/v1/news/create - Create a news post
//! - POST /api/v1/news/article/create - Create an article
//! - PUT|POST /api/v1/news/{id}/edit - Update a post
//! - DELETE|POST /api/v1/news/{id}/delete - Delete a post, redirect to the list
//!
//! Write endpoints check, in order: session, permission, record, payload.

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ensure_permission, ApiError, AppState, AuthenticatedUser};
use crate::models::{
    PageNumber, PagedResult, Permission, Post, PostFilter, PostKind, UpdatePostInput, User,
};
use crate::services::PostForm;

/// Where a successful delete sends the client
pub const LIST_PATH: &str = "/api/v1/news";

/// Request body for creating a post
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
    #[serde(alias = "category_id")]
    pub category: i64,
}

impl From<CreatePostRequest> for PostForm {
    fn from(req: CreatePostRequest) -> Self {
        PostForm {
            title: req.title,
            text: req.text,
            category_id: req.category,
        }
    }
}

/// Request body for updating a post; omitted fields keep their value
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub text: Option<String>,
    #[serde(alias = "category_id")]
    pub category: Option<i64>,
}

impl From<UpdatePostRequest> for UpdatePostInput {
    fn from(req: UpdatePostRequest) -> Self {
        UpdatePostInput {
            title: req.title,
            text: req.text,
            category_id: req.category,
        }
    }
}

/// Response for the list and search views
#[derive(Debug, Serialize)]
pub struct PostListResponse {
    #[serde(flatten)]
    pub posts: PagedResult<Post>,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
    /// Server time when the list was produced
    pub time_in: DateTime<Utc>,
    /// Effective filter, echoed by the search view only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<PostFilter>,
}

impl PostListResponse {
    fn new(posts: PagedResult<Post>, filter: Option<PostFilter>) -> Self {
        Self {
            total_pages: posts.total_pages(),
            has_next: posts.has_next(),
            has_prev: posts.has_prev(),
            posts,
            time_in: Utc::now(),
            filter,
        }
    }
}

/// Build public news routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/search", get(search_posts))
        .route("/{id}", get(get_post))
}

/// Build protected news routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_news))
        .route("/article/create", post(create_article))
        .route("/{id}/edit", put(update_post).post(update_post))
        .route("/{id}/delete", post(delete_post).delete(delete_post))
}

/// Read filter criteria and page from raw query parameters.
///
/// Criteria that are empty or fail to parse are dropped. An unparseable page
/// is reported as not found.
fn parse_list_query(query: &HashMap<String, String>) -> Result<(PostFilter, PageNumber), ApiError> {
    let mut filter = PostFilter::new();

    if let Some(title) = query.get("title") {
        filter = filter.with_title(title);
    }
    if let Some(category) = parse_param::<i64>(query, "category") {
        filter = filter.with_category(category);
    }
    if let Some(kind) = parse_param::<PostKind>(query, "type") {
        filter = filter.with_kind(kind);
    }
    if let Some(author) = parse_param::<i64>(query, "author") {
        filter = filter.with_author(author);
    }
    if let Some(date) = parse_param::<NaiveDate>(query, "date_from") {
        filter = filter.with_date_from(date);
    }
    if let Some(date) = parse_param::<NaiveDate>(query, "date_to") {
        filter = filter.with_date_to(date);
    }

    Ok((filter, page_from_query(query)?))
}

/// `page` query parameter; absent means the first page
pub(crate) fn page_from_query(query: &HashMap<String, String>) -> Result<PageNumber, ApiError> {
    match query.get("page").map(|p| p.trim()).filter(|p| !p.is_empty()) {
        Some(raw) => raw
            .parse::<PageNumber>()
            .map_err(|_| ApiError::not_found("Invalid page")),
        None => Ok(PageNumber::default()),
    }
}

fn parse_param<T: std::str::FromStr>(query: &HashMap<String, String>, name: &str) -> Option<T> {
    let raw = query.get(name)?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::debug!(param = name, value = raw, "Ignoring unparseable filter value");
            None
        }
    }
}

/// GET /api/v1/news
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PostListResponse>, ApiError> {
    let (filter, page) = parse_list_query(&query)?;
    let posts = state.post_service.list(&filter, page).await?;
    Ok(Json(PostListResponse::new(posts, None)))
}

/// GET /api/v1/news/search
async fn search_posts(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<PostListResponse>, ApiError> {
    let (filter, page) = parse_list_query(&query)?;
    let posts = state.post_service.list(&filter, page).await?;
    Ok(Json(PostListResponse::new(posts, Some(filter))))
}

/// GET /api/v1/news/{id}
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.get_by_id(id).await?))
}

/// POST /api/v1/news/create
async fn create_news(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    create_post(state, user, payload, PostKind::News).await
}

/// POST /api/v1/news/article/create
async fn create_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    create_post(state, user, payload, PostKind::Article).await
}

async fn create_post(
    state: AppState,
    user: User,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
    kind: PostKind,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    ensure_permission(&state, &user, Permission::AddPost).await?;
    let Json(body) = payload.map_err(|e| ApiError::validation_error(e.body_text()))?;

    let post = state
        .post_service
        .create(user.id, body.into(), kind)
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// PUT|POST /api/v1/news/{id}/edit
async fn update_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> Result<Json<Post>, ApiError> {
    ensure_permission(&state, &user, Permission::ChangePost).await?;

    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            // a missing post outranks a malformed body
            state.post_service.get_by_id(id).await?;
            return Err(ApiError::validation_error(rejection.body_text()));
        }
    };

    let post = state.post_service.update(id, body.into()).await?;
    Ok(Json(post))
}

/// DELETE|POST /api/v1/news/{id}/delete
async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Redirect, ApiError> {
    ensure_permission(&state, &user, Permission::DeletePost).await?;
    state.post_service.delete(id).await?;
    Ok(Redirect::to(LIST_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_query_is_identity() {
        let (filter, page) = parse_list_query(&HashMap::new()).unwrap();
        assert!(filter.is_empty());
        assert_eq!(page, PageNumber::Number(1));
    }

    #[test]
    fn test_query_parses_every_criterion() {
        let (filter, page) = parse_list_query(&query(&[
            ("title", " Rust "),
            ("category", "3"),
            ("type", "article"),
            ("author", "7"),
            ("date_from", "2024-01-01"),
            ("date_to", "2024-01-31"),
            ("page", "last"),
        ]))
        .unwrap();

        assert_eq!(filter.title.as_deref(), Some("Rust"));
        assert_eq!(filter.category_id, Some(3));
        assert_eq!(filter.kind, Some(PostKind::Article));
        assert_eq!(filter.author_id, Some(7));
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(filter.date_to, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(page, PageNumber::Last);
    }

    #[test]
    fn test_invalid_criteria_are_ignored() {
        let (filter, _) = parse_list_query(&query(&[
            ("title", "   "),
            ("category", "tech"),
            ("type", "opinion"),
            ("date_from", "31/01/2024"),
            ("page", ""),
        ]))
        .unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn test_unparseable_page_is_not_found() {
        let err = parse_list_query(&query(&[("page", "two")])).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
