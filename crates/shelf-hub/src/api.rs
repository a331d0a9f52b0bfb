//! # API Handlers
//!
//! Token grants are public. Everything under `/api` runs behind
//! [`auth_middleware`], which turns the bearer token into a capability for the
//! catalog to check.

use crate::auth::errors::AuthError;
use crate::auth::{RefreshRequest, TokenRequest, TokenResponse};
use crate::AppState;
use axum::{
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use shelf_core::{Capability, DatasetStats, Page, Pagination, SearchRequest};
use shelf_store::QueryError;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/products", get(list_products))
        .route("/products/search", get(search_query).post(search_body))
        .route("/brands", get(list_brands))
        .route("/categories", get(list_categories))
        .route("/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(health))
        .route("/auth/token", post(issue_token))
        .route("/auth/refresh", post(refresh_token))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    BadQuery(#[from] QueryRejection),
}

/// OAuth2 error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub error_description: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::Auth(e) => (
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::UNAUTHORIZED),
                e.error_code(),
            ),
            ApiError::Query(QueryError::Unauthorized) => (StatusCode::UNAUTHORIZED, "invalid_token"),
            ApiError::BadQuery(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        };
        let body = ErrorBody {
            error,
            error_description: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED && error == "invalid_token" {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

// =============================================================================
// Auth Middleware
// =============================================================================

/// Capability attached to a request, if its bearer token verified.
#[derive(Clone, Debug)]
pub struct Bearer(pub Option<Capability>);

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    let capability = match auth_header {
        Some(header) if header.starts_with("Bearer ") => match state.auth.verify(&header[7..]) {
            Ok(capability) => Some(capability),
            Err(e) => {
                tracing::warn!("Rejected bearer token for {}: {}", req.uri().path(), e);
                return Err(e.into());
            }
        },
        Some(_) => {
            tracing::warn!("Unsupported Authorization scheme for {}", req.uri().path());
            return Err(AuthError::MalformedToken.into());
        }
        // The catalog refuses a missing capability.
        None => {
            tracing::warn!("Missing Authorization header for {}", req.uri().path());
            None
        }
    };

    req.extensions_mut().insert(Bearer(capability));
    Ok(next.run(req).await)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub records: usize,
    pub loaded_at: String,
    pub uptime_secs: u64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    let snapshot = state.catalog.snapshot();
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        records: snapshot.len(),
        loaded_at: snapshot.loaded_at().to_rfc3339(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// =============================================================================
// Token Grants
// =============================================================================

pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.auth.issue(&req).await?))
}

pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.auth.refresh(&req).await?))
}

// =============================================================================
// Products
// =============================================================================

pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Extension(Bearer(capability)): Extension<Bearer>,
    pagination: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<Page>, ApiError> {
    let Query(pagination) = pagination?;
    let page = state
        .catalog
        .list_products(capability.as_ref(), pagination)?;
    Ok(Json(page))
}

pub async fn search_query(
    State(state): State<Arc<AppState>>,
    Extension(Bearer(capability)): Extension<Bearer>,
    req: Result<Query<SearchRequest>, QueryRejection>,
) -> Result<Json<Page>, ApiError> {
    let Query(req) = req?;
    search(&state, capability.as_ref(), req)
}

pub async fn search_body(
    State(state): State<Arc<AppState>>,
    Extension(Bearer(capability)): Extension<Bearer>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Page>, ApiError> {
    search(&state, capability.as_ref(), req)
}

fn search(
    state: &AppState,
    capability: Option<&Capability>,
    req: SearchRequest,
) -> Result<Json<Page>, ApiError> {
    let (filter, pagination) = req.into_parts();
    let page = state.catalog.search(capability, &filter, pagination)?;
    tracing::debug!(
        "search {:?} -> {} records (has_more={})",
        filter,
        page.len(),
        page.has_more
    );
    Ok(Json(page))
}

// =============================================================================
// Dataset
// =============================================================================

pub async fn list_brands(
    State(state): State<Arc<AppState>>,
    Extension(Bearer(capability)): Extension<Bearer>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.catalog.list_brands(capability.as_ref())?))
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Extension(Bearer(capability)): Extension<Bearer>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.catalog.list_categories(capability.as_ref())?))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(Bearer(capability)): Extension<Bearer>,
) -> Result<Json<DatasetStats>, ApiError> {
    Ok(Json(state.catalog.stats(capability.as_ref())?))
}
