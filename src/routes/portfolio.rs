/**
 * Portfolio Routes
 * Public portfolio pages plus the owner's profile management endpoints
 */
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json as Jsonb;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{
    self,
    models::{CustomTheme, Portfolio, SocialLinks, Theme},
};
use crate::routes::auth::{authenticated_user_id, is_valid_username};
use crate::routes::ownership::{resolve_owned_portfolio, PORTFOLIO_COLUMNS};
use crate::routes::ErrorResponse;

const THEME_COLUMNS: &str =
    "id, name, description, colors, fonts, is_system_theme, created_by, created_at";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Owning account info shown on the public portfolio page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioOwner {
    pub username: String,
    pub email: String,
}

/// Portfolio with its selected theme expanded
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioDetail {
    pub id: Uuid,
    pub user: Uuid,
    pub username: String,
    pub title: String,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub social_links: SocialLinks,
    pub selected_theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_theme: Option<CustomTheme>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<PortfolioOwner>,
}

impl PortfolioDetail {
    fn from_parts(
        portfolio: Portfolio,
        selected_theme: Option<Theme>,
        owner: Option<PortfolioOwner>,
    ) -> Self {
        Self {
            id: portfolio.id,
            user: portfolio.user_id,
            username: portfolio.username,
            title: portfolio.title,
            bio: portfolio.bio,
            skills: portfolio.skills,
            social_links: portfolio.social_links.0,
            selected_theme,
            custom_theme: portfolio.custom_theme.map(|t| t.0),
            published: portfolio.published,
            created_at: portfolio.created_at,
            updated_at: portfolio.updated_at,
            owner,
        }
    }
}

/// Request body for POST /api/portfolio (create-or-update)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPortfolioRequest {
    pub title: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub social_links: Option<SocialLinks>,
    pub selected_theme: Option<Uuid>,
    pub custom_theme: Option<CustomTheme>,
    pub published: Option<bool>,
}

/// Response for GET /api/portfolio/check-username/{username}
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// Request body for PUT /api/portfolio/username
#[derive(Debug, Deserialize)]
pub struct UpdateUsernameRequest {
    pub username: String,
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand a selected theme reference; lookup failures degrade to None
/// rather than failing the whole portfolio fetch.
async fn fetch_selected_theme(pool: &PgPool, theme_id: Option<Uuid>) -> Option<Theme> {
    let theme_id = theme_id?;
    let query = format!("SELECT {THEME_COLUMNS} FROM themes WHERE id = $1");

    match sqlx::query_as::<_, Theme>(&query)
        .bind(theme_id)
        .fetch_optional(pool)
        .await
    {
        Ok(theme) => theme,
        Err(e) => {
            tracing::error!("Database error fetching selected theme: {}", e);
            None
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/portfolio/{username} - Public portfolio page by username
pub async fn get_portfolio_by_username(Path(username): Path<String>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    let query = format!("SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE username = $1");
    let portfolio = match sqlx::query_as::<_, Portfolio>(&query)
        .bind(&username)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(p)) => p,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Portfolio not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching portfolio: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response();
        }
    };

    // Unpublished portfolios are indistinguishable from missing ones.
    if !portfolio.published {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Portfolio not found")),
        )
            .into_response();
    }

    let selected_theme = fetch_selected_theme(pool.as_ref(), portfolio.selected_theme).await;

    let owner = sqlx::query_as::<_, (String, String)>(
        "SELECT username, email FROM users WHERE id = $1",
    )
    .bind(portfolio.user_id)
    .fetch_optional(pool.as_ref())
    .await
    .ok()
    .flatten()
    .map(|(username, email)| PortfolioOwner { username, email });

    (
        StatusCode::OK,
        Json(PortfolioDetail::from_parts(portfolio, selected_theme, owner)),
    )
        .into_response()
}

/// GET /api/portfolio/me - The authenticated user's portfolio (for editing)
pub async fn get_my_portfolio(headers: HeaderMap) -> impl IntoResponse {
    let user_id = match authenticated_user_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    let portfolio = match resolve_owned_portfolio(pool.as_ref(), user_id).await {
        Ok(p) => p,
        Err(err) => return err.into_response(),
    };

    let selected_theme = fetch_selected_theme(pool.as_ref(), portfolio.selected_theme).await;

    (
        StatusCode::OK,
        Json(PortfolioDetail::from_parts(portfolio, selected_theme, None)),
    )
        .into_response()
}

/// POST /api/portfolio - Create the portfolio on first call, update it after
pub async fn create_update_portfolio(
    headers: HeaderMap,
    Json(payload): Json<UpsertPortfolioRequest>,
) -> impl IntoResponse {
    let user_id = match authenticated_user_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    let query = format!("SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE user_id = $1");
    let existing = match sqlx::query_as::<_, Portfolio>(&query)
        .bind(user_id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Database error fetching portfolio: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response();
        }
    };

    let saved = match existing {
        None => create_portfolio(pool.as_ref(), user_id, payload).await,
        Some(current) => update_portfolio(pool.as_ref(), current, payload).await,
    };

    match saved {
        Ok(portfolio) => (StatusCode::CREATED, Json(portfolio)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn create_portfolio(
    pool: &PgPool,
    user_id: Uuid,
    payload: UpsertPortfolioRequest,
) -> Result<Portfolio, (StatusCode, Json<ErrorResponse>)> {
    let title = match payload.title.filter(|t| !t.trim().is_empty()) {
        Some(t) => t,
        None => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Title is required")),
            ));
        }
    };

    // The portfolio's public username is seeded from the account username.
    let account_username =
        match sqlx::query_as::<_, (String,)>("SELECT username FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
        {
            Ok(Some((username,))) => username,
            Ok(None) => {
                return Err((
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse::new("User not found")),
                ));
            }
            Err(e) => {
                tracing::error!("Database error fetching user for portfolio create: {}", e);
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("Database error")),
                ));
            }
        };

    let insert = format!(
        r#"
        INSERT INTO portfolios
            (user_id, username, title, bio, skills, social_links, selected_theme,
             custom_theme, published)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {PORTFOLIO_COLUMNS}
        "#
    );

    sqlx::query_as::<_, Portfolio>(&insert)
        .bind(user_id)
        .bind(&account_username)
        .bind(&title)
        .bind(&payload.bio)
        .bind(payload.skills.unwrap_or_default())
        .bind(Jsonb(payload.social_links.unwrap_or_default()))
        .bind(payload.selected_theme)
        .bind(payload.custom_theme.map(Jsonb))
        .bind(payload.published.unwrap_or(false))
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("duplicate key") || e.to_string().contains("unique constraint")
            {
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Username is already taken")),
                )
            } else {
                tracing::error!("Database error creating portfolio: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("Failed to create portfolio")),
                )
            }
        })
}

async fn update_portfolio(
    pool: &PgPool,
    current: Portfolio,
    payload: UpsertPortfolioRequest,
) -> Result<Portfolio, (StatusCode, Json<ErrorResponse>)> {
    // Fields absent from the payload keep their previous values.
    let title = payload
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(current.title);
    let bio = payload.bio.or(current.bio);
    let skills = payload.skills.unwrap_or(current.skills);
    let social_links = payload
        .social_links
        .map(Jsonb)
        .unwrap_or(current.social_links);
    let selected_theme = payload.selected_theme.or(current.selected_theme);
    let custom_theme = payload.custom_theme.map(Jsonb).or(current.custom_theme);
    let published = payload.published.unwrap_or(current.published);

    let update = format!(
        r#"
        UPDATE portfolios
        SET title = $1, bio = $2, skills = $3, social_links = $4,
            selected_theme = $5, custom_theme = $6, published = $7, updated_at = now()
        WHERE id = $8
        RETURNING {PORTFOLIO_COLUMNS}
        "#
    );

    sqlx::query_as::<_, Portfolio>(&update)
        .bind(&title)
        .bind(&bio)
        .bind(&skills)
        .bind(&social_links)
        .bind(selected_theme)
        .bind(&custom_theme)
        .bind(published)
        .bind(current.id)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            tracing::error!("Database error updating portfolio: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update portfolio")),
            )
        })
}

/// GET /api/portfolio/check-username/{username} - Availability check
///
/// Non-mutating fast-path hint only: a username can be taken between this
/// check and a later commit. The unique index is the authority.
pub async fn check_username(
    headers: HeaderMap,
    Path(username): Path<String>,
) -> impl IntoResponse {
    if let Err(err) = authenticated_user_id(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    match sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM portfolios WHERE username = $1")
        .bind(&username)
        .fetch_one(pool.as_ref())
        .await
    {
        Ok((count,)) => (
            StatusCode::OK,
            Json(AvailabilityResponse {
                available: count == 0,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error checking username: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response()
        }
    }
}

/// PUT /api/portfolio/username - Change the portfolio's public username
pub async fn update_username(
    headers: HeaderMap,
    Json(payload): Json<UpdateUsernameRequest>,
) -> impl IntoResponse {
    let user_id = match authenticated_user_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    if !is_valid_username(&payload.username) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_message(
                "Invalid username",
                "Username must be 3-30 lowercase letters, numbers, or hyphens",
            )),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    let portfolio = match resolve_owned_portfolio(pool.as_ref(), user_id).await {
        Ok(p) => p,
        Err(err) => return err.into_response(),
    };

    // Fast-path availability check, excluding our own row so keeping the
    // current username does not self-conflict. Check-then-set is racy; the
    // unique index below is what actually decides a lost race.
    let taken = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM portfolios WHERE username = $1 AND id <> $2",
    )
    .bind(&payload.username)
    .bind(portfolio.id)
    .fetch_one(pool.as_ref())
    .await;

    match taken {
        Ok((count,)) if count > 0 => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Username is already taken")),
            )
                .into_response();
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("Database error checking username: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response();
        }
    }

    let update = format!(
        "UPDATE portfolios SET username = $1, updated_at = now() \
         WHERE id = $2 RETURNING {PORTFOLIO_COLUMNS}"
    );

    match sqlx::query_as::<_, Portfolio>(&update)
        .bind(&payload.username)
        .bind(portfolio.id)
        .fetch_one(pool.as_ref())
        .await
    {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(e) => {
            if e.to_string().contains("duplicate key") || e.to_string().contains("unique constraint")
            {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Username is already taken")),
                )
                    .into_response();
            }

            tracing::error!("Database error updating username: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update username")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::auth::{Claims, JWT_SECRET};
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post, put};
    use axum::Router;
    use tower::ServiceExt;

    fn portfolio_router() -> Router {
        Router::new()
            .route(
                "/api/portfolio",
                post(create_update_portfolio),
            )
            .route("/api/portfolio/me", get(get_my_portfolio))
            .route("/api/portfolio/username", put(update_username))
            .route("/api/portfolio/check-username/{username}", get(check_username))
            .route("/api/portfolio/{username}", get(get_portfolio_by_username))
    }

    fn test_token() -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "jane@example.com".to_string(),
            username: "jane-doe".to_string(),
            exp: (now + chrono::Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_public_portfolio_without_database_returns_service_unavailable() {
        let req = Request::get("/api/portfolio/jane-doe")
            .body(Body::empty())
            .unwrap();
        let res = portfolio_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_my_portfolio_without_token_returns_unauthorized() {
        let req = Request::get("/api/portfolio/me").body(Body::empty()).unwrap();
        let res = portfolio_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upsert_without_token_returns_unauthorized() {
        let req = Request::post("/api/portfolio")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title":"My Work"}"#))
            .unwrap();
        let res = portfolio_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_username_invalid_format_returns_bad_request() {
        let req = Request::put("/api/portfolio/username")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", test_token()))
            .body(Body::from(r#"{"username":"Not Valid!"}"#))
            .unwrap();
        let res = portfolio_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_username_without_database_returns_service_unavailable() {
        let req = Request::put("/api/portfolio/username")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", test_token()))
            .body(Body::from(r#"{"username":"jane-doe"}"#))
            .unwrap();
        let res = portfolio_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
