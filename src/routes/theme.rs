/**
 * Theme Routes
 * Shared system themes and user-created custom themes
 */
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use sqlx::types::Json as Jsonb;
use uuid::Uuid;

use crate::db::{
    self,
    models::{Theme, ThemeColors, ThemeFonts},
};
use crate::routes::auth::authenticated_user_id;
use crate::routes::ErrorResponse;

const THEME_COLUMNS: &str =
    "id, name, description, colors, fonts, is_system_theme, created_by, created_at";

/// Request body for POST /api/theme/custom
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThemeRequest {
    pub name: String,
    pub description: Option<String>,
    pub colors: ThemeColors,
    pub fonts: ThemeFonts,
}

/// GET /api/theme/system - List all shared system themes
pub async fn get_system_themes() -> impl IntoResponse {
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

    let query =
        format!("SELECT {THEME_COLUMNS} FROM themes WHERE is_system_theme = true ORDER BY name");

    match sqlx::query_as::<_, Theme>(&query)
        .fetch_all(pool.as_ref())
        .await
    {
        Ok(themes) => (StatusCode::OK, Json(themes)).into_response(),
        Err(e) => {
            tracing::error!("Database error listing system themes: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response()
        }
    }
}

/// GET /api/theme/{id} - Get a single theme by id
pub async fn get_theme_by_id(Path(id): Path<Uuid>) -> impl IntoResponse {
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

    let query = format!("SELECT {THEME_COLUMNS} FROM themes WHERE id = $1");

    match sqlx::query_as::<_, Theme>(&query)
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(theme)) => (StatusCode::OK, Json(theme)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Theme not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching theme: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response()
        }
    }
}

/// POST /api/theme/custom - Create a custom theme owned by the caller
pub async fn create_custom_theme(
    headers: HeaderMap,
    Json(payload): Json<CreateThemeRequest>,
) -> impl IntoResponse {
    let user_id = match authenticated_user_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    if payload.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Theme name is required")),
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

    let insert = format!(
        r#"
        INSERT INTO themes (name, description, colors, fonts, is_system_theme, created_by)
        VALUES ($1, $2, $3, $4, false, $5)
        RETURNING {THEME_COLUMNS}
        "#
    );

    match sqlx::query_as::<_, Theme>(&insert)
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(Jsonb(payload.colors))
        .bind(Jsonb(payload.fonts))
        .bind(user_id)
        .fetch_one(pool.as_ref())
        .await
    {
        Ok(theme) => (StatusCode::CREATED, Json(theme)).into_response(),
        Err(e) => {
            if e.to_string().contains("duplicate key") || e.to_string().contains("unique constraint")
            {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("Theme name is already taken")),
                )
                    .into_response();
            }

            tracing::error!("Database error creating theme: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create theme")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    fn theme_router() -> Router {
        Router::new()
            .route("/api/theme/system", get(get_system_themes))
            .route("/api/theme/custom", post(create_custom_theme))
            .route("/api/theme/{id}", get(get_theme_by_id))
    }

    #[tokio::test]
    async fn test_system_themes_without_database_returns_service_unavailable() {
        let req = Request::get("/api/theme/system").body(Body::empty()).unwrap();
        let res = theme_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_create_custom_without_token_returns_unauthorized() {
        let body = r##"{
            "name": "midnight",
            "colors": {"primary":"#111","secondary":"#222","background":"#000","text":"#eee"},
            "fonts": {"primary":"Inter","secondary":"Georgia"}
        }"##;
        let req = Request::post("/api/theme/custom")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let res = theme_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_get_theme_invalid_id_returns_bad_request() {
        let req = Request::get("/api/theme/not-a-uuid")
            .body(Body::empty())
            .unwrap();
        let res = theme_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
