/**
 * Ownership Resolver
 * Resolves the authenticated principal's portfolio and guards access to
 * portfolio-scoped resources. Every private route goes through these two
 * predicates instead of repeating the resolve-and-compare logic inline.
 */
use axum::{http::StatusCode, Json};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{CaseStudy, Portfolio};
use crate::routes::ErrorResponse;

pub(crate) const PORTFOLIO_COLUMNS: &str = "id, user_id, username, title, bio, skills, \
     social_links, selected_theme, custom_theme, published, created_at, updated_at";

/// Look up the single portfolio owned by `user_id`.
///
/// A principal with no portfolio yet is a normal state for a fresh account,
/// so the failure is NotFound rather than Unauthorized.
pub async fn resolve_owned_portfolio(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Portfolio, (StatusCode, Json<ErrorResponse>)> {
    let query = format!("SELECT {PORTFOLIO_COLUMNS} FROM portfolios WHERE user_id = $1");

    match sqlx::query_as::<_, Portfolio>(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    {
        Ok(Some(portfolio)) => Ok(portfolio),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Portfolio not found")),
        )),
        Err(e) => {
            tracing::error!("Database error resolving owned portfolio: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            ))
        }
    }
}

/// Check that `case_study` belongs to the principal's portfolio.
///
/// Returns the resolved portfolio on success so callers don't have to look
/// it up again. A principal without a portfolio cannot own anything, so
/// that case is Unauthorized here (unlike resolve_owned_portfolio).
pub async fn authorize_case_study(
    pool: &PgPool,
    case_study: &CaseStudy,
    user_id: Uuid,
) -> Result<Portfolio, (StatusCode, Json<ErrorResponse>)> {
    let unauthorized = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Not authorized")),
        )
    };

    let portfolio = match resolve_owned_portfolio(pool, user_id).await {
        Ok(p) => p,
        Err((status, _)) if status == StatusCode::NOT_FOUND => return Err(unauthorized()),
        Err(other) => return Err(other),
    };

    if case_study.portfolio_id != portfolio.id {
        return Err(unauthorized());
    }

    Ok(portfolio)
}
