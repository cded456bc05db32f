/**
 * Analytics Routes
 * Visitor tracking (page views, click events) and the owner's rollup view
 */
use axum::{
    extract::ConnectInfo,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::db::{self, models::AnalyticsRow};
use crate::routes::auth::authenticated_user_id;
use crate::routes::ownership::resolve_owned_portfolio;
use crate::routes::{ErrorResponse, SuccessResponse};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for POST /api/analytics/track-view
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackViewRequest {
    pub portfolio_id: Uuid,
    pub case_study_id: Option<Uuid>,
}

/// Request body for POST /api/analytics/track-click
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackClickRequest {
    pub portfolio_id: Uuid,
    pub case_study_id: Option<Uuid>,
    pub element_id: Option<String>,
    pub element_type: Option<String>,
}

/// Case study reference expanded into analytics responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudyRef {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
}

/// One entry of the per-case-study view counters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudyViewEntry {
    /// None when the counted case study has since been deleted
    pub case_study: Option<CaseStudyRef>,
    pub views: i64,
}

/// The denormalized rollup for one portfolio
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub portfolio: Uuid,
    pub total_views: i64,
    pub case_study_views: Vec<CaseStudyViewEntry>,
    pub last_updated: DateTime<Utc>,
}

/// One recent page view with its case study expanded
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentView {
    pub case_study: Option<CaseStudyRef>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Response for GET /api/analytics/portfolio
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub summary: AnalyticsSummary,
    pub recent_views: Vec<RecentView>,
    pub popular_case_studies: Vec<CaseStudyViewEntry>,
}

// ============================================================================
// Helpers
// ============================================================================

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Rank view counter entries by views descending, top 5. The sort is
/// stable, so entries with equal views keep their original (insertion)
/// order.
fn popular_case_studies(entries: &[CaseStudyViewEntry]) -> Vec<CaseStudyViewEntry> {
    let mut ranked = entries.to_vec();
    ranked.sort_by(|a, b| b.views.cmp(&a.views));
    ranked.truncate(5);
    ranked
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/analytics/track-view - Record a page view on a published
/// portfolio
///
/// Three logically separate steps, each atomic on its own rather than one
/// transaction: append the raw event, bump the portfolio rollup, bump the
/// per-case-study counter. Counter updates are expressed as upserts with
/// in-database increments so concurrent views never lose updates.
pub async fn track_view(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<TrackViewRequest>,
) -> impl IntoResponse {
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

    // Unpublished portfolios reject views before any write, so drafts are
    // not discoverable through the tracking endpoint.
    match sqlx::query_as::<_, (bool,)>("SELECT published FROM portfolios WHERE id = $1")
        .bind(payload.portfolio_id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some((true,))) => {}
        Ok(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Portfolio not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error checking portfolio for view: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response();
        }
    }

    let ip_address = addr.ip().to_string();
    let user_agent = header_string(&headers, header::USER_AGENT);
    let referrer = header_string(&headers, header::REFERER);

    // Step 1: append the immutable event record.
    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO page_views (portfolio_id, case_study_id, ip_address, user_agent, referrer)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(payload.portfolio_id)
    .bind(payload.case_study_id)
    .bind(&ip_address)
    .bind(&user_agent)
    .bind(&referrer)
    .execute(pool.as_ref())
    .await
    {
        tracing::error!("Database error recording page view: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to record view")),
        )
            .into_response();
    }

    // Step 2: create-or-increment the portfolio rollup.
    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO analytics (portfolio_id, total_views, last_updated)
        VALUES ($1, 1, now())
        ON CONFLICT (portfolio_id)
        DO UPDATE SET total_views = analytics.total_views + 1, last_updated = now()
        "#,
    )
    .bind(payload.portfolio_id)
    .execute(pool.as_ref())
    .await
    {
        tracing::error!("Database error updating analytics summary: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to record view")),
        )
            .into_response();
    }

    // Step 3: create-or-increment the per-case-study counter. The first
    // view of a case study inserts its entry with views = 1.
    if let Some(case_study_id) = payload.case_study_id {
        if let Err(e) = sqlx::query(
            r#"
            INSERT INTO case_study_views (portfolio_id, case_study_id, views)
            VALUES ($1, $2, 1)
            ON CONFLICT (portfolio_id, case_study_id)
            DO UPDATE SET views = case_study_views.views + 1
            "#,
        )
        .bind(payload.portfolio_id)
        .bind(case_study_id)
        .execute(pool.as_ref())
        .await
        {
            tracing::error!("Database error updating case study views: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to record view")),
            )
                .into_response();
        }
    }

    (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
}

/// POST /api/analytics/track-click - Record a click event
///
/// Unlike track-view there is no existence or published check on the
/// portfolio: clicks are accepted for any id and never touch the rollup
/// counters.
pub async fn track_click(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<TrackClickRequest>,
) -> impl IntoResponse {
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

    let ip_address = addr.ip().to_string();
    let user_agent = header_string(&headers, header::USER_AGENT);

    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO click_events
            (portfolio_id, case_study_id, element_id, element_type, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(payload.portfolio_id)
    .bind(payload.case_study_id)
    .bind(&payload.element_id)
    .bind(&payload.element_type)
    .bind(&ip_address)
    .bind(&user_agent)
    .execute(pool.as_ref())
    .await
    {
        tracing::error!("Database error recording click event: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to record click")),
        )
            .into_response();
    }

    (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
}

/// GET /api/analytics/portfolio - The owner's analytics rollup
///
/// Composed of three independent point-in-time reads (summary, counters,
/// recent views); callers tolerate minor skew between them.
pub async fn get_portfolio_analytics(headers: HeaderMap) -> impl IntoResponse {
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

    let summary_row = match sqlx::query_as::<_, AnalyticsRow>(
        "SELECT portfolio_id, total_views, last_updated FROM analytics WHERE portfolio_id = $1",
    )
    .bind(portfolio.id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(row) => row,
        Err(e) => {
            tracing::error!("Database error fetching analytics summary: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response();
        }
    };

    // Counter entries in insertion order, with each case study reference
    // expanded; a deleted case study leaves its counter with a null ref.
    let entries = match sqlx::query_as::<_, (Uuid, i64, Option<String>, Option<String>)>(
        r#"
        SELECT v.case_study_id, v.views, c.title, c.slug
        FROM case_study_views v
        LEFT JOIN case_studies c ON c.id = v.case_study_id
        WHERE v.portfolio_id = $1
        ORDER BY v.id
        "#,
    )
    .bind(portfolio.id)
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(rows) => rows
            .into_iter()
            .map(|(case_study_id, views, title, slug)| CaseStudyViewEntry {
                case_study: match (title, slug) {
                    (Some(title), Some(slug)) => Some(CaseStudyRef {
                        id: case_study_id,
                        title,
                        slug,
                    }),
                    _ => None,
                },
                views,
            })
            .collect::<Vec<_>>(),
        Err(e) => {
            tracing::error!("Database error fetching case study views: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response();
        }
    };

    // Equal timestamps fall back to insertion order.
    let recent_views = match sqlx::query_as::<
        _,
        (
            Option<Uuid>,
            Option<String>,
            Option<String>,
            Option<String>,
            DateTime<Utc>,
            Option<String>,
            Option<String>,
        ),
    >(
        r#"
        SELECT p.case_study_id, p.ip_address, p.user_agent, p.referrer, p.timestamp,
               c.title, c.slug
        FROM page_views p
        LEFT JOIN case_studies c ON c.id = p.case_study_id
        WHERE p.portfolio_id = $1
        ORDER BY p.timestamp DESC, p.id
        LIMIT 10
        "#,
    )
    .bind(portfolio.id)
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(rows) => rows
            .into_iter()
            .map(
                |(case_study_id, ip_address, user_agent, referrer, timestamp, title, slug)| {
                    RecentView {
                        case_study: match (case_study_id, title, slug) {
                            (Some(id), Some(title), Some(slug)) => {
                                Some(CaseStudyRef { id, title, slug })
                            }
                            _ => None,
                        },
                        ip_address,
                        user_agent,
                        referrer,
                        timestamp,
                    }
                },
            )
            .collect::<Vec<_>>(),
        Err(e) => {
            tracing::error!("Database error fetching recent views: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response();
        }
    };

    let popular = popular_case_studies(&entries);

    // A portfolio that has never been viewed has no analytics row yet;
    // that state is a valid zero summary, not an error.
    let (total_views, last_updated) = summary_row
        .map(|row| (row.total_views, row.last_updated))
        .unwrap_or((0, Utc::now()));

    (
        StatusCode::OK,
        Json(AnalyticsResponse {
            summary: AnalyticsSummary {
                portfolio: portfolio.id,
                total_views,
                case_study_views: entries,
                last_updated,
            },
            recent_views,
            popular_case_studies: popular,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::Request;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    fn analytics_router() -> Router {
        Router::new()
            .route("/api/analytics/track-view", post(track_view))
            .route("/api/analytics/track-click", post(track_click))
            .route("/api/analytics/portfolio", get(get_portfolio_analytics))
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 12345))))
    }

    fn entry(title: &str, views: i64) -> CaseStudyViewEntry {
        CaseStudyViewEntry {
            case_study: Some(CaseStudyRef {
                id: Uuid::new_v4(),
                title: title.to_string(),
                slug: title.to_lowercase(),
            }),
            views,
        }
    }

    fn titles(entries: &[CaseStudyViewEntry]) -> Vec<&str> {
        entries
            .iter()
            .map(|e| e.case_study.as_ref().unwrap().title.as_str())
            .collect()
    }

    #[test]
    fn test_popular_sorts_by_views_descending_with_stable_ties() {
        let entries = vec![entry("A", 3), entry("B", 7), entry("C", 7), entry("D", 1)];
        let popular = popular_case_studies(&entries);
        assert_eq!(titles(&popular), vec!["B", "C", "A", "D"]);
    }

    #[test]
    fn test_popular_truncates_to_five() {
        let entries: Vec<_> = (0..8).map(|i| entry(&format!("cs{i}"), i)).collect();
        let popular = popular_case_studies(&entries);
        assert_eq!(popular.len(), 5);
        assert_eq!(popular[0].views, 7);
        assert_eq!(popular[4].views, 3);
    }

    #[test]
    fn test_popular_empty_input_returns_empty() {
        assert!(popular_case_studies(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_track_view_without_database_returns_service_unavailable() {
        let body = format!(r#"{{"portfolioId":"{}"}}"#, Uuid::new_v4());
        let req = Request::post("/api/analytics/track-view")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let res = analytics_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_track_click_without_database_returns_service_unavailable() {
        let body = format!(
            r#"{{"portfolioId":"{}","elementId":"contact","elementType":"button"}}"#,
            Uuid::new_v4()
        );
        let req = Request::post("/api/analytics/track-click")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let res = analytics_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_portfolio_analytics_without_token_returns_unauthorized() {
        let req = Request::get("/api/analytics/portfolio")
            .body(Body::empty())
            .unwrap();
        let res = analytics_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
