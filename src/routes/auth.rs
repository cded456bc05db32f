/**
 * Authentication Routes
 * JWT-based authentication: register, login, and current-user lookup
 */
use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{self, models::User};
use crate::routes::ErrorResponse;

// ============================================================================
// Configuration
// ============================================================================

lazy_static::lazy_static! {
    /// JWT secret key from environment
    pub static ref JWT_SECRET: String = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "default-jwt-secret-change-in-production".to_string());

    /// Valid username pattern: lowercase letters, numbers, and hyphens,
    /// 3-30 characters, starting with a letter or number
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-z0-9][a-z0-9-]{2,29}$").unwrap();

    /// Rate limit storage (IP -> last request timestamp)
    pub static ref RATE_LIMIT: Arc<RwLock<HashMap<String, i64>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Access token expiry in hours
const ACCESS_TOKEN_EXPIRY_HOURS: i64 = 24;

/// Rate limit window in seconds (1 request per IP per 60 seconds for login/register)
#[allow(dead_code)]
const RATE_LIMIT_WINDOW_SECS: i64 = 60;

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,      // User ID
    pub email: String,    // User email
    pub username: String, // Account username
    pub exp: i64,         // Expiry timestamp
    pub iat: i64,         // Issued at timestamp
}

/// User info returned to the frontend
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub user: Option<UserInfo>,
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserInfo>,
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Helper Functions
// ============================================================================

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

/// Create access token
fn create_access_token(
    user_id: Uuid,
    email: &str,
    username: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::hours(ACCESS_TOKEN_EXPIRY_HOURS);

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        username: username.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
}

/// Verify and decode access token
pub fn verify_access_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Authentication gate shared by every private route: extract the bearer
/// token and return the verified claims, or the 401 response to send back.
pub fn authenticate(headers: &HeaderMap) -> Result<Claims, (StatusCode, Json<ErrorResponse>)> {
    let token = extract_bearer_token(headers).ok_or((
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("Authorization required")),
    ))?;

    verify_access_token(&token).map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Invalid or expired token")),
        )
    })
}

/// Authenticate and resolve the principal's user id. Private handlers trust
/// this identity verbatim.
pub fn authenticated_user_id(
    headers: &HeaderMap,
) -> Result<Uuid, (StatusCode, Json<ErrorResponse>)> {
    let claims = authenticate(headers)?;
    Uuid::parse_str(&claims.sub).map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Invalid or expired token")),
        )
    })
}

/// Check rate limit for an IP.
///
/// Also removes stale entries from the map on every write so the HashMap
/// does not grow without bound as unique IPs accumulate over time.
async fn check_rate_limit(ip: &str) -> bool {
    #[cfg(test)]
    {
        let _ = ip;
        return true; // Bypass in tests so validation and credentials are exercised
    }

    #[cfg(not(test))]
    {
        let now = Utc::now().timestamp();
        let mut limits = RATE_LIMIT.write().await;

        // Evict all entries whose window has already expired.
        // This keeps memory proportional to the number of *active* IPs rather
        // than the total number of unique IPs seen since startup.
        limits.retain(|_, last| now - *last < RATE_LIMIT_WINDOW_SECS);

        if let Some(last_request) = limits.get(ip) {
            if now - last_request < RATE_LIMIT_WINDOW_SECS {
                return false; // Rate limited
            }
        }

        limits.insert(ip.to_string(), now);
        true // Allowed
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/register
/// Create a new user account and return an access token
pub async fn register(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<RegisterRequest>,
) -> impl IntoResponse {
    let ip = addr.ip().to_string();

    // Rate limit check
    if !check_rate_limit(&ip).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RegisterResponse {
                success: false,
                user: None,
                access_token: None,
                error: Some("Too many requests. Please try again later.".to_string()),
            }),
        );
    }

    // Validate request
    if payload.username.is_empty() || payload.email.is_empty() || payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(RegisterResponse {
                success: false,
                user: None,
                access_token: None,
                error: Some("Username, email and password are required".to_string()),
            }),
        );
    }

    if !is_valid_username(&payload.username) {
        return (
            StatusCode::BAD_REQUEST,
            Json(RegisterResponse {
                success: false,
                user: None,
                access_token: None,
                error: Some(
                    "Username must be 3-30 lowercase letters, numbers, or hyphens".to_string(),
                ),
            }),
        );
    }

    // Basic email format validation
    if !payload.email.contains('@') {
        return (
            StatusCode::BAD_REQUEST,
            Json(RegisterResponse {
                success: false,
                user: None,
                access_token: None,
                error: Some("Invalid email format".to_string()),
            }),
        );
    }

    // Password strength validation
    if payload.password.len() < 8 {
        return (
            StatusCode::BAD_REQUEST,
            Json(RegisterResponse {
                success: false,
                user: None,
                access_token: None,
                error: Some("Password must be at least 8 characters long".to_string()),
            }),
        );
    }

    // Get database pool
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(RegisterResponse {
                    success: false,
                    user: None,
                    access_token: None,
                    error: Some("Database not available".to_string()),
                }),
            );
        }
    };

    // Hash password — bcrypt is intentionally CPU-intensive; run it outside
    // the async executor so it doesn't block other in-flight tasks.
    let password = payload.password.clone();
    let password_hash = match tokio::task::spawn_blocking(move || hash(&password, DEFAULT_COST))
        .await
    {
        Ok(Ok(h)) => h,
        Ok(Err(e)) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RegisterResponse {
                    success: false,
                    user: None,
                    access_token: None,
                    error: Some("Failed to process password".to_string()),
                }),
            );
        }
        Err(e) => {
            tracing::error!("spawn_blocking panic during hash: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RegisterResponse {
                    success: false,
                    user: None,
                    access_token: None,
                    error: Some("Failed to process password".to_string()),
                }),
            );
        }
    };

    // Insert new user; the unique indexes on username/email are the
    // authority on duplicates.
    let inserted: Result<(Uuid,), sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO users (username, email, password_hash)
        VALUES ($1, LOWER($2), $3)
        RETURNING id
        "#,
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&password_hash)
    .fetch_one(pool.as_ref())
    .await;

    match inserted {
        Ok((user_id,)) => {
            tracing::info!("User registered successfully: {}", payload.username);

            let access_token =
                match create_access_token(user_id, &payload.email, &payload.username) {
                    Ok(token) => Some(token),
                    Err(e) => {
                        tracing::error!("Failed to create access token: {}", e);
                        None
                    }
                };

            (
                StatusCode::CREATED,
                Json(RegisterResponse {
                    success: true,
                    user: Some(UserInfo {
                        id: user_id,
                        username: payload.username,
                        email: payload.email.to_lowercase(),
                    }),
                    access_token,
                    error: None,
                }),
            )
        }
        Err(e) => {
            if e.to_string().contains("duplicate key")
                || e.to_string().contains("unique constraint")
            {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(RegisterResponse {
                        success: false,
                        user: None,
                        access_token: None,
                        error: Some("Username or email already registered".to_string()),
                    }),
                );
            }

            tracing::error!("Failed to create user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RegisterResponse {
                    success: false,
                    user: None,
                    access_token: None,
                    error: Some("Failed to create account".to_string()),
                }),
            )
        }
    }
}

/// POST /api/auth/login
/// Authenticate user and return an access token
pub async fn login(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let ip = addr.ip().to_string();

    // Rate limit check
    if !check_rate_limit(&ip).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(LoginResponse {
                success: false,
                user: None,
                access_token: None,
                error: Some("Too many requests. Please try again later.".to_string()),
            }),
        );
    }

    // Validate request
    if payload.email.is_empty() || payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(LoginResponse {
                success: false,
                user: None,
                access_token: None,
                error: Some("Email and password are required".to_string()),
            }),
        );
    }

    // Basic email format validation
    if !payload.email.contains('@') {
        return (
            StatusCode::BAD_REQUEST,
            Json(LoginResponse {
                success: false,
                user: None,
                access_token: None,
                error: Some("Invalid email format".to_string()),
            }),
        );
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(LoginResponse {
                    success: false,
                    user: None,
                    access_token: None,
                    error: Some("Database not available".to_string()),
                }),
            );
        }
    };

    let row = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, created_at
        FROM users
        WHERE LOWER(email) = LOWER($1)
        "#,
    )
    .bind(&payload.email)
    .fetch_optional(pool.as_ref())
    .await;

    let user = match row {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!("Login attempt for unknown user: {}", payload.email);
            return (
                StatusCode::UNAUTHORIZED,
                Json(LoginResponse {
                    success: false,
                    user: None,
                    access_token: None,
                    error: Some("Invalid credentials".to_string()),
                }),
            );
        }
        Err(e) => {
            tracing::error!("Database error during login: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LoginResponse {
                    success: false,
                    user: None,
                    access_token: None,
                    error: Some("Authentication service temporarily unavailable.".to_string()),
                }),
            );
        }
    };

    // Verify password — bcrypt is CPU-bound; keep the async executor free.
    let pwd = payload.password.clone();
    let hash_clone = user.password_hash.clone();
    let password_ok =
        tokio::task::spawn_blocking(move || verify(&pwd, &hash_clone).unwrap_or(false))
            .await
            .unwrap_or(false);
    if !password_ok {
        tracing::warn!("Failed login attempt for: {}", user.email);
        return (
            StatusCode::UNAUTHORIZED,
            Json(LoginResponse {
                success: false,
                user: None,
                access_token: None,
                error: Some("Invalid credentials".to_string()),
            }),
        );
    }

    let access_token = match create_access_token(user.id, &user.email, &user.username) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to create access token: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LoginResponse {
                    success: false,
                    user: None,
                    access_token: None,
                    error: Some("Failed to create token".to_string()),
                }),
            );
        }
    };

    tracing::info!("Successful login for user: {}", user.email);

    (
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            user: Some(UserInfo {
                id: user.id,
                username: user.username,
                email: user.email,
            }),
            access_token: Some(access_token),
            error: None,
        }),
    )
}

/// GET /api/auth/me
/// Return the authenticated user's account
pub async fn me(headers: HeaderMap) -> impl IntoResponse {
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

    // password_hash is marked skip_serializing on the model, so returning
    // the row directly never leaks it.
    match sqlx::query_as::<_, User>(
        "SELECT id, username, email, password_hash, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(user)) => (StatusCode::OK, Json(user)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("User not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
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

    fn auth_router() -> Router {
        use axum::extract::connect_info::MockConnectInfo;
        Router::new()
            .route("/api/auth/register", post(register))
            .route("/api/auth/login", post(login))
            .route("/api/auth/me", get(me))
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 12345))))
    }

    async fn post_json(
        app: Router,
        uri: &str,
        json: &impl serde::Serialize,
    ) -> (StatusCode, axum::body::Bytes) {
        let body = Body::from(serde_json::to_vec(json).unwrap());
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes)
    }

    #[test]
    fn test_verify_access_token_invalid_returns_err() {
        let result = verify_access_token("invalid.jwt.token");
        assert!(result.is_err());
    }

    #[test]
    fn test_access_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = create_access_token(user_id, "dev@example.com", "dev").unwrap();
        let claims = verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "dev@example.com");
        assert_eq!(claims.username, "dev");
    }

    #[test]
    fn test_username_validation() {
        assert!(is_valid_username("jane-doe"));
        assert!(is_valid_username("dev123"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("Jane"));
        assert!(!is_valid_username("has space"));
    }

    #[tokio::test]
    async fn test_register_short_password_returns_bad_request() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/register",
            &RegisterRequest {
                username: "jane-doe".to_string(),
                email: "jane@example.com".to_string(),
                password: "short".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_invalid_username_returns_bad_request() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/register",
            &RegisterRequest {
                username: "Not A Username".to_string(),
                email: "jane@example.com".to_string(),
                password: "password123".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_empty_email_returns_bad_request() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/login",
            &LoginRequest {
                email: "".to_string(),
                password: "password123".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_invalid_email_format_returns_bad_request() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/login",
            &LoginRequest {
                email: "no-at-sign".to_string(),
                password: "password123".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_without_database_returns_service_unavailable() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/login",
            &LoginRequest {
                email: "jane@example.com".to_string(),
                password: "password123".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_me_without_token_returns_unauthorized() {
        let req = Request::get("/api/auth/me").body(Body::empty()).unwrap();
        let res = auth_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
