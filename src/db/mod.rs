pub mod models;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use tokio::sync::OnceCell;

static DB_POOL: OnceCell<Arc<PgPool>> = OnceCell::const_new();

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/craftfolio".to_string()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

pub async fn init_pool(config: Option<DbConfig>) -> Result<Arc<PgPool>, sqlx::Error> {
    let config = config.unwrap_or_default();

    tracing::info!("Initializing database connection pool...");
    tracing::debug!(
        "Database URL: {}",
        config.url.replace(
            |c: char| !c.is_ascii_alphanumeric() && c != ':' && c != '/' && c != '@' && c != '.',
            "*"
        )
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(3))
        .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    let pool = Arc::new(pool);
    let _ = DB_POOL.set(pool.clone());

    Ok(pool)
}

pub fn get_pool() -> Option<Arc<PgPool>> {
    DB_POOL.get().cloned()
}

pub async fn health_check() -> Result<std::time::Duration, sqlx::Error> {
    let pool = get_pool()
        .ok_or_else(|| sqlx::Error::Configuration("Database pool not initialized".into()))?;

    let start = std::time::Instant::now();
    sqlx::query("SELECT 1").fetch_one(pool.as_ref()).await?;

    Ok(start.elapsed())
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_username ON users(username)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS themes (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT UNIQUE NOT NULL,
            description TEXT,
            colors JSONB NOT NULL,
            fonts JSONB NOT NULL,
            is_system_theme BOOLEAN NOT NULL DEFAULT true,
            created_by UUID REFERENCES users(id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_themes_is_system ON themes(is_system_theme)
        "#,
    )
    .execute(pool)
    .await?;

    // One portfolio per user (UNIQUE user_id), globally unique username.
    // Uniqueness lives in the schema: whichever insert or update loses a
    // race gets a constraint violation, which the routes report as taken.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS portfolios (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            username TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            bio TEXT,
            skills TEXT[] NOT NULL DEFAULT '{}',
            social_links JSONB NOT NULL DEFAULT '{}',
            selected_theme UUID REFERENCES themes(id),
            custom_theme JSONB,
            published BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_portfolios_published ON portfolios(published)
        "#,
    )
    .execute(pool)
    .await?;

    // Slug is unique per portfolio, not globally.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS case_studies (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            portfolio_id UUID NOT NULL REFERENCES portfolios(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            slug TEXT NOT NULL,
            overview TEXT NOT NULL,
            problem_statement TEXT,
            solution TEXT,
            media_gallery JSONB NOT NULL DEFAULT '[]',
            timeline JSONB NOT NULL DEFAULT '[]',
            tools_technologies TEXT[] NOT NULL DEFAULT '{}',
            outcomes JSONB NOT NULL DEFAULT '{"metrics": [], "testimonials": []}',
            published BOOLEAN NOT NULL DEFAULT false,
            display_order INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (portfolio_id, slug)
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_case_studies_portfolio_order
            ON case_studies(portfolio_id, display_order)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_case_studies_published
            ON case_studies(portfolio_id, published)
        "#,
    )
    .execute(pool)
    .await?;

    // Rollup counters: one analytics row per portfolio, created lazily by
    // the first tracked view, incremented atomically after that.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analytics (
            portfolio_id UUID PRIMARY KEY REFERENCES portfolios(id) ON DELETE CASCADE,
            total_views BIGINT NOT NULL DEFAULT 0,
            last_updated TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    // Per-case-study view counters, keyed by (portfolio, case study) so
    // "increment if present, else insert with views = 1" is a single atomic
    // upsert. The serial id preserves insertion order, which is the
    // tie-break when ranking entries by views.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS case_study_views (
            id BIGSERIAL PRIMARY KEY,
            portfolio_id UUID NOT NULL REFERENCES portfolios(id) ON DELETE CASCADE,
            case_study_id UUID NOT NULL,
            views BIGINT NOT NULL DEFAULT 0,
            UNIQUE (portfolio_id, case_study_id)
        )
    "#,
    )
    .execute(pool)
    .await?;

    // Append-only event logs. No foreign keys here: click tracking accepts
    // events for portfolios it has never seen, and deleting a case study
    // must not invalidate its historical events.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS page_views (
            id BIGSERIAL PRIMARY KEY,
            portfolio_id UUID NOT NULL,
            case_study_id UUID,
            ip_address TEXT,
            user_agent TEXT,
            referrer TEXT,
            timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_page_views_portfolio_ts
            ON page_views(portfolio_id, timestamp DESC)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS click_events (
            id BIGSERIAL PRIMARY KEY,
            portfolio_id UUID NOT NULL,
            case_study_id UUID,
            element_id TEXT,
            element_type TEXT,
            ip_address TEXT,
            user_agent TEXT,
            timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_click_events_portfolio_ts
            ON click_events(portfolio_id, timestamp DESC)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_default_uses_env_or_fallback() {
        let config = DbConfig::default();
        assert!(config.max_connections >= 1);
        assert!(config.connect_timeout_secs >= 1);
        assert!(config.idle_timeout_secs >= 1);
        assert!(!config.url.is_empty());
    }

    #[test]
    fn test_get_pool_none_before_init() {
        let pool = get_pool();
        assert!(pool.is_none());
    }

    #[tokio::test]
    async fn test_health_check_fails_without_pool() {
        let result = health_check().await;
        assert!(result.is_err());
    }
}
