//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Fixed set of optional social profile URLs on a portfolio
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dribbble: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behance: Option<String>,
}

/// Inline color overrides on a portfolio (all fields optional)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomColors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Inline font overrides on a portfolio
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFonts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

/// Per-portfolio theme override, independent of any saved theme
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTheme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<CustomColors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fonts: Option<CustomFonts>,
}

/// Portfolio model - one per user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub username: String,
    pub title: String,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub social_links: Json<SocialLinks>,
    pub selected_theme: Option<Uuid>,
    pub custom_theme: Option<Json<CustomTheme>>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Media gallery entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Embed,
}

/// Single media gallery entry on a case study
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

/// Single project timeline entry on a case study
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

/// Named outcome metric (e.g. "conversion uplift" / "+18%")
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeMetric {
    pub name: String,
    pub value: String,
}

/// Client testimonial attached to a case study's outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub quote: String,
}

/// Outcomes block on a case study
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcomes {
    #[serde(default)]
    pub metrics: Vec<OutcomeMetric>,
    #[serde(default)]
    pub testimonials: Vec<Testimonial>,
}

/// Case study model - many per portfolio, slug unique within the portfolio
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudy {
    pub id: Uuid,
    #[serde(rename = "portfolio")]
    pub portfolio_id: Uuid,
    pub title: String,
    pub slug: String,
    pub overview: String,
    pub problem_statement: Option<String>,
    pub solution: Option<String>,
    pub media_gallery: Json<Vec<MediaItem>>,
    pub timeline: Json<Vec<TimelineItem>>,
    pub tools_technologies: Vec<String>,
    pub outcomes: Json<Outcomes>,
    pub published: bool,
    #[serde(rename = "order")]
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Theme colors - all four fields required
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeColors {
    pub primary: String,
    pub secondary: String,
    pub background: String,
    pub text: String,
}

/// Theme fonts - both fields required
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeFonts {
    pub primary: String,
    pub secondary: String,
}

/// Theme model - shared system theme or user-created custom theme
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub colors: Json<ThemeColors>,
    pub fonts: Json<ThemeFonts>,
    pub is_system_theme: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Analytics rollup - one row per portfolio
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRow {
    #[serde(rename = "portfolio")]
    pub portfolio_id: Uuid,
    pub total_views: i64,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MediaType::Image).unwrap(), "\"image\"");
        assert_eq!(serde_json::to_string(&MediaType::Embed).unwrap(), "\"embed\"");
    }

    #[test]
    fn test_social_links_round_trip() {
        let links: SocialLinks =
            serde_json::from_str(r#"{"github":"https://github.com/dev"}"#).unwrap();
        assert_eq!(links.github.as_deref(), Some("https://github.com/dev"));
        assert!(links.website.is_none());
        let json = serde_json::to_string(&links).unwrap();
        assert!(!json.contains("website"));
    }

    #[test]
    fn test_outcomes_defaults_to_empty_lists() {
        let outcomes: Outcomes = serde_json::from_str("{}").unwrap();
        assert!(outcomes.metrics.is_empty());
        assert!(outcomes.testimonials.is_empty());
    }
}
