/**
 * Routes Module
 * API route handlers
 */

pub mod analytics;
pub mod auth;
pub mod case_study;
pub mod health;
pub mod ownership;
pub mod portfolio;
pub mod theme;

use serde::Serialize;

/// Error response shared across route modules
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
        }
    }
}

/// Success acknowledgement (delete, reorder, and tracking endpoints)
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}
