//! Error handling for the B2B Ordering Platform
//!
//! Provides consistent error responses in English and French

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        message_fr: String,
    },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_fr: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_fr: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ordering core errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Concurrent writer won the compare-and-set on an entity
    pub fn concurrent_update(resource: &str) -> Self {
        AppError::Conflict {
            resource: resource.to_string(),
            message: format!("{} was modified concurrently, please retry", resource),
            message_fr: format!("{} a été modifié simultanément, veuillez réessayer", resource),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationError(errors.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_fr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

fn domain_response(err: &DomainError) -> (StatusCode, ErrorDetail) {
    let (status, message_fr, field) = match err {
        DomainError::InvalidTransition { current, requested, .. } => (
            StatusCode::CONFLICT,
            format!(
                "Transition impossible : la commande est {} (demandé : {})",
                current, requested
            ),
            None,
        ),
        DomainError::EmptyOrder => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "La commande ne contient aucune ligne avec une quantité positive".to_string(),
            Some("lines".to_string()),
        ),
        DomainError::CannotCancelAfterPreparation { current } => (
            StatusCode::CONFLICT,
            format!(
                "La commande est {} : l'annulation n'est plus possible après le début de la préparation",
                current
            ),
            None,
        ),
        DomainError::IncompletePreparation { missing } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Quantité préparée manquante pour {} produit(s)", missing.len()),
            Some("lines".to_string()),
        ),
        DomainError::InvalidQuantity { field, quantity } => (
            StatusCode::BAD_REQUEST,
            format!("Quantité invalide {} pour {}", quantity, field),
            Some(field.clone()),
        ),
        DomainError::UnknownProduct { product_id } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Le produit {} ne fait pas partie de la commande", product_id),
            Some("product_id".to_string()),
        ),
        DomainError::DuplicateProduct { product_id } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Le produit {} apparaît sur plusieurs lignes", product_id),
            Some("product_id".to_string()),
        ),
        DomainError::StockRecordNotFound { store_id, product_id } => (
            StatusCode::NOT_FOUND,
            format!(
                "Aucun stock pour le produit {} dans le magasin {}",
                product_id, store_id
            ),
            None,
        ),
    };

    (
        status,
        ErrorDetail {
            code: err.code().to_string(),
            message_en: err.to_string(),
            message_fr,
            field,
        },
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "TOKEN_EXPIRED".to_string(),
                    message_en: "Token has expired".to_string(),
                    message_fr: "Le jeton a expiré".to_string(),
                    field: None,
                },
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_TOKEN".to_string(),
                    message_en: "Invalid token".to_string(),
                    message_fr: "Jeton invalide".to_string(),
                    field: None,
                },
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "INSUFFICIENT_PERMISSIONS".to_string(),
                    message_en: "You do not have permission to perform this action".to_string(),
                    message_fr: "Vous n'avez pas l'autorisation d'effectuer cette action".to_string(),
                    field: None,
                },
            ),
            AppError::Unauthorized { message, message_fr } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "UNAUTHORIZED".to_string(),
                    message_en: message.clone(),
                    message_fr: message_fr.clone(),
                    field: None,
                },
            ),
            AppError::Validation { field, message, message_fr } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_fr: message_fr.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_fr: format!("Données invalides : {}", msg),
                    field: None,
                },
            ),
            AppError::Conflict { resource, message, message_fr } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_fr: message_fr.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_fr: format!("{} introuvable", resource),
                    field: None,
                },
            ),
            AppError::Domain(err) => domain_response(err),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_fr: "Une erreur de base de données est survenue".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_fr: "Erreur interne du serveur".to_string(),
                    field: None,
                },
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!(code = %error_detail.code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
