use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::payroll::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Workflow(e) => match e {
                WorkflowError::Forbidden { .. } => StatusCode::FORBIDDEN,
                WorkflowError::PaymentReferenceRequired
                | WorkflowError::ReasonRequired
                | WorkflowError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
                WorkflowError::MonthLocked(_)
                | WorkflowError::AlreadyFinalized(_)
                | WorkflowError::InvalidTransition { .. }
                | WorkflowError::AlreadyLocked(_)
                | WorkflowError::NotLocked(_) => StatusCode::CONFLICT,
            },
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(json!({ "message": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn workflow_errors_map_to_http_statuses() {
        let month = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        assert_eq!(
            AppError::from(WorkflowError::MonthLocked(month)).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(WorkflowError::ReasonRequired).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(WorkflowError::Forbidden {
                role: crate::model::role::Role::Hr,
                action: "approve payroll"
            })
            .status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn server_errors_hide_details() {
        let resp = AppError::Internal("secret detail".into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
