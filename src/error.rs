// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::users::ServiceError;

/// Message for a request body that is not valid JSON for the target type.
pub const DECODE_MESSAGE: &str = "unable to decode payload";

/// Message for a body that decoded but failed field validation.
pub const VALIDATION_MESSAGE: &str = "field validation error";

/// A single failed field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error: error.into(),
        }
    }
}

/// Marker placed in response extensions when a request hit a condition the
/// pipeline guarantees cannot happen. The fault guard middleware turns it into
/// a graceful shutdown.
#[derive(Debug, Clone)]
pub struct IntegrityFault {
    reason: String,
}

impl IntegrityFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub fields: Vec<FieldError>,
    pub integrity_fault: bool,
}

/// Error response body.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fields: Vec::new(),
            integrity_fault: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// 500 with a generic message. The detail is logged, never returned.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "Internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    /// 500 that also requests a graceful shutdown.
    pub fn integrity(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(error = %detail, "Integrity fault");
        Self {
            integrity_fault: true,
            message: detail,
            ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, "")
        }
    }

    pub fn decode() -> Self {
        Self::bad_request(DECODE_MESSAGE)
    }

    pub fn validation(fields: Vec<FieldError>) -> Self {
        Self {
            fields,
            ..Self::bad_request(VALIDATION_MESSAGE)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let fault = self
            .integrity_fault
            .then(|| IntegrityFault::new(self.message.clone()));
        let message = if fault.is_some() {
            "internal server error".to_string()
        } else {
            self.message
        };

        let body = Json(ErrorBody {
            error: message,
            fields: self.fields,
        });
        let mut response = (self.status, body).into_response();
        if let Some(fault) = fault {
            response.extensions_mut().insert(fault);
        }
        response
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidId
            | ServiceError::InvalidPage
            | ServiceError::DuplicatedEmail => Self::bad_request(err.to_string()),
            ServiceError::NotFound => Self::not_found(err.to_string()),
            ServiceError::AuthenticationFailure => Self::unauthorized(err.to_string()),
            ServiceError::Forbidden => Self::forbidden(err.to_string()),
            ServiceError::Storage(_)
            | ServiceError::PasswordHash(_)
            | ServiceError::TokenLifetime(_) => Self::internal(err),
        }
    }
}
