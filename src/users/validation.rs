// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Field validation for request payloads.
//!
//! Payloads derive [`garde::Validate`] with [`RequestValidator`] as their
//! context. The validator is built once at startup and shared through the
//! application state; the extractor hands it to garde on every request.

pub use garde::Validate;

use crate::error::FieldError;

/// Settings the validation rules read at request time.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    min_password_len: usize,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self {
            min_password_len: 1,
        }
    }
}

impl RequestValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_password_len(mut self, len: usize) -> Self {
        self.min_password_len = len.max(1);
        self
    }
}

/// Non-blank string.
pub fn required(value: &str, _ctx: &RequestValidator) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("is a required field"));
    }
    Ok(())
}

pub fn password_length(value: &str, ctx: &RequestValidator) -> garde::Result {
    if value.chars().count() < ctx.min_password_len {
        return Err(garde::Error::new(format!(
            "must be at least {} characters in length",
            ctx.min_password_len
        )));
    }
    Ok(())
}

/// One [`FieldError`] per failed field, in declaration order. When a field
/// fails several rules only the first is kept.
pub fn field_errors(report: &garde::Report) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = Vec::new();
    for (path, error) in report.iter() {
        let field = path.to_string();
        if fields.iter().any(|f| f.field == field) {
            continue;
        }
        fields.push(FieldError::new(field, error.to_string()));
    }
    fields
}
