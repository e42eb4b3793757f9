// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON body extractor with field validation.

use axum::{
    extract::{FromRef, FromRequest, Request},
    Json,
};
use axum_valid::{Garde, GardeRejection};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::users::validation::field_errors;
use crate::users::{RequestValidator, Validate};

/// [`Garde`]-validated [`Json`] with this service's error responses.
///
/// Any decode failure (wrong content type, syntax, unknown field) is a 400
/// with the generic decode message; failed rules are a 400 listing every
/// failed field. The rules read the shared [`RequestValidator`].
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate<Context = RequestValidator>,
    S: Send + Sync,
    RequestValidator: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Garde(Json(value)) = Garde::<Json<T>>::from_request(request, state)
            .await
            .map_err(|rejection| match rejection {
                GardeRejection::Valid(report) => ApiError::validation(field_errors(&report)),
                GardeRejection::Inner(rejection) => {
                    tracing::debug!(error = %rejection.body_text(), "Rejected request body");
                    ApiError::decode()
                }
            })?;

        Ok(ValidJson(value))
    }
}
