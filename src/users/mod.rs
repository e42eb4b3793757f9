// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User accounts: models, validation and the [`UserService`] operations.

pub mod instrumented;
pub mod models;
pub mod service;
pub mod validation;

pub use instrumented::InstrumentedUserService;
pub use models::{LoginRequest, NewUserRequest, TokenResponse, UpdateUserRequest, User};
pub use service::{
    ServiceError, ServiceResult, UserManager, UserService, DEFAULT_TOKEN_TTL_SECS, TOKEN_AUDIENCE,
    TOKEN_ISSUER,
};
pub use validation::{RequestValidator, Validate};
