// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Token issuance, token validation and role based access control.
//!
//! ## Auth Flow
//!
//! 1. Client logs in with email and password at `POST /v1/users/token/{kid}`
//! 2. The service signs a JWT with the key registered under `kid`
//! 3. Client sends `Authorization: Bearer <JWT>` on later requests
//! 4. The authenticate stage:
//!    - Pins the algorithm to the configured one
//!    - Resolves the `kid` through a [`KeyLookup`]
//!    - Verifies signature and expiry
//!    - Stores the [`Claims`] on the request context
//! 5. The authorize stage checks the claims' roles where a route requires it
//!
//! ## Security
//!
//! - Every token failure yields the same generic 401; the cause is only logged
//! - No clock skew leeway; `exp == now` is already expired
//! - Forbidden responses never reveal which roles were required

pub mod authenticator;
pub mod claims;
pub mod codec;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod keystore;
pub mod middleware;
pub mod roles;

pub use authenticator::Auth;
pub use claims::{Claims, ExpiryOutOfRange};
pub use error::{AuthError, KeyLookupError, SetupError, SigningError, TokenError};
pub use extractor::{AuthClaims, OptionalAuth};
pub use jwks::JwksKeyStore;
pub use keystore::{KeyLookup, RotatingKeyStore, SigningKey, SigningKeys, StaticKeyStore};
pub use middleware::{authenticate, authorize, RequiredRoles};
pub use roles::Role;
