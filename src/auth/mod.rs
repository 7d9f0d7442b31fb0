// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication
//!
//! Three ways in (passkey, email magic link, OAuth), one way out.
//!
//! - [`state`]: the tagged-union state and its pure reducer
//! - [`controller`]: [`AuthController`], the single writer of that state
//! - [`nonce`]: OAuth nonce binding to the signing context key
//! - [`passkeys`]: authenticator list/add/remove

pub mod controller;
pub mod nonce;
pub mod passkeys;
pub mod state;

pub use controller::{AuthController, AuthDeps, EmailVerified, PasskeyLogin};
pub use nonce::{oauth_nonce, verify_nonce, IdTokenClaims};
pub use passkeys::AuthenticatorManager;
pub use state::{reduce, AuthAction, AuthPhase, AuthState, InvalidTransition, LoginMethod};
