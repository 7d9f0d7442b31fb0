// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auth state and its reducer.
//!
//! ```text
//! Anonymous ──InitEmailAuth──▶ AwaitingEmailVerification ──CompleteEmailAuth──▶ Authenticated
//!     │                                │                                             │
//!     └──────────LoggedIn─────────────┴─────────────────────────────────────────────┤
//!                                                                                    │
//! Anonymous ◀──────────────────────────LoggedOut──────────────────────────────────┘
//! ```
//!
//! `loading` and `error` sit beside the phase: `Loading` clears the error,
//! every other action clears `loading`.

use crate::error::ErrorKind;
use crate::magic_link::ContinueWith;
use crate::models::{Email, User};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthPhase {
    #[default]
    Anonymous,
    /// A magic link has been sent (or opened) for `email`.
    AwaitingEmailVerification {
        email: Email,
        continue_with: ContinueWith,
    },
    Authenticated(User),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthState {
    pub loading: bool,
    pub error: Option<ErrorKind>,
    pub phase: AuthPhase,
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        match &self.phase {
            AuthPhase::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// User-facing error text; empty when there is none.
    pub fn error_message(&self) -> &'static str {
        self.error.map(|k| k.user_message()).unwrap_or_default()
    }

    pub fn pending_email(&self) -> Option<(&Email, ContinueWith)> {
        match &self.phase {
            AuthPhase::AwaitingEmailVerification {
                email,
                continue_with,
            } => Some((email, *continue_with)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    Passkey,
    OAuth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    Loading,
    Error(ErrorKind),
    InitEmailAuth {
        email: Email,
        continue_with: ContinueWith,
    },
    /// Completion of a pending magic link (login or verification).
    CompleteEmailAuth(User),
    LoggedIn {
        method: LoginMethod,
        user: User,
    },
    /// Same principal, refreshed fields (email, read-write session).
    UserUpdated(User),
    LoggedOut,
}

impl AuthAction {
    pub fn name(&self) -> &'static str {
        match self {
            AuthAction::Loading => "LOADING",
            AuthAction::Error(_) => "ERROR",
            AuthAction::InitEmailAuth { .. } => "INIT_EMAIL_AUTH",
            AuthAction::CompleteEmailAuth(_) => "COMPLETE_EMAIL_AUTH",
            AuthAction::LoggedIn {
                method: LoginMethod::Passkey,
                ..
            } => "PASSKEY",
            AuthAction::LoggedIn {
                method: LoginMethod::OAuth,
                ..
            } => "OAUTH",
            AuthAction::UserUpdated(_) => "USER_UPDATED",
            AuthAction::LoggedOut => "LOGGED_OUT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{action} is not valid while {phase}")]
pub struct InvalidTransition {
    pub action: &'static str,
    pub phase: &'static str,
}

fn phase_name(phase: &AuthPhase) -> &'static str {
    match phase {
        AuthPhase::Anonymous => "anonymous",
        AuthPhase::AwaitingEmailVerification { .. } => "awaiting email verification",
        AuthPhase::Authenticated(_) => "authenticated",
    }
}

/// Pure transition function.
pub fn reduce(state: &AuthState, action: AuthAction) -> Result<AuthState, InvalidTransition> {
    let invalid = |action: &AuthAction| InvalidTransition {
        action: action.name(),
        phase: phase_name(&state.phase),
    };

    let next = match action {
        AuthAction::Loading => AuthState {
            loading: true,
            error: None,
            phase: state.phase.clone(),
        },
        AuthAction::Error(kind) => AuthState {
            loading: false,
            error: Some(kind),
            phase: state.phase.clone(),
        },
        AuthAction::InitEmailAuth {
            email,
            continue_with,
        } => match state.phase {
            AuthPhase::Authenticated(_) => {
                return Err(invalid(&AuthAction::InitEmailAuth {
                    email,
                    continue_with,
                }))
            }
            _ => AuthState {
                loading: false,
                error: state.error,
                phase: AuthPhase::AwaitingEmailVerification {
                    email,
                    continue_with,
                },
            },
        },
        AuthAction::CompleteEmailAuth(user) => match &state.phase {
            AuthPhase::AwaitingEmailVerification { .. } => authenticated(user),
            _ => return Err(invalid(&AuthAction::CompleteEmailAuth(user))),
        },
        AuthAction::LoggedIn { method, user } => match &state.phase {
            AuthPhase::Anonymous | AuthPhase::AwaitingEmailVerification { .. } => {
                authenticated(user)
            }
            AuthPhase::Authenticated(current) if current.user_id == user.user_id => {
                authenticated(user)
            }
            AuthPhase::Authenticated(_) => {
                return Err(invalid(&AuthAction::LoggedIn { method, user }))
            }
        },
        AuthAction::UserUpdated(user) => match &state.phase {
            AuthPhase::Authenticated(current) if current.user_id == user.user_id => {
                authenticated(user)
            }
            _ => return Err(invalid(&AuthAction::UserUpdated(user))),
        },
        AuthAction::LoggedOut => AuthState::default(),
    };

    Ok(next)
}

fn authenticated(user: User) -> AuthState {
    AuthState {
        loading: false,
        error: None,
        phase: AuthPhase::Authenticated(user),
    }
}
