// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! [`AuthController`]: runs the login flows and owns the auth state.
//!
//! The controller is the only writer of [`AuthState`]; observers hold a
//! `watch::Receiver` from [`AuthController::subscribe`]. Every flow
//! dispatches `Loading` first (clearing the previous error) and always ends
//! with `loading == false`, either through its success action or `Error`.

use std::sync::Arc;

use tokio::sync::watch;
use url::Url;

use super::nonce::verify_nonce;
use super::state::{reduce, AuthAction, AuthPhase, AuthState, InvalidTransition, LoginMethod};
use crate::custody::{
    find_sub_organization, CreateSubOrganization, CustodyApi, EmailAuthRequest, OAuthCredential,
    OAuthProvider, OAuthRequest, PasskeyClient, SessionProvider, SigningContext, SubOrgFilter,
    PASSKEY_AUTHENTICATOR_NAME,
};
use crate::directory::UserDirectory;
use crate::error::{ClientError, ErrorKind};
use crate::magic_link::{self, ContinueWith, MagicLinkAction, MagicLinkParams};
use crate::models::{Email, Session, User};

/// Collaborators the controller is wired with.
#[derive(Clone)]
pub struct AuthDeps {
    pub custody: Arc<dyn CustodyApi>,
    pub directory: Arc<dyn UserDirectory>,
    pub signing: Arc<dyn SigningContext>,
    pub passkeys: Arc<dyn PasskeyClient>,
    pub session: Arc<dyn SessionProvider>,
    pub oauth: Arc<dyn OAuthProvider>,
}

/// Outcome of [`AuthController::login_with_passkey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasskeyLogin {
    Authenticated(User),
    /// A verification link was emailed; the user must open it first.
    VerificationRequired,
}

/// Outcome of [`AuthController::complete_email_verification`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailVerified {
    pub user: User,
    pub continue_with: ContinueWith,
}

#[derive(Debug, thiserror::Error)]
enum FlowError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{0:?}")]
    Kind(ErrorKind),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

impl FlowError {
    fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Client(e) => e.kind(),
            FlowError::Kind(kind) => *kind,
            FlowError::Transition(_) => ErrorKind::Unexpected,
        }
    }
}

type FlowResult<T> = Result<T, FlowError>;

pub struct AuthController {
    deps: AuthDeps,
    app_base_url: Url,
    state: watch::Sender<AuthState>,
}

impl AuthController {
    pub fn new(deps: AuthDeps, app_base_url: Url) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            deps,
            app_base_url,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    /// Apply `action`; a transition the current phase does not allow leaves
    /// the state untouched and fails the calling flow.
    fn dispatch(&self, action: AuthAction) -> Result<(), InvalidTransition> {
        let name = action.name();
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| match reduce(state, action) {
            Ok(next) => {
                *state = next;
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        match &outcome {
            Ok(()) => tracing::debug!(action = name, "Auth transition"),
            Err(e) => tracing::warn!(error = %e, "Rejected auth transition"),
        }
        outcome
    }

    /// For `Loading`, `Error` and `LoggedOut`, which every phase accepts.
    fn record(&self, action: AuthAction) {
        if let Err(e) = self.dispatch(action) {
            tracing::error!(error = %e, "Unconditional auth transition rejected");
        }
    }

    /// Record the outcome of a flow; failures land in `state.error`.
    fn settle<T>(&self, flow: &'static str, result: FlowResult<T>) -> Result<T, ErrorKind> {
        result.map_err(|e| {
            let kind = e.kind();
            tracing::warn!(flow, error = %e, ?kind, "Auth flow failed");
            self.record(AuthAction::Error(kind));
            kind
        })
    }

    fn target_public_key(&self) -> FlowResult<String> {
        self.deps.signing.public_key().ok_or_else(|| {
            ClientError::Precondition("signing context has no public key yet".into()).into()
        })
    }

    async fn send_magic_link(
        &self,
        email: &Email,
        organization_id: &str,
        action: MagicLinkAction,
        continue_with: ContinueWith,
    ) -> FlowResult<()> {
        let request = EmailAuthRequest {
            email: email.clone(),
            target_public_key: self.target_public_key()?,
            organization_id: organization_id.to_string(),
            magic_link_template: magic_link::template(
                &self.app_base_url,
                action,
                email,
                continue_with,
            ),
        };
        self.deps.custody.email_auth(&request).await?;
        tracing::info!(action = action.as_str(), %continue_with, "Magic link sent");
        Ok(())
    }

    async fn login_signing_context(&self, bundle: &str) -> FlowResult<User> {
        self.deps.signing.inject_credential_bundle(bundle).await?;
        let response = self.deps.signing.login().await?;
        Ok(User::try_from(response)?)
    }

    /// A link opened in a fresh session is itself the pending request.
    fn restore_pending(&self, email: &Email, continue_with: ContinueWith) -> FlowResult<()> {
        let pending = self.state.borrow().pending_email().map(|(e, _)| e.clone());
        match pending {
            Some(pending) if pending == *email => Ok(()),
            Some(_) => Err(ClientError::Precondition(
                "magic link is for a different email than the pending request".into(),
            )
            .into()),
            None => {
                self.dispatch(AuthAction::InitEmailAuth {
                    email: email.clone(),
                    continue_with,
                })?;
                Ok(())
            }
        }
    }

    // =========================================================================
    // Email magic link
    // =========================================================================

    /// Look up (or create) the sub-organization for `email` and send a login
    /// link to it.
    pub async fn init_email_login(&self, email: &str) -> Result<(), ErrorKind> {
        self.record(AuthAction::Loading);
        let result = self.try_init_email_login(email).await;
        self.settle("init_email_login", result)
    }

    async fn try_init_email_login(&self, email: &str) -> FlowResult<()> {
        let email = Email::parse(email).map_err(|_| FlowError::Kind(ErrorKind::MissingEmail))?;
        let organization_id = self.sub_organization_for_email(&email).await?;

        self.send_magic_link(
            &email,
            &organization_id,
            MagicLinkAction::Auth,
            ContinueWith::Email,
        )
        .await?;
        self.dispatch(AuthAction::InitEmailAuth {
            email,
            continue_with: ContinueWith::Email,
        })?;
        Ok(())
    }

    async fn sub_organization_for_email(&self, email: &Email) -> FlowResult<String> {
        let custody = self.deps.custody.as_ref();
        if let Some(id) = find_sub_organization(custody, &SubOrgFilter::Email(email.clone())).await? {
            return Ok(id);
        }

        let created = custody
            .create_sub_organization(&CreateSubOrganization {
                email: Some(email.clone()),
                ..Default::default()
            })
            .await?;
        self.deps
            .directory
            .add_user(email, &created.sub_organization_id)
            .await?;
        tracing::info!(sub_organization_id = %created.sub_organization_id, "Created sub-organization for email signup");
        Ok(created.sub_organization_id)
    }

    /// Landing handler for `/email-auth` links.
    pub async fn complete_email_auth(&self, params: &MagicLinkParams) -> Result<User, ErrorKind> {
        let result = self.try_complete_email_auth(params).await;
        self.settle("complete_email_auth", result)
    }

    async fn try_complete_email_auth(&self, params: &MagicLinkParams) -> FlowResult<User> {
        let email = params
            .email()
            .ok_or(FlowError::Kind(ErrorKind::MissingEmail))?;
        let bundle = params
            .credential_bundle
            .as_deref()
            .ok_or(FlowError::Kind(ErrorKind::MissingCredentialBundle))?;
        if params.continue_with != Some(ContinueWith::Email) {
            return Err(ClientError::Precondition("link does not continue with email".into()).into());
        }

        self.restore_pending(&email, ContinueWith::Email)?;
        self.record(AuthAction::Loading);

        let mut user = self.login_signing_context(bundle).await?;
        user.email = Some(email);
        self.dispatch(AuthAction::CompleteEmailAuth(user.clone()))?;
        Ok(user)
    }

    /// Landing handler for `/email-verification` links.
    pub async fn complete_email_verification(
        &self,
        params: &MagicLinkParams,
    ) -> Result<EmailVerified, ErrorKind> {
        let result = self.try_complete_email_verification(params).await;
        self.settle("complete_email_verification", result)
    }

    async fn try_complete_email_verification(
        &self,
        params: &MagicLinkParams,
    ) -> FlowResult<EmailVerified> {
        let email = params
            .email()
            .ok_or(FlowError::Kind(ErrorKind::MissingEmail))?;
        let bundle = params
            .credential_bundle
            .as_deref()
            .ok_or(FlowError::Kind(ErrorKind::MissingCredentialBundle))?;
        let continue_with = params.continue_with.unwrap_or(ContinueWith::Passkey);

        self.restore_pending(&email, continue_with)?;
        self.record(AuthAction::Loading);

        self.deps.signing.inject_credential_bundle(bundle).await?;
        self.deps.directory.verify_user_email(&email).await?;
        let response = self.deps.signing.login().await?;
        let mut user = User::try_from(response)?;
        user.email = Some(email);

        self.dispatch(AuthAction::CompleteEmailAuth(user.clone()))?;
        Ok(EmailVerified {
            user,
            continue_with,
        })
    }

    // =========================================================================
    // Passkey
    // =========================================================================

    /// Passkey login. With an email, unknown users are signed up and
    /// unverified ones are sent a verification link first.
    pub async fn login_with_passkey(&self, email: Option<&str>) -> Result<PasskeyLogin, ErrorKind> {
        self.record(AuthAction::Loading);
        let result = self.try_login_with_passkey(email).await;
        self.settle("login_with_passkey", result)
    }

    async fn try_login_with_passkey(&self, email: Option<&str>) -> FlowResult<PasskeyLogin> {
        let Some(email) = email else {
            let user = self.passkey_login(None, None).await?;
            return Ok(PasskeyLogin::Authenticated(user));
        };
        let email = Email::parse(email).map_err(|_| FlowError::Kind(ErrorKind::MissingEmail))?;

        if let Some(record) = self.deps.directory.find_user_by_email(&email).await? {
            if !record.email_verified {
                return self
                    .require_verification(&email, &record.sub_organization_id)
                    .await;
            }
        }

        let custody = self.deps.custody.as_ref();
        match find_sub_organization(custody, &SubOrgFilter::Email(email.clone())).await? {
            // Existing users never fall through to signup.
            Some(organization_id) => {
                let user = self.passkey_login(Some(&organization_id), Some(email)).await?;
                Ok(PasskeyLogin::Authenticated(user))
            }
            None => self.passkey_signup(email).await,
        }
    }

    async fn passkey_login(
        &self,
        organization_id: Option<&str>,
        email: Option<Email>,
    ) -> FlowResult<User> {
        let response = self.deps.passkeys.login(organization_id).await?;
        let mut user = User::try_from(response)?;
        user.email = email;
        self.dispatch(AuthAction::LoggedIn {
            method: LoginMethod::Passkey,
            user: user.clone(),
        })?;
        Ok(user)
    }

    async fn passkey_signup(&self, email: Email) -> FlowResult<PasskeyLogin> {
        let credential = self
            .deps
            .passkeys
            .create_user_passkey(PASSKEY_AUTHENTICATOR_NAME, email.local_part())
            .await?;
        let created = self
            .deps
            .custody
            .create_sub_organization(&CreateSubOrganization {
                email: Some(email.clone()),
                passkey: Some(credential),
                oauth: None,
            })
            .await?;
        self.deps
            .directory
            .add_user(&email, &created.sub_organization_id)
            .await?;
        tracing::info!(sub_organization_id = %created.sub_organization_id, "Created sub-organization for passkey signup");

        self.require_verification(&email, &created.sub_organization_id)
            .await
    }

    async fn require_verification(
        &self,
        email: &Email,
        organization_id: &str,
    ) -> FlowResult<PasskeyLogin> {
        self.send_magic_link(
            email,
            organization_id,
            MagicLinkAction::Verification,
            ContinueWith::Passkey,
        )
        .await?;
        self.dispatch(AuthAction::InitEmailAuth {
            email: email.clone(),
            continue_with: ContinueWith::Passkey,
        })?;
        Ok(PasskeyLogin::VerificationRequired)
    }

    // =========================================================================
    // OAuth
    // =========================================================================

    /// Sign in with an OIDC ID token whose nonce is bound to the signing
    /// context's public key.
    pub async fn login_with_oauth(&self, id_token: &str) -> Result<User, ErrorKind> {
        self.record(AuthAction::Loading);
        let result = self.try_login_with_oauth(id_token).await;
        self.settle("login_with_oauth", result)
    }

    async fn try_login_with_oauth(&self, id_token: &str) -> FlowResult<User> {
        let target_public_key = self.target_public_key()?;
        let claims = verify_nonce(id_token, &target_public_key)?;
        let email = claims.email.as_deref().and_then(|e| Email::parse(e).ok());

        let custody = self.deps.custody.as_ref();
        let organization_id =
            match find_sub_organization(custody, &SubOrgFilter::OidcToken(id_token.to_string()))
                .await?
            {
                Some(id) => id,
                None => {
                    let created = custody
                        .create_sub_organization(&CreateSubOrganization {
                            email: email.clone(),
                            passkey: None,
                            oauth: Some(OAuthCredential::google(id_token)),
                        })
                        .await?;
                    created.sub_organization_id
                }
            };

        let exchange = custody
            .oauth(&OAuthRequest {
                oidc_token: id_token.to_string(),
                target_public_key,
                organization_id,
            })
            .await?;

        let mut user = self.login_signing_context(&exchange.credential_bundle).await?;
        user.email = email;
        self.dispatch(AuthAction::LoggedIn {
            method: LoginMethod::OAuth,
            user: user.clone(),
        })?;
        Ok(user)
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Invalidate the provider session and forget the OAuth identity.
    /// Always ends anonymous.
    pub async fn logout(&self) {
        if let Err(e) = self.deps.session.logout().await {
            tracing::warn!(error = %e, "Provider logout failed");
        }
        self.deps.oauth.logout().await;
        self.record(AuthAction::LoggedOut);
        tracing::info!("Logged out");
    }

    /// Passkey ceremony for a short-lived signing session.
    pub async fn create_read_write_session(&self) -> Result<Session, ErrorKind> {
        self.record(AuthAction::Loading);
        let result = self.try_create_read_write_session().await;
        self.settle("create_read_write_session", result)
    }

    async fn try_create_read_write_session(&self) -> FlowResult<Session> {
        let mut user = self.require_user()?;
        let session = self
            .deps
            .passkeys
            .create_read_write_session(&user.organization.organization_id)
            .await?;
        user.read_write_session = Some(session.clone());
        self.dispatch(AuthAction::UserUpdated(user))?;
        Ok(session)
    }

    /// Fill in the user's email from the provider when login did not carry it.
    pub async fn load_user_email(&self) -> Result<Option<Email>, ErrorKind> {
        let result = self.try_load_user_email().await;
        self.settle("load_user_email", result)
    }

    async fn try_load_user_email(&self) -> FlowResult<Option<Email>> {
        let mut user = self.require_user()?;
        if user.email.is_some() {
            return Ok(user.email);
        }

        let provider_user = self
            .deps
            .custody
            .user(&user.organization.organization_id, &user.user_id)
            .await?;
        user.email = provider_user
            .user_email
            .as_deref()
            .and_then(|e| Email::parse(e).ok());
        let email = user.email.clone();
        self.dispatch(AuthAction::UserUpdated(user))?;
        Ok(email)
    }

    fn require_user(&self) -> FlowResult<User> {
        match &self.state.borrow().phase {
            AuthPhase::Authenticated(user) => Ok(user.clone()),
            _ => Err(ClientError::Unauthorized("no authenticated user".into()).into()),
        }
    }
}
