use crate::auth::{self, OAuthStateStore};
use crate::config::OAuthConfig;
use crate::error::{AppError, AppResult};
use crate::models::{CreditKind, NewUser, PublicUser, User};
use crate::repositories::{CreditEntry, CreditRepository, SessionRepository, SettingsRepository, UserRepository};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

const OAUTH_PROVIDER: &str = "google";
const REFERRAL_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub referral_code: Option<String>,
}

/// Bearer token plus the user it authenticates
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: NaiveDateTime,
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

/// Service for accounts, sessions and Google sign-in
pub struct AuthService {
    pool: PgPool,
    user_repo: Arc<UserRepository>,
    session_repo: Arc<SessionRepository>,
    credit_repo: Arc<CreditRepository>,
    settings_repo: Arc<SettingsRepository>,
    oauth: Option<OAuthConfig>,
    oauth_states: OAuthStateStore,
    http: reqwest::Client,
    session_ttl: chrono::Duration,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        user_repo: Arc<UserRepository>,
        session_repo: Arc<SessionRepository>,
        credit_repo: Arc<CreditRepository>,
        settings_repo: Arc<SettingsRepository>,
        oauth: Option<OAuthConfig>,
        session_ttl: chrono::Duration,
    ) -> Self {
        Self {
            pool,
            user_repo,
            session_repo,
            credit_repo,
            settings_repo,
            oauth,
            oauth_states: OAuthStateStore::default(),
            http: reqwest::Client::new(),
            session_ttl,
        }
    }

    /// Create a password account, pay the signup bonus and any referral reward
    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthSession> {
        let email = auth::normalize_email(&request.email)?;
        auth::validate_password(&request.password)?;
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }

        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("An account with this email already exists".to_string()));
        }

        let referrer = match request.referral_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(
                self.user_repo
                    .find_by_referral_code(code)
                    .await?
                    .ok_or_else(|| AppError::Validation(format!("Unknown referral code: {}", code)))?,
            ),
            _ => None,
        };

        let new_user = NewUser {
            email,
            name,
            phone: request.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            password_hash: Some(auth::hash_password_off_runtime(request.password).await?),
            oauth_provider: None,
            oauth_subject: None,
            referral_code: self.unused_referral_code().await?,
            referred_by: referrer.as_ref().map(|r| r.id),
        };

        let user = self.create_account(new_user, referrer.as_ref()).await?;
        info!("Registered user {} ({})", user.id, user.email);
        self.open_session(&user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

        let user = self.user_repo.find_by_email(email).await?.ok_or_else(invalid)?;
        let verified = match user.password_hash.clone() {
            Some(hash) => auth::verify_password_off_runtime(password.to_string(), hash).await?,
            None => false,
        };
        if !verified {
            warn!("Failed login for {}", user.id);
            return Err(invalid());
        }

        info!("User {} logged in", user.id);
        self.open_session(&user).await
    }

    pub async fn logout(&self, token: &str) -> AppResult<()> {
        self.session_repo.delete(&auth::hash_token(token)).await?;
        Ok(())
    }

    /// Resolve a bearer token to its user. Expired sessions are deleted on sight.
    pub async fn authenticate(&self, token: &str) -> AppResult<User> {
        let token_hash = auth::hash_token(token);
        let session = self
            .session_repo
            .find(&token_hash)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid session".to_string()))?;

        if session.is_expired_at(Utc::now().naive_utc()) {
            self.session_repo.delete(&token_hash).await?;
            return Err(AppError::Unauthorized("Session expired".to_string()));
        }

        self.user_repo
            .find_by_id(session.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid session".to_string()))
    }

    /// Purge expired sessions; returns how many were removed
    pub async fn purge_expired_sessions(&self) -> AppResult<u64> {
        Ok(self.session_repo.delete_expired(Utc::now().naive_utc()).await?)
    }

    pub fn oauth_enabled(&self) -> bool {
        self.oauth.is_some()
    }

    /// Consent URL for Google sign-in with a fresh single-use state
    pub async fn google_authorization_url(&self) -> AppResult<String> {
        let config = self.oauth_config()?;
        let state = self.oauth_states.issue().await;
        auth::authorization_url(config, &state)
    }

    /// Finish Google sign-in: check state, exchange the code, then find or create the user
    pub async fn complete_oauth(&self, code: &str, state: &str) -> AppResult<AuthSession> {
        let config = self.oauth_config()?;
        if !self.oauth_states.consume(state).await {
            return Err(AppError::Unauthorized("Invalid or expired OAuth state".to_string()));
        }

        let profile = self.fetch_google_profile(config, code).await?;
        if profile.email_verified == Some(false) {
            return Err(AppError::Unauthorized("Google email is not verified".to_string()));
        }

        let user = match self.user_repo.find_by_oauth(OAUTH_PROVIDER, &profile.sub).await? {
            Some(user) => user,
            None => match self.user_repo.find_by_email(&profile.email).await? {
                Some(existing) => {
                    info!("Linking Google identity to existing user {}", existing.id);
                    self.user_repo
                        .link_oauth(existing.id, OAUTH_PROVIDER, &profile.sub)
                        .await?
                }
                None => {
                    let email = auth::normalize_email(&profile.email)?;
                    let name = profile
                        .name
                        .clone()
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or_else(|| email.split('@').next().unwrap_or("reader").to_string());
                    let new_user = NewUser {
                        email,
                        name,
                        phone: None,
                        password_hash: None,
                        oauth_provider: Some(OAUTH_PROVIDER.to_string()),
                        oauth_subject: Some(profile.sub.clone()),
                        referral_code: self.unused_referral_code().await?,
                        referred_by: None,
                    };
                    let user = self.create_account(new_user, None).await?;
                    info!("Registered user {} via Google", user.id);
                    user
                }
            },
        };

        self.open_session(&user).await
    }

    fn oauth_config(&self) -> AppResult<&OAuthConfig> {
        self.oauth
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("Google sign-in is not configured".to_string()))
    }

    async fn fetch_google_profile(&self, config: &OAuthConfig, code: &str) -> AppResult<GoogleProfile> {
        let token: TokenResponse = self
            .http
            .post(&config.token_url)
            .form(&[
                ("code", code),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
                ("redirect_uri", config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Token exchange failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::ExternalService(format!("Token exchange rejected: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Malformed token response: {}", e)))?;

        self.http
            .get(&config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Profile request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::ExternalService(format!("Profile request rejected: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Malformed profile response: {}", e)))
    }

    /// Insert the user with a credits row and the configured welcome rewards, atomically
    async fn create_account(&self, new_user: NewUser, referrer: Option<&User>) -> AppResult<User> {
        let settings = self.settings_repo.get().await?;
        let mut tx = self.pool.begin().await?;

        let user = self.user_repo.create_in(&mut tx, &new_user).await?;
        self.credit_repo.ensure_account_in(&mut tx, user.id).await?;

        if settings.signup_bonus > 0 {
            let entry = CreditEntry::new(CreditKind::SignupBonus).describe("Welcome bonus");
            self.credit_repo
                .award_in(&mut tx, user.id, settings.signup_bonus, entry)
                .await?;
        }

        if let Some(referrer) = referrer {
            if settings.referral_reward > 0 {
                let entry = CreditEntry::new(CreditKind::Referral)
                    .describe("Referral reward")
                    .reference(user.id);
                self.credit_repo
                    .award_in(&mut tx, referrer.id, settings.referral_reward, entry)
                    .await?;
                info!("Referral reward for {} (referred {})", referrer.id, user.id);
            }
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn open_session(&self, user: &User) -> AppResult<AuthSession> {
        let token = auth::generate_session_token();
        let expires_at = Utc::now().naive_utc() + self.session_ttl;
        self.session_repo
            .create(&auth::hash_token(&token), user.id, expires_at)
            .await?;

        Ok(AuthSession {
            token,
            expires_at,
            user: user.public(),
        })
    }

    async fn unused_referral_code(&self) -> AppResult<String> {
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let code = auth::generate_referral_code();
            if self.user_repo.find_by_referral_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(AppError::Message("Could not allocate a referral code".to_string()))
    }
}
