use crate::config::OAuthConfig;
use crate::error::{AppError, AppResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;
use uuid::Uuid;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// How long an OAuth `state` value stays redeemable
pub const OAUTH_STATE_TTL: Duration = Duration::from_secs(10 * 60);

const REFERRAL_CODE_LEN: usize = 8;

/// Generate a bearer token: 64 hex chars from two v4 UUIDs
pub fn generate_session_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// SHA-256 hex digest of a bearer token. Only the digest is persisted.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Hash a password with Argon2id and a per-password salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| AppError::Message(format!("Failed to build password salt: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Message(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// [`hash_password`] on the blocking pool
pub async fn hash_password_off_runtime(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Message(format!("Password hashing task failed: {}", e)))?
}

/// [`verify_password`] on the blocking pool
pub async fn verify_password_off_runtime(password: String, stored_hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| AppError::Message(format!("Password verification task failed: {}", e)))
}

/// Trim and lower-case an email, rejecting anything without a plausible shape
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::Validation(format!("Invalid email address: {}", email)));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> AppResult<&str> {
    let header = header.ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Malformed authorization header".to_string()))?;
    Ok(token)
}

/// Upper-case alphanumeric code handed out for referrals
pub fn generate_referral_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(REFERRAL_CODE_LEN)
        .collect()
}

/// Build the Google consent URL for a given `state`
pub fn authorization_url(config: &OAuthConfig, state: &str) -> AppResult<String> {
    let url = Url::parse_with_params(
        &config.auth_url,
        &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_url.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", state),
            ("access_type", "online"),
            ("prompt", "select_account"),
        ],
    )
    .map_err(|e| AppError::Config(format!("Invalid GOOGLE_AUTH_URL: {}", e)))?;
    Ok(url.into())
}

/// Outstanding OAuth `state` values, each redeemable once before it expires
pub struct OAuthStateStore {
    states: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
}

impl OAuthStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Mint a fresh state value, dropping any that have expired
    pub async fn issue(&self) -> String {
        let state = Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let mut states = self.states.write().await;
        states.retain(|_, issued| now.duration_since(*issued) < self.ttl);
        states.insert(state.clone(), now);
        state
    }

    /// Redeem a state value. Unknown, reused and expired values are rejected.
    pub async fn consume(&self, state: &str) -> bool {
        let mut states = self.states.write().await;
        match states.remove(state) {
            Some(issued) => issued.elapsed() < self.ttl,
            None => false,
        }
    }

    pub async fn pending(&self) -> usize {
        self.states.read().await.len()
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new(OAUTH_STATE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_shape() {
        let token = generate_session_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_session_token());
    }

    #[test]
    fn test_hash_token_is_stable() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_token("abc"), digest);
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_password_hashing_on_blocking_pool() {
        let hash = hash_password_off_runtime("correct horse".to_string()).await.unwrap();
        assert!(verify_password_off_runtime("correct horse".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_off_runtime("wrong horse".to_string(), hash)
            .await
            .unwrap());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ana@Example.COM ").unwrap(), "ana@example.com");
        assert!(normalize_email("ana.example.com").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ana@example").is_err());
        assert!(normalize_email("ana b@example.com").is_err());
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc123")).unwrap(), "abc123");
        assert!(bearer_token(None).is_err());
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearer   ")).is_err());
    }

    #[test]
    fn test_referral_code_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_authorization_url_carries_state() {
        let config = OAuthConfig {
            client_id: "client-1".to_string(),
            client_secret: "secret".to_string(),
            redirect_url: "http://localhost:8080/api/auth/google/callback".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
        };
        let url = Url::parse(&authorization_url(&config, "xyz").unwrap()).unwrap();
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params.get("state").map(String::as_str), Some("xyz"));
        assert_eq!(params.get("client_id").map(String::as_str), Some("client-1"));
        assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
    }

    #[tokio::test]
    async fn test_oauth_state_is_single_use() {
        let store = OAuthStateStore::default();
        let state = store.issue().await;
        assert_eq!(store.pending().await, 1);
        assert!(store.consume(&state).await);
        assert!(!store.consume(&state).await);
        assert!(!store.consume("never-issued").await);
    }

    #[tokio::test]
    async fn test_oauth_state_expires() {
        let store = OAuthStateStore::new(Duration::from_millis(0));
        let state = store.issue().await;
        assert!(!store.consume(&state).await);
    }
}
