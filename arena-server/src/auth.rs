use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use arena_types::User;

const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const KEY_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirebaseSignIn {
    pub sign_in_provider: Option<String>,
}

/// Claims carried by an identity-provider ID token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub aud: Option<String>,
    pub iss: Option<String>,
    pub exp: Option<u64>,
    pub sub: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub firebase: FirebaseSignIn,
}

impl IdTokenClaims {
    fn into_user(self) -> Result<User, AuthError> {
        let uid = self
            .sub
            .or(self.user_id)
            .filter(|uid| !uid.is_empty())
            .ok_or(AuthError::InvalidToken)?;

        let is_anonymous = self.firebase.sign_in_provider.as_deref() == Some("anonymous");
        let display_name = self
            .name
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .map(str::to_string)
            })
            .or_else(|| self.phone_number.clone())
            .unwrap_or_else(|| "Player".to_string());

        Ok(User {
            id: uid,
            email: self.email,
            display_name,
            is_anonymous,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwksKey {
    pub kty: String,
    #[serde(rename = "use")]
    pub use_field: Option<String>,
    pub x5c: Option<Vec<String>>,
    pub n: Option<String>,
    pub e: Option<String>,
    pub kid: String,
    pub alg: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<JwksKey>,
}

pub struct AuthService {
    client: Client,
    jwks_cache: Arc<RwLock<HashMap<String, (DecodingKey, SystemTime)>>>,
    project_id: String,
    jwks_url: String,
    dev_mode: bool,
}

impl AuthService {
    pub fn new(project_id: String) -> Self {
        Self {
            client: Client::new(),
            jwks_cache: Arc::new(RwLock::new(HashMap::new())),
            project_id,
            jwks_url: FIREBASE_JWKS_URL.to_string(),
            dev_mode: false,
        }
    }

    pub fn new_dev_mode() -> Self {
        Self {
            client: Client::new(),
            jwks_cache: Arc::new(RwLock::new(HashMap::new())),
            project_id: "dev".to_string(),
            jwks_url: FIREBASE_JWKS_URL.to_string(),
            dev_mode: true,
        }
    }

    pub fn is_dev_mode(&self) -> bool {
        self.dev_mode
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AuthError> {
        if self.dev_mode {
            return self.validate_dev_token(token);
        }

        let header = decode_header(token).map_err(|e| {
            tracing::warn!("Failed to decode JWT header: {:?}", e);
            AuthError::InvalidToken
        })?;
        let kid = header.kid.ok_or_else(|| {
            tracing::warn!("JWT header missing 'kid' field");
            AuthError::InvalidToken
        })?;

        let decoding_key = self.get_decoding_key(&kid).await?;

        let issuer = format!("https://securetoken.google.com/{}", self.project_id);
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[&issuer]);
        validation.validate_exp = true;

        let token_data = decode::<IdTokenClaims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::warn!("ID token validation failed for kid {}: {:?}", kid, e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
                _ => AuthError::InvalidToken,
            }
        })?;

        token_data.claims.into_user()
    }

    async fn get_decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.jwks_cache.read().await;
            if let Some((key, cached_time)) = cache.get(kid) {
                let elapsed = cached_time.elapsed().unwrap_or(KEY_CACHE_TTL);
                if elapsed < KEY_CACHE_TTL {
                    return Ok(key.clone());
                }
                tracing::debug!("Cached key for kid '{}' expired, refetching", kid);
            }
        }

        tracing::debug!("Fetching JWKS from {}", self.jwks_url);
        let response = self.client.get(&self.jwks_url).send().await.map_err(|e| {
            tracing::warn!("Failed to fetch JWKS: {:?}", e);
            AuthError::JwksFetchError
        })?;

        if !response.status().is_success() {
            tracing::warn!("JWKS fetch returned status: {}", response.status());
            return Err(AuthError::JwksFetchError);
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::warn!("Failed to parse JWKS JSON: {:?}", e);
            AuthError::JwksFetchError
        })?;

        let jwks_key = jwks.keys.iter().find(|key| key.kid == kid).ok_or_else(|| {
            tracing::warn!("Key with kid '{}' not found in JWKS", kid);
            AuthError::KeyNotFound
        })?;

        let decoding_key = if let (Some(n), Some(e)) = (&jwks_key.n, &jwks_key.e) {
            DecodingKey::from_rsa_components(n, e).map_err(|e| {
                tracing::warn!("Failed to create decoding key from RSA components: {:?}", e);
                AuthError::InvalidKey
            })?
        } else if let Some(cert) = jwks_key.x5c.as_ref().and_then(|x5c| x5c.first()) {
            let cert_der = base64::engine::general_purpose::STANDARD
                .decode(cert)
                .map_err(|e| {
                    tracing::warn!("Failed to decode x5c certificate: {:?}", e);
                    AuthError::InvalidKey
                })?;
            DecodingKey::from_rsa_der(&cert_der)
        } else {
            tracing::warn!("JWKS key has neither n,e components nor x5c certificate");
            return Err(AuthError::InvalidKey);
        };

        let mut cache = self.jwks_cache.write().await;
        cache.insert(kid.to_string(), (decoding_key.clone(), SystemTime::now()));

        Ok(decoding_key)
    }

    /// Accepts an unsigned JWT, a JSON object, or `uid:email:name`
    fn validate_dev_token(&self, token: &str) -> Result<User, AuthError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() == 3 && !token.contains(':') {
            let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(parts[1].trim_end_matches('='))
                .map_err(|e| {
                    tracing::warn!("Failed to decode JWT payload in dev mode: {:?}", e);
                    AuthError::InvalidToken
                })?;

            let claims: IdTokenClaims = serde_json::from_slice(&payload_bytes).map_err(|e| {
                tracing::warn!("Failed to parse JWT claims in dev mode: {:?}", e);
                AuthError::InvalidToken
            })?;

            return claims.into_user();
        }

        if token.starts_with('{') && token.ends_with('}') {
            #[derive(Deserialize)]
            struct DevClaims {
                user_id: String,
                email: Option<String>,
                name: String,
                #[serde(default)]
                anonymous: bool,
            }

            let claims: DevClaims =
                serde_json::from_str(token).map_err(|_| AuthError::InvalidToken)?;
            if claims.user_id.is_empty() {
                return Err(AuthError::InvalidToken);
            }

            return Ok(User {
                id: claims.user_id,
                email: claims.email,
                display_name: claims.name,
                is_anonymous: claims.anonymous,
            });
        }

        let string_parts: Vec<&str> = token.splitn(3, ':').collect();
        match string_parts.as_slice() {
            [uid, email, name] if !uid.is_empty() => Ok(User {
                id: uid.to_string(),
                email: (!email.is_empty()).then(|| email.to_string()),
                display_name: name.to_string(),
                is_anonymous: email.is_empty(),
            }),
            _ => Err(AuthError::InvalidToken),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Failed to fetch JWKS")]
    JwksFetchError,
    #[error("Key not found")]
    KeyNotFound,
    #[error("Invalid key")]
    InvalidKey,
    #[error("Audience mismatch")]
    AudienceMismatch,
    #[error("Issuer mismatch")]
    IssuerMismatch,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AuthError::InvalidKey
    }
}
