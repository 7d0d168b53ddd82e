use crate::claims::{Claim, Claims, Role};
use crate::error::CrudError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use service_core::config::Environment;
use service_core::error::AppError;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Registered JWT claim names; everything else in a payload is a [`Claim`].
const REGISTERED_CLAIMS: [&str; 7] = ["iss", "aud", "sub", "nbf", "exp", "iat", "jti"];

/// The `jwt` configuration section. Expiries are in minutes.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_windows"))]
pub struct JwtConfig {
    #[validate(length(min = 1))]
    pub audience: String,
    #[validate(length(min = 1))]
    pub issuer: String,
    /// Environment variable holding the signing key.
    #[validate(length(min = 1))]
    pub key_name: String,
    #[serde(default = "default_access_token_expires")]
    #[validate(range(min = 1))]
    pub access_token_expires: i64,
    #[serde(default = "default_refresh_token_expires")]
    #[validate(range(min = 1))]
    pub refresh_token_expires: i64,
    /// Leeway applied to `nbf`/`exp` checks. Zero keeps the access and
    /// refresh windows strictly back to back.
    #[serde(default)]
    pub clock_skew_seconds: u64,
}

fn default_access_token_expires() -> i64 {
    15
}

fn default_refresh_token_expires() -> i64 {
    7 * 24 * 60
}

fn validate_windows(config: &JwtConfig) -> Result<(), ValidationError> {
    if config.refresh_token_expires <= config.access_token_expires {
        return Err(ValidationError::new("refresh_window_empty"));
    }
    Ok(())
}

/// Access/refresh token pair returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
}

/// A freshly issued pair plus the bookkeeping values behind it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: Token,
    pub refresh_token_id: String,
    pub access_expires: DateTime<Utc>,
    pub refresh_expires: DateTime<Utc>,
}

/// Result of [`JwtTokenService::decode`]. Never trust it for authorization.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub claims: Claims,
    pub not_before: Option<i64>,
    pub expires: Option<i64>,
}

impl DecodedToken {
    fn from_payload(payload: &Map<String, Value>) -> Self {
        Self {
            claims: claims_from_payload(payload),
            not_before: payload.get("nbf").and_then(Value::as_i64),
            expires: payload.get("exp").and_then(Value::as_i64),
        }
    }
}

#[derive(Clone)]
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    audience: String,
    issuer: String,
    access_token_expires: Duration,
    refresh_token_expires: Duration,
    leeway: u64,
}

impl JwtTokenService {
    pub fn new(config: &JwtConfig, key: &[u8]) -> Result<Self, AppError> {
        config.validate()?;
        if key.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT signing key '{}' is empty",
                config.key_name
            )));
        }

        tracing::info!(issuer = %config.issuer, audience = %config.audience, "JWT service initialized with HS256 key");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            audience: config.audience.clone(),
            issuer: config.issuer.clone(),
            access_token_expires: Duration::minutes(config.access_token_expires),
            refresh_token_expires: Duration::minutes(config.refresh_token_expires),
            leeway: config.clock_skew_seconds,
        })
    }

    /// Reads the signing key from the variable named by `config.key_name`.
    pub fn from_environment(config: &JwtConfig, env: &dyn Environment) -> Result<Self, AppError> {
        let key = env.get(&config.key_name)?;
        Self::new(config, key.as_bytes())
    }

    pub fn create_token(&self, id: &str, display_name: &str, claims: &[Claim]) -> Result<Token, CrudError> {
        Ok(self.issue_at(id, display_name, claims, Utc::now())?.token)
    }

    /// Issues a pair as of `now`.
    ///
    /// Both tokens carry `Name`, `UserId` and one shared `RefreshTokenId`.
    /// The access token adds the caller's claims and `Role=Accessor`, valid
    /// from `now`. `Accessor`/`Refresher` among the caller's claims are
    /// dropped. The refresh token adds only `Role=Refresher` and becomes
    /// valid exactly when the access token expires.
    pub fn issue_at(
        &self,
        id: &str,
        display_name: &str,
        claims: &[Claim],
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, CrudError> {
        let refresh_token_id = Uuid::new_v4().to_string();
        let defaults = Claims::new()
            .with(Claim::name(display_name))
            .with(Claim::user_id(id))
            .with(Claim::refresh_token_id(&refresh_token_id));

        let accessor = Claim::role(&Role::ACCESSOR);
        let mut access_claims = defaults.clone();
        let granted = claims.iter().filter(|claim| !claim.is_token_role());
        for claim in granted.chain(std::iter::once(&accessor)) {
            if !access_claims.contains(claim) {
                access_claims.push(claim.clone());
            }
        }
        let refresh_claims = defaults.with(Claim::role(&Role::REFRESHER));

        let access_expires = now + self.access_token_expires;
        let refresh_expires = now + self.refresh_token_expires;

        let token = Token {
            access_token: self.sign(&access_claims, now, now, access_expires)?,
            refresh_token: self.sign(&refresh_claims, now, access_expires, refresh_expires)?,
        };

        Ok(IssuedToken {
            token,
            refresh_token_id,
            access_expires,
            refresh_expires,
        })
    }

    fn sign(
        &self,
        claims: &Claims,
        issued_at: DateTime<Utc>,
        not_before: DateTime<Utc>,
        expires: DateTime<Utc>,
    ) -> Result<String, CrudError> {
        let mut payload = payload_from_claims(claims);
        payload.insert("iss".to_string(), Value::from(self.issuer.as_str()));
        payload.insert("aud".to_string(), Value::from(self.audience.as_str()));
        payload.insert("iat".to_string(), Value::from(issued_at.timestamp()));
        payload.insert("nbf".to_string(), Value::from(not_before.timestamp()));
        payload.insert("exp".to_string(), Value::from(expires.timestamp()));

        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|e| CrudError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Verifies signature, issuer, audience and validity window.
    pub fn validate(&self, token: &str) -> Result<Claims, CrudError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = self.leeway;

        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::warn!(reason = %e, "Rejected bearer token");
            CrudError::Unauthorized("Invalid or expired token".to_string())
        })?;

        Ok(claims_from_payload(&data.claims))
    }

    /// Reads a token's payload without verifying anything. For display only.
    pub fn decode(token: &str) -> Result<DecodedToken, CrudError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let data = decode::<Map<String, Value>>(token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| CrudError::BadRequest(format!("Malformed token: {}", e)))?;

        Ok(DecodedToken::from_payload(&data.claims))
    }
}

/// One payload member per claim type: a string for a single value, an
/// array when the type repeats.
fn payload_from_claims(claims: &Claims) -> Map<String, Value> {
    let mut payload = Map::new();
    for claim in claims {
        if REGISTERED_CLAIMS.contains(&claim.kind.as_str()) {
            continue;
        }
        let value = Value::from(claim.value.as_str());
        match payload.get_mut(&claim.kind) {
            None => {
                payload.insert(claim.kind.clone(), value);
            }
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    payload
}

fn claims_from_payload(payload: &Map<String, Value>) -> Claims {
    let mut claims = Claims::new();
    for (kind, value) in payload {
        if REGISTERED_CLAIMS.contains(&kind.as_str()) {
            continue;
        }
        match value {
            Value::String(single) => claims.push(Claim::new(kind.as_str(), single.as_str())),
            Value::Array(values) => claims.extend(
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|v| Claim::new(kind.as_str(), v)),
            ),
            _ => {}
        }
    }
    claims
}
