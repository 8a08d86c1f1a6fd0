pub mod password;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::database::models::{Operator, Party, User, DEFAULT_OPERATOR_ROLE};

/// Token lifetime when nothing else is configured.
pub const DEFAULT_TOKEN_EXPIRY_HOURS: u64 = 24;

/// Longest accepted token lifetime (one leap year).
pub const MAX_TOKEN_EXPIRY_HOURS: u64 = 24 * 366;

/// Role carried by a token. Mirrors the two conversation parties.
pub type Role = Party;

/// The authenticated principal behind a token.
///
/// The variant decides both the `role` claim and which identity claim is
/// written, so a token can never carry both or neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User { telegram_id: String },
    Operator { username: String },
}

impl Identity {
    pub fn user(telegram_id: impl Into<String>) -> Self {
        Identity::User {
            telegram_id: telegram_id.into(),
        }
    }

    pub fn operator(username: impl Into<String>) -> Self {
        Identity::Operator {
            username: username.into(),
        }
    }

    pub fn from_user(user: &User) -> Self {
        Self::user(user.telegram_id.clone())
    }

    /// Operators whose stored role is not `operator` cannot hold a token.
    pub fn from_operator(operator: &Operator) -> Result<Self, TokenError> {
        if operator.role != DEFAULT_OPERATOR_ROLE {
            return Err(TokenError::UnsupportedIdentity(format!(
                "operator '{}' has role '{}'",
                operator.username, operator.role
            )));
        }
        Ok(Self::operator(operator.username.clone()))
    }

    pub fn role(&self) -> Role {
        match self {
            Identity::User { .. } => Party::User,
            Identity::Operator { .. } => Party::Operator,
        }
    }

    /// Value of the role-specific claim (telegram id or username).
    pub fn claim_value(&self) -> &str {
        match self {
            Identity::User { telegram_id } => telegram_id,
            Identity::Operator { username } => username,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role(), self.claim_value())
    }
}

/// Signed token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(identity: &Identity, now: DateTime<Utc>, lifetime: Duration) -> Self {
        let (telegram_id, username) = match identity {
            Identity::User { telegram_id } => (Some(telegram_id.clone()), None),
            Identity::Operator { username } => (None, Some(username.clone())),
        };

        Self {
            role: Some(identity.role().as_str().to_string()),
            telegram_id,
            username,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        }
    }
}

impl TryFrom<Claims> for Identity {
    type Error = TokenError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        fn present(value: Option<String>, name: &'static str) -> Result<String, TokenError> {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or(TokenError::ClaimMissing(name))
        }

        match claims.role.as_deref() {
            Some("user") => Ok(Identity::User {
                telegram_id: present(claims.telegram_id, "telegram_id")?,
            }),
            Some("operator") => Ok(Identity::Operator {
                username: present(claims.username, "username")?,
            }),
            Some(other) if !other.trim().is_empty() => Err(TokenError::UnsupportedRole(other.to_string())),
            _ => Err(TokenError::ClaimMissing("role")),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Unsupported identity: {0}")]
    UnsupportedIdentity(String),

    #[error("Unsupported role: {0}")]
    UnsupportedRole(String),

    #[error("Invalid or expired token: {0}")]
    TokenInvalid(String),

    #[error("Token is missing the '{0}' claim")]
    ClaimMissing(&'static str),

    #[error("Token lifetime of {0} hours is out of range")]
    InvalidLifetime(u64),

    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("JWT generation error: {0}")]
    Signing(String),
}

/// Issues and validates HMAC-signed bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(secret: &str, expiry_hours: u64) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        if expiry_hours == 0 || expiry_hours > MAX_TOKEN_EXPIRY_HOURS {
            return Err(TokenError::InvalidLifetime(expiry_hours));
        }

        // Any HMAC variant verifies against the shared secret; every other
        // algorithm family is refused before the signature is checked.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.validate_exp = true;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime: Duration::hours(expiry_hours as i64),
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, TokenError> {
        Self::new(&security.jwt_secret, security.jwt_expiry_hours)
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    pub fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims::new(identity, now, self.lifetime);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verifies signature, algorithm and expiry, then binds role to claim.
    pub fn validate(&self, token: &str) -> Result<Identity, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::TokenInvalid(e.to_string()))?;

        Identity::try_from(data.claims)
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime_hours", &self.lifetime.num_hours())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    fn service() -> TokenService {
        TokenService::new(SECRET, DEFAULT_TOKEN_EXPIRY_HOURS).unwrap()
    }

    fn sign_raw(claims: &serde_json::Value, alg: Algorithm, secret: &str) -> String {
        encode(&Header::new(alg), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn round_trips_both_identities() {
        let tokens = service();
        for identity in [Identity::user("123"), Identity::operator("operator1")] {
            let token = tokens.issue(&identity).unwrap();
            assert_eq!(tokens.validate(&token).unwrap(), identity);
        }
    }

    #[test]
    fn claims_carry_exactly_one_identity() {
        let now = Utc::now();
        let user = Claims::new(&Identity::user("42"), now, Duration::hours(24));
        assert_eq!(user.role.as_deref(), Some("user"));
        assert_eq!(user.telegram_id.as_deref(), Some("42"));
        assert!(user.username.is_none());
        assert_eq!(user.exp - user.iat, 24 * 3600);

        let op = Claims::new(&Identity::operator("op"), now, Duration::hours(24));
        assert_eq!(op.role.as_deref(), Some("operator"));
        assert!(op.telegram_id.is_none());
        assert_eq!(op.username.as_deref(), Some("op"));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service();
        let issued = Utc::now() - Duration::hours(25);
        let token = tokens.issue_at(&Identity::user("123"), issued).unwrap();
        assert!(matches!(tokens.validate(&token), Err(TokenError::TokenInvalid(_))));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let other = TokenService::new("some-other-secret", 24).unwrap();
        let token = other.issue(&Identity::operator("operator1")).unwrap();
        assert!(matches!(service().validate(&token), Err(TokenError::TokenInvalid(_))));
    }

    #[test]
    fn other_hmac_variants_are_accepted() {
        let claims = serde_json::to_value(Claims::new(
            &Identity::user("7"),
            Utc::now(),
            Duration::hours(1),
        ))
        .unwrap();
        let token = sign_raw(&claims, Algorithm::HS512, SECRET);
        assert_eq!(service().validate(&token).unwrap(), Identity::user("7"));
    }

    #[test]
    fn non_hmac_headers_are_rejected() {
        let token = service().issue(&Identity::operator("operator1")).unwrap();
        let mut parts = token.splitn(3, '.');
        let _header = parts.next().unwrap();
        let payload = parts.next().unwrap();
        let signature = parts.next().unwrap();

        // {"alg":"RS256","typ":"JWT"} and {"alg":"none","typ":"JWT"}
        for header in ["eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9", "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0"] {
            let forged = format!("{}.{}.{}", header, payload, signature);
            assert!(matches!(service().validate(&forged), Err(TokenError::TokenInvalid(_))));
        }
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(matches!(service().validate("not-a-jwt"), Err(TokenError::TokenInvalid(_))));
    }

    #[test]
    fn missing_claims_are_reported() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let iat = Utc::now().timestamp();

        let no_role = serde_json::json!({ "telegram_id": "1", "iat": iat, "exp": exp });
        let token = sign_raw(&no_role, Algorithm::HS256, SECRET);
        assert!(matches!(service().validate(&token), Err(TokenError::ClaimMissing("role"))));

        let blank_role = serde_json::json!({ "role": " ", "username": "root", "iat": iat, "exp": exp });
        let token = sign_raw(&blank_role, Algorithm::HS256, SECRET);
        assert!(matches!(service().validate(&token), Err(TokenError::ClaimMissing("role"))));

        let empty_id = serde_json::json!({ "role": "user", "telegram_id": "", "iat": iat, "exp": exp });
        let token = sign_raw(&empty_id, Algorithm::HS256, SECRET);
        assert!(matches!(service().validate(&token), Err(TokenError::ClaimMissing("telegram_id"))));

        // Role and claim must agree: an operator role with only a telegram id is incomplete.
        let crossed = serde_json::json!({ "role": "operator", "telegram_id": "1", "iat": iat, "exp": exp });
        let token = sign_raw(&crossed, Algorithm::HS256, SECRET);
        assert!(matches!(service().validate(&token), Err(TokenError::ClaimMissing("username"))));
    }

    #[test]
    fn unknown_role_is_unsupported() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let claims = serde_json::json!({ "role": "admin", "username": "operator1", "iat": Utc::now().timestamp(), "exp": exp });
        let token = sign_raw(&claims, Algorithm::HS256, SECRET);
        match service().validate(&token) {
            Err(TokenError::UnsupportedRole(role)) => assert_eq!(role, "admin"),
            other => panic!("expected UnsupportedRole, got {:?}", other),
        }
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(TokenService::new("", 24), Err(TokenError::MissingSecret)));
    }

    #[test]
    fn lifetime_is_bounded() {
        assert!(matches!(TokenService::new(SECRET, 0), Err(TokenError::InvalidLifetime(0))));
        assert!(matches!(
            TokenService::new(SECRET, u64::MAX),
            Err(TokenError::InvalidLifetime(u64::MAX))
        ));
        let longest = TokenService::new(SECRET, MAX_TOKEN_EXPIRY_HOURS).unwrap();
        assert_eq!(longest.lifetime().num_hours(), MAX_TOKEN_EXPIRY_HOURS as i64);
    }

    #[test]
    fn operator_with_foreign_role_cannot_hold_a_token() {
        let now = Utc::now();
        let mut operator = Operator {
            id: 1,
            username: "auditor".to_string(),
            password_hash: String::new(),
            role: "auditor".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        assert!(matches!(
            Identity::from_operator(&operator),
            Err(TokenError::UnsupportedIdentity(_))
        ));

        operator.role = DEFAULT_OPERATOR_ROLE.to_string();
        assert_eq!(Identity::from_operator(&operator).unwrap(), Identity::operator("auditor"));
    }
}
