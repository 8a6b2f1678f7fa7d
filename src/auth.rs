//! Bearer-token authentication
//!
//! Verifies HS256-signed JWTs against the shared secret and produces the
//! calling educator's identity. Identity is threaded explicitly into each
//! handler via the [`Educator`] extractor rather than stashed in ambient
//! request state; every protected route names it in its signature.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Role claim value that bypasses school-scope checks
pub const ADMINISTRATOR_ROLE: &str = "Administrator";

/// Verified caller identity, request-scoped and never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Educator {
    pub id: String,
    pub name: String,
    pub role: String,
    pub school_id: String,
}

impl Educator {
    /// Whether this caller holds the administrator role
    pub fn is_administrator(&self) -> bool {
        self.role == ADMINISTRATOR_ROLE
    }
}

/// JWT claim set issued by the identity collaborator
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: educator id
    pub sub: String,
    pub name: String,
    pub role: String,
    pub school_id: String,
    /// Expiry as unix seconds; validated by jsonwebtoken
    pub exp: i64,
}

/// Stateless token verifier shared across requests
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // The identity collaborator does not stamp aud/iss on service tokens
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a raw bearer token and extract the educator identity.
    ///
    /// All verification failures (malformed, expired, bad signature) collapse
    /// into `InvalidCredential`; callers are not told which check failed.
    pub fn verify(&self, token: &str) -> Result<Educator, AppError> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AppError::InvalidCredential("token verification failed".into()))?;

        let claims = decoded.claims;
        Ok(Educator {
            id: claims.sub,
            name: claims.name,
            role: claims.role,
            school_id: claims.school_id,
        })
    }
}

/// Extract a bearer token from the Authorization header.
///
/// Any extraction failure is `Unauthenticated` (401): a missing or empty
/// header, a non-Bearer scheme, or an empty Bearer value all mean no bearer
/// credential was presented. `InvalidCredential` (403) is reserved for
/// tokens that reach verification and fail it.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let authz = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("missing Authorization header".into()))?;

    let token = authz
        .strip_prefix("Bearer ")
        .or_else(|| authz.strip_prefix("bearer "))
        .ok_or_else(|| {
            AppError::Unauthenticated("Authorization header carries no Bearer token".into())
        })?;

    if token.trim().is_empty() {
        return Err(AppError::Unauthenticated("Bearer token is empty".into()));
    }

    Ok(token.to_string())
}

/// Axum extractor: authenticates the request and yields the educator.
///
/// Runs before the handler body, so a failed extraction short-circuits the
/// pipeline without touching storage or the generation service.
impl<S> FromRequestParts<S> for Educator
where
    TokenVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let verifier = TokenVerifier::from_ref(state);
        verifier.verify(&token)
    }
}
