//! Bearer-token guard for the review API.
//!
//! Tokens are issued by the external login service and signed with a shared
//! HS256 secret. This module only validates them and extracts the principal.

use std::collections::BTreeSet;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::state::AppState;

const ROLE_PREFIX: &str = "ROLE_";
const SCOPE_PREFIX: &str = "SCOPE_";
const ANONYMOUS: &str = "anonymous";

/// A claim that may be sent as a single string or a list of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<Value>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RealmAccess {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    roles: Option<OneOrMany>,
    realm_access: Option<RealmAccess>,
    authorities: Option<Vec<String>>,
    scope: Option<String>,
    scp: Option<OneOrMany>,
}

impl Claims {
    /// Merges every role and scope claim into prefixed authorities.
    fn authorities(self) -> BTreeSet<String> {
        let mut roles: Vec<String> = Vec::new();
        if let Some(r) = self.roles {
            roles.extend(r.into_vec());
        }
        if let Some(realm) = self.realm_access {
            roles.extend(realm.roles);
        }
        if let Some(auths) = self.authorities {
            roles.extend(auths);
        }

        let mut authorities: BTreeSet<String> = roles
            .into_iter()
            .map(|r| {
                if r.starts_with(ROLE_PREFIX) {
                    r
                } else {
                    format!("{ROLE_PREFIX}{r}")
                }
            })
            .collect();

        let scopes = match (self.scope, self.scp) {
            (Some(scope), _) => scope.split_whitespace().map(str::to_string).collect(),
            (None, Some(OneOrMany::One(scp))) => {
                scp.split_whitespace().map(str::to_string).collect()
            }
            (None, Some(many)) => many.into_vec(),
            (None, None) => Vec::new(),
        };
        authorities.extend(scopes.into_iter().map(|s| format!("{SCOPE_PREFIX}{s}")));

        authorities
    }
}

/// Authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub roles: BTreeSet<String>,
}

impl Principal {
    fn anonymous() -> Self {
        Self {
            subject: ANONYMOUS.to_string(),
            roles: BTreeSet::new(),
        }
    }
}

/// Validates HS256 tokens (signature and expiry).
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Principal, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            warn!("Invalid JWT: {e}");
            AppError::Unauthorized
        })?;

        let claims = data.claims;
        let subject = claims.sub.clone();
        Ok(Principal {
            subject,
            roles: claims.authorities(),
        })
    }
}

/// Token from an `Authorization` value; the scheme name is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim_start().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let Some(verifier) = state.auth.as_ref() else {
            return Ok(Principal::anonymous());
        };

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| {
                debug!("Missing bearer token for {}", parts.uri.path());
                AppError::Unauthorized
            })?;

        verifier.verify(token)
    }
}
