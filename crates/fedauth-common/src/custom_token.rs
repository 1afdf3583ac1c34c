//! Outbound custom token claims.

use serde::Serialize;
use serde_json::{Map, Value};

/// Claim names developers may not set on a custom token.
///
/// Violations are reported in this order.
pub const RESERVED_CLAIMS: [&str; 16] = [
    "acr", "amr", "at_hash", "aud", "auth_time", "azp", "cnf", "c_hash", "exp", "firebase", "iat",
    "iss", "jti", "nbf", "nonce", "sub",
];

/// Payload of a minted custom token.
#[derive(Serialize, Clone, Debug)]
pub struct CustomTokenClaims {
    /// Issuer, the signing service account.
    pub iss: String,

    /// Subject, the signing service account.
    pub sub: String,

    /// Always [crate::FIREBASE_AUDIENCE].
    pub aud: String,

    /// The user the token is minted for.
    pub uid: String,

    /// Issued at, unix seconds.
    pub iat: i64,

    /// Expiry, unix seconds.
    pub exp: i64,

    /// Developer claims, written next to the standard ones.
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl CustomTokenClaims {
    /// Build the claims for `uid`, signed as `issuer`, issued at `iat`.
    pub fn new(issuer: String, uid: String, iat: i64, claims: Map<String, Value>) -> Self {
        Self {
            sub: issuer.clone(),
            iss: issuer,
            aud: crate::FIREBASE_AUDIENCE.to_string(),
            uid,
            iat,
            exp: iat + crate::TOKEN_EXP_SECONDS,
            claims,
        }
    }
}

/// Returns the reserved names present in `claims`, in [RESERVED_CLAIMS] order.
pub fn reserved_claims_in(claims: &Map<String, Value>) -> Vec<&'static str> {
    RESERVED_CLAIMS
        .iter()
        .copied()
        .filter(|name| claims.contains_key(*name))
        .collect()
}
