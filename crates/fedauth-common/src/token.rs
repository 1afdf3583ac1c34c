//! Decoded ID token and JWT header types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{self, DecodeError};

/// Claim names lifted into the typed fields of [Token] and removed from [Token::claims].
pub const STANDARD_CLAIMS: [&str; 6] = ["iss", "aud", "exp", "iat", "sub", "uid"];

/// The JOSE header of a compact token.
///
/// Decoded from untrusted input: nothing in here means anything until the verifier has checked it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    /// Signature algorithm.
    #[serde(default)]
    pub alg: String,

    /// Token type, `JWT` for everything minted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Identifier of the key that produced the signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Header {
    /// The header written into every minted custom token.
    pub fn rs256_jwt() -> Self {
        Self {
            alg: crate::RS256.to_string(),
            typ: Some("JWT".to_string()),
            kid: None,
        }
    }

    /// The key id, treating an empty string the same as an absent one.
    pub fn key_id(&self) -> Option<&str> {
        self.kid.as_deref().filter(|kid| !kid.is_empty())
    }
}

/// A decoded ID token.
///
/// Typed accessors cover the standard fields. Every other payload member ends up in [Token::claims].
/// Instances handed out by the verifier always have `uid == sub`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Token {
    /// Issuer (`iss`).
    #[serde(default)]
    pub iss: String,

    /// Audience (`aud`).
    #[serde(default)]
    pub aud: String,

    /// Expiry (`exp`), unix seconds.
    #[serde(default)]
    pub exp: i64,

    /// Issued at (`iat`), unix seconds.
    #[serde(default)]
    pub iat: i64,

    /// Subject (`sub`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub: String,

    /// User id of the account the token belongs to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,

    /// Custom claims.
    #[serde(skip)]
    pub claims: Map<String, Value>,
}

impl Token {
    /// Decode a payload segment into the typed fields and the remaining custom claims.
    ///
    /// The segment is decoded twice, once into the struct and once into an open map,
    /// and the standard names are then deleted from the map.
    pub fn from_payload_segment(segment: &str) -> Result<Self, DecodeError> {
        let mut token: Token = codec::decode_segment(segment)?;
        let mut claims: Map<String, Value> = codec::decode_segment(segment)?;
        for name in STANDARD_CLAIMS {
            claims.remove(name);
        }
        token.claims = claims;
        Ok(token)
    }
}
