//! `fedauth-common` defines the token datatypes and the compact-JWS codec shared by the fedauth crates.
//!
//! Nothing in this crate performs I/O. Signing and verification live in `fedauth-client`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod custom_token;
pub mod token;

/// Audience of custom tokens minted for the Identity Toolkit token exchange.
pub const FIREBASE_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Endpoint publishing the X.509 certificates that sign ID tokens.
pub const ID_TOKEN_CERT_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

/// ID tokens are issued by this prefix followed by the project id.
pub const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Lifetime of a minted custom token.
pub const TOKEN_EXP_SECONDS: i64 = 3600;

/// Upper bound on the length of a uid, both when minting and for the `sub` claim of ID tokens.
pub const MAX_UID_LEN: usize = 128;

/// The only JWS algorithm accepted or produced.
pub const RS256: &str = "RS256";
