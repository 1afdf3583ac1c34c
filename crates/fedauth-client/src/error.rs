use fedauth_common::{codec::DecodeError, MAX_UID_LEN, RS256};

const PROJECT_ID_MSG: &str = "make sure the ID token comes from the same Firebase project as the \
     credential used to authenticate this SDK";

const VERIFY_TOKEN_MSG: &str = "see https://firebase.google.com/docs/auth/admin/verify-id-tokens \
     for details on how to retrieve a valid ID token";

/// Errors that can happen during client configuration, minting, verification or while communicating over the network.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The uid was empty or too long.
    #[error("uid must be non-empty, and not longer than {MAX_UID_LEN} characters")]
    InvalidUid,

    /// Developer claims used reserved names.
    #[error("{}", reserved_claims_message(.0))]
    ReservedClaims(Vec<String>),

    /// No project id was configured, so ID tokens cannot be verified.
    #[error("project id not available")]
    ProjectIdMissing,

    /// The ID token was an empty string.
    #[error("id token must be a non-empty string")]
    EmptyToken,

    /// A problem with the configured credentials.
    #[error("credentials error: {0}")]
    Credentials(&'static str),

    /// The token could not be split or decoded.
    #[error("malformed token: {0}")]
    Malformed(#[from] DecodeError),

    /// The header names a key that is not in the current public key set.
    #[error("no public key matches key id {0:?}")]
    NoMatchingKey(String),

    /// The signature did not verify against the candidate public key(s).
    #[error("failed to verify token signature")]
    InvalidSignature,

    /// The token verified, but one of its claims is unacceptable.
    #[error(transparent)]
    Claim(#[from] ClaimError),

    /// The token was issued before the user's revocation cutoff.
    #[error("ID token has been revoked")]
    TokenRevoked,

    /// No user record exists for the uid.
    #[error("no user record found for uid {0:?}")]
    UserNotFound(String),

    /// The public key set could not be fetched or parsed.
    #[error("public keys unavailable: {0}")]
    KeysUnavailable(anyhow::Error),

    /// The local private key could not produce a signature.
    #[error("signing error: {0}")]
    Signing(anyhow::Error),

    /// A network problem.
    #[error("network error: {0}")]
    Network(anyhow::Error),

    /// Other type of unclassified error.
    #[error("unclassified error: {0}")]
    Unclassified(anyhow::Error),
}

/// Machine-readable classification of an [Error].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    /// Caller-supplied input or configuration is invalid. Never worth retrying.
    InputValidation,
    /// The token is not a well-formed three-segment JWS.
    StructuralDecode,
    /// Signature or key lookup failed.
    CryptoVerification,
    /// A claim failed semantic validation.
    Claim,
    /// The token was revoked.
    Revocation,
    /// A referenced user does not exist.
    NotFound,
    /// A remote collaborator could not be reached. Safe to retry at the caller's discretion.
    Unavailable,
    /// Anything else.
    Internal,
}

impl Error {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUid
            | Self::ReservedClaims(_)
            | Self::ProjectIdMissing
            | Self::EmptyToken
            | Self::Credentials(_) => ErrorKind::InputValidation,
            Self::Malformed(_) => ErrorKind::StructuralDecode,
            Self::NoMatchingKey(_) | Self::InvalidSignature => ErrorKind::CryptoVerification,
            Self::Claim(_) => ErrorKind::Claim,
            Self::TokenRevoked => ErrorKind::Revocation,
            Self::UserNotFound(_) => ErrorKind::NotFound,
            Self::KeysUnavailable(_) | Self::Network(_) => ErrorKind::Unavailable,
            Self::Signing(_) | Self::Unclassified(_) => ErrorKind::Internal,
        }
    }
}

/// Semantic ID token failures, in the order they are checked.
#[derive(thiserror::Error, Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum ClaimError {
    /// No `kid` header and the audience is the custom token audience.
    #[error("expected an ID token but got a custom token")]
    CustomToken,

    /// No `kid` header.
    #[error("ID token has no 'kid' header")]
    MissingKeyId,

    /// Header algorithm is not RS256.
    #[error("ID token has invalid algorithm; expected '{RS256}' but got {0:?}; {VERIFY_TOKEN_MSG}")]
    Algorithm(String),

    /// Audience is not the configured project.
    #[error(
        "ID token has invalid 'aud' (audience) claim; expected {expected:?} but got {actual:?}; \
         {PROJECT_ID_MSG}; {VERIFY_TOKEN_MSG}"
    )]
    Audience {
        /// The configured project id.
        expected: String,
        /// The token's audience.
        actual: String,
    },

    /// Issuer is not the project's secure token issuer.
    #[error(
        "ID token has invalid 'iss' (issuer) claim; expected {expected:?} but got {actual:?}; \
         {PROJECT_ID_MSG}; {VERIFY_TOKEN_MSG}"
    )]
    Issuer {
        /// The issuer derived from the project id.
        expected: String,
        /// The token's issuer.
        actual: String,
    },

    /// `iat` is ahead of the clock.
    #[error("ID token issued at future timestamp: {0}")]
    IssuedInFuture(i64),

    /// `exp` is behind the clock.
    #[error("ID token has expired at: {0}")]
    Expired(i64),

    /// `sub` is empty.
    #[error("ID token has empty 'sub' (subject) claim; {VERIFY_TOKEN_MSG}")]
    EmptySubject,

    /// `sub` exceeds the uid length limit.
    #[error(
        "ID token has a 'sub' (subject) claim longer than {MAX_UID_LEN} characters; {VERIFY_TOKEN_MSG}"
    )]
    SubjectTooLong,
}

fn reserved_claims_message(names: &[String]) -> String {
    match names {
        [name] => format!("developer claim {name:?} is reserved and cannot be specified"),
        names => format!(
            "developer claims {:?} are reserved and cannot be specified",
            names.join(", ")
        ),
    }
}

pub(crate) fn unclassified(err: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::Unclassified(anyhow::Error::from(err))
}

pub(crate) fn network(err: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::Network(anyhow::Error::from(err))
}

pub(crate) fn keys_unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::KeysUnavailable(anyhow::Error::from(err))
}

pub(crate) fn signing(err: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::Signing(anyhow::Error::from(err))
}
