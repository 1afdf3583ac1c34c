//! `fedauth-client` mints custom tokens and verifies ID tokens for a federated identity service.
//!
//! Verification is local: ID token signatures are checked against the authority's published
//! certificates, which are cached for as long as the authority allows.
//!
//! ```no_run
//! # async fn example() -> Result<(), fedauth_client::Error> {
//! let client = fedauth_client::Client::builder()
//!     .from_environment()?
//!     .build()?;
//!
//! let custom_token = client.custom_token("some-uid").await?;
//! let token = client.verify_id_token("eyJhbGciOiJSUzI1NiIs...").await?;
//! println!("{} signed in", token.uid);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::{future::Future, pin::Pin, sync::Arc};

use clock::Clock;
use key_source::KeySource;
use signer::Signer;
use users::UserRecords;

pub use builder::ClientBuilder;
pub use credentials::ServiceAccountKey;
pub use error::{ClaimError, Error, ErrorKind};
pub use fedauth_common::token::Token;

mod builder;
mod credentials;
mod error;
mod mint;
mod revocation;
mod verify;

/// Time sources.
pub mod clock;

/// Verification key sources.
pub mod key_source;

/// Custom token signers.
pub mod signer;

/// User records.
pub mod users;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// The client handle.
///
/// Cheap to clone. Clones share the key cache.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    project_id: Option<String>,
    signer: Arc<dyn Signer>,
    key_source: Arc<dyn KeySource>,
    user_records: Arc<dyn UserRecords>,
    clock: Arc<dyn Clock>,
}

impl Client {
    /// Construct a new builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The project whose ID tokens this client trusts.
    pub fn project_id(&self) -> Option<&str> {
        self.inner.project_id.as_deref()
    }

    /// The identity custom tokens are signed as.
    pub async fn signer_email(&self) -> Result<String, Error> {
        self.inner.signer.email().await
    }
}
