//! Producers of custom token signatures.

use base64::{engine::general_purpose::STANDARD, Engine};
use jsonwebtoken::{Algorithm, EncodingKey};
use serde::{Deserialize, Serialize};

use crate::{credentials::ServiceAccountKey, error, BoxFuture, Error};

/// Default GCE metadata server.
pub const METADATA_URL: &str = "http://metadata.google.internal";

/// Default IAM credentials API.
pub const IAM_URL: &str = "https://iam.googleapis.com";

/// Something that can sign bytes on behalf of a service account.
pub trait Signer: Send + Sync {
    /// The identity signatures are made as. Used as issuer and subject of custom tokens.
    fn email(&self) -> BoxFuture<'_, String>;

    /// Compute an RS256 signature over `bytes`.
    fn sign<'a>(&'a self, bytes: &'a [u8]) -> BoxFuture<'a, Vec<u8>>;
}

/// Signs locally with a service account private key.
pub struct ServiceAccountSigner {
    client_email: String,
    key: EncodingKey,
}

impl ServiceAccountSigner {
    /// Create a signer from a PEM encoded RSA private key and the account email.
    pub fn new(private_key_pem: &[u8], client_email: impl Into<String>) -> Result<Self, Error> {
        let key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|_| Error::Credentials("invalid service account private key"))?;

        Ok(Self {
            client_email: client_email.into(),
            key,
        })
    }

    /// Create a signer from parsed service account credentials.
    pub fn from_credentials(credentials: &ServiceAccountKey) -> Result<Self, Error> {
        if !credentials.can_sign() {
            return Err(Error::Credentials(
                "service account key lacks private_key or client_email",
            ));
        }
        Self::new(
            credentials.private_key.as_bytes(),
            credentials.client_email.clone(),
        )
    }

    fn sign_now(&self, bytes: &[u8]) -> Result<Vec<u8>, Error> {
        let signature =
            jsonwebtoken::crypto::sign(bytes, &self.key, Algorithm::RS256).map_err(error::signing)?;
        Ok(fedauth_common::codec::decode_signature(&signature)?)
    }
}

impl Signer for ServiceAccountSigner {
    fn email(&self) -> BoxFuture<'_, String> {
        Box::pin(async move { Ok(self.client_email.clone()) })
    }

    fn sign<'a>(&'a self, bytes: &'a [u8]) -> BoxFuture<'a, Vec<u8>> {
        Box::pin(async move { self.sign_now(bytes) })
    }
}

/// Delegates signing to the IAM `signBlob` API, using whatever credentials the HTTP client carries.
///
/// The signing identity is the default service account reported by the metadata server,
/// unless one is set explicitly. It is looked up once and remembered.
pub struct IamSigner {
    http: reqwest::Client,
    metadata_url: String,
    iam_url: String,
    service_account: tokio::sync::OnceCell<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignBlobRequest {
    bytes_to_sign: String,
}

#[derive(Deserialize)]
struct SignBlobResponse {
    signature: String,
}

impl IamSigner {
    /// Create a signer using the default metadata server and IAM endpoints.
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            metadata_url: METADATA_URL.to_string(),
            iam_url: IAM_URL.to_string(),
            service_account: tokio::sync::OnceCell::new(),
        }
    }

    /// Sign as `email` instead of asking the metadata server.
    pub fn with_service_account(mut self, email: impl Into<String>) -> Self {
        self.service_account = tokio::sync::OnceCell::from(email.into());
        self
    }

    /// Override the metadata server base URL.
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    /// Override the IAM API base URL.
    pub fn with_iam_url(mut self, url: impl Into<String>) -> Self {
        self.iam_url = url.into();
        self
    }

    async fn fetch_service_account(&self) -> Result<String, Error> {
        let email = self
            .http
            .get(format!(
                "{}/computeMetadata/v1/instance/service-accounts/default/email",
                self.metadata_url
            ))
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(error::network)?
            .error_for_status()
            .map_err(error::network)?
            .text()
            .await
            .map_err(error::network)?;

        let email = email.trim().to_string();
        if email.is_empty() {
            return Err(Error::Network(anyhow::anyhow!(
                "metadata server returned no service account"
            )));
        }

        tracing::debug!(%email, "resolved default service account");
        Ok(email)
    }

    async fn sign_blob(&self, bytes: &[u8]) -> Result<Vec<u8>, Error> {
        let email = self
            .service_account
            .get_or_try_init(|| self.fetch_service_account())
            .await?;

        let response: SignBlobResponse = self
            .http
            .post(format!(
                "{}/v1/projects/-/serviceAccounts/{email}:signBlob",
                self.iam_url
            ))
            .json(&SignBlobRequest {
                bytes_to_sign: STANDARD.encode(bytes),
            })
            .send()
            .await
            .map_err(error::network)?
            .error_for_status()
            .map_err(error::network)?
            .json()
            .await
            .map_err(error::network)?;

        STANDARD.decode(response.signature).map_err(error::network)
    }
}

impl Signer for IamSigner {
    fn email(&self) -> BoxFuture<'_, String> {
        Box::pin(async move {
            self.service_account
                .get_or_try_init(|| self.fetch_service_account())
                .await
                .cloned()
        })
    }

    fn sign<'a>(&'a self, bytes: &'a [u8]) -> BoxFuture<'a, Vec<u8>> {
        Box::pin(self.sign_blob(bytes))
    }
}
