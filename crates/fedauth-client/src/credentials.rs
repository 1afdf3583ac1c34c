use std::path::Path;

use serde::Deserialize;

use crate::Error;

/// The parts of a service account key file this crate cares about.
#[derive(Deserialize, Clone, Default)]
pub struct ServiceAccountKey {
    /// PEM encoded RSA private key.
    #[serde(default)]
    pub private_key: String,

    /// The service account's email, used as the custom token issuer.
    #[serde(default)]
    pub client_email: String,

    /// The project the service account belongs to.
    #[serde(default)]
    pub project_id: Option<String>,
}

impl ServiceAccountKey {
    /// Parse a service account JSON document.
    pub fn from_json(json: impl AsRef<[u8]>) -> Result<Self, Error> {
        serde_json::from_slice(json.as_ref())
            .map_err(|_| Error::Credentials("invalid service account JSON"))
    }

    /// Read and parse a service account JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let json = std::fs::read(path)
            .map_err(|_| Error::Credentials("service account file not readable"))?;
        Self::from_json(json)
    }

    /// Whether the key can sign locally, i.e. carries both a private key and an identity.
    pub fn can_sign(&self) -> bool {
        !self.private_key.is_empty() && !self.client_email.is_empty()
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}
