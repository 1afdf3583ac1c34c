use std::{borrow::Cow, path::PathBuf, sync::Arc};

use fedauth_common::ID_TOKEN_CERT_URL;

use crate::{
    clock::{Clock, SystemClock},
    credentials::ServiceAccountKey,
    key_source::{HttpKeySource, KeySource, DEFAULT_KEY_LIFETIME},
    signer::{IamSigner, ServiceAccountSigner, Signer},
    users::{IdentityToolkitUsers, UserRecords, IDENTITY_TOOLKIT_URL},
    Client, ClientInner, Error,
};

/// Environment variable naming a service account key file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Environment variables consulted, in order, for the project id.
pub const PROJECT_ID_ENVS: [&str; 2] = ["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];

/// A builder for configuring a [Client].
pub struct ClientBuilder {
    project_id: Option<String>,
    credentials: Option<ServiceAccountKey>,
    signer: Option<Arc<dyn Signer>>,
    http: Option<reqwest::Client>,
    clock: Option<Arc<dyn Clock>>,
    key_source: Option<Arc<dyn KeySource>>,
    cert_url: Cow<'static, str>,
    default_key_lifetime: time::Duration,
    user_records: Option<Arc<dyn UserRecords>>,
    identity_toolkit_url: Cow<'static, str>,
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        Self {
            project_id: None,
            credentials: None,
            signer: None,
            http: None,
            clock: None,
            key_source: None,
            cert_url: Cow::Borrowed(ID_TOKEN_CERT_URL),
            default_key_lifetime: DEFAULT_KEY_LIFETIME,
            user_records: None,
            identity_toolkit_url: Cow::Borrowed(IDENTITY_TOOLKIT_URL),
        }
    }

    /// Infer credentials and project id from the process environment.
    ///
    /// Reads the service account file named by `GOOGLE_APPLICATION_CREDENTIALS`, if set, and takes the
    /// project id from `GOOGLE_CLOUD_PROJECT` or `GCLOUD_PROJECT`. Values already configured win.
    pub fn from_environment(self) -> Result<Self, Error> {
        self.infer(|name| std::env::var(name).ok())
    }

    pub(crate) fn infer(mut self, env: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        if self.credentials.is_none() {
            if let Some(path) = env(CREDENTIALS_ENV).filter(|path| !path.is_empty()) {
                let path = PathBuf::from(path);
                tracing::debug!(path = %path.display(), "loading service account credentials");
                self.credentials = Some(ServiceAccountKey::from_file(&path)?);
            }
        }

        if self.project_id.is_none() {
            self.project_id = PROJECT_ID_ENVS
                .iter()
                .find_map(|name| env(name).filter(|project_id| !project_id.is_empty()));
        }

        Ok(self)
    }

    /// Set the project whose ID tokens are trusted.
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Use the given service account JSON document.
    ///
    /// If it carries a private key, custom tokens are signed locally with it.
    pub fn with_service_account_json(mut self, json: impl AsRef<[u8]>) -> Result<Self, Error> {
        self.credentials = Some(ServiceAccountKey::from_json(json)?);
        Ok(self)
    }

    /// Use the given, already parsed, service account credentials.
    pub fn with_credentials(mut self, credentials: ServiceAccountKey) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Use a custom signer instead of selecting one from the credentials.
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Use the given HTTP client for every outbound request.
    ///
    /// Authentication headers and timeouts for the IAM and Identity Toolkit APIs are configured on it.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Use the given time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a custom source of ID token verification keys.
    pub fn with_key_source(mut self, key_source: Arc<dyn KeySource>) -> Self {
        self.key_source = Some(key_source);
        self
    }

    /// Override the certificate endpoint of the default key source.
    pub fn with_cert_url(mut self, url: impl Into<String>) -> Self {
        self.cert_url = url.into().into();
        self
    }

    /// Override how long keys are trusted when the certificate response has no `max-age`.
    pub fn with_default_key_lifetime(mut self, lifetime: time::Duration) -> Self {
        self.default_key_lifetime = lifetime;
        self
    }

    /// Use a custom user-record backend.
    pub fn with_user_records(mut self, user_records: Arc<dyn UserRecords>) -> Self {
        self.user_records = Some(user_records);
        self
    }

    /// Override the Identity Toolkit base URL of the default user-record backend.
    pub fn with_identity_toolkit_url(mut self, url: impl Into<String>) -> Self {
        self.identity_toolkit_url = url.into().into();
        self
    }

    /// Build the client.
    ///
    /// No network requests are made here; keys and the delegated signing identity are fetched on first use.
    pub fn build(self) -> Result<Client, Error> {
        let http = self.http.unwrap_or_default();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let project_id = self.project_id.or_else(|| {
            self.credentials
                .as_ref()
                .and_then(|credentials| credentials.project_id.clone())
        });

        let signer: Arc<dyn Signer> = match (self.signer, &self.credentials) {
            (Some(signer), _) => signer,
            (None, Some(credentials)) if credentials.can_sign() => {
                Arc::new(ServiceAccountSigner::from_credentials(credentials)?)
            }
            (None, _) => {
                tracing::debug!("no signing credentials, delegating custom token signing to IAM");
                Arc::new(IamSigner::new(http.clone()))
            }
        };

        let key_source = self.key_source.unwrap_or_else(|| {
            Arc::new(
                HttpKeySource::new(self.cert_url, http.clone(), clock.clone())
                    .with_default_lifetime(self.default_key_lifetime),
            )
        });

        let user_records = self.user_records.unwrap_or_else(|| {
            Arc::new(IdentityToolkitUsers::new(
                http.clone(),
                self.identity_toolkit_url,
            ))
        });

        Ok(Client {
            inner: Arc::new(ClientInner {
                project_id,
                signer,
                key_source,
                user_records,
                clock,
            }),
        })
    }
}
