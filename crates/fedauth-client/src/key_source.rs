//! Public keys used to verify ID token signatures.

use std::{borrow::Cow, collections::HashMap, fmt::Debug, sync::Arc};

use arc_swap::ArcSwapOption;
use fnv::FnvHashMap;
use http::header::CACHE_CONTROL;
use jsonwebtoken::{Algorithm, DecodingKey};
use time::{Duration, OffsetDateTime};
use x509_parser::public_key::PublicKey;

use crate::{clock::Clock, error, BoxFuture, Error};

/// Key lifetime used when the certificate response carries no usable `max-age`.
pub const DEFAULT_KEY_LIFETIME: Duration = Duration::seconds(60);

/// Source of the public key set that ID tokens are verified against.
pub trait KeySource: Send + Sync {
    /// The current key set, refreshed first if it has gone stale.
    fn key_set(&self) -> BoxFuture<'_, Arc<KeySet>>;

    /// Look up a single key by its key id.
    fn get_key<'a>(&'a self, kid: &'a str) -> BoxFuture<'a, VerificationKey> {
        Box::pin(async move {
            self.key_set()
                .await?
                .get(kid)
                .cloned()
                .ok_or_else(|| Error::NoMatchingKey(kid.to_string()))
        })
    }
}

/// An RSA public key taken from one of the authority's certificates.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    key: DecodingKey,
}

impl VerificationKey {
    /// Extract the public key of a PEM encoded X.509 certificate.
    pub fn from_certificate_pem(kid: impl Into<String>, cert: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            kid: kid.into(),
            key: decoding_key_from_cert(cert)?,
        })
    }

    /// The key id this key is published under.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Check an RS256 signature (base64url, unpadded) over `message`.
    pub fn verify(&self, message: &str, signature: &str) -> bool {
        jsonwebtoken::crypto::verify(signature, message.as_bytes(), &self.key, Algorithm::RS256)
            .unwrap_or(false)
    }
}

impl Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// A complete set of verification keys and the instant it stops being trustworthy.
///
/// Sets are never modified after construction. A refresh replaces the whole set.
#[derive(Debug)]
pub struct KeySet {
    keys: FnvHashMap<String, VerificationKey>,
    expires_at: Option<OffsetDateTime>,
}

impl KeySet {
    /// Build a set from `(kid, certificate PEM)` pairs.
    ///
    /// With `expires_at` of `None` the set never goes stale.
    pub fn from_certificates<K, C>(
        certs: impl IntoIterator<Item = (K, C)>,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<Self, Error>
    where
        K: Into<String>,
        C: AsRef<[u8]>,
    {
        let keys = certs
            .into_iter()
            .map(|(kid, cert)| {
                let key = VerificationKey::from_certificate_pem(kid, cert.as_ref())?;
                Ok::<_, Error>((key.kid.clone(), key))
            })
            .collect::<Result<_, Error>>()?;

        Ok(Self { keys, expires_at })
    }

    /// Get the key published under `kid`.
    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    /// Iterate over all keys, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &VerificationKey> {
        self.keys.values()
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// When the set goes stale, if ever.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at
    }

    /// Whether the set may still be used at `now`.
    pub fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

/// A fixed key set that never refreshes.
#[derive(Debug)]
pub struct StaticKeySource {
    keys: Arc<KeySet>,
}

impl StaticKeySource {
    /// Serve `keys` forever.
    pub fn new(keys: KeySet) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }
}

impl KeySource for StaticKeySource {
    fn key_set(&self) -> BoxFuture<'_, Arc<KeySet>> {
        Box::pin(async move { Ok(self.keys.clone()) })
    }
}

/// Fetches the certificate map from an HTTP endpoint and caches it for as long as the response allows.
///
/// Refreshes are serialized: callers that find the cache stale queue on one lock and re-check the
/// cache once they hold it, so a burst of verifications during expiry costs a single fetch.
/// A failed refresh is returned to the caller. Expired keys are never served.
pub struct HttpKeySource {
    url: Cow<'static, str>,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    default_lifetime: Duration,
    cached: ArcSwapOption<KeySet>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl HttpKeySource {
    /// Create a key source for the certificate map at `url`.
    pub fn new(url: impl Into<Cow<'static, str>>, http: reqwest::Client, clock: Arc<dyn Clock>) -> Self {
        Self {
            url: url.into(),
            http,
            clock,
            default_lifetime: DEFAULT_KEY_LIFETIME,
            cached: ArcSwapOption::empty(),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Override how long keys are trusted when the response has no `max-age`.
    pub fn with_default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    fn fresh(&self) -> Option<Arc<KeySet>> {
        let now = self.clock.now();
        self.cached.load_full().filter(|keys| keys.is_fresh(now))
    }

    async fn refresh(&self) -> Result<Arc<KeySet>, Error> {
        let _guard = self.refresh_lock.lock().await;

        // Someone else may have refreshed while we waited for the lock.
        if let Some(keys) = self.fresh() {
            return Ok(keys);
        }

        match self.fetch().await {
            Ok(keys) => {
                let keys = Arc::new(keys);
                tracing::info!(
                    url = %self.url,
                    keys = keys.len(),
                    expires_at = ?keys.expires_at(),
                    "refreshed public keys"
                );
                self.cached.store(Some(keys.clone()));
                Ok(keys)
            }
            Err(err) => {
                tracing::warn!(url = %self.url, ?err, "failed to refresh public keys");
                Err(err)
            }
        }
    }

    async fn fetch(&self) -> Result<KeySet, Error> {
        let response = self
            .http
            .get(self.url.as_ref())
            .send()
            .await
            .map_err(error::keys_unavailable)?
            .error_for_status()
            .map_err(error::keys_unavailable)?;

        let lifetime = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(self.default_lifetime);

        let certs: HashMap<String, String> =
            response.json().await.map_err(error::keys_unavailable)?;

        KeySet::from_certificates(certs, Some(self.clock.now() + lifetime))
    }
}

impl KeySource for HttpKeySource {
    fn key_set(&self) -> BoxFuture<'_, Arc<KeySet>> {
        Box::pin(async move {
            match self.fresh() {
                Some(keys) => Ok(keys),
                None => self.refresh().await,
            }
        })
    }
}

/// Extract the PKCS#1 RSA public key from a PEM encoded certificate.
pub fn decoding_key_from_cert(cert: &[u8]) -> Result<DecodingKey, Error> {
    let pem = pem::parse(cert)
        .map_err(|_| Error::KeysUnavailable(anyhow::anyhow!("invalid certificate PEM")))?;

    let (_, x509_cert) = x509_parser::parse_x509_certificate(pem.contents())
        .map_err(|_| Error::KeysUnavailable(anyhow::anyhow!("invalid X.509 certificate")))?;

    let public_key = x509_cert.public_key();
    match public_key.parsed() {
        Ok(PublicKey::RSA(_)) => Ok(DecodingKey::from_rsa_der(
            &public_key.subject_public_key.data,
        )),
        _ => Err(Error::KeysUnavailable(anyhow::anyhow!(
            "certificate does not hold an RSA public key"
        ))),
    }
}

/// Find `max-age` in a `Cache-Control` header value.
fn parse_max_age(cache_control: &str) -> Option<Duration> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        let seconds: u32 = value.trim().trim_matches('"').parse().ok()?;
        Some(Duration::seconds(seconds.into()))
    })
}
