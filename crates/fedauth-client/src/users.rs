//! The user-record collaborator used for revocation.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{error, BoxFuture, Error};

/// Default Identity Toolkit v3 endpoint.
pub const IDENTITY_TOOLKIT_URL: &str = "https://www.googleapis.com/identitytoolkit/v3/relyingparty";

/// The revocation-relevant view of a user account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    /// The user id.
    pub uid: String,

    /// ID tokens issued before this instant (unix milliseconds) are revoked.
    pub tokens_valid_after_millis: i64,
}

/// A change to a user record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserUpdate {
    valid_since_seconds: Option<i64>,
}

impl UserUpdate {
    /// Revoke every token issued before `now`, truncated to the whole second.
    pub fn revoke_refresh_tokens(now: OffsetDateTime) -> Self {
        Self {
            valid_since_seconds: Some(now.unix_timestamp()),
        }
    }

    /// The new token cutoff in unix seconds, if the update sets one.
    pub fn valid_since_seconds(&self) -> Option<i64> {
        self.valid_since_seconds
    }
}

/// Reads and updates user records.
pub trait UserRecords: Send + Sync {
    /// Look up the record for `uid`.
    fn get_user<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, UserRecord>;

    /// Apply `update` to the record for `uid`.
    fn update_user<'a>(&'a self, uid: &'a str, update: UserUpdate) -> BoxFuture<'a, ()>;
}

/// [UserRecords] backed by the Identity Toolkit REST API.
pub struct IdentityToolkitUsers {
    http: reqwest::Client,
    url: Cow<'static, str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetAccountInfoRequest<'a> {
    local_id: [&'a str; 1],
}

#[derive(Deserialize)]
struct GetAccountInfoResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    #[serde(default)]
    valid_since: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetAccountInfoRequest<'a> {
    local_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_since: Option<String>,
}

impl IdentityToolkitUsers {
    /// Create a client for the given Identity Toolkit base URL.
    pub fn new(http: reqwest::Client, url: impl Into<Cow<'static, str>>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    async fn get_account_info(&self, uid: &str) -> Result<UserRecord, Error> {
        let response: GetAccountInfoResponse = self
            .http
            .post(format!("{}/getAccountInfo", self.url))
            .json(&GetAccountInfoRequest { local_id: [uid] })
            .send()
            .await
            .map_err(error::network)?
            .error_for_status()
            .map_err(error::network)?
            .json()
            .await
            .map_err(error::network)?;

        let account = response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| Error::UserNotFound(uid.to_string()))?;

        let tokens_valid_after_millis = match account.valid_since.as_deref() {
            None | Some("") => 0,
            Some(seconds) => seconds
                .parse::<i64>()
                .map_err(error::unclassified)?
                .checked_mul(1000)
                .ok_or_else(|| {
                    Error::Unclassified(anyhow::anyhow!("validSince out of range: {seconds}"))
                })?,
        };

        Ok(UserRecord {
            uid: account.local_id,
            tokens_valid_after_millis,
        })
    }

    async fn set_account_info(&self, uid: &str, update: UserUpdate) -> Result<(), Error> {
        self.http
            .post(format!("{}/setAccountInfo", self.url))
            .json(&SetAccountInfoRequest {
                local_id: uid,
                valid_since: update.valid_since_seconds.map(|seconds| seconds.to_string()),
            })
            .send()
            .await
            .map_err(error::network)?
            .error_for_status()
            .map_err(error::network)?;

        tracing::debug!(%uid, ?update, "updated user record");
        Ok(())
    }
}

impl UserRecords for IdentityToolkitUsers {
    fn get_user<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, UserRecord> {
        Box::pin(self.get_account_info(uid))
    }

    fn update_user<'a>(&'a self, uid: &'a str, update: UserUpdate) -> BoxFuture<'a, ()> {
        Box::pin(self.set_account_info(uid, update))
    }
}
