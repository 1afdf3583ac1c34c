//! Custom token minting.

use fedauth_common::{
    codec,
    custom_token::{reserved_claims_in, CustomTokenClaims},
    token::Header,
    MAX_UID_LEN,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{error, signer::Signer, Client, Error};

impl Client {
    /// Create a signed custom token for `uid`.
    ///
    /// A client SDK exchanges the token for a session. It expires after one hour.
    pub async fn custom_token(&self, uid: &str) -> Result<String, Error> {
        self.custom_token_with_claims(uid, Map::new()).await
    }

    /// Like [Client::custom_token], additionally embedding `claims` in the token payload.
    ///
    /// None of the claim names may be reserved.
    pub async fn custom_token_with_claims(
        &self,
        uid: &str,
        claims: Map<String, Value>,
    ) -> Result<String, Error> {
        validate_uid(uid)?;

        let reserved = reserved_claims_in(&claims);
        if !reserved.is_empty() {
            return Err(Error::ReservedClaims(
                reserved.into_iter().map(String::from).collect(),
            ));
        }

        let signer = self.inner.signer.as_ref();
        let issuer = signer.email().await?;
        let iat = self.inner.clock.now().unix_timestamp();

        let payload = CustomTokenClaims::new(issuer, uid.to_string(), iat, claims);
        encode_token(&Header::rs256_jwt(), &payload, signer).await
    }
}

pub(crate) fn validate_uid(uid: &str) -> Result<(), Error> {
    let len = uid.chars().count();
    if len == 0 || len > MAX_UID_LEN {
        return Err(Error::InvalidUid);
    }
    Ok(())
}

/// Serialize, sign and assemble a compact token.
pub(crate) async fn encode_token<P: Serialize + Sync>(
    header: &Header,
    payload: &P,
    signer: &dyn Signer,
) -> Result<String, Error> {
    let signing_input = codec::signing_input(header, payload).map_err(error::unclassified)?;
    let signature = signer.sign(signing_input.as_bytes()).await?;
    Ok(codec::assemble(&signing_input, &signature))
}
