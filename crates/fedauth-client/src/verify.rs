//! ID token verification.

use fedauth_common::{
    codec::{self, DecodeError},
    token::{Header, Token},
    FIREBASE_AUDIENCE, ISSUER_PREFIX, MAX_UID_LEN, RS256,
};

use crate::{error::ClaimError, Client, Error};

impl Client {
    /// Verify the signature and claims of an ID token.
    ///
    /// Checks that the token is current, was issued for the configured project and is signed
    /// by one of the authority's published keys. Revocation is not checked, see
    /// [Client::verify_id_token_and_check_revoked].
    pub async fn verify_id_token(&self, id_token: &str) -> Result<Token, Error> {
        let project_id = self
            .inner
            .project_id
            .as_deref()
            .filter(|project_id| !project_id.is_empty())
            .ok_or(Error::ProjectIdMissing)?;
        if id_token.is_empty() {
            return Err(Error::EmptyToken);
        }

        let (header, mut token, [header_segment, payload_segment, signature_segment]) =
            decode_id_token(id_token)
                .inspect_err(|err| tracing::debug!(%err, "malformed ID token"))?;

        let signing_input = &id_token[..header_segment.len() + 1 + payload_segment.len()];
        self.verify_signature(&header, signing_input, signature_segment)
            .await?;

        let issuer = format!("{ISSUER_PREFIX}{project_id}");
        let context = ClaimContext {
            header: &header,
            token: &token,
            project_id,
            issuer: &issuer,
            now: self.inner.clock.now().unix_timestamp(),
        };
        if let Err(err) = check_claims(&context) {
            tracing::debug!(%err, "rejected ID token");
            return Err(err.into());
        }

        token.uid = token.sub.clone();
        Ok(token)
    }

    async fn verify_signature(
        &self,
        header: &Header,
        signing_input: &str,
        signature_segment: &str,
    ) -> Result<(), Error> {
        // Normalize to the unpadded form the crypto layer expects.
        let signature = codec::encode_signature(&codec::decode_signature(signature_segment)?);
        let keys = self.inner.key_source.key_set().await?;

        let verified = match header.key_id() {
            Some(kid) => match keys.get(kid) {
                Some(key) => key.verify(signing_input, &signature),
                None => {
                    tracing::warn!(%kid, "ID token signed with unknown key");
                    return Err(Error::NoMatchingKey(kid.to_string()));
                }
            },
            None => keys.iter().any(|key| key.verify(signing_input, &signature)),
        };

        if !verified {
            tracing::warn!(kid = ?header.key_id(), "ID token signature mismatch");
            return Err(Error::InvalidSignature);
        }
        Ok(())
    }
}

fn decode_id_token(id_token: &str) -> Result<(Header, Token, [&str; 3]), DecodeError> {
    let segments = codec::split_token(id_token)?;
    let header = codec::decode_segment(segments[0])?;
    let token = Token::from_payload_segment(segments[1])?;
    Ok((header, token, segments))
}

/// Everything the claim checks look at.
pub(crate) struct ClaimContext<'a> {
    pub header: &'a Header,
    pub token: &'a Token,
    pub project_id: &'a str,
    pub issuer: &'a str,
    pub now: i64,
}

struct ClaimCheck {
    fails: fn(&ClaimContext<'_>) -> bool,
    error: fn(&ClaimContext<'_>) -> ClaimError,
}

/// The semantic checks in precedence order. The first failing check decides the error.
const CLAIM_CHECKS: [ClaimCheck; 8] = [
    ClaimCheck {
        fails: |cx| cx.header.key_id().is_none(),
        error: |cx| {
            if cx.token.aud == FIREBASE_AUDIENCE {
                ClaimError::CustomToken
            } else {
                ClaimError::MissingKeyId
            }
        },
    },
    ClaimCheck {
        fails: |cx| cx.header.alg != RS256,
        error: |cx| ClaimError::Algorithm(cx.header.alg.clone()),
    },
    ClaimCheck {
        fails: |cx| cx.token.aud != cx.project_id,
        error: |cx| ClaimError::Audience {
            expected: cx.project_id.to_string(),
            actual: cx.token.aud.clone(),
        },
    },
    ClaimCheck {
        fails: |cx| cx.token.iss != cx.issuer,
        error: |cx| ClaimError::Issuer {
            expected: cx.issuer.to_string(),
            actual: cx.token.iss.clone(),
        },
    },
    ClaimCheck {
        fails: |cx| cx.token.iat > cx.now,
        error: |cx| ClaimError::IssuedInFuture(cx.token.iat),
    },
    ClaimCheck {
        fails: |cx| cx.token.exp < cx.now,
        error: |cx| ClaimError::Expired(cx.token.exp),
    },
    ClaimCheck {
        fails: |cx| cx.token.sub.is_empty(),
        error: |_| ClaimError::EmptySubject,
    },
    ClaimCheck {
        fails: |cx| cx.token.sub.chars().count() > MAX_UID_LEN,
        error: |_| ClaimError::SubjectTooLong,
    },
];

pub(crate) fn check_claims(context: &ClaimContext<'_>) -> Result<(), ClaimError> {
    match CLAIM_CHECKS.iter().find(|check| (check.fails)(context)) {
        Some(check) => Err((check.error)(context)),
        None => Ok(()),
    }
}
