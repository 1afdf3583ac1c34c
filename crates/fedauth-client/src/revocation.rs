//! Token revocation.

use fedauth_common::token::Token;

use crate::{mint::validate_uid, users::UserUpdate, Client, Error};

impl Client {
    /// Verify an ID token, then check that it was not issued before the user's revocation cutoff.
    ///
    /// Performs one user-record lookup per call. Revocation state is never cached.
    pub async fn verify_id_token_and_check_revoked(&self, id_token: &str) -> Result<Token, Error> {
        let token = self.verify_id_token(id_token).await?;
        let user = self.inner.user_records.get_user(&token.uid).await?;

        // An `iat` too far in the past to express in millis predates any cutoff.
        let revoked = token
            .iat
            .checked_mul(1000)
            .is_none_or(|iat_millis| iat_millis < user.tokens_valid_after_millis);
        if revoked {
            tracing::info!(uid = %token.uid, iat = token.iat, "ID token has been revoked");
            return Err(Error::TokenRevoked);
        }
        Ok(token)
    }

    /// Revoke all refresh tokens of a user by moving its token cutoff to the current second.
    ///
    /// ID tokens already issued stay valid for [Client::verify_id_token] until they expire;
    /// use [Client::verify_id_token_and_check_revoked] to reject them.
    pub async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), Error> {
        validate_uid(uid)?;
        let update = UserUpdate::revoke_refresh_tokens(self.inner.clock.now());
        self.inner.user_records.update_user(uid, update).await
    }
}
