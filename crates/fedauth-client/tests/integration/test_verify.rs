use std::sync::Arc;

use fedauth_client::{
    key_source::{KeySet, KeySource},
    BoxFuture, ClaimError, Client, Error, ErrorKind,
};
use fedauth_common::codec;
use serde_json::json;

use crate::common::{
    fixture, id_token, id_token_claims, key_set, rs256_header, sign, ISSUER, KEY1, KEY2, NOW,
    PROJECT_ID,
};

fn with_claim(name: &str, value: serde_json::Value) -> serde_json::Value {
    let mut claims = id_token_claims();
    claims[name] = value;
    claims
}

#[test_log::test(tokio::test)]
async fn test_valid_token() {
    let fx = fixture();
    let token = fx
        .client
        .verify_id_token(&id_token(&id_token_claims()))
        .await
        .unwrap();

    assert_eq!(token.iss, ISSUER);
    assert_eq!(token.aud, PROJECT_ID);
    assert_eq!(token.iat, NOW - 10);
    assert_eq!(token.exp, NOW + 3590);
    assert_eq!(token.sub, "alice");
    assert_eq!(token.uid, "alice");
    assert_eq!(
        serde_json::Value::Object(token.claims),
        json!({ "auth_time": NOW - 10, "admin": true, "groups": ["a", "b"] })
    );
}

#[test_log::test(tokio::test)]
async fn test_second_key_in_set() {
    let fx = fixture();
    let token = sign(&rs256_header("key-2"), &id_token_claims(), KEY2);
    assert_eq!(fx.client.verify_id_token(&token).await.unwrap().uid, "alice");
}

#[test_log::test(tokio::test)]
async fn test_flipped_signature_byte() {
    let fx = fixture();
    let token = id_token(&id_token_claims());
    let (signing_input, signature) = token.rsplit_once('.').unwrap();

    let mut signature = codec::decode_signature(signature).unwrap();
    signature[10] ^= 0x01;
    let tampered = codec::assemble(signing_input, &signature);

    let err = fx.client.verify_id_token(&tampered).await.unwrap_err();
    assert!(matches!(err, Error::InvalidSignature), "{err}");
    assert_eq!(err.kind(), ErrorKind::CryptoVerification);
}

#[test_log::test(tokio::test)]
async fn test_tampered_payload() {
    let fx = fixture();
    let token = id_token(&id_token_claims());
    let [header, _, signature] = codec::split_token(&token).unwrap();

    let forged_payload = codec::encode_segment(&with_claim("sub", json!("mallory"))).unwrap();
    let forged = format!("{header}.{forged_payload}.{signature}");

    let err = fx.client.verify_id_token(&forged).await.unwrap_err();
    assert!(matches!(err, Error::InvalidSignature), "{err}");
}

#[test_log::test(tokio::test)]
async fn test_signed_by_wrong_key() {
    let fx = fixture();
    let token = sign(&rs256_header("key-1"), &id_token_claims(), KEY2);

    let err = fx.client.verify_id_token(&token).await.unwrap_err();
    assert!(matches!(err, Error::InvalidSignature), "{err}");
}

#[test_log::test(tokio::test)]
async fn test_unknown_key_id() {
    let fx = fixture();
    let token = sign(&rs256_header("rotated-away"), &id_token_claims(), KEY1);

    let err = fx.client.verify_id_token(&token).await.unwrap_err();
    assert!(matches!(&err, Error::NoMatchingKey(kid) if kid == "rotated-away"), "{err}");
    assert_eq!(err.kind(), ErrorKind::CryptoVerification);
}

#[test_log::test(tokio::test)]
async fn test_missing_key_id() {
    let fx = fixture();
    let token = sign(&json!({ "alg": "RS256", "typ": "JWT" }), &id_token_claims(), KEY1);

    let err = fx.client.verify_id_token(&token).await.unwrap_err();
    assert!(matches!(err, Error::Claim(ClaimError::MissingKeyId)), "{err}");
    assert_eq!(err.to_string(), "ID token has no 'kid' header");
}

#[test_log::test(tokio::test)]
async fn test_missing_key_id_with_custom_token_audience() {
    let fx = fixture();
    let claims = with_claim("aud", json!(fedauth_common::FIREBASE_AUDIENCE));
    let token = sign(&json!({ "alg": "RS256", "typ": "JWT" }), &claims, KEY1);

    let err = fx.client.verify_id_token(&token).await.unwrap_err();
    assert!(matches!(err, Error::Claim(ClaimError::CustomToken)), "{err}");
}

#[test_log::test(tokio::test)]
async fn test_unexpected_algorithm() {
    let fx = fixture();
    let header = json!({ "alg": "HS256", "typ": "JWT", "kid": "key-1" });
    let token = sign(&header, &id_token_claims(), KEY1);

    let err = fx.client.verify_id_token(&token).await.unwrap_err();
    assert!(
        matches!(&err, Error::Claim(ClaimError::Algorithm(alg)) if alg == "HS256"),
        "{err}"
    );
    assert!(err
        .to_string()
        .starts_with(r#"ID token has invalid algorithm; expected 'RS256' but got "HS256";"#));
}

#[test_log::test(tokio::test)]
async fn test_wrong_audience() {
    let fx = fixture();
    let token = id_token(&with_claim("aud", json!("other-project")));

    let err = fx.client.verify_id_token(&token).await.unwrap_err();
    assert!(
        matches!(&err, Error::Claim(ClaimError::Audience { expected, actual })
            if expected == PROJECT_ID && actual == "other-project"),
        "{err}"
    );
    assert!(err.to_string().contains("same Firebase project"));
    assert_eq!(err.kind(), ErrorKind::Claim);
}

#[test_log::test(tokio::test)]
async fn test_wrong_issuer() {
    let fx = fixture();
    let token = id_token(&with_claim(
        "iss",
        json!("https://securetoken.google.com/other-project"),
    ));

    let err = fx.client.verify_id_token(&token).await.unwrap_err();
    assert!(matches!(err, Error::Claim(ClaimError::Issuer { .. })), "{err}");
}

#[test_log::test(tokio::test)]
async fn test_issued_in_future() {
    let fx = fixture();
    let token = id_token(&with_claim("iat", json!(NOW + 1)));

    let err = fx.client.verify_id_token(&token).await.unwrap_err();
    assert!(
        matches!(err, Error::Claim(ClaimError::IssuedInFuture(iat)) if iat == NOW + 1),
        "{err}"
    );
    assert_eq!(
        err.to_string(),
        format!("ID token issued at future timestamp: {}", NOW + 1)
    );
}

#[test_log::test(tokio::test)]
async fn test_expiry() {
    let fx = fixture();

    let expired = id_token(&with_claim("exp", json!(NOW - 1)));
    let err = fx.client.verify_id_token(&expired).await.unwrap_err();
    assert!(
        matches!(err, Error::Claim(ClaimError::Expired(exp)) if exp == NOW - 1),
        "{err}"
    );

    let expiring_now = id_token(&with_claim("exp", json!(NOW)));
    assert!(fx.client.verify_id_token(&expiring_now).await.is_ok());
}

#[test_log::test(tokio::test)]
async fn test_token_expires_as_clock_moves() {
    let fx = fixture();
    let token = id_token(&id_token_claims());
    assert!(fx.client.verify_id_token(&token).await.is_ok());

    fx.clock.advance(time::Duration::hours(1));
    let err = fx.client.verify_id_token(&token).await.unwrap_err();
    assert!(matches!(err, Error::Claim(ClaimError::Expired(_))), "{err}");
}

#[test_log::test(tokio::test)]
async fn test_subject() {
    let fx = fixture();

    let missing = id_token(&{
        let mut claims = id_token_claims();
        claims.as_object_mut().unwrap().remove("sub");
        claims
    });
    let err = fx.client.verify_id_token(&missing).await.unwrap_err();
    assert!(matches!(err, Error::Claim(ClaimError::EmptySubject)), "{err}");

    let empty = id_token(&with_claim("sub", json!("")));
    let err = fx.client.verify_id_token(&empty).await.unwrap_err();
    assert!(matches!(err, Error::Claim(ClaimError::EmptySubject)), "{err}");

    let too_long = id_token(&with_claim("sub", json!("a".repeat(129))));
    let err = fx.client.verify_id_token(&too_long).await.unwrap_err();
    assert!(matches!(err, Error::Claim(ClaimError::SubjectTooLong)), "{err}");

    let longest = id_token(&with_claim("sub", json!("a".repeat(128))));
    let token = fx.client.verify_id_token(&longest).await.unwrap();
    assert_eq!(token.uid.len(), 128);
}

#[test_log::test(tokio::test)]
async fn test_uid_claim_is_replaced_by_subject() {
    let fx = fixture();
    let token = id_token(&with_claim("uid", json!("someone-else")));
    let token = fx.client.verify_id_token(&token).await.unwrap();
    assert_eq!(token.uid, "alice");
    assert!(!token.claims.contains_key("uid"));
}

#[test_log::test(tokio::test)]
async fn test_preconditions() {
    let fx = fixture();
    let err = fx.client.verify_id_token("").await.unwrap_err();
    assert!(matches!(err, Error::EmptyToken));

    let no_project = Client::builder()
        .with_key_source(Arc::new(fedauth_client::key_source::StaticKeySource::new(
            key_set(),
        )))
        .build()
        .unwrap();
    let err = no_project
        .verify_id_token(&id_token(&id_token_claims()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProjectIdMissing));
    assert_eq!(err.kind(), ErrorKind::InputValidation);
}

#[test_log::test(tokio::test)]
async fn test_malformed_tokens() {
    let fx = fixture();
    let valid = id_token(&id_token_claims());
    let [header, payload, signature] = codec::split_token(&valid).unwrap();

    let malformed = [
        "not-a-token".to_string(),
        format!("{header}.{payload}"),
        format!("{valid}.extra"),
        format!("!!!.{payload}.{signature}"),
        format!("{header}.{}.{signature}", codec::encode_segment(&"a string").unwrap()),
        format!("{header}.{payload}.***"),
    ];

    for token in malformed {
        let err = fx.client.verify_id_token(&token).await.unwrap_err();
        assert!(matches!(err, Error::Malformed(_)), "{token}: {err}");
        assert_eq!(err.kind(), ErrorKind::StructuralDecode);
    }
}

struct UnavailableKeys;

impl KeySource for UnavailableKeys {
    fn key_set(&self) -> BoxFuture<'_, Arc<KeySet>> {
        Box::pin(async { Err(Error::KeysUnavailable(anyhow::anyhow!("connection refused"))) })
    }
}

#[test_log::test(tokio::test)]
async fn test_keys_unavailable() {
    let client = Client::builder()
        .with_project_id(PROJECT_ID)
        .with_key_source(Arc::new(UnavailableKeys))
        .build()
        .unwrap();

    let err = client
        .verify_id_token(&id_token(&id_token_claims()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::KeysUnavailable(_)), "{err}");
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}
