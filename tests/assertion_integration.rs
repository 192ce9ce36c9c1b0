use app_attest_verifier::{
    utils::decode_base64, verify_assertion, verify_attestation, AppInfo, AssertionError,
    RequestHasher, VerifiedAssertion,
};
use serde_json::json;

const ATTESTATION_B64: &str = include_str!("fixtures/attestation.b64");
const ASSERTION_B64: &str = include_str!("fixtures/assertion.b64");
const PUBLIC_KEY_PEM: &str = include_str!("fixtures/public_key.pem");

const APP_ID: &str = "979F6L8R8M.org.reactjs.native.example.RNClientAttest";
const KEY_ID: &str = "+7NWLawiwi1lyK6vxqHzUp1bXzMji/Ft89ztMqPW4H4=";
const ATTESTATION_CHALLENGE: &str = "279e8603-7bb9-4c7a-8965-aa1f8d7c16ee";
const REQUEST_CHALLENGE: &str = "b4f75c22-0c58-4e6c-8b32-aa095ff04037";

/// The request the client signed, with the challenge serialized as a Node `Buffer`.
fn client_data_hash() -> [u8; 32] {
    let challenge = uuid::Uuid::parse_str(REQUEST_CHALLENGE).unwrap();
    let request = json!({
        "action": "getGameLevel",
        "levelId": 1234,
        "challenge": {
            "type": "Buffer",
            "data": challenge.as_bytes().to_vec(),
        },
    });

    RequestHasher::new().client_data_hash(&request).unwrap()
}

fn assertion() -> Vec<u8> {
    decode_base64(ASSERTION_B64).unwrap()
}

#[test]
fn test_assertion_success() {
    let result =
        verify_assertion(&client_data_hash(), PUBLIC_KEY_PEM, APP_ID, &assertion()).unwrap();

    assert_eq!(result, VerifiedAssertion { sign_count: 1 });
}

#[test]
fn test_assertion_with_junk_public_key() {
    let err = verify_assertion(&client_data_hash(), "junk", APP_ID, &assertion()).unwrap_err();

    assert_eq!(err, AssertionError::InvalidPublicKey);
    assert_eq!(err.to_string(), "fail_invalid_publicKey");
}

#[test]
fn test_assertion_with_other_request() {
    let request = json!({ "action": "getGameLevel", "levelId": 1235 });
    let client_data_hash = RequestHasher::new().client_data_hash(&request).unwrap();

    let err = verify_assertion(&client_data_hash, PUBLIC_KEY_PEM, APP_ID, &assertion()).unwrap_err();

    assert_eq!(err, AssertionError::SignatureVerification);
}

#[test]
fn test_assertion_with_junk() {
    let err =
        verify_assertion(&client_data_hash(), PUBLIC_KEY_PEM, APP_ID, b"junk").unwrap_err();

    assert_eq!(
        err,
        AssertionError::Parsing("Unable to parse CBOR contents from Assertion".to_string())
    );
}

/// Attest once, keep the returned key, then verify a request signed by it.
#[test]
fn test_attest_then_assert() {
    let app_info = AppInfo::new(APP_ID, true);
    let challenge = uuid::Uuid::parse_str(ATTESTATION_CHALLENGE).unwrap();

    let attested = verify_attestation(
        &app_info,
        KEY_ID,
        challenge.as_bytes(),
        &decode_base64(ATTESTATION_B64).unwrap(),
    )
    .unwrap();

    let stored = serde_json::to_string(&attested).unwrap();
    let restored: app_attest_verifier::VerifiedAttestation = serde_json::from_str(&stored).unwrap();

    let result = verify_assertion(
        &client_data_hash(),
        &restored.public_key_pem,
        &app_info.app_id,
        &assertion(),
    )
    .unwrap();

    assert_eq!(result.sign_count, 1);
}
