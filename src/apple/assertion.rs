use ciborium::Value;
use openssl::{
    hash::MessageDigest,
    pkey::{Id, PKey},
    sign::Verifier,
};

use super::{AssertionError, VerifiedAssertion};
use crate::{
    cbor,
    utils::{sha256, AuthenticatorData},
};

const ERR_CBOR: &str = "Unable to parse CBOR contents from Assertion";
const ERR_SIGNATURE: &str = "Invalid `signature` field in Assertion";
const ERR_AUTHENTICATOR_DATA: &str = "Invalid `authenticatorData` field in Assertion";
const ERR_AUTHENTICATOR_DATA_LEN: &str = "authenticatorData has < 37 bytes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedAssertion {
    pub(crate) signature: Vec<u8>,
    /// At least [`AuthenticatorData::MIN_ASSERTION_LEN`] bytes, checked by [`parse_assertion`].
    authenticator_data: Vec<u8>,
}

impl ParsedAssertion {
    pub(crate) fn authenticator_data(&self) -> AuthenticatorData<'_> {
        AuthenticatorData::assume_assertion(&self.authenticator_data)
    }
}

/// Verifies an App Attest *assertion* generated by a previously attested key.
///
/// `client_data_hash` is the SHA-256 of the request payload the client signed (see
/// [`crate::request_hasher::RequestHasher`]), `public_key_pem` the key returned by
/// [`super::verify_attestation`] for this device.
///
/// The returned counter is not compared against anything: the caller owns the persisted
/// counter and must reject values that do not strictly increase.
///
/// # Errors
/// Returns the first failing check as an [`AssertionError`].
pub fn verify_assertion(
    client_data_hash: &[u8; 32],
    public_key_pem: &str,
    app_id: &str,
    assertion: &[u8],
) -> Result<VerifiedAssertion, AssertionError> {
    let result = decode_and_validate_assertion(client_data_hash, public_key_pem, app_id, assertion);

    match &result {
        Ok(verified) => tracing::info!(sign_count = verified.sign_count, "assertion verified"),
        Err(e) => tracing::debug!(app_id, error = %e, "assertion rejected"),
    }

    result
}

fn decode_and_validate_assertion(
    client_data_hash: &[u8; 32],
    public_key_pem: &str,
    app_id: &str,
    assertion: &[u8],
) -> Result<VerifiedAssertion, AssertionError> {
    let assertion = parse_assertion(assertion)?;
    let auth_data = assertion.authenticator_data();

    let nonce = sha256(&[auth_data.as_bytes(), client_data_hash]);
    check_signature(public_key_pem, &nonce, &assertion.signature)?;

    if !auth_data.matches_app_id(app_id) {
        return Err(AssertionError::RpIdMismatch);
    }

    Ok(VerifiedAssertion {
        sign_count: auth_data.sign_count(),
    })
}

fn parsing(message: &str) -> AssertionError {
    AssertionError::Parsing(message.to_string())
}

pub(crate) fn parse_assertion(assertion: &[u8]) -> Result<ParsedAssertion, AssertionError> {
    let value = cbor::decode_first(assertion).map_err(|e| {
        tracing::debug!(error = %e, "error decoding cbor formatted assertion");
        parsing(ERR_CBOR)
    })?;
    let map = value.as_map().ok_or_else(|| parsing(ERR_SIGNATURE))?;

    let signature = cbor::map_get(map, "signature")
        .and_then(Value::as_bytes)
        .ok_or_else(|| parsing(ERR_SIGNATURE))?;

    let authenticator_data = cbor::map_get(map, "authenticatorData")
        .and_then(Value::as_bytes)
        .ok_or_else(|| parsing(ERR_AUTHENTICATOR_DATA))?;
    let authenticator_data = AuthenticatorData::for_assertion(authenticator_data)
        .ok_or_else(|| parsing(ERR_AUTHENTICATOR_DATA_LEN))?;

    Ok(ParsedAssertion {
        signature: signature.clone(),
        authenticator_data: authenticator_data.as_bytes().to_vec(),
    })
}

/// The signature scheme follows the key: ECDSA for EC keys, PKCS#1 v1.5 for RSA, both over
/// SHA-256 of `nonce`.
pub(crate) fn check_signature(
    public_key_pem: &str,
    nonce: &[u8],
    signature: &[u8],
) -> Result<(), AssertionError> {
    let key = PKey::public_key_from_pem(public_key_pem.as_bytes()).map_err(|e| {
        tracing::debug!(error = %e, "error loading assertion public key");
        AssertionError::InvalidPublicKey
    })?;

    if key.id() != Id::EC && key.id() != Id::RSA {
        return Err(AssertionError::InvalidPublicKey);
    }

    let verified = Verifier::new(MessageDigest::sha256(), &key)
        .and_then(|mut verifier| verifier.verify_oneshot(signature, nonce));

    match verified {
        Ok(true) => Ok(()),
        Ok(false) => Err(AssertionError::SignatureVerification),
        Err(e) => {
            tracing::debug!(error = %e, "error verifying assertion signature");
            Err(AssertionError::SignatureVerification)
        }
    }
}
