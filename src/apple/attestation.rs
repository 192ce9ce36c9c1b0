use std::sync::Arc;

use ciborium::Value;
use der_parser::{
    ber::{parse_ber_octetstring, BerObjectContent},
    parse_der,
};
use eyre::ContextCompat;

use super::{AttestationError, VerifiedAttestation, AAGUID};
use crate::{
    cbor, config,
    utils::{encode_base64, sha256, AppInfo, AuthenticatorData},
    x509::Certificate,
};

const ATTESTATION_FORMAT: &str = "apple-appattest";
const EXPECTED_CREDENTIAL_ID_LEN: u16 = 32;

const ERR_CBOR: &str = "Unable to parse CBOR contents from Attestation";
const ERR_FMT: &str = "Invalid `fmt` in Attestation";
const ERR_ATT_STMT: &str = "Invalid `attStmt` in Attestation";
const ERR_AUTH_DATA: &str = "Invalid `authData` in Attestation";
const ERR_AUTH_DATA_LEN: &str = "authData has < 88 bytes";
const ERR_X5C: &str = "Invalid `x5c` field in Attestation";
const ERR_RECEIPT: &str = "Invalid `receipt` field in Attestation";
const ERR_CERTIFICATES: &str = "Unable to parse X509 certificates from Attestation";

#[derive(Debug, Clone)]
pub(crate) struct ParsedAttestation {
    pub(crate) cred_cert: Certificate,
    pub(crate) intermediate_cert: Certificate,
    pub(crate) receipt: Vec<u8>,
    pub(crate) auth_data: Vec<u8>,
}

impl ParsedAttestation {
    fn authenticator_data(&self) -> Result<AuthenticatorData<'_>, AttestationError> {
        AuthenticatorData::for_attestation(&self.auth_data).ok_or_else(|| parsing(ERR_AUTH_DATA_LEN))
    }
}

/// Everything a single verification looks at. The root certificate and nonce OID are read once
/// per verification.
#[derive(Debug, Clone)]
pub(crate) struct VerificationInputs<'a> {
    pub(crate) app_info: &'a AppInfo,
    pub(crate) key_id: &'a str,
    pub(crate) challenge: &'a [u8],
    pub(crate) attestation: ParsedAttestation,
    pub(crate) root_cert: Arc<Certificate>,
    pub(crate) nonce_extension_oid: Arc<str>,
}

/// Verifies an App Attest *attestation* object.
///
/// `key_id` is the base64 key identifier reported by the device, `challenge` the raw one-time
/// challenge the server handed out for this attestation, `attestation` the raw CBOR blob.
///
/// On success the returned public key and receipt should be persisted by the caller.
///
/// # Errors
/// Returns the first failing check as an [`AttestationError`].
pub fn verify_attestation(
    app_info: &AppInfo,
    key_id: &str,
    challenge: &[u8],
    attestation: &[u8],
) -> Result<VerifiedAttestation, AttestationError> {
    let result = decode_and_validate_attestation(app_info, key_id, challenge, attestation);

    match &result {
        Ok(_) => tracing::info!(app_id = %app_info.app_id, "attestation verified"),
        Err(e) => tracing::debug!(app_id = %app_info.app_id, error = %e, "attestation rejected"),
    }

    result
}

fn decode_and_validate_attestation(
    app_info: &AppInfo,
    key_id: &str,
    challenge: &[u8],
    attestation: &[u8],
) -> Result<VerifiedAttestation, AttestationError> {
    let inputs = VerificationInputs {
        app_info,
        key_id,
        challenge,
        attestation: parse_attestation(attestation)?,
        root_cert: config::app_attest_root_certificate(),
        nonce_extension_oid: config::nonce_extension_oid(),
    };

    run_checks(&inputs)?;

    let public_key_pem = inputs
        .attestation
        .cred_cert
        .public_key_pem()
        .map_err(|_| parsing(ERR_CERTIFICATES))?;

    Ok(VerifiedAttestation {
        public_key_pem,
        receipt: inputs.attestation.receipt,
    })
}

/// REFERENCE <https://developer.apple.com/documentation/devicecheck/validating-apps-that-connect-to-your-server#Verify-the-attestation>
pub(crate) fn run_checks(inputs: &VerificationInputs) -> Result<(), AttestationError> {
    // Step 1: certificate chain
    check_certificates(inputs)?;
    // Steps 2 to 4: nonce
    check_nonce(inputs)?;
    // Step 5: public key hash
    check_key_id(inputs)?;
    // Step 6: app id
    check_rp_id(inputs)?;
    // Step 7: counter
    check_sign_count(inputs)?;
    // Step 8: AAGUID
    check_aaguid(inputs)?;
    // Step 9: credential id
    check_credential_id(inputs)
}

fn parsing(message: &str) -> AttestationError {
    AttestationError::Parsing(message.to_string())
}

/// Decodes the CBOR attestation object and checks its shape.
pub(crate) fn parse_attestation(attestation: &[u8]) -> Result<ParsedAttestation, AttestationError> {
    let value = cbor::decode_first(attestation).map_err(|e| {
        tracing::debug!(error = %e, "error decoding cbor formatted attestation");
        parsing(ERR_CBOR)
    })?;
    let map = value.as_map().ok_or_else(|| parsing(ERR_FMT))?;

    if cbor::map_get(map, "fmt").and_then(Value::as_text) != Some(ATTESTATION_FORMAT) {
        return Err(parsing(ERR_FMT));
    }

    let att_stmt = cbor::map_get(map, "attStmt")
        .and_then(Value::as_map)
        .ok_or_else(|| parsing(ERR_ATT_STMT))?;

    let auth_data = cbor::map_get(map, "authData")
        .and_then(Value::as_bytes)
        .ok_or_else(|| parsing(ERR_AUTH_DATA))?;
    if auth_data.len() < AuthenticatorData::MIN_ATTESTATION_LEN {
        return Err(parsing(ERR_AUTH_DATA_LEN));
    }

    let x5c = cbor::map_get(att_stmt, "x5c")
        .and_then(Value::as_array)
        .filter(|x5c| x5c.len() >= 2)
        .ok_or_else(|| parsing(ERR_X5C))?;
    let (Some(cred_cert), Some(intermediate_cert)) = (x5c[0].as_bytes(), x5c[1].as_bytes()) else {
        return Err(parsing(ERR_X5C));
    };

    let receipt = cbor::map_get(att_stmt, "receipt")
        .and_then(Value::as_bytes)
        .ok_or_else(|| parsing(ERR_RECEIPT))?;

    let certificate = |der: &[u8]| {
        Certificate::from_der(der).map_err(|e| {
            tracing::debug!(error = %e, "error parsing attestation certificate");
            parsing(ERR_CERTIFICATES)
        })
    };

    Ok(ParsedAttestation {
        cred_cert: certificate(cred_cert)?,
        intermediate_cert: certificate(intermediate_cert)?,
        receipt: receipt.clone(),
        auth_data: auth_data.clone(),
    })
}

/// The credential certificate must be signed by the intermediate, and the intermediate by the
/// pinned root. Validity dates are not checked.
pub(crate) fn check_certificates(inputs: &VerificationInputs) -> Result<(), AttestationError> {
    let attestation = &inputs.attestation;

    let intermediate_key = attestation
        .intermediate_cert
        .public_key()
        .map_err(|_| AttestationError::CredCertVerifyFailure)?;
    if !attestation.cred_cert.verify(&intermediate_key) {
        return Err(AttestationError::CredCertVerifyFailure);
    }

    let root_key = inputs
        .root_cert
        .public_key()
        .map_err(|_| AttestationError::IntermediateCertVerifyFailure)?;
    if !attestation.intermediate_cert.verify(&root_key) {
        return Err(AttestationError::IntermediateCertVerifyFailure);
    }

    Ok(())
}

/// `nonce = SHA256(authData ‖ SHA256(challenge))` must equal the octet string carried in the
/// credential certificate's nonce extension.
pub(crate) fn check_nonce(inputs: &VerificationInputs) -> Result<(), AttestationError> {
    let attestation = &inputs.attestation;

    let client_data_hash = sha256(&[inputs.challenge]);
    let nonce = sha256(&[&attestation.auth_data, &client_data_hash]);

    let extension = attestation
        .cred_cert
        .get_extension(&inputs.nonce_extension_oid)
        .ok_or(AttestationError::NonceMissing)?;

    match extract_nonce(&extension) {
        Ok(received_nonce) if received_nonce == nonce => Ok(()),
        Ok(_) => Err(AttestationError::NonceMismatch),
        Err(e) => {
            tracing::debug!(error = %e, "error parsing nonce extension");
            Err(AttestationError::NonceMismatch)
        }
    }
}

/// The extension value is `SEQUENCE { [1] EXPLICIT OCTET STRING }`. A bare
/// `SEQUENCE { OCTET STRING }` is accepted as well.
fn extract_nonce(extension: &[u8]) -> eyre::Result<Vec<u8>> {
    let (_, content) = parse_der(extension)?;
    let first = content
        .as_sequence()?
        .first()
        .context("nonce extension sequence is empty")?;

    if let BerObjectContent::OctetString(nonce) = &first.content {
        return Ok(nonce.to_vec());
    }

    let (_, value) = parse_ber_octetstring(first.as_slice()?)?;
    Ok(value.as_slice()?.to_vec())
}

/// The key identifier is the SHA-256 of the credential's uncompressed EC point.
pub(crate) fn check_key_id(inputs: &VerificationInputs) -> Result<(), AttestationError> {
    let point = inputs
        .attestation
        .cred_cert
        .uncompressed_ec_point()
        .ok_or(AttestationError::KeyIdMismatch)?;

    if encode_base64(&sha256(&[&point])) != inputs.key_id {
        return Err(AttestationError::KeyIdMismatch);
    }

    Ok(())
}

pub(crate) fn check_rp_id(inputs: &VerificationInputs) -> Result<(), AttestationError> {
    let auth_data = inputs.attestation.authenticator_data()?;

    if !auth_data.matches_app_id(&inputs.app_info.app_id) {
        return Err(AttestationError::RpIdMismatch);
    }

    Ok(())
}

pub(crate) fn check_sign_count(inputs: &VerificationInputs) -> Result<(), AttestationError> {
    if inputs.attestation.authenticator_data()?.sign_count() != 0 {
        return Err(AttestationError::SignCountNonZero);
    }

    Ok(())
}

pub(crate) fn check_aaguid(inputs: &VerificationInputs) -> Result<(), AttestationError> {
    let expected = AAGUID::from_development_env(inputs.app_info.development_env);

    match AAGUID::try_from(inputs.attestation.authenticator_data()?.aaguid()) {
        Ok(aaguid) if aaguid == expected => Ok(()),
        Ok(_) => Err(AttestationError::AaguidMismatch),
        Err(e) => {
            tracing::debug!(error = %e, "unknown aaguid in authData");
            Err(AttestationError::AaguidMismatch)
        }
    }
}

pub(crate) fn check_credential_id(inputs: &VerificationInputs) -> Result<(), AttestationError> {
    let auth_data = inputs.attestation.authenticator_data()?;

    if auth_data.credential_id_len() != EXPECTED_CREDENTIAL_ID_LEN {
        return Err(AttestationError::CredIdLenInvalid);
    }

    if encode_base64(auth_data.credential_id()) != inputs.key_id {
        return Err(AttestationError::CredIdMismatch);
    }

    Ok(())
}
