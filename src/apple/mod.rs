//! Verification of Apple App Attest artifacts.
//!
//! REFERENCE <https://developer.apple.com/documentation/devicecheck/validating-apps-that-connect-to-your-server>

use serde::{Deserialize, Serialize};

pub mod assertion;
pub mod attestation;

pub use assertion::verify_assertion;
pub use attestation::verify_attestation;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AAGUID {
    AppAttest,
    AppAttestDevelop,
}

impl AAGUID {
    #[must_use]
    pub const fn from_development_env(development_env: bool) -> Self {
        if development_env {
            Self::AppAttestDevelop
        } else {
            Self::AppAttest
        }
    }

    /// The 16 raw bytes carried in authenticator data.
    #[must_use]
    pub const fn as_bytes(&self) -> &'static [u8; 16] {
        match self {
            Self::AppAttest => b"appattest\0\0\0\0\0\0\0",
            Self::AppAttestDevelop => b"appattestdevelop",
        }
    }
}

impl TryFrom<&[u8]> for AAGUID {
    type Error = eyre::Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        [Self::AppAttest, Self::AppAttestDevelop]
            .into_iter()
            .find(|aaguid| aaguid.as_bytes() == bytes)
            .ok_or_else(|| eyre::eyre!("Invalid AAGUID"))
    }
}

/// Reasons an attestation is rejected. `Display` renders the stable error tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttestationError {
    #[error("fail_parsing_attestation: {0}")]
    Parsing(String),
    #[error("fail_credCert_verify_failure")]
    CredCertVerifyFailure,
    #[error("fail_intermediateCert_verify_failure")]
    IntermediateCertVerifyFailure,
    #[error("fail_nonce_missing")]
    NonceMissing,
    #[error("fail_nonce_mismatch")]
    NonceMismatch,
    #[error("fail_keyId_mismatch")]
    KeyIdMismatch,
    #[error("fail_rpId_mismatch")]
    RpIdMismatch,
    #[error("fail_signCount_nonZero")]
    SignCountNonZero,
    #[error("fail_aaguid_mismatch")]
    AaguidMismatch,
    #[error("fail_credId_len_invalid")]
    CredIdLenInvalid,
    #[error("fail_credId_mismatch")]
    CredIdMismatch,
}

impl AttestationError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Parsing(_) => "fail_parsing_attestation",
            Self::CredCertVerifyFailure => "fail_credCert_verify_failure",
            Self::IntermediateCertVerifyFailure => "fail_intermediateCert_verify_failure",
            Self::NonceMissing => "fail_nonce_missing",
            Self::NonceMismatch => "fail_nonce_mismatch",
            Self::KeyIdMismatch => "fail_keyId_mismatch",
            Self::RpIdMismatch => "fail_rpId_mismatch",
            Self::SignCountNonZero => "fail_signCount_nonZero",
            Self::AaguidMismatch => "fail_aaguid_mismatch",
            Self::CredIdLenInvalid => "fail_credId_len_invalid",
            Self::CredIdMismatch => "fail_credId_mismatch",
        }
    }

    /// Human readable detail, only carried by parsing failures.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Parsing(message) => Some(message),
            _ => None,
        }
    }
}

/// Reasons an assertion is rejected. `Display` renders the stable error tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssertionError {
    #[error("fail_parsing_assertion: {0}")]
    Parsing(String),
    #[error("fail_invalid_publicKey")]
    InvalidPublicKey,
    #[error("fail_signature_verification")]
    SignatureVerification,
    #[error("fail_rpId_mismatch")]
    RpIdMismatch,
}

impl AssertionError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Parsing(_) => "fail_parsing_assertion",
            Self::InvalidPublicKey => "fail_invalid_publicKey",
            Self::SignatureVerification => "fail_signature_verification",
            Self::RpIdMismatch => "fail_rpId_mismatch",
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Parsing(message) => Some(message),
            _ => None,
        }
    }
}

/// What a caller should persist (keyed by its own device id) after a successful attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedAttestation {
    pub public_key_pem: String,
    #[serde(with = "serde_bytes")]
    pub receipt: Vec<u8>,
}

/// Result of a successful assertion. The caller must check that `sign_count` exceeds the
/// persisted counter for the key and store it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedAssertion {
    pub sign_count: u32,
}
