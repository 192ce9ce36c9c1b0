#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod apple;
pub mod cbor;
pub mod config;
pub mod request_hasher;
pub mod utils;
pub mod x509;

pub use apple::{
    verify_assertion, verify_attestation, AssertionError, AttestationError, VerifiedAssertion,
    VerifiedAttestation, AAGUID,
};
pub use config::{
    reset_nonce_extension_oid, set_app_attest_root_certificate, set_nonce_extension_oid,
};
pub use request_hasher::RequestHasher;
pub use utils::AppInfo;
