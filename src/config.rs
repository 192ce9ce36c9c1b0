//! Process-wide verifier configuration: the pinned App Attest root CA and the OID of the
//! nonce extension on credential certificates.
//!
//! Both are meant to be set once at startup. Updates publish a whole new value behind a
//! lock, so a concurrent verification observes either the old or the new value.

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use eyre::WrapErr;

use crate::x509::Certificate;

/// Apple App Attestation Root CA, <https://www.apple.com/certificateauthority/Apple_App_Attestation_Root_CA.pem>
pub const DEFAULT_APP_ATTEST_ROOT_CERT_PEM: &str =
    include_str!("./apple/apple_app_attestation_root_ca.pem");

pub const DEFAULT_NONCE_EXTENSION_OID: &str = "1.2.840.113635.100.8.2";

static APP_ATTEST_ROOT_CERT: LazyLock<RwLock<Arc<Certificate>>> =
    LazyLock::new(|| RwLock::new(Arc::new(default_root_certificate())));

static NONCE_EXTENSION_OID: LazyLock<RwLock<Arc<str>>> =
    LazyLock::new(|| RwLock::new(Arc::from(DEFAULT_NONCE_EXTENSION_OID)));

fn default_root_certificate() -> Certificate {
    Certificate::from_pem(DEFAULT_APP_ATTEST_ROOT_CERT_PEM)
        .expect("bundled App Attest root certificate is valid PEM")
}

/// Replaces the pinned root certificate used to verify the intermediate certificate of
/// every subsequent attestation. `None` restores the bundled Apple root.
///
/// # Errors
/// Returns an error if `root_cert_pem` cannot be parsed; the current root stays in place.
pub fn set_app_attest_root_certificate(root_cert_pem: Option<&str>) -> eyre::Result<()> {
    let certificate = match root_cert_pem {
        Some(pem) => Certificate::from_pem(pem)
            .inspect_err(|e| tracing::warn!(error = %e, "rejected App Attest root certificate"))
            .wrap_err("invalid App Attest root certificate")?,
        None => default_root_certificate(),
    };

    *APP_ATTEST_ROOT_CERT
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Arc::new(certificate);

    tracing::warn!(
        bundled = root_cert_pem.is_none(),
        "App Attest root certificate replaced"
    );

    Ok(())
}

/// Snapshot of the current root certificate.
#[must_use]
pub fn app_attest_root_certificate() -> Arc<Certificate> {
    APP_ATTEST_ROOT_CERT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Overrides the OID looked up for the nonce extension (dotted decimal, e.g. `1.2.3.4.5`).
///
/// # Errors
/// Returns an error if `oid` is not a dotted decimal object identifier.
pub fn set_nonce_extension_oid(oid: &str) -> eyre::Result<()> {
    let oid = oid.trim();
    let arcs = oid
        .split('.')
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>()
        .wrap_err_with(|| format!("invalid OID: {oid:?}"))?;
    if arcs.len() < 2 {
        eyre::bail!("invalid OID: {oid:?}");
    }

    *NONCE_EXTENSION_OID
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Arc::from(oid);

    tracing::warn!(oid, "nonce extension OID replaced");

    Ok(())
}

/// Restores [`DEFAULT_NONCE_EXTENSION_OID`].
pub fn reset_nonce_extension_oid() {
    *NONCE_EXTENSION_OID
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Arc::from(DEFAULT_NONCE_EXTENSION_OID);
}

#[must_use]
pub fn nonce_extension_oid() -> Arc<str> {
    NONCE_EXTENSION_OID
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
